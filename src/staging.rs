//! Canonical staging line format shared by every feed plugin and read back
//! by the merger: `<start_int>|<end_int>|<tag_json_or_quoted>`.
//!
//! A tag JSON body containing the `|` delimiter is wrapped in `~...~`; `~`
//! is therefore the quote character the parser looks for first.

use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};

use crate::error::{CoreError, Result};
use crate::tag::Tag;

pub fn format_line(start: u32, end: u32, tag: &Tag) -> Result<String> {
    let tag_json = serde_json::to_string(tag)?;
    if tag_json.contains('|') {
        Ok(format!("{start}|{end}|~{tag_json}~"))
    } else {
        Ok(format!("{start}|{end}|{tag_json}"))
    }
}

/// Parses one staging line into `(start, end, tag)`. Returns `None` for
/// blank lines so callers can skip them without treating them as errors.
pub fn parse_line(line: &str) -> Result<Option<(u32, u32, Tag)>> {
    let line = line.trim_end_matches(['\n', '\r']);
    if line.is_empty() {
        return Ok(None);
    }

    let mut parts = line.splitn(3, '|');
    let start: u32 = parts
        .next()
        .ok_or_else(|| CoreError::invalid_input("missing start field"))?
        .parse()
        .map_err(|_| CoreError::invalid_input("non-numeric start field"))?;
    let end: u32 = parts
        .next()
        .ok_or_else(|| CoreError::invalid_input("missing end field"))?
        .parse()
        .map_err(|_| CoreError::invalid_input("non-numeric end field"))?;
    let rest = parts
        .next()
        .ok_or_else(|| CoreError::invalid_input("missing tag field"))?;

    let tag_json = rest
        .strip_prefix('~')
        .and_then(|s| s.strip_suffix('~'))
        .unwrap_or(rest);

    let value: serde_json::Value = serde_json::from_str(tag_json)?;
    let tag = value
        .as_object()
        .ok_or_else(|| CoreError::invalid_input("tag body is not a JSON object"))?
        .clone();

    Ok(Some((start, end, tag)))
}

/// Appends canonical lines to a plugin's staging file, creating it if absent.
pub struct StagingWriter {
    writer: BufWriter<File>,
}

impl StagingWriter {
    pub async fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path).await?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    pub async fn write_range(&mut self, start: u32, end: u32, tag: &Tag) -> Result<()> {
        let line = format_line(start, end, tag)?;
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<()> {
        self.writer.flush().await?;
        Ok(())
    }
}

/// Reads one staging file line by line, yielding parsed `(start, end, tag)`
/// triples and silently skipping blank lines.
pub async fn read_staging_file(
    path: impl AsRef<Path>,
) -> Result<Vec<(u32, u32, Tag)>> {
    let file = File::open(path).await?;
    let mut lines = BufReader::new(file).lines();
    let mut out = Vec::new();
    while let Some(line) = lines.next_line().await? {
        if let Some(parsed) = parse_line(&line)? {
            out.push(parsed);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tag(fields: serde_json::Value) -> Tag {
        fields.as_object().unwrap().clone()
    }

    #[test]
    fn formats_and_parses_a_plain_tag() {
        let t = tag(json!({"type": "denylist", "source": "cloudflare"}));
        let line = format_line(10, 20, &t).unwrap();
        let (s, e, parsed) = parse_line(&line).unwrap().unwrap();
        assert_eq!((s, e), (10, 20));
        assert_eq!(parsed, t);
    }

    #[test]
    fn quotes_tag_bodies_containing_the_delimiter() {
        let t = tag(json!({"type": "asn", "source": "maxmind_lite", "name": "A|B Corp"}));
        let line = format_line(1, 2, &t).unwrap();
        assert!(line.contains("~{"));
        let (_, _, parsed) = parse_line(&line).unwrap().unwrap();
        assert_eq!(parsed, t);
    }

    #[test]
    fn blank_lines_parse_to_none() {
        assert!(parse_line("").unwrap().is_none());
        assert!(parse_line("\n").unwrap().is_none());
    }
}
