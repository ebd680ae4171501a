//! Concatenates staged plugin output into a single merged CSV, prefixed by a
//! fixed header, with structural validation before it is accepted (spec §4.B).

use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::error::{CoreError, Result};

pub const HEADER_LINE: &str = "start_int|end_int|list";

/// Concatenates every regular file in `staging_dir` (plugin staging files)
/// behind [`HEADER_LINE`], writing the result to `merged_path`. Hidden files
/// (leading `.`) are skipped.
pub async fn merge(staging_dir: &Path, merged_path: &Path) -> Result<()> {
    let mut entries = fs::read_dir(staging_dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with('.'))
            .unwrap_or(false);
        if is_hidden {
            continue;
        }
        files.push(path);
    }
    files.sort();

    let tmp_path = merged_path.with_extension("tmp");
    let mut out = fs::File::create(&tmp_path).await?;
    out.write_all(HEADER_LINE.as_bytes()).await?;
    out.write_all(b"\n").await?;

    for path in &files {
        let file = fs::File::open(path).await?;
        let mut lines = BufReader::new(file).lines();
        while let Some(line) = lines.next_line().await? {
            if line.is_empty() {
                continue;
            }
            out.write_all(line.as_bytes()).await?;
            out.write_all(b"\n").await?;
        }
    }
    out.flush().await?;
    drop(out);

    validate(&tmp_path).await?;

    if merged_path.exists() {
        let backup_path = merged_path.with_extension("csv.backup");
        fs::rename(merged_path, &backup_path).await?;
    }
    fs::rename(&tmp_path, merged_path).await?;
    Ok(())
}

/// Validates: file exists, size exceeds the header length, header is
/// present, and the first ten data lines split into exactly three
/// `|`-separated fields whose first two parse as integers.
async fn validate(path: &PathBuf) -> Result<()> {
    let metadata = fs::metadata(path).await?;
    if metadata.len() <= HEADER_LINE.len() as u64 + 1 {
        return Err(CoreError::merge_validation("merged file is empty or header-only"));
    }

    let file = fs::File::open(path).await?;
    let mut lines = BufReader::new(file).lines();

    let header = lines
        .next_line()
        .await?
        .ok_or_else(|| CoreError::merge_validation("merged file has no header line"))?;
    if header != HEADER_LINE {
        return Err(CoreError::merge_validation(format!(
            "expected header {HEADER_LINE:?}, got {header:?}"
        )));
    }

    for i in 0..10 {
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let fields: Vec<&str> = line.splitn(3, '|').collect();
        if fields.len() != 3 {
            return Err(CoreError::merge_validation(format!(
                "data line {} does not split into three fields: {line:?}",
                i + 1
            )));
        }
        if fields[0].parse::<u32>().is_err() || fields[1].parse::<u32>().is_err() {
            return Err(CoreError::merge_validation(format!(
                "data line {} has non-integer start/end: {line:?}",
                i + 1
            )));
        }
    }

    Ok(())
}

/// Reads the merged intermediate file back into `(start, end, tag)` triples,
/// skipping the header. Used by the flattener/loader stage.
pub async fn read_merged(merged_path: &Path) -> Result<Vec<(u32, u32, crate::tag::Tag)>> {
    let file = fs::File::open(merged_path).await?;
    let mut lines = BufReader::new(file).lines();

    let header = lines.next_line().await?;
    if header.as_deref() != Some(HEADER_LINE) {
        return Err(CoreError::merge_validation("merged file is missing its expected header"));
    }

    let mut out = Vec::new();
    while let Some(line) = lines.next_line().await? {
        if let Some(triple) = crate::staging::parse_line(&line)? {
            out.push(triple);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt as _;

    async fn write_file(path: &Path, content: &str) {
        let mut f = fs::File::create(path).await.unwrap();
        f.write_all(content.as_bytes()).await.unwrap();
    }

    #[tokio::test]
    async fn merges_staging_files_behind_header_in_directory_order() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("a_feed.staging"), "1|10|{\"type\":\"denylist\"}\n").await;
        write_file(&dir.path().join("b_feed.staging"), "20|30|{\"type\":\"denylist\"}\n").await;

        let merged_path = dir.path().join("merged.csv");
        merge(dir.path(), &merged_path).await.unwrap();

        let content = fs::read_to_string(&merged_path).await.unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some(HEADER_LINE));
        assert_eq!(lines.next(), Some("1|10|{\"type\":\"denylist\"}"));
        assert_eq!(lines.next(), Some("20|30|{\"type\":\"denylist\"}"));
    }

    #[tokio::test]
    async fn skips_hidden_files() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join(".DS_Store"), "garbage\n").await;
        write_file(&dir.path().join("a_feed.staging"), "1|10|{\"type\":\"denylist\"}\n").await;

        let merged_path = dir.path().join("merged.csv");
        merge(dir.path(), &merged_path).await.unwrap();

        let content = fs::read_to_string(&merged_path).await.unwrap();
        assert!(!content.contains("garbage"));
    }

    #[tokio::test]
    async fn read_merged_skips_header_and_parses_remaining_lines() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("a_feed.staging"), "1|10|{\"type\":\"denylist\",\"source\":\"x\"}\n").await;

        let merged_path = dir.path().join("merged.csv");
        merge(dir.path(), &merged_path).await.unwrap();

        let triples = read_merged(&merged_path).await.unwrap();
        assert_eq!(triples.len(), 1);
        assert_eq!(triples[0], (1, 10, {
            let v: serde_json::Value = serde_json::json!({"type":"denylist","source":"x"});
            v.as_object().unwrap().clone()
        }));
    }

    #[tokio::test]
    async fn backs_up_previous_merged_file_before_replacing() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("a_feed.staging"), "1|10|{\"type\":\"denylist\"}\n").await;

        let merged_path = dir.path().join("merged.csv");
        write_file(&merged_path, "start_int|end_int|list\nold data here\n").await;

        merge(dir.path(), &merged_path).await.unwrap();

        let backup_path = merged_path.with_extension("csv.backup");
        assert!(fs::metadata(&backup_path).await.is_ok());
    }

    #[tokio::test]
    async fn rejects_empty_staging_directory() {
        let dir = tempfile::tempdir().unwrap();
        let merged_path = dir.path().join("merged.csv");
        assert!(merge(dir.path(), &merged_path).await.is_err());
    }
}
