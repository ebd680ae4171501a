//! Simple line-list feeds (Cloudflare, Spamhaus DROP): one CIDR or bare IP
//! per line, `#`/`;` comment lines and trailing inline comments stripped.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::Result;
use crate::ip::cidr_to_range;
use crate::retry::retry_with_backoff;
use crate::staging::StagingWriter;
use crate::tag::Tag;

use super::{default_validate, FeedPlugin, PluginMeta};

static CIDR_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\d./]+$").unwrap());

pub struct SimpleListPlugin {
    name: String,
    url: String,
    abort_on_fail: bool,
    fetch_timeout: Duration,
    client: reqwest::Client,
}

impl SimpleListPlugin {
    pub fn new(name: impl Into<String>, url: impl Into<String>, abort_on_fail: bool, fetch_timeout_secs: u64) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            abort_on_fail,
            fetch_timeout: Duration::from_secs(fetch_timeout_secs),
            client: reqwest::Client::new(),
        }
    }

    fn strip_comment(line: &str) -> &str {
        match line.split_once(char::is_whitespace) {
            Some((head, _)) if !head.is_empty() => head,
            _ => line.trim(),
        }
    }

    async fn fetch_body(&self) -> Result<String> {
        let url = self.url.clone();
        let client = self.client.clone();
        let timeout = self.fetch_timeout;
        retry_with_backoff(3, 1_000, 10_000, move || {
            let url = url.clone();
            let client = client.clone();
            async move {
                client
                    .get(&url)
                    .timeout(timeout)
                    .send()
                    .await?
                    .error_for_status()?
                    .text()
                    .await
            }
        })
        .await
        .map_err(|e| crate::error::CoreError::FeedFetchFailed {
            feed: self.name.clone(),
            source: e,
        })
    }
}

#[async_trait]
impl FeedPlugin for SimpleListPlugin {
    fn meta(&self) -> PluginMeta {
        PluginMeta {
            name: self.name.clone(),
            version: "1.0",
            description: "simple CIDR/IP line list",
            abort_on_fail: self.abort_on_fail,
        }
    }

    async fn load(&self, staging_path: &PathBuf) -> Result<()> {
        let body = self.fetch_body().await?;
        let mut writer = StagingWriter::create(staging_path).await?;

        for raw_line in body.lines() {
            let trimmed = raw_line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }
            let candidate = Self::strip_comment(trimmed);
            if !CIDR_LINE.is_match(candidate) {
                continue;
            }
            match cidr_to_range(candidate) {
                Ok(Some((start, end))) => {
                    let mut tag: Tag = serde_json::Map::new();
                    tag.insert("type".into(), "denylist".into());
                    tag.insert("source".into(), self.name.clone().into());
                    writer.write_range(start, end, &tag).await?;
                }
                Ok(None) => continue, // IPv6, silently dropped
                Err(_) => continue,   // malformed line, skip per-item
            }
        }

        writer.flush().await?;
        Ok(())
    }

    async fn validate(&self, staging_path: &PathBuf) -> Result<()> {
        default_validate(staging_path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_inline_comment_after_whitespace() {
        assert_eq!(SimpleListPlugin::strip_comment("10.0.0.0/24 # corp range"), "10.0.0.0/24");
        assert_eq!(SimpleListPlugin::strip_comment("1.1.1.1"), "1.1.1.1");
    }

    #[test]
    fn cidr_line_regex_rejects_commentary() {
        assert!(CIDR_LINE.is_match("10.0.0.0/24"));
        assert!(CIDR_LINE.is_match("1.1.1.1"));
        assert!(!CIDR_LINE.is_match("not a cidr at all"));
    }
}
