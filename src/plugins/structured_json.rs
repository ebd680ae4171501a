//! Structured JSON feeds (AWS, GCP, Google service ranges, Fastly): iterate
//! the provider's prefix array, skip non-IPv4 entries, and preserve useful
//! metadata into the tag.

use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::Result;
use crate::ip::cidr_to_range;
use crate::retry::retry_with_backoff;
use crate::staging::StagingWriter;
use crate::tag::Tag;

use super::{default_validate, FeedPlugin, PluginMeta};

/// Per-provider extraction logic shared by the generic JSON-feed plumbing
/// below: given one prefix entry from the provider's document, produce the
/// CIDR string and the tag fields to preserve, or `None` to skip it.
pub trait JsonFeed: Send + Sync {
    /// JSON-pointer-free path to the array of prefix entries, e.g. `"prefixes"`.
    fn entries(&self, doc: &Value) -> Vec<Value>;

    /// Extracts `(cidr, tag)` from one entry, or `None` to skip a
    /// non-IPv4/malformed entry.
    fn extract(&self, entry: &Value) -> Option<(String, Tag)>;
}

async fn fetch_json(client: &reqwest::Client, url: &str, timeout: Duration, feed_name: &str) -> Result<Value> {
    let url = url.to_string();
    let client = client.clone();
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
                .json::<Value>()
                .await
        }
    })
    .await
    .map_err(|e| crate::error::CoreError::FeedFetchFailed {
        feed: feed_name.to_string(),
        source: e,
    })
}

async fn load_via<F: JsonFeed>(
    feed: &F,
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
    feed_name: &str,
    staging_path: &PathBuf,
) -> Result<()> {
    let doc = fetch_json(client, url, timeout, feed_name).await?;
    let mut writer = StagingWriter::create(staging_path).await?;

    for entry in feed.entries(&doc) {
        let Some((cidr, tag)) = feed.extract(&entry) else {
            continue;
        };
        match cidr_to_range(&cidr) {
            Ok(Some((start, end))) => writer.write_range(start, end, &tag).await?,
            Ok(None) => continue,
            Err(_) => continue,
        }
    }

    writer.flush().await?;
    Ok(())
}

fn base_tag(source: &str) -> Tag {
    let mut tag = serde_json::Map::new();
    tag.insert("type".into(), "cloud".into());
    tag.insert("source".into(), source.into());
    tag
}

macro_rules! json_feed_plugin {
    ($struct_name:ident, $source:literal, $description:literal) => {
        pub struct $struct_name {
            url: String,
            abort_on_fail: bool,
            fetch_timeout: Duration,
            client: reqwest::Client,
        }

        impl $struct_name {
            pub fn new(url: impl Into<String>, abort_on_fail: bool, fetch_timeout_secs: u64) -> Self {
                Self {
                    url: url.into(),
                    abort_on_fail,
                    fetch_timeout: Duration::from_secs(fetch_timeout_secs),
                    client: reqwest::Client::new(),
                }
            }
        }

        #[async_trait]
        impl FeedPlugin for $struct_name {
            fn meta(&self) -> PluginMeta {
                PluginMeta {
                    name: $source.to_string(),
                    version: "1.0",
                    description: $description,
                    abort_on_fail: self.abort_on_fail,
                }
            }

            async fn load(&self, staging_path: &PathBuf) -> Result<()> {
                load_via(self, &self.client, &self.url, self.fetch_timeout, $source, staging_path).await
            }

            async fn validate(&self, staging_path: &PathBuf) -> Result<()> {
                default_validate(staging_path).await
            }
        }
    };
}

json_feed_plugin!(AwsIpRangesPlugin, "aws", "AWS published IP ranges");
json_feed_plugin!(GcpIpRangesPlugin, "gcp", "GCP published IP ranges");
json_feed_plugin!(GoogleServiceRangesPlugin, "google", "Google service IP ranges");
json_feed_plugin!(FastlyIpRangesPlugin, "fastly", "Fastly published IP ranges");

impl JsonFeed for AwsIpRangesPlugin {
    fn entries(&self, doc: &Value) -> Vec<Value> {
        doc.get("prefixes").and_then(Value::as_array).cloned().unwrap_or_default()
    }

    fn extract(&self, entry: &Value) -> Option<(String, Tag)> {
        let cidr = entry.get("ip_prefix")?.as_str()?.to_string();
        let mut tag = base_tag("aws");
        if let Some(service) = entry.get("service").and_then(Value::as_str) {
            tag.insert("service".into(), service.into());
        }
        if let Some(region) = entry.get("region").and_then(Value::as_str) {
            tag.insert("region".into(), region.into());
        }
        Some((cidr, tag))
    }
}

impl JsonFeed for GcpIpRangesPlugin {
    fn entries(&self, doc: &Value) -> Vec<Value> {
        doc.get("prefixes").and_then(Value::as_array).cloned().unwrap_or_default()
    }

    fn extract(&self, entry: &Value) -> Option<(String, Tag)> {
        let cidr = entry.get("ipv4Prefix")?.as_str()?.to_string();
        let mut tag = base_tag("gcp");
        if let Some(service) = entry.get("service").and_then(Value::as_str) {
            tag.insert("service".into(), service.into());
        }
        if let Some(scope) = entry.get("scope").and_then(Value::as_str) {
            tag.insert("scope".into(), scope.into());
        }
        Some((cidr, tag))
    }
}

impl JsonFeed for GoogleServiceRangesPlugin {
    fn entries(&self, doc: &Value) -> Vec<Value> {
        doc.get("prefixes").and_then(Value::as_array).cloned().unwrap_or_default()
    }

    fn extract(&self, entry: &Value) -> Option<(String, Tag)> {
        let cidr = entry.get("ipv4Prefix")?.as_str()?.to_string();
        let tag = base_tag("google");
        Some((cidr, tag))
    }
}

impl JsonFeed for FastlyIpRangesPlugin {
    fn entries(&self, doc: &Value) -> Vec<Value> {
        doc.get("addresses").and_then(Value::as_array).cloned().unwrap_or_default()
    }

    fn extract(&self, entry: &Value) -> Option<(String, Tag)> {
        let cidr = entry.as_str()?.to_string();
        let tag = base_tag("fastly");
        Some((cidr, tag))
    }
}
