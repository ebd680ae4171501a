//! MaxMind GeoLite2 ASN feed: download the zip archive, extract the
//! blocks-IPv4 CSV, and tag each network with its owning organization.

use async_trait::async_trait;
use std::io::{Cursor, Read};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{CoreError, Result};
use crate::ip::cidr_to_range;
use crate::retry::retry_with_backoff;
use crate::staging::StagingWriter;
use crate::tag::Tag;

use super::{default_validate, FeedPlugin, PluginMeta};

pub struct MaxmindAsnPlugin {
    url: String,
    abort_on_fail: bool,
    fetch_timeout: Duration,
    client: reqwest::Client,
}

impl MaxmindAsnPlugin {
    pub fn new(url: impl Into<String>, abort_on_fail: bool, fetch_timeout_secs: u64) -> Self {
        Self {
            url: url.into(),
            abort_on_fail,
            fetch_timeout: Duration::from_secs(fetch_timeout_secs),
            client: reqwest::Client::new(),
        }
    }

    async fn fetch_zip(&self) -> Result<Vec<u8>> {
        let url = self.url.clone();
        let client = self.client.clone();
        let timeout = self.fetch_timeout;
        retry_with_backoff(3, 1_000, 10_000, move || {
            let url = url.clone();
            let client = client.clone();
            async move {
                let bytes = client.get(&url).timeout(timeout).send().await?.error_for_status()?.bytes().await?;
                Ok::<Vec<u8>, reqwest::Error>(bytes.to_vec())
            }
        })
        .await
        .map_err(|e| CoreError::FeedFetchFailed {
            feed: "maxmind_lite".to_string(),
            source: e,
        })
    }

    fn extract_blocks_csv(zip_bytes: &[u8]) -> Result<String> {
        let mut archive = zip::ZipArchive::new(Cursor::new(zip_bytes))?;
        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.name().ends_with("Blocks-IPv4.csv") {
                let mut contents = String::new();
                file.read_to_string(&mut contents)?;
                return Ok(contents);
            }
        }
        Err(CoreError::merge_validation(
            "maxmind archive did not contain a Blocks-IPv4.csv entry",
        ))
    }

    /// Parses the blocks CSV into `(network, organization)` pairs, reading
    /// columns by header name since `GeoLite2-ASN-Blocks-IPv4.csv` is laid
    /// out as `network, autonomous_system_number, autonomous_system_organization`
    /// — the organization is the third column, not the second.
    fn parse_blocks_csv(csv_text: &str) -> Result<Vec<(String, String)>> {
        let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(csv_text.as_bytes());
        let headers = rdr.headers()?.clone();
        let network_col = headers.iter().position(|h| h == "network").unwrap_or(0);
        let org_col = headers
            .iter()
            .position(|h| h == "autonomous_system_organization")
            .unwrap_or(2);

        let mut rows = Vec::new();
        for result in rdr.records() {
            let record = match result {
                Ok(r) => r,
                Err(_) => continue, // per-line parse failure, skip
            };
            let Some(network) = record.get(network_col) else { continue };
            let Some(org) = record.get(org_col) else { continue };
            if org.is_empty() {
                continue;
            }
            rows.push((network.to_string(), org.to_string()));
        }
        Ok(rows)
    }
}

#[async_trait]
impl FeedPlugin for MaxmindAsnPlugin {
    fn meta(&self) -> PluginMeta {
        PluginMeta {
            name: "maxmind_lite".to_string(),
            version: "1.0",
            description: "MaxMind GeoLite2 ASN blocks",
            abort_on_fail: self.abort_on_fail,
        }
    }

    async fn load(&self, staging_path: &PathBuf) -> Result<()> {
        let zip_bytes = self.fetch_zip().await?;
        let csv_text = Self::extract_blocks_csv(&zip_bytes)?;
        let rows = Self::parse_blocks_csv(&csv_text)?;

        let mut writer = StagingWriter::create(staging_path).await?;
        for (network, org) in rows {
            match cidr_to_range(&network) {
                Ok(Some((start, end))) => {
                    let mut tag: Tag = serde_json::Map::new();
                    tag.insert("type".into(), "asn".into());
                    tag.insert("name".into(), org.into());
                    tag.insert("source".into(), "maxmind_lite".into());
                    writer.write_range(start, end, &tag).await?;
                }
                Ok(None) => continue,
                Err(_) => continue,
            }
        }

        writer.flush().await?;
        Ok(())
    }

    async fn validate(&self, staging_path: &PathBuf) -> Result<()> {
        default_validate(staging_path).await
    }
}
