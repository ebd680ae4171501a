//! A plugin with no network dependency: writes a fixed set of `(cidr, tag)`
//! pairs supplied at construction time. Used by local operators who want to
//! seed the index with a hand-curated allowlist, and by integration tests
//! that need a deterministic feed without a live HTTP fixture.

use async_trait::async_trait;
use std::path::PathBuf;

use crate::error::Result;
use crate::ip::cidr_to_range;
use crate::staging::StagingWriter;
use crate::tag::Tag;

use super::{default_validate, FeedPlugin, PluginMeta};

pub struct StaticListPlugin {
    name: String,
    abort_on_fail: bool,
    entries: Vec<(String, Tag)>,
}

impl StaticListPlugin {
    pub fn new(name: impl Into<String>, abort_on_fail: bool, entries: Vec<(String, Tag)>) -> Self {
        Self {
            name: name.into(),
            abort_on_fail,
            entries,
        }
    }
}

#[async_trait]
impl FeedPlugin for StaticListPlugin {
    fn meta(&self) -> PluginMeta {
        PluginMeta {
            name: self.name.clone(),
            version: "1.0",
            description: "locally configured static list",
            abort_on_fail: self.abort_on_fail,
        }
    }

    async fn load(&self, staging_path: &PathBuf) -> Result<()> {
        let mut writer = StagingWriter::create(staging_path).await?;
        for (cidr, tag) in &self.entries {
            if let Some((start, end)) = cidr_to_range(cidr)? {
                writer.write_range(start, end, tag).await?;
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
    use serde_json::json;

    #[tokio::test]
    async fn writes_each_configured_entry_as_a_staging_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("static.staging");
        let tag: Tag = json!({"type": "allowlist", "source": "ops_team", "name": "office"})
            .as_object()
            .unwrap()
            .clone();
        let plugin = StaticListPlugin::new("ops_allowlist", true, vec![("203.0.113.0/24".to_string(), tag)]);
        plugin.load(&path).await.unwrap();
        plugin.validate(&path).await.unwrap();

        let lines = crate::staging::read_staging_file(&path).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].2["name"], "office");
    }
}
