//! Feed plugins: each downloads one external source and writes a staged
//! canonical line stream (spec §4.A). Plugin capability is expressed as a
//! trait, not a base class — retry and metadata are free helpers a plugin
//! invokes, matching the REDESIGN FLAG away from the original's
//! single-inheritance polymorphism.

mod maxmind_asn;
mod simple_list;
mod static_list;
mod structured_json;

pub use maxmind_asn::MaxmindAsnPlugin;
pub use simple_list::SimpleListPlugin;
pub use static_list::StaticListPlugin;
pub use structured_json::{AwsIpRangesPlugin, FastlyIpRangesPlugin, GcpIpRangesPlugin, GoogleServiceRangesPlugin};

use async_trait::async_trait;
use std::path::PathBuf;

use crate::error::Result;
use crate::staging::StagingWriter;

/// Static description of a plugin, independent of any particular run.
#[derive(Debug, Clone)]
pub struct PluginMeta {
    pub name: String,
    pub version: &'static str,
    pub description: &'static str,
    pub abort_on_fail: bool,
}

/// A feed plugin fetches one external source and writes canonical
/// `start|end|tag_json` lines to its staging file. `load` does the fetch and
/// write; `validate` checks the result is non-empty and structurally
/// plausible before the merger consumes it.
#[async_trait]
pub trait FeedPlugin: Send + Sync {
    fn meta(&self) -> PluginMeta;

    /// Fetches the source and writes canonical lines to `staging_path`.
    async fn load(&self, staging_path: &PathBuf) -> Result<()>;

    /// Confirms the staged file is non-empty and its first few lines parse.
    async fn validate(&self, staging_path: &PathBuf) -> Result<()> {
        default_validate(staging_path).await
    }
}

/// Shared validation: the staging file must exist, be non-empty, and its
/// first ten non-blank lines must parse as canonical lines.
pub(crate) async fn default_validate(staging_path: &PathBuf) -> Result<()> {
    let lines = crate::staging::read_staging_file(staging_path).await?;
    if lines.is_empty() {
        return Err(crate::error::CoreError::merge_validation(format!(
            "staging file {} produced no valid records",
            staging_path.display()
        )));
    }
    Ok(())
}

/// Builds one plugin per enabled entry in [`crate::config::Config::feeds`],
/// dispatching on [`crate::config::FeedKind`].
pub fn build_plugins(config: &crate::config::Config) -> Vec<Box<dyn FeedPlugin>> {
    use crate::config::FeedKind;

    config
        .feeds
        .iter()
        .filter(|(_, f)| f.enabled)
        .map(|(name, f)| -> Box<dyn FeedPlugin> {
            match f.kind {
                FeedKind::SimpleList => Box::new(SimpleListPlugin::new(
                    name.clone(),
                    f.url.clone(),
                    f.abort_on_fail,
                    f.fetch_timeout_secs,
                )),
                FeedKind::AwsIpRanges => Box::new(AwsIpRangesPlugin::new(f.url.clone(), f.abort_on_fail, f.fetch_timeout_secs)),
                FeedKind::GcpIpRanges => Box::new(GcpIpRangesPlugin::new(f.url.clone(), f.abort_on_fail, f.fetch_timeout_secs)),
                FeedKind::GoogleServiceRanges => {
                    Box::new(GoogleServiceRangesPlugin::new(f.url.clone(), f.abort_on_fail, f.fetch_timeout_secs))
                }
                FeedKind::FastlyIpRanges => {
                    Box::new(FastlyIpRangesPlugin::new(f.url.clone(), f.abort_on_fail, f.fetch_timeout_secs))
                }
                FeedKind::MaxmindAsn => Box::new(MaxmindAsnPlugin::new(f.url.clone(), f.abort_on_fail, f.fetch_timeout_secs)),
            }
        })
        .collect()
}
