//! Health surface data types (spec §6). Not an HTTP handler — just the
//! shape a hosting surface would serialize; assembling it only requires
//! read access to the store the coordinator and lookup engine already use.

use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::coordinator::{self, UpdateStatus};
use crate::store::{IntervalStore, KeyValueStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateHealth {
    pub in_progress: bool,
    pub lock_stale: bool,
    pub status: Option<UpdateStatus>,
    pub last_update: Option<u64>,
    pub data_size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: Status,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub index_ready: bool,
    pub update: UpdateHealth,
}

/// Assembles the health report from the live key's existence/cardinality
/// and the coordinator's last-published status, per spec §6's shape.
pub async fn report(ctx: &Context) -> HealthReport {
    let live_key = ctx.config.live_key();
    let status_key = ctx.config.status_key();

    let index_ready = ctx.store.exists(&live_key).await.unwrap_or(false);
    let data_size = ctx.store.cardinality(&live_key).await.unwrap_or(0);
    let lock_stale = coordinator::lock_is_stale(ctx).await.unwrap_or(false);

    let status: Option<UpdateStatus> = ctx
        .store
        .get(&status_key)
        .await
        .ok()
        .flatten()
        .and_then(|raw| serde_json::from_str(&raw).ok());

    let in_progress = matches!(status, Some(UpdateStatus::InProgress { .. }));
    let last_update = match &status {
        Some(UpdateStatus::Completed { at_unix_secs }) => Some(*at_unix_secs),
        _ => None,
    };

    let overall = if !index_ready {
        Status::Unhealthy
    } else if matches!(status, Some(UpdateStatus::Failed { .. })) {
        Status::Degraded
    } else {
        Status::Healthy
    };

    HealthReport {
        status: overall,
        timestamp: chrono::Utc::now(),
        index_ready,
        update: UpdateHealth {
            in_progress,
            lock_stale,
            status,
            last_update,
            data_size,
        },
    }
}
