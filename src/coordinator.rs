//! Update coordinator: runs the A (plugins) -> B (merge) -> C (flatten+load)
//! pipeline under a distributed single-writer lock, with stale-lock
//! detection, status reporting, and cron-based scheduling (spec §4.F).

use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::Utc;
use chrono_tz::Tz;
use cron::Schedule;
use sysinfo::{Pid, System};
use tokio::time::timeout;
use uuid::Uuid;

use crate::context::Context;
use crate::error::{CoreError, Result};
use crate::flattener::flatten;
use crate::ip::ip_to_int;
use crate::merger;
use crate::plugins::FeedPlugin;
use crate::store::{IntervalStore, KeyValueStore};
use crate::tag::IntervalRecord;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum UpdateStatus {
    InProgress { stage: String },
    Completed { at_unix_secs: u64 },
    Failed { error: String },
    Skipped { reason: String },
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct UpdateReport {
    pub status: UpdateStatus,
    pub feeds_loaded: usize,
    pub feeds_failed: Vec<String>,
    pub records_published: u64,
}

struct LockValue {
    pid: u32,
    host: String,
    token: String,
}

impl LockValue {
    fn new() -> Self {
        let token = format!(
            "{}-{}-{}",
            std::process::id(),
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis(),
            Uuid::new_v4()
        );
        Self {
            pid: std::process::id(),
            host: hostname::get().unwrap_or_default().to_string_lossy().into_owned(),
            token,
        }
    }

    fn encode(&self) -> String {
        format!("{}@{}|{}", self.pid, self.host, self.token)
    }

    fn parse(raw: &str) -> Option<(u32, String, String)> {
        let (identity, token) = raw.split_once('|')?;
        let (pid_str, host) = identity.split_once('@')?;
        let pid = pid_str.parse().ok()?;
        Some((pid, host.to_string(), token.to_string()))
    }
}

fn local_hostname() -> String {
    hostname::get().unwrap_or_default().to_string_lossy().into_owned()
}

fn pid_is_alive(pid: u32) -> bool {
    let mut system = System::new();
    system.refresh_processes();
    system.process(Pid::from_u32(pid)).is_some()
}

/// Attempts to acquire the update lock, clearing a stale same-host lock
/// first if one is found. Returns `Ok(Some(lock))` on success, `Ok(None)` if
/// another live holder has it (skip this cycle).
async fn acquire_lock(ctx: &Context) -> Result<Option<LockValue>> {
    let lock_key = ctx.config.lock_key();
    let ttl_ms = ctx.config.update.lock_ttl_secs * 1000;
    let candidate = LockValue::new();

    if ctx.store.set_if_absent(&lock_key, &candidate.encode(), ttl_ms).await? {
        return Ok(Some(candidate));
    }

    // Lock is held; check whether its holder is a dead process on this host.
    if let Some(existing) = ctx.store.get(&lock_key).await? {
        if let Some((pid, host, _token)) = LockValue::parse(&existing) {
            if host == local_hostname() && !pid_is_alive(pid) {
                if ctx.store.delete_if_eq(&lock_key, &existing).await? {
                    if ctx.store.set_if_absent(&lock_key, &candidate.encode(), ttl_ms).await? {
                        return Ok(Some(candidate));
                    }
                }
            }
        }
    }

    Ok(None)
}

/// Read-only check for the health surface: is the current lock holder (if
/// any) a dead process on this host? Unlike [`acquire_lock`] this never
/// mutates the lock — it only reports what a future acquisition attempt
/// would find.
pub async fn lock_is_stale(ctx: &Context) -> Result<bool> {
    let lock_key = ctx.config.lock_key();
    let Some(existing) = ctx.store.get(&lock_key).await? else {
        return Ok(false);
    };
    let Some((pid, host, _token)) = LockValue::parse(&existing) else {
        return Ok(false);
    };
    Ok(host == local_hostname() && !pid_is_alive(pid))
}

async fn release_lock(ctx: &Context, lock: &LockValue) -> Result<()> {
    let lock_key = ctx.config.lock_key();
    let _ = ctx.store.delete_if_eq(&lock_key, &lock.encode()).await?;
    Ok(())
}

async fn write_status(ctx: &Context, status: &UpdateStatus) {
    let status_key = ctx.config.status_key();
    if let Ok(serialized) = serde_json::to_string(status) {
        let _ = ctx.store.set_ex(&status_key, &serialized, ctx.config.update.lock_ttl_secs).await;
    }
}

/// Runs one full update cycle: acquire lock, run A->B->C, publish status,
/// release lock. Returns `Skipped` rather than an error when the lock is
/// held by a live process.
pub async fn run_update(ctx: &Context, plugins: &[Box<dyn FeedPlugin>]) -> Result<UpdateReport> {
    let Some(lock) = acquire_lock(ctx).await? else {
        let report = UpdateReport {
            status: UpdateStatus::Skipped { reason: "lock held by another process".to_string() },
            feeds_loaded: 0,
            feeds_failed: Vec::new(),
            records_published: 0,
        };
        write_status(ctx, &report.status).await;
        return Ok(report);
    };

    let result = timeout(Duration::from_secs(ctx.config.update.timeout_secs), run_pipeline(ctx, plugins)).await;

    let report = match result {
        Ok(Ok(report)) => report,
        Ok(Err(e)) => {
            cleanup_after_failure(ctx).await;
            UpdateReport {
                status: UpdateStatus::Failed { error: e.to_string() },
                feeds_loaded: 0,
                feeds_failed: Vec::new(),
                records_published: 0,
            }
        }
        Err(_) => {
            cleanup_after_failure(ctx).await;
            UpdateReport {
                status: UpdateStatus::Failed { error: "update timed out".to_string() },
                feeds_loaded: 0,
                feeds_failed: Vec::new(),
                records_published: 0,
            }
        }
    };

    write_status(ctx, &report.status).await;
    release_lock(ctx, &lock).await?;
    Ok(report)
}

async fn cleanup_after_failure(ctx: &Context) {
    let temp_key = ctx.config.temp_key();
    let _ = IntervalStore::delete(ctx.store.as_ref(), &temp_key).await;
    let _ = tokio::fs::remove_file(&ctx.config.staging.merged_csv_path.with_extension("tmp")).await;
}

async fn run_pipeline(ctx: &Context, plugins: &[Box<dyn FeedPlugin>]) -> Result<UpdateReport> {
    write_status(ctx, &UpdateStatus::InProgress { stage: "fetch".to_string() }).await;
    tokio::fs::create_dir_all(&ctx.config.staging.dir).await?;

    let mut loaded = 0usize;
    let mut failed = Vec::new();

    for plugin in plugins {
        let meta = plugin.meta();
        let staging_path = ctx.config.staging.dir.join(format!("{}.staging", meta.name));

        let outcome = async {
            plugin.load(&staging_path).await?;
            plugin.validate(&staging_path).await
        }
        .await;

        match outcome {
            Ok(()) => loaded += 1,
            Err(e) if meta.abort_on_fail => return Err(e),
            Err(e) => {
                tracing::warn!(feed = %meta.name, error = %e, "feed plugin failed, omitting from this cycle");
                failed.push(meta.name.clone());
                let _ = tokio::fs::remove_file(&staging_path).await;
            }
        }
    }

    write_status(ctx, &UpdateStatus::InProgress { stage: "merge".to_string() }).await;
    merger::merge(&ctx.config.staging.dir, &ctx.config.staging.merged_csv_path).await?;

    write_status(ctx, &UpdateStatus::InProgress { stage: "flatten".to_string() }).await;
    let intervals = merger::read_merged(&ctx.config.staging.merged_csv_path).await?;
    let records = flatten(intervals);

    let temp_key = ctx.config.temp_key();
    let live_key = ctx.config.live_key();
    let _ = IntervalStore::delete(ctx.store.as_ref(), &temp_key).await;

    let batch_size = ctx.config.update.batch_size;
    for chunk in records.chunks(batch_size.max(1)) {
        let batch: Vec<(String, u64)> = chunk.iter().map(|r: &IntervalRecord| (r.to_member(), r.end as u64)).collect();
        ctx.store.insert_batch(&temp_key, &batch).await?;
    }

    let temp_card = ctx.store.cardinality(&temp_key).await?;
    if temp_card == 0 && !records.is_empty() {
        return Err(CoreError::flattener_integrity("temp key has zero cardinality after a non-empty load"));
    }

    write_status(ctx, &UpdateStatus::InProgress { stage: "swap".to_string() }).await;
    ctx.store.rename(&temp_key, &live_key).await?;

    let live_card = ctx.store.cardinality(&live_key).await?;
    if live_card != temp_card {
        return Err(CoreError::flattener_integrity(format!(
            "post-rename cardinality mismatch: live={live_card} temp={temp_card}"
        )));
    }

    if ctx.config.cache.invalidate_on_swap {
        tracing::info!("invalidate_on_swap is set but the key/value store has no key enumeration; relying on TTL");
    }

    Ok(UpdateReport {
        status: UpdateStatus::Completed {
            at_unix_secs: SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs(),
        },
        feeds_loaded: loaded,
        feeds_failed: failed,
        records_published: live_card,
    })
}

/// Runs `run_update` once immediately, then on every firing of `cron_expr`
/// (interpreted in `timezone`) until the process is stopped. A trigger that
/// fires while an update is already running is simply skipped by
/// `run_update`'s own lock check — triggers are never queued.
pub async fn schedule_loop(ctx: Context, plugins: Vec<Box<dyn FeedPlugin>>, cron_expr: &str, timezone: &str) -> Result<()> {
    let tz: Tz = timezone.parse().map_err(|_| CoreError::Schedule(format!("unknown timezone: {timezone}")))?;
    let schedule = Schedule::from_str(cron_expr).map_err(|e| CoreError::Schedule(format!("invalid cron expression: {e}")))?;

    let report = run_update(&ctx, &plugins).await?;
    tracing::info!(?report.status, "startup update cycle finished");

    loop {
        let now = Utc::now().with_timezone(&tz);
        let Some(next) = schedule.upcoming(tz).find(|t| *t > now) else {
            tracing::warn!("cron schedule has no future firing, stopping scheduler loop");
            return Ok(());
        };
        let until_next = (next - now).to_std().unwrap_or(Duration::from_secs(1));
        tokio::time::sleep(until_next).await;

        let report = run_update(&ctx, &plugins).await?;
        tracing::info!(?report.status, "scheduled update cycle finished");
    }
}

/// Parses a bare IP and validates it before a lookup/update-adjacent
/// operation needs it; kept here so the coordinator and CLI share one
/// validation path for status reporting convenience functions.
pub fn validate_ip(ip: &str) -> Result<u32> {
    ip_to_int(ip)
}
