//! The read path: `Lookup(ip) -> Tags | NotFound | Invalid` (spec §4.E),
//! plus a supplemented concurrent `lookup_batch` operation (spec §6's batch
//! lookup contract).

use futures::future::join_all;
use serde_json::Value;
use tokio::sync::Semaphore;

use crate::cache::{self, CacheHit};
use crate::context::Context;
use crate::error::{CoreError, Result};
use crate::ip::ip_to_int;
use crate::store::IntervalStore;
use crate::tag::IntervalRecord;

/// Maximum number of concurrent index/cache round trips a single
/// `lookup_batch` call will issue, bounding fan-out against the store.
const BATCH_CONCURRENCY: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    Found(Value),
    NotFound,
}

/// Looks up a single IP. `include_external_dnsbl` additionally merges a
/// DNSBL hit into the payload's `list` array before caching.
pub async fn lookup(ctx: &Context, ip_string: &str, include_external_dnsbl: bool) -> Result<LookupOutcome> {
    let q = ip_to_int(ip_string).map_err(|_| CoreError::invalid_input(format!("not a valid IPv4 address: {ip_string}")))?;

    if let Some(hit) = cache::get(ctx.store.as_ref(), &ctx.config, ip_string, include_external_dnsbl).await {
        return Ok(match hit {
            CacheHit::Found(v) => LookupOutcome::Found(v),
            CacheHit::NotFound => LookupOutcome::NotFound,
        });
    }

    let outcome = resolve(ctx, ip_string, q, include_external_dnsbl).await?;

    let cached_value = match &outcome {
        LookupOutcome::Found(v) => Some(v),
        LookupOutcome::NotFound => None,
    };
    let _ = cache::put(ctx.store.as_ref(), &ctx.config, ip_string, include_external_dnsbl, cached_value).await;

    Ok(outcome)
}

async fn resolve(ctx: &Context, ip_string: &str, q: u32, include_external_dnsbl: bool) -> Result<LookupOutcome> {
    let live_key = ctx.config.live_key();
    let member = ctx.store.query_ge(&live_key, q as u64).await?;

    let mut payload = match member {
        Some(member) => match IntervalRecord::from_member(&member) {
            Some(record) if record.contains(q) => serde_json::to_value(&record.payload)?,
            _ => return Ok(LookupOutcome::NotFound),
        },
        None => return Ok(LookupOutcome::NotFound),
    };

    if include_external_dnsbl && ctx.config.dnsbl.enabled {
        if let Ok(true) = crate::dnsbl::lookup(ip_string, &ctx.config.dnsbl.provider).await {
            merge_dnsbl_tag(&mut payload, &ctx.config.dnsbl.provider);
        }
    }

    Ok(LookupOutcome::Found(payload))
}

fn merge_dnsbl_tag(payload: &mut Value, provider: &str) {
    let Some(obj) = payload.as_object_mut() else { return };
    let entry = obj.entry("list").or_insert_with(|| Value::Array(Vec::new()));
    if let Value::Array(list) = entry {
        list.push(serde_json::json!({"type": "dnsbl", "source": provider}));
    }
}

/// Looks up many IPs concurrently, bounded by [`BATCH_CONCURRENCY`], and
/// returns a mapping from each input IP to its payload (or `null` for
/// NotFound/Invalid entries, matching spec §6's batch contract).
pub async fn lookup_batch(ctx: &Context, ips: &[String], include_external_dnsbl: bool) -> Vec<(String, Value)> {
    let semaphore = std::sync::Arc::new(Semaphore::new(BATCH_CONCURRENCY));

    let futures = ips.iter().cloned().map(|ip| {
        let semaphore = semaphore.clone();
        async move {
            let _permit = semaphore.acquire().await.expect("semaphore not closed");
            let result = lookup(ctx, &ip, include_external_dnsbl).await;
            let value = match result {
                Ok(LookupOutcome::Found(v)) => v,
                Ok(LookupOutcome::NotFound) | Err(_) => Value::Null,
            };
            (ip, value)
        }
    });

    join_all(futures).await
}
