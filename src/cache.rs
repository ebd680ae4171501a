//! Per-IP result cache in the same key/value namespace as the lock and
//! status keys (spec §4.G): `<prefix>cache:<ip>[:dronebl]`, valued by either
//! `"null"` (NotFound) or the serialized payload, TTL 48h by default.

use serde_json::Value;

use crate::config::Config;
use crate::error::Result;
use crate::store::KeyValueStore;

const NULL_MARKER: &str = "null";

pub enum CacheHit {
    Found(Value),
    NotFound,
}

/// Looks up a cached result. A corrupted (unparseable) entry is treated as
/// a miss rather than propagated as an error, per spec's stated policy.
pub async fn get(store: &dyn KeyValueStore, config: &Config, ip: &str, dnsbl: bool) -> Option<CacheHit> {
    if !config.cache.enabled {
        return None;
    }
    let key = config.cache_key(ip, dnsbl);
    let raw = store.get(&key).await.ok().flatten()?;
    if raw == NULL_MARKER {
        return Some(CacheHit::NotFound);
    }
    match serde_json::from_str(&raw) {
        Ok(value) => Some(CacheHit::Found(value)),
        Err(_) => None,
    }
}

/// Writes a result (or the null marker) into the cache. Errors are swallowed
/// per spec §4.E step 7 — a cache write failure must never fail a lookup.
pub async fn put(store: &dyn KeyValueStore, config: &Config, ip: &str, dnsbl: bool, value: Option<&Value>) -> Result<()> {
    if !config.cache.enabled {
        return Ok(());
    }
    let key = config.cache_key(ip, dnsbl);
    let serialized = match value {
        Some(v) => serde_json::to_string(v)?,
        None => NULL_MARKER.to_string(),
    };
    let _ = store.set_ex(&key, &serialized, config.cache.ttl_secs).await;
    Ok(())
}

/// Best-effort invalidation hook for [`crate::config::CacheConfig::invalidate_on_swap`].
/// The cache has no enumerable key listing in the `KeyValueStore` contract,
/// so this deletes the one entry the caller names; broader invalidation is
/// an operational concern (e.g. a keyspace-scoped flush) left to the store
/// deployment, not the core.
pub async fn invalidate(store: &dyn KeyValueStore, config: &Config, ip: &str, dnsbl: bool) -> Result<()> {
    let key = config.cache_key(ip, dnsbl);
    store.delete(&key).await
}
