//! In-memory `IntervalStore`/`KeyValueStore` implementation used by tests
//! and by operators who want to run the pipeline against a throwaway store.
//! Not the reference deployment (that's [`super::redis_store::RedisStore`]),
//! but implements the exact same contract so tests exercise real algorithm
//! behavior, not a mock.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::Result;
use crate::store::{Batch, IntervalStore, KeyValueStore};

#[derive(Default)]
struct SortedSet {
    // member -> score, kept alongside a sorted index for range queries.
    entries: Vec<(u64, String)>,
}

impl SortedSet {
    fn insert(&mut self, member: String, score: u64) {
        self.entries.retain(|(_, m)| m != &member);
        let pos = self.entries.partition_point(|(s, _)| *s < score);
        self.entries.insert(pos, (score, member));
    }

    fn query_ge(&self, q: u64) -> Option<String> {
        let pos = self.entries.partition_point(|(s, _)| *s < q);
        self.entries.get(pos).map(|(_, m)| m.clone())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    sets: Mutex<HashMap<String, SortedSet>>,
    kv: Mutex<HashMap<String, (String, Option<Instant>)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IntervalStore for MemoryStore {
    async fn insert_batch(&self, key: &str, batch: &Batch) -> Result<()> {
        let mut sets = self.sets.lock().unwrap();
        let set = sets.entry(key.to_string()).or_default();
        for (member, score) in batch {
            set.insert(member.clone(), *score);
        }
        Ok(())
    }

    async fn query_ge(&self, key: &str, q: u64) -> Result<Option<String>> {
        let sets = self.sets.lock().unwrap();
        Ok(sets.get(key).and_then(|s| s.query_ge(q)))
    }

    async fn rename(&self, src: &str, dest: &str) -> Result<()> {
        let mut sets = self.sets.lock().unwrap();
        let moved = sets.remove(src).unwrap_or_default();
        sets.insert(dest.to_string(), moved);
        Ok(())
    }

    async fn cardinality(&self, key: &str) -> Result<u64> {
        let sets = self.sets.lock().unwrap();
        Ok(sets.get(key).map(|s| s.entries.len() as u64).unwrap_or(0))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut sets = self.sets.lock().unwrap();
        sets.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let sets = self.sets.lock().unwrap();
        Ok(sets.contains_key(key))
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn set_if_absent(&self, key: &str, value: &str, ttl_ms: u64) -> Result<bool> {
        let mut kv = self.kv.lock().unwrap();
        self.evict_expired(&mut kv);
        if kv.contains_key(key) {
            return Ok(false);
        }
        let expires = Instant::now() + Duration::from_millis(ttl_ms);
        kv.insert(key.to_string(), (value.to_string(), Some(expires)));
        Ok(true)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut kv = self.kv.lock().unwrap();
        self.evict_expired(&mut kv);
        Ok(kv.get(key).map(|(v, _)| v.clone()))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let mut kv = self.kv.lock().unwrap();
        let expires = Instant::now() + Duration::from_secs(ttl_secs);
        kv.insert(key.to_string(), (value.to_string(), Some(expires)));
        Ok(())
    }

    async fn delete_if_eq(&self, key: &str, expected: &str) -> Result<bool> {
        let mut kv = self.kv.lock().unwrap();
        match kv.get(key) {
            Some((v, _)) if v == expected => {
                kv.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut kv = self.kv.lock().unwrap();
        kv.remove(key);
        Ok(())
    }
}

impl MemoryStore {
    fn evict_expired(&self, kv: &mut HashMap<String, (String, Option<Instant>)>) {
        let now = Instant::now();
        kv.retain(|_, (_, expiry)| expiry.map(|e| e > now).unwrap_or(true));
    }
}
