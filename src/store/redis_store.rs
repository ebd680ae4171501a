//! Redis-backed `IntervalStore`/`KeyValueStore`: the reference deployment's
//! sorted-set index and flat key/value cache+lock namespace, both living in
//! the same connection. Grounded on the connection-manager + Lua
//! compare-and-delete pattern the update coordinator already used for its
//! distributed lock.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::error::{CoreError, Result};
use crate::store::{Batch, IntervalStore, KeyValueStore};

const COMPARE_AND_DELETE_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end
"#;

#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(CoreError::Redis)?;
        let conn = client.get_tokio_connection_manager().await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl IntervalStore for RedisStore {
    async fn insert_batch(&self, key: &str, batch: &Batch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let items: Vec<(f64, &str)> = batch
            .iter()
            .map(|(member, score)| (*score as f64, member.as_str()))
            .collect();
        let _: () = conn.zadd_multiple(key, &items).await?;
        Ok(())
    }

    async fn query_ge(&self, key: &str, q: u64) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let result: Vec<String> = conn
            .zrangebyscore_limit(key, q as f64, f64::INFINITY, 0, 1)
            .await?;
        Ok(result.into_iter().next())
    }

    async fn rename(&self, src: &str, dest: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(src).await?;
        if !exists {
            return Err(CoreError::flattener_integrity(format!(
                "temp key {src} does not exist, refusing to rename over {dest}"
            )));
        }
        let _: () = conn.rename(src, dest).await?;
        Ok(())
    }

    async fn cardinality(&self, key: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        Ok(conn.zcard(key).await?)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        Ok(conn.exists(key).await?)
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn set_if_absent(&self, key: &str, value: &str, ttl_ms: u64) -> Result<bool> {
        let mut conn = self.conn.clone();
        let result: Option<String> = conn
            .set_options(
                key,
                value,
                redis::SetOptions::default()
                    .conditional_set(redis::ExistenceCheck::NX)
                    .with_expiration(redis::SetExpiry::PX(ttl_ms as usize)),
            )
            .await?;
        Ok(result.is_some())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await?)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(key, value, ttl_secs as usize).await?;
        Ok(())
    }

    async fn delete_if_eq(&self, key: &str, expected: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let script = redis::Script::new(COMPARE_AND_DELETE_SCRIPT);
        let deleted: i32 = script.key(key).arg(expected).invoke_async(&mut conn).await?;
        Ok(deleted == 1)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }
}
