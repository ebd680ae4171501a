//! Shared, explicit application context threaded through the coordinator
//! and the lookup engine. No hidden singletons or process-wide globals —
//! everything a component needs travels in this struct, per spec §9's
//! "Global state" design note.

use std::sync::Arc;

use crate::config::Config;
use crate::store::memory::MemoryStore;
use crate::store::redis_store::RedisStore;
use crate::store::{IntervalStore, KeyValueStore};
use crate::error::Result;

pub trait Store: IntervalStore + KeyValueStore {}
impl<T: IntervalStore + KeyValueStore> Store for T {}

#[derive(Clone)]
pub struct Context {
    pub config: Config,
    pub store: Arc<dyn Store>,
}

impl Context {
    pub async fn connect(config: Config) -> Result<Self> {
        let store = RedisStore::connect(&config.store.url).await?;
        Ok(Self {
            config,
            store: Arc::new(store),
        })
    }

    /// Builds a context around an in-memory store, for tests and local use.
    pub fn in_memory(config: Config) -> Self {
        Self {
            config,
            store: Arc::new(MemoryStore::new()),
        }
    }
}
