//! Shared pool access and forwarding of new candidates

pub mod redis_store;
pub mod sink;
pub mod sqlite_store;
pub mod store;
pub mod submit;

pub use redis_store::{RedisPool, RedisQueue};
pub use sink::{InitialScore, ResultSink};
pub use sqlite_store::SqliteStore;
pub use store::{MemoryPool, PoolStore};
pub use submit::{ChannelSubmitter, LogSubmitter, Submitter};

use crate::config::{ForwardKind, ForwardSettings, PoolBackend, PoolSettings};
use crate::Result;
use std::sync::Arc;

/// Open the pool backend named in the settings
pub async fn open_store(settings: &PoolSettings) -> Result<Arc<dyn PoolStore>> {
    let store: Arc<dyn PoolStore> = match settings.backend {
        PoolBackend::Memory => Arc::new(MemoryPool::new()),
        PoolBackend::Redis => Arc::new(RedisPool::connect(&settings.url).await?),
        PoolBackend::Sqlite => Arc::new(SqliteStore::connect(&settings.url).await?),
    };
    Ok(store)
}

/// Open the forwarding target named in the settings
pub async fn open_submitter(settings: &ForwardSettings) -> Result<Arc<dyn Submitter>> {
    let submitter: Arc<dyn Submitter> = match settings.kind {
        ForwardKind::Log => Arc::new(LogSubmitter),
        ForwardKind::Redis => {
            Arc::new(RedisQueue::connect(&settings.url, &settings.queue_key).await?)
        }
    };
    Ok(submitter)
}

/// Wire store and forwarding into a sink
pub async fn open_sink(pool: &PoolSettings, forward: &ForwardSettings) -> Result<ResultSink> {
    let store = open_store(pool).await?;
    let submitter = open_submitter(forward).await?;
    Ok(ResultSink::new(
        store,
        submitter,
        &pool.key,
        pool.initial_score(),
    ))
}
