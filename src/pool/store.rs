//! Shared proxy pool: a scored set of addresses per pool key

use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Narrow contract over the shared pool store
///
/// Consistency under concurrent writers is the store's responsibility.
#[async_trait]
pub trait PoolStore: Send + Sync {
    /// Score of `address` in the pool, `None` if absent
    async fn score_of(&self, pool_key: &str, address: &str) -> Result<Option<f64>>;

    /// Insert `address` with `score`, overwriting an existing score
    async fn insert(&self, pool_key: &str, address: &str, score: f64) -> Result<()>;
}

/// In-process pool, for dry runs and tests
#[derive(Debug, Default)]
pub struct MemoryPool {
    sets: Mutex<HashMap<String, HashMap<String, f64>>>,
}

impl MemoryPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Members of a pool sorted by address
    pub async fn members(&self, pool_key: &str) -> Vec<(String, f64)> {
        let sets = self.sets.lock().await;
        let mut members: Vec<(String, f64)> = sets
            .get(pool_key)
            .map(|set| set.iter().map(|(a, s)| (a.clone(), *s)).collect())
            .unwrap_or_default();
        members.sort_by(|a, b| a.0.cmp(&b.0));
        members
    }

    pub async fn len(&self, pool_key: &str) -> usize {
        self.sets
            .lock()
            .await
            .get(pool_key)
            .map_or(0, HashMap::len)
    }
}

#[async_trait]
impl PoolStore for MemoryPool {
    async fn score_of(&self, pool_key: &str, address: &str) -> Result<Option<f64>> {
        let sets = self.sets.lock().await;
        Ok(sets.get(pool_key).and_then(|set| set.get(address).copied()))
    }

    async fn insert(&self, pool_key: &str, address: &str, score: f64) -> Result<()> {
        let mut sets = self.sets.lock().await;
        sets.entry(pool_key.to_string())
            .or_default()
            .insert(address.to_string(), score);
        Ok(())
    }
}
