//! Deduplicating sink between the crawler and the validation service

use crate::pool::store::PoolStore;
use crate::pool::submit::Submitter;
use crate::Result;
use std::sync::Arc;

/// Score given to an address when it first enters the pool
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InitialScore {
    /// Same score for every discovery
    Fixed(f64),
    /// Unix timestamp of the discovery
    DiscoveryTime,
}

impl InitialScore {
    pub fn value(&self) -> f64 {
        match self {
            InitialScore::Fixed(score) => *score,
            InitialScore::DiscoveryTime => chrono::Utc::now().timestamp() as f64,
        }
    }
}

/// Pools unseen addresses and forwards them once per discovery
#[derive(Clone)]
pub struct ResultSink {
    store: Arc<dyn PoolStore>,
    submitter: Arc<dyn Submitter>,
    pool_key: String,
    initial_score: InitialScore,
}

impl ResultSink {
    pub fn new(
        store: Arc<dyn PoolStore>,
        submitter: Arc<dyn Submitter>,
        pool_key: &str,
        initial_score: InitialScore,
    ) -> Self {
        Self {
            store,
            submitter,
            pool_key: pool_key.to_string(),
            initial_score,
        }
    }

    pub fn pool_key(&self) -> &str {
        &self.pool_key
    }

    /// Forward every address not yet in the pool as one batch, then pool them.
    ///
    /// Addresses are only pooled once the batch has been handed off, so a
    /// failed forward leaves them eligible for the next pass. A lookup failure
    /// part way through still forwards the addresses checked before it, then
    /// returns the error. Returns how many addresses were new.
    pub async fn push(&self, addresses: Vec<String>) -> Result<usize> {
        let mut fresh: Vec<String> = Vec::new();
        let mut lookup_error = None;
        for address in addresses {
            match self.store.score_of(&self.pool_key, &address).await {
                Ok(Some(_)) => continue,
                Ok(None) if fresh.contains(&address) => continue,
                Ok(None) => fresh.push(address),
                Err(e) => {
                    lookup_error = Some(e);
                    break;
                }
            }
        }

        if !fresh.is_empty() {
            self.submitter.submit(&fresh).await?;
            for address in &fresh {
                self.store
                    .insert(&self.pool_key, address, self.initial_score.value())
                    .await?;
            }
        }
        tracing::info!(pool = %self.pool_key, count = fresh.len(), "sent new addresses to pool");

        match lookup_error {
            Some(e) => Err(e),
            None => Ok(fresh.len()),
        }
    }

    pub async fn push_one(&self, address: impl Into<String>) -> Result<usize> {
        self.push(vec![address.into()]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::store::MemoryPool;
    use crate::pool::submit::ChannelSubmitter;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn sink(pool: Arc<MemoryPool>) -> (ResultSink, UnboundedReceiver<Vec<String>>) {
        let (submitter, receiver) = ChannelSubmitter::new();
        let sink = ResultSink::new(
            pool,
            Arc::new(submitter),
            "proxy_pool",
            InitialScore::Fixed(10.0),
        );
        (sink, receiver)
    }

    struct DownSubmitter;

    #[async_trait]
    impl Submitter for DownSubmitter {
        async fn submit(&self, _addresses: &[String]) -> Result<()> {
            Err(anyhow!("queue unreachable"))
        }
    }

    /// Memory pool whose lookups fail for one address
    struct FlakyStore {
        inner: MemoryPool,
        broken: String,
    }

    #[async_trait]
    impl PoolStore for FlakyStore {
        async fn score_of(&self, pool_key: &str, address: &str) -> Result<Option<f64>> {
            if address == self.broken {
                return Err(anyhow!("connection reset"));
            }
            self.inner.score_of(pool_key, address).await
        }

        async fn insert(&self, pool_key: &str, address: &str, score: f64) -> Result<()> {
            self.inner.insert(pool_key, address, score).await
        }
    }

    #[tokio::test]
    async fn test_new_addresses_forwarded_once() {
        let pool = Arc::new(MemoryPool::new());
        let (sink, mut receiver) = sink(pool.clone());

        let count = sink
            .push(vec!["1.2.3.4:8080".to_string(), "5.6.7.8:3128".to_string()])
            .await
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(receiver.try_recv().unwrap().len(), 2);
        assert_eq!(
            pool.score_of("proxy_pool", "1.2.3.4:8080").await.unwrap(),
            Some(10.0)
        );

        let count = sink.push(vec!["1.2.3.4:8080".to_string()]).await.unwrap();
        assert_eq!(count, 0);
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_only_unseen_part_of_batch_forwarded() {
        let pool = Arc::new(MemoryPool::new());
        pool.insert("proxy_pool", "1.1.1.1:80", 99.0).await.unwrap();
        let (sink, mut receiver) = sink(pool.clone());

        let count = sink
            .push(vec![
                "1.1.1.1:80".to_string(),
                "2.2.2.2:80".to_string(),
                "2.2.2.2:80".to_string(),
            ])
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(receiver.try_recv().unwrap(), vec!["2.2.2.2:80".to_string()]);
        // existing score untouched
        assert_eq!(
            pool.score_of("proxy_pool", "1.1.1.1:80").await.unwrap(),
            Some(99.0)
        );
    }

    #[tokio::test]
    async fn test_push_one() {
        let pool = Arc::new(MemoryPool::new());
        let (sink, mut receiver) = sink(pool);
        assert_eq!(sink.push_one("9.9.9.9:9999").await.unwrap(), 1);
        assert_eq!(receiver.try_recv().unwrap(), vec!["9.9.9.9:9999".to_string()]);
    }

    #[tokio::test]
    async fn test_discovery_time_score() {
        let pool = Arc::new(MemoryPool::new());
        let (submitter, _receiver) = ChannelSubmitter::new();
        let sink = ResultSink::new(
            pool.clone(),
            Arc::new(submitter),
            "proxy_pool",
            InitialScore::DiscoveryTime,
        );
        let before = chrono::Utc::now().timestamp() as f64;
        sink.push_one("3.3.3.3:33").await.unwrap();
        let score = pool
            .score_of("proxy_pool", "3.3.3.3:33")
            .await
            .unwrap()
            .unwrap();
        assert!(score >= before);
    }

    #[tokio::test]
    async fn test_failed_forward_leaves_address_unpooled() {
        let pool = Arc::new(MemoryPool::new());
        let down = ResultSink::new(
            pool.clone(),
            Arc::new(DownSubmitter),
            "proxy_pool",
            InitialScore::Fixed(10.0),
        );
        assert!(down.push_one("1.2.3.4:80").await.is_err());
        assert_eq!(pool.score_of("proxy_pool", "1.2.3.4:80").await.unwrap(), None);

        let (sink, mut receiver) = sink(pool.clone());
        assert_eq!(sink.push_one("1.2.3.4:80").await.unwrap(), 1);
        assert_eq!(receiver.try_recv().unwrap(), vec!["1.2.3.4:80".to_string()]);
        assert_eq!(
            pool.score_of("proxy_pool", "1.2.3.4:80").await.unwrap(),
            Some(10.0)
        );
    }

    #[tokio::test]
    async fn test_lookup_failure_still_forwards_checked_addresses() {
        let store = Arc::new(FlakyStore {
            inner: MemoryPool::new(),
            broken: "6.6.6.6:66".to_string(),
        });
        let (submitter, mut receiver) = ChannelSubmitter::new();
        let sink = ResultSink::new(
            store.clone(),
            Arc::new(submitter),
            "proxy_pool",
            InitialScore::Fixed(10.0),
        );

        let result = sink
            .push(vec![
                "5.5.5.5:55".to_string(),
                "6.6.6.6:66".to_string(),
                "7.7.7.7:77".to_string(),
            ])
            .await;
        assert!(result.is_err());
        assert_eq!(receiver.try_recv().unwrap(), vec!["5.5.5.5:55".to_string()]);
        assert_eq!(
            store.score_of("proxy_pool", "5.5.5.5:55").await.unwrap(),
            Some(10.0)
        );
        assert_eq!(store.score_of("proxy_pool", "7.7.7.7:77").await.unwrap(), None);
    }
}
