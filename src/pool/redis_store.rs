//! Redis-backed pool (sorted set per pool key) and validation queue

use crate::pool::store::PoolStore;
use crate::pool::submit::Submitter;
use crate::Result;
use async_trait::async_trait;
use redis::AsyncCommands;

async fn connect(url: &str) -> Result<redis::aio::MultiplexedConnection> {
    let client = redis::Client::open(url)?;
    Ok(client.get_multiplexed_async_connection().await?)
}

/// Pool stored as Redis sorted sets, `ZSCORE` / `ZADD`
#[derive(Clone)]
pub struct RedisPool {
    connection: redis::aio::MultiplexedConnection,
}

impl RedisPool {
    pub async fn connect(url: &str) -> Result<Self> {
        Ok(Self {
            connection: connect(url).await?,
        })
    }
}

#[async_trait]
impl PoolStore for RedisPool {
    async fn score_of(&self, pool_key: &str, address: &str) -> Result<Option<f64>> {
        let mut con = self.connection.clone();
        let score: Option<f64> = con.zscore(pool_key, address).await?;
        Ok(score)
    }

    async fn insert(&self, pool_key: &str, address: &str, score: f64) -> Result<()> {
        let mut con = self.connection.clone();
        con.zadd::<_, _, _, ()>(pool_key, address, score).await?;
        Ok(())
    }
}

/// Forwards batches onto a Redis list consumed by the validation service
#[derive(Clone)]
pub struct RedisQueue {
    connection: redis::aio::MultiplexedConnection,
    queue_key: String,
}

impl RedisQueue {
    pub async fn connect(url: &str, queue_key: &str) -> Result<Self> {
        Ok(Self {
            connection: connect(url).await?,
            queue_key: queue_key.to_string(),
        })
    }
}

#[async_trait]
impl Submitter for RedisQueue {
    async fn submit(&self, addresses: &[String]) -> Result<()> {
        if addresses.is_empty() {
            return Ok(());
        }
        let mut con = self.connection.clone();
        con.rpush::<_, _, ()>(&self.queue_key, addresses).await?;
        Ok(())
    }
}
