//! Forwarding newly discovered addresses to the validation service

use crate::Result;
use anyhow::anyhow;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Receives each batch of newly pooled addresses
#[async_trait]
pub trait Submitter: Send + Sync {
    async fn submit(&self, addresses: &[String]) -> Result<()>;
}

/// Logs batches instead of forwarding them
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSubmitter;

#[async_trait]
impl Submitter for LogSubmitter {
    async fn submit(&self, addresses: &[String]) -> Result<()> {
        for address in addresses {
            tracing::info!(address = %address, "candidate ready for validation");
        }
        Ok(())
    }
}

/// Hands batches to an in-process validation task
#[derive(Debug, Clone)]
pub struct ChannelSubmitter {
    sender: mpsc::UnboundedSender<Vec<String>>,
}

impl ChannelSubmitter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Vec<String>>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl Submitter for ChannelSubmitter {
    async fn submit(&self, addresses: &[String]) -> Result<()> {
        self.sender
            .send(addresses.to_vec())
            .map_err(|_| anyhow!("validation channel closed"))
    }
}
