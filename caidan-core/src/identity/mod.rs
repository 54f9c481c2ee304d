//! Identity source adapter.
//!
//! The wallet connector (or any other login provider) is an external
//! collaborator; the navigator only needs a way to start a connection, drop
//! it, and observe the current [`IdentitySignal`].

use crate::error::{CaidanError, Result};
use crate::types::IdentitySignal;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::watch;

#[async_trait]
pub trait IdentitySource: Send + Sync {
    /// Run the provider's connection flow and return the resulting signal.
    async fn connect(&self) -> Result<IdentitySignal>;

    /// Drop the connection. Never suspends.
    fn disconnect(&self);

    fn current(&self) -> IdentitySignal;

    fn subscribe(&self) -> watch::Receiver<IdentitySignal>;
}

/// Identity source driven directly by the caller.
///
/// Queued identities are handed out by successive [`connect`](IdentitySource::connect)
/// calls; [`set`](Self::set) publishes a signal as if the provider changed it
/// on its own (account switch in the wallet extension, for example).
pub struct ManualIdentitySource {
    sender: watch::Sender<IdentitySignal>,
    pending: Mutex<VecDeque<IdentitySignal>>,
}

impl Default for ManualIdentitySource {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualIdentitySource {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(IdentitySignal::None);
        Self {
            sender,
            pending: Mutex::new(VecDeque::new()),
        }
    }

    /// Queue the identity the next `connect` call will produce.
    pub fn enqueue(&self, signal: IdentitySignal) {
        self.pending.lock().push_back(signal);
    }

    pub fn set(&self, signal: IdentitySignal) {
        self.sender.send_replace(signal);
    }
}

#[async_trait]
impl IdentitySource for ManualIdentitySource {
    async fn connect(&self) -> Result<IdentitySignal> {
        let signal = self
            .pending
            .lock()
            .pop_front()
            .ok_or_else(|| CaidanError::internal("No identity available to connect"))?;

        tracing::debug!("Identity source connected: {}", signal.describe());
        self.sender.send_replace(signal.clone());
        Ok(signal)
    }

    fn disconnect(&self) {
        self.sender.send_replace(IdentitySignal::None);
    }

    fn current(&self) -> IdentitySignal {
        self.sender.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<IdentitySignal> {
        self.sender.subscribe()
    }
}
