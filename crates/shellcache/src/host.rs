//! In-process worker host

use async_trait::async_trait;
use shellcache_core::WorkerHost;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// Host for a worker serving a single local proxy
///
/// There are no other clients to wait for, so the signals are recorded
/// and reported rather than acted upon.
#[derive(Debug, Default)]
pub struct LocalHost {
    waiting_skipped: AtomicBool,
    clients_claimed: AtomicBool,
}

impl LocalHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn waiting_skipped(&self) -> bool {
        self.waiting_skipped.load(Ordering::SeqCst)
    }

    pub fn clients_claimed(&self) -> bool {
        self.clients_claimed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkerHost for LocalHost {
    async fn skip_waiting(&self) {
        if !self.waiting_skipped.swap(true, Ordering::SeqCst) {
            info!("Worker asked to skip waiting");
        }
    }

    async fn claim_clients(&self) {
        if !self.clients_claimed.swap(true, Ordering::SeqCst) {
            info!("Worker claimed proxy clients");
        }
    }
}
