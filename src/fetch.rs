//! Latest-wins request tracking for list fetches.
//!
//! Starting a fetch for a logical resource cancels the one before it. A
//! response that still slips through after a newer fetch began is dropped,
//! since cancellation cannot recall a response that already completed.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct SlotState {
    generation: AtomicU64,
    current: Mutex<Option<CancellationToken>>,
}

/// One logical resource (meetings, people, notes) that fetches compete for.
#[derive(Debug, Clone, Default)]
pub struct RequestSlot {
    state: Arc<SlotState>,
}

/// Handle for a single in-flight fetch.
#[derive(Debug)]
pub struct RequestTicket {
    generation: u64,
    token: CancellationToken,
    state: Arc<SlotState>,
}

impl RequestSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new fetch, cancelling whichever one was running.
    pub fn begin(&self) -> RequestTicket {
        let token = CancellationToken::new();
        let generation = self.state.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let previous = self
            .state
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(token.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }
        RequestTicket {
            generation,
            token,
            state: Arc::clone(&self.state),
        }
    }

    /// Cancel the running fetch without starting another, e.g. when the view closes.
    pub fn cancel(&self) {
        self.state.generation.fetch_add(1, Ordering::SeqCst);
        let current = self
            .state
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(token) = current {
            token.cancel();
        }
    }
}

impl RequestTicket {
    /// Whether the caller still wants this fetch's result.
    pub fn is_current(&self) -> bool {
        !self.token.is_cancelled()
            && self.state.generation.load(Ordering::SeqCst) == self.generation
    }

    /// Drive `fut` to completion unless superseded; `None` means discard.
    pub async fn run<F, T>(&self, fut: F) -> Option<T>
    where
        F: Future<Output = T>,
    {
        tokio::select! {
            _ = self.token.cancelled() => None,
            out = fut => self.is_current().then_some(out),
        }
    }
}
