//! In-flight transfer registry and session cancellation
//!
//! The registry holds the session's cancellation flag and one abort token per
//! running transfer. Registration checks the flag and inserts the token under
//! the same lock that [`TransferRegistry::cancel`] takes to set the flag and
//! fan out, so no transfer can be registered once cancellation has begun and
//! cancellation never sees a half-registered handle.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Default)]
struct RegistryState {
    cancelled: bool,
    next_id: u64,
    in_flight: HashMap<u64, CancellationToken>,
    total_registered: u64,
}

/// Session-wide cancellation flag plus the handles it aborts
#[derive(Debug, Default)]
pub struct TransferRegistry {
    state: Mutex<RegistryState>,
    /// Cancelled together with the flag; lets sleepers and loops wake up
    session_token: CancellationToken,
}

impl TransferRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a new in-flight transfer
    ///
    /// Returns `None` if cancellation was already requested; the caller must
    /// then not start the transfer. Dropping the handle deregisters it.
    pub fn register(self: &Arc<Self>) -> Option<TransferHandle> {
        let mut state = self.lock();
        if state.cancelled {
            return None;
        }

        let id = state.next_id;
        state.next_id += 1;
        state.total_registered += 1;

        let token = CancellationToken::new();
        state.in_flight.insert(id, token.clone());

        Some(TransferHandle {
            id,
            token,
            registry: Arc::clone(self),
        })
    }

    fn deregister(&self, id: u64) {
        self.lock().in_flight.remove(&id);
    }

    /// Requests cancellation and aborts every registered transfer
    ///
    /// Returns `false` if cancellation had already been requested. Files that
    /// were already downloaded are left in place.
    pub fn cancel(&self) -> bool {
        let mut state = self.lock();
        if state.cancelled {
            return false;
        }
        state.cancelled = true;

        for token in state.in_flight.values() {
            token.cancel();
        }
        self.session_token.cancel();

        info!(
            "Cancellation requested, aborting {} in-flight transfers",
            state.in_flight.len()
        );
        true
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.lock().cancelled
    }

    /// Token cancelled when the session is cancelled
    pub fn session_token(&self) -> CancellationToken {
        self.session_token.clone()
    }

    /// Number of transfers currently registered
    pub fn in_flight(&self) -> usize {
        self.lock().in_flight.len()
    }

    /// Number of transfers ever registered
    pub fn total_registered(&self) -> u64 {
        self.lock().total_registered
    }
}

/// Registration of one running transfer; deregisters on drop
#[derive(Debug)]
pub struct TransferHandle {
    id: u64,
    token: CancellationToken,
    registry: Arc<TransferRegistry>,
}

impl TransferHandle {
    /// Token that fires when this transfer must abort
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for TransferHandle {
    fn drop(&mut self) {
        self.registry.deregister(self.id);
        debug!("Transfer {} deregistered", self.id);
    }
}
