//! Cooperative cancellation for action lists and queries.
//!
//! The engine performs no blocking I/O, so cancellation is checked at
//! well-defined points: before each action acquires the collection lock, and
//! before each query iterator yields. A [`CancelToken`] is cheap to clone;
//! all clones observe the same flag.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{StoreError, StoreResult};

/// A shared flag that callers flip to abandon in-flight work.
///
/// Actions that have not yet started when the token is canceled fail with
/// [`StoreError::Canceled`]; actions already past their cancellation check
/// run to completion, and their effects are not rolled back.
///
/// # Example
///
/// ```ignore
/// let cancel = CancelToken::new();
/// let handle = cancel.clone();
/// handle.cancel();
/// assert!(cancel.check().is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    canceled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token in the not-canceled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Release);
    }

    /// Reports whether cancellation has been requested.
    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }

    /// Returns `Err(StoreError::Canceled)` once cancellation is requested.
    pub fn check(&self) -> StoreResult<()> {
        if self.is_canceled() {
            Err(StoreError::Canceled)
        } else {
            Ok(())
        }
    }
}
