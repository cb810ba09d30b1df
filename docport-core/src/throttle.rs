//! A counting-semaphore throttle bounding in-flight actions.

use mea::semaphore::{Semaphore, SemaphorePermit};

/// Bounds the number of concurrently executing actions within a batch.
///
/// A non-positive maximum means no bound: `acquire` returns immediately and
/// no permit is held.
#[derive(Debug)]
pub struct Throttle {
    semaphore: Option<Semaphore>,
}

impl Throttle {
    /// Creates a throttle admitting at most `max_outstanding` concurrent
    /// holders, or an unbounded throttle when `max_outstanding` is not
    /// positive.
    pub fn new(max_outstanding: i32) -> Self {
        let semaphore = if max_outstanding > 0 {
            Some(Semaphore::new(max_outstanding as usize))
        } else {
            None
        };
        Throttle { semaphore }
    }

    /// Waits for a slot. The returned permit, if any, releases the slot on
    /// drop.
    pub async fn acquire(&self) -> Option<SemaphorePermit<'_>> {
        match &self.semaphore {
            Some(semaphore) => Some(semaphore.acquire(1).await),
            None => None,
        }
    }
}
