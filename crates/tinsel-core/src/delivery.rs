//! Producer/consumer counter of claimable ornaments.
//!
//! The producer calls [`DeliveryQueue::release`] on a fixed interval,
//! regardless of how fast gnomes consume, so `available` can grow without
//! bound. Gnomes call [`DeliveryQueue::claim`] and block until an ornament
//! is available or the queue is closed.

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tinsel_types::OrnamentTicket;

/// Errors from the delivery queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The queue was closed; no more ornaments will be handed out.
    #[error("ornament delivery is closed")]
    Closed,

    /// A counter overflowed.
    #[error("arithmetic overflow in delivery counters")]
    ArithmeticOverflow,
}

/// Lifetime counters of a delivery queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryTotals {
    /// Ornaments released by the producer.
    pub released: u64,
    /// Ornaments handed to gnomes.
    pub claimed: u64,
    /// Ornaments released but not yet claimed.
    pub available: u64,
}

#[derive(Debug, Default)]
struct DeliveryState {
    totals: DeliveryTotals,
    waiting: u32,
    closed: bool,
}

impl DeliveryState {
    fn take(&mut self) -> Result<Option<OrnamentTicket>, DeliveryError> {
        let Some(available) = self.totals.available.checked_sub(1) else {
            return Ok(None);
        };
        let serial = self.totals.claimed;
        self.totals.claimed = serial
            .checked_add(1)
            .ok_or(DeliveryError::ArithmeticOverflow)?;
        self.totals.available = available;
        Ok(Some(OrnamentTicket { serial }))
    }
}

/// Ornaments waiting to be picked up at the bottom of the tree.
#[derive(Debug, Default)]
pub struct DeliveryQueue {
    state: Mutex<DeliveryState>,
    delivered: Condvar,
}

impl DeliveryQueue {
    /// Create an empty, open queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `batch` ornaments and wake every waiting gnome.
    ///
    /// Returns the number of ornaments now available.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Closed`] once the queue is closed.
    pub fn release(&self, batch: u32) -> Result<u64, DeliveryError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(DeliveryError::Closed);
        }
        let available = state
            .totals
            .available
            .checked_add(u64::from(batch))
            .ok_or(DeliveryError::ArithmeticOverflow)?;
        let released = state
            .totals
            .released
            .checked_add(u64::from(batch))
            .ok_or(DeliveryError::ArithmeticOverflow)?;
        state.totals.available = available;
        state.totals.released = released;
        drop(state);

        self.delivered.notify_all();
        Ok(available)
    }

    /// Take one ornament, blocking until one is available.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Closed`] if the queue is closed before or
    /// while waiting. Ornaments still available at close are not handed out.
    pub fn claim(&self) -> Result<OrnamentTicket, DeliveryError> {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return Err(DeliveryError::Closed);
            }
            if let Some(ticket) = state.take()? {
                return Ok(ticket);
            }
            state.waiting = state.waiting.saturating_add(1);
            self.delivered.wait(&mut state);
            state.waiting = state.waiting.saturating_sub(1);
        }
    }

    /// Take one ornament if one is available right now.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Closed`] once the queue is closed.
    pub fn try_claim(&self) -> Result<Option<OrnamentTicket>, DeliveryError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(DeliveryError::Closed);
        }
        state.take()
    }

    /// Stop handing out ornaments and wake every waiting gnome.
    ///
    /// Returns the number of ornaments left unclaimed. Closing twice is
    /// harmless.
    pub fn close(&self) -> u64 {
        let mut state = self.state.lock();
        state.closed = true;
        let left = state.totals.available;
        drop(state);

        self.delivered.notify_all();
        left
    }

    /// Whether the queue has been closed.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Ornaments released but not yet claimed.
    pub fn available(&self) -> u64 {
        self.state.lock().totals.available
    }

    /// Ornaments released since the queue was created.
    pub fn released_total(&self) -> u64 {
        self.state.lock().totals.released
    }

    /// Ornaments handed out since the queue was created.
    pub fn claimed_total(&self) -> u64 {
        self.state.lock().totals.claimed
    }

    /// Gnomes currently blocked in [`claim`](Self::claim).
    pub fn waiting(&self) -> u32 {
        self.state.lock().waiting
    }

    /// All lifetime counters, read together.
    pub fn totals(&self) -> DeliveryTotals {
        self.state.lock().totals
    }
}
