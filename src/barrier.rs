//! # Cycle Barrier
//!
//! One-shot gate between the aggregation phase (single producer) and the
//! synchronization phase (any number of waiters).
//!
//! A fresh [`Barrier`] is created for every cycle and handed to both phases.
//! The first call to [`Barrier::signal`] or [`Barrier::abandon`] settles it;
//! later calls are no-ops. Waiters observe the settled state through a
//! `tokio::sync::watch` channel, so a waiter that subscribes after the barrier
//! settled returns immediately.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierState {
    Pending,
    /// Aggregation completed and the report is written.
    Released,
    /// Aggregation failed; the consumer phase must not fan out.
    Abandoned,
}

/// Result of [`Barrier::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierWait {
    Signaled,
    Abandoned,
    TimedOut,
    Cancelled,
}

/// The synchronization phase waited past its bound without the barrier settling.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Aggregation did not release the barrier within {waited:?}")]
pub struct BarrierTimeoutError {
    pub waited: Duration,
}

#[derive(Debug, Clone)]
pub struct Barrier {
    state: Arc<watch::Sender<BarrierState>>,
}

impl Default for Barrier {
    fn default() -> Self {
        Self::new()
    }
}

impl Barrier {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(BarrierState::Pending);
        Self {
            state: Arc::new(sender),
        }
    }

    /// Releases every waiter. Returns `true` only for the call that settled the barrier.
    pub fn signal(&self) -> bool {
        self.settle(BarrierState::Released)
    }

    /// Settles the barrier without releasing the consumer phase.
    pub fn abandon(&self) -> bool {
        self.settle(BarrierState::Abandoned)
    }

    fn settle(&self, to: BarrierState) -> bool {
        self.state.send_if_modified(|state| {
            if *state == BarrierState::Pending {
                *state = to;
                true
            } else {
                false
            }
        })
    }

    pub fn state(&self) -> BarrierState {
        *self.state.borrow()
    }

    pub fn is_signaled(&self) -> bool {
        self.state() == BarrierState::Released
    }

    /// Blocks until the barrier settles, `deadline` passes or `cancel` fires.
    ///
    /// Cancellation takes precedence when several conditions hold at once.
    pub async fn wait(&self, deadline: Instant, cancel: &CancellationToken) -> BarrierWait {
        let mut receiver = self.state.subscribe();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => BarrierWait::Cancelled,
            settled = receiver.wait_for(|state| *state != BarrierState::Pending) => {
                match settled.map(|state| *state) {
                    Ok(BarrierState::Released) => BarrierWait::Signaled,
                    Ok(_) | Err(_) => BarrierWait::Abandoned,
                }
            }
            _ = tokio::time::sleep_until(deadline) => BarrierWait::TimedOut,
        }
    }
}
