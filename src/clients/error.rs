//! Error types for external-effect calls.

use crate::clients::EffectKind;
use crate::model::OrderId;
use thiserror::Error;

/// One effect call failed for one order. Isolated to that order and effect.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EffectError {
    /// The external system rejected the call.
    #[error("{effect} failed for {order_id}: {reason}")]
    Failed {
        effect: EffectKind,
        order_id: OrderId,
        reason: String,
    },

    /// Shutdown interrupted the call before it completed.
    #[error("{effect} cancelled for {order_id}")]
    Cancelled { effect: EffectKind, order_id: OrderId },
}

impl EffectError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, EffectError::Cancelled { .. })
    }
}
