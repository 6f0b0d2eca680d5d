use crate::clients::{EffectError, ErpClient, LoyaltyClient, ShippingClient};
use crate::model::Order;
use crate::synchronizer::EffectOutcome;
use async_trait::async_trait;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// The external side effects performed for every eligible order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EffectKind {
    ErpSync,
    LoyaltyUpdate,
    ShippingNotify,
}

impl Display for EffectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EffectKind::ErpSync => "erp_sync",
            EffectKind::LoyaltyUpdate => "loyalty_update",
            EffectKind::ShippingNotify => "shipping_notify",
        };
        f.write_str(name)
    }
}

/// How often a failed effect call is retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. At least 1.
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::from_millis(500),
        }
    }
}

/// A capability that performs one external side effect for an order.
///
/// Implementors only provide [`apply`](EffectClient::apply); retries and
/// cancellation are handled by the provided [`apply_with_retry`](EffectClient::apply_with_retry).
#[async_trait]
pub trait EffectClient: Send + Sync {
    fn kind(&self) -> EffectKind;

    /// Performs the effect once.
    async fn apply(&self, order: &Order) -> Result<(), EffectError>;

    /// Performs the effect, retrying failures according to `policy`.
    ///
    /// Never returns early because another order failed; the outcome only
    /// describes this order and this effect.
    #[tracing::instrument(skip_all, fields(order_id = %order.id))]
    async fn apply_with_retry(
        &self,
        order: &Order,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
    ) -> EffectOutcome {
        let kind = self.kind();
        let max_attempts = policy.max_attempts.max(1);
        let cancelled = || EffectError::Cancelled {
            effect: kind,
            order_id: order.id,
        };
        let mut attempts = 0;

        loop {
            if cancel.is_cancelled() {
                return EffectOutcome::new(kind, attempts, Err(cancelled()));
            }
            attempts += 1;

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(cancelled()),
                result = self.apply(order) => result,
            };

            match result {
                Ok(()) => return EffectOutcome::new(kind, attempts, Ok(())),
                Err(e) if e.is_cancelled() || attempts >= max_attempts => {
                    warn!(effect = %kind, attempts, error = %e, "Effect failed");
                    return EffectOutcome::new(kind, attempts, Err(e));
                }
                Err(e) => {
                    debug!(
                        effect = %kind,
                        attempt = attempts,
                        error = %e,
                        "Effect failed, retrying"
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {}
                        _ = tokio::time::sleep(policy.backoff) => {}
                    }
                }
            }
        }
    }
}

/// The three effect clients, applied to each order in declaration order.
#[derive(Clone)]
pub struct EffectClients {
    pub erp: Arc<dyn EffectClient>,
    pub loyalty: Arc<dyn EffectClient>,
    pub shipping: Arc<dyn EffectClient>,
}

impl EffectClients {
    pub fn new(
        erp: Arc<dyn EffectClient>,
        loyalty: Arc<dyn EffectClient>,
        shipping: Arc<dyn EffectClient>,
    ) -> Self {
        Self {
            erp,
            loyalty,
            shipping,
        }
    }

    /// Log-only clients for every effect.
    pub fn logging() -> Self {
        Self::new(
            Arc::new(ErpClient::new()),
            Arc::new(LoyaltyClient::new()),
            Arc::new(ShippingClient::new()),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn EffectClient>> {
        [&self.erp, &self.loyalty, &self.shipping].into_iter()
    }
}
