use crate::clients::{EffectClient, EffectError, EffectKind};
use crate::model::Order;
use async_trait::async_trait;
use tracing::{info, instrument};

/// Notifies the shipping partner that an order is ready to ship.
#[derive(Debug, Clone, Default)]
pub struct ShippingClient;

impl ShippingClient {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EffectClient for ShippingClient {
    fn kind(&self) -> EffectKind {
        EffectKind::ShippingNotify
    }

    #[instrument(skip_all)]
    async fn apply(&self, order: &Order) -> Result<(), EffectError> {
        let units: u32 = order.items.iter().map(|item| item.quantity).sum();
        info!(order_id = %order.id, units, "Shipping partner notified");
        Ok(())
    }
}
