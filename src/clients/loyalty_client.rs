use crate::clients::{EffectClient, EffectError, EffectKind};
use crate::model::Order;
use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::{info, instrument};

/// Credits loyalty points to the company that placed the order.
///
/// One point per whole currency unit of order revenue.
#[derive(Debug, Clone, Default)]
pub struct LoyaltyClient;

impl LoyaltyClient {
    pub fn new() -> Self {
        Self
    }

    pub fn points_for(order: &Order) -> Decimal {
        order.revenue().floor()
    }
}

#[async_trait]
impl EffectClient for LoyaltyClient {
    fn kind(&self) -> EffectKind {
        EffectKind::LoyaltyUpdate
    }

    #[instrument(skip_all)]
    async fn apply(&self, order: &Order) -> Result<(), EffectError> {
        let points = Self::points_for(order);
        info!(company_id = %order.company_id, %points, "Loyalty points updated");
        Ok(())
    }
}
