use crate::model::{Order, OrderStatus};
use crate::store::{DataAccessError, OrderSession, OrderStore};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Order store backed by a shared in-memory vector.
///
/// Every session reads the same underlying data, which makes it usable both as
/// the binary's store (seeded from a JSON file) and as a test fixture.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<Vec<Order>>>,
}

impl InMemoryOrderStore {
    pub fn new(orders: Vec<Order>) -> Self {
        Self {
            orders: Arc::new(RwLock::new(orders)),
        }
    }

    /// Parses a JSON array of orders and validates every record.
    pub fn from_json_str(json: &str) -> Result<Self, DataAccessError> {
        let orders: Vec<Order> =
            serde_json::from_str(json).map_err(|e| DataAccessError::QueryFailed(e.to_string()))?;
        for order in &orders {
            order.validate().map_err(|reason| DataAccessError::InvalidRecord {
                id: order.id.to_string(),
                reason,
            })?;
        }
        Ok(Self::new(orders))
    }

    /// Loads the store from a JSON seed file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, DataAccessError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DataAccessError::Unavailable(format!("cannot read {}: {}", path.display(), e))
        })?;
        let store = Self::from_json_str(&content)?;
        info!(seed_file = %path.display(), "Order store seeded");
        Ok(store)
    }

    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn session(&self) -> Result<Box<dyn OrderSession>, DataAccessError> {
        Ok(Box::new(InMemorySession {
            orders: self.orders.clone(),
        }))
    }
}

struct InMemorySession {
    orders: Arc<RwLock<Vec<Order>>>,
}

#[async_trait]
impl OrderSession for InMemorySession {
    async fn orders_created_on(&mut self, date: NaiveDate) -> Result<Vec<Order>, DataAccessError> {
        let orders = self.orders.read().await;
        let matching: Vec<Order> = orders
            .iter()
            .filter(|o| o.created_on() == date)
            .cloned()
            .collect();
        debug!(%date, found = matching.len(), "orders_created_on");
        Ok(matching)
    }

    async fn orders_created_on_with_status(
        &mut self,
        date: NaiveDate,
        status: OrderStatus,
    ) -> Result<Vec<Order>, DataAccessError> {
        let orders = self.orders.read().await;
        let matching: Vec<Order> = orders
            .iter()
            .filter(|o| o.created_on() == date && o.status == status)
            .cloned()
            .collect();
        debug!(%date, %status, found = matching.len(), "orders_created_on_with_status");
        Ok(matching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn test_queries_bucket_by_utc_date() {
        let at = |d, h, m, s| Utc.with_ymd_and_hms(2024, 1, d, h, m, s).unwrap();
        let store = InMemoryOrderStore::new(vec![
            Order::new(1, 1, at(2, 23, 59, 59), OrderStatus::Approved),
            Order::new(2, 1, at(3, 0, 0, 0), OrderStatus::Approved),
            Order::new(3, 1, at(3, 12, 0, 0), OrderStatus::Pending),
        ]);
        let day = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();

        let mut session = store.session().await.unwrap();
        let all = session.orders_created_on(day).await.unwrap();
        assert_eq!(all.len(), 2);

        let approved = session
            .orders_created_on_with_status(day, OrderStatus::Approved)
            .await
            .unwrap();
        assert_eq!(approved.len(), 1);
        assert_eq!(approved[0].id.0, 2);
    }

    #[tokio::test]
    async fn test_seed_from_json() {
        let json = r#"[
            {
                "id": 1,
                "company_id": 42,
                "created_at": "2024-06-01T10:15:00Z",
                "status": "Approved",
                "items": [{ "quantity": 2, "unit_price": "10.50" }]
            },
            { "id": 2, "company_id": 43, "created_at": "2024-06-01T11:00:00Z", "status": "Pending" }
        ]"#;

        let store = InMemoryOrderStore::from_json_str(json).unwrap();
        assert_eq!(store.len().await, 2);
        assert!(!store.is_empty().await);
        assert!(InMemoryOrderStore::default().is_empty().await);

        let day = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let orders = store.session().await.unwrap().orders_created_on(day).await.unwrap();
        assert_eq!(orders[0].revenue().to_string(), "21.00");
        assert!(orders[1].items.is_empty());
    }

    #[test]
    fn test_seed_rejects_negative_prices() {
        let json = r#"[{ "id": 5, "company_id": 1, "created_at": "2024-06-01T10:15:00Z",
                         "status": "Pending", "items": [{ "quantity": 1, "unit_price": "-1" }] }]"#;
        let err = InMemoryOrderStore::from_json_str(json).unwrap_err();
        assert!(matches!(err, DataAccessError::InvalidRecord { .. }));
    }
}
