//! # Order Store
//!
//! The pipeline consumes the data store through two traits:
//!
//! - [`OrderStore`] hands out a fresh [`OrderSession`] per logical unit of work
//!   (one for the aggregation phase, one for the synchronization query), so
//!   concurrent phases never share a mutable connection.
//! - [`OrderSession`] answers the two date-bucketed queries the pipeline needs.
//!
//! [`InMemoryOrderStore`] is the implementation shipped with the binary.

pub mod error;
pub mod memory;

pub use error::*;
pub use memory::*;

use crate::model::{Order, OrderStatus};
use async_trait::async_trait;
use chrono::NaiveDate;

/// Factory for store sessions.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Opens a session scoped to one unit of work.
    async fn session(&self) -> Result<Box<dyn OrderSession>, DataAccessError>;
}

/// A connection-like handle to the order store.
#[async_trait]
pub trait OrderSession: Send {
    /// Orders created on `date` (UTC), including their line items.
    async fn orders_created_on(&mut self, date: NaiveDate) -> Result<Vec<Order>, DataAccessError>;

    /// Orders created on `date` with the given status.
    ///
    /// Stores that can filter server-side should override this.
    async fn orders_created_on_with_status(
        &mut self,
        date: NaiveDate,
        status: OrderStatus,
    ) -> Result<Vec<Order>, DataAccessError> {
        let orders = self.orders_created_on(date).await?;
        Ok(orders.into_iter().filter(|o| o.status == status).collect())
    }
}
