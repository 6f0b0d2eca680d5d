/// Represents a customer order as stored by the order store.
///
/// The pipeline buckets orders by the UTC date of [`Order::created_at`] and
/// only ever reads the status, the company and the line items.
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Type-safe identifier for Orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub u32);

impl From<u32> for OrderId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "order_{}", self.0)
    }
}

/// Type-safe identifier for the company that placed an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompanyId(pub u32);

impl From<u32> for CompanyId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl Display for CompanyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "company_{}", self.0)
    }
}

/// Lifecycle status of an order. Closed set.
///
/// The declaration order is the order in which statuses appear in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Approved,
    Rejected,
    Shipped,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::Pending,
        OrderStatus::Approved,
        OrderStatus::Rejected,
        OrderStatus::Shipped,
    ];

    /// Whether orders in this status are pushed to the external systems.
    pub fn is_eligible_for_sync(self) -> bool {
        matches!(self, OrderStatus::Approved)
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Approved => "Approved",
            OrderStatus::Rejected => "Rejected",
            OrderStatus::Shipped => "Shipped",
        };
        f.write_str(name)
    }
}

/// A single line of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl LineItem {
    pub fn new(quantity: u32, unit_price: impl Into<Decimal>) -> Self {
        Self {
            quantity,
            unit_price: unit_price.into(),
        }
    }

    /// `quantity × unit_price`, without rounding.
    pub fn subtotal(&self) -> Decimal {
        Decimal::from(self.quantity) * self.unit_price
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub company_id: CompanyId,
    pub created_at: DateTime<Utc>,
    pub status: OrderStatus,
    #[serde(default)]
    pub items: Vec<LineItem>,
}

impl Order {
    /// Creates a new Order without line items.
    ///
    /// # Arguments
    /// * `id` - Unique identifier assigned by the order store
    /// * `company_id` - Company that placed the order
    /// * `created_at` - Creation timestamp, used for date bucketing
    /// * `status` - Current lifecycle status
    pub fn new(
        id: impl Into<OrderId>,
        company_id: impl Into<CompanyId>,
        created_at: DateTime<Utc>,
        status: OrderStatus,
    ) -> Self {
        Self {
            id: id.into(),
            company_id: company_id.into(),
            created_at,
            status,
            items: Vec::new(),
        }
    }

    /// Appends a line item, builder style.
    pub fn with_item(mut self, quantity: u32, unit_price: impl Into<Decimal>) -> Self {
        self.items.push(LineItem::new(quantity, unit_price));
        self
    }

    /// UTC calendar date the order was created on.
    pub fn created_on(&self) -> NaiveDate {
        self.created_at.date_naive()
    }

    /// Sum of all line item subtotals. Zero for an order without items.
    pub fn revenue(&self) -> Decimal {
        self.items.iter().map(LineItem::subtotal).sum()
    }

    /// Checks the invariants the store is expected to uphold.
    pub fn validate(&self) -> Result<(), String> {
        match self.items.iter().find(|item| item.unit_price.is_sign_negative()) {
            Some(item) => Err(format!("negative unit price {}", item.unit_price)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_revenue_sums_line_items() {
        let created = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        let order = Order::new(1, 7, created, OrderStatus::Approved)
            .with_item(2, 10)
            .with_item(1, 5);

        assert_eq!(order.revenue(), Decimal::from(25));
        assert_eq!(order.created_on(), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }

    #[test]
    fn test_order_without_items_has_zero_revenue() {
        let order = Order::new(2, 7, Utc::now(), OrderStatus::Pending);
        assert_eq!(order.revenue(), Decimal::ZERO);
    }

    #[test]
    fn test_fractional_prices_keep_precision() {
        let item = LineItem::new(3, Decimal::new(1999, 2));
        assert_eq!(item.subtotal(), Decimal::new(5997, 2));
    }

    #[test]
    fn test_validate_rejects_negative_price() {
        let order = Order::new(3, 1, Utc::now(), OrderStatus::Pending).with_item(1, -4);
        assert!(order.validate().is_err());
    }

    #[test]
    fn test_only_approved_is_eligible() {
        let eligible: Vec<_> = OrderStatus::ALL
            .into_iter()
            .filter(|s| s.is_eligible_for_sync())
            .collect();
        assert_eq!(eligible, vec![OrderStatus::Approved]);
    }
}
