use crate::model::{Order, OrderStatus};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::fmt::Write;

/// Summary statistics for one day of orders.
///
/// Computed once per cycle and persisted only as the report artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationResult {
    pub as_of: NaiveDate,
    /// Sum over every item of every order of `quantity × unit_price`.
    pub total_revenue: Decimal,
    /// Every status present in the day's orders, mapped to a count of at least one.
    pub count_by_status: BTreeMap<OrderStatus, usize>,
}

impl AggregationResult {
    /// Aggregates the orders created on `as_of`. Orders from other dates are ignored.
    pub fn from_orders<'a>(as_of: NaiveDate, orders: impl IntoIterator<Item = &'a Order>) -> Self {
        let mut total_revenue = Decimal::ZERO;
        let mut count_by_status = BTreeMap::new();

        for order in orders.into_iter().filter(|o| o.created_on() == as_of) {
            total_revenue += order.revenue();
            *count_by_status.entry(order.status).or_insert(0) += 1;
        }

        Self {
            as_of,
            total_revenue,
            count_by_status,
        }
    }

    /// Number of orders that went into this result.
    pub fn order_count(&self) -> usize {
        self.count_by_status.values().sum()
    }

    pub fn count(&self, status: OrderStatus) -> usize {
        self.count_by_status.get(&status).copied().unwrap_or(0)
    }

    /// Human-readable report: the revenue line, then one line per status.
    pub fn render_report(&self) -> String {
        let mut report = String::new();
        let _ = writeln!(report, "Total revenue: {}", self.total_revenue);
        for (status, count) in &self.count_by_status {
            let _ = writeln!(report, "Orders with status {}: {}", status, count);
        }
        report
    }
}
