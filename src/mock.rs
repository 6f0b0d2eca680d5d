//! # Mock Framework
//!
//! Test doubles for every pluggable seam of the pipeline.
//!
//! - [`MockOrderStore`]: scripted store with injectable delays and failures.
//! - [`RecordingEffect`]: effect client that records calls, fails on demand
//!   and tracks its peak concurrency.
//! - [`MemoryReportSink`]: keeps reports in memory.
//! - [`FixedClock`]: a clock that never moves.
//! - [`TokioClock`]: a wall clock driven by tokio's (pausable) time.
//!
//! # Example
//! ```ignore
//! let delay = Duration::from_millis(50);
//! let store = Arc::new(MockOrderStore::new(orders).with_aggregation_delay(delay));
//! let (effects, erp, loyalty, shipping) = RecordingEffect::clients();
//! // ... run a cycle ...
//! assert_eq!(erp.calls().len(), 2);
//! ```

use crate::clients::{EffectClient, EffectClients, EffectError, EffectKind};
use crate::clock::Clock;
use crate::model::{Order, OrderId, OrderStatus};
use crate::report::{ReportError, ReportSink};
use crate::store::{DataAccessError, OrderSession, OrderStore};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

// =============================================================================
// ORDER STORE
// =============================================================================

/// Scripted order store.
///
/// Delays and failures apply to the aggregation query
/// ([`OrderSession::orders_created_on`]) only; the eligibility query always
/// answers from the fixture.
pub struct MockOrderStore {
    orders: Arc<Vec<Order>>,
    session_failure: Option<DataAccessError>,
    aggregation_failure: Option<DataAccessError>,
    aggregation_failures_left: Arc<AtomicUsize>,
    aggregation_delay: Duration,
    sessions_opened: Arc<AtomicUsize>,
}

impl MockOrderStore {
    pub fn new(orders: Vec<Order>) -> Self {
        Self {
            orders: Arc::new(orders),
            session_failure: None,
            aggregation_failure: None,
            aggregation_failures_left: Arc::new(AtomicUsize::new(0)),
            aggregation_delay: Duration::ZERO,
            sessions_opened: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Every session request fails.
    pub fn unavailable(mut self, reason: &str) -> Self {
        self.session_failure = Some(DataAccessError::Unavailable(reason.to_string()));
        self
    }

    /// Every aggregation query fails with `error`.
    pub fn failing_aggregation_query(self, error: DataAccessError) -> Self {
        self.failing_aggregation_query_times(error, usize::MAX)
    }

    /// The next `times` aggregation queries fail with `error`.
    pub fn failing_aggregation_query_times(mut self, error: DataAccessError, times: usize) -> Self {
        self.aggregation_failure = Some(error);
        self.aggregation_failures_left = Arc::new(AtomicUsize::new(times));
        self
    }

    /// Delays every aggregation query.
    pub fn with_aggregation_delay(mut self, delay: Duration) -> Self {
        self.aggregation_delay = delay;
        self
    }

    /// Number of sessions handed out so far.
    pub fn sessions_opened(&self) -> usize {
        self.sessions_opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrderStore for MockOrderStore {
    async fn session(&self) -> Result<Box<dyn OrderSession>, DataAccessError> {
        if let Some(error) = &self.session_failure {
            return Err(error.clone());
        }
        self.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockSession {
            orders: self.orders.clone(),
            aggregation_failure: self.aggregation_failure.clone(),
            aggregation_failures_left: self.aggregation_failures_left.clone(),
            aggregation_delay: self.aggregation_delay,
        }))
    }
}

struct MockSession {
    orders: Arc<Vec<Order>>,
    aggregation_failure: Option<DataAccessError>,
    aggregation_failures_left: Arc<AtomicUsize>,
    aggregation_delay: Duration,
}

impl MockSession {
    fn take_failure(&self) -> Option<DataAccessError> {
        let error = self.aggregation_failure.as_ref()?;
        let consumed = self
            .aggregation_failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                0 => None,
                usize::MAX => Some(usize::MAX),
                n => Some(n - 1),
            })
            .is_ok();
        consumed.then(|| error.clone())
    }
}

#[async_trait]
impl OrderSession for MockSession {
    async fn orders_created_on(&mut self, date: NaiveDate) -> Result<Vec<Order>, DataAccessError> {
        if !self.aggregation_delay.is_zero() {
            tokio::time::sleep(self.aggregation_delay).await;
        }
        if let Some(error) = self.take_failure() {
            return Err(error);
        }
        Ok(self
            .orders
            .iter()
            .filter(|o| o.created_on() == date)
            .cloned()
            .collect())
    }

    async fn orders_created_on_with_status(
        &mut self,
        date: NaiveDate,
        status: OrderStatus,
    ) -> Result<Vec<Order>, DataAccessError> {
        Ok(self
            .orders
            .iter()
            .filter(|o| o.created_on() == date && o.status == status)
            .cloned()
            .collect())
    }
}

// =============================================================================
// EFFECT CLIENTS
// =============================================================================

type CallHook = Arc<dyn Fn(&Order) + Send + Sync>;

/// Effect client that records every call.
pub struct RecordingEffect {
    kind: EffectKind,
    calls: Mutex<Vec<OrderId>>,
    fail_for: HashSet<OrderId>,
    fail_first: AtomicUsize,
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    on_call: Option<CallHook>,
}

impl RecordingEffect {
    pub fn new(kind: EffectKind) -> Self {
        Self {
            kind,
            calls: Mutex::new(Vec::new()),
            fail_for: HashSet::new(),
            fail_first: AtomicUsize::new(0),
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            on_call: None,
        }
    }

    /// Three recorders wired as ERP, loyalty and shipping clients.
    pub fn clients() -> (EffectClients, Arc<Self>, Arc<Self>, Arc<Self>) {
        let erp = Arc::new(Self::new(EffectKind::ErpSync));
        let loyalty = Arc::new(Self::new(EffectKind::LoyaltyUpdate));
        let shipping = Arc::new(Self::new(EffectKind::ShippingNotify));
        let clients = EffectClients::new(erp.clone(), loyalty.clone(), shipping.clone());
        (clients, erp, loyalty, shipping)
    }

    /// Calls for these orders always fail.
    pub fn failing_for(mut self, ids: impl IntoIterator<Item = OrderId>) -> Self {
        self.fail_for.extend(ids);
        self
    }

    /// The first `n` calls fail, whatever the order.
    pub fn failing_first(self, n: usize) -> Self {
        self.fail_first.store(n, Ordering::SeqCst);
        self
    }

    /// Every call takes at least `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Runs `hook` at the start of every call.
    pub fn with_on_call(mut self, hook: impl Fn(&Order) + Send + Sync + 'static) -> Self {
        self.on_call = Some(Arc::new(hook));
        self
    }

    /// Orders seen so far, in call order. Retries appear once per attempt.
    pub fn calls(&self) -> Vec<OrderId> {
        self.calls.lock().unwrap().clone()
    }

    /// Highest number of calls that were in progress at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl EffectClient for RecordingEffect {
    fn kind(&self) -> EffectKind {
        self.kind
    }

    async fn apply(&self, order: &Order) -> Result<(), EffectError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.calls.lock().unwrap().push(order.id);

        if let Some(hook) = &self.on_call {
            hook(order);
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let transient = self
            .fail_first
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if transient || self.fail_for.contains(&order.id) {
            return Err(EffectError::Failed {
                effect: self.kind,
                order_id: order.id,
                reason: "simulated failure".to_string(),
            });
        }
        Ok(())
    }
}

// =============================================================================
// REPORT SINK
// =============================================================================

/// Keeps every written report in memory.
#[derive(Default)]
pub struct MemoryReportSink {
    reports: Mutex<Vec<(NaiveDate, String)>>,
    fail: bool,
}

impl MemoryReportSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every write fails.
    pub fn failing() -> Self {
        Self {
            reports: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn write_count(&self) -> usize {
        self.reports.lock().unwrap().len()
    }

    pub fn last_report(&self) -> Option<String> {
        self.reports.lock().unwrap().last().map(|(_, r)| r.clone())
    }

    pub fn reports(&self) -> Vec<(NaiveDate, String)> {
        self.reports.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReportSink for MemoryReportSink {
    async fn write_report(&self, as_of: NaiveDate, contents: &str) -> Result<(), ReportError> {
        if self.fail {
            return Err(ReportError::Write {
                location: self.location(),
                reason: "disk full".to_string(),
            });
        }
        self.reports.lock().unwrap().push((as_of, contents.to_string()));
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

// =============================================================================
// CLOCK
// =============================================================================

/// A clock frozen at one instant.
pub struct FixedClock {
    now: DateTime<Utc>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }
}

/// Wall clock that starts at a chosen instant and moves with tokio's clock.
///
/// Under `#[tokio::test(start_paused = true)]` tokio time auto-advances while
/// the runtime is idle, so a scheduling loop can run across midnight, or
/// across days, without real waiting.
pub struct TokioClock {
    start: DateTime<Utc>,
    origin: Instant,
}

impl TokioClock {
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            start,
            origin: Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.origin.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.start + elapsed
    }
}
