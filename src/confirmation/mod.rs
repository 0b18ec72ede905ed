//! Confirmation-page polling state machine.
//!
//! The confirmation page loads immediately after the processor redirect,
//! usually before the webhook has materialized the order. This module
//! resolves that race on the client side: poll the order lookup endpoint
//! with bounded exponential backoff until the order appears, the attempts
//! run out, or the lookup fails hard.
//!
//! Page-level side effects (clearing the cart, the thank-you banner) are
//! independent of polling: the payment already succeeded by the time the
//! customer lands here, so they happen unconditionally at mount.

pub mod http;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Order payload rendered on the confirmation page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub order_number: String,
    pub customer_name: String,
    pub customer_email: String,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
    pub status: String,
    #[serde(default)]
    pub items: Vec<OrderSummaryItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSummaryItem {
    pub quantity: i32,
    pub price_at_purchase: Decimal,
    pub line_subtotal: Decimal,
}

/// Failure of a single lookup attempt. Both variants are terminal for the
/// poller; only "not found yet" is retried.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LookupError {
    #[error("lookup transport error: {0}")]
    Transport(String),
    #[error("lookup returned status {0}")]
    Status(u16),
}

/// The order lookup consumed by the poller. `Ok(None)` means the order has
/// not been materialized yet.
#[async_trait]
pub trait OrderLookup: Send + Sync {
    async fn find_order(&self, session_id: &str) -> Result<Option<OrderSummary>, LookupError>;
}

/// Tagged poller state; exactly one of these at any time.
#[derive(Debug, Clone, PartialEq)]
pub enum PollState {
    Idle,
    Polling { attempt: u32 },
    /// The order was found; polling stopped
    Resolved(OrderSummary),
    /// All attempts saw "not yet"; expected under webhook delay, not an error
    Exhausted,
    /// A hard lookup failure; never retried
    Failed,
}

/// Backoff policy: attempt 1 fires immediately, then delays double from
/// `initial_backoff` between attempts.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(1000),
        }
    }
}

/// Drives the lookup to a terminal state. Single-threaded and cooperative:
/// one in-flight request and one pending delay at a time; dropping the
/// future cancels the pending delay.
pub struct ConfirmationPoller<L> {
    lookup: L,
    policy: PollPolicy,
    state: PollState,
}

impl<L: OrderLookup> ConfirmationPoller<L> {
    pub fn new(lookup: L) -> Self {
        Self::with_policy(lookup, PollPolicy::default())
    }

    pub fn with_policy(lookup: L, policy: PollPolicy) -> Self {
        Self {
            lookup,
            policy,
            state: PollState::Idle,
        }
    }

    pub fn state(&self) -> &PollState {
        &self.state
    }

    /// Polls until resolved, exhausted, or failed, and returns the terminal
    /// state.
    pub async fn run(&mut self, session_id: &str) -> &PollState {
        let mut backoff = self.policy.initial_backoff;

        for attempt in 1..=self.policy.max_attempts {
            self.state = PollState::Polling { attempt };
            debug!(attempt, "Polling for order");

            match self.lookup.find_order(session_id).await {
                Ok(Some(order)) => {
                    info!(attempt, order_number = %order.order_number, "Order resolved");
                    self.state = PollState::Resolved(order);
                    return &self.state;
                }
                Ok(None) => {
                    if attempt < self.policy.max_attempts {
                        tokio::time::sleep(backoff).await;
                        backoff *= 2;
                    }
                }
                Err(e) => {
                    // The payment already succeeded; a lookup failure is
                    // rendered reassuringly and never retried.
                    warn!(attempt, error = %e, "Order lookup failed hard");
                    self.state = PollState::Failed;
                    return &self.state;
                }
            }
        }

        info!(
            attempts = self.policy.max_attempts,
            "Order not yet visible after all attempts"
        );
        self.state = PollState::Exhausted;
        &self.state
    }
}

/// A spawned poll with a cancellation handle. Cancelling on unmount stops
/// pending retries so nothing fires after page teardown.
pub struct PollTask {
    handle: JoinHandle<PollState>,
}

impl PollTask {
    pub fn spawn<L>(lookup: L, session_id: String) -> Self
    where
        L: OrderLookup + 'static,
    {
        Self::spawn_with_policy(lookup, session_id, PollPolicy::default())
    }

    pub fn spawn_with_policy<L>(lookup: L, session_id: String, policy: PollPolicy) -> Self
    where
        L: OrderLookup + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut poller = ConfirmationPoller::with_policy(lookup, policy);
            poller.run(&session_id).await;
            poller.state
        });
        Self { handle }
    }

    /// Aborts the poll; any pending retry is dropped.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    /// Waits for the terminal state; `None` if the task was cancelled.
    pub async fn join(self) -> Option<PollState> {
        self.handle.await.ok()
    }
}

/// Client-side cart storage cleared when the confirmation page mounts.
pub trait CartHandle {
    fn clear(&self);
}

/// What the confirmation page renders.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmationView {
    /// No session identifier; static thank-you only, no polling
    ThankYou,
    OrderDetails(OrderSummary),
    /// Attempts exhausted while the webhook is still in flight
    StillProcessing,
    /// Hard lookup failure; payment still succeeded
    LookupUnavailable,
}

impl ConfirmationView {
    /// User-facing copy. Always reassuring; technical detail stays in logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::ThankYou => "Thank you for your purchase!",
            Self::OrderDetails(_) => "Thank you for your purchase! Your order is confirmed.",
            Self::StillProcessing => {
                "Your payment was received and your order is still processing. \
                 A confirmation email is on its way."
            }
            Self::LookupUnavailable => {
                "Your payment was received. We couldn't display your order details \
                 right now, but a confirmation email is on its way."
            }
        }
    }
}

/// Page-mount controller. Clears the cart and decides whether to poll.
///
/// Cart clearing never depends on poll outcome: by the time this page is
/// reached the customer has already paid.
pub async fn confirm_on_arrival<L: OrderLookup>(
    session_id: Option<&str>,
    cart: &dyn CartHandle,
    lookup: L,
) -> ConfirmationView {
    cart.clear();

    let session_id = match session_id {
        Some(id) if !id.is_empty() => id,
        _ => return ConfirmationView::ThankYou,
    };

    let mut poller = ConfirmationPoller::new(lookup);
    match poller.run(session_id).await {
        PollState::Resolved(order) => ConfirmationView::OrderDetails(order.clone()),
        PollState::Exhausted => ConfirmationView::StillProcessing,
        PollState::Failed => ConfirmationView::LookupUnavailable,
        // run() only returns terminal states
        PollState::Idle | PollState::Polling { .. } => ConfirmationView::StillProcessing,
    }
}
