//! Transaction Orchestrator
//!
//! Drives the two remote calls of a payment (create, then capture). Each
//! call tries the server-mediated primary tier first and falls back to the
//! SDK's direct order API only when the primary fails:
//!
//! ```text
//!  create_order ──▶ OrderBackend::create_order ──ok──▶ OrderHandle
//!                        │ err
//!                        ▼
//!                   PaymentSdk::request(POST /v2/checkout/orders) ──err──▶ OrderCreation
//!
//!  capture_order ──▶ OrderBackend::capture_order ──ok──▶ CaptureResult
//!                        │ err
//!                        ▼
//!                   PaymentSdk::request(POST …/{id}/capture) ──err──▶ Capture
//! ```
//!
//! The orchestrator is also the [`WidgetHooks`] implementation handed to the
//! widget at mount time; outcomes flow upward through a
//! [`TransactionObserver`].

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Result, SdkFault, TierError, WidgetError};
use crate::lock;
use crate::model::{CaptureResult, OrderHandle, OrderRequest, TransactionPhase};
use crate::sdk::{PaymentSdk, SdkRequest, WidgetHooks};

/// Server-mediated (primary) order API
#[async_trait]
pub trait OrderBackend: Send + Sync {
    async fn create_order(&self, request: &OrderRequest) -> std::result::Result<OrderHandle, TierError>;

    async fn capture_order(&self, handle: &OrderHandle) -> std::result::Result<CaptureResult, TierError>;
}

/// Receives transaction outcomes
pub trait TransactionObserver: Send + Sync {
    /// Capture started (`true`) or ended on any path (`false`)
    fn processing_changed(&self, processing: bool);

    /// Funds captured; the only outcome that authorizes success
    fn completed(&self, result: &CaptureResult);

    /// Capture call succeeded but the provider did not finalize funds
    fn not_completed(&self, result: &CaptureResult);

    fn failed(&self, error: &WidgetError);

    /// Buyer backed out
    fn cancelled(&self);

    fn sdk_error(&self, fault: &SdkFault);
}

/// Which resolution tier produced a result
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tier {
    Primary,
    Fallback,
}

impl Tier {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Fallback => "fallback",
        }
    }
}

/// Buyer-side event that arrived while a remote call was in flight
#[derive(Clone, Debug)]
enum Interrupt {
    Cancelled,
    Fault(SdkFault),
}

impl Interrupt {
    const fn phase(&self) -> TransactionPhase {
        match self {
            Self::Cancelled => TransactionPhase::Cancelled,
            Self::Fault(_) => TransactionPhase::Failed,
        }
    }
}

struct TransactionState {
    phase: TransactionPhase,
    handle: Option<OrderHandle>,
    create_tier: Option<Tier>,
    capture_tier: Option<Tier>,
    /// Applied when the in-flight call returns
    interrupt: Option<Interrupt>,
}

/// One transaction at a time, per mounted widget
pub struct TransactionOrchestrator {
    backend: Arc<dyn OrderBackend>,
    sdk: Arc<dyn PaymentSdk>,
    request: OrderRequest,
    observer: Arc<dyn TransactionObserver>,
    primary_timeout: Option<Duration>,
    state: Mutex<TransactionState>,
    processing: AtomicBool,
}

impl TransactionOrchestrator {
    pub fn new(
        backend: Arc<dyn OrderBackend>,
        sdk: Arc<dyn PaymentSdk>,
        request: OrderRequest,
        observer: Arc<dyn TransactionObserver>,
    ) -> Self {
        Self {
            backend,
            sdk,
            request,
            observer,
            primary_timeout: None,
            state: Mutex::new(TransactionState {
                phase: TransactionPhase::Idle,
                handle: None,
                create_tier: None,
                capture_tier: None,
                interrupt: None,
            }),
            processing: AtomicBool::new(false),
        }
    }

    /// Bound the primary tier; on expiry the fallback runs
    #[must_use]
    pub const fn with_primary_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.primary_timeout = timeout;
        self
    }

    pub fn phase(&self) -> TransactionPhase {
        lock(&self.state).phase
    }

    /// Canonical order handle of the current transaction
    pub fn handle(&self) -> Option<OrderHandle> {
        lock(&self.state).handle.clone()
    }

    pub fn create_tier(&self) -> Option<Tier> {
        lock(&self.state).create_tier
    }

    pub fn capture_tier(&self) -> Option<Tier> {
        lock(&self.state).capture_tier
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    /// Explicit user retry: back to `Idle` unless a call is in flight
    pub fn reset(&self) -> Result<()> {
        let mut state = lock(&self.state);
        if state.phase.is_busy() {
            return Err(WidgetError::Busy(format!("cannot reset while {:?}", state.phase)));
        }
        state.phase = TransactionPhase::Idle;
        state.handle = None;
        state.create_tier = None;
        state.capture_tier = None;
        state.interrupt = None;
        Ok(())
    }

    async fn primary<T, F>(&self, call: F) -> std::result::Result<T, TierError>
    where
        F: Future<Output = std::result::Result<T, TierError>> + Send,
    {
        match self.primary_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .unwrap_or_else(|_| Err(TierError::Timeout(limit))),
            None => call.await,
        }
    }

    /// Create an order, primary tier first
    pub async fn create_order(&self) -> Result<OrderHandle> {
        {
            let mut state = lock(&self.state);
            match state.phase {
                phase if phase.is_busy() => {
                    return Err(WidgetError::Busy(format!("transaction already {phase:?}")));
                }
                TransactionPhase::Completed => {
                    return Err(WidgetError::InvalidPhase("transaction already completed".into()));
                }
                TransactionPhase::Cancelled | TransactionPhase::Failed => {
                    tracing::debug!(from = ?state.phase, "New widget interaction, resetting transaction");
                }
                _ => {}
            }
            state.phase = TransactionPhase::CreatingOrder;
            state.handle = None;
            state.create_tier = None;
            state.capture_tier = None;
            state.interrupt = None;
        }

        tracing::info!(
            amount = %self.request.amount_string(),
            currency = %self.request.currency,
            "Creating order"
        );

        let (handle, tier) = match self.primary(self.backend.create_order(&self.request)).await {
            Ok(handle) => (handle, Tier::Primary),
            Err(primary) => {
                tracing::warn!(tier = "primary", error = %primary, "Order creation failed, trying SDK fallback");
                match self.fallback_create().await {
                    Ok(handle) => (handle, Tier::Fallback),
                    Err(fallback) => {
                        tracing::error!(error = %fallback, "Fallback order creation failed");
                        self.finish_call(TransactionPhase::CreatingOrder, TransactionPhase::Failed);
                        return Err(WidgetError::OrderCreation(format!(
                            "primary: {primary}; fallback: {fallback}"
                        )));
                    }
                }
            }
        };

        let interrupt = {
            let mut state = lock(&self.state);
            if state.phase != TransactionPhase::CreatingOrder {
                tracing::warn!(order_id = %handle, phase = ?state.phase, "Order created after transaction moved on");
                return Err(WidgetError::InvalidPhase(format!("order created while {:?}", state.phase)));
            }
            state.handle = Some(handle.clone());
            state.create_tier = Some(tier);
            match state.interrupt.take() {
                Some(interrupt) => {
                    state.phase = interrupt.phase();
                    Some(interrupt)
                }
                None => {
                    state.phase = TransactionPhase::AwaitingCapture;
                    None
                }
            }
        };

        if let Some(interrupt) = interrupt {
            tracing::info!(order_id = %handle, phase = ?interrupt.phase(), "Order created after buyer left the flow");
            self.notify_interrupt(&interrupt);
            return Err(WidgetError::InvalidPhase(format!(
                "order {handle} created after transaction was {:?}",
                interrupt.phase()
            )));
        }

        tracing::info!(order_id = %handle, tier = tier.as_str(), "Order created");
        Ok(handle)
    }

    async fn fallback_create(&self) -> std::result::Result<OrderHandle, TierError> {
        let response = self
            .sdk
            .request(SdkRequest::post("/v2/checkout/orders", self.request.to_sdk_payload()))
            .await?;
        response
            .get("id")
            .and_then(Value::as_str)
            .map(OrderHandle::new)
            .ok_or_else(|| TierError::Decode("order response has no id".into()))
    }

    /// Capture an approved order, primary tier first
    ///
    /// `Ok` carries both `Completed` and `Incomplete` results; only the
    /// former moves the phase to `Completed`.
    pub async fn capture_order(&self, handle: &OrderHandle) -> Result<CaptureResult> {
        {
            let mut state = lock(&self.state);
            match state.phase {
                TransactionPhase::AwaitingCapture => {}
                phase if phase.is_busy() => {
                    return Err(WidgetError::Busy(format!("transaction already {phase:?}")));
                }
                phase => {
                    return Err(WidgetError::InvalidPhase(format!("cannot capture while {phase:?}")));
                }
            }
            if state.handle.as_ref() != Some(handle) {
                tracing::warn!(
                    expected = ?state.handle,
                    approved = %handle,
                    "Approved order differs from created order"
                );
                return Err(WidgetError::InvalidPhase(format!("order {handle} is not the current order")));
            }
            state.phase = TransactionPhase::Capturing;
        }

        let _processing = ProcessingGuard::engage(self);
        tracing::info!(order_id = %handle, "Capturing order");

        let captured = match self.primary(self.backend.capture_order(handle)).await {
            Ok(result) => Ok((result, Tier::Primary)),
            Err(primary) => {
                tracing::warn!(tier = "primary", order_id = %handle, error = %primary, "Capture failed, trying SDK fallback");
                self.fallback_capture(handle)
                    .await
                    .map(|result| (result, Tier::Fallback))
                    .map_err(|fallback| format!("primary: {primary}; fallback: {fallback}"))
            }
        };

        // The capture outcome is authoritative; an interrupt raised meanwhile is dropped
        match captured {
            Ok((result, tier)) => {
                let next = if result.is_completed() {
                    TransactionPhase::Completed
                } else {
                    TransactionPhase::Failed
                };
                if !self.finish_call(TransactionPhase::Capturing, next) {
                    return Err(WidgetError::InvalidPhase("capture finished after transaction moved on".into()));
                }
                lock(&self.state).capture_tier = Some(tier);
                if result.is_completed() {
                    tracing::info!(order_id = %handle, tier = tier.as_str(), "Payment captured");
                } else {
                    tracing::warn!(
                        order_id = %handle,
                        status = ?result.provider_status(),
                        "Capture returned without completing"
                    );
                }
                Ok(result)
            }
            Err(message) => {
                tracing::error!(order_id = %handle, error = %message, "Capture failed on both tiers");
                self.finish_call(TransactionPhase::Capturing, TransactionPhase::Failed);
                Err(WidgetError::Capture(message))
            }
        }
    }

    async fn fallback_capture(&self, handle: &OrderHandle) -> std::result::Result<CaptureResult, TierError> {
        let url = format!("/v2/checkout/orders/{}/capture", handle.as_str());
        let payload = self.sdk.request(SdkRequest::post_empty(url)).await?;
        Ok(CaptureResult::from_payload(payload))
    }

    fn clear_processing(&self) {
        if self.processing.swap(false, Ordering::SeqCst) {
            self.observer.processing_changed(false);
        }
    }

    /// Leave the busy phase `from` for `next`, clearing any interrupt
    ///
    /// Returns false when the phase was no longer `from`.
    fn finish_call(&self, from: TransactionPhase, next: TransactionPhase) -> bool {
        let mut state = lock(&self.state);
        if state.phase != from {
            tracing::warn!(expected = ?from, actual = ?state.phase, "In-flight call returned to a changed transaction");
            return false;
        }
        if let Some(interrupt) = state.interrupt.take() {
            tracing::info!(dropped = ?interrupt.phase(), outcome = ?next, "Call outcome supersedes interrupt");
        }
        state.phase = next;
        true
    }

    /// Apply a cancel or SDK fault
    ///
    /// While a call is in flight the interrupt is parked and `false` is
    /// returned; the call's continuation applies it. `Completed` is never
    /// overwritten.
    fn interrupt(&self, interrupt: Interrupt) -> bool {
        let mut state = lock(&self.state);
        if state.phase.is_busy() {
            tracing::debug!(phase = ?state.phase, "Interrupt deferred until in-flight call returns");
            state.interrupt = Some(interrupt);
            return false;
        }
        if state.phase != TransactionPhase::Completed {
            state.phase = interrupt.phase();
        }
        true
    }

    fn notify_interrupt(&self, interrupt: &Interrupt) {
        self.clear_processing();
        match interrupt {
            Interrupt::Cancelled => self.observer.cancelled(),
            Interrupt::Fault(fault) => self.observer.sdk_error(fault),
        }
    }
}

/// Holds the processing flag for the duration of a capture
struct ProcessingGuard<'a> {
    orchestrator: &'a TransactionOrchestrator,
}

impl<'a> ProcessingGuard<'a> {
    fn engage(orchestrator: &'a TransactionOrchestrator) -> Self {
        orchestrator.processing.store(true, Ordering::SeqCst);
        orchestrator.observer.processing_changed(true);
        Self { orchestrator }
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.orchestrator.clear_processing();
    }
}

#[async_trait]
impl WidgetHooks for TransactionOrchestrator {
    async fn create_order(&self) -> Result<String> {
        match Self::create_order(self).await {
            Ok(handle) => Ok(handle.id),
            Err(e) => {
                if matches!(e, WidgetError::OrderCreation(_)) {
                    self.observer.failed(&e);
                }
                Err(e)
            }
        }
    }

    async fn on_approve(&self, order_id: String) -> Result<()> {
        tracing::info!(order_id = %order_id, "Payment approved");
        let handle = OrderHandle::new(order_id);
        match self.capture_order(&handle).await {
            Ok(result) if result.is_completed() => {
                self.observer.completed(&result);
                Ok(())
            }
            Ok(result) => {
                self.observer.not_completed(&result);
                Ok(())
            }
            Err(e @ WidgetError::Capture(_)) => {
                self.observer.failed(&e);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Approval ignored");
                Err(e)
            }
        }
    }

    fn on_cancel(&self, details: Value) {
        tracing::info!(details = %details, "Payment cancelled by buyer");
        let interrupt = Interrupt::Cancelled;
        if self.interrupt(interrupt.clone()) {
            self.notify_interrupt(&interrupt);
        }
    }

    fn on_error(&self, fault: SdkFault) {
        tracing::error!(error = %fault, "Payment SDK reported an error");
        let interrupt = Interrupt::Fault(fault);
        if self.interrupt(interrupt.clone()) {
            self.notify_interrupt(&interrupt);
        }
    }
}
