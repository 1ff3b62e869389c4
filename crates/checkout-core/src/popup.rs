//! Popup Controller
//!
//! State machine for the "unlock" popup:
//!
//! ```text
//!  Intro ──show_payment──▶ Payment(Loading) ──sdk ready──▶ Payment(Rendering)
//!    ▲                          │ load failed                  │ rendered      │ render failed
//!    │                          ▼                              ▼               ▼
//!    │                    Payment(Error) ◀──────────── Payment(Ready) ◀── Payment(Error)
//!    │                          │ retry                   │    ▲
//!    │                          └──▶ Payment(Loading)     │    │ capture settled
//!    │                                                    ▼    │
//!    └────────── back (not while Processing) ──── Payment(Processing) ──completed──▶ Closed
//! ```
//!
//! Every exit from the payment step (back, retry, close, unmount, success)
//! tears the widget down and advances the instance generation, so
//! continuations that were started earlier cannot touch the new state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::config::WidgetConfig;
use crate::error::{SdkFault, WidgetError};
use crate::loader::SdkLoader;
use crate::lock;
use crate::model::{CaptureResult, RenderStatus, UiStep};
use crate::render::{Container, WidgetRenderer};
use crate::sdk::ButtonStyle;
use crate::token::{ActiveToken, Generation};
use crate::transaction::{OrderBackend, TransactionObserver, TransactionOrchestrator};

/// Message shown when the buyer cancels
pub const CANCELLED_MESSAGE: &str = "Payment was cancelled. You can try again anytime.";

/// Message shown for faults the SDK reports on its own
pub const SDK_ERROR_MESSAGE: &str = "An error occurred during payment. Please try again.";

/// Message shown when capture returns without completing
pub const NOT_COMPLETED_MESSAGE: &str = "Payment was not completed successfully";

/// External callback
pub type Callback = Arc<dyn Fn() + Send + Sync>;

/// Why the popup is showing an error
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeKind {
    /// Buyer intent, not a fault
    Cancelled,
    /// Capture succeeded at the protocol level but funds were not finalized
    NotCompleted,
    Failure,
}

/// Error message plus whether "try again" can help
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    pub retryable: bool,
}

impl Notice {
    fn cancelled() -> Self {
        Self {
            kind: NoticeKind::Cancelled,
            message: CANCELLED_MESSAGE.into(),
            retryable: true,
        }
    }

    fn not_completed() -> Self {
        Self {
            kind: NoticeKind::NotCompleted,
            message: NOT_COMPLETED_MESSAGE.into(),
            retryable: true,
        }
    }

    fn sdk_error() -> Self {
        Self {
            kind: NoticeKind::Failure,
            message: SDK_ERROR_MESSAGE.into(),
            retryable: true,
        }
    }
}

impl From<&WidgetError> for Notice {
    fn from(error: &WidgetError) -> Self {
        Self {
            kind: NoticeKind::Failure,
            message: error.user_message().into(),
            retryable: error.is_retryable(),
        }
    }
}

/// Sub-state of the payment step
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PaymentStage {
    Loading,
    Rendering,
    Ready,
    Processing,
    Error(Notice),
}

/// Popup state
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PopupState {
    Intro,
    Payment(PaymentStage),
    Closed,
}

impl PopupState {
    pub const fn ui_step(&self) -> Option<UiStep> {
        match self {
            Self::Intro => Some(UiStep::Intro),
            Self::Payment(_) => Some(UiStep::Payment),
            Self::Closed => None,
        }
    }

    pub const fn is_processing(&self) -> bool {
        matches!(self, Self::Payment(PaymentStage::Processing))
    }

    /// Loading indicator should show
    pub const fn is_loading(&self) -> bool {
        matches!(
            self,
            Self::Payment(PaymentStage::Loading | PaymentStage::Rendering)
        )
    }

    pub const fn notice(&self) -> Option<&Notice> {
        match self {
            Self::Payment(PaymentStage::Error(notice)) => Some(notice),
            _ => None,
        }
    }
}

struct Inner {
    loader: Arc<SdkLoader>,
    backend: Arc<dyn OrderBackend>,
    renderer: WidgetRenderer,
    config: WidgetConfig,
    style: ButtonStyle,
    state: Mutex<PopupState>,
    generation: Generation,
    orchestrator: Mutex<Option<Arc<TransactionOrchestrator>>>,
    success_fired: AtomicBool,
    on_success: Callback,
    on_close: Callback,
}

/// Builder for [`PopupController`]
pub struct PopupBuilder {
    loader: Arc<SdkLoader>,
    backend: Arc<dyn OrderBackend>,
    container: Arc<dyn Container>,
    config: WidgetConfig,
    style: ButtonStyle,
    on_success: Callback,
    on_close: Callback,
}

impl PopupBuilder {
    #[must_use]
    pub fn config(mut self, config: WidgetConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn style(mut self, style: ButtonStyle) -> Self {
        self.style = style;
        self
    }

    #[must_use]
    pub fn on_success(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_success = Arc::new(callback);
        self
    }

    #[must_use]
    pub fn on_close(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_close = Arc::new(callback);
        self
    }

    pub fn build(self) -> PopupController {
        PopupController {
            inner: Arc::new(Inner {
                loader: self.loader,
                backend: self.backend,
                renderer: WidgetRenderer::new(self.container),
                config: self.config,
                style: self.style,
                state: Mutex::new(PopupState::Intro),
                generation: Generation::new(),
                orchestrator: Mutex::new(None),
                success_fired: AtomicBool::new(false),
                on_success: self.on_success,
                on_close: self.on_close,
            }),
        }
    }
}

/// One mounted popup instance
pub struct PopupController {
    inner: Arc<Inner>,
}

impl PopupController {
    pub fn builder(
        loader: Arc<SdkLoader>,
        backend: Arc<dyn OrderBackend>,
        container: Arc<dyn Container>,
    ) -> PopupBuilder {
        PopupBuilder {
            loader,
            backend,
            container,
            config: WidgetConfig::default(),
            style: ButtonStyle::default(),
            on_success: Arc::new(|| {}),
            on_close: Arc::new(|| {}),
        }
    }

    pub fn state(&self) -> PopupState {
        lock(&self.inner.state).clone()
    }

    pub fn ui_step(&self) -> Option<UiStep> {
        self.state().ui_step()
    }

    pub fn is_processing(&self) -> bool {
        self.state().is_processing()
    }

    pub fn render_status(&self) -> RenderStatus {
        self.inner.renderer.status()
    }

    /// Orchestrator bound to the currently mounted widget
    pub fn orchestrator(&self) -> Option<Arc<TransactionOrchestrator>> {
        lock(&self.inner.orchestrator).clone()
    }

    /// Intro → payment: load the SDK, then mount the widget
    pub async fn show_payment(&self) -> PopupState {
        {
            let mut state = lock(&self.inner.state);
            if *state != PopupState::Intro {
                tracing::debug!(state = ?*state, "show_payment ignored");
                return state.clone();
            }
            *state = PopupState::Payment(PaymentStage::Loading);
        }
        self.inner.enter_payment().await
    }

    /// "Try again": full reset, then the load/render sequence from scratch
    pub async fn retry(&self) -> PopupState {
        {
            let mut state = lock(&self.inner.state);
            if state.notice().is_none() {
                tracing::debug!(state = ?*state, "retry ignored");
                return state.clone();
            }
            self.inner.teardown_locked();
            *state = PopupState::Payment(PaymentStage::Loading);
        }
        tracing::info!("Retrying payment setup");
        self.inner.enter_payment().await
    }

    /// Payment → intro; refused while a capture is in flight
    pub fn back(&self) -> bool {
        let mut state = lock(&self.inner.state);
        match *state {
            PopupState::Payment(PaymentStage::Processing) => {
                tracing::debug!("back ignored while processing");
                false
            }
            PopupState::Payment(_) => {
                self.inner.teardown_locked();
                *state = PopupState::Intro;
                true
            }
            PopupState::Intro | PopupState::Closed => false,
        }
    }

    /// Dismiss the popup; refused while a capture is in flight
    pub fn close(&self) -> bool {
        {
            let mut state = lock(&self.inner.state);
            match *state {
                PopupState::Payment(PaymentStage::Processing) => {
                    tracing::debug!("close ignored while processing");
                    return false;
                }
                PopupState::Closed => return false,
                _ => {}
            }
            self.inner.teardown_locked();
            *state = PopupState::Closed;
        }
        tracing::info!("Payment popup closed");
        (self.inner.on_close)();
        true
    }

    /// Removed from the host tree: tear down unconditionally
    pub fn unmount(&self) {
        let mut state = lock(&self.inner.state);
        self.inner.teardown_locked();
        *state = PopupState::Closed;
    }
}

impl Drop for PopupController {
    fn drop(&mut self) {
        self.unmount();
    }
}

impl Inner {
    async fn enter_payment(self: &Arc<Self>) -> PopupState {
        let token = self.generation.token();

        let sdk = match self.loader.ensure_loaded(&self.config.sdk).await {
            Ok(sdk) => sdk,
            Err(e) => {
                self.set_notice(&token, Notice::from(&e));
                return self.current();
            }
        };

        if !self.transition(&token, PopupState::Payment(PaymentStage::Rendering)) {
            return self.current();
        }

        // One frame for the host to attach the container
        tokio::time::sleep(self.config.render_delay).await;
        if !token.is_current() {
            return self.current();
        }

        let observer = Arc::new(ScopedObserver {
            inner: Arc::downgrade(self),
            token: token.clone(),
        });
        let orchestrator = Arc::new(
            TransactionOrchestrator::new(
                Arc::clone(&self.backend),
                Arc::clone(&sdk),
                self.config.order.clone(),
                observer,
            )
            .with_primary_timeout(self.config.primary_timeout),
        );
        *lock(&self.orchestrator) = Some(Arc::clone(&orchestrator));

        match self.renderer.render(&sdk, &self.style, orchestrator).await {
            Ok(RenderStatus::Rendered) => {
                self.transition(&token, PopupState::Payment(PaymentStage::Ready));
            }
            Ok(status) => {
                tracing::debug!(status = ?status, "Widget mount owned elsewhere");
            }
            Err(e) => self.set_notice(&token, Notice::from(&e)),
        }
        self.current()
    }

    fn current(&self) -> PopupState {
        lock(&self.state).clone()
    }

    /// Apply `next` only if `token` still names this instance
    fn transition(&self, token: &ActiveToken, next: PopupState) -> bool {
        let mut state = lock(&self.state);
        if !token.is_current() {
            tracing::debug!(generation = token.generation(), next = ?next, "Stale continuation dropped");
            return false;
        }
        tracing::debug!(from = ?*state, to = ?next, "Popup transition");
        *state = next;
        true
    }

    fn set_notice(&self, token: &ActiveToken, notice: Notice) {
        self.transition(token, PopupState::Payment(PaymentStage::Error(notice)));
    }

    /// Caller holds the state lock
    fn teardown_locked(&self) {
        self.generation.advance();
        self.renderer.teardown();
        lock(&self.orchestrator).take();
    }

    fn processing_changed(&self, token: &ActiveToken, processing: bool) {
        let mut state = lock(&self.state);
        if !token.is_current() {
            return;
        }
        let next = match (&*state, processing) {
            (PopupState::Payment(_), true) => Some(PaymentStage::Processing),
            (PopupState::Payment(PaymentStage::Processing), false) => Some(PaymentStage::Ready),
            _ => None,
        };
        if let Some(stage) = next {
            *state = PopupState::Payment(stage);
        }
    }

    fn completed(&self, token: &ActiveToken) {
        if self.success_fired.swap(true, Ordering::SeqCst) {
            return;
        }
        {
            let mut state = lock(&self.state);
            if token.is_current() {
                self.teardown_locked();
                *state = PopupState::Closed;
            } else {
                tracing::warn!("Payment completed after popup teardown");
            }
        }
        (self.on_success)();
    }
}

/// Observer bound to one generation of one popup
struct ScopedObserver {
    inner: Weak<Inner>,
    token: ActiveToken,
}

impl ScopedObserver {
    fn with_inner(&self, f: impl FnOnce(&Inner)) {
        match self.inner.upgrade() {
            Some(inner) => f(inner.as_ref()),
            None => tracing::debug!("Popup dropped, transaction outcome discarded"),
        }
    }
}

impl TransactionObserver for ScopedObserver {
    fn processing_changed(&self, processing: bool) {
        self.with_inner(|inner| inner.processing_changed(&self.token, processing));
    }

    fn completed(&self, _result: &CaptureResult) {
        self.with_inner(|inner| inner.completed(&self.token));
    }

    fn not_completed(&self, _result: &CaptureResult) {
        self.with_inner(|inner| inner.set_notice(&self.token, Notice::not_completed()));
    }

    fn failed(&self, error: &WidgetError) {
        self.with_inner(|inner| inner.set_notice(&self.token, Notice::from(error)));
    }

    fn cancelled(&self) {
        self.with_inner(|inner| inner.set_notice(&self.token, Notice::cancelled()));
    }

    fn sdk_error(&self, _fault: &SdkFault) {
        self.with_inner(|inner| inner.set_notice(&self.token, Notice::sdk_error()));
    }
}
