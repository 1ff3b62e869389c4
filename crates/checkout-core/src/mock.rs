//! Mock Collaborators
//!
//! In-process stand-ins for the page, the provider SDK and the order
//! endpoints. Used by the test suites and for headless demos; behavior is
//! switchable at runtime so a test can fail a load, then let the retry pass.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::{Result, SdkFault, TierError, WidgetError};
use crate::loader::ScriptHost;
use crate::lock;
use crate::model::{COMPLETED_STATUS, CaptureResult, OrderHandle, OrderRequest};
use crate::render::Container;
use crate::sdk::{ButtonStyle, PaymentSdk, SdkRequest, Widget, WidgetHooks};
use crate::transaction::{OrderBackend, TransactionObserver};

/// How the next script load behaves
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScriptBehavior {
    #[default]
    Load,
    TransportError,
    LoadWithoutEntryPoint,
}

/// Page with a script list and an SDK global
pub struct MockScriptHost {
    sdk: Arc<MockSdk>,
    scripts: Mutex<Vec<String>>,
    behavior: Mutex<ScriptBehavior>,
    load_delay: Mutex<Duration>,
    entry_defined: AtomicBool,
    loads: AtomicUsize,
    removals: AtomicUsize,
}

impl Default for MockScriptHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MockScriptHost {
    pub fn new() -> Self {
        Self::with_sdk(Arc::new(MockSdk::new()))
    }

    /// Host whose script defines `sdk` as the entry point
    pub fn with_sdk(sdk: Arc<MockSdk>) -> Self {
        Self {
            sdk,
            scripts: Mutex::new(Vec::new()),
            behavior: Mutex::new(ScriptBehavior::Load),
            load_delay: Mutex::new(Duration::ZERO),
            entry_defined: AtomicBool::new(false),
            loads: AtomicUsize::new(0),
            removals: AtomicUsize::new(0),
        }
    }

    pub fn set_behavior(&self, behavior: ScriptBehavior) {
        *lock(&self.behavior) = behavior;
    }

    pub fn set_load_delay(&self, delay: Duration) {
        *lock(&self.load_delay) = delay;
    }

    /// Pretend a script tag was already on the page
    pub fn preload_script(&self, src: &str) {
        lock(&self.scripts).push(src.to_string());
    }

    pub fn scripts(&self) -> Vec<String> {
        lock(&self.scripts).clone()
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Calls to `remove_scripts`
    pub fn removals(&self) -> usize {
        self.removals.load(Ordering::SeqCst)
    }

    pub fn sdk(&self) -> &Arc<MockSdk> {
        &self.sdk
    }
}

#[async_trait]
impl ScriptHost for MockScriptHost {
    fn remove_scripts(&self, fragment: &str) -> usize {
        self.removals.fetch_add(1, Ordering::SeqCst);
        let mut scripts = lock(&self.scripts);
        let before = scripts.len();
        scripts.retain(|src| !src.contains(fragment));
        before - scripts.len()
    }

    async fn load_script(&self, src: &str) -> std::result::Result<(), String> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        lock(&self.scripts).push(src.to_string());

        let delay = *lock(&self.load_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let behavior = *lock(&self.behavior);
        match behavior {
            ScriptBehavior::Load => {
                self.entry_defined.store(true, Ordering::SeqCst);
                Ok(())
            }
            ScriptBehavior::LoadWithoutEntryPoint => Ok(()),
            ScriptBehavior::TransportError => Err(format!("network error loading {src}")),
        }
    }

    fn entry_point(&self) -> Option<Arc<dyn PaymentSdk>> {
        if self.entry_defined.load(Ordering::SeqCst) {
            let sdk: Arc<dyn PaymentSdk> = self.sdk.clone();
            Some(sdk)
        } else {
            None
        }
    }
}

/// How constructed widgets mount
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RenderBehavior {
    #[default]
    Mount,
    /// Mount promise rejects
    Fail,
    /// Constructor throws
    ConstructFail,
    /// Mount after a delay
    Delay(Duration),
}

/// Provider SDK double
#[derive(Default)]
pub struct MockSdk {
    render_behavior: Mutex<RenderBehavior>,
    requests: Mutex<Vec<SdkRequest>>,
    request_failure: Mutex<Option<String>>,
    response_override: Mutex<Option<Value>>,
    hooks: Mutex<Option<Arc<dyn WidgetHooks>>>,
    order_seq: AtomicUsize,
    buttons_built: AtomicUsize,
    widgets_closed: Arc<AtomicUsize>,
}

impl MockSdk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_render_behavior(&self, behavior: RenderBehavior) {
        *lock(&self.render_behavior) = behavior;
    }

    /// Make every SDK-direct request fail
    pub fn fail_requests(&self, message: &str) {
        *lock(&self.request_failure) = Some(message.to_string());
    }

    /// Answer every SDK-direct request with `response`
    pub fn respond_with(&self, response: Value) {
        *lock(&self.response_override) = Some(response);
    }

    pub fn requests(&self) -> Vec<SdkRequest> {
        lock(&self.requests).clone()
    }

    /// Hooks of the most recently constructed widget, for driving buyer actions
    pub fn last_hooks(&self) -> Option<Arc<dyn WidgetHooks>> {
        lock(&self.hooks).clone()
    }

    pub fn buttons_built(&self) -> usize {
        self.buttons_built.load(Ordering::SeqCst)
    }

    /// Widgets unmounted through `Widget::close`
    pub fn widgets_closed(&self) -> usize {
        self.widgets_closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentSdk for MockSdk {
    fn buttons(
        &self,
        _style: &ButtonStyle,
        hooks: Arc<dyn WidgetHooks>,
    ) -> std::result::Result<Box<dyn Widget>, SdkFault> {
        let behavior = *lock(&self.render_behavior);
        if behavior == RenderBehavior::ConstructFail {
            return Err(SdkFault::new("Buttons constructor threw"));
        }
        *lock(&self.hooks) = Some(hooks);
        self.buttons_built.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockWidget {
            behavior,
            mounted: Mutex::new(None),
            closed: Arc::clone(&self.widgets_closed),
        }))
    }

    async fn request(&self, request: SdkRequest) -> std::result::Result<Value, SdkFault> {
        lock(&self.requests).push(request.clone());

        if let Some(message) = lock(&self.request_failure).clone() {
            return Err(SdkFault::new(message));
        }
        if let Some(response) = lock(&self.response_override).clone() {
            return Ok(response);
        }

        if let Some(id) = request
            .url
            .strip_prefix("/v2/checkout/orders/")
            .and_then(|rest| rest.strip_suffix("/capture"))
        {
            return Ok(json!({ "id": id, "status": COMPLETED_STATUS }));
        }

        let n = self.order_seq.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(json!({ "id": format!("SDK-ORDER-{n}"), "status": "CREATED" }))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

const BUTTONS_NODE: &str = "paypal-buttons";

struct MockWidget {
    behavior: RenderBehavior,
    mounted: Mutex<Option<Arc<dyn Container>>>,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl Widget for MockWidget {
    async fn render(&self, container: Arc<dyn Container>) -> std::result::Result<(), SdkFault> {
        match self.behavior {
            RenderBehavior::Fail => return Err(SdkFault::new("render promise rejected")),
            RenderBehavior::Delay(delay) => tokio::time::sleep(delay).await,
            RenderBehavior::Mount | RenderBehavior::ConstructFail => {}
        }
        container.append_child(BUTTONS_NODE.into());
        *lock(&self.mounted) = Some(container);
        Ok(())
    }

    fn close(&self) {
        if let Some(container) = lock(&self.mounted).take() {
            container.remove_child(BUTTONS_NODE);
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Primary-tier double
pub struct MockBackend {
    create_failure: Mutex<Option<TierError>>,
    capture_failure: Mutex<Option<TierError>>,
    capture_status: Mutex<String>,
    delay: Mutex<Duration>,
    capture_delay: Mutex<Duration>,
    creates: AtomicUsize,
    captures: AtomicUsize,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            create_failure: Mutex::new(None),
            capture_failure: Mutex::new(None),
            capture_status: Mutex::new(COMPLETED_STATUS.into()),
            delay: Mutex::new(Duration::ZERO),
            capture_delay: Mutex::new(Duration::ZERO),
            creates: AtomicUsize::new(0),
            captures: AtomicUsize::new(0),
        }
    }

    pub fn fail_create(&self, error: TierError) {
        *lock(&self.create_failure) = Some(error);
    }

    pub fn fail_capture(&self, error: TierError) {
        *lock(&self.capture_failure) = Some(error);
    }

    /// Status string returned by successful captures
    pub fn set_capture_status(&self, status: &str) {
        *lock(&self.capture_status) = status.to_string();
    }

    /// Delay before create answers
    pub fn set_delay(&self, delay: Duration) {
        *lock(&self.delay) = delay;
    }

    pub fn set_capture_delay(&self, delay: Duration) {
        *lock(&self.capture_delay) = delay;
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn captures(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrderBackend for MockBackend {
    async fn create_order(&self, _request: &OrderRequest) -> std::result::Result<OrderHandle, TierError> {
        let n = self.creates.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = *lock(&self.delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = lock(&self.create_failure).clone() {
            return Err(error);
        }
        Ok(OrderHandle::new(format!("PRIMARY-ORDER-{n}")))
    }

    async fn capture_order(&self, handle: &OrderHandle) -> std::result::Result<CaptureResult, TierError> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        let delay = *lock(&self.capture_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = lock(&self.capture_failure).clone() {
            return Err(error);
        }
        let status = lock(&self.capture_status).clone();
        Ok(CaptureResult::from_payload(json!({ "id": handle.id, "status": status })))
    }
}

/// Something the orchestrator reported
#[derive(Clone, Debug, PartialEq)]
pub enum ObservedEvent {
    Processing(bool),
    Completed(CaptureResult),
    NotCompleted(CaptureResult),
    Failed(WidgetError),
    Cancelled,
    SdkError(SdkFault),
}

/// Observer that records everything
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ObservedEvent>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<ObservedEvent> {
        lock(&self.events).clone()
    }

    pub fn completions(&self) -> usize {
        self.count(|e| matches!(e, ObservedEvent::Completed(_)))
    }

    pub fn not_completed(&self) -> usize {
        self.count(|e| matches!(e, ObservedEvent::NotCompleted(_)))
    }

    pub fn cancellations(&self) -> usize {
        self.count(|e| matches!(e, ObservedEvent::Cancelled))
    }

    pub fn failures(&self) -> Vec<WidgetError> {
        lock(&self.events)
            .iter()
            .filter_map(|e| match e {
                ObservedEvent::Failed(error) => Some(error.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn processing_events(&self) -> Vec<bool> {
        lock(&self.events)
            .iter()
            .filter_map(|e| match e {
                ObservedEvent::Processing(flag) => Some(*flag),
                _ => None,
            })
            .collect()
    }

    fn count(&self, pred: impl Fn(&ObservedEvent) -> bool) -> usize {
        lock(&self.events).iter().filter(|e| pred(e)).count()
    }

    fn push(&self, event: ObservedEvent) {
        lock(&self.events).push(event);
    }
}

impl TransactionObserver for RecordingObserver {
    fn processing_changed(&self, processing: bool) {
        self.push(ObservedEvent::Processing(processing));
    }

    fn completed(&self, result: &CaptureResult) {
        self.push(ObservedEvent::Completed(result.clone()));
    }

    fn not_completed(&self, result: &CaptureResult) {
        self.push(ObservedEvent::NotCompleted(result.clone()));
    }

    fn failed(&self, error: &WidgetError) {
        self.push(ObservedEvent::Failed(error.clone()));
    }

    fn cancelled(&self) {
        self.push(ObservedEvent::Cancelled);
    }

    fn sdk_error(&self, fault: &SdkFault) {
        self.push(ObservedEvent::SdkError(fault.clone()));
    }
}

/// Hooks that do nothing, for mounting without a transaction
pub struct NoopHooks;

#[async_trait]
impl WidgetHooks for NoopHooks {
    async fn create_order(&self) -> Result<String> {
        Err(WidgetError::InvalidPhase("no transaction attached".into()))
    }

    async fn on_approve(&self, _order_id: String) -> Result<()> {
        Ok(())
    }

    fn on_cancel(&self, _details: Value) {}

    fn on_error(&self, _fault: SdkFault) {}
}
