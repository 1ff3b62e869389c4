//! Widget Renderer
//!
//! Mounts exactly one widget into the host container and tears it down on
//! request. Teardown is synchronous and safe from any status, including
//! while a mount is still in flight; the abandoned mount's continuation sees
//! a stale token, closes its own widget and leaves the renderer alone.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{Result, WidgetError};
use crate::lock;
use crate::model::RenderStatus;
use crate::sdk::{ButtonStyle, PaymentSdk, WidgetHooks};
use crate::token::{ActiveToken, Generation};

/// Host region the widget is mounted into
pub trait Container: Send + Sync {
    /// The region exists in the host tree
    fn is_attached(&self) -> bool;

    fn child_count(&self) -> usize;

    fn append_child(&self, node: String);

    /// Remove one child equal to `node`; false if none matched
    fn remove_child(&self, node: &str) -> bool;

    /// Remove all children
    fn clear(&self);
}

/// In-process container
#[derive(Debug)]
pub struct MemoryContainer {
    children: Mutex<Vec<String>>,
    attached: AtomicBool,
}

impl Default for MemoryContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryContainer {
    pub fn new() -> Self {
        Self {
            children: Mutex::new(Vec::new()),
            attached: AtomicBool::new(true),
        }
    }

    /// A container the host has not attached yet
    pub fn detached() -> Self {
        let container = Self::new();
        container.detach();
        container
    }

    pub fn attach(&self) {
        self.attached.store(true, Ordering::SeqCst);
    }

    pub fn detach(&self) {
        self.attached.store(false, Ordering::SeqCst);
    }

    pub fn children(&self) -> Vec<String> {
        lock(&self.children).clone()
    }
}

impl Container for MemoryContainer {
    fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }

    fn child_count(&self) -> usize {
        lock(&self.children).len()
    }

    fn append_child(&self, node: String) {
        lock(&self.children).push(node);
    }

    fn remove_child(&self, node: &str) -> bool {
        let mut children = lock(&self.children);
        match children.iter().rposition(|child| child == node) {
            Some(index) => {
                children.remove(index);
                true
            }
            None => false,
        }
    }

    fn clear(&self) {
        lock(&self.children).clear();
    }
}

/// Owns the mount lifecycle for one popup instance
pub struct WidgetRenderer {
    container: Arc<dyn Container>,
    status: Mutex<RenderStatus>,
    generation: Generation,
    mounts: AtomicUsize,
}

impl WidgetRenderer {
    pub fn new(container: Arc<dyn Container>) -> Self {
        Self {
            container,
            status: Mutex::new(RenderStatus::NotRendered),
            generation: Generation::new(),
            mounts: AtomicUsize::new(0),
        }
    }

    pub fn status(&self) -> RenderStatus {
        *lock(&self.status)
    }

    pub fn container(&self) -> &Arc<dyn Container> {
        &self.container
    }

    /// Successful mounts over the renderer's lifetime
    pub fn mounts(&self) -> usize {
        self.mounts.load(Ordering::SeqCst)
    }

    /// Construct and mount the widget
    ///
    /// While a mount is in flight or live this returns the current status
    /// without touching the container.
    pub async fn render(
        &self,
        sdk: &Arc<dyn PaymentSdk>,
        style: &ButtonStyle,
        hooks: Arc<dyn WidgetHooks>,
    ) -> Result<RenderStatus> {
        let token = {
            let mut status = lock(&self.status);
            if status.is_occupied() {
                tracing::debug!(status = ?*status, "Render skipped, widget already mounting or mounted");
                return Ok(*status);
            }
            if !self.container.is_attached() {
                *status = RenderStatus::Failed;
                return Err(WidgetError::Render("container is not attached".into()));
            }
            self.container.clear();
            *status = RenderStatus::Rendering;
            self.generation.token()
        };

        tracing::debug!(generation = token.generation(), "Rendering payment widget");

        let widget = match sdk.buttons(style, hooks) {
            Ok(widget) => widget,
            Err(fault) => return self.fail(&token, &fault.message),
        };

        let mounted = widget.render(Arc::clone(&self.container)).await;

        if !token.is_current() {
            tracing::debug!(generation = token.generation(), "Mount finished after teardown, closing it");
            if mounted.is_ok() {
                widget.close();
            }
            return Ok(self.status());
        }

        match mounted {
            Ok(()) => {
                *lock(&self.status) = RenderStatus::Rendered;
                self.mounts.fetch_add(1, Ordering::SeqCst);
                tracing::info!("Payment widget rendered");
                Ok(RenderStatus::Rendered)
            }
            Err(fault) => self.fail(&token, &fault.message),
        }
    }

    fn fail(&self, token: &ActiveToken, message: &str) -> Result<RenderStatus> {
        if token.is_current() {
            *lock(&self.status) = RenderStatus::Failed;
        }
        tracing::error!(error = %message, "Payment widget failed to render");
        Err(WidgetError::Render(message.to_string()))
    }

    /// Empty the container and reset to `NotRendered`, from any status
    pub fn teardown(&self) {
        let mut status = lock(&self.status);
        self.generation.advance();
        self.container.clear();
        if *status != RenderStatus::NotRendered {
            tracing::debug!(from = ?*status, "Tearing down payment widget");
        }
        *status = RenderStatus::NotRendered;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockSdk, NoopHooks, RenderBehavior};
    use std::time::Duration;

    fn setup(sdk: MockSdk) -> (Arc<MemoryContainer>, WidgetRenderer, Arc<dyn PaymentSdk>) {
        let container = Arc::new(MemoryContainer::new());
        let renderer = WidgetRenderer::new(container.clone());
        (container, renderer, Arc::new(sdk))
    }

    #[tokio::test]
    async fn test_render_mounts_once() {
        let (container, renderer, sdk) = setup(MockSdk::new());
        let style = ButtonStyle::default();

        let status = renderer.render(&sdk, &style, Arc::new(NoopHooks)).await.unwrap();
        assert_eq!(status, RenderStatus::Rendered);
        assert_eq!(container.child_count(), 1);

        let again = renderer.render(&sdk, &style, Arc::new(NoopHooks)).await.unwrap();
        assert_eq!(again, RenderStatus::Rendered);
        assert_eq!(container.child_count(), 1);
        assert_eq!(renderer.mounts(), 1);
    }

    #[tokio::test]
    async fn test_render_clears_previous_contents() {
        let (container, renderer, sdk) = setup(MockSdk::new());
        container.append_child("spinner".into());

        renderer.render(&sdk, &ButtonStyle::default(), Arc::new(NoopHooks)).await.unwrap();
        assert_eq!(container.children(), vec!["paypal-buttons".to_string()]);
    }

    #[tokio::test]
    async fn test_render_while_rendering_is_a_no_op() {
        let mock = MockSdk::new();
        mock.set_render_behavior(RenderBehavior::Delay(Duration::from_millis(50)));
        let (container, renderer, sdk) = setup(mock);
        let renderer = Arc::new(renderer);

        let first = tokio::spawn({
            let renderer = Arc::clone(&renderer);
            let sdk = Arc::clone(&sdk);
            async move { renderer.render(&sdk, &ButtonStyle::default(), Arc::new(NoopHooks)).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let second = renderer.render(&sdk, &ButtonStyle::default(), Arc::new(NoopHooks)).await.unwrap();
        assert_eq!(second, RenderStatus::Rendering);

        assert_eq!(first.await.unwrap().unwrap(), RenderStatus::Rendered);
        assert_eq!(container.child_count(), 1);
    }

    #[tokio::test]
    async fn test_render_failure_is_recoverable() {
        let mock = MockSdk::new();
        mock.set_render_behavior(RenderBehavior::Fail);
        let (container, renderer, sdk) = setup(mock);

        let err = renderer.render(&sdk, &ButtonStyle::default(), Arc::new(NoopHooks)).await.unwrap_err();
        assert!(matches!(err, WidgetError::Render(_)));
        assert_eq!(renderer.status(), RenderStatus::Failed);
        assert_eq!(container.child_count(), 0);
    }

    #[tokio::test]
    async fn test_construct_failure_is_render_error() {
        let mock = MockSdk::new();
        mock.set_render_behavior(RenderBehavior::ConstructFail);
        let (_container, renderer, sdk) = setup(mock);

        let err = renderer.render(&sdk, &ButtonStyle::default(), Arc::new(NoopHooks)).await.unwrap_err();
        assert!(matches!(err, WidgetError::Render(_)));
        assert_eq!(renderer.status(), RenderStatus::Failed);
    }

    #[tokio::test]
    async fn test_detached_container_fails() {
        let container = Arc::new(MemoryContainer::detached());
        let renderer = WidgetRenderer::new(container);
        let sdk: Arc<dyn PaymentSdk> = Arc::new(MockSdk::new());

        let err = renderer.render(&sdk, &ButtonStyle::default(), Arc::new(NoopHooks)).await.unwrap_err();
        assert!(matches!(err, WidgetError::Render(_)));
    }

    #[tokio::test]
    async fn test_teardown_from_every_status() {
        // NotRendered
        let (container, renderer, sdk) = setup(MockSdk::new());
        renderer.teardown();
        assert_eq!(renderer.status(), RenderStatus::NotRendered);
        assert_eq!(container.child_count(), 0);

        // Rendered
        renderer.render(&sdk, &ButtonStyle::default(), Arc::new(NoopHooks)).await.unwrap();
        renderer.teardown();
        assert_eq!(renderer.status(), RenderStatus::NotRendered);
        assert_eq!(container.child_count(), 0);

        // Failed
        let mock = MockSdk::new();
        mock.set_render_behavior(RenderBehavior::Fail);
        let (container, renderer, sdk) = setup(mock);
        let _ = renderer.render(&sdk, &ButtonStyle::default(), Arc::new(NoopHooks)).await;
        renderer.teardown();
        assert_eq!(renderer.status(), RenderStatus::NotRendered);
        assert_eq!(container.child_count(), 0);
    }

    #[tokio::test]
    async fn test_teardown_while_rendering_abandons_mount() {
        let mock = MockSdk::new();
        mock.set_render_behavior(RenderBehavior::Delay(Duration::from_millis(50)));
        let (_container, renderer, sdk) = setup(mock);
        let renderer = Arc::new(renderer);

        let pending = tokio::spawn({
            let renderer = Arc::clone(&renderer);
            let sdk = Arc::clone(&sdk);
            async move { renderer.render(&sdk, &ButtonStyle::default(), Arc::new(NoopHooks)).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(renderer.status(), RenderStatus::Rendering);

        renderer.teardown();
        assert_eq!(renderer.status(), RenderStatus::NotRendered);

        pending.await.unwrap().unwrap();
        assert_eq!(renderer.status(), RenderStatus::NotRendered);
        assert_eq!(renderer.mounts(), 0);
    }

    #[tokio::test]
    async fn test_abandoned_mount_does_not_duplicate_remount() {
        let mock = Arc::new(MockSdk::new());
        mock.set_render_behavior(RenderBehavior::Delay(Duration::from_millis(50)));
        let container = Arc::new(MemoryContainer::new());
        let renderer = Arc::new(WidgetRenderer::new(container.clone()));
        let sdk: Arc<dyn PaymentSdk> = mock.clone();

        let abandoned = tokio::spawn({
            let renderer = Arc::clone(&renderer);
            let sdk = Arc::clone(&sdk);
            async move { renderer.render(&sdk, &ButtonStyle::default(), Arc::new(NoopHooks)).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        renderer.teardown();

        // Re-opened before the first mount resolves; this one resolves later
        mock.set_render_behavior(RenderBehavior::Delay(Duration::from_millis(80)));
        let status = renderer.render(&sdk, &ButtonStyle::default(), Arc::new(NoopHooks)).await.unwrap();
        abandoned.await.unwrap().unwrap();

        assert_eq!(status, RenderStatus::Rendered);
        assert_eq!(renderer.status(), RenderStatus::Rendered);
        assert_eq!(container.child_count(), 1);
        assert_eq!(mock.widgets_closed(), 1);
    }
}
