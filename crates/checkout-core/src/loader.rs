//! SDK Loader
//!
//! Fetches the provider script at most once per page. The loader is shared
//! (`Arc<SdkLoader>`) by every popup instance; only `ensure_loaded` and the
//! status read are public.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::config::{SDK_SCRIPT_MARKER, SdkConfig};
use crate::error::{Result, WidgetError};
use crate::lock;
use crate::model::SdkStatus;
use crate::sdk::PaymentSdk;

/// The page the script is injected into
#[async_trait]
pub trait ScriptHost: Send + Sync {
    /// Remove every script whose source contains `fragment`
    fn remove_scripts(&self, fragment: &str) -> usize;

    /// Inject a script and resolve when it fires load (or error)
    async fn load_script(&self, src: &str) -> std::result::Result<(), String>;

    /// The SDK global, if the script defined it
    fn entry_point(&self) -> Option<Arc<dyn PaymentSdk>>;
}

struct LoaderState {
    status: SdkStatus,
    sdk: Option<Arc<dyn PaymentSdk>>,
}

/// Process-wide SDK readiness
pub struct SdkLoader {
    host: Arc<dyn ScriptHost>,
    state: Mutex<LoaderState>,
    in_flight: tokio::sync::Mutex<()>,
    injections: AtomicUsize,
}

impl SdkLoader {
    pub fn new(host: Arc<dyn ScriptHost>) -> Self {
        Self {
            host,
            state: Mutex::new(LoaderState {
                status: SdkStatus::NotLoaded,
                sdk: None,
            }),
            in_flight: tokio::sync::Mutex::new(()),
            injections: AtomicUsize::new(0),
        }
    }

    pub fn status(&self) -> SdkStatus {
        lock(&self.state).status
    }

    /// Number of script injections performed so far
    pub fn injections(&self) -> usize {
        self.injections.load(Ordering::SeqCst)
    }

    fn ready_sdk(&self) -> Option<Arc<dyn PaymentSdk>> {
        let state = lock(&self.state);
        match (state.status, &state.sdk) {
            (SdkStatus::Ready, Some(sdk)) => Some(Arc::clone(sdk)),
            _ => None,
        }
    }

    fn finish(&self, status: SdkStatus, sdk: Option<Arc<dyn PaymentSdk>>) {
        let mut state = lock(&self.state);
        state.status = status;
        state.sdk = sdk;
    }

    /// Load the SDK unless it is already ready
    ///
    /// Concurrent callers queue behind the load in flight and share its
    /// outcome if it succeeded. A failed load leaves the loader retryable.
    pub async fn ensure_loaded(&self, config: &SdkConfig) -> Result<Arc<dyn PaymentSdk>> {
        let src = config.script_url().inspect_err(|e| {
            tracing::error!(client_id = %config.masked_client_id(), error = %e, "SDK credential rejected");
        })?;

        if let Some(sdk) = self.ready_sdk() {
            tracing::debug!("SDK already loaded");
            return Ok(sdk);
        }

        let _guard = self.in_flight.lock().await;
        if let Some(sdk) = self.ready_sdk() {
            return Ok(sdk);
        }

        lock(&self.state).status = SdkStatus::Loading;

        let removed = self.host.remove_scripts(SDK_SCRIPT_MARKER);
        if removed > 0 {
            tracing::debug!(removed, "Removed stale SDK scripts");
        }

        tracing::info!(
            client_id = %config.masked_client_id(),
            environment = %config.environment,
            "Loading payment SDK"
        );
        self.injections.fetch_add(1, Ordering::SeqCst);

        if let Err(e) = self.host.load_script(&src).await {
            tracing::error!(error = %e, "SDK script failed to load");
            self.finish(SdkStatus::Failed, None);
            return Err(WidgetError::SdkLoad(e));
        }

        if let Some(sdk) = self.host.entry_point() {
            tracing::info!(sdk = sdk.name(), "Payment SDK ready");
            self.finish(SdkStatus::Ready, Some(Arc::clone(&sdk)));
            Ok(sdk)
        } else {
            tracing::error!("SDK script loaded but entry point is missing");
            self.finish(SdkStatus::Failed, None);
            Err(WidgetError::SdkLoad("entry point not present after load".into()))
        }
    }
}
