//! # checkout-core
//!
//! Embedded payment popup: SDK loading, widget mounting and the
//! create/approve/capture transaction, with the page and the provider SDK
//! behind traits.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         PopupController                          │
//! │  ┌─────────────┐  ┌────────────────┐  ┌───────────────────────┐  │
//! │  │  SdkLoader  │──│ WidgetRenderer │──│ Transaction           │  │
//! │  │ (ScriptHost)│  │  (Container)   │  │ Orchestrator          │  │
//! │  └─────────────┘  └────────────────┘  │ OrderBackend ──▶      │  │
//! │                                       │ PaymentSdk (fallback) │  │
//! │                                       └───────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every async continuation carries a generation token; teardown advances
//! the generation so late results are dropped instead of touching a popup
//! that has moved on.

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod config;
pub mod error;
pub mod loader;
pub mod mock;
pub mod model;
pub mod popup;
pub mod render;
pub mod sdk;
pub mod token;
pub mod transaction;
pub mod trial;

pub use config::{EndpointConfig, Environment, SdkConfig, WidgetConfig};
pub use error::{Result, SdkFault, TierError, WidgetError};
pub use loader::{ScriptHost, SdkLoader};
pub use model::{
    CaptureOrderBody, CaptureResult, CaptureStatus, CreateOrderBody, CreateOrderResponse, DEFAULT_DESCRIPTION, OrderHandle,
    OrderRequest, RenderStatus, SdkStatus, TransactionPhase, UiStep, UserIdentity,
};
pub use popup::{Notice, NoticeKind, PaymentStage, PopupController, PopupState};
pub use render::{Container, MemoryContainer, WidgetRenderer};
pub use sdk::{ButtonStyle, PaymentSdk, SdkRequest, Widget, WidgetHooks};
pub use transaction::{OrderBackend, Tier, TransactionObserver, TransactionOrchestrator};
pub use trial::TrialGate;

/// Lock a mutex, taking the data even if a holder panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
