//! # Booking Wizard
//!
//! Multi-step appointment booking flow: service selection, date and time
//! selection, client information, then confirmation and payment.
//!
//! The flow is a reducer over [`WizardState`]. Remote calls to the booking
//! service are effects tagged with a per-resource generation, so only the
//! most recently issued request for a resource ever lands in state.
//!
//! ## Example
//!
//! ```ignore
//! use booking_wizard::{BookingFlow, WizardConfig, WizardEnvironment};
//!
//! let flow = BookingFlow::new(WizardEnvironment::new(
//!     Arc::new(service),
//!     Arc::new(SystemClock),
//!     Arc::new(ConnectivitySignal::new(true)),
//!     WizardConfig::from_env()?,
//! ));
//!
//! flow.start().await?.wait().await;
//! flow.select_service(ServiceId::new("service-1")).await?;
//! flow.go_next().await?.wait().await;
//! ```

pub mod config;
pub mod flow;
pub mod navigation;
pub mod reducer;
pub mod types;
pub mod validation;

pub use config::{ConfigError, WizardConfig};
pub use flow::{BookingFlow, WizardStore};
pub use navigation::NavigationControls;
pub use reducer::{OFFLINE_MESSAGE, WizardEnvironment, WizardReducer};
pub use types::{
    AsyncResource, BookingDraft, RequestRecord, ResourceKind, ResourceRequest, ResourceStatus,
    WizardAction, WizardResources, WizardState, WizardStep,
};
pub use validation::{Field, ValidationResult, is_valid_email, validate, validate_through};
