//! # Booking Client
//!
//! Boundary between the booking wizard and the remote booking and payment
//! service.
//!
//! - [`BookingService`]: the trait the wizard depends on
//! - [`HttpBookingService`]: REST implementation over `reqwest`
//! - [`types`]: wire types shared by every implementation
//! - [`ServiceError`]: failures, classified for automatic retry

pub mod config;
pub mod error;
pub mod http;
pub mod service;
pub mod types;

pub use config::ClientConfig;
pub use error::{ServiceError, ServiceResult};
pub use http::HttpBookingService;
pub use service::BookingService;
pub use types::{
    BookingConfirmation, BookingId, BookingRequest, BookingStatus, ClientInfo, DateAvailability,
    Money, PaymentIntent, PaymentIntentRequest, PaymentMethod, Service, ServiceId, TimeSlot,
    TimeSlotId,
};
