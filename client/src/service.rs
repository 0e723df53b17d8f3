//! The remote booking service boundary.
//!
//! The wizard never talks to the network directly. It holds an
//! `Arc<dyn BookingService>` in its environment and every remote call goes
//! through this trait, so tests can swap in a scripted implementation and
//! the demo can switch between HTTP and in-memory backends.

use crate::error::ServiceResult;
use crate::types::{
    BookingConfirmation, BookingId, BookingRequest, DateAvailability, PaymentIntent,
    PaymentIntentRequest, Service, ServiceId, TimeSlot, TimeSlotId,
};
use chrono::NaiveDate;
use futures::future::BoxFuture;

/// Remote booking and payment operations
///
/// Every method returns an owned `'static` future so callers can move it
/// into a spawned effect.
pub trait BookingService: Send + Sync {
    /// List the services that can be booked
    ///
    /// # Errors
    ///
    /// Returns a [`ServiceError`](crate::ServiceError) if the call fails.
    fn get_available_services(&self) -> BoxFuture<'static, ServiceResult<Vec<Service>>>;

    /// List the calendar dates offered for a service
    ///
    /// # Errors
    ///
    /// Returns a [`ServiceError`](crate::ServiceError) if the call fails.
    fn get_available_dates(
        &self,
        service_id: ServiceId,
    ) -> BoxFuture<'static, ServiceResult<Vec<DateAvailability>>>;

    /// List the time slots for a service on a date
    ///
    /// # Errors
    ///
    /// Returns a [`ServiceError`](crate::ServiceError) if the call fails.
    fn get_available_time_slots(
        &self,
        service_id: ServiceId,
        date: NaiveDate,
    ) -> BoxFuture<'static, ServiceResult<Vec<TimeSlot>>>;

    /// Authorize a card payment ahead of submission
    ///
    /// # Errors
    ///
    /// Returns a [`ServiceError`](crate::ServiceError) if the call fails.
    fn create_payment_intent(
        &self,
        request: PaymentIntentRequest,
    ) -> BoxFuture<'static, ServiceResult<PaymentIntent>>;

    /// Submit a completed booking
    ///
    /// # Errors
    ///
    /// Returns a [`ServiceError`](crate::ServiceError) if the call fails.
    fn submit_booking(
        &self,
        request: BookingRequest,
    ) -> BoxFuture<'static, ServiceResult<BookingConfirmation>>;

    /// Cancel a confirmed booking
    ///
    /// # Errors
    ///
    /// Returns a [`ServiceError`](crate::ServiceError) if the call fails.
    fn cancel_booking(
        &self,
        booking_id: BookingId,
    ) -> BoxFuture<'static, ServiceResult<BookingConfirmation>>;

    /// Move a confirmed booking to another date and slot
    ///
    /// # Errors
    ///
    /// Returns a [`ServiceError`](crate::ServiceError) if the call fails.
    fn reschedule_booking(
        &self,
        booking_id: BookingId,
        date: NaiveDate,
        time_slot_id: TimeSlotId,
    ) -> BoxFuture<'static, ServiceResult<BookingConfirmation>>;
}
