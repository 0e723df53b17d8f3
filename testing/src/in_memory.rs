//! In-memory [`BookingService`] for store-level tests and the demo binary.
//!
//! Catalogue data is scripted up front. Tests can additionally inject
//! failures, hold individual responses until released (to reorder
//! resolutions), and inspect every call that was made.

use booking_client::{
    BookingConfirmation, BookingId, BookingRequest, BookingService, BookingStatus,
    DateAvailability, PaymentIntent, PaymentIntentRequest, Service, ServiceError, ServiceId,
    ServiceResult, TimeSlot, TimeSlotId,
};
use chrono::NaiveDate;
use futures::future::BoxFuture;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{Notify, oneshot};

/// Remote operation kinds, used to target failures and holds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `get_available_services`
    Services,
    /// `get_available_dates`
    Dates,
    /// `get_available_time_slots`
    TimeSlots,
    /// `create_payment_intent`
    PaymentIntent,
    /// `submit_booking`
    SubmitBooking,
    /// `cancel_booking`
    CancelBooking,
    /// `reschedule_booking`
    RescheduleBooking,
}

/// A recorded call with its parameters
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    /// `get_available_services()`
    Services,
    /// `get_available_dates(service_id)`
    Dates(ServiceId),
    /// `get_available_time_slots(service_id, date)`
    TimeSlots(ServiceId, NaiveDate),
    /// `create_payment_intent(request)`
    PaymentIntent(PaymentIntentRequest),
    /// `submit_booking(request)`
    SubmitBooking(BookingRequest),
    /// `cancel_booking(booking_id)`
    CancelBooking(BookingId),
    /// `reschedule_booking(booking_id, date, time_slot_id)`
    RescheduleBooking(BookingId, NaiveDate, TimeSlotId),
}

impl Call {
    /// The operation this call belongs to
    #[must_use]
    pub const fn operation(&self) -> Operation {
        match self {
            Self::Services => Operation::Services,
            Self::Dates(_) => Operation::Dates,
            Self::TimeSlots(..) => Operation::TimeSlots,
            Self::PaymentIntent(_) => Operation::PaymentIntent,
            Self::SubmitBooking(_) => Operation::SubmitBooking,
            Self::CancelBooking(_) => Operation::CancelBooking,
            Self::RescheduleBooking(..) => Operation::RescheduleBooking,
        }
    }
}

/// Releases a held response
///
/// Returned by [`InMemoryBookingService::hold_next`]. Dropping the gate
/// without releasing it also lets the response through.
#[derive(Debug)]
pub struct ResponseGate {
    release: oneshot::Sender<()>,
}

impl ResponseGate {
    /// Let the held response resolve
    pub fn release(self) {
        let _ = self.release.send(());
    }
}

#[derive(Default)]
struct Inner {
    services: Vec<Service>,
    dates: HashMap<ServiceId, Vec<DateAvailability>>,
    slots: HashMap<(ServiceId, NaiveDate), Vec<TimeSlot>>,
    bookings: HashMap<BookingId, BookingConfirmation>,
    failures: HashMap<Operation, VecDeque<ServiceError>>,
    holds: HashMap<Operation, VecDeque<oneshot::Receiver<()>>>,
    calls: Vec<Call>,
    latency: Duration,
    sequence: u32,
}

/// Scriptable in-memory booking service
///
/// Cloning shares the underlying catalogue and call log.
#[derive(Clone, Default)]
pub struct InMemoryBookingService {
    inner: Arc<Mutex<Inner>>,
    call_made: Arc<Notify>,
}

impl std::fmt::Debug for InMemoryBookingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("InMemoryBookingService")
            .field("services", &inner.services.len())
            .field("bookings", &inner.bookings.len())
            .field("calls", &inner.calls.len())
            .finish_non_exhaustive()
    }
}

impl InMemoryBookingService {
    /// Create an empty service
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every response by `latency`
    #[must_use]
    pub fn with_latency(self, latency: Duration) -> Self {
        self.lock().latency = latency;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panicking test thread must not poison the catalogue for the others
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Add a bookable service
    pub fn add_service(&self, service: Service) {
        self.lock().services.push(service);
    }

    /// Replace the dates offered for a service
    pub fn set_dates(&self, service_id: &ServiceId, dates: Vec<DateAvailability>) {
        self.lock().dates.insert(service_id.clone(), dates);
    }

    /// Replace the slots offered for a service on a date
    pub fn set_time_slots(&self, service_id: &ServiceId, date: NaiveDate, slots: Vec<TimeSlot>) {
        self.lock().slots.insert((service_id.clone(), date), slots);
    }

    /// Slots currently offered for a service on a date
    #[must_use]
    pub fn time_slots_for(&self, service_id: &ServiceId, date: NaiveDate) -> Vec<TimeSlot> {
        self.lock()
            .slots
            .get(&(service_id.clone(), date))
            .cloned()
            .unwrap_or_default()
    }

    /// Fail the next call to `operation` with `error`
    ///
    /// Repeated calls queue further failures.
    pub fn fail_next(&self, operation: Operation, error: ServiceError) {
        self.lock()
            .failures
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Hold the response of the next call to `operation` until the returned
    /// gate is released
    #[must_use]
    pub fn hold_next(&self, operation: Operation) -> ResponseGate {
        let (release, held) = oneshot::channel();
        self.lock()
            .holds
            .entry(operation)
            .or_default()
            .push_back(held);
        ResponseGate { release }
    }

    /// Every call made so far, in order
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Number of calls made to `operation`
    #[must_use]
    pub fn call_count(&self, operation: Operation) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.operation() == operation)
            .count()
    }

    /// Booking requests received, in order
    #[must_use]
    pub fn submissions(&self) -> Vec<BookingRequest> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::SubmitBooking(request) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    /// Wait until at least `count` calls to `operation` have been made
    pub async fn wait_for_calls(&self, operation: Operation, count: usize) {
        loop {
            let notified = self.call_made.notified();
            if self.call_count(operation) >= count {
                return;
            }
            notified.await;
        }
    }

    /// Record a call and resolve it, honouring injected failures and holds
    fn respond<T, F>(&self, call: Call, resolve: F) -> BoxFuture<'static, ServiceResult<T>>
    where
        T: Send + 'static,
        F: FnOnce(&mut Inner) -> ServiceResult<T> + Send + 'static,
    {
        let operation = call.operation();
        let (failure, hold, latency) = {
            let mut inner = self.lock();
            inner.calls.push(call);
            let failure = inner
                .failures
                .get_mut(&operation)
                .and_then(VecDeque::pop_front);
            let hold = inner.holds.get_mut(&operation).and_then(VecDeque::pop_front);
            (failure, hold, inner.latency)
        };
        self.call_made.notify_waiters();
        tracing::debug!(
            ?operation,
            failing = failure.is_some(),
            held = hold.is_some(),
            "In-memory booking call"
        );

        let shared = Arc::clone(&self.inner);
        Box::pin(async move {
            if let Some(held) = hold {
                // Released or dropped, either way the response goes through
                let _ = held.await;
            }
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            if let Some(error) = failure {
                return Err(error);
            }
            let mut inner = shared
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            resolve(&mut *inner)
        })
    }
}

impl Inner {
    fn next_sequence(&mut self) -> u32 {
        self.sequence += 1;
        self.sequence
    }

    fn slot_is_open(&self, service_id: &ServiceId, date: NaiveDate, slot_id: &TimeSlotId) -> bool {
        self.slots
            .get(&(service_id.clone(), date))
            .is_some_and(|slots| slots.iter().any(|s| &s.id == slot_id && s.is_available))
    }

    fn set_slot_availability(
        &mut self,
        service_id: &ServiceId,
        date: NaiveDate,
        slot_id: &TimeSlotId,
        available: bool,
    ) {
        if let Some(slots) = self.slots.get_mut(&(service_id.clone(), date)) {
            for slot in slots.iter_mut().filter(|s| &s.id == slot_id) {
                slot.is_available = available;
            }
        }
    }
}

impl BookingService for InMemoryBookingService {
    fn get_available_services(&self) -> BoxFuture<'static, ServiceResult<Vec<Service>>> {
        self.respond(Call::Services, |inner| Ok(inner.services.clone()))
    }

    fn get_available_dates(
        &self,
        service_id: ServiceId,
    ) -> BoxFuture<'static, ServiceResult<Vec<DateAvailability>>> {
        self.respond(Call::Dates(service_id.clone()), move |inner| {
            inner
                .dates
                .get(&service_id)
                .cloned()
                .ok_or_else(|| ServiceError::Rejected(format!("Unknown service {service_id}")))
        })
    }

    fn get_available_time_slots(
        &self,
        service_id: ServiceId,
        date: NaiveDate,
    ) -> BoxFuture<'static, ServiceResult<Vec<TimeSlot>>> {
        self.respond(Call::TimeSlots(service_id.clone(), date), move |inner| {
            Ok(inner
                .slots
                .get(&(service_id, date))
                .cloned()
                .unwrap_or_default())
        })
    }

    fn create_payment_intent(
        &self,
        request: PaymentIntentRequest,
    ) -> BoxFuture<'static, ServiceResult<PaymentIntent>> {
        let amount = request.amount;
        self.respond(Call::PaymentIntent(request), move |inner| {
            if amount.cents() <= 0 {
                return Err(ServiceError::Rejected("Amount must be positive".to_string()));
            }
            let n = inner.next_sequence();
            Ok(PaymentIntent {
                payment_intent_id: format!("pi_{n:06}"),
                client_secret: format!("pi_{n:06}_secret"),
            })
        })
    }

    fn submit_booking(
        &self,
        request: BookingRequest,
    ) -> BoxFuture<'static, ServiceResult<BookingConfirmation>> {
        self.respond(Call::SubmitBooking(request.clone()), move |inner| {
            if !inner.slot_is_open(&request.service_id, request.date, &request.time_slot_id) {
                return Err(ServiceError::Rejected(
                    "Selected time slot is no longer available".to_string(),
                ));
            }
            inner.set_slot_availability(
                &request.service_id,
                request.date,
                &request.time_slot_id,
                false,
            );

            let n = inner.next_sequence();
            let confirmation = BookingConfirmation {
                id: BookingId::new(format!("booking-{n}")),
                status: BookingStatus::Confirmed,
                confirmation_code: format!("BK{n:06}"),
            };
            inner
                .bookings
                .insert(confirmation.id.clone(), confirmation.clone());
            Ok(confirmation)
        })
    }

    fn cancel_booking(
        &self,
        booking_id: BookingId,
    ) -> BoxFuture<'static, ServiceResult<BookingConfirmation>> {
        self.respond(Call::CancelBooking(booking_id.clone()), move |inner| {
            let booking = inner
                .bookings
                .get_mut(&booking_id)
                .ok_or_else(|| ServiceError::Rejected("Booking not found".to_string()))?;
            if booking.status == BookingStatus::Cancelled {
                return Err(ServiceError::Rejected("Booking already cancelled".to_string()));
            }
            booking.status = BookingStatus::Cancelled;
            Ok(booking.clone())
        })
    }

    fn reschedule_booking(
        &self,
        booking_id: BookingId,
        date: NaiveDate,
        time_slot_id: TimeSlotId,
    ) -> BoxFuture<'static, ServiceResult<BookingConfirmation>> {
        let call = Call::RescheduleBooking(booking_id.clone(), date, time_slot_id.clone());
        self.respond(call, move |inner| {
            let status = inner
                .bookings
                .get(&booking_id)
                .map(|b| b.status)
                .ok_or_else(|| ServiceError::Rejected("Booking not found".to_string()))?;
            if status == BookingStatus::Cancelled {
                return Err(ServiceError::Rejected(
                    "Cancelled bookings cannot be rescheduled".to_string(),
                ));
            }
            let open = inner.slots.iter().any(|((_, d), slots)| {
                *d == date && slots.iter().any(|s| s.id == time_slot_id && s.is_available)
            });
            if !open {
                return Err(ServiceError::Rejected(
                    "Selected time slot is no longer available".to_string(),
                ));
            }

            let n = inner.next_sequence();
            let booking = inner
                .bookings
                .get_mut(&booking_id)
                .ok_or_else(|| ServiceError::Rejected("Booking not found".to_string()))?;
            booking.status = BookingStatus::Rescheduled;
            booking.confirmation_code = format!("BK{n:06}");
            Ok(booking.clone())
        })
    }
}
