//! Wizard state, actions and remote resource bookkeeping.

use crate::validation::Field;
use booking_client::{
    BookingConfirmation, BookingId, BookingRequest, ClientInfo, DateAvailability, PaymentIntent,
    PaymentIntentRequest, PaymentMethod, Service, ServiceError, ServiceId, TimeSlot, TimeSlotId,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Steps of the booking wizard, in order
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WizardStep {
    /// Step 1: choose a service
    ServiceSelection,
    /// Step 2: choose a date and a time slot
    DateSelection,
    /// Step 3: enter contact details
    ClientInformation,
    /// Step 4: choose payment, acknowledge policy, submit
    Confirmation,
}

impl WizardStep {
    /// Every step, in traversal order
    pub const ALL: [Self; 4] = [
        Self::ServiceSelection,
        Self::DateSelection,
        Self::ClientInformation,
        Self::Confirmation,
    ];

    /// 1-based position
    #[must_use]
    pub const fn number(self) -> usize {
        match self {
            Self::ServiceSelection => 1,
            Self::DateSelection => 2,
            Self::ClientInformation => 3,
            Self::Confirmation => 4,
        }
    }

    /// The following step, if any
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::ServiceSelection => Some(Self::DateSelection),
            Self::DateSelection => Some(Self::ClientInformation),
            Self::ClientInformation => Some(Self::Confirmation),
            Self::Confirmation => None,
        }
    }

    /// The preceding step, if any
    #[must_use]
    pub const fn previous(self) -> Option<Self> {
        match self {
            Self::ServiceSelection => None,
            Self::DateSelection => Some(Self::ServiceSelection),
            Self::ClientInformation => Some(Self::DateSelection),
            Self::Confirmation => Some(Self::ClientInformation),
        }
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServiceSelection => write!(f, "Service Selection"),
            Self::DateSelection => write!(f, "Date & Time"),
            Self::ClientInformation => write!(f, "Your Details"),
            Self::Confirmation => write!(f, "Confirmation"),
        }
    }
}

/// The user's selections for one booking session
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BookingDraft {
    /// Set at step 1
    pub selected_service_id: Option<ServiceId>,
    /// Set at step 2
    pub selected_date: Option<NaiveDate>,
    /// Set at step 2, depends on `selected_date`
    pub selected_time_slot_id: Option<TimeSlotId>,
    /// Set at step 3
    pub client_info: ClientInfo,
    /// Set at step 4
    pub payment_method: Option<PaymentMethod>,
    /// Set at step 4 for card payments, once the intent is created
    pub payment_intent_id: Option<String>,
    /// Step 4 checkbox
    pub cancellation_policy_accepted: bool,
}

/// Lifecycle of one remote fetch
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AsyncResource<T> {
    /// Not requested, or superseded
    Idle,
    /// Request in flight
    Loading,
    /// Latest request succeeded
    Success(T),
    /// Latest request failed
    Error {
        /// Banner text
        message: String,
        /// Whether `Retry` may re-issue the request
        retryable: bool,
    },
}

impl<T> Default for AsyncResource<T> {
    fn default() -> Self {
        Self::Idle
    }
}

impl<T> AsyncResource<T> {
    /// Loaded data, if the latest request succeeded
    #[must_use]
    pub const fn data(&self) -> Option<&T> {
        match self {
            Self::Success(data) => Some(data),
            _ => None,
        }
    }

    /// Whether a request is in flight
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    /// Whether the latest request failed
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Banner text, if the latest request failed
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Status without the payload
    #[must_use]
    pub const fn status(&self) -> ResourceStatus {
        match self {
            Self::Idle => ResourceStatus::Idle,
            Self::Loading => ResourceStatus::Loading,
            Self::Success(_) => ResourceStatus::Success,
            Self::Error { .. } => ResourceStatus::Error,
        }
    }
}

/// [`AsyncResource`] status, independent of the payload type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    /// Not requested
    Idle,
    /// In flight
    Loading,
    /// Loaded
    Success,
    /// Failed
    Error,
}

/// Remote resources tracked by the wizard
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Services catalogue
    Services,
    /// Dates offered for the selected service
    Dates,
    /// Time slots for the selected service and date
    TimeSlots,
    /// Card payment authorization
    PaymentIntent,
    /// Booking submission
    Submission,
    /// Cancellation of the confirmed booking
    Cancellation,
    /// Rescheduling of the confirmed booking
    Reschedule,
}

impl ResourceKind {
    /// Every resource kind
    pub const ALL: [Self; 7] = [
        Self::Services,
        Self::Dates,
        Self::TimeSlots,
        Self::PaymentIntent,
        Self::Submission,
        Self::Cancellation,
        Self::Reschedule,
    ];
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Services => write!(f, "services"),
            Self::Dates => write!(f, "dates"),
            Self::TimeSlots => write!(f, "time-slots"),
            Self::PaymentIntent => write!(f, "payment-intent"),
            Self::Submission => write!(f, "submission"),
            Self::Cancellation => write!(f, "cancellation"),
            Self::Reschedule => write!(f, "reschedule"),
        }
    }
}

/// Parameters of an issued remote call, kept so it can be re-issued verbatim
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResourceRequest {
    /// `get_available_services()`
    Services,
    /// `get_available_dates(service_id)`
    Dates {
        /// Service whose dates are requested
        service_id: ServiceId,
    },
    /// `get_available_time_slots(service_id, date)`
    TimeSlots {
        /// Selected service
        service_id: ServiceId,
        /// Selected date
        date: NaiveDate,
    },
    /// `create_payment_intent(request)`
    PaymentIntent(PaymentIntentRequest),
    /// `submit_booking(request)`
    Submission(BookingRequest),
    /// `cancel_booking(booking_id)`
    Cancellation {
        /// Booking to cancel
        booking_id: BookingId,
    },
    /// `reschedule_booking(booking_id, date, time_slot_id)`
    Reschedule {
        /// Booking to move
        booking_id: BookingId,
        /// New date
        date: NaiveDate,
        /// New slot
        time_slot_id: TimeSlotId,
    },
}

impl ResourceRequest {
    /// The resource this request populates
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        match self {
            Self::Services => ResourceKind::Services,
            Self::Dates { .. } => ResourceKind::Dates,
            Self::TimeSlots { .. } => ResourceKind::TimeSlots,
            Self::PaymentIntent(_) => ResourceKind::PaymentIntent,
            Self::Submission(_) => ResourceKind::Submission,
            Self::Cancellation { .. } => ResourceKind::Cancellation,
            Self::Reschedule { .. } => ResourceKind::Reschedule,
        }
    }
}

/// The latest request issued for a resource
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestRecord {
    /// Generation tag carried by the response
    pub generation: u64,
    /// Parameters, for retry and replay
    pub request: ResourceRequest,
    /// Held while offline, replayed on reconnect
    pub deferred: bool,
}

/// Every remote resource plus the request bookkeeping behind it
///
/// Each kind has a monotonic generation counter. Issuing a request bumps the
/// counter and a response is applied only if it carries the latest value.
/// Counters are never reset, not even by [`WizardResources::reset`].
#[derive(Clone, Debug, Default)]
pub struct WizardResources {
    /// Services catalogue
    pub services: AsyncResource<Vec<Service>>,
    /// Dates for the selected service
    pub dates: AsyncResource<Vec<DateAvailability>>,
    /// Slots for the selected service and date
    pub time_slots: AsyncResource<Vec<TimeSlot>>,
    /// Card payment authorization
    pub payment_intent: AsyncResource<PaymentIntent>,
    /// Booking submission
    pub submission: AsyncResource<BookingConfirmation>,
    /// Cancellation
    pub cancellation: AsyncResource<BookingConfirmation>,
    /// Reschedule
    pub reschedule: AsyncResource<BookingConfirmation>,
    generations: HashMap<ResourceKind, u64>,
    requests: HashMap<ResourceKind, RequestRecord>,
}

/// Payload-free transition applied to a resource of any kind
enum Transition {
    Idle,
    Loading,
    Failed(String),
}

impl Transition {
    fn apply<T>(self, resource: &mut AsyncResource<T>) {
        *resource = match self {
            Self::Idle => AsyncResource::Idle,
            Self::Loading => AsyncResource::Loading,
            Self::Failed(message) => AsyncResource::Error {
                message,
                retryable: true,
            },
        };
    }
}

impl WizardResources {
    /// Status of a resource
    #[must_use]
    pub const fn status(&self, kind: ResourceKind) -> ResourceStatus {
        match kind {
            ResourceKind::Services => self.services.status(),
            ResourceKind::Dates => self.dates.status(),
            ResourceKind::TimeSlots => self.time_slots.status(),
            ResourceKind::PaymentIntent => self.payment_intent.status(),
            ResourceKind::Submission => self.submission.status(),
            ResourceKind::Cancellation => self.cancellation.status(),
            ResourceKind::Reschedule => self.reschedule.status(),
        }
    }

    /// Banner text for a failed resource
    #[must_use]
    pub fn error_message(&self, kind: ResourceKind) -> Option<&str> {
        match kind {
            ResourceKind::Services => self.services.error_message(),
            ResourceKind::Dates => self.dates.error_message(),
            ResourceKind::TimeSlots => self.time_slots.error_message(),
            ResourceKind::PaymentIntent => self.payment_intent.error_message(),
            ResourceKind::Submission => self.submission.error_message(),
            ResourceKind::Cancellation => self.cancellation.error_message(),
            ResourceKind::Reschedule => self.reschedule.error_message(),
        }
    }

    /// Whether any request is in flight
    #[must_use]
    pub fn any_loading(&self) -> bool {
        ResourceKind::ALL
            .iter()
            .any(|kind| self.status(*kind) == ResourceStatus::Loading)
    }

    /// Latest generation issued for a resource (0 before the first request)
    #[must_use]
    pub fn generation(&self, kind: ResourceKind) -> u64 {
        self.generations.get(&kind).copied().unwrap_or(0)
    }

    /// Whether a response tagged `generation` is the latest for `kind`
    #[must_use]
    pub fn is_current(&self, kind: ResourceKind, generation: u64) -> bool {
        self.generation(kind) == generation
    }

    /// The latest request issued for a resource
    #[must_use]
    pub fn last_request(&self, kind: ResourceKind) -> Option<&RequestRecord> {
        self.requests.get(&kind)
    }

    /// Record a new request, mark its resource loading and return its generation
    pub fn begin(&mut self, request: ResourceRequest) -> u64 {
        let kind = request.kind();
        let generation = self.bump(kind);
        self.requests.insert(
            kind,
            RequestRecord {
                generation,
                request,
                deferred: false,
            },
        );
        self.transition(kind, Transition::Loading);
        generation
    }

    /// Discard whatever is in flight for `kind` and return it to idle
    pub fn supersede(&mut self, kind: ResourceKind) {
        self.bump(kind);
        if let Some(record) = self.requests.get_mut(&kind) {
            record.deferred = false;
        }
        self.transition(kind, Transition::Idle);
    }

    /// Mark the latest request failed
    pub fn fail(&mut self, kind: ResourceKind, message: impl Into<String>) {
        self.transition(kind, Transition::Failed(message.into()));
    }

    /// Mark the latest request failed and hold it for replay on reconnect
    pub fn defer(&mut self, kind: ResourceKind, message: impl Into<String>) {
        self.fail(kind, message);
        if let Some(record) = self.requests.get_mut(&kind) {
            record.deferred = true;
        }
    }

    /// Requests held for replay, in resource order
    #[must_use]
    pub fn deferred(&self) -> Vec<ResourceRequest> {
        ResourceKind::ALL
            .iter()
            .filter_map(|kind| self.requests.get(kind))
            .filter(|record| record.deferred)
            .map(|record| record.request.clone())
            .collect()
    }

    /// Whether the latest request for `kind` is held for replay
    #[must_use]
    pub fn is_deferred(&self, kind: ResourceKind) -> bool {
        self.requests.get(&kind).is_some_and(|record| record.deferred)
    }

    /// Whether any request is held for replay
    #[must_use]
    pub fn has_deferred(&self) -> bool {
        self.requests.values().any(|record| record.deferred)
    }

    /// Return every resource to idle, superseding anything in flight
    pub fn reset(&mut self) {
        for kind in ResourceKind::ALL {
            self.supersede(kind);
        }
        self.requests.clear();
    }

    fn bump(&mut self, kind: ResourceKind) -> u64 {
        let generation = self.generations.entry(kind).or_insert(0);
        *generation += 1;
        *generation
    }

    fn transition(&mut self, kind: ResourceKind, transition: Transition) {
        match kind {
            ResourceKind::Services => transition.apply(&mut self.services),
            ResourceKind::Dates => transition.apply(&mut self.dates),
            ResourceKind::TimeSlots => transition.apply(&mut self.time_slots),
            ResourceKind::PaymentIntent => transition.apply(&mut self.payment_intent),
            ResourceKind::Submission => transition.apply(&mut self.submission),
            ResourceKind::Cancellation => transition.apply(&mut self.cancellation),
            ResourceKind::Reschedule => transition.apply(&mut self.reschedule),
        }
    }
}

/// Complete state of one booking session
#[derive(Clone, Debug)]
pub struct WizardState {
    /// Active step
    pub current_step: WizardStep,
    /// Selections made so far
    pub draft: BookingDraft,
    /// Remote resources
    pub resources: WizardResources,
    /// Field-level validation messages for display
    pub field_errors: BTreeMap<Field, String>,
    /// Last reported connectivity
    pub online: bool,
    /// Set once the booking is confirmed (terminal sub-state of CONFIRMATION)
    pub confirmation: Option<BookingConfirmation>,
    /// When the confirmation arrived
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl WizardState {
    /// Fresh state at the first step
    #[must_use]
    pub fn new(online: bool) -> Self {
        Self {
            current_step: WizardStep::ServiceSelection,
            draft: BookingDraft::default(),
            resources: WizardResources::default(),
            field_errors: BTreeMap::new(),
            online,
            confirmation: None,
            confirmed_at: None,
        }
    }

    /// Whether the booking has been confirmed
    #[must_use]
    pub const fn is_confirmed(&self) -> bool {
        self.confirmation.is_some()
    }

    /// Whether the booking submission is in flight
    #[must_use]
    pub const fn is_submitting(&self) -> bool {
        self.resources.submission.is_loading()
    }

    /// The selected service, looked up in the loaded catalogue
    #[must_use]
    pub fn selected_service(&self) -> Option<&Service> {
        let id = self.draft.selected_service_id.as_ref()?;
        self.resources
            .services
            .data()?
            .iter()
            .find(|service| &service.id == id)
    }

    /// Slots loaded for the currently selected service and date
    ///
    /// Empty when the slot list on hand belongs to another selection or has
    /// not loaded.
    #[must_use]
    pub fn slots_for_selection(&self) -> &[TimeSlot] {
        let (Some(service_id), Some(date)) =
            (&self.draft.selected_service_id, self.draft.selected_date)
        else {
            return &[];
        };
        let matches_selection = self
            .resources
            .last_request(ResourceKind::TimeSlots)
            .is_some_and(|record| {
                record.request
                    == ResourceRequest::TimeSlots {
                        service_id: service_id.clone(),
                        date,
                    }
            });
        match self.resources.time_slots.data() {
            Some(slots) if matches_selection => slots,
            _ => &[],
        }
    }

    /// Banner text for the first failed resource, if any
    #[must_use]
    pub fn error_banner(&self) -> Option<(ResourceKind, &str)> {
        ResourceKind::ALL.iter().find_map(|kind| {
            self.resources
                .error_message(*kind)
                .map(|message| (*kind, message))
        })
    }
}

impl Default for WizardState {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Every input the wizard reacts to
#[derive(Clone, Debug)]
pub enum WizardAction {
    // ========== User intents ==========
    /// Flow mounted: fetch services
    Start,
    /// Step 1: choose a service
    SelectService {
        /// Chosen service
        service_id: ServiceId,
    },
    /// Step 2: choose a date
    SelectDate {
        /// Chosen date
        date: NaiveDate,
    },
    /// Step 2: choose a slot on the selected date
    SelectTimeSlot {
        /// Chosen slot
        time_slot_id: TimeSlotId,
    },
    /// Step 3: edit contact details
    UpdateClientInfo {
        /// Full set of contact fields after the edit
        client: ClientInfo,
    },
    /// Step 4: choose how to pay
    ChoosePaymentMethod {
        /// Chosen method
        method: PaymentMethod,
    },
    /// Step 4: cancellation policy checkbox
    AcknowledgeCancellationPolicy {
        /// Checkbox state
        accepted: bool,
    },
    /// Advance if the active step validates
    GoNext,
    /// Return to the previous step
    GoBack,
    /// Submit the booking from the confirmation step
    Submit,
    /// Re-issue the failed request for a resource
    Retry {
        /// Resource to retry
        kind: ResourceKind,
    },
    /// Reset to the initial state and refetch services
    Restart,
    /// Cancel the confirmed booking
    CancelBooking,
    /// Move the confirmed booking
    RescheduleBooking {
        /// New date
        date: NaiveDate,
        /// New slot
        time_slot_id: TimeSlotId,
    },

    // ========== Environment ==========
    /// Connectivity transition reported by the platform
    ConnectivityChanged {
        /// New reachability
        online: bool,
    },
    /// Re-issue requests held while offline
    ReplayDeferred,

    // ========== Remote responses ==========
    /// Response to `get_available_services`
    ServicesFetched {
        /// Generation of the originating request
        generation: u64,
        /// Outcome
        result: Result<Vec<Service>, ServiceError>,
    },
    /// Response to `get_available_dates`
    DatesFetched {
        /// Generation of the originating request
        generation: u64,
        /// Outcome
        result: Result<Vec<DateAvailability>, ServiceError>,
    },
    /// Response to `get_available_time_slots`
    TimeSlotsFetched {
        /// Generation of the originating request
        generation: u64,
        /// Outcome
        result: Result<Vec<TimeSlot>, ServiceError>,
    },
    /// Response to `create_payment_intent`
    PaymentIntentCreated {
        /// Generation of the originating request
        generation: u64,
        /// Outcome
        result: Result<PaymentIntent, ServiceError>,
    },
    /// Response to `submit_booking`
    BookingSubmitted {
        /// Generation of the originating request
        generation: u64,
        /// Outcome
        result: Result<BookingConfirmation, ServiceError>,
    },
    /// Response to `cancel_booking`
    BookingCancelled {
        /// Generation of the originating request
        generation: u64,
        /// Outcome
        result: Result<BookingConfirmation, ServiceError>,
    },
    /// Response to `reschedule_booking`
    BookingRescheduled {
        /// Generation of the originating request
        generation: u64,
        /// Outcome
        result: Result<BookingConfirmation, ServiceError>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_traverse_in_order() {
        let mut step = WizardStep::ServiceSelection;
        let mut visited = vec![step];
        while let Some(next) = step.next() {
            assert_eq!(next.previous(), Some(step));
            step = next;
            visited.push(step);
        }
        assert_eq!(visited, WizardStep::ALL);
        assert_eq!(step.number(), 4);
    }

    #[test]
    fn generations_only_move_forward() {
        let mut resources = WizardResources::default();

        let first = resources.begin(ResourceRequest::Services);
        resources.supersede(ResourceKind::Services);
        let second = resources.begin(ResourceRequest::Services);

        assert!(second > first + 1);
        assert!(!resources.is_current(ResourceKind::Services, first));
        assert!(resources.is_current(ResourceKind::Services, second));

        resources.reset();
        assert!(!resources.is_current(ResourceKind::Services, second));
        assert_eq!(resources.status(ResourceKind::Services), ResourceStatus::Idle);
        assert!(resources.last_request(ResourceKind::Services).is_none());
    }

    #[test]
    fn deferred_requests_are_listed_until_superseded() {
        let mut resources = WizardResources::default();
        resources.begin(ResourceRequest::Services);
        resources.defer(ResourceKind::Services, "offline");

        assert_eq!(resources.deferred(), vec![ResourceRequest::Services]);
        assert!(resources.services.is_error());

        resources.supersede(ResourceKind::Services);
        assert!(!resources.has_deferred());
    }
}
