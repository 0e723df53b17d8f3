//! Booking wizard reducer.
//!
//! Every transition of the wizard lives here. Remote calls are described as
//! effects tagged with a per-resource generation; a response is applied only
//! if its generation is still the latest issued for that resource.

use crate::config::WizardConfig;
use crate::types::{
    AsyncResource, ResourceKind, ResourceRequest, ResourceStatus, WizardAction, WizardState,
    WizardStep,
};
use crate::validation::{self, Field};
use booking_client::{
    BookingRequest, BookingService, BookingStatus, ClientInfo, PaymentIntentRequest, PaymentMethod,
    ServiceError, ServiceId, TimeSlotId,
};
use booking_core::effect::Effect;
use booking_core::environment::{Clock, Connectivity};
use booking_core::reducer::Reducer;
use booking_core::{SmallVec, async_effect, delay, smallvec};
use booking_runtime::retry::retry_with_predicate;
use chrono::NaiveDate;
use std::sync::Arc;

/// Banner shown for requests held while offline
pub const OFFLINE_MESSAGE: &str =
    "No internet connection. We'll retry automatically when you're back online.";

/// Environment for the booking wizard
#[derive(Clone)]
pub struct WizardEnvironment {
    /// Remote booking and payment service
    pub service: Arc<dyn BookingService>,
    /// Clock for date checks and confirmation timestamps
    pub clock: Arc<dyn Clock>,
    /// Platform online/offline signal
    pub connectivity: Arc<dyn Connectivity>,
    /// Currency, retry and reconnect settings
    pub config: WizardConfig,
}

impl WizardEnvironment {
    /// Creates a new wizard environment
    #[must_use]
    pub fn new(
        service: Arc<dyn BookingService>,
        clock: Arc<dyn Clock>,
        connectivity: Arc<dyn Connectivity>,
        config: WizardConfig,
    ) -> Self {
        Self {
            service,
            clock,
            connectivity,
            config,
        }
    }
}

/// Reducer implementing the booking wizard
///
/// Intents that do not apply to the current step, or arrive after the
/// booking is confirmed, are logged and leave state untouched.
#[derive(Clone, Debug, Default)]
pub struct WizardReducer;

impl WizardReducer {
    /// Creates a new wizard reducer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    // ========== Request bookkeeping ==========

    /// Issue a remote request under a fresh generation
    ///
    /// While offline the request fails fast and is held for replay.
    fn issue(
        state: &mut WizardState,
        env: &WizardEnvironment,
        request: ResourceRequest,
    ) -> Effect<WizardAction> {
        let kind = request.kind();
        let generation = state.resources.begin(request.clone());

        if !state.online {
            tracing::warn!(%kind, generation, "Offline, holding request until reconnect");
            state.resources.defer(kind, OFFLINE_MESSAGE);
            return Effect::None;
        }

        tracing::debug!(%kind, generation, "Issuing request");
        remote_call(env, generation, request)
    }

    /// Whether the latest request matches `request` and is loading or loaded
    fn in_hand(state: &WizardState, request: &ResourceRequest) -> bool {
        let kind = request.kind();
        let same_request = state
            .resources
            .last_request(kind)
            .is_some_and(|record| &record.request == request);
        same_request
            && matches!(
                state.resources.status(kind),
                ResourceStatus::Loading | ResourceStatus::Success
            )
    }

    /// Whether a response still belongs to the latest request
    fn accept(state: &WizardState, kind: ResourceKind, generation: u64) -> bool {
        let current = state.resources.is_current(kind, generation);
        if !current {
            tracing::debug!(
                %kind,
                generation,
                latest = state.resources.generation(kind),
                "stale response discarded"
            );
        }
        current
    }

    /// [`Self::accept`], and the resource's step is still the active one
    fn accept_for_step(state: &mut WizardState, kind: ResourceKind, generation: u64) -> bool {
        if !Self::accept(state, kind, generation) {
            return false;
        }
        if !Self::step_owns(state, kind) {
            tracing::warn!(%kind, step = %state.current_step, "Response discarded: step not active");
            state.resources.supersede(kind);
            return false;
        }
        true
    }

    fn record_failure(state: &mut WizardState, kind: ResourceKind, error: &ServiceError) {
        tracing::warn!(%kind, error = %error, "Remote call failed");
        if state.online {
            state.resources.fail(kind, error.user_message());
        } else {
            state.resources.defer(kind, OFFLINE_MESSAGE);
        }
    }

    /// Guard for intents that belong to a single step
    fn accepts_input(state: &WizardState, step: WizardStep, intent: &str) -> bool {
        if state.is_confirmed() {
            tracing::warn!(intent, "Ignored: booking already confirmed");
            return false;
        }
        if state.current_step != step {
            tracing::warn!(
                intent,
                current = %state.current_step,
                expected = %step,
                "Ignored: step not active"
            );
            return false;
        }
        true
    }

    /// Resources fetched on behalf of a step
    const fn owned_resources(step: WizardStep) -> &'static [ResourceKind] {
        match step {
            WizardStep::DateSelection => &[ResourceKind::Dates, ResourceKind::TimeSlots],
            WizardStep::Confirmation => &[ResourceKind::PaymentIntent, ResourceKind::Submission],
            WizardStep::ServiceSelection | WizardStep::ClientInformation => &[],
        }
    }

    /// The step a resource is fetched for, if it is tied to one
    const fn owning_step(kind: ResourceKind) -> Option<WizardStep> {
        match kind {
            ResourceKind::Dates | ResourceKind::TimeSlots => Some(WizardStep::DateSelection),
            ResourceKind::PaymentIntent | ResourceKind::Submission => {
                Some(WizardStep::Confirmation)
            },
            ResourceKind::Services | ResourceKind::Cancellation | ResourceKind::Reschedule => None,
        }
    }

    /// Whether work on `kind` may proceed from the active step
    fn step_owns(state: &WizardState, kind: ResourceKind) -> bool {
        Self::owning_step(kind).is_none_or(|step| step == state.current_step)
    }

    // ========== Step 1 ==========

    fn start(state: &mut WizardState, env: &WizardEnvironment) -> Effect<WizardAction> {
        if Self::in_hand(state, &ResourceRequest::Services) {
            tracing::debug!("Services already requested");
            return Effect::None;
        }
        Self::issue(state, env, ResourceRequest::Services)
    }

    fn select_service(state: &mut WizardState, service_id: ServiceId) -> Effect<WizardAction> {
        if !Self::accepts_input(state, WizardStep::ServiceSelection, "select_service") {
            return Effect::None;
        }

        let duration = state.resources.services.data().and_then(|services| {
            services
                .iter()
                .find(|service| service.id == service_id)
                .map(|service| service.duration_minutes)
        });
        let Some(duration) = duration else {
            tracing::warn!(%service_id, "SelectService rejected: not in the loaded catalogue");
            state.field_errors.insert(
                Field::Service,
                "Please choose one of the available services".to_string(),
            );
            return Effect::None;
        };

        state.field_errors.remove(&Field::Service);
        if state.draft.selected_service_id.as_ref() == Some(&service_id) {
            return Effect::None;
        }

        let previous_duration = state.selected_service().map(|s| s.duration_minutes);
        if previous_duration.is_some_and(|previous| previous != duration) {
            tracing::debug!(%service_id, "Service duration changed, clearing date and time");
            state.draft.selected_date = None;
            state.draft.selected_time_slot_id = None;
            state.resources.supersede(ResourceKind::TimeSlots);
        }

        // Price may differ
        state.draft.payment_intent_id = None;
        state.resources.supersede(ResourceKind::PaymentIntent);

        tracing::debug!(%service_id, "Service selected");
        state.draft.selected_service_id = Some(service_id);
        Effect::None
    }

    // ========== Step 2 ==========

    fn select_date(
        state: &mut WizardState,
        env: &WizardEnvironment,
        date: NaiveDate,
    ) -> Effect<WizardAction> {
        if !Self::accepts_input(state, WizardStep::DateSelection, "select_date") {
            return Effect::None;
        }

        if date < env.clock.now().date_naive() {
            tracing::warn!(%date, "SelectDate rejected: date in the past");
            state
                .field_errors
                .insert(Field::Date, "Please choose a date in the future".to_string());
            return Effect::None;
        }

        let offered = state.resources.dates.data().is_some_and(|dates| {
            dates
                .iter()
                .any(|offered| offered.date == date && offered.has_availability)
        });
        if !offered {
            tracing::warn!(%date, "SelectDate rejected: no availability");
            state.field_errors.insert(
                Field::Date,
                "No appointments are available on this date".to_string(),
            );
            return Effect::None;
        }

        let Some(service_id) = state.draft.selected_service_id.clone() else {
            tracing::warn!("SelectDate rejected: no service selected");
            return Effect::None;
        };

        state.field_errors.remove(&Field::Date);
        state.field_errors.remove(&Field::TimeSlot);

        let request = ResourceRequest::TimeSlots { service_id, date };
        if state.draft.selected_date == Some(date) && Self::in_hand(state, &request) {
            return Effect::None;
        }

        state.draft.selected_date = Some(date);
        state.draft.selected_time_slot_id = None;
        Self::issue(state, env, request)
    }

    fn select_time_slot(state: &mut WizardState, time_slot_id: TimeSlotId) -> Effect<WizardAction> {
        if !Self::accepts_input(state, WizardStep::DateSelection, "select_time_slot") {
            return Effect::None;
        }

        let open = state
            .slots_for_selection()
            .iter()
            .any(|slot| slot.id == time_slot_id && slot.is_available);
        if !open {
            tracing::warn!(%time_slot_id, "SelectTimeSlot rejected: slot not available");
            state.field_errors.insert(
                Field::TimeSlot,
                "This time slot is not available".to_string(),
            );
            return Effect::None;
        }

        state.field_errors.remove(&Field::TimeSlot);
        state.draft.selected_time_slot_id = Some(time_slot_id);
        Effect::None
    }

    // ========== Step 3 ==========

    fn update_client_info(state: &mut WizardState, client: ClientInfo) -> Effect<WizardAction> {
        if !Self::accepts_input(state, WizardStep::ClientInformation, "update_client_info") {
            return Effect::None;
        }

        let previous = &state.draft.client_info;
        let edited = [
            (Field::FullName, previous.full_name != client.full_name),
            (Field::Email, previous.email != client.email),
            (Field::Phone, previous.phone != client.phone),
            (Field::Terms, previous.terms_accepted != client.terms_accepted),
        ];
        for (field, changed) in edited {
            if changed {
                state.field_errors.remove(&field);
            }
        }

        state.draft.client_info = client;
        Effect::None
    }

    // ========== Step 4 ==========

    fn choose_payment_method(
        state: &mut WizardState,
        env: &WizardEnvironment,
        method: PaymentMethod,
    ) -> Effect<WizardAction> {
        if !Self::accepts_input(state, WizardStep::Confirmation, "choose_payment_method") {
            return Effect::None;
        }
        if state.is_submitting() {
            tracing::warn!("ChoosePaymentMethod ignored: submission in flight");
            return Effect::None;
        }

        state.field_errors.remove(&Field::PaymentMethod);
        state.draft.payment_method = Some(method);

        if !method.requires_payment_intent() {
            state.draft.payment_intent_id = None;
            state.resources.supersede(ResourceKind::PaymentIntent);
            state.field_errors.remove(&Field::PaymentIntent);
            return Effect::None;
        }

        if state.draft.payment_intent_id.is_some() || state.resources.payment_intent.is_loading() {
            return Effect::None;
        }
        Self::request_payment_intent(state, env)
    }

    fn request_payment_intent(
        state: &mut WizardState,
        env: &WizardEnvironment,
    ) -> Effect<WizardAction> {
        let Some(service) = state.selected_service() else {
            tracing::warn!("Cannot create payment intent without a selected service");
            return Effect::None;
        };

        let email = state.draft.client_info.email.trim();
        let request = PaymentIntentRequest {
            amount: service.price,
            currency: env.config.currency.clone(),
            service_id: service.id.clone(),
            customer_email: (!email.is_empty()).then(|| email.to_string()),
        };
        Self::issue(state, env, ResourceRequest::PaymentIntent(request))
    }

    fn acknowledge_cancellation_policy(state: &mut WizardState, accepted: bool) -> Effect<WizardAction> {
        if !Self::accepts_input(state, WizardStep::Confirmation, "acknowledge_cancellation_policy") {
            return Effect::None;
        }
        if accepted {
            state.field_errors.remove(&Field::CancellationPolicy);
        }
        state.draft.cancellation_policy_accepted = accepted;
        Effect::None
    }

    // ========== Navigation ==========

    fn go_next(state: &mut WizardState, env: &WizardEnvironment) -> Effect<WizardAction> {
        if state.is_confirmed() {
            tracing::warn!("GoNext ignored: booking already confirmed");
            return Effect::None;
        }

        let step = state.current_step;
        let Some(next) = step.next() else {
            // The forward action on the last step is the submission
            return Self::submit(state, env);
        };

        let result = validation::validate(step, &state.draft, state.slots_for_selection());
        if !result.is_valid() {
            tracing::warn!(%step, errors = result.fields.len(), "Step validation failed");
            state.field_errors = result.fields;
            return Effect::None;
        }

        state.field_errors.clear();
        state.current_step = next;
        tracing::debug!(from = %step, to = %next, "Advanced");
        Self::enter(state, env, next)
    }

    /// Fetch whatever the step being entered needs and does not have
    fn enter(
        state: &mut WizardState,
        env: &WizardEnvironment,
        step: WizardStep,
    ) -> Effect<WizardAction> {
        match step {
            WizardStep::DateSelection => {
                let Some(service_id) = state.draft.selected_service_id.clone() else {
                    return Effect::None;
                };

                let mut effects = Vec::new();
                let dates = ResourceRequest::Dates {
                    service_id: service_id.clone(),
                };
                if !Self::in_hand(state, &dates) {
                    effects.push(Self::issue(state, env, dates));
                }
                if let Some(date) = state.draft.selected_date {
                    let slots = ResourceRequest::TimeSlots { service_id, date };
                    if !Self::in_hand(state, &slots) {
                        effects.push(Self::issue(state, env, slots));
                    }
                }
                Effect::merge(effects)
            },
            WizardStep::Confirmation => {
                let needs_intent = state
                    .draft
                    .payment_method
                    .is_some_and(PaymentMethod::requires_payment_intent)
                    && state.draft.payment_intent_id.is_none()
                    && !state.resources.payment_intent.is_loading();
                if needs_intent {
                    Self::request_payment_intent(state, env)
                } else {
                    Effect::None
                }
            },
            WizardStep::ServiceSelection | WizardStep::ClientInformation => Effect::None,
        }
    }

    fn go_back(state: &mut WizardState) -> Effect<WizardAction> {
        if state.is_confirmed() {
            tracing::debug!("GoBack ignored: booking already confirmed");
            return Effect::None;
        }
        if state.is_submitting() {
            tracing::warn!("GoBack ignored: submission in flight");
            return Effect::None;
        }

        let step = state.current_step;
        let Some(previous) = step.previous() else {
            tracing::debug!("GoBack ignored: already at the first step");
            return Effect::None;
        };

        for kind in Self::owned_resources(step) {
            let pending = matches!(
                state.resources.status(*kind),
                ResourceStatus::Loading | ResourceStatus::Error
            ) || state.resources.is_deferred(*kind);
            if pending {
                tracing::debug!(%kind, "Discarding request for the step being left");
                state.resources.supersede(*kind);
            }
        }

        state.field_errors.clear();
        state.current_step = previous;
        tracing::debug!(from = %step, to = %previous, "Went back");
        Effect::None
    }

    // ========== Submission ==========

    fn submit(state: &mut WizardState, env: &WizardEnvironment) -> Effect<WizardAction> {
        if state.is_confirmed() {
            tracing::warn!("Submit ignored: booking already confirmed");
            return Effect::None;
        }
        if state.current_step != WizardStep::Confirmation {
            tracing::warn!(step = %state.current_step, "Submit ignored: not on the confirmation step");
            return Effect::None;
        }
        if state.is_submitting() {
            tracing::warn!("Submit ignored: submission already in flight");
            return Effect::None;
        }

        let result = validation::validate_through(
            WizardStep::Confirmation,
            &state.draft,
            state.slots_for_selection(),
        );
        if !result.is_valid() {
            tracing::warn!(errors = result.fields.len(), "Submit validation failed");
            state.field_errors = result.fields;
            return Effect::None;
        }

        let Some(request) = booking_request(state) else {
            return Effect::None;
        };

        state.field_errors.clear();
        tracing::info!(
            service_id = %request.service_id,
            date = %request.date,
            time_slot_id = %request.time_slot_id,
            payment_method = %request.payment_method,
            "Submitting booking"
        );
        Self::issue(state, env, ResourceRequest::Submission(request))
    }

    // ========== Recovery ==========

    fn retry(
        state: &mut WizardState,
        env: &WizardEnvironment,
        kind: ResourceKind,
    ) -> Effect<WizardAction> {
        if state.resources.status(kind) != ResourceStatus::Error {
            tracing::warn!(%kind, "Retry ignored: resource has not failed");
            return Effect::None;
        }
        if !Self::step_owns(state, kind) {
            tracing::warn!(%kind, step = %state.current_step, "Retry ignored: step not active");
            return Effect::None;
        }
        if kind == ResourceKind::Submission {
            // Rebuilt from the current draft
            tracing::info!(%kind, "Retrying request");
            return Self::submit(state, env);
        }
        let Some(record) = state.resources.last_request(kind) else {
            tracing::warn!(%kind, "Retry ignored: no request to re-issue");
            return Effect::None;
        };

        let request = record.request.clone();
        tracing::info!(%kind, "Retrying request");
        Self::issue(state, env, request)
    }

    fn restart(state: &mut WizardState, env: &WizardEnvironment) -> Effect<WizardAction> {
        tracing::info!("Restarting booking flow");

        // Generations survive the reset so in-flight responses stay stale
        let mut resources = std::mem::take(&mut state.resources);
        resources.reset();
        *state = WizardState::new(state.online);
        state.resources = resources;

        Self::issue(state, env, ResourceRequest::Services)
    }

    fn connectivity_changed(
        state: &mut WizardState,
        env: &WizardEnvironment,
        online: bool,
    ) -> Effect<WizardAction> {
        if state.online == online {
            return Effect::None;
        }
        state.online = online;

        if !online {
            tracing::warn!("Connection lost");
            return Effect::None;
        }

        tracing::info!("Connection restored");
        if !state.resources.has_deferred() {
            return Effect::None;
        }
        delay! {
            duration: env.config.reconnect_delay,
            action: WizardAction::ReplayDeferred
        }
    }

    fn replay_deferred(state: &mut WizardState, env: &WizardEnvironment) -> Effect<WizardAction> {
        if !state.online {
            tracing::debug!("Replay skipped: offline again");
            return Effect::None;
        }

        let requests = state.resources.deferred();
        if requests.is_empty() {
            return Effect::None;
        }

        tracing::info!(count = requests.len(), "Replaying requests held while offline");
        let mut effects = Vec::with_capacity(requests.len());
        for request in requests {
            let kind = request.kind();
            if !Self::step_owns(state, kind) {
                tracing::debug!(%kind, step = %state.current_step, "Dropping held request for an inactive step");
                state.resources.supersede(kind);
                continue;
            }
            if kind == ResourceKind::Submission {
                state.resources.supersede(kind);
                effects.push(Self::submit(state, env));
                continue;
            }
            effects.push(Self::issue(state, env, request));
        }
        Effect::merge(effects)
    }

    // ========== After confirmation ==========

    fn cancel_booking(state: &mut WizardState, env: &WizardEnvironment) -> Effect<WizardAction> {
        let Some(confirmation) = &state.confirmation else {
            tracing::warn!("CancelBooking ignored: nothing confirmed");
            return Effect::None;
        };
        if confirmation.status == BookingStatus::Cancelled {
            tracing::warn!(booking_id = %confirmation.id, "CancelBooking ignored: already cancelled");
            return Effect::None;
        }
        if state.resources.cancellation.is_loading() {
            return Effect::None;
        }

        let booking_id = confirmation.id.clone();
        Self::issue(state, env, ResourceRequest::Cancellation { booking_id })
    }

    fn reschedule_booking(
        state: &mut WizardState,
        env: &WizardEnvironment,
        date: NaiveDate,
        time_slot_id: TimeSlotId,
    ) -> Effect<WizardAction> {
        let Some(confirmation) = &state.confirmation else {
            tracing::warn!("RescheduleBooking ignored: nothing confirmed");
            return Effect::None;
        };
        if confirmation.status == BookingStatus::Cancelled {
            tracing::warn!(booking_id = %confirmation.id, "RescheduleBooking ignored: booking cancelled");
            return Effect::None;
        }
        if state.resources.reschedule.is_loading() {
            return Effect::None;
        }
        if date < env.clock.now().date_naive() {
            tracing::warn!(%date, "RescheduleBooking ignored: date in the past");
            return Effect::None;
        }

        let booking_id = confirmation.id.clone();
        Self::issue(
            state,
            env,
            ResourceRequest::Reschedule {
                booking_id,
                date,
                time_slot_id,
            },
        )
    }
}

/// Assemble the submission from a validated draft
fn booking_request(state: &WizardState) -> Option<BookingRequest> {
    let draft = &state.draft;
    Some(BookingRequest {
        service_id: draft.selected_service_id.clone()?,
        date: draft.selected_date?,
        time_slot_id: draft.selected_time_slot_id.clone()?,
        client: draft.client_info.clone(),
        payment_method: draft.payment_method?,
        payment_intent_id: draft.payment_intent_id.clone(),
    })
}

/// Effect performing one remote call, retrying transient failures
fn remote_call(
    env: &WizardEnvironment,
    generation: u64,
    request: ResourceRequest,
) -> Effect<WizardAction> {
    let service = Arc::clone(&env.service);
    let policy = env.config.retry_policy.clone();

    match request {
        ResourceRequest::Services => async_effect! {
            let result = retry_with_predicate(
                &policy,
                "get_available_services",
                || service.get_available_services(),
                ServiceError::is_transient,
            )
            .await;
            Some(WizardAction::ServicesFetched { generation, result })
        },
        ResourceRequest::Dates { service_id } => async_effect! {
            let result = retry_with_predicate(
                &policy,
                "get_available_dates",
                || service.get_available_dates(service_id.clone()),
                ServiceError::is_transient,
            )
            .await;
            Some(WizardAction::DatesFetched { generation, result })
        },
        ResourceRequest::TimeSlots { service_id, date } => async_effect! {
            let result = retry_with_predicate(
                &policy,
                "get_available_time_slots",
                || service.get_available_time_slots(service_id.clone(), date),
                ServiceError::is_transient,
            )
            .await;
            Some(WizardAction::TimeSlotsFetched { generation, result })
        },
        ResourceRequest::PaymentIntent(request) => async_effect! {
            let result = retry_with_predicate(
                &policy,
                "create_payment_intent",
                || service.create_payment_intent(request.clone()),
                ServiceError::is_transient,
            )
            .await;
            Some(WizardAction::PaymentIntentCreated { generation, result })
        },
        ResourceRequest::Submission(request) => async_effect! {
            let result = retry_with_predicate(
                &policy,
                "submit_booking",
                || service.submit_booking(request.clone()),
                ServiceError::is_transient,
            )
            .await;
            Some(WizardAction::BookingSubmitted { generation, result })
        },
        ResourceRequest::Cancellation { booking_id } => async_effect! {
            let result = retry_with_predicate(
                &policy,
                "cancel_booking",
                || service.cancel_booking(booking_id.clone()),
                ServiceError::is_transient,
            )
            .await;
            Some(WizardAction::BookingCancelled { generation, result })
        },
        ResourceRequest::Reschedule {
            booking_id,
            date,
            time_slot_id,
        } => async_effect! {
            let result = retry_with_predicate(
                &policy,
                "reschedule_booking",
                || service.reschedule_booking(booking_id.clone(), date, time_slot_id.clone()),
                ServiceError::is_transient,
            )
            .await;
            Some(WizardAction::BookingRescheduled { generation, result })
        },
    }
}

impl Reducer for WizardReducer {
    type State = WizardState;
    type Action = WizardAction;
    type Environment = WizardEnvironment;

    #[allow(clippy::too_many_lines)] // One arm per action
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        let effect = match action {
            // ========== User intents ==========
            WizardAction::Start => Self::start(state, env),
            WizardAction::SelectService { service_id } => Self::select_service(state, service_id),
            WizardAction::SelectDate { date } => Self::select_date(state, env, date),
            WizardAction::SelectTimeSlot { time_slot_id } => {
                Self::select_time_slot(state, time_slot_id)
            },
            WizardAction::UpdateClientInfo { client } => Self::update_client_info(state, client),
            WizardAction::ChoosePaymentMethod { method } => {
                Self::choose_payment_method(state, env, method)
            },
            WizardAction::AcknowledgeCancellationPolicy { accepted } => {
                Self::acknowledge_cancellation_policy(state, accepted)
            },
            WizardAction::GoNext => Self::go_next(state, env),
            WizardAction::GoBack => Self::go_back(state),
            WizardAction::Submit => Self::submit(state, env),
            WizardAction::Retry { kind } => Self::retry(state, env, kind),
            WizardAction::Restart => Self::restart(state, env),
            WizardAction::CancelBooking => Self::cancel_booking(state, env),
            WizardAction::RescheduleBooking { date, time_slot_id } => {
                Self::reschedule_booking(state, env, date, time_slot_id)
            },

            // ========== Environment ==========
            WizardAction::ConnectivityChanged { online } => {
                Self::connectivity_changed(state, env, online)
            },
            WizardAction::ReplayDeferred => Self::replay_deferred(state, env),

            // ========== Remote responses ==========
            WizardAction::ServicesFetched { generation, result } => {
                if Self::accept(state, ResourceKind::Services, generation) {
                    match result {
                        Ok(services) => {
                            tracing::debug!(count = services.len(), "Services loaded");
                            state.resources.services = AsyncResource::Success(services);
                        },
                        Err(error) => Self::record_failure(state, ResourceKind::Services, &error),
                    }
                }
                Effect::None
            },
            WizardAction::DatesFetched { generation, result } => {
                if Self::accept(state, ResourceKind::Dates, generation) {
                    match result {
                        Ok(dates) => {
                            tracing::debug!(count = dates.len(), "Dates loaded");
                            state.resources.dates = AsyncResource::Success(dates);
                        },
                        Err(error) => Self::record_failure(state, ResourceKind::Dates, &error),
                    }
                }
                Effect::None
            },
            WizardAction::TimeSlotsFetched { generation, result } => {
                if Self::accept(state, ResourceKind::TimeSlots, generation) {
                    match result {
                        Ok(slots) => {
                            tracing::debug!(count = slots.len(), "Time slots loaded");
                            state.resources.time_slots = AsyncResource::Success(slots);
                        },
                        Err(error) => Self::record_failure(state, ResourceKind::TimeSlots, &error),
                    }
                }
                Effect::None
            },
            WizardAction::PaymentIntentCreated { generation, result } => {
                if Self::accept_for_step(state, ResourceKind::PaymentIntent, generation) {
                    match result {
                        Ok(intent) => {
                            tracing::debug!(payment_intent_id = %intent.payment_intent_id, "Payment intent created");
                            state.draft.payment_intent_id = Some(intent.payment_intent_id.clone());
                            state.field_errors.remove(&Field::PaymentIntent);
                            state.resources.payment_intent = AsyncResource::Success(intent);
                        },
                        Err(error) => {
                            Self::record_failure(state, ResourceKind::PaymentIntent, &error);
                        },
                    }
                }
                Effect::None
            },
            WizardAction::BookingSubmitted { generation, result } => {
                if Self::accept_for_step(state, ResourceKind::Submission, generation) {
                    match result {
                        Ok(confirmation) => {
                            tracing::info!(
                                booking_id = %confirmation.id,
                                confirmation_code = %confirmation.confirmation_code,
                                "Booking confirmed"
                            );
                            state.resources.submission = AsyncResource::Success(confirmation.clone());
                            state.confirmation = Some(confirmation);
                            state.confirmed_at = Some(env.clock.now());
                            state.field_errors.clear();
                        },
                        Err(error) => Self::record_failure(state, ResourceKind::Submission, &error),
                    }
                }
                Effect::None
            },
            WizardAction::BookingCancelled { generation, result } => {
                if Self::accept(state, ResourceKind::Cancellation, generation) {
                    match result {
                        Ok(confirmation) => {
                            tracing::info!(booking_id = %confirmation.id, "Booking cancelled");
                            state.resources.cancellation = AsyncResource::Success(confirmation.clone());
                            state.confirmation = Some(confirmation);
                        },
                        Err(error) => {
                            Self::record_failure(state, ResourceKind::Cancellation, &error);
                        },
                    }
                }
                Effect::None
            },
            WizardAction::BookingRescheduled { generation, result } => {
                if Self::accept(state, ResourceKind::Reschedule, generation) {
                    match result {
                        Ok(confirmation) => {
                            if let Some(ResourceRequest::Reschedule {
                                date, time_slot_id, ..
                            }) = state
                                .resources
                                .last_request(ResourceKind::Reschedule)
                                .map(|record| record.request.clone())
                            {
                                state.draft.selected_date = Some(date);
                                state.draft.selected_time_slot_id = Some(time_slot_id);
                            }
                            tracing::info!(booking_id = %confirmation.id, "Booking rescheduled");
                            state.resources.reschedule = AsyncResource::Success(confirmation.clone());
                            state.confirmation = Some(confirmation);
                        },
                        Err(error) => {
                            Self::record_failure(state, ResourceKind::Reschedule, &error);
                        },
                    }
                }
                Effect::None
            },
        };

        smallvec![effect]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use booking_client::DateAvailability;
    use booking_core::environment::ConnectivitySignal;
    use booking_runtime::retry::RetryPolicy;
    use booking_testing::{ReducerTest, assertions, fixtures, test_clock};

    fn test_env() -> WizardEnvironment {
        WizardEnvironment::new(
            Arc::new(fixtures::standard_service()),
            Arc::new(test_clock()),
            Arc::new(ConnectivitySignal::new(true)),
            WizardConfig::default().with_retry_policy(RetryPolicy::none()),
        )
    }

    fn services_loaded() -> Vec<WizardAction> {
        vec![
            WizardAction::Start,
            WizardAction::ServicesFetched {
                generation: 1,
                result: Ok(vec![
                    fixtures::massage_therapy(),
                    fixtures::financial_coaching(),
                    fixtures::reiki(),
                ]),
            },
        ]
    }

    fn at_date_selection() -> Vec<WizardAction> {
        let mut actions = services_loaded();
        actions.extend([
            WizardAction::SelectService {
                service_id: fixtures::massage_therapy().id,
            },
            WizardAction::GoNext,
            WizardAction::DatesFetched {
                generation: 1,
                result: Ok(vec![
                    DateAvailability::available(fixtures::may_15()),
                    DateAvailability::available(fixtures::may_16()),
                    DateAvailability {
                        date: fixtures::may_17(),
                        has_availability: false,
                    },
                ]),
            },
        ]);
        actions
    }

    /// Pay later chosen and the policy accepted, nothing submitted yet
    fn ready_to_submit() -> Vec<WizardAction> {
        let mut actions = at_date_selection();
        actions.extend([
            WizardAction::SelectDate {
                date: fixtures::may_15(),
            },
            WizardAction::TimeSlotsFetched {
                generation: 1,
                result: Ok(vec![fixtures::ten_am_slot()]),
            },
            WizardAction::SelectTimeSlot {
                time_slot_id: fixtures::ten_am_slot().id,
            },
            WizardAction::GoNext,
            WizardAction::UpdateClientInfo {
                client: fixtures::john_doe(),
            },
            WizardAction::GoNext,
            WizardAction::ChoosePaymentMethod {
                method: PaymentMethod::PayLater,
            },
            WizardAction::AcknowledgeCancellationPolicy { accepted: true },
        ]);
        actions
    }

    fn failed_submission() -> Vec<WizardAction> {
        let mut actions = ready_to_submit();
        actions.extend([
            WizardAction::Submit,
            WizardAction::BookingSubmitted {
                generation: 1,
                result: Err(ServiceError::Network("connection reset".to_string())),
            },
        ]);
        actions
    }

    #[test]
    fn start_requests_services() {
        ReducerTest::new(WizardReducer::new())
            .with_env(test_env())
            .given_state(WizardState::default())
            .when_action(WizardAction::Start)
            .then_state(|state| {
                assert!(state.resources.services.is_loading());
                assert_eq!(state.resources.generation(ResourceKind::Services), 1);
            })
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }

    #[test]
    fn stale_services_response_is_discarded() {
        ReducerTest::new(WizardReducer::new())
            .with_env(test_env())
            .given_state(WizardState::default())
            .given_actions([WizardAction::Start, WizardAction::Restart])
            .when_action(WizardAction::ServicesFetched {
                generation: 1,
                result: Ok(vec![fixtures::massage_therapy()]),
            })
            .then_state(|state| {
                assert!(state.resources.services.is_loading());
                assert!(state.resources.generation(ResourceKind::Services) > 1);
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn unknown_service_is_rejected() {
        ReducerTest::new(WizardReducer::new())
            .with_env(test_env())
            .given_state(WizardState::default())
            .given_actions(services_loaded())
            .when_action(WizardAction::SelectService {
                service_id: ServiceId::new("service-99"),
            })
            .then_state(|state| {
                assert!(state.draft.selected_service_id.is_none());
                assert!(state.field_errors.contains_key(&Field::Service));
            })
            .run();
    }

    #[test]
    fn go_next_without_service_stays_and_reports() {
        ReducerTest::new(WizardReducer::new())
            .with_env(test_env())
            .given_state(WizardState::default())
            .given_actions(services_loaded())
            .when_action(WizardAction::GoNext)
            .then_state(|state| {
                assert_eq!(state.current_step, WizardStep::ServiceSelection);
                assert_eq!(
                    state.field_errors.get(&Field::Service).map(String::as_str),
                    Some("Please select a service")
                );
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn entering_date_selection_fetches_dates() {
        let mut setup = services_loaded();
        setup.push(WizardAction::SelectService {
            service_id: fixtures::massage_therapy().id,
        });

        ReducerTest::new(WizardReducer::new())
            .with_env(test_env())
            .given_state(WizardState::default())
            .given_actions(setup)
            .when_action(WizardAction::GoNext)
            .then_state(|state| {
                assert_eq!(state.current_step, WizardStep::DateSelection);
                assert!(state.resources.dates.is_loading());
            })
            .then_effects(|effects| assert_eq!(assertions::count_futures(effects), 1))
            .run();
    }

    #[test]
    fn past_date_is_rejected() {
        let yesterday = test_clock().now().date_naive().pred_opt().unwrap();

        ReducerTest::new(WizardReducer::new())
            .with_env(test_env())
            .given_state(WizardState::default())
            .given_actions(at_date_selection())
            .when_action(WizardAction::SelectDate { date: yesterday })
            .then_state(|state| {
                assert!(state.draft.selected_date.is_none());
                assert!(state.field_errors.contains_key(&Field::Date));
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn date_without_availability_is_rejected() {
        ReducerTest::new(WizardReducer::new())
            .with_env(test_env())
            .given_state(WizardState::default())
            .given_actions(at_date_selection())
            .when_action(WizardAction::SelectDate {
                date: fixtures::may_17(),
            })
            .then_state(|state| assert!(state.draft.selected_date.is_none()))
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn selecting_a_date_clears_slot_and_fetches_slots() {
        let mut setup = at_date_selection();
        setup.extend([
            WizardAction::SelectDate {
                date: fixtures::may_15(),
            },
            WizardAction::TimeSlotsFetched {
                generation: 1,
                result: Ok(vec![fixtures::ten_am_slot(), fixtures::eleven_am_slot()]),
            },
            WizardAction::SelectTimeSlot {
                time_slot_id: fixtures::ten_am_slot().id,
            },
        ]);

        ReducerTest::new(WizardReducer::new())
            .with_env(test_env())
            .given_state(WizardState::default())
            .given_actions(setup)
            .when_action(WizardAction::SelectDate {
                date: fixtures::may_16(),
            })
            .then_state(|state| {
                assert_eq!(state.draft.selected_date, Some(fixtures::may_16()));
                assert!(state.draft.selected_time_slot_id.is_none());
                assert!(state.resources.time_slots.is_loading());
                assert_eq!(state.resources.generation(ResourceKind::TimeSlots), 2);
            })
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }

    #[test]
    fn going_back_discards_in_flight_slots() {
        let mut setup = at_date_selection();
        setup.push(WizardAction::SelectDate {
            date: fixtures::may_15(),
        });

        ReducerTest::new(WizardReducer::new())
            .with_env(test_env())
            .given_state(WizardState::default())
            .given_actions(setup)
            .when_action(WizardAction::GoBack)
            .then_state(|state| {
                assert_eq!(state.current_step, WizardStep::ServiceSelection);
                assert_eq!(state.resources.status(ResourceKind::TimeSlots), ResourceStatus::Idle);
                assert!(!state.resources.is_current(ResourceKind::TimeSlots, 1));
                assert_eq!(state.draft.selected_date, Some(fixtures::may_15()));
            })
            .run();
    }

    #[test]
    fn offline_request_is_deferred_without_a_call() {
        ReducerTest::new(WizardReducer::new())
            .with_env(test_env())
            .given_state(WizardState::new(false))
            .when_action(WizardAction::Start)
            .then_state(|state| {
                assert_eq!(state.resources.services.error_message(), Some(OFFLINE_MESSAGE));
                assert_eq!(state.resources.deferred(), vec![ResourceRequest::Services]);
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn reconnecting_schedules_replay() {
        ReducerTest::new(WizardReducer::new())
            .with_env(test_env())
            .given_state(WizardState::new(false))
            .given_actions([WizardAction::Start])
            .when_action(WizardAction::ConnectivityChanged { online: true })
            .then_state(|state| assert!(state.online))
            .then_effects(assertions::assert_has_delay_effect)
            .run();
    }

    #[test]
    fn replay_reissues_deferred_requests() {
        ReducerTest::new(WizardReducer::new())
            .with_env(test_env())
            .given_state(WizardState::new(false))
            .given_actions([
                WizardAction::Start,
                WizardAction::ConnectivityChanged { online: true },
            ])
            .when_action(WizardAction::ReplayDeferred)
            .then_state(|state| {
                assert!(state.resources.services.is_loading());
                assert!(!state.resources.has_deferred());
            })
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }

    #[test]
    fn reconnecting_without_deferred_requests_does_nothing() {
        ReducerTest::new(WizardReducer::new())
            .with_env(test_env())
            .given_state(WizardState::new(false))
            .when_action(WizardAction::ConnectivityChanged { online: true })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn failed_fetch_surfaces_user_message_and_can_be_retried() {
        ReducerTest::new(WizardReducer::new())
            .with_env(test_env())
            .given_state(WizardState::default())
            .given_actions([
                WizardAction::Start,
                WizardAction::ServicesFetched {
                    generation: 1,
                    result: Err(ServiceError::Timeout),
                },
            ])
            .when_action(WizardAction::Retry {
                kind: ResourceKind::Services,
            })
            .then_state(|state| {
                assert!(state.resources.services.is_loading());
                assert_eq!(state.resources.generation(ResourceKind::Services), 2);
            })
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }

    #[test]
    fn retry_is_ignored_unless_failed() {
        ReducerTest::new(WizardReducer::new())
            .with_env(test_env())
            .given_state(WizardState::default())
            .given_actions(services_loaded())
            .when_action(WizardAction::Retry {
                kind: ResourceKind::Services,
            })
            .then_state(|state| assert_eq!(state.resources.generation(ResourceKind::Services), 1))
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn submit_outside_confirmation_is_ignored() {
        ReducerTest::new(WizardReducer::new())
            .with_env(test_env())
            .given_state(WizardState::default())
            .given_actions(services_loaded())
            .when_action(WizardAction::Submit)
            .then_state(|state| assert_eq!(state.resources.status(ResourceKind::Submission), ResourceStatus::Idle))
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn editing_one_field_clears_only_its_error() {
        let mut setup = at_date_selection();
        setup.extend([
            WizardAction::SelectDate {
                date: fixtures::may_15(),
            },
            WizardAction::TimeSlotsFetched {
                generation: 1,
                result: Ok(vec![fixtures::ten_am_slot()]),
            },
            WizardAction::SelectTimeSlot {
                time_slot_id: fixtures::ten_am_slot().id,
            },
            WizardAction::GoNext,
            WizardAction::GoNext,
        ]);

        let client = ClientInfo {
            full_name: "John Doe".to_string(),
            ..ClientInfo::default()
        };

        ReducerTest::new(WizardReducer::new())
            .with_env(test_env())
            .given_state(WizardState::default())
            .given_actions(setup)
            .when_action(WizardAction::UpdateClientInfo { client })
            .then_state(|state| {
                assert_eq!(state.current_step, WizardStep::ClientInformation);
                assert!(!state.field_errors.contains_key(&Field::FullName));
                assert!(state.field_errors.contains_key(&Field::Email));
                assert!(state.field_errors.contains_key(&Field::Phone));
                assert!(state.field_errors.contains_key(&Field::Terms));
            })
            .run();
    }

    #[test]
    fn leaving_confirmation_discards_a_failed_submission() {
        ReducerTest::new(WizardReducer::new())
            .with_env(test_env())
            .given_state(WizardState::default())
            .given_actions(failed_submission())
            .when_action(WizardAction::GoBack)
            .then_state(|state| {
                assert_eq!(state.current_step, WizardStep::ClientInformation);
                assert_eq!(
                    state.resources.status(ResourceKind::Submission),
                    ResourceStatus::Idle
                );
                assert_eq!(state.resources.generation(ResourceKind::Submission), 2);
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn submission_retry_is_ignored_away_from_confirmation() {
        let mut setup = failed_submission();
        setup.extend([
            WizardAction::GoBack,
            WizardAction::UpdateClientInfo {
                client: ClientInfo {
                    full_name: "Jane Roe".to_string(),
                    ..fixtures::john_doe()
                },
            },
        ]);

        ReducerTest::new(WizardReducer::new())
            .with_env(test_env())
            .given_state(WizardState::default())
            .given_actions(setup)
            .when_action(WizardAction::Retry {
                kind: ResourceKind::Submission,
            })
            .then_state(|state| {
                assert_eq!(state.current_step, WizardStep::ClientInformation);
                assert_eq!(state.resources.generation(ResourceKind::Submission), 2);
                assert!(!state.is_confirmed());
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn submission_retry_is_rebuilt_from_the_current_draft() {
        let mut setup = failed_submission();
        setup.push(WizardAction::ChoosePaymentMethod {
            method: PaymentMethod::PayAtAppointment,
        });

        ReducerTest::new(WizardReducer::new())
            .with_env(test_env())
            .given_state(WizardState::default())
            .given_actions(setup)
            .when_action(WizardAction::Retry {
                kind: ResourceKind::Submission,
            })
            .then_state(|state| {
                assert!(state.is_submitting());
                let record = state.resources.last_request(ResourceKind::Submission).unwrap();
                let ResourceRequest::Submission(request) = &record.request else {
                    panic!("expected a submission request");
                };
                assert_eq!(request.payment_method, PaymentMethod::PayAtAppointment);
            })
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }

    #[test]
    fn held_submission_is_dropped_when_leaving_confirmation() {
        let mut setup = ready_to_submit();
        setup.extend([
            WizardAction::ConnectivityChanged { online: false },
            WizardAction::Submit,
            WizardAction::GoBack,
        ]);

        ReducerTest::new(WizardReducer::new())
            .with_env(test_env())
            .given_state(WizardState::default())
            .given_actions(setup)
            .when_action(WizardAction::ConnectivityChanged { online: true })
            .then_state(|state| {
                assert_eq!(state.current_step, WizardStep::ClientInformation);
                assert!(!state.resources.has_deferred());
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn replay_skips_requests_for_an_inactive_step() {
        let mut setup = at_date_selection();
        setup.extend([
            WizardAction::ConnectivityChanged { online: false },
            WizardAction::SelectDate {
                date: fixtures::may_15(),
            },
            WizardAction::ConnectivityChanged { online: true },
        ]);
        let env = test_env();
        let mut state = WizardState::default();
        for action in setup {
            let _effects = WizardReducer::new().reduce(&mut state, action, &env);
        }
        // Moved directly, so the held request is still recorded
        state.current_step = WizardStep::ServiceSelection;

        ReducerTest::new(WizardReducer::new())
            .with_env(test_env())
            .given_state(state)
            .when_action(WizardAction::ReplayDeferred)
            .then_state(|state| {
                assert!(!state.resources.has_deferred());
                assert_eq!(
                    state.resources.status(ResourceKind::TimeSlots),
                    ResourceStatus::Idle
                );
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }
}
