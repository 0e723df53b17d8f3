//! Booking flow facade.
//!
//! [`BookingFlow`] owns the store for one booking session and bridges the
//! injected connectivity signal into it. Every intent method sends one action
//! and returns the [`EffectHandle`] tracking the work it started.

use crate::navigation::NavigationControls;
use crate::reducer::{WizardEnvironment, WizardReducer};
use crate::types::{ResourceKind, WizardAction, WizardState};
use booking_client::{ClientInfo, PaymentMethod, ServiceId, TimeSlotId};
use booking_runtime::{EffectHandle, Store, StoreError};
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Store running the booking wizard
pub type WizardStore = Store<WizardState, WizardAction, WizardEnvironment, WizardReducer>;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// One booking session
///
/// Must be created inside a Tokio runtime. Dropping the flow stops the
/// connectivity listener.
pub struct BookingFlow {
    store: Arc<WizardStore>,
    connectivity_listener: JoinHandle<()>,
}

impl BookingFlow {
    /// Create a session with fresh state
    ///
    /// Initial connectivity is read from the environment; later changes are
    /// forwarded as [`WizardAction::ConnectivityChanged`].
    #[must_use]
    pub fn new(env: WizardEnvironment) -> Self {
        // Subscribe before reading so no transition falls between the two
        let mut changes = env.connectivity.subscribe();
        let online = *changes.borrow_and_update();

        let store = Arc::new(Store::new(
            WizardState::new(online),
            WizardReducer::new(),
            env,
        ));

        let listener_store = Arc::clone(&store);
        let connectivity_listener = tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let online = *changes.borrow_and_update();
                tracing::debug!(online, "Connectivity changed");
                if let Err(error) = listener_store
                    .send(WizardAction::ConnectivityChanged { online })
                    .await
                {
                    tracing::debug!(%error, "Connectivity listener stopping");
                    break;
                }
            }
        });

        Self {
            store,
            connectivity_listener,
        }
    }

    /// The underlying store
    #[must_use]
    pub fn store(&self) -> &WizardStore {
        &self.store
    }

    /// Send an action
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] once the flow is shutting down.
    pub async fn send(&self, action: WizardAction) -> Result<EffectHandle, StoreError> {
        self.store.send(action).await
    }

    /// Fetch services
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] once the flow is shutting down.
    pub async fn start(&self) -> Result<EffectHandle, StoreError> {
        self.send(WizardAction::Start).await
    }

    /// Choose a service
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] once the flow is shutting down.
    pub async fn select_service(&self, service_id: ServiceId) -> Result<EffectHandle, StoreError> {
        self.send(WizardAction::SelectService { service_id }).await
    }

    /// Choose a date
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] once the flow is shutting down.
    pub async fn select_date(&self, date: NaiveDate) -> Result<EffectHandle, StoreError> {
        self.send(WizardAction::SelectDate { date }).await
    }

    /// Choose a time slot
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] once the flow is shutting down.
    pub async fn select_time_slot(
        &self,
        time_slot_id: TimeSlotId,
    ) -> Result<EffectHandle, StoreError> {
        self.send(WizardAction::SelectTimeSlot { time_slot_id }).await
    }

    /// Replace the contact details
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] once the flow is shutting down.
    pub async fn update_client_info(&self, client: ClientInfo) -> Result<EffectHandle, StoreError> {
        self.send(WizardAction::UpdateClientInfo { client }).await
    }

    /// Choose a payment method
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] once the flow is shutting down.
    pub async fn choose_payment_method(
        &self,
        method: PaymentMethod,
    ) -> Result<EffectHandle, StoreError> {
        self.send(WizardAction::ChoosePaymentMethod { method }).await
    }

    /// Tick or untick the cancellation policy
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] once the flow is shutting down.
    pub async fn acknowledge_cancellation_policy(
        &self,
        accepted: bool,
    ) -> Result<EffectHandle, StoreError> {
        self.send(WizardAction::AcknowledgeCancellationPolicy { accepted })
            .await
    }

    /// Advance if the active step validates
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] once the flow is shutting down.
    pub async fn go_next(&self) -> Result<EffectHandle, StoreError> {
        self.send(WizardAction::GoNext).await
    }

    /// Return to the previous step
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] once the flow is shutting down.
    pub async fn go_back(&self) -> Result<EffectHandle, StoreError> {
        self.send(WizardAction::GoBack).await
    }

    /// Submit the booking
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] once the flow is shutting down.
    pub async fn submit(&self) -> Result<EffectHandle, StoreError> {
        self.send(WizardAction::Submit).await
    }

    /// Re-issue the failed request for `kind`
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] once the flow is shutting down.
    pub async fn retry(&self, kind: ResourceKind) -> Result<EffectHandle, StoreError> {
        self.send(WizardAction::Retry { kind }).await
    }

    /// Start over
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] once the flow is shutting down.
    pub async fn restart(&self) -> Result<EffectHandle, StoreError> {
        self.send(WizardAction::Restart).await
    }

    /// Cancel the confirmed booking
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] once the flow is shutting down.
    pub async fn cancel_booking(&self) -> Result<EffectHandle, StoreError> {
        self.send(WizardAction::CancelBooking).await
    }

    /// Move the confirmed booking
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] once the flow is shutting down.
    pub async fn reschedule_booking(
        &self,
        date: NaiveDate,
        time_slot_id: TimeSlotId,
    ) -> Result<EffectHandle, StoreError> {
        self.send(WizardAction::RescheduleBooking { date, time_slot_id })
            .await
    }

    /// Read state through a closure
    pub async fn state<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&WizardState) -> T,
    {
        self.store.state(f).await
    }

    /// Copy of the current state
    pub async fn snapshot(&self) -> WizardState {
        self.store.state(WizardState::clone).await
    }

    /// Navigation controls for the current state
    pub async fn navigation(&self) -> NavigationControls {
        self.store.state(NavigationControls::project).await
    }

    /// Wait until `predicate` holds for the state
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Timeout`] if it does not hold before `timeout`.
    pub async fn wait_for_state<F>(&self, predicate: F, timeout: Duration) -> Result<(), StoreError>
    where
        F: Fn(&WizardState) -> bool,
    {
        tokio::time::timeout(timeout, async {
            while !self.store.state(&predicate).await {
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        })
        .await
        .map_err(|_| StoreError::Timeout)
    }

    /// Wait until no remote call or delayed action is pending
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Timeout`] if work is still pending after `timeout`.
    pub async fn settle(&self, timeout: Duration) -> Result<(), StoreError> {
        self.store.settle(timeout).await
    }

    /// Stop accepting intents and wait for pending work
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownTimeout`] if work is still pending after
    /// `timeout`.
    pub async fn shutdown(&self, timeout: Option<Duration>) -> Result<(), StoreError> {
        self.connectivity_listener.abort();
        self.store.shutdown(timeout).await
    }
}

impl Drop for BookingFlow {
    fn drop(&mut self) {
        self.connectivity_listener.abort();
    }
}

impl std::fmt::Debug for BookingFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookingFlow")
            .field("pending_effects", &self.store.pending_effects())
            .finish_non_exhaustive()
    }
}
