//! Navigation controls derived from wizard state.

use crate::types::{WizardState, WizardStep};
use crate::validation;
use serde::Serialize;

/// What the navigation bar shows for the current state
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationControls {
    /// Active step
    pub current_step: WizardStep,
    /// 1-based step number
    pub step_number: usize,
    /// Number of steps
    pub total_steps: usize,
    /// Whether the back button is shown
    pub can_go_back: bool,
    /// Whether the active step validates
    pub can_go_next: bool,
    /// Whether any remote request is in flight
    pub is_loading: bool,
    /// Forward button label
    pub next_label: &'static str,
    /// Whether the forward button is disabled
    pub next_disabled: bool,
}

impl NavigationControls {
    /// Project controls from state
    #[must_use]
    pub fn project(state: &WizardState) -> Self {
        let step = state.current_step;
        let confirmed = state.is_confirmed();
        let submitting = state.is_submitting();
        let can_go_next = !confirmed
            && validation::validate(step, &state.draft, state.slots_for_selection()).is_valid();

        Self {
            current_step: step,
            step_number: step.number(),
            total_steps: WizardStep::ALL.len(),
            can_go_back: step.previous().is_some() && !confirmed && !submitting,
            can_go_next,
            is_loading: state.resources.any_loading(),
            next_label: next_label(state),
            next_disabled: !can_go_next || submitting,
        }
    }
}

/// Label of the forward button
#[must_use]
pub fn next_label(state: &WizardState) -> &'static str {
    if state.is_confirmed() {
        return "Booking Confirmed";
    }
    match state.current_step {
        WizardStep::ServiceSelection => "Select Date & Time",
        WizardStep::DateSelection => "Enter Your Details",
        WizardStep::ClientInformation => "Review Booking",
        WizardStep::Confirmation if state.is_submitting() => "Processing...",
        WizardStep::Confirmation => "Confirm Booking",
    }
}
