//! Step validators.
//!
//! Pure checks over the draft. They never look at remote resource state
//! beyond the slot list they are handed, and every check on a step runs, so
//! all problems with a step surface at once.

use crate::types::{BookingDraft, WizardStep};
use booking_client::TimeSlot;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});

/// Form fields that can carry a validation message
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    /// Service choice
    Service,
    /// Appointment date
    Date,
    /// Time slot
    TimeSlot,
    /// Client full name
    FullName,
    /// Client email
    Email,
    /// Client phone
    Phone,
    /// Terms of service checkbox
    Terms,
    /// Payment method choice
    PaymentMethod,
    /// Card payment authorization
    PaymentIntent,
    /// Cancellation policy checkbox
    CancellationPolicy,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Service => "service",
            Self::Date => "date",
            Self::TimeSlot => "timeSlot",
            Self::FullName => "fullName",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Terms => "terms",
            Self::PaymentMethod => "paymentMethod",
            Self::PaymentIntent => "paymentIntent",
            Self::CancellationPolicy => "cancellationPolicy",
        };
        f.write_str(name)
    }
}

impl Field {
    /// The step on which this field is entered
    #[must_use]
    pub const fn step(self) -> WizardStep {
        match self {
            Self::Service => WizardStep::ServiceSelection,
            Self::Date | Self::TimeSlot => WizardStep::DateSelection,
            Self::FullName | Self::Email | Self::Phone | Self::Terms => {
                WizardStep::ClientInformation
            },
            Self::PaymentMethod | Self::PaymentIntent | Self::CancellationPolicy => {
                WizardStep::Confirmation
            },
        }
    }
}

/// Outcome of validating one or more steps
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationResult {
    /// Message per invalid field
    pub fields: BTreeMap<Field, String>,
}

impl ValidationResult {
    /// Whether no field failed
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.fields.is_empty()
    }

    /// Message for a field, if it failed
    #[must_use]
    pub fn error(&self, field: Field) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    fn reject(&mut self, field: Field, message: &str) {
        self.fields.insert(field, message.to_string());
    }
}

/// Whether `email` looks like `local@domain.tld`
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

/// Validate a single step
///
/// `available_slots` is the slot list loaded for the selected service and
/// date; the selected slot must be in it and still open.
#[must_use]
pub fn validate(step: WizardStep, draft: &BookingDraft, available_slots: &[TimeSlot]) -> ValidationResult {
    let mut result = ValidationResult::default();

    match step {
        WizardStep::ServiceSelection => {
            if draft.selected_service_id.is_none() {
                result.reject(Field::Service, "Please select a service");
            }
        },
        WizardStep::DateSelection => {
            if draft.selected_date.is_none() {
                result.reject(Field::Date, "Please select a date");
            }
            match &draft.selected_time_slot_id {
                None => result.reject(Field::TimeSlot, "Please select a time slot"),
                Some(slot_id) => {
                    let open = available_slots
                        .iter()
                        .any(|slot| &slot.id == slot_id && slot.is_available);
                    if !open {
                        result.reject(
                            Field::TimeSlot,
                            "The selected time slot is not available on this date",
                        );
                    }
                },
            }
        },
        WizardStep::ClientInformation => {
            let client = &draft.client_info;
            if client.full_name.trim().is_empty() {
                result.reject(Field::FullName, "Please enter your full name");
            }
            if client.email.trim().is_empty() {
                result.reject(Field::Email, "Please enter your email address");
            } else if !is_valid_email(&client.email) {
                result.reject(Field::Email, "Please enter a valid email address");
            }
            if client.phone.trim().is_empty() {
                result.reject(Field::Phone, "Please enter your phone number");
            }
            if !client.terms_accepted {
                result.reject(Field::Terms, "Please accept the terms and conditions");
            }
        },
        WizardStep::Confirmation => {
            match draft.payment_method {
                None => result.reject(Field::PaymentMethod, "Please select a payment method"),
                Some(method) if method.requires_payment_intent() && draft.payment_intent_id.is_none() => {
                    result.reject(Field::PaymentIntent, "Card payment has not been authorized yet");
                },
                Some(_) => {},
            }
            if !draft.cancellation_policy_accepted {
                result.reject(
                    Field::CancellationPolicy,
                    "Please acknowledge the cancellation policy",
                );
            }
        },
    }

    result
}

/// Validate every step up to and including `step`
#[must_use]
pub fn validate_through(
    step: WizardStep,
    draft: &BookingDraft,
    available_slots: &[TimeSlot],
) -> ValidationResult {
    let mut result = ValidationResult::default();
    for earlier in WizardStep::ALL.into_iter().filter(|s| *s <= step) {
        result
            .fields
            .extend(validate(earlier, draft, available_slots).fields);
    }
    result
}
