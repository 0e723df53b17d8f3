//! Wire types exchanged with the remote booking service.
//!
//! Field names are camelCase on the wire.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the inner string value
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }
    };
}

string_id!(
    /// Identifier of a bookable service
    ServiceId
);
string_id!(
    /// Identifier of a time slot on a given date
    TimeSlotId
);
string_id!(
    /// Identifier of a submitted booking
    BookingId
);

/// Money amount in cents (to avoid floating point issues)
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates a new money amount from cents
    #[must_use]
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Creates a new money amount from whole dollars
    #[must_use]
    pub const fn from_dollars(dollars: i64) -> Self {
        Self(dollars * 100)
    }

    /// Returns the value in cents
    #[must_use]
    pub const fn cents(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}${}.{:02}", abs / 100, abs % 100)
    }
}

/// A bookable service
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    /// Service identifier
    pub id: ServiceId,
    /// Display name
    pub name: String,
    /// Short description
    pub description: String,
    /// Price charged for the appointment
    pub price: Money,
    /// Appointment length
    pub duration_minutes: u32,
}

/// Whether a calendar date has open slots
///
/// The service answers either with bare ISO dates (all available) or with
/// `{ "date": ..., "hasAvailability": ... }` objects; both decode into this type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "DateEntry", rename_all = "camelCase")]
pub struct DateAvailability {
    /// Calendar date
    pub date: NaiveDate,
    /// Whether at least one slot is open
    pub has_availability: bool,
}

impl DateAvailability {
    /// An available date
    #[must_use]
    pub const fn available(date: NaiveDate) -> Self {
        Self {
            date,
            has_availability: true,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DateEntry {
    Plain(NaiveDate),
    #[serde(rename_all = "camelCase")]
    Detailed {
        date: NaiveDate,
        #[serde(default = "available_by_default")]
        has_availability: bool,
    },
}

const fn available_by_default() -> bool {
    true
}

impl From<DateEntry> for DateAvailability {
    fn from(entry: DateEntry) -> Self {
        match entry {
            DateEntry::Plain(date) => Self::available(date),
            DateEntry::Detailed {
                date,
                has_availability,
            } => Self {
                date,
                has_availability,
            },
        }
    }
}

/// An appointment slot on a specific date
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    /// Slot identifier
    pub id: TimeSlotId,
    /// Start time, `HH:MM`
    pub start_time: String,
    /// End time, `HH:MM`
    pub end_time: String,
    /// Whether the slot can still be booked
    pub is_available: bool,
}

/// Contact details entered by the client
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    /// Full name
    pub full_name: String,
    /// Email address
    pub email: String,
    /// Phone number
    pub phone: String,
    /// Terms of service accepted
    pub terms_accepted: bool,
}

/// How the appointment will be paid
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Card payment authorized up front through a payment intent
    CreditCard,
    /// Paid in person at the appointment
    PayAtAppointment,
    /// Invoiced later
    PayLater,
}

impl PaymentMethod {
    /// Whether this method needs a payment intent before submission
    #[must_use]
    pub const fn requires_payment_intent(self) -> bool {
        matches!(self, Self::CreditCard)
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreditCard => write!(f, "Credit Card"),
            Self::PayAtAppointment => write!(f, "Pay at Appointment"),
            Self::PayLater => write!(f, "Pay Later"),
        }
    }
}

/// Request to authorize a card payment
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentRequest {
    /// Amount to authorize
    pub amount: Money,
    /// ISO currency code, lowercase
    pub currency: String,
    /// Service being paid for
    pub service_id: ServiceId,
    /// Receipt address, when already known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,
}

/// An authorized payment intent
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    /// Payment intent identifier
    pub payment_intent_id: String,
    /// Secret handed to the card form
    pub client_secret: String,
}

/// Booking submission assembled from the wizard draft
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    /// Chosen service
    pub service_id: ServiceId,
    /// Appointment date
    pub date: NaiveDate,
    /// Chosen slot on that date
    pub time_slot_id: TimeSlotId,
    /// Contact details
    pub client: ClientInfo,
    /// Payment method
    pub payment_method: PaymentMethod,
    /// Present for card payments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,
}

/// Lifecycle status reported by the booking service
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Awaiting confirmation by the practice
    Pending,
    /// Confirmed
    Confirmed,
    /// Cancelled by the client
    Cancelled,
    /// Moved to a new date or slot
    Rescheduled,
}

/// Result of a successful submission, cancellation or reschedule
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingConfirmation {
    /// Booking identifier
    pub id: BookingId,
    /// Current status
    pub status: BookingStatus,
    /// Code shown to the client
    pub confirmation_code: String,
}
