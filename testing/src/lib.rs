//! # Booking Testing
//!
//! Testing utilities and helpers for the booking wizard.
//!
//! This crate provides:
//! - Mock implementations of Environment traits
//! - [`InMemoryBookingService`], a scriptable [`BookingService`](booking_client::BookingService)
//! - Fixture data matching the canonical booking scenario
//! - Property-based testing strategies for client details
//! - Assertion helpers for reducers
//!
//! ## Example
//!
//! ```ignore
//! use booking_testing::{fixtures, test_clock};
//!
//! #[tokio::test]
//! async fn books_a_massage() {
//!     let service = fixtures::standard_service();
//!     let flow = BookingFlow::new(test_environment(service.clone()));
//!
//!     flow.start().await?;
//!     flow.select_service(fixtures::massage_therapy().id).await?;
//!     // ...
//!     assert_eq!(service.submissions().len(), 1);
//! }
//! ```

use booking_core::environment::Clock;
use chrono::{DateTime, Utc};

pub mod in_memory;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use booking_testing::mocks::FixedClock;
    /// use booking_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Fixed clock set to the morning of the canonical booking scenario
    /// (2023-05-01 09:00:00 UTC)
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded timestamp fails to parse, which cannot happen.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2023-05-01T09:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Canonical data for booking scenarios
///
/// "Massage Therapy" (`service-1`) on 2023-05-15 at `slot-1` (10:00 to 11:00),
/// booked by John Doe.
pub mod fixtures {
    use crate::in_memory::InMemoryBookingService;
    use booking_client::{
        ClientInfo, DateAvailability, Money, Service, ServiceId, TimeSlot, TimeSlotId,
    };
    use chrono::NaiveDate;

    /// `service-1`, 60 minutes, $85
    #[must_use]
    pub fn massage_therapy() -> Service {
        Service {
            id: ServiceId::new("service-1"),
            name: "Massage Therapy".to_string(),
            description: "Full body therapeutic massage".to_string(),
            price: Money::from_dollars(85),
            duration_minutes: 60,
        }
    }

    /// `service-2`, 90 minutes, $120
    #[must_use]
    pub fn financial_coaching() -> Service {
        Service {
            id: ServiceId::new("service-2"),
            name: "Financial Recovery Coaching".to_string(),
            description: "Budgeting and debt recovery session".to_string(),
            price: Money::from_dollars(120),
            duration_minutes: 90,
        }
    }

    /// `service-3`, 60 minutes, $70 (same duration as massage therapy)
    #[must_use]
    pub fn reiki() -> Service {
        Service {
            id: ServiceId::new("service-3"),
            name: "Reiki Session".to_string(),
            description: "Energy healing session".to_string(),
            price: Money::from_dollars(70),
            duration_minutes: 60,
        }
    }

    /// 2023-05-15
    #[must_use]
    pub fn may_15() -> NaiveDate {
        day_of_may(15)
    }

    /// 2023-05-16
    #[must_use]
    pub fn may_16() -> NaiveDate {
        day_of_may(16)
    }

    /// 2023-05-17, offered without availability
    #[must_use]
    pub fn may_17() -> NaiveDate {
        day_of_may(17)
    }

    #[allow(clippy::expect_used)]
    fn day_of_may(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 5, day).expect("hardcoded date should be valid")
    }

    /// `slot-1`, 10:00 to 11:00
    #[must_use]
    pub fn ten_am_slot() -> TimeSlot {
        slot("slot-1", "10:00", "11:00", true)
    }

    /// `slot-2`, 11:00 to 12:00
    #[must_use]
    pub fn eleven_am_slot() -> TimeSlot {
        slot("slot-2", "11:00", "12:00", true)
    }

    /// `slot-3`, 14:00 to 15:00, already taken
    #[must_use]
    pub fn booked_slot() -> TimeSlot {
        slot("slot-3", "14:00", "15:00", false)
    }

    /// `slot-4`, 09:00 to 10:00 (only offered on May 16)
    #[must_use]
    pub fn nine_am_slot() -> TimeSlot {
        slot("slot-4", "09:00", "10:00", true)
    }

    /// A time slot
    #[must_use]
    pub fn slot(id: &str, start: &str, end: &str, is_available: bool) -> TimeSlot {
        TimeSlot {
            id: TimeSlotId::new(id),
            start_time: start.to_string(),
            end_time: end.to_string(),
            is_available,
        }
    }

    /// John Doe with terms accepted
    #[must_use]
    pub fn john_doe() -> ClientInfo {
        ClientInfo {
            full_name: "John Doe".to_string(),
            email: "john.doe@example.com".to_string(),
            phone: "555-123-4567".to_string(),
            terms_accepted: true,
        }
    }

    /// Service preloaded with the canonical catalogue
    ///
    /// - every service offers May 15 and May 16, plus May 17 without availability
    /// - May 15 has `slot-1`, `slot-2` and the taken `slot-3`
    /// - May 16 has `slot-4`
    #[must_use]
    pub fn standard_service() -> InMemoryBookingService {
        let service = InMemoryBookingService::new();
        let dates = vec![
            DateAvailability::available(may_15()),
            DateAvailability::available(may_16()),
            DateAvailability {
                date: may_17(),
                has_availability: false,
            },
        ];

        for offered in [massage_therapy(), financial_coaching(), reiki()] {
            service.set_dates(&offered.id, dates.clone());
            service.set_time_slots(
                &offered.id,
                may_15(),
                vec![ten_am_slot(), eleven_am_slot(), booked_slot()],
            );
            service.set_time_slots(&offered.id, may_16(), vec![nine_am_slot()]);
            service.add_service(offered);
        }

        service
    }
}

/// Property-based testing strategies using proptest
pub mod properties {
    use booking_client::ClientInfo;
    use proptest::prelude::*;

    /// Addresses of the form `local@domain.tld`
    pub fn valid_email() -> impl Strategy<Value = String> {
        ("[a-z0-9._%+-]{1,16}", "[a-z0-9-]{1,12}", "[a-z]{2,6}")
            .prop_map(|(local, domain, tld)| format!("{local}@{domain}.{tld}"))
    }

    /// Strings that cannot be email addresses (no `@`, or no dot after it)
    pub fn invalid_email() -> impl Strategy<Value = String> {
        prop_oneof![
            "[a-z0-9.]{0,20}",
            "[a-z0-9]{1,10}@[a-z0-9]{1,10}",
            "[a-z0-9]{1,10} [a-z0-9]{1,10}@[a-z]{1,8}\\.[a-z]{2,4}",
        ]
    }

    /// Non-blank text such as a name or phone number
    pub fn non_blank() -> impl Strategy<Value = String> {
        "[A-Za-z0-9][A-Za-z0-9 .'-]{0,30}"
    }

    /// Client details that pass every client-information check
    pub fn valid_client_info() -> impl Strategy<Value = ClientInfo> {
        (non_blank(), valid_email(), "[0-9][0-9 ()+-]{6,15}").prop_map(
            |(full_name, email, phone)| ClientInfo {
                full_name,
                email,
                phone,
                terms_accepted: true,
            },
        )
    }
}

// Re-export commonly used items
pub use in_memory::{Call, InMemoryBookingService, Operation, ResponseGate};
pub use mocks::{FixedClock, test_clock};
pub use reducer_test::{ReducerTest, assertions};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn standard_service_offers_canonical_slot() {
        let service = fixtures::standard_service();
        let slots = service.time_slots_for(&fixtures::massage_therapy().id, fixtures::may_15());
        assert!(slots.contains(&fixtures::ten_am_slot()));
    }
}
