//! Integration tests for Store action broadcasting
//!
//! Observers see every action the reducer processes, including feedback from
//! effects, which is how hosts wait for a remote call to land.

#![allow(clippy::unwrap_used, clippy::panic)] // Test code can use unwrap/panic

use booking_core::{SmallVec, delay, effect::Effect, reducer::Reducer, smallvec};
use booking_runtime::{Store, StoreError};
use std::time::Duration;

// ============================================================================
// Test Fixtures
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum LookupAction {
    /// Ask for availability on a day
    Lookup { day: u32 },
    /// Availability arrived
    Found { day: u32, open_slots: u32 },
    /// Hold for a moment then look up again
    LookupLater { day: u32 },
    /// Look up several days at once
    LookupMany { days: Vec<u32> },
    /// Never answered
    Hang,
}

#[derive(Debug, Clone, Default)]
struct LookupState {
    found: Vec<(u32, u32)>,
}

#[derive(Clone)]
struct LookupReducer;

impl Reducer for LookupReducer {
    type State = LookupState;
    type Action = LookupAction;
    type Environment = ();

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        _env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            LookupAction::Lookup { day } => smallvec![Effect::Future(Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Some(LookupAction::Found {
                    day,
                    open_slots: day % 4,
                })
            }))],
            LookupAction::Found { day, open_slots } => {
                state.found.push((day, open_slots));
                smallvec![Effect::None]
            },
            LookupAction::LookupLater { day } => smallvec![delay! {
                duration: Duration::from_millis(20),
                action: LookupAction::Lookup { day }
            }],
            LookupAction::LookupMany { days } => smallvec![Effect::merge(
                days.into_iter()
                    .map(|day| Effect::Future(Box::pin(async move {
                        Some(LookupAction::Lookup { day })
                    })))
                    .collect()
            )],
            LookupAction::Hang => smallvec![Effect::None],
        }
    }
}

fn store() -> Store<LookupState, LookupAction, (), LookupReducer> {
    Store::new(LookupState::default(), LookupReducer, ())
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn send_and_wait_for_matches_the_action_itself() {
    let store = store();

    let action = store
        .send_and_wait_for(
            LookupAction::Hang,
            |a| matches!(a, LookupAction::Hang),
            Duration::from_secs(1),
        )
        .await
        .unwrap();

    assert_eq!(action, LookupAction::Hang);
}

#[tokio::test]
async fn send_and_wait_for_sees_feedback() {
    let store = store();

    let action = store
        .send_and_wait_for(
            LookupAction::Lookup { day: 15 },
            |a| matches!(a, LookupAction::Found { .. }),
            Duration::from_secs(1),
        )
        .await
        .unwrap();

    assert_eq!(
        action,
        LookupAction::Found {
            day: 15,
            open_slots: 3
        }
    );
}

#[tokio::test]
async fn send_and_wait_for_times_out() {
    let store = store();

    let result = store
        .send_and_wait_for(
            LookupAction::Hang,
            |a| matches!(a, LookupAction::Found { .. }),
            Duration::from_millis(50),
        )
        .await;

    assert_eq!(result.unwrap_err(), StoreError::Timeout);
}

#[tokio::test]
async fn every_subscriber_sees_every_action() {
    let store = store();
    let mut first = store.subscribe_actions();
    let mut second = store.subscribe_actions();

    store
        .send(LookupAction::Lookup { day: 16 })
        .await
        .unwrap()
        .wait()
        .await;

    for rx in [&mut first, &mut second] {
        assert_eq!(rx.recv().await.unwrap(), LookupAction::Lookup { day: 16 });
        assert_eq!(
            rx.recv().await.unwrap(),
            LookupAction::Found {
                day: 16,
                open_slots: 0
            }
        );
    }
}

#[tokio::test]
async fn delayed_actions_are_broadcast() {
    let store = store();
    let mut rx = store.subscribe_actions();

    store
        .send(LookupAction::LookupLater { day: 17 })
        .await
        .unwrap()
        .wait()
        .await;

    let mut seen = Vec::new();
    while let Ok(action) = rx.try_recv() {
        seen.push(action);
    }
    assert_eq!(
        seen,
        vec![
            LookupAction::LookupLater { day: 17 },
            LookupAction::Lookup { day: 17 },
            LookupAction::Found {
                day: 17,
                open_slots: 1
            },
        ]
    );
}

#[tokio::test]
async fn parallel_lookups_all_land_before_settle_returns() {
    let store = store();

    store
        .send(LookupAction::LookupMany {
            days: vec![15, 16, 17],
        })
        .await
        .unwrap();
    store.settle(Duration::from_secs(1)).await.unwrap();

    let mut found = store.state(|s| s.found.clone()).await;
    found.sort_unstable();
    assert_eq!(found, vec![(15, 3), (16, 0), (17, 1)]);
    assert_eq!(store.pending_effects(), 0);
}
