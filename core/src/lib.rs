//! # Booking Core
//!
//! Core traits and types for the booking wizard.
//!
//! The wizard is written as a reducer: every user intent and every remote
//! response is an *action*, a pure function folds actions into *state*, and
//! anything that talks to the outside world is returned as an *effect*
//! description for the runtime to execute.
//!
//! ## Core Concepts
//!
//! - **State**: Everything the wizard knows (current step, draft, remote resources)
//! - **Action**: All possible inputs (user intents and remote call results)
//! - **Reducer**: Pure function `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: Side effect descriptions (not execution)
//! - **Environment**: Injected dependencies via traits
//!
//! ## Example
//!
//! ```ignore
//! use booking_core::*;
//!
//! impl Reducer for WizardReducer {
//!     type State = WizardState;
//!     type Action = WizardAction;
//!     type Environment = WizardEnvironment;
//!
//!     fn reduce(
//!         &self,
//!         state: &mut WizardState,
//!         action: WizardAction,
//!         env: &WizardEnvironment,
//!     ) -> SmallVec<[Effect<WizardAction>; 4]> {
//!         smallvec![Effect::None]
//!     }
//! }
//! ```

pub use chrono::{DateTime, Utc};
pub use smallvec::{SmallVec, smallvec};

/// Declarative helpers for building effects
pub mod effect_macros;

/// Reducer module - The core trait for business logic
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`.
/// They hold all of the wizard's rules and are deterministic and testable
/// without a runtime.
pub mod reducer {
    use super::SmallVec;
    use super::effect::Effect;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// Updates state in place and returns the effects the runtime
        /// should execute. Must not perform I/O itself.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Effect module - Side effect descriptions
///
/// Effects describe side effects to be performed by the runtime.
/// They are values, not execution.
pub mod effect {
    use futures::future::BoxFuture;
    use std::time::Duration;

    /// Effect type - describes a side effect to be executed
    ///
    /// Effects are NOT executed immediately. They are descriptions of what
    /// should happen, returned from reducers and executed by the Store runtime.
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Run effects in parallel
        Parallel(Vec<Effect<Action>>),

        /// Run effects sequentially
        Sequential(Vec<Effect<Action>>),

        /// Dispatch an action after a delay
        Delay {
            /// How long to wait
            duration: Duration,
            /// Action to dispatch after delay
            action: Box<Action>,
        },

        /// Arbitrary async computation
        ///
        /// Returns `Option<Action>` - if Some, the action is fed back into the reducer
        Future(BoxFuture<'static, Option<Action>>),
    }

    // Manual Debug implementation since Future doesn't implement Debug
    impl<Action> std::fmt::Debug for Effect<Action>
    where
        Action: std::fmt::Debug,
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Parallel(effects) => {
                    f.debug_tuple("Effect::Parallel").field(effects).finish()
                },
                Effect::Sequential(effects) => {
                    f.debug_tuple("Effect::Sequential").field(effects).finish()
                },
                Effect::Delay { duration, action } => f
                    .debug_struct("Effect::Delay")
                    .field("duration", duration)
                    .field("action", action)
                    .finish(),
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Combine effects to run in parallel
        #[must_use]
        pub const fn merge(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Parallel(effects)
        }

        /// Chain effects to run sequentially
        #[must_use]
        pub const fn chain(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Sequential(effects)
        }

        /// Whether this effect does nothing when executed
        #[must_use]
        pub fn is_none(&self) -> bool {
            match self {
                Effect::None => true,
                Effect::Parallel(effects) | Effect::Sequential(effects) => {
                    effects.iter().all(Effect::is_none)
                },
                Effect::Delay { .. } | Effect::Future(_) => false,
            }
        }
    }
}

/// Environment module - Dependency injection traits
///
/// All process-wide inputs (time, network reachability) are abstracted behind
/// traits and injected via the Environment parameter, so reducers and stores
/// can be driven deterministically in tests.
pub mod environment {
    use chrono::{DateTime, Utc};
    use tokio::sync::watch;

    /// Clock trait - abstracts time operations for testability
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    /// Source of online/offline transitions
    ///
    /// Replaces a process-global "online" listener: whoever owns the
    /// platform signal drives an implementation of this trait and the
    /// booking flow subscribes to it at construction.
    pub trait Connectivity: Send + Sync {
        /// Current reachability
        fn is_online(&self) -> bool;

        /// Receiver that observes every subsequent change
        fn subscribe(&self) -> watch::Receiver<bool>;
    }

    /// Host-driven connectivity signal backed by a `watch` channel
    ///
    /// # Example
    ///
    /// ```
    /// use booking_core::environment::{Connectivity, ConnectivitySignal};
    ///
    /// let signal = ConnectivitySignal::new(true);
    /// let rx = signal.subscribe();
    /// signal.set_online(false);
    /// assert!(!signal.is_online());
    /// assert!(!*rx.borrow());
    /// ```
    #[derive(Debug, Clone)]
    pub struct ConnectivitySignal {
        sender: std::sync::Arc<watch::Sender<bool>>,
    }

    impl ConnectivitySignal {
        /// Create a signal with the given initial reachability
        #[must_use]
        pub fn new(online: bool) -> Self {
            let (sender, _) = watch::channel(online);
            Self {
                sender: std::sync::Arc::new(sender),
            }
        }

        /// Publish a reachability change
        ///
        /// Repeated values are not re-broadcast.
        pub fn set_online(&self, online: bool) {
            self.sender.send_if_modified(|current| {
                if *current == online {
                    false
                } else {
                    *current = online;
                    true
                }
            });
        }
    }

    impl Default for ConnectivitySignal {
        fn default() -> Self {
            Self::new(true)
        }
    }

    impl Connectivity for ConnectivitySignal {
        fn is_online(&self) -> bool {
            *self.sender.borrow()
        }

        fn subscribe(&self) -> watch::Receiver<bool> {
            self.sender.subscribe()
        }
    }
}
