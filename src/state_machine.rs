//! Workout logging dialog state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions.

pub mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;


pub use effect::{Effect, Reply};
pub use event::Event;
#[allow(unused_imports)] // Public API re-exports
pub use state::{DialogContext, DialogState, Session};
#[allow(unused_imports)]
pub use transition::{transition, SessionUpdate, TransitionError, TransitionResult};
