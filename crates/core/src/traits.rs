//! State machine trait.

use crate::{Action, Event};
use std::time::Duration;

/// A synchronous, deterministic state machine.
///
/// Implementations mutate themselves but perform no I/O. Given the same
/// state, time and event, `handle` returns the same actions.
pub trait StateMachine {
    /// Process one event and return the resulting actions.
    fn handle(&mut self, event: Event) -> Vec<Action>;

    /// Set the current time. Called by the runner before each event.
    fn set_time(&mut self, now: Duration);

    /// Current time as last set by the runner.
    fn now(&self) -> Duration;
}
