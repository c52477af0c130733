//! Whether this unit is the designated writer of the application data.
use std::{cell::Cell, rc::Rc};

/// Answers "am I the leader" at the time of the call.
///
/// Implementations must not cache the answer across events, leadership can move between any
/// two hooks.
pub trait Leadership {
    fn is_leader(&self) -> bool;
}

impl Leadership for bool {
    fn is_leader(&self) -> bool {
        *self
    }
}

/// Shared flag which can be flipped while a unit is running, e.g. to simulate a leader election.
impl Leadership for Rc<Cell<bool>> {
    fn is_leader(&self) -> bool {
        self.get()
    }
}
