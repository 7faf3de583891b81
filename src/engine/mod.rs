//! Progress synchronization engine.
//!
//! A run pairs one backend call with a simulated stage sequence, an elapsed-seconds clock and
//! a rotating fact line. The result is released only once both the call and the sequence are
//! done.

mod clock;
mod coordinator;
mod facts;
mod run;
mod sequencer;

pub use coordinator::RunCoordinator;
pub(crate) use coordinator::FINALIZING_MESSAGE;
