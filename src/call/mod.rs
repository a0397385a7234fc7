//! Call Module - State-Machine und Event-Pipeline
//!
//! - `events`: alles, was in die Pipeline kommt oder herausfällt
//! - `reducer`: reine Transitionen
//! - `controller`: führt Effekte aus, einziger Schreiber der Session
//! - `runtime`: Task, Queue und Handle
//! - `timers`: abbrechbare Session-Timer

mod controller;
mod events;
mod reducer;
mod runtime;
mod timers;

pub use controller::{CallSessionController, NOTIFICATION_CAPACITY};
pub use events::{
    CallNotification, ConnectionEvent, Input, Intent, MediaEvent, TimerFired, TimerKind,
};
pub use reducer::{
    reduce, DeviceCommand, Effect, Outcome, ReduceContext, RosterUpdate, SessionEvent, Step,
};
pub use runtime::{CallCoordinator, CoordinatorHandle};
pub use timers::SessionTimers;
