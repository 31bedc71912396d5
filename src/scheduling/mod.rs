//! The alarm scheduling and triggering engine.
//!
//! All alarm state lives behind one manager task ([`AlarmService`]); timers,
//! settings watchers and playback ceilings feed it messages, so the core is
//! single-writer end to end.

mod collection;
mod common;
mod service;
mod timer;
mod trigger;

#[cfg(test)]
pub(crate) mod test_utils;

pub use collection::{AlarmCollection, generate_id};
pub use common::{AlarmEvent, AlarmEventSender, InternalSignal};
pub use service::{AlarmService, AlarmServiceHandle};
pub use timer::AlarmTimer;
pub use trigger::TriggerEngine;
