use tokio::sync::mpsc;

use crate::alarm::{AlarmField, AlarmId};

/// Events the core emits for UI layers and other collaborators.
#[derive(Debug, Clone, PartialEq)]
pub enum AlarmEvent {
    Added(AlarmId),
    Removed(AlarmId),
    Changed { id: AlarmId, field: AlarmField },
    Triggered(AlarmId),
    Cleared(AlarmId),
    Error { id: AlarmId, message: String },
}

/// Messages funneled back onto the manager task from its helper tasks.
#[derive(Debug)]
pub enum InternalSignal {
    /// An armed alarm's deadline was reached.
    TimerFired(AlarmId),
    /// An unattended sound played for the full ceiling.
    SoundCeiling(AlarmId),
    /// The external id registry changed. Carries no snapshot; the current
    /// contents are re-read on receipt so a stale notification cannot
    /// resurrect a just-deleted alarm.
    RegistryChanged,
}

/// Sender half of the event channel. A closed channel (no subscriber left)
/// is not an error for the core; events are simply dropped.
#[derive(Clone)]
pub struct AlarmEventSender(mpsc::UnboundedSender<AlarmEvent>);

impl AlarmEventSender {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<AlarmEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self(tx), rx)
    }

    fn emit(&self, event: AlarmEvent) {
        if self.0.send(event).is_err() {
            log::debug!("[EVENTS] No subscriber for alarm events.");
        }
    }

    pub fn added(&self, id: AlarmId) {
        self.emit(AlarmEvent::Added(id));
    }

    pub fn removed(&self, id: AlarmId) {
        self.emit(AlarmEvent::Removed(id));
    }

    pub fn changed(&self, id: AlarmId, field: AlarmField) {
        self.emit(AlarmEvent::Changed { id, field });
    }

    pub fn triggered(&self, id: AlarmId) {
        self.emit(AlarmEvent::Triggered(id));
    }

    pub fn cleared(&self, id: AlarmId) {
        self.emit(AlarmEvent::Cleared(id));
    }

    pub fn error(&self, id: AlarmId, message: String) {
        self.emit(AlarmEvent::Error { id, message });
    }
}
