use thiserror::Error;

use crate::alarm::AlarmId;

/// Failures surfaced by the scheduling core.
///
/// Playback and command spawn failures are reported on the event channel and
/// never abort the triggering transition; the alarm stays marked triggered so
/// the user still sees it needs attention. Id-space exhaustion is not
/// represented here: a full 32-bit registry means corrupted external
/// configuration and panics at the allocation site.
#[derive(Debug, Error)]
pub enum AlarmError {
    #[error("alarm {id} is not triggered")]
    NotTriggered { id: AlarmId },

    #[error("playback failed for alarm {id}: {message}")]
    Playback { id: AlarmId, message: String },

    #[error("command spawn failed for alarm {id}: {message}")]
    CommandSpawn { id: AlarmId, message: String },

    #[error("no alarm with id {id}")]
    UnknownAlarm { id: AlarmId },
}
