use std::sync::Arc;

use chrono::TimeDelta;

use crate::alarm::{Alarm, AlarmField};
use crate::error::AlarmError;
use crate::notify::Notifier;
use crate::timemath::WallClock;

use super::common::AlarmEventSender;

/// The triggered/cleared lifecycle and the notify-dispatch decision.
///
/// Operates on one alarm at a time under the service task, so a method here
/// is a full state transition: mutate the record, emit the events, dispatch
/// or stop the notification.
pub struct TriggerEngine {
    notifier: Notifier,
    events: AlarmEventSender,
    clock: Arc<dyn WallClock>,
}

impl TriggerEngine {
    pub fn new(notifier: Notifier, events: AlarmEventSender, clock: Arc<dyn WallClock>) -> Self {
        Self {
            notifier,
            events,
            clock,
        }
    }

    /// The due time was reached. Returns whether the alarm stays armed
    /// (repeating Clock alarms reschedule inside the transition, everything
    /// else disarms).
    ///
    /// Firing an alarm that is still triggered from the previous cycle runs
    /// the clear path first so sound and command state reset cleanly.
    /// Dispatch failures are reported on the event channel and never roll
    /// back the triggered state.
    pub async fn fire(&mut self, alarm: &mut Alarm) -> bool {
        if alarm.triggered() {
            self.clear(alarm).await;
        }

        alarm.mark_triggered();
        self.events.triggered(alarm.id());
        log::info!("[TRIGGER] Alarm fired. [alarm_id = {}]", alarm.id());

        let repeats = alarm.repeats();
        if repeats {
            alarm.reschedule(self.clock.as_ref());
            self.events.changed(alarm.id(), AlarmField::Schedule);
        } else {
            alarm.disarm();
            self.events.changed(alarm.id(), AlarmField::Armed);
        }

        if let Err(err) = self.notifier.dispatch(alarm).await {
            log::error!(
                "[TRIGGER] Notification dispatch failed. [alarm_id = {}, error = {}]",
                alarm.id(),
                err
            );
            self.events.error(alarm.id(), err.to_string());
        }

        repeats
    }

    /// Clear a triggered alarm and reschedule it `seconds` into the future.
    /// Calling this on a non-triggered alarm is a contract violation by the
    /// caller and is rejected explicitly.
    pub async fn snooze(&mut self, alarm: &mut Alarm, seconds: u32) -> Result<(), AlarmError> {
        if !alarm.triggered() {
            return Err(AlarmError::NotTriggered { id: alarm.id() });
        }

        self.clear(alarm).await;
        alarm.arm_at(self.clock.now() + TimeDelta::seconds(seconds as i64));
        self.events.changed(alarm.id(), AlarmField::Armed);
        log::info!(
            "[TRIGGER] Alarm snoozed. [alarm_id = {}, seconds = {seconds}]",
            alarm.id()
        );
        Ok(())
    }

    /// Stop the notification and return to idle. Safe to call at any time;
    /// the `cleared` event fires only on an actual transition.
    pub async fn clear(&mut self, alarm: &mut Alarm) {
        self.notifier.stop_sound(alarm.id()).await;
        if alarm.clear() {
            self.events.cleared(alarm.id());
        }
    }

    /// User-facing arm: always recomputes the schedule first, so enabling a
    /// stale alarm lands on the next valid future occurrence.
    pub async fn enable(&mut self, alarm: &mut Alarm) {
        self.clear(alarm).await;
        alarm.arm(self.clock.as_ref());
        self.events.changed(alarm.id(), AlarmField::Armed);
    }

    pub async fn disable(&mut self, alarm: &mut Alarm) {
        self.clear(alarm).await;
        alarm.disarm();
        self.events.changed(alarm.id(), AlarmField::Armed);
    }

    /// The playback ceiling elapsed: silence the sound but leave the alarm
    /// triggered so the user still sees it needs attention.
    pub async fn sound_ceiling(&mut self, alarm: &Alarm) {
        self.notifier.stop_sound(alarm.id()).await;
    }

    pub fn clock(&self) -> &Arc<dyn WallClock> {
        &self.clock
    }
}
