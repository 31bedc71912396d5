use chrono::{DateTime, NaiveTime, TimeDelta, TimeZone, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::settings::PersistedAlarm;
use crate::timemath::{self, WallClock};

pub type AlarmId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmKind {
    /// Fires at a wall-clock time-of-day, optionally repeating on weekdays.
    Clock,
    /// Fires once, a fixed duration after being armed.
    Timer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyKind {
    Sound,
    Command,
}

/// Set of weekdays a Clock alarm recurs on. Bit 0 is Sunday; empty means
/// fire once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepeatDays(u8);

impl RepeatDays {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 0x7f)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, day: Weekday) -> bool {
        self.contains_index(day.num_days_from_sunday())
    }

    pub fn contains_index(self, day: u32) -> bool {
        self.0 & (1 << day) != 0
    }

    #[must_use]
    pub fn with(self, day: Weekday) -> Self {
        Self(self.0 | (1 << day.num_days_from_sunday()))
    }

    #[must_use]
    pub fn without(self, day: Weekday) -> Self {
        Self(self.0 & !(1 << day.num_days_from_sunday()))
    }

    pub fn every_day() -> Self {
        Self(0x7f)
    }
}

/// Field tag carried by `changed` events so observers know what moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmField {
    Armed,
    Triggered,
    Schedule,
    Repeat,
    Label,
    Notify,
}

/// One alarm's full state.
///
/// Mutation goes through the methods below so `next_fire` stays consistent
/// with the schedule parameters whenever the alarm is armed, and so every
/// change raises the transient `dirty` flag the UI refresh tick consumes.
#[derive(Debug, Clone)]
pub struct Alarm {
    id: AlarmId,
    kind: AlarmKind,
    /// Seconds since midnight for Clock alarms; the relative duration in
    /// seconds for Timer alarms. The dual meaning is inherited from the
    /// original configuration schema and kept so persisted records stay
    /// interchangeable between the two kinds.
    time: u32,
    repeat: RepeatDays,
    next_fire: Option<DateTime<Utc>>,
    armed: bool,
    triggered: bool,
    label: String,
    notify: NotifyKind,
    sound_uri: String,
    sound_loop: bool,
    command: String,
    dirty: bool,
}

impl Alarm {
    pub fn new(id: AlarmId) -> Self {
        Self {
            id,
            kind: AlarmKind::Clock,
            time: 0,
            repeat: RepeatDays::empty(),
            next_fire: None,
            armed: false,
            triggered: false,
            label: String::new(),
            notify: NotifyKind::Sound,
            sound_uri: String::new(),
            sound_loop: false,
            command: String::new(),
            dirty: false,
        }
    }

    pub fn from_persisted(id: AlarmId, persisted: PersistedAlarm) -> Self {
        Self {
            id,
            kind: persisted.kind,
            time: persisted.time,
            repeat: RepeatDays::from_bits(persisted.repeat),
            next_fire: Utc.timestamp_opt(persisted.timestamp, 0).single(),
            armed: persisted.active,
            triggered: false,
            label: persisted.message,
            notify: persisted.notify_type,
            sound_uri: persisted.sound_file,
            sound_loop: persisted.sound_repeat,
            command: persisted.command,
            dirty: false,
        }
    }

    pub fn to_persisted(&self) -> PersistedAlarm {
        PersistedAlarm {
            active: self.armed,
            kind: self.kind,
            time: self.time,
            timestamp: self.next_fire.map_or(0, |t| t.timestamp()),
            message: self.label.clone(),
            repeat: self.repeat.bits(),
            notify_type: self.notify,
            sound_file: self.sound_uri.clone(),
            sound_repeat: self.sound_loop,
            command: self.command.clone(),
        }
    }

    pub fn id(&self) -> AlarmId {
        self.id
    }

    pub fn kind(&self) -> AlarmKind {
        self.kind
    }

    pub fn repeat(&self) -> RepeatDays {
        self.repeat
    }

    pub fn next_fire(&self) -> Option<DateTime<Utc>> {
        self.next_fire
    }

    pub fn armed(&self) -> bool {
        self.armed
    }

    pub fn triggered(&self) -> bool {
        self.triggered
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn notify(&self) -> NotifyKind {
        self.notify
    }

    pub fn sound_uri(&self) -> &str {
        &self.sound_uri
    }

    pub fn sound_loop(&self) -> bool {
        self.sound_loop
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Clock reading of `time`.
    pub fn time_of_day(&self) -> NaiveTime {
        NaiveTime::from_num_seconds_from_midnight_opt(self.time.min(86_399), 0)
            .expect("time-of-day is clamped into range")
    }

    /// Timer reading of `time`.
    pub fn duration_secs(&self) -> u32 {
        self.time
    }

    /// Whether firing should reschedule rather than disarm.
    pub fn repeats(&self) -> bool {
        self.kind == AlarmKind::Clock && !self.repeat.is_empty()
    }

    pub fn compute_next_fire(&self, clock: &dyn WallClock) -> DateTime<Utc> {
        match self.kind {
            AlarmKind::Clock => timemath::next_fire_after(clock.now(), self.time_of_day(), self.repeat),
            AlarmKind::Timer => clock.now() + TimeDelta::seconds(self.duration_secs() as i64),
        }
    }

    pub fn set_schedule(&mut self, hour: u32, minute: u32, second: u32, clock: &dyn WallClock) {
        self.time = (hour.min(23) * 3600 + minute.min(59) * 60 + second.min(59)).min(86_399);
        self.reschedule_if_armed(clock);
        self.dirty = true;
    }

    pub fn set_duration(&mut self, seconds: u32, clock: &dyn WallClock) {
        self.time = seconds;
        self.reschedule_if_armed(clock);
        self.dirty = true;
    }

    pub fn set_kind(&mut self, kind: AlarmKind, clock: &dyn WallClock) {
        self.kind = kind;
        self.reschedule_if_armed(clock);
        self.dirty = true;
    }

    pub fn set_repeat(&mut self, days: RepeatDays, clock: &dyn WallClock) {
        self.repeat = days;
        self.reschedule_if_armed(clock);
        self.dirty = true;
    }

    pub fn set_label(&mut self, label: String) {
        self.label = label;
        self.dirty = true;
    }

    pub fn set_notify_kind(&mut self, notify: NotifyKind) {
        self.notify = notify;
        self.dirty = true;
    }

    pub fn set_sound(&mut self, uri: String, looped: bool) {
        self.sound_uri = uri;
        self.sound_loop = looped;
        self.dirty = true;
    }

    pub fn set_command(&mut self, command: String) {
        self.command = command;
        self.dirty = true;
    }

    /// Recompute the next fire time and start the countdown.
    pub fn arm(&mut self, clock: &dyn WallClock) {
        self.next_fire = Some(self.compute_next_fire(clock));
        self.armed = true;
        self.dirty = true;
    }

    /// Arm with an explicit deadline (snooze path).
    pub fn arm_at(&mut self, when: DateTime<Utc>) {
        self.next_fire = Some(when);
        self.armed = true;
        self.dirty = true;
    }

    pub fn disarm(&mut self) {
        self.armed = false;
        self.dirty = true;
    }

    pub fn mark_triggered(&mut self) {
        self.triggered = true;
        self.dirty = true;
    }

    /// Returns true only on an actual triggered -> idle transition; the
    /// `cleared` event must not fire otherwise.
    pub fn clear(&mut self) -> bool {
        if !self.triggered {
            return false;
        }
        self.triggered = false;
        self.dirty = true;
        true
    }

    /// Reset the fire time from the current schedule. Used by the trigger
    /// path for repeating alarms, where the alarm stays armed.
    pub fn reschedule(&mut self, clock: &dyn WallClock) {
        self.next_fire = Some(self.compute_next_fire(clock));
        self.dirty = true;
    }

    fn reschedule_if_armed(&mut self, clock: &dyn WallClock) {
        if self.armed {
            self.next_fire = Some(self.compute_next_fire(clock));
        }
    }
}
