//! Core of a panel alarm-clock applet: the alarm entity, the pure
//! next-occurrence arithmetic, per-alarm timers, the trigger state machine
//! and the collection that reconciles against an external id registry.
//!
//! UI layers, the real settings daemon and the audio backend live elsewhere
//! and talk to this crate through [`settings::SettingsBridge`],
//! [`notify::MediaPlayer`], [`notify::CommandRunner`] and the event stream
//! returned by [`scheduling::AlarmService::start`].

pub mod alarm;
pub mod appsettings;
pub mod error;
pub mod notify;
pub mod scheduling;
pub mod settings;
pub mod timemath;

pub use alarm::{Alarm, AlarmField, AlarmId, AlarmKind, NotifyKind, RepeatDays};
pub use error::AlarmError;
pub use scheduling::{AlarmEvent, AlarmService, AlarmServiceHandle};
pub use settings::{InMemorySettingsBridge, PersistedAlarm, SettingsBridge};
pub use timemath::{SystemClock, WallClock};
