//! Abstract persisted-configuration backend.
//!
//! The core never talks to a real settings daemon; it goes through
//! [`SettingsBridge`] so the desktop backend, the in-memory test double and
//! the demo wiring are interchangeable.

mod memory;

pub use memory::InMemorySettingsBridge;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::alarm::{AlarmId, AlarmKind, NotifyKind};

/// Per-alarm record as stored under the alarm's id in the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PersistedAlarm {
    pub active: bool,
    #[serde(rename = "type")]
    pub kind: AlarmKind,
    /// Seconds since midnight (clock) or relative duration (timer).
    pub time: u32,
    /// UNIX timestamp of the next scheduled firing; 0 when unset.
    pub timestamp: i64,
    pub message: String,
    /// Weekday bitmask, bit 0 = Sunday.
    pub repeat: u8,
    pub notify_type: NotifyKind,
    pub sound_file: String,
    pub sound_repeat: bool,
    pub command: String,
}

impl Default for PersistedAlarm {
    fn default() -> Self {
        Self {
            active: false,
            kind: AlarmKind::Clock,
            time: 0,
            timestamp: 0,
            message: String::new(),
            repeat: 0,
            notify_type: NotifyKind::Sound,
            sound_file: String::new(),
            sound_repeat: false,
            command: String::new(),
        }
    }
}

/// Persisted key/value storage with change notification.
///
/// The alarm id registry is the authoritative external set the collection
/// reconciles against; [`SettingsBridge::watch_ids`] delivers out-of-process
/// changes to it.
#[async_trait]
pub trait SettingsBridge: Send + Sync + 'static {
    async fn load_alarm(&self, id: AlarmId) -> Option<PersistedAlarm>;

    async fn store_alarm(&self, id: AlarmId, alarm: PersistedAlarm) -> anyhow::Result<()>;

    /// Reset every persisted field for `id` (the delete path).
    async fn reset_alarm(&self, id: AlarmId) -> anyhow::Result<()>;

    /// Current contents of the global alarm id registry.
    async fn alarm_ids(&self) -> Vec<AlarmId>;

    /// Serialize the in-memory id set back to the registry.
    async fn publish_ids(&self, ids: &[AlarmId]) -> anyhow::Result<()>;

    /// Change notifications for the id registry.
    fn watch_ids(&self) -> watch::Receiver<Vec<AlarmId>>;

    async fn show_label(&self) -> bool;

    async fn set_show_label(&self, show: bool) -> anyhow::Result<()>;
}
