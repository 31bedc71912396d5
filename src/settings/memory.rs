use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{RwLock, watch};

use crate::alarm::AlarmId;

use super::{PersistedAlarm, SettingsBridge};

/// Backend-less settings store. Doubles as the test fixture: tests mutate the
/// registry through [`SettingsBridge::publish_ids`] to simulate an external
/// configuration change.
pub struct InMemorySettingsBridge {
    store: RwLock<HashMap<AlarmId, PersistedAlarm>>,
    show_label: RwLock<bool>,
    registry: watch::Sender<Vec<AlarmId>>,
}

impl InMemorySettingsBridge {
    pub fn new() -> Self {
        let (registry, _) = watch::channel(Vec::new());
        Self {
            store: RwLock::new(HashMap::new()),
            show_label: RwLock::new(true),
            registry,
        }
    }
}

impl Default for InMemorySettingsBridge {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SettingsBridge for InMemorySettingsBridge {
    async fn load_alarm(&self, id: AlarmId) -> Option<PersistedAlarm> {
        self.store.read().await.get(&id).cloned()
    }

    async fn store_alarm(&self, id: AlarmId, alarm: PersistedAlarm) -> anyhow::Result<()> {
        self.store.write().await.insert(id, alarm);
        Ok(())
    }

    async fn reset_alarm(&self, id: AlarmId) -> anyhow::Result<()> {
        self.store.write().await.remove(&id);
        Ok(())
    }

    async fn alarm_ids(&self) -> Vec<AlarmId> {
        self.registry.borrow().clone()
    }

    async fn publish_ids(&self, ids: &[AlarmId]) -> anyhow::Result<()> {
        self.registry.send_replace(ids.to_vec());
        Ok(())
    }

    fn watch_ids(&self) -> watch::Receiver<Vec<AlarmId>> {
        self.registry.subscribe()
    }

    async fn show_label(&self) -> bool {
        *self.show_label.read().await
    }

    async fn set_show_label(&self, show: bool) -> anyhow::Result<()> {
        *self.show_label.write().await = show;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stored_alarms_survive_a_reload() {
        let bridge = InMemorySettingsBridge::new();
        let record = PersistedAlarm {
            message: "stand-up".to_owned(),
            time: 9 * 3600,
            ..Default::default()
        };

        bridge.store_alarm(4, record.clone()).await.unwrap();

        assert_eq!(bridge.load_alarm(4).await, Some(record));
        assert_eq!(bridge.load_alarm(5).await, None);
    }

    #[tokio::test]
    async fn publish_ids_notifies_watchers() {
        let bridge = InMemorySettingsBridge::new();
        let mut rx = bridge.watch_ids();

        bridge.publish_ids(&[5, 8, 123]).await.unwrap();

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), vec![5, 8, 123]);
        assert_eq!(bridge.alarm_ids().await, vec![5, 8, 123]);
    }

    #[tokio::test]
    async fn show_label_defaults_on_and_round_trips() {
        let bridge = InMemorySettingsBridge::new();
        assert!(bridge.show_label().await);

        bridge.set_show_label(false).await.unwrap();

        assert!(!bridge.show_label().await);
    }

    #[tokio::test]
    async fn reset_removes_the_record() {
        let bridge = InMemorySettingsBridge::new();
        bridge.store_alarm(1, PersistedAlarm::default()).await.unwrap();

        bridge.reset_alarm(1).await.unwrap();

        assert_eq!(bridge.load_alarm(1).await, None);
    }
}
