use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::alarm::{Alarm, AlarmId, NotifyKind};
use crate::error::AlarmError;
use crate::scheduling::InternalSignal;

use super::{CommandRunner, MediaPlayer, Playback};

struct ActiveSound {
    playback: Box<dyn Playback>,
    ceiling_guard: CancellationToken,
}

/// Owns active sound playback per alarm and dispatches notifications.
///
/// Each started sound gets a one-shot ceiling timeout so an unattended
/// looping alarm cannot play forever; expiry comes back through the service
/// signal channel so the stop happens on the manager task like every other
/// mutation.
pub struct Notifier {
    player: Arc<dyn MediaPlayer>,
    runner: Arc<dyn CommandRunner>,
    sound_ceiling: Duration,
    signals: mpsc::UnboundedSender<InternalSignal>,
    active: HashMap<AlarmId, ActiveSound>,
}

impl Notifier {
    pub fn new(
        player: Arc<dyn MediaPlayer>,
        runner: Arc<dyn CommandRunner>,
        sound_ceiling: Duration,
        signals: mpsc::UnboundedSender<InternalSignal>,
    ) -> Self {
        Self {
            player,
            runner,
            sound_ceiling,
            signals,
            active: HashMap::new(),
        }
    }

    /// Dispatch exactly one of sound playback or command spawn for a
    /// triggered alarm.
    pub async fn dispatch(&mut self, alarm: &Alarm) -> Result<(), AlarmError> {
        match alarm.notify() {
            NotifyKind::Sound => self.start_sound(alarm).await,
            NotifyKind::Command => self
                .runner
                .spawn(alarm.command())
                .await
                .map_err(|err| AlarmError::CommandSpawn {
                    id: alarm.id(),
                    message: err.to_string(),
                }),
        }
    }

    async fn start_sound(&mut self, alarm: &Alarm) -> Result<(), AlarmError> {
        let id = alarm.id();
        self.stop_sound(id).await;

        let to_playback_error = |err: anyhow::Error| AlarmError::Playback {
            id,
            message: err.to_string(),
        };
        let playback = self
            .player
            .create(alarm.sound_uri(), alarm.sound_loop())
            .await
            .map_err(to_playback_error)?;
        playback.start().await.map_err(to_playback_error)?;

        let ceiling_guard = CancellationToken::new();
        let guard = ceiling_guard.child_token();
        let ceiling = self.sound_ceiling;
        let signals = self.signals.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = guard.cancelled() => {}
                _ = tokio::time::sleep(ceiling) => {
                    log::info!("[NOTIFY] Sound ceiling reached. [alarm_id = {id}]");
                    let _ = signals.send(InternalSignal::SoundCeiling(id));
                }
            }
        });

        self.active.insert(
            id,
            ActiveSound {
                playback,
                ceiling_guard,
            },
        );
        Ok(())
    }

    /// Stop any active playback for `id`. Safe to call at any time, from any
    /// transition; does nothing when no sound is playing.
    pub async fn stop_sound(&mut self, id: AlarmId) {
        if let Some(sound) = self.active.remove(&id) {
            sound.ceiling_guard.cancel();
            sound.playback.stop().await;
            log::info!("[NOTIFY] Stopped sound playback. [alarm_id = {id}]");
        }
    }
}
