use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot, watch};

use crate::alarm::{Alarm, AlarmField, AlarmId, AlarmKind, NotifyKind, RepeatDays};
use crate::appsettings::SchedulingSettings;
use crate::error::AlarmError;
use crate::notify::{CommandRunner, MediaPlayer, Notifier};
use crate::settings::SettingsBridge;
use crate::timemath::WallClock;

use super::collection::AlarmCollection;
use super::common::{AlarmEvent, AlarmEventSender, InternalSignal};
use super::timer::AlarmTimer;
use super::trigger::TriggerEngine;

const COMMAND_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug)]
enum AlarmCommand {
    Create {
        reply: oneshot::Sender<AlarmId>,
    },
    Delete {
        id: AlarmId,
    },
    Enable {
        id: AlarmId,
    },
    Disable {
        id: AlarmId,
    },
    Stop {
        id: AlarmId,
    },
    Snooze {
        id: AlarmId,
        seconds: Option<u32>,
        reply: oneshot::Sender<Result<(), AlarmError>>,
    },
    SetSchedule {
        id: AlarmId,
        hour: u32,
        minute: u32,
        second: u32,
    },
    SetDuration {
        id: AlarmId,
        seconds: u32,
    },
    SetKind {
        id: AlarmId,
        kind: AlarmKind,
    },
    SetRepeat {
        id: AlarmId,
        days: RepeatDays,
    },
    SetLabel {
        id: AlarmId,
        label: String,
    },
    SetNotifyKind {
        id: AlarmId,
        notify: NotifyKind,
    },
    SetSound {
        id: AlarmId,
        uri: String,
        looped: bool,
    },
    SetCommand {
        id: AlarmId,
        command_line: String,
    },
    Snapshot {
        reply: oneshot::Sender<Vec<Alarm>>,
    },
}

/// Cloneable front door to the service task.
#[derive(Clone)]
pub struct AlarmServiceHandle {
    commands: mpsc::Sender<AlarmCommand>,
}

impl AlarmServiceHandle {
    async fn send(&self, command: AlarmCommand) -> anyhow::Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| anyhow::anyhow!("alarm service is not running"))
    }

    pub async fn create_alarm(&self) -> anyhow::Result<AlarmId> {
        let (reply, rx) = oneshot::channel();
        self.send(AlarmCommand::Create { reply }).await?;
        Ok(rx.await?)
    }

    pub async fn delete_alarm(&self, id: AlarmId) -> anyhow::Result<()> {
        self.send(AlarmCommand::Delete { id }).await
    }

    pub async fn enable(&self, id: AlarmId) -> anyhow::Result<()> {
        self.send(AlarmCommand::Enable { id }).await
    }

    pub async fn disable(&self, id: AlarmId) -> anyhow::Result<()> {
        self.send(AlarmCommand::Disable { id }).await
    }

    /// Stop the notification of a triggered alarm.
    pub async fn stop_alarm(&self, id: AlarmId) -> anyhow::Result<()> {
        self.send(AlarmCommand::Stop { id }).await
    }

    /// Snooze a triggered alarm. Without explicit `seconds` the configured
    /// per-kind default applies.
    pub async fn snooze(&self, id: AlarmId, seconds: Option<u32>) -> anyhow::Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(AlarmCommand::Snooze { id, seconds, reply }).await?;
        rx.await??;
        Ok(())
    }

    pub async fn set_schedule(
        &self,
        id: AlarmId,
        hour: u32,
        minute: u32,
        second: u32,
    ) -> anyhow::Result<()> {
        self.send(AlarmCommand::SetSchedule {
            id,
            hour,
            minute,
            second,
        })
        .await
    }

    pub async fn set_duration(&self, id: AlarmId, seconds: u32) -> anyhow::Result<()> {
        self.send(AlarmCommand::SetDuration { id, seconds }).await
    }

    pub async fn set_kind(&self, id: AlarmId, kind: AlarmKind) -> anyhow::Result<()> {
        self.send(AlarmCommand::SetKind { id, kind }).await
    }

    pub async fn set_repeat(&self, id: AlarmId, days: RepeatDays) -> anyhow::Result<()> {
        self.send(AlarmCommand::SetRepeat { id, days }).await
    }

    pub async fn set_label(&self, id: AlarmId, label: String) -> anyhow::Result<()> {
        self.send(AlarmCommand::SetLabel { id, label }).await
    }

    pub async fn set_notify_kind(&self, id: AlarmId, notify: NotifyKind) -> anyhow::Result<()> {
        self.send(AlarmCommand::SetNotifyKind { id, notify }).await
    }

    pub async fn set_sound(&self, id: AlarmId, uri: String, looped: bool) -> anyhow::Result<()> {
        self.send(AlarmCommand::SetSound { id, uri, looped }).await
    }

    pub async fn set_command(&self, id: AlarmId, command_line: String) -> anyhow::Result<()> {
        self.send(AlarmCommand::SetCommand { id, command_line }).await
    }

    /// Clone of the current alarm list; consumes the dirty flags.
    pub async fn snapshot(&self) -> anyhow::Result<Vec<Alarm>> {
        let (reply, rx) = oneshot::channel();
        self.send(AlarmCommand::Snapshot { reply }).await?;
        Ok(rx.await?)
    }
}

/// The manager task. Owns the collection, the armed-timer map and the
/// trigger engine; every mutation of alarm state happens here.
pub struct AlarmService;

impl AlarmService {
    pub fn start(
        settings: Arc<dyn SettingsBridge>,
        player: Arc<dyn MediaPlayer>,
        runner: Arc<dyn CommandRunner>,
        clock: Arc<dyn WallClock>,
        config: SchedulingSettings,
    ) -> (AlarmServiceHandle, mpsc::UnboundedReceiver<AlarmEvent>) {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (signals_tx, signals_rx) = mpsc::unbounded_channel();
        let (events, events_rx) = AlarmEventSender::channel();

        Self::spawn_registry_forwarder(settings.watch_ids(), signals_tx.clone());

        let notifier = Notifier::new(
            player,
            runner,
            Duration::from_secs(config.sound_ceiling_secs),
            signals_tx.clone(),
        );
        let engine = TriggerEngine::new(notifier, events.clone(), clock.clone());

        let state = ServiceState {
            settings,
            clock,
            config,
            collection: AlarmCollection::new(),
            timers: HashMap::new(),
            engine,
            events,
            signals: signals_tx,
        };
        tokio::spawn(state.run(commands_rx, signals_rx));

        (
            AlarmServiceHandle {
                commands: commands_tx,
            },
            events_rx,
        )
    }

    fn spawn_registry_forwarder(
        mut registry: watch::Receiver<Vec<AlarmId>>,
        signals: mpsc::UnboundedSender<InternalSignal>,
    ) {
        tokio::spawn(async move {
            while registry.changed().await.is_ok() {
                if signals.send(InternalSignal::RegistryChanged).is_err() {
                    break;
                }
            }
        });
    }
}

struct ArmedTimer {
    timer: AlarmTimer,
    deadline: watch::Sender<DateTime<Utc>>,
}

struct ServiceState {
    settings: Arc<dyn SettingsBridge>,
    clock: Arc<dyn WallClock>,
    config: SchedulingSettings,
    collection: AlarmCollection,
    timers: HashMap<AlarmId, ArmedTimer>,
    engine: TriggerEngine,
    events: AlarmEventSender,
    signals: mpsc::UnboundedSender<InternalSignal>,
}

impl ServiceState {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<AlarmCommand>,
        mut signals: mpsc::UnboundedReceiver<InternalSignal>,
    ) {
        let initial = self.settings.alarm_ids().await;
        self.reconcile(initial).await;
        log::info!(
            "[SERVICE] Alarm service started. [alarms = {}]",
            self.collection.len()
        );

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                Some(signal) = signals.recv() => self.handle_signal(signal).await,
            }
        }

        log::info!("[SERVICE] Alarm service stopped.");
    }

    async fn handle_signal(&mut self, signal: InternalSignal) {
        match signal {
            InternalSignal::TimerFired(id) => self.on_timer_fired(id).await,
            InternalSignal::SoundCeiling(id) => {
                if let Some(alarm) = self.collection.get(id) {
                    self.engine.sound_ceiling(alarm).await;
                }
            }
            InternalSignal::RegistryChanged => {
                let ids = self.settings.alarm_ids().await;
                self.reconcile(ids).await;
            }
        }
    }

    async fn on_timer_fired(&mut self, id: AlarmId) {
        let Some(alarm) = self.collection.get_mut(id) else {
            // Stale timer for an alarm that was reconciled away.
            self.stop_timer(id);
            return;
        };
        if !alarm.armed() {
            self.stop_timer(id);
            return;
        }
        // A queued fire signal can be stale: a command handled after the tick
        // may have pushed the deadline into the future. The deadline change
        // already re-armed the tick loop through the watch, so dropping the
        // signal loses nothing.
        if alarm.next_fire().is_some_and(|next| self.clock.now() < next) {
            return;
        }

        let keep_armed = self.engine.fire(alarm).await;
        let next = alarm.next_fire();

        if keep_armed {
            if let (Some(next), Some(entry)) = (next, self.timers.get(&id)) {
                let _ = entry.deadline.send(next);
            }
        } else {
            self.stop_timer(id);
        }
        self.persist(id).await;
    }

    async fn handle_command(&mut self, command: AlarmCommand) {
        match command {
            AlarmCommand::Create { reply } => {
                let id = self.collection.generate_id();
                self.collection.insert(Alarm::new(id));
                self.persist(id).await;
                self.publish_ids().await;
                self.events.added(id);
                log::info!("[SERVICE] Created alarm. [alarm_id = {id}]");
                let _ = reply.send(id);
            }
            AlarmCommand::Delete { id } => {
                let Some(mut alarm) = self.collection.remove(id) else {
                    return self.ignore_unknown(id);
                };
                self.stop_timer(id);
                self.engine.clear(&mut alarm).await;
                if let Err(err) = self.settings.reset_alarm(id).await {
                    log::warn!(
                        "[SERVICE] Failed to reset persisted alarm. [alarm_id = {id}, error = {err:#}]"
                    );
                }
                self.publish_ids().await;
                self.events.removed(id);
                log::info!("[SERVICE] Deleted alarm. [alarm_id = {id}]");
            }
            AlarmCommand::Enable { id } => {
                let Some(alarm) = self.collection.get_mut(id) else {
                    return self.ignore_unknown(id);
                };
                self.engine.enable(alarm).await;
                let deadline = alarm.next_fire().expect("armed alarm always has a deadline");
                self.start_timer(id, deadline);
                self.persist(id).await;
            }
            AlarmCommand::Disable { id } => {
                let Some(alarm) = self.collection.get_mut(id) else {
                    return self.ignore_unknown(id);
                };
                self.engine.disable(alarm).await;
                self.stop_timer(id);
                self.persist(id).await;
            }
            AlarmCommand::Stop { id } => {
                let Some(alarm) = self.collection.get_mut(id) else {
                    return self.ignore_unknown(id);
                };
                self.engine.clear(alarm).await;
                self.persist(id).await;
            }
            AlarmCommand::Snooze { id, seconds, reply } => {
                let Some(alarm) = self.collection.get_mut(id) else {
                    let _ = reply.send(Err(AlarmError::UnknownAlarm { id }));
                    return;
                };
                let seconds = seconds.unwrap_or(match alarm.kind() {
                    AlarmKind::Clock => self.config.clock_snooze_secs,
                    AlarmKind::Timer => self.config.timer_snooze_secs,
                });
                let result = self.engine.snooze(alarm, seconds).await;
                let deadline = alarm.next_fire();
                if result.is_ok() {
                    let deadline = deadline.expect("snoozed alarm is armed");
                    self.start_timer(id, deadline);
                    self.persist(id).await;
                }
                let _ = reply.send(result);
            }
            AlarmCommand::SetSchedule {
                id,
                hour,
                minute,
                second,
            } => {
                self.edit(id, AlarmField::Schedule, |alarm, clock| {
                    alarm.set_schedule(hour, minute, second, clock)
                })
                .await;
            }
            AlarmCommand::SetDuration { id, seconds } => {
                self.edit(id, AlarmField::Schedule, |alarm, clock| {
                    alarm.set_duration(seconds, clock)
                })
                .await;
            }
            AlarmCommand::SetKind { id, kind } => {
                self.edit(id, AlarmField::Schedule, |alarm, clock| {
                    alarm.set_kind(kind, clock)
                })
                .await;
            }
            AlarmCommand::SetRepeat { id, days } => {
                self.edit(id, AlarmField::Repeat, |alarm, clock| {
                    alarm.set_repeat(days, clock)
                })
                .await;
            }
            AlarmCommand::SetLabel { id, label } => {
                self.edit(id, AlarmField::Label, |alarm, _| alarm.set_label(label))
                    .await;
            }
            AlarmCommand::SetNotifyKind { id, notify } => {
                self.edit(id, AlarmField::Notify, |alarm, _| {
                    alarm.set_notify_kind(notify)
                })
                .await;
            }
            AlarmCommand::SetSound { id, uri, looped } => {
                self.edit(id, AlarmField::Notify, |alarm, _| alarm.set_sound(uri, looped))
                    .await;
            }
            AlarmCommand::SetCommand { id, command_line } => {
                self.edit(id, AlarmField::Notify, |alarm, _| {
                    alarm.set_command(command_line)
                })
                .await;
            }
            AlarmCommand::Snapshot { reply } => {
                let mut alarms = Vec::with_capacity(self.collection.len());
                for alarm in self.collection.iter_mut() {
                    alarms.push(alarm.clone());
                    alarm.clear_dirty();
                }
                let _ = reply.send(alarms);
            }
        }
    }

    /// Shared edit path: clears a pending trigger (an edit counts as
    /// attending to the alarm), applies the mutation, pushes a fresh deadline
    /// to the timer when armed, emits and persists.
    async fn edit(
        &mut self,
        id: AlarmId,
        field: AlarmField,
        mutate: impl FnOnce(&mut Alarm, &dyn WallClock),
    ) {
        let Some(alarm) = self.collection.get_mut(id) else {
            return self.ignore_unknown(id);
        };
        self.engine.clear(alarm).await;
        mutate(alarm, self.engine.clock().as_ref());

        let deadline = if alarm.armed() { alarm.next_fire() } else { None };
        if let (Some(deadline), Some(entry)) = (deadline, self.timers.get(&id)) {
            let _ = entry.deadline.send(deadline);
        }
        self.events.changed(id, field);
        self.persist(id).await;
    }

    /// Bring the in-memory set in line with the externally observed id set.
    /// Never fails: malformed or unknown ids are simply ignored.
    async fn reconcile(&mut self, ids: Vec<AlarmId>) {
        let external: HashSet<AlarmId> = ids.into_iter().collect();
        let (to_add, to_remove) = self.collection.diff(&external);
        if to_add.is_empty() && to_remove.is_empty() {
            return;
        }
        log::info!("[SERVICE] Reconciling with external registry. [add = {to_add:?}, remove = {to_remove:?}]");

        for id in to_remove {
            self.stop_timer(id);
            if let Some(mut alarm) = self.collection.remove(id) {
                self.engine.clear(&mut alarm).await;
                alarm.disarm();
                if let Err(err) = self.settings.reset_alarm(id).await {
                    log::warn!(
                        "[SERVICE] Failed to reset persisted alarm. [alarm_id = {id}, error = {err:#}]"
                    );
                }
                self.events.removed(id);
            }
        }

        for id in to_add {
            let persisted = self.settings.load_alarm(id).await.unwrap_or_default();
            let mut alarm = Alarm::from_persisted(id, persisted);

            // An armed alarm whose persisted deadline already passed (or was
            // never written) is rescheduled to the next valid occurrence.
            let mut rescheduled = false;
            if alarm.armed()
                && alarm.next_fire().is_none_or(|next| next <= self.clock.now())
            {
                alarm.arm(self.clock.as_ref());
                rescheduled = true;
            }

            let deadline = if alarm.armed() { alarm.next_fire() } else { None };
            self.collection.insert(alarm);
            self.events.added(id);
            if let Some(deadline) = deadline {
                self.start_timer(id, deadline);
            }
            if rescheduled {
                self.persist(id).await;
            }
        }
    }

    /// Ensure exactly one running timer for `id`, counting down to
    /// `deadline`.
    fn start_timer(&mut self, id: AlarmId, deadline: DateTime<Utc>) {
        if let Some(entry) = self.timers.get(&id) {
            let _ = entry.deadline.send(deadline);
            return;
        }

        let (deadline_tx, deadline_rx) = watch::channel(deadline);
        let mut timer = AlarmTimer::new();
        timer.start(id, deadline_rx, self.clock.clone(), self.signals.clone());
        self.timers.insert(
            id,
            ArmedTimer {
                timer,
                deadline: deadline_tx,
            },
        );
    }

    fn stop_timer(&mut self, id: AlarmId) {
        if let Some(mut entry) = self.timers.remove(&id) {
            entry.timer.stop();
        }
    }

    async fn persist(&mut self, id: AlarmId) {
        let Some(alarm) = self.collection.get(id) else {
            return;
        };
        if let Err(err) = self.settings.store_alarm(id, alarm.to_persisted()).await {
            log::warn!("[SERVICE] Failed to persist alarm. [alarm_id = {id}, error = {err:#}]");
        }
    }

    async fn publish_ids(&self) {
        if let Err(err) = self.settings.publish_ids(&self.collection.ids()).await {
            log::warn!("[SERVICE] Failed to publish id registry. [error = {err:#}]");
        }
    }

    fn ignore_unknown(&self, id: AlarmId) {
        log::warn!("[SERVICE] Ignoring command for unknown alarm. [alarm_id = {id}]");
    }
}
