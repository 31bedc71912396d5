use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::alarm::AlarmId;
use crate::timemath::WallClock;

use super::common::InternalSignal;

const TICK_INTERVAL: Duration = Duration::from_secs(1);

struct TimerTask {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

/// Per-alarm countdown. One instance exists per armed alarm, none while
/// disarmed.
///
/// The task wakes once a second and compares the wall clock against the
/// deadline carried by a watch channel. Comparing wall time (instead of
/// sleeping a precomputed delay) keeps the at-least-once guarantee across
/// suspend: if the clock jumped past the deadline, the very next tick fires.
/// After sending a fire signal the task blocks until the deadline is
/// rescheduled or the timer is cancelled, so one due time fires exactly once.
pub struct AlarmTimer {
    task: Option<TimerTask>,
}

impl AlarmTimer {
    pub fn new() -> Self {
        Self { task: None }
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Start ticking. Stops any previous task first, so calling this twice
    /// can never leave two concurrent wake-up sources behind.
    pub fn start(
        &mut self,
        id: AlarmId,
        mut deadline: watch::Receiver<DateTime<Utc>>,
        clock: Arc<dyn WallClock>,
        signals: mpsc::UnboundedSender<InternalSignal>,
    ) {
        self.stop();

        let cancel = CancellationToken::new();
        let task_cancel = cancel.child_token();
        let handle = tokio::spawn(async move {
            let mut tick = time::interval(TICK_INTERVAL);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    _ = tick.tick() => {
                        let due = *deadline.borrow_and_update();
                        if clock.now() < due {
                            continue;
                        }
                        log::debug!("[TIMER] Alarm due. [alarm_id = {id}]");
                        if signals.send(InternalSignal::TimerFired(id)).is_err() {
                            break;
                        }
                        // Hold until rescheduled so the same due time cannot
                        // fire twice.
                        tokio::select! {
                            _ = task_cancel.cancelled() => break,
                            changed = deadline.changed() => {
                                if changed.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                }
            }
        });

        self.task = Some(TimerTask { handle, cancel });
    }

    /// Cancel the tick task. No-op when already stopped.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.cancel.cancel();
            task.handle.abort();
        }
    }
}

impl Default for AlarmTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for AlarmTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduling::test_utils::TestClock;
    use chrono::TimeDelta;

    struct Bed {
        timer: AlarmTimer,
        clock: Arc<TestClock>,
        deadline: watch::Sender<DateTime<Utc>>,
        signals: mpsc::UnboundedReceiver<InternalSignal>,
    }

    fn bed(deadline_in_secs: i64) -> Bed {
        let clock = Arc::new(TestClock::start());
        let (deadline, deadline_rx) = watch::channel(clock.now() + TimeDelta::seconds(deadline_in_secs));
        let (signals_tx, signals) = mpsc::unbounded_channel();

        let mut timer = AlarmTimer::new();
        timer.start(1, deadline_rx, clock.clone(), signals_tx);

        Bed {
            timer,
            clock,
            deadline,
            signals,
        }
    }

    fn fired_count(signals: &mut mpsc::UnboundedReceiver<InternalSignal>) -> usize {
        let mut count = 0;
        while let Ok(signal) = signals.try_recv() {
            assert!(matches!(signal, InternalSignal::TimerFired(1)));
            count += 1;
        }
        count
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_when_the_deadline_passes() {
        let mut bed = bed(5);

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(fired_count(&mut bed.signals), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired_count(&mut bed.signals), 1);

        // Without a reschedule the same due time never fires again.
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(fired_count(&mut bed.signals), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reschedule_resumes_the_countdown() {
        let mut bed = bed(2);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(fired_count(&mut bed.signals), 1);

        bed.deadline
            .send(bed.clock.now() + TimeDelta::seconds(10))
            .unwrap();

        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(fired_count(&mut bed.signals), 0);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired_count(&mut bed.signals), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn double_start_keeps_a_single_wakeup_source() {
        let clock = Arc::new(TestClock::start());
        let (deadline, _) = watch::channel(clock.now() + TimeDelta::seconds(3));
        let (signals_tx, mut signals) = mpsc::unbounded_channel();

        let mut timer = AlarmTimer::new();
        timer.start(1, deadline.subscribe(), clock.clone(), signals_tx.clone());
        timer.start(1, deadline.subscribe(), clock.clone(), signals_tx);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fired_count(&mut signals), 1);
        assert!(timer.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent_and_silences_the_timer() {
        let mut bed = bed(2);

        bed.timer.stop();
        bed.timer.stop();
        assert!(!bed.timer.is_running());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fired_count(&mut bed.signals), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn overdue_deadline_fires_on_the_next_tick() {
        let mut bed = bed(-30);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired_count(&mut bed.signals), 1);
    }
}
