//! Replay driver - the periodic background tick
//!
//! One tokio task owns the timer. Missed timer ticks are skipped rather than
//! bursted, and stopping waits for the task to exit.

use crate::config::effective_interval;
use crate::error::{Result, SimError};
use crate::feed::timeline::{TickOutcome, TimelineSynchronizer};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

struct RunningReplay {
    period: Duration,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Owns the replay timer task
pub struct ReplayDriver {
    timeline: Arc<TimelineSynchronizer>,
    base_interval: Duration,
    speed_multiplier: Mutex<f64>,
    running: Mutex<Option<RunningReplay>>,
}

impl std::fmt::Debug for ReplayDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayDriver")
            .field("base_interval", &self.base_interval)
            .field("speed_multiplier", &*self.speed_multiplier.lock())
            .field("running", &self.is_running())
            .finish()
    }
}

impl ReplayDriver {
    pub fn new(timeline: Arc<TimelineSynchronizer>, base_interval: Duration, speed_multiplier: f64) -> Self {
        Self {
            timeline,
            base_interval,
            speed_multiplier: Mutex::new(speed_multiplier),
            running: Mutex::new(None),
        }
    }

    /// Current timer period
    pub fn interval(&self) -> Duration {
        effective_interval(self.base_interval, *self.speed_multiplier.lock())
    }

    pub fn speed_multiplier(&self) -> f64 {
        *self.speed_multiplier.lock()
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .map(|r| !r.task.is_finished())
            .unwrap_or(false)
    }

    /// Spawn the timer task on the current tokio runtime.
    ///
    /// Starting a running driver is a no-op that reports the active period.
    pub fn start(&self) -> Result<Duration> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| SimError::ConfigError(format!("replay needs a tokio runtime: {}", e)))?;

        let mut running = self.running.lock();
        if let Some(active) = running.as_ref() {
            if !active.task.is_finished() {
                return Ok(active.period);
            }
        }

        let period = self.interval();
        let (shutdown, rx) = watch::channel(false);
        let task = handle.spawn(run_replay(Arc::clone(&self.timeline), period, rx));
        *running = Some(RunningReplay { period, shutdown, task });

        log::info!("Replay started with a {:?} tick", period);
        Ok(period)
    }

    /// Signal the timer task and wait for it to exit
    pub async fn stop(&self) {
        let Some(active) = self.running.lock().take() else {
            return;
        };
        let _ = active.shutdown.send(true);
        if let Err(e) = active.task.await {
            log::error!("Replay task ended abnormally: {}", e);
        }
        log::info!("Replay stopped");
    }

    /// Change the speed; a running timer is restarted with the new period
    pub async fn set_speed(&self, multiplier: f64) -> Result<Duration> {
        if !(multiplier.is_finite() && multiplier > 0.0) {
            return Err(SimError::ConfigError(format!(
                "speed multiplier must be positive, got {}",
                multiplier
            )));
        }

        *self.speed_multiplier.lock() = multiplier;
        let period = self.interval();
        log::info!("Replay speed set to {}x ({:?} tick)", multiplier, period);

        if self.running.lock().is_some() {
            self.stop().await;
            self.start()?;
        }
        Ok(period)
    }
}

impl Drop for ReplayDriver {
    fn drop(&mut self) {
        if let Some(active) = self.running.get_mut().take() {
            let _ = active.shutdown.send(true);
            active.task.abort();
        }
    }
}

async fn run_replay(timeline: Arc<TimelineSynchronizer>, period: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let TickOutcome::NotReady = timeline.tick() {
                    log::debug!("Replay tick before data load");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}
