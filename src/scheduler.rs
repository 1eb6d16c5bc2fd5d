// src/scheduler.rs
//! Run-state machine around `ScanCycle`.
//!
//! `Idle --start--> Running --stop--> Stopping --(task exits)--> Idle`.
//! The background task owns the loop; the `Scheduler` handle only flips
//! state and fires the cancellation token. Every wait inside the loop
//! (rate gate, reply delay, inter-cycle sleep) races that token, so a stop
//! takes effect within one heartbeat at worst and usually immediately.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ScheduleConfig;
use crate::cycle::ScanCycle;
use crate::error::{Cancelled, SchedulerError};
use crate::events::{self, SchedulerEvent};
use crate::wait::sleep_cancellable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Running,
    Stopping,
}

/// Snapshot of the scheduler, as shown by the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct RunState {
    pub phase: Phase,
    /// The schedule of the current (or most recent) run.
    pub config: Option<ScheduleConfig>,
    pub started_at: Option<DateTime<Utc>>,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub next_cycle_at: Option<DateTime<Utc>>,
    pub cycles_completed: u64,
}

impl RunState {
    fn idle() -> Self {
        Self {
            phase: Phase::Idle,
            config: None,
            started_at: None,
            last_cycle_at: None,
            next_cycle_at: None,
            cycles_completed: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }
}

struct Control {
    cancel: CancellationToken,
    // kept so the task is not detached silently; abort is never used
    _task: JoinHandle<()>,
}

pub struct Scheduler {
    cycle: Arc<ScanCycle>,
    state: Arc<watch::Sender<RunState>>,
    control: Mutex<Option<Control>>,
}

impl Scheduler {
    pub fn new(cycle: ScanCycle) -> Self {
        let (state, _) = watch::channel(RunState::idle());
        Self {
            cycle: Arc::new(cycle),
            state: Arc::new(state),
            control: Mutex::new(None),
        }
    }

    pub fn cycle(&self) -> &Arc<ScanCycle> {
        &self.cycle
    }

    /// Begin periodic scanning. Must be called from within a Tokio runtime.
    ///
    /// Fails with `AlreadyRunning` while a run is active and with
    /// `InvalidTransition` while a previous run is still winding down.
    pub fn start(&self, config: ScheduleConfig) -> Result<(), SchedulerError> {
        let config = config.normalized();
        config.validate()?;

        let mut control = self.control.lock().unwrap_or_else(|p| p.into_inner());

        let mut refused = None;
        let now = Utc::now();
        self.state.send_if_modified(|s| match s.phase {
            Phase::Idle => {
                *s = RunState {
                    phase: Phase::Running,
                    config: Some(config.clone()),
                    started_at: Some(now),
                    last_cycle_at: None,
                    next_cycle_at: Some(now),
                    cycles_completed: 0,
                };
                true
            }
            Phase::Running => {
                refused = Some(SchedulerError::AlreadyRunning);
                false
            }
            Phase::Stopping => {
                refused = Some(SchedulerError::InvalidTransition(Phase::Stopping));
                false
            }
        });
        if let Some(e) = refused {
            return Err(e);
        }

        info!(
            channels = ?config.channels,
            period_secs = config.effective_period_secs(),
            keywords = config.keywords.len(),
            selectivity = config.selectivity,
            "scheduler started"
        );

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_loop(
            self.cycle.clone(),
            config,
            cancel.clone(),
            self.state.clone(),
        ));
        *control = Some(Control {
            cancel,
            _task: task,
        });
        Ok(())
    }

    /// Request a stop. Idempotent; returns before the loop has exited.
    pub fn stop(&self) {
        let taken = self
            .control
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        let Some(control) = taken else {
            debug!("stop requested while idle");
            return;
        };
        self.state.send_if_modified(|s| {
            if s.phase == Phase::Running {
                s.phase = Phase::Stopping;
                true
            } else {
                false
            }
        });
        info!("scheduler stop requested");
        control.cancel.cancel();
    }

    pub fn status(&self) -> RunState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.cycle.events().subscribe()
    }

    /// Resolve once the phase is `Idle`.
    pub async fn wait_until_idle(&self) {
        let mut rx = self.state.subscribe();
        let _ = rx.wait_for(|s| s.phase == Phase::Idle).await;
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(c) = self
            .control
            .get_mut()
            .unwrap_or_else(|p| p.into_inner())
            .take()
        {
            c.cancel.cancel();
        }
    }
}

/// Flips the state back to `Idle` however the loop task ends.
struct IdleOnExit {
    state: Arc<watch::Sender<RunState>>,
    events: broadcast::Sender<SchedulerEvent>,
}

impl Drop for IdleOnExit {
    fn drop(&mut self) {
        self.state.send_modify(|s| {
            s.phase = Phase::Idle;
            s.next_cycle_at = None;
        });
        events::emit(&self.events, SchedulerEvent::Stopped);
        info!("scheduler stopped");
    }
}

async fn run_loop(
    cycle: Arc<ScanCycle>,
    config: ScheduleConfig,
    cancel: CancellationToken,
    state: Arc<watch::Sender<RunState>>,
) {
    let events = cycle.events().clone();
    let _idle = IdleOnExit {
        state: state.clone(),
        events: events.clone(),
    };
    let period = config.period();
    events::emit(
        &events,
        SchedulerEvent::Started {
            channels: config.channels.clone(),
            period_secs: period.as_secs(),
        },
    );

    let mut n: u64 = 0;
    while !cancel.is_cancelled() {
        n += 1;
        events::emit(&events, SchedulerEvent::CycleStarted { cycle: n });
        info!(cycle = n, "scan cycle started");
        let t0 = Instant::now();

        let report = cycle.run_cycle(&config, &cancel).await;

        let finished = Utc::now();
        let next = chrono::Duration::from_std(period)
            .ok()
            .and_then(|d| finished.checked_add_signed(d));
        state.send_modify(|s| {
            s.last_cycle_at = Some(finished);
            if !report.cancelled {
                s.cycles_completed += 1;
                s.next_cycle_at = next;
            }
        });

        let elapsed_ms = t0.elapsed().as_millis() as u64;
        let scanned = report.metrics.total_posts_scanned;
        let attempted = report.attempted() as u64;
        let succeeded = report.succeeded() as u64;
        info!(
            cycle = n,
            scanned,
            attempted,
            succeeded,
            elapsed_ms,
            cancelled = report.cancelled,
            "scan cycle finished"
        );
        events::emit(
            &events,
            SchedulerEvent::CycleFinished {
                cycle: n,
                scanned,
                attempted,
                succeeded,
                elapsed_ms,
            },
        );

        if report.cancelled {
            break;
        }
        let Some(next) = next else {
            warn!(?period, "period overflows the calendar; stopping");
            break;
        };
        if wait_for_next_cycle(period, config.heartbeat(), next, &cancel, &events)
            .await
            .is_err()
        {
            break;
        }
    }
}

/// Sleep out the period in heartbeat-sized steps.
async fn wait_for_next_cycle(
    period: Duration,
    heartbeat: Duration,
    next_cycle_at: DateTime<Utc>,
    cancel: &CancellationToken,
    events: &broadcast::Sender<SchedulerEvent>,
) -> Result<(), Cancelled> {
    let deadline = Instant::now() + period;
    loop {
        let now = Instant::now();
        if now >= deadline {
            return Ok(());
        }
        sleep_cancellable((deadline - now).min(heartbeat), cancel).await?;
        if Instant::now() < deadline {
            debug!(%next_cycle_at, "waiting for next cycle");
            events::emit(events, SchedulerEvent::Heartbeat { next_cycle_at });
        }
    }
}
