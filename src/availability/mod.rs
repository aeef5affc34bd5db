use std::{future::Future, sync::Arc, time::Duration};

use anyhow::Result;
use serde::Serialize;
use tokio::{
    sync::{Mutex, watch},
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval, timeout},
};
use tracing::{debug, info, warn};

/// Timing of the wake-up probe cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MonitorSettings {
    pub poll_interval: Duration,
    pub timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(180),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// A single "is the backend awake" check. `Ok(false)` means reachable but not ready.
pub trait HealthProbe: Send + Sync + 'static {
    fn probe(&self) -> impl Future<Output = Result<bool>> + Send;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorState {
    Idle,
    Probing,
    Awake,
    TimedOut,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerAvailability {
    Unknown,
    Awake,
    Unreachable,
}

impl MonitorState {
    pub fn availability(self) -> ServerAvailability {
        match self {
            MonitorState::Idle | MonitorState::Probing => ServerAvailability::Unknown,
            MonitorState::Awake => ServerAvailability::Awake,
            MonitorState::TimedOut => ServerAvailability::Unreachable,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Tracked {
    state: MonitorState,
    started_at: Option<Instant>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct MonitorSnapshot {
    pub state: MonitorState,
    pub availability: ServerAvailability,
    pub progress: f64,
}

/// Polls the backend health endpoint until it reports awake or the bound expires.
pub struct AvailabilityMonitor<P: HealthProbe> {
    probe: Arc<P>,
    settings: MonitorSettings,
    tracked: Arc<watch::Sender<Tracked>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<P: HealthProbe> AvailabilityMonitor<P> {
    pub fn new(probe: P, settings: MonitorSettings) -> Self {
        let (tx, _rx) = watch::channel(Tracked {
            state: MonitorState::Idle,
            started_at: None,
        });
        Self {
            probe: Arc::new(probe),
            settings,
            tracked: Arc::new(tx),
            task: Mutex::new(None),
        }
    }

    /// Begin probing. Returns `false` when already probing or awake.
    pub async fn start(&self) -> bool {
        let mut task = self.task.lock().await;

        let current = self.tracked.borrow().state;
        if matches!(current, MonitorState::Probing | MonitorState::Awake) {
            return false;
        }

        if let Some(previous) = task.take() {
            previous.abort();
        }

        let started_at = Instant::now();
        self.tracked.send_replace(Tracked {
            state: MonitorState::Probing,
            started_at: Some(started_at),
        });
        info!(from = ?current, "probing backend availability");

        let probe = Arc::clone(&self.probe);
        let tracked = Arc::clone(&self.tracked);
        let settings = self.settings;
        *task = Some(tokio::spawn(async move {
            let outcome = run_probe_cycle(probe.as_ref(), settings, started_at).await;
            tracked.send_modify(|current| current.state = outcome);
        }));

        true
    }

    pub fn state(&self) -> MonitorState {
        self.tracked.borrow().state
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        let tracked = *self.tracked.borrow();
        let progress = match (tracked.state, tracked.started_at) {
            (MonitorState::Awake | MonitorState::TimedOut, _) => 1.0,
            (MonitorState::Probing, Some(started_at)) => {
                progress_fraction(started_at.elapsed(), self.settings.timeout)
            }
            _ => 0.0,
        };

        MonitorSnapshot {
            state: tracked.state,
            availability: tracked.state.availability(),
            progress,
        }
    }

    /// Wait until the monitor leaves `Probing`.
    #[cfg(test)]
    pub async fn settled(&self) -> MonitorState {
        let mut rx = self.tracked.subscribe();
        match rx
            .wait_for(|tracked| tracked.state != MonitorState::Probing)
            .await
        {
            Ok(tracked) => tracked.state,
            Err(_) => self.state(),
        }
    }

    /// Cancel any outstanding polling. An interrupted cycle falls back to `Idle`
    /// so a later `start` probes again.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.task.lock().await.take() {
            handle.abort();
            self.tracked.send_if_modified(|tracked| {
                if tracked.state != MonitorState::Probing {
                    return false;
                }
                tracked.state = MonitorState::Idle;
                tracked.started_at = None;
                true
            });
            debug!("availability polling cancelled");
        }
    }
}

impl<P: HealthProbe> Drop for AvailabilityMonitor<P> {
    fn drop(&mut self) {
        if let Some(handle) = self.task.get_mut().take() {
            handle.abort();
        }
    }
}

async fn run_probe_cycle<P: HealthProbe>(
    probe: &P,
    settings: MonitorSettings,
    started_at: Instant,
) -> MonitorState {
    let mut ticks = interval(settings.poll_interval);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut attempt = 0_u32;
    loop {
        ticks.tick().await;

        let elapsed = started_at.elapsed();
        if elapsed >= settings.timeout {
            warn!(attempt, ?elapsed, "backend did not wake up in time");
            return MonitorState::TimedOut;
        }

        attempt += 1;
        // A reply is only trusted if it lands inside the overall bound.
        let budget = settings.request_timeout.min(settings.timeout - elapsed);
        match timeout(budget, probe.probe()).await {
            Ok(Ok(true)) => {
                info!(attempt, ?elapsed, "backend is awake");
                return MonitorState::Awake;
            }
            Ok(Ok(false)) => debug!(attempt, "backend not ready yet"),
            Ok(Err(err)) => debug!(attempt, ?err, "backend status probe failed"),
            Err(_) => debug!(attempt, ?budget, "backend status probe timed out"),
        }
    }
}

fn progress_fraction(elapsed: Duration, bound: Duration) -> f64 {
    if bound.is_zero() {
        return 1.0;
    }
    (elapsed.as_secs_f64() / bound.as_secs_f64()).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Reports awake on the `awake_on`th call (1-based); 0 never wakes.
    struct ScriptedProbe {
        calls: Arc<AtomicU32>,
        awake_on: u32,
        fail_odd_calls: bool,
        delay: Duration,
    }

    impl HealthProbe for ScriptedProbe {
        async fn probe(&self) -> Result<bool> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail_odd_calls && call % 2 == 1 {
                return Err(anyhow!("connection refused"));
            }
            Ok(self.awake_on != 0 && call >= self.awake_on)
        }
    }

    fn monitor(awake_on: u32, fail_odd_calls: bool) -> (AvailabilityMonitor<ScriptedProbe>, Arc<AtomicU32>) {
        slow_monitor(awake_on, Duration::ZERO, fail_odd_calls, MonitorSettings::default())
    }

    fn slow_monitor(
        awake_on: u32,
        delay: Duration,
        fail_odd_calls: bool,
        settings: MonitorSettings,
    ) -> (AvailabilityMonitor<ScriptedProbe>, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let probe = ScriptedProbe {
            calls: Arc::clone(&calls),
            awake_on,
            fail_odd_calls,
            delay,
        };
        (AvailabilityMonitor::new(probe, settings), calls)
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_after_bound_and_stops_polling() {
        let (monitor, calls) = monitor(0, false);

        assert!(monitor.start().await);
        assert_eq!(monitor.settled().await, MonitorState::TimedOut);

        // Polls at 0s, 5s, ... 175s; none at or after the 180s bound.
        assert_eq!(calls.load(Ordering::SeqCst), 36);
        assert_eq!(monitor.snapshot().availability, ServerAvailability::Unreachable);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 36);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_failures_do_not_abort_the_cycle() {
        let (monitor, calls) = monitor(4, true);

        monitor.start().await;
        assert_eq!(monitor.settled().await, MonitorState::Awake);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(monitor.snapshot().progress, 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn start_is_idempotent_while_probing_or_awake() {
        let (monitor, calls) = monitor(3, false);

        assert!(monitor.start().await);
        assert!(!monitor.start().await);
        assert_eq!(monitor.settled().await, MonitorState::Awake);
        assert!(!monitor.start().await);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_monitor_can_be_restarted() {
        let (monitor, _calls) = monitor(0, false);

        monitor.start().await;
        assert_eq!(monitor.settled().await, MonitorState::TimedOut);
        assert!(monitor.start().await);
        assert_eq!(monitor.state(), MonitorState::Probing);
        monitor.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_outstanding_polling() {
        let (monitor, calls) = monitor(0, false);

        monitor.start().await;
        tokio::time::sleep(Duration::from_secs(12)).await;
        monitor.shutdown().await;
        let seen = calls.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(calls.load(Ordering::SeqCst), seen);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_replies_do_not_stretch_the_poll_interval() {
        let (monitor, calls) = slow_monitor(0, Duration::from_secs(4), false, MonitorSettings::default());

        monitor.start().await;
        assert_eq!(monitor.settled().await, MonitorState::TimedOut);
        assert_eq!(calls.load(Ordering::SeqCst), 36);
    }

    #[tokio::test(start_paused = true)]
    async fn reply_after_the_bound_is_not_trusted() {
        let settings = MonitorSettings {
            poll_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(12),
            request_timeout: Duration::from_secs(10),
        };
        // Every reply takes 9s: the second poll starts at 9s and would say awake at 18s.
        let (monitor, calls) = slow_monitor(2, Duration::from_secs(9), false, settings);

        monitor.start().await;
        assert_eq!(monitor.settled().await, MonitorState::TimedOut);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_mid_cycle_allows_a_fresh_start() {
        let (monitor, calls) = monitor(0, false);

        monitor.start().await;
        tokio::time::sleep(Duration::from_secs(7)).await;
        monitor.shutdown().await;
        assert_eq!(monitor.state(), MonitorState::Idle);
        assert_eq!(monitor.snapshot().progress, 0.0);

        let before = calls.load(Ordering::SeqCst);
        assert!(monitor.start().await);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(calls.load(Ordering::SeqCst) > before);
        monitor.shutdown().await;
    }

    #[test]
    fn progress_is_clamped() {
        let bound = Duration::from_secs(180);
        assert_eq!(progress_fraction(Duration::from_secs(90), bound), 0.5);
        assert_eq!(progress_fraction(Duration::from_secs(400), bound), 1.0);
        assert_eq!(progress_fraction(Duration::ZERO, Duration::ZERO), 1.0);
    }

    #[test]
    fn idle_monitor_reports_unknown() {
        let (monitor, _calls) = monitor(0, false);
        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.state, MonitorState::Idle);
        assert_eq!(snapshot.availability, ServerAvailability::Unknown);
        assert_eq!(snapshot.progress, 0.0);
    }
}
