//! Timer ownership.
//!
//! A [`PanelSession`] owns one panel's state and the Tokio task that advances
//! it. The task exists only between `start()` and `stop()`; dropping the
//! session stops it too. [`OverrideController`] owns one expiry timer per
//! active override and cancels it when the override is reset.
//!
//! Both must be started from inside a Tokio runtime.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::draws::Entropy;
use crate::feed::Panel;
use crate::logging::{
    agg_increment, log, log_override_transition, log_session, obj, v_num, v_str, Domain, Level,
    PanelSummary,
};
use crate::map::Intersection;
use crate::notify::{deliver, Notifier};
use crate::overrides::{
    ActiveOverride, OperatorAction, OverrideBoard, OverrideError, OverrideMode, PendingAction,
    Transition,
};

/// A poisoned lock only means a tick panicked mid-update; the last written
/// state is still the best one available.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn counter_for(domain: Domain) -> Option<&'static str> {
    match domain {
        Domain::Anpr => Some("detection"),
        Domain::Alerts => Some("alert"),
        Domain::Map => Some("light_change"),
        _ => None,
    }
}

type SharedDraws = Arc<Mutex<Box<dyn Entropy + Send>>>;

pub struct PanelSession<P: Panel> {
    panel: Arc<P>,
    state: Arc<Mutex<P::State>>,
    draws: SharedDraws,
    notifier: Arc<dyn Notifier>,
    ticks: Arc<AtomicU64>,
    /// Bumped on every stop; a task that sees a different epoch exits
    /// without touching state.
    epoch: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl<P: Panel> PanelSession<P> {
    /// Seed the panel immediately. No timer runs until `start()`.
    pub fn new(
        panel: P,
        mut draws: impl Entropy + Send + 'static,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let state = panel.seed(&mut draws, Utc::now());
        Self {
            panel: Arc::new(panel),
            state: Arc::new(Mutex::new(state)),
            draws: Arc::new(Mutex::new(Box::new(draws))),
            notifier,
            ticks: Arc::new(AtomicU64::new(0)),
            epoch: Arc::new(AtomicU64::new(0)),
            handle: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.panel.name()
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }

    /// Begin ticking every `interval()`, first tick one interval from now.
    /// Returns false if already running.
    pub fn start(&mut self) -> bool {
        if self.is_running() {
            return false;
        }
        let period = self.panel.interval();
        let panel = Arc::clone(&self.panel);
        let state = Arc::clone(&self.state);
        let draws = Arc::clone(&self.draws);
        let notifier = Arc::clone(&self.notifier);
        let ticks = Arc::clone(&self.ticks);
        let epoch = Arc::clone(&self.epoch);
        let mine = epoch.load(Ordering::SeqCst);

        self.handle = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let (notices, records, touched) = {
                    let mut draws = lock(&draws);
                    let mut state = lock(&state);
                    if epoch.load(Ordering::SeqCst) != mine {
                        break;
                    }
                    let out = panel.tick(&state, &mut **draws, Utc::now());
                    *state = out.next;
                    ticks.fetch_add(1, Ordering::SeqCst);
                    (out.notices, panel.len(&state), out.touched)
                };
                log(
                    Level::Debug,
                    panel.domain(),
                    "tick",
                    obj(&[
                        ("panel", v_str(panel.name())),
                        ("records", v_num(records as f64)),
                        ("touched", v_num(touched as f64)),
                    ]),
                );
                if let Some(counter) = counter_for(panel.domain()) {
                    agg_increment(counter, touched);
                }
                agg_increment("notice", notices.len() as u64);
                deliver(notifier.as_ref(), &notices);
            }
        }));
        log_session(self.panel.name(), "start", period.as_millis() as u64);
        true
    }

    /// Cancel the timer. Once this returns no further tick is applied; a
    /// tick already past its state update may still deliver its notices.
    /// Returns false if it was not running.
    pub fn stop(&mut self) -> bool {
        let Some(handle) = self.handle.take() else {
            return false;
        };
        {
            // wait out any tick in flight, then invalidate the task
            let _guard = lock(&self.state);
            self.epoch.fetch_add(1, Ordering::SeqCst);
        }
        handle.abort();
        log_session(self.panel.name(), "stop", self.panel.interval().as_millis() as u64);
        true
    }

    pub fn snapshot(&self) -> P::State {
        lock(&self.state).clone()
    }

    /// Read the live state without cloning it.
    pub fn read<R>(&self, f: impl FnOnce(&P::State) -> R) -> R {
        f(&lock(&self.state))
    }

    /// Apply an operator action to the live state.
    pub fn update<R>(&self, f: impl FnOnce(&mut P::State) -> R) -> R {
        f(&mut lock(&self.state))
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    pub fn summary(&self) -> PanelSummary {
        PanelSummary {
            panel: self.panel.name(),
            records: self.panel.len(&lock(&self.state)),
            ticks: self.ticks(),
            running: self.is_running(),
        }
    }
}

impl<P: Panel> Drop for PanelSession<P> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.epoch.fetch_add(1, Ordering::SeqCst);
            handle.abort();
        }
    }
}

/// Live front for [`OverrideBoard`]: delivers notices, logs transitions, and
/// owns the expiry timers.
pub struct OverrideController {
    board: Arc<Mutex<OverrideBoard>>,
    timers: Arc<Mutex<HashMap<String, JoinHandle<()>>>>,
    notifier: Arc<dyn Notifier>,
    duration: Duration,
}

fn announce(notifier: &dyn Notifier, t: &Transition) {
    log_override_transition(&t.intersection_id, t.from.as_str(), t.to.as_str(), t.cause.as_str());
    agg_increment("notice", 1);
    deliver(notifier, std::slice::from_ref(&t.notice));
}

impl OverrideController {
    pub fn new(
        intersections: &[Intersection],
        duration: Duration,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            board: Arc::new(Mutex::new(OverrideBoard::new(intersections, duration))),
            timers: Arc::new(Mutex::new(HashMap::new())),
            notifier,
            duration,
        }
    }

    pub fn propose(
        &self,
        action: OperatorAction,
        intersection_id: &str,
    ) -> Result<PendingAction, OverrideError> {
        lock(&self.board).propose(action, intersection_id).cloned()
    }

    pub fn cancel(&self) -> Option<PendingAction> {
        lock(&self.board).cancel()
    }

    pub fn pending(&self) -> Option<PendingAction> {
        lock(&self.board).pending().cloned()
    }

    pub fn mode(&self, intersection_id: &str) -> OverrideMode {
        lock(&self.board).mode(intersection_id)
    }

    pub fn active(&self, intersection_id: &str) -> Option<ActiveOverride> {
        lock(&self.board).active(intersection_id).copied()
    }

    pub fn active_count(&self) -> usize {
        lock(&self.board).active_count()
    }

    /// Apply the pending action. Activations arm an expiry timer; a reset
    /// cancels the one for that intersection.
    pub fn confirm(&self) -> Result<Transition, OverrideError> {
        let transition = lock(&self.board).confirm(Utc::now())?;
        announce(self.notifier.as_ref(), &transition);

        let id = transition.intersection_id.clone();
        if let Some(previous) = lock(&self.timers).remove(&id) {
            previous.abort();
        }
        if let Some(activation) = transition.activation {
            let handle = self.arm_expiry(id.clone(), activation.generation, self.duration);
            lock(&self.timers).insert(id, handle);
        }
        Ok(transition)
    }

    /// Re-arm an expiry for every active override that has no live timer,
    /// using the time left until its recorded deadline. Overrides already
    /// past their deadline lapse right away.
    pub fn resume(&self) -> usize {
        let now = Utc::now();
        let active = lock(&self.board).active_overrides();
        let mut timers = lock(&self.timers);
        let mut armed = 0;
        for (id, activation) in active {
            if timers.get(&id).map(|h| !h.is_finished()).unwrap_or(false) {
                continue;
            }
            let left = (activation.expires_at - now).to_std().unwrap_or(Duration::ZERO);
            let handle = self.arm_expiry(id.clone(), activation.generation, left);
            timers.insert(id, handle);
            armed += 1;
        }
        armed
    }

    fn arm_expiry(
        &self,
        intersection_id: String,
        generation: u64,
        after: Duration,
    ) -> JoinHandle<()> {
        let board = Arc::clone(&self.board);
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let lapsed = lock(&board).expire(&intersection_id, generation);
            if let Some(t) = lapsed {
                announce(notifier.as_ref(), &t);
            }
        })
    }

    /// Cancel every pending expiry. Active overrides keep their deadlines;
    /// `resume` arms them again.
    pub fn shutdown(&self) {
        for (_, handle) in lock(&self.timers).drain() {
            handle.abort();
        }
    }

    pub fn armed_timers(&self) -> usize {
        lock(&self.timers).values().filter(|h| !h.is_finished()).count()
    }
}

impl Drop for OverrideController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draws::ScriptedDraws;
    use crate::map::seed_intersections;
    use crate::notify::RecordingNotifier;
    use crate::status::StatusPanel;

    /// Counter moves on every 5 s tick.
    fn status_session(rec: Arc<RecordingNotifier>) -> PanelSession<StatusPanel> {
        let panel = StatusPanel {
            interval: Duration::from_secs(5),
            walk_every: 1,
            ..StatusPanel::default()
        };
        PanelSession::new(panel, ScriptedDraws::constant(0.0), rec)
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_waits_one_interval() {
        let rec = Arc::new(RecordingNotifier::new());
        let mut s = status_session(rec);
        assert!(s.start());
        assert!(!s.start());
        tokio::time::sleep(Duration::from_millis(4_900)).await;
        assert_eq!(s.ticks(), 0);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(s.ticks(), 1);
        assert_eq!(s.snapshot().active_alerts, 1);
        assert!(s.stop());
        assert!(!s.stop());
    }

    #[tokio::test(start_paused = true)]
    async fn restart_resumes_from_current_state() {
        let rec = Arc::new(RecordingNotifier::new());
        let mut s = status_session(rec);
        s.start();
        tokio::time::sleep(Duration::from_millis(10_100)).await;
        s.stop();
        assert_eq!(s.snapshot().active_alerts, 2);
        s.start();
        tokio::time::sleep(Duration::from_millis(5_100)).await;
        assert_eq!(s.snapshot().active_alerts, 3);
        assert_eq!(s.summary().ticks, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn read_sees_operator_updates() {
        let rec = Arc::new(RecordingNotifier::new());
        let s = status_session(rec);
        assert_eq!(s.read(|bar| bar.active_alerts), 0);
        s.update(|bar| bar.active_alerts = 7);
        assert_eq!(s.read(|bar| bar.active_alerts), 7);
        assert_eq!(s.snapshot().active_alerts, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn resume_rearms_expiry_after_shutdown() {
        let rec = Arc::new(RecordingNotifier::new());
        let ctl =
            OverrideController::new(&seed_intersections(), Duration::from_secs(300), rec.clone());
        ctl.propose(OperatorAction::ForceGreen, "INT002").unwrap();
        ctl.confirm().unwrap();
        ctl.shutdown();
        assert_eq!(ctl.armed_timers(), 0);

        assert_eq!(ctl.resume(), 1);
        assert_eq!(ctl.resume(), 0);
        assert_eq!(ctl.armed_timers(), 1);

        tokio::time::sleep(Duration::from_secs(301)).await;
        assert_eq!(ctl.mode("INT002"), OverrideMode::Automatic);
        assert_eq!(rec.count_titled("Override Expired"), 1);
        assert_eq!(ctl.resume(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_cancels_expiry() {
        let rec = Arc::new(RecordingNotifier::new());
        let ctl =
            OverrideController::new(&seed_intersections(), Duration::from_secs(300), rec.clone());
        ctl.propose(OperatorAction::HoldRed, "INT001").unwrap();
        ctl.confirm().unwrap();
        assert_eq!(ctl.armed_timers(), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        ctl.propose(OperatorAction::Reset, "INT001").unwrap();
        ctl.confirm().unwrap();
        assert_eq!(ctl.armed_timers(), 0);

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(rec.count_titled("Override Expired"), 0);
        assert_eq!(rec.count_titled("System Reset"), 1);
        assert_eq!(ctl.mode("INT001"), OverrideMode::Automatic);
    }
}
