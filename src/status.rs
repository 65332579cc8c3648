//! Header status bar: a wall clock refreshed every tick and a random-walk
//! active-alert counter that moves every `walk_every` ticks.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::draws::Entropy;
use crate::feed::{Panel, TickOutput};
use crate::logging::Domain;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusBar {
    pub active_alerts: u32,
    pub clock: DateTime<Utc>,
    /// Ticks since the counter last moved.
    pub since_walk: u32,
}

#[derive(Debug, Clone)]
pub struct StatusPanel {
    /// Clock refresh period.
    pub interval: Duration,
    /// Clock ticks between counter steps.
    pub walk_every: u32,
    /// Chance the counter goes up; otherwise it goes down.
    pub raise_p: f64,
}

impl Default for StatusPanel {
    fn default() -> Self {
        Self { interval: Duration::from_secs(1), walk_every: 5, raise_p: 0.3 }
    }
}

impl Panel for StatusPanel {
    type State = StatusBar;

    fn name(&self) -> &'static str {
        "status"
    }

    fn domain(&self) -> Domain {
        Domain::Status
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn seed(&self, _draws: &mut dyn Entropy, now: DateTime<Utc>) -> StatusBar {
        StatusBar { active_alerts: 0, clock: now, since_walk: 0 }
    }

    /// Draws only on the ticks where the counter moves.
    fn tick(
        &self,
        state: &StatusBar,
        draws: &mut dyn Entropy,
        now: DateTime<Utc>,
    ) -> TickOutput<StatusBar> {
        let since_walk = state.since_walk + 1;
        if since_walk < self.walk_every.max(1) {
            return TickOutput::quiet(StatusBar { clock: now, since_walk, ..*state });
        }
        let active_alerts = if draws.chance(self.raise_p) {
            state.active_alerts + 1
        } else {
            state.active_alerts.saturating_sub(1)
        };
        TickOutput {
            next: StatusBar { active_alerts, clock: now, since_walk: 0 },
            notices: Vec::new(),
            touched: 1,
        }
    }

    fn len(&self, _state: &StatusBar) -> usize {
        1
    }
}
