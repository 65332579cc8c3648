//! Alert feed: unbounded, newest first, with operator acknowledge / resolve /
//! dismiss. A resolved alert is always acknowledged.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::draws::{pick, Entropy};
use crate::error::DashboardError;
use crate::feed::{CappedFeed, Panel, TickOutput};
use crate::logging::Domain;
use crate::notify::{Notice, NoticeLevel};

const LOCATIONS: [&str; 3] = ["Main St & 1st Ave", "Broadway & 42nd St", "5th Ave & Central Park"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Accident,
    Congestion,
    Parade,
    System,
    Weather,
}

impl AlertKind {
    pub const ALL: [AlertKind; 5] = [
        AlertKind::Accident,
        AlertKind::Congestion,
        AlertKind::Parade,
        AlertKind::System,
        AlertKind::Weather,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            AlertKind::Accident => "Traffic Incident",
            AlertKind::Congestion => "Heavy Congestion",
            AlertKind::Parade => "Special Event",
            AlertKind::System => "System Alert",
            AlertKind::Weather => "Weather Advisory",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] =
        [Severity::Low, Severity::Medium, Severity::High, Severity::Critical];
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub id: String,
    pub kind: AlertKind,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub location: String,
    pub timestamp: DateTime<Utc>,
    pub acknowledged: bool,
    pub resolved: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertState {
    pub alerts: CappedFeed<Alert>,
    pub sound_enabled: bool,
    next_id: u64,
}

impl AlertState {
    fn find_mut(&mut self, id: &str) -> Result<&mut Alert, DashboardError> {
        self.alerts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| DashboardError::UnknownAlert(id.to_string()))
    }

    pub fn acknowledge(&mut self, id: &str) -> Result<(), DashboardError> {
        self.find_mut(id)?.acknowledged = true;
        Ok(())
    }

    pub fn resolve(&mut self, id: &str) -> Result<(), DashboardError> {
        let alert = self.find_mut(id)?;
        alert.resolved = true;
        alert.acknowledged = true;
        Ok(())
    }

    pub fn dismiss(&mut self, id: &str) -> Result<(), DashboardError> {
        let before = self.alerts.len();
        self.alerts.retain(|a| a.id != id);
        if self.alerts.len() == before {
            return Err(DashboardError::UnknownAlert(id.to_string()));
        }
        Ok(())
    }

    pub fn toggle_sound(&mut self) -> bool {
        self.sound_enabled = !self.sound_enabled;
        self.sound_enabled
    }

    pub fn active(&self) -> Vec<&Alert> {
        self.alerts.iter().filter(|a| !a.resolved).collect()
    }

    pub fn critical_active(&self) -> usize {
        self.alerts
            .iter()
            .filter(|a| !a.resolved && a.severity == Severity::Critical)
            .count()
    }
}

#[derive(Debug, Clone)]
pub struct AlertPanel {
    pub interval: Duration,
    pub spawn_p: f64,
    pub sound_enabled: bool,
}

impl Default for AlertPanel {
    fn default() -> Self {
        Self { interval: Duration::from_secs(10), spawn_p: 0.15, sound_enabled: true }
    }
}

#[allow(clippy::too_many_arguments)]
fn seeded_alert(
    id: &str,
    kind: AlertKind,
    severity: Severity,
    title: &str,
    description: &str,
    location: &str,
    at: DateTime<Utc>,
    acknowledged: bool,
    resolved: bool,
) -> Alert {
    Alert {
        id: id.to_string(),
        kind,
        severity,
        title: title.to_string(),
        description: description.to_string(),
        location: location.to_string(),
        timestamp: at,
        acknowledged,
        resolved,
    }
}

impl Panel for AlertPanel {
    type State = AlertState;

    fn name(&self) -> &'static str {
        "alerts"
    }

    fn domain(&self) -> Domain {
        Domain::Alerts
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn seed(&self, _draws: &mut dyn Entropy, now: DateTime<Utc>) -> AlertState {
        let mins = |m: i64| now - chrono::Duration::minutes(m);
        let seeded = vec![
            seeded_alert(
                "ALT001",
                AlertKind::Accident,
                Severity::High,
                "Vehicle Collision",
                "Multi-vehicle accident blocking 2 lanes",
                "Main St & 1st Ave",
                mins(5),
                false,
                false,
            ),
            seeded_alert(
                "ALT002",
                AlertKind::Congestion,
                Severity::Medium,
                "Heavy Traffic",
                "Queue length exceeding threshold",
                "Broadway & 42nd St",
                mins(10),
                true,
                false,
            ),
            seeded_alert(
                "ALT003",
                AlertKind::System,
                Severity::Critical,
                "Signal Malfunction",
                "Traffic light system offline",
                "Wall St & Water St",
                mins(20),
                true,
                true,
            ),
        ];
        AlertState {
            alerts: CappedFeed::from_newest_first(seeded, None),
            sound_enabled: self.sound_enabled,
            next_id: 4,
        }
    }

    /// Draw order: spawn, kind, severity, location.
    fn tick(
        &self,
        state: &AlertState,
        draws: &mut dyn Entropy,
        now: DateTime<Utc>,
    ) -> TickOutput<AlertState> {
        let mut next = state.clone();
        if !draws.chance(self.spawn_p) {
            return TickOutput::quiet(next);
        }
        let kind = *pick(draws, &AlertKind::ALL);
        let severity = *pick(draws, &Severity::ALL);
        let location = pick(draws, &LOCATIONS).to_string();
        let alert = Alert {
            id: format!("ALT{:03}", next.next_id),
            kind,
            severity,
            title: kind.title().to_string(),
            description: "System detected anomaly requiring attention".to_string(),
            location,
            timestamp: now,
            acknowledged: false,
            resolved: false,
        };
        next.next_id += 1;

        let mut notices = Vec::new();
        if next.sound_enabled && alert.severity == Severity::Critical {
            notices.push(Notice::new(
                "Critical Alert",
                format!("{} at {}", alert.title, alert.location),
                NoticeLevel::Critical,
            ));
        }
        next.alerts.prepend(alert);
        TickOutput { next, notices, touched: 1 }
    }

    fn len(&self, state: &AlertState) -> usize {
        state.alerts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draws::{ScriptedDraws, SeededDraws};
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    fn seeded(panel: &AlertPanel) -> AlertState {
        panel.seed(&mut ScriptedDraws::constant(0.0), t0())
    }

    #[test]
    fn seed_holds_invariant() {
        let state = seeded(&AlertPanel::default());
        assert_eq!(state.alerts.len(), 3);
        assert!(state.alerts.iter().all(|a| !a.resolved || a.acknowledged));
        assert_eq!(state.active().len(), 2);
        assert_eq!(state.critical_active(), 0);
    }

    #[test]
    fn critical_spawn_emits_notice() {
        let panel = AlertPanel::default();
        // spawn, kind=system, severity=critical, location=broadway
        let mut draws = ScriptedDraws::new([0.0, 0.7, 0.9, 0.5]);
        let out = panel.tick(&seeded(&panel), &mut draws, t0());
        let head = out.next.alerts.head().unwrap();
        assert_eq!(head.id, "ALT004");
        assert_eq!(head.kind, AlertKind::System);
        assert_eq!(head.title, "System Alert");
        assert_eq!(head.severity, Severity::Critical);
        assert_eq!(out.notices.len(), 1);
        assert_eq!(out.notices[0].message, "System Alert at Broadway & 42nd St");
        assert_eq!(out.notices[0].level, NoticeLevel::Critical);
    }

    #[test]
    fn muted_panel_stays_quiet() {
        let panel = AlertPanel::default();
        let mut state = seeded(&panel);
        assert!(!state.toggle_sound());
        let mut draws = ScriptedDraws::new([0.0, 0.7, 0.9, 0.5]);
        let out = panel.tick(&state, &mut draws, t0());
        assert_eq!(out.next.alerts.len(), 4);
        assert!(out.notices.is_empty());
    }

    #[test]
    fn non_critical_spawn_is_silent() {
        let panel = AlertPanel::default();
        let mut draws = ScriptedDraws::new([0.0, 0.0, 0.0, 0.0]);
        let out = panel.tick(&seeded(&panel), &mut draws, t0());
        assert_eq!(out.next.alerts.head().unwrap().severity, Severity::Low);
        assert!(out.notices.is_empty());
    }

    #[test]
    fn operator_actions_keep_resolved_implies_acknowledged() {
        let panel = AlertPanel { spawn_p: 1.0, ..AlertPanel::default() };
        let mut draws = SeededDraws::new(3);
        let mut state = seeded(&panel);
        for _ in 0..20 {
            state = panel.tick(&state, &mut draws, t0()).next;
        }
        assert_eq!(state.alerts.len(), 23);

        state.resolve("ALT001").unwrap();
        state.acknowledge("ALT010").unwrap();
        state.resolve("ALT012").unwrap();
        state.dismiss("ALT002").unwrap();
        assert!(state.alerts.iter().all(|a| !a.resolved || a.acknowledged));
        assert_eq!(state.alerts.len(), 22);

        assert_eq!(state.dismiss("ALT002"), Err(DashboardError::UnknownAlert("ALT002".into())));
        assert!(state.acknowledge("nope").is_err());
    }
}
