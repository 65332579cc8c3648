//! Manual signal override state machine.
//!
//! Per intersection: `Automatic` ⇄ one of `HoldRed` / `ForceGreen` /
//! `EmergencyFlash`. Every operator action is two-step: `propose` records a
//! pending action without touching override state, `confirm` applies it.
//! Overrides lapse after a fixed duration; each activation carries a
//! generation so a late expiry for a superseded activation is ignored.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::map::Intersection;
use crate::notify::{Notice, NoticeLevel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideMode {
    Automatic,
    HoldRed,
    ForceGreen,
    EmergencyFlash,
}

impl OverrideMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverrideMode::Automatic => "automatic",
            OverrideMode::HoldRed => "hold_red",
            OverrideMode::ForceGreen => "force_green",
            OverrideMode::EmergencyFlash => "emergency_flash",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorAction {
    HoldRed,
    ForceGreen,
    EmergencyFlash,
    Reset,
}

impl OperatorAction {
    /// Mode the action leads to.
    pub fn target(&self) -> OverrideMode {
        match self {
            OperatorAction::HoldRed => OverrideMode::HoldRed,
            OperatorAction::ForceGreen => OverrideMode::ForceGreen,
            OperatorAction::EmergencyFlash => OverrideMode::EmergencyFlash,
            OperatorAction::Reset => OverrideMode::Automatic,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingAction {
    pub action: OperatorAction,
    pub intersection_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActiveOverride {
    pub mode: OverrideMode,
    pub activated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub generation: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverrideError {
    UnknownIntersection(String),
    AlreadyPending(PendingAction),
    NothingPending,
    AlreadyOverridden { intersection_id: String, mode: OverrideMode },
    NotOverridden(String),
}

impl fmt::Display for OverrideError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverrideError::UnknownIntersection(id) => write!(f, "unknown intersection: {}", id),
            OverrideError::AlreadyPending(p) => write!(
                f,
                "action {:?} on {} awaits confirmation",
                p.action, p.intersection_id
            ),
            OverrideError::NothingPending => write!(f, "no pending action to confirm"),
            OverrideError::AlreadyOverridden { intersection_id, mode } => write!(
                f,
                "{} already under {} override",
                intersection_id,
                mode.as_str()
            ),
            OverrideError::NotOverridden(id) => write!(f, "{} is under automatic control", id),
        }
    }
}

impl std::error::Error for OverrideError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionCause {
    Confirmed,
    Expired,
}

impl TransitionCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionCause::Confirmed => "confirmed",
            TransitionCause::Expired => "expired",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub intersection_id: String,
    pub from: OverrideMode,
    pub to: OverrideMode,
    pub cause: TransitionCause,
    /// Set when the transition activated an override.
    pub activation: Option<ActiveOverride>,
    pub notice: Notice,
}

#[derive(Debug, Clone)]
pub struct OverrideBoard {
    names: Vec<(String, String)>,
    active: HashMap<String, ActiveOverride>,
    pending: Option<PendingAction>,
    duration: chrono::Duration,
    next_generation: u64,
}

impl OverrideBoard {
    pub fn new(intersections: &[Intersection], duration: std::time::Duration) -> Self {
        Self {
            names: intersections.iter().map(|i| (i.id.clone(), i.name.clone())).collect(),
            active: HashMap::new(),
            pending: None,
            duration: chrono::Duration::from_std(duration)
                .unwrap_or_else(|_| chrono::Duration::minutes(5)),
            next_generation: 1,
        }
    }

    fn name_of(&self, id: &str) -> Result<&str, OverrideError> {
        self.names
            .iter()
            .find(|(i, _)| i == id)
            .map(|(_, n)| n.as_str())
            .ok_or_else(|| OverrideError::UnknownIntersection(id.to_string()))
    }

    pub fn mode(&self, id: &str) -> OverrideMode {
        self.active.get(id).map(|a| a.mode).unwrap_or(OverrideMode::Automatic)
    }

    pub fn active(&self, id: &str) -> Option<&ActiveOverride> {
        self.active.get(id)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Every live activation, ordered by intersection id.
    pub fn active_overrides(&self) -> Vec<(String, ActiveOverride)> {
        let mut all: Vec<_> = self.active.iter().map(|(id, a)| (id.clone(), *a)).collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    pub fn pending(&self) -> Option<&PendingAction> {
        self.pending.as_ref()
    }

    fn check(&self, action: OperatorAction, id: &str) -> Result<(), OverrideError> {
        self.name_of(id)?;
        match (self.mode(id), action) {
            (OverrideMode::Automatic, OperatorAction::Reset) => {
                Err(OverrideError::NotOverridden(id.to_string()))
            }
            (OverrideMode::Automatic, _) => Ok(()),
            (_, OperatorAction::Reset) => Ok(()),
            (mode, _) => {
                Err(OverrideError::AlreadyOverridden { intersection_id: id.to_string(), mode })
            }
        }
    }

    /// First step: stage an action. Override state is left untouched.
    pub fn propose(
        &mut self,
        action: OperatorAction,
        id: &str,
    ) -> Result<&PendingAction, OverrideError> {
        if let Some(p) = &self.pending {
            return Err(OverrideError::AlreadyPending(p.clone()));
        }
        self.check(action, id)?;
        Ok(self.pending.insert(PendingAction { action, intersection_id: id.to_string() }))
    }

    pub fn cancel(&mut self) -> Option<PendingAction> {
        self.pending.take()
    }

    /// Second step: apply the staged action. The pending slot is cleared even
    /// when the action is no longer valid.
    pub fn confirm(&mut self, now: DateTime<Utc>) -> Result<Transition, OverrideError> {
        let pending = self.pending.take().ok_or(OverrideError::NothingPending)?;
        let id = pending.intersection_id.as_str();
        self.check(pending.action, id)?;
        let name = self.name_of(id)?.to_string();
        let from = self.mode(id);

        let (activation, notice) = match pending.action {
            OperatorAction::Reset => {
                self.active.remove(id);
                (
                    None,
                    Notice::new(
                        "System Reset",
                        format!("Traffic signals at {} returned to automatic control", name),
                        NoticeLevel::Info,
                    ),
                )
            }
            action => {
                let activation = ActiveOverride {
                    mode: action.target(),
                    activated_at: now,
                    expires_at: now + self.duration,
                    generation: self.next_generation,
                };
                self.next_generation += 1;
                self.active.insert(id.to_string(), activation);
                (Some(activation), activation_notice(action, &name))
            }
        };

        Ok(Transition {
            intersection_id: pending.intersection_id.clone(),
            from,
            to: pending.action.target(),
            cause: TransitionCause::Confirmed,
            activation,
            notice,
        })
    }

    /// Lapse one activation. Ignored unless `generation` is still the live one.
    pub fn expire(&mut self, id: &str, generation: u64) -> Option<Transition> {
        match self.active.get(id) {
            Some(a) if a.generation == generation => {}
            _ => return None,
        }
        let lapsed = self.active.remove(id)?;
        let name = self.name_of(id).map(str::to_string).unwrap_or_else(|_| id.to_string());
        Some(Transition {
            intersection_id: id.to_string(),
            from: lapsed.mode,
            to: OverrideMode::Automatic,
            cause: TransitionCause::Expired,
            activation: None,
            notice: Notice::new(
                "Override Expired",
                format!("Manual override at {} automatically reset", name),
                NoticeLevel::Warning,
            ),
        })
    }

    /// Lapse everything whose deadline is at or before `now`.
    pub fn expire_due(&mut self, now: DateTime<Utc>) -> Vec<Transition> {
        let mut due: Vec<(String, u64)> = self
            .active
            .iter()
            .filter(|(_, a)| a.expires_at <= now)
            .map(|(id, a)| (id.clone(), a.generation))
            .collect();
        due.sort();
        due.into_iter().filter_map(|(id, gen)| self.expire(&id, gen)).collect()
    }
}

fn activation_notice(action: OperatorAction, name: &str) -> Notice {
    match action {
        OperatorAction::HoldRed => Notice::new(
            "Override Activated",
            format!("Traffic signals at {} held on RED", name),
            NoticeLevel::Warning,
        ),
        OperatorAction::ForceGreen => Notice::new(
            "Override Activated",
            format!("Traffic signals at {} forced to GREEN", name),
            NoticeLevel::Warning,
        ),
        OperatorAction::EmergencyFlash => Notice::new(
            "Emergency Mode",
            format!("Emergency flashing mode activated at {}", name),
            NoticeLevel::Critical,
        ),
        OperatorAction::Reset => Notice::new(
            "System Reset",
            format!("Traffic signals at {} returned to automatic control", name),
            NoticeLevel::Info,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::seed_intersections;
    use chrono::TimeZone;
    use std::time::Duration;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    fn board() -> OverrideBoard {
        OverrideBoard::new(&seed_intersections(), Duration::from_secs(300))
    }

    #[test]
    fn propose_does_not_mutate_until_confirmed() {
        let mut b = board();
        b.propose(OperatorAction::HoldRed, "INT001").unwrap();
        assert_eq!(b.mode("INT001"), OverrideMode::Automatic);
        assert_eq!(b.active_count(), 0);

        let t = b.confirm(t0()).unwrap();
        assert_eq!(t.from, OverrideMode::Automatic);
        assert_eq!(t.to, OverrideMode::HoldRed);
        assert_eq!(t.notice.title, "Override Activated");
        assert_eq!(t.notice.message, "Traffic signals at Main St & 1st Ave held on RED");
        assert_eq!(b.mode("INT001"), OverrideMode::HoldRed);
        assert!(b.pending().is_none());
    }

    #[test]
    fn cancel_discards_pending() {
        let mut b = board();
        b.propose(OperatorAction::ForceGreen, "INT002").unwrap();
        let p = b.cancel().unwrap();
        assert_eq!(p.action, OperatorAction::ForceGreen);
        assert_eq!(b.confirm(t0()), Err(OverrideError::NothingPending));
        assert_eq!(b.mode("INT002"), OverrideMode::Automatic);
    }

    #[test]
    fn one_override_per_intersection() {
        let mut b = board();
        b.propose(OperatorAction::HoldRed, "INT001").unwrap();
        b.confirm(t0()).unwrap();
        assert_eq!(
            b.propose(OperatorAction::ForceGreen, "INT001"),
            Err(OverrideError::AlreadyOverridden {
                intersection_id: "INT001".into(),
                mode: OverrideMode::HoldRed
            })
        );
        // other intersections are independent
        b.propose(OperatorAction::EmergencyFlash, "INT003").unwrap();
        let t = b.confirm(t0()).unwrap();
        assert_eq!(t.notice.title, "Emergency Mode");
        assert_eq!(b.active_count(), 2);
    }

    #[test]
    fn reset_requires_an_override() {
        let mut b = board();
        assert_eq!(
            b.propose(OperatorAction::Reset, "INT004"),
            Err(OverrideError::NotOverridden("INT004".into()))
        );
        assert!(b.pending().is_none());
    }

    #[test]
    fn confirmed_reset_always_yields_automatic() {
        let activations =
            [OperatorAction::HoldRed, OperatorAction::ForceGreen, OperatorAction::EmergencyFlash];
        for action in activations {
            let mut b = board();
            b.propose(action, "INT002").unwrap();
            b.confirm(t0()).unwrap();
            b.propose(OperatorAction::Reset, "INT002").unwrap();
            let t = b.confirm(t0()).unwrap();
            assert_eq!(t.from, action.target());
            assert_eq!(t.to, OverrideMode::Automatic);
            assert_eq!(t.notice.title, "System Reset");
            assert_eq!(b.mode("INT002"), OverrideMode::Automatic);
        }
    }

    #[test]
    fn stale_generation_expiry_is_ignored() {
        let mut b = board();
        b.propose(OperatorAction::HoldRed, "INT001").unwrap();
        let first = b.confirm(t0()).unwrap().activation.unwrap();
        b.propose(OperatorAction::Reset, "INT001").unwrap();
        b.confirm(t0()).unwrap();
        b.propose(OperatorAction::ForceGreen, "INT001").unwrap();
        let second = b.confirm(t0()).unwrap().activation.unwrap();
        assert_ne!(first.generation, second.generation);

        assert!(b.expire("INT001", first.generation).is_none());
        assert_eq!(b.mode("INT001"), OverrideMode::ForceGreen);
        let t = b.expire("INT001", second.generation).unwrap();
        assert_eq!(t.notice.title, "Override Expired");
        assert_eq!(b.mode("INT001"), OverrideMode::Automatic);
        assert!(b.expire("INT001", second.generation).is_none());
    }

    #[test]
    fn expire_due_respects_deadline() {
        let mut b = board();
        b.propose(OperatorAction::HoldRed, "INT001").unwrap();
        b.confirm(t0()).unwrap();
        assert!(b.expire_due(t0() + chrono::Duration::seconds(299)).is_empty());
        let lapsed = b.expire_due(t0() + chrono::Duration::seconds(300));
        assert_eq!(lapsed.len(), 1);
        assert_eq!(lapsed[0].cause, TransitionCause::Expired);
        assert_eq!(b.mode("INT001"), OverrideMode::Automatic);
    }

    #[test]
    fn active_overrides_lists_each_live_deadline() {
        let mut b = board();
        b.propose(OperatorAction::EmergencyFlash, "INT003").unwrap();
        b.confirm(t0()).unwrap();
        b.propose(OperatorAction::HoldRed, "INT001").unwrap();
        b.confirm(t0() + chrono::Duration::seconds(30)).unwrap();

        let live = b.active_overrides();
        let ids: Vec<_> = live.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, ["INT001", "INT003"]);
        assert_eq!(live[0].1.expires_at, t0() + chrono::Duration::seconds(330));
        assert_eq!(live[1].1.expires_at, t0() + chrono::Duration::seconds(300));
    }

    #[test]
    fn reset_pending_when_override_lapsed_is_rejected() {
        let mut b = board();
        b.propose(OperatorAction::HoldRed, "INT001").unwrap();
        b.confirm(t0()).unwrap();
        b.propose(OperatorAction::Reset, "INT001").unwrap();
        b.expire_due(t0() + chrono::Duration::minutes(10));
        assert_eq!(b.confirm(t0()), Err(OverrideError::NotOverridden("INT001".into())));
        assert!(b.pending().is_none());
    }

    #[test]
    fn unknown_intersection_and_double_propose() {
        let mut b = board();
        assert_eq!(
            b.propose(OperatorAction::HoldRed, "INT404"),
            Err(OverrideError::UnknownIntersection("INT404".into()))
        );
        b.propose(OperatorAction::HoldRed, "INT001").unwrap();
        assert!(matches!(
            b.propose(OperatorAction::HoldRed, "INT002"),
            Err(OverrideError::AlreadyPending(_))
        ));
    }
}
