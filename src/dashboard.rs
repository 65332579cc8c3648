//! Coordinator: one session per timed panel, camera state, the override
//! controller, and the selected intersection shared by the views.

use std::sync::Arc;
use std::time::Duration;

use crate::alerts::AlertPanel;
use crate::anpr::AnprPanel;
use crate::cameras::{CameraFeed, CameraState, CameraStatus};
use crate::config::Config;
use crate::draws::SeededDraws;
use crate::error::DashboardError;
use crate::logging::{log, log_periodic_summary, obj, v_str, Domain, Level, PanelSummary};
use crate::map::{render_or_placeholder, MapPanel, MapSurface, MapView};
use crate::metrics::MetricsPanel;
use crate::notify::{LogNotifier, Notifier};
use crate::overrides::{OperatorAction, OverrideError, PendingAction, Transition};
use crate::peak::PeakPanel;
use crate::session::{OverrideController, PanelSession};
use crate::status::StatusPanel;

/// Override target when nothing is selected.
pub const DEFAULT_OVERRIDE_TARGET: &str = "INT001";

pub struct Dashboard {
    pub anpr: PanelSession<AnprPanel>,
    pub alerts: PanelSession<AlertPanel>,
    pub map: PanelSession<MapPanel>,
    pub metrics: PanelSession<MetricsPanel>,
    pub peak: PanelSession<PeakPanel>,
    pub status: PanelSession<StatusPanel>,
    pub cameras: CameraState,
    overrides: OverrideController,
    selected: Option<String>,
}

impl Dashboard {
    /// Notices go to the structured log under each panel's domain.
    pub fn new(cfg: &Config) -> Self {
        Self::build(cfg, |domain| -> Arc<dyn Notifier> { Arc::new(LogNotifier { domain }) })
    }

    /// Every panel and the override controller share one notifier.
    pub fn with_notifier(cfg: &Config, notifier: Arc<dyn Notifier>) -> Self {
        Self::build(cfg, |_| Arc::clone(&notifier))
    }

    fn build(cfg: &Config, notifier_for: impl Fn(Domain) -> Arc<dyn Notifier>) -> Self {
        let secs = Duration::from_secs;
        let draws = |salt| SeededDraws::for_panel(cfg.seed, salt);

        let anpr = AnprPanel {
            interval: secs(cfg.anpr_interval_secs),
            spawn_p: cfg.anpr_spawn_p,
            cap: cfg.anpr_cap,
        };
        let alerts = AlertPanel {
            interval: secs(cfg.alert_interval_secs),
            spawn_p: cfg.alert_spawn_p,
            sound_enabled: cfg.alert_sound,
        };
        let map = MapPanel {
            interval: secs(cfg.map_interval_secs),
            light_change_p: cfg.light_change_p,
        };
        let metrics = MetricsPanel {
            interval: secs(cfg.metrics_interval_secs),
            window: cfg.metrics_window,
        };
        let peak = PeakPanel { interval: secs(cfg.peak_interval_secs) };
        let status = StatusPanel {
            interval: Duration::from_secs(1),
            walk_every: u32::try_from(cfg.status_interval_secs).unwrap_or(u32::MAX),
            raise_p: cfg.status_raise_p,
        };

        let map = PanelSession::new(map, draws(3), notifier_for(Domain::Map));
        let intersections = map.snapshot().intersections;

        Self {
            anpr: PanelSession::new(anpr, draws(1), notifier_for(Domain::Anpr)),
            alerts: PanelSession::new(alerts, draws(2), notifier_for(Domain::Alerts)),
            map,
            metrics: PanelSession::new(metrics, draws(4), notifier_for(Domain::Metrics)),
            peak: PanelSession::new(peak, draws(5), notifier_for(Domain::Peak)),
            status: PanelSession::new(status, draws(6), notifier_for(Domain::Status)),
            cameras: CameraState::seed(),
            overrides: OverrideController::new(
                &intersections,
                cfg.override_duration(),
                notifier_for(Domain::Override),
            ),
            selected: None,
        }
    }

    pub fn start_all(&mut self) {
        self.anpr.start();
        self.alerts.start();
        self.map.start();
        self.metrics.start();
        self.peak.start();
        self.status.start();
        self.overrides.resume();
    }

    /// Stop every panel timer and cancel pending override expiries.
    pub fn stop_all(&mut self) {
        self.anpr.stop();
        self.alerts.stop();
        self.map.stop();
        self.metrics.stop();
        self.peak.stop();
        self.status.stop();
        self.overrides.shutdown();
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Set or clear the selected intersection. Unknown ids are rejected and
    /// leave the selection unchanged.
    pub fn select_intersection(&mut self, id: Option<&str>) -> Result<(), DashboardError> {
        if let Some(id) = id {
            self.map.read(|m| m.name_of(id).map(|_| ()))?;
        }
        self.selected = id.map(str::to_string);
        log(
            Level::Debug,
            Domain::Map,
            "selection",
            obj(&[("intersection_id", v_str(self.selected.as_deref().unwrap_or("none")))]),
        );
        Ok(())
    }

    /// Pick up a marker click from the surface, then draw the current markers.
    pub fn refresh_map(&mut self, surface: &mut dyn MapSurface) -> MapView {
        if let Some(id) = surface.take_selection() {
            if let Err(e) = self.select_intersection(Some(&id)) {
                log(
                    Level::Warn,
                    Domain::Map,
                    "selection_rejected",
                    obj(&[("msg", v_str(&e.to_string()))]),
                );
            }
        }
        let markers = self.map.read(|m| m.markers(self.selected.as_deref()));
        render_or_placeholder(surface, &markers)
    }

    pub fn set_camera_status(
        &mut self,
        camera_id: &str,
        status: CameraStatus,
    ) -> Result<(), DashboardError> {
        self.cameras.set_status(camera_id, status)?;
        log(
            Level::Info,
            Domain::Cameras,
            "status_change",
            obj(&[("record_id", v_str(camera_id)), ("status", v_str(status.as_str()))]),
        );
        Ok(())
    }

    /// Camera feeds for the current selection.
    pub fn camera_view(&self) -> Vec<&CameraFeed> {
        self.cameras.visible(self.selected.as_deref())
    }

    pub fn override_target(&self) -> &str {
        self.selected.as_deref().unwrap_or(DEFAULT_OVERRIDE_TARGET)
    }

    /// Stage an action against the selected intersection.
    pub fn propose_override(&self, action: OperatorAction) -> Result<PendingAction, OverrideError> {
        self.overrides.propose(action, self.override_target())
    }

    pub fn confirm_override(&self) -> Result<Transition, OverrideError> {
        self.overrides.confirm()
    }

    pub fn cancel_override(&self) -> Option<PendingAction> {
        self.overrides.cancel()
    }

    pub fn overrides(&self) -> &OverrideController {
        &self.overrides
    }

    pub fn summaries(&self) -> Vec<PanelSummary> {
        vec![
            self.anpr.summary(),
            self.alerts.summary(),
            self.map.summary(),
            self.metrics.summary(),
            self.peak.summary(),
            self.status.summary(),
        ]
    }

    pub fn log_summary(&self, period_secs: u64) {
        log_periodic_summary(period_secs, &self.summaries(), self.overrides.active_count());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::HeadlessSurface;
    use crate::notify::RecordingNotifier;
    use crate::overrides::OverrideMode;

    fn dashboard() -> (Dashboard, Arc<RecordingNotifier>) {
        let rec = Arc::new(RecordingNotifier::new());
        let cfg = Config { seed: Some(11), ..Config::default() };
        (Dashboard::with_notifier(&cfg, rec.clone()), rec)
    }

    #[test]
    fn selection_drives_camera_view_and_override_target() {
        let (mut d, _) = dashboard();
        assert_eq!(d.camera_view().len(), 4);
        assert_eq!(d.override_target(), "INT001");

        d.select_intersection(Some("INT003")).unwrap();
        let feeds = d.camera_view();
        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].id, "CAM003");
        assert_eq!(d.override_target(), "INT003");

        assert_eq!(
            d.select_intersection(Some("INT999")),
            Err(DashboardError::UnknownIntersection("INT999".into()))
        );
        assert_eq!(d.selected(), Some("INT003"));

        d.select_intersection(None).unwrap();
        assert_eq!(d.selected(), None);
    }

    #[test]
    fn map_click_selects_and_marks() {
        let (mut d, _) = dashboard();
        let mut surface = HeadlessSurface {
            pending_selection: Some("INT002".into()),
            ..HeadlessSurface::default()
        };
        assert_eq!(d.refresh_map(&mut surface), MapView::Rendered { markers: 4 });
        assert_eq!(d.selected(), Some("INT002"));
        let selected: Vec<_> = surface.last_frame.iter().filter(|m| m.selected).collect();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, "INT002");
    }

    #[tokio::test]
    async fn override_uses_selected_intersection() {
        let (mut d, rec) = dashboard();
        d.select_intersection(Some("INT002")).unwrap();
        d.propose_override(OperatorAction::ForceGreen).unwrap();
        assert_eq!(d.overrides().mode("INT002"), OverrideMode::Automatic);
        d.confirm_override().unwrap();
        assert_eq!(d.overrides().mode("INT002"), OverrideMode::ForceGreen);
        assert_eq!(rec.count_titled("Override Activated"), 1);
        d.stop_all();
    }
}
