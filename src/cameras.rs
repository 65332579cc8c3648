//! Camera feed placeholders. Not timer-driven: status only changes through
//! operator actions, and an offline camera always reports 0 fps.

use serde::Serialize;

use crate::error::DashboardError;

/// Feeds shown when no intersection is selected.
const DEFAULT_VISIBLE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraStatus {
    Live,
    Offline,
    Recording,
}

impl CameraStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CameraStatus::Live => "live",
            CameraStatus::Offline => "offline",
            CameraStatus::Recording => "recording",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CameraFeed {
    pub id: String,
    pub name: String,
    pub intersection_id: String,
    pub status: CameraStatus,
    pub quality: String,
    pub fps: u32,
    /// Frame rate restored when the camera comes back online.
    #[serde(skip)]
    nominal_fps: u32,
}

impl CameraFeed {
    fn new(
        id: &str,
        name: &str,
        intersection_id: &str,
        status: CameraStatus,
        quality: &str,
        fps: u32,
    ) -> Self {
        let mut feed = Self {
            id: id.to_string(),
            name: name.to_string(),
            intersection_id: intersection_id.to_string(),
            status,
            quality: quality.to_string(),
            fps: 0,
            nominal_fps: fps.max(1),
        };
        feed.set_status(status);
        feed
    }

    fn set_status(&mut self, status: CameraStatus) {
        self.status = status;
        self.fps = match status {
            CameraStatus::Offline => 0,
            CameraStatus::Live | CameraStatus::Recording => self.nominal_fps,
        };
    }
}

/// Grid shading pattern for a placeholder frame, stable per camera id.
pub fn placeholder_pattern(camera_id: &str) -> u32 {
    camera_id.chars().map(|c| c as u32).sum::<u32>() % 4
}

#[derive(Debug, Clone, Serialize)]
pub struct CameraState {
    pub feeds: Vec<CameraFeed>,
    pub expanded: Option<String>,
}

impl CameraState {
    pub fn seed() -> Self {
        Self {
            feeds: vec![
                CameraFeed::new(
                    "CAM001",
                    "Main St North View",
                    "INT001",
                    CameraStatus::Live,
                    "1080p",
                    30,
                ),
                CameraFeed::new(
                    "CAM002",
                    "Broadway South View",
                    "INT002",
                    CameraStatus::Live,
                    "720p",
                    25,
                ),
                CameraFeed::new(
                    "CAM003",
                    "5th Ave East View",
                    "INT003",
                    CameraStatus::Offline,
                    "1080p",
                    30,
                ),
                CameraFeed::new(
                    "CAM004",
                    "Wall St West View",
                    "INT004",
                    CameraStatus::Recording,
                    "4K",
                    60,
                ),
            ],
            expanded: None,
        }
    }

    fn find_mut(&mut self, id: &str) -> Result<&mut CameraFeed, DashboardError> {
        self.feeds
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| DashboardError::UnknownCamera(id.to_string()))
    }

    pub fn set_status(&mut self, id: &str, status: CameraStatus) -> Result<(), DashboardError> {
        self.find_mut(id)?.set_status(status);
        Ok(())
    }

    /// Expand a feed, or collapse it if it is already expanded. Offline feeds
    /// cannot be expanded.
    pub fn toggle_expanded(&mut self, id: &str) -> Result<Option<&str>, DashboardError> {
        let feed = self.find_mut(id)?;
        let offline = feed.status == CameraStatus::Offline;
        if self.expanded.as_deref() == Some(id) || offline {
            self.expanded = None;
        } else {
            self.expanded = Some(id.to_string());
        }
        Ok(self.expanded.as_deref())
    }

    pub fn visible(&self, selected: Option<&str>) -> Vec<&CameraFeed> {
        match selected {
            Some(sel) => self.feeds.iter().filter(|f| f.intersection_id == sel).collect(),
            None => self.feeds.iter().take(DEFAULT_VISIBLE).collect(),
        }
    }

    pub fn live_count(&self, selected: Option<&str>) -> usize {
        self.visible(selected)
            .iter()
            .filter(|f| f.status == CameraStatus::Live)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> CameraState {
        CameraState::seed()
    }

    fn fps_matches_status(state: &CameraState) -> bool {
        state
            .feeds
            .iter()
            .all(|f| (f.fps == 0) == (f.status == CameraStatus::Offline))
    }

    #[test]
    fn seed_respects_fps_invariant() {
        let state = seeded();
        assert!(fps_matches_status(&state));
        assert_eq!(state.feeds[2].fps, 0);
        assert_eq!(state.feeds[3].fps, 60);
    }

    #[test]
    fn status_changes_keep_fps_consistent() {
        let mut state = seeded();
        state.set_status("CAM001", CameraStatus::Offline).unwrap();
        assert!(fps_matches_status(&state));
        state.set_status("CAM003", CameraStatus::Live).unwrap();
        assert_eq!(state.feeds[2].fps, 30);
        state.set_status("CAM001", CameraStatus::Recording).unwrap();
        assert_eq!(state.feeds[0].fps, 30);
        assert!(fps_matches_status(&state));
        assert_eq!(
            state.set_status("CAM009", CameraStatus::Live),
            Err(DashboardError::UnknownCamera("CAM009".into()))
        );
    }

    #[test]
    fn visible_feeds_follow_selection() {
        let state = seeded();
        assert_eq!(state.visible(None).len(), 4);
        let sel = state.visible(Some("INT002"));
        assert_eq!(sel.len(), 1);
        assert_eq!(sel[0].id, "CAM002");
        assert!(state.visible(Some("INT404")).is_empty());
        assert_eq!(state.live_count(None), 2);
        assert_eq!(state.live_count(Some("INT003")), 0);
    }

    #[test]
    fn expand_toggles_and_skips_offline() {
        let mut state = seeded();
        assert_eq!(state.toggle_expanded("CAM001").unwrap(), Some("CAM001"));
        assert_eq!(state.toggle_expanded("CAM001").unwrap(), None);
        assert_eq!(state.toggle_expanded("CAM003").unwrap(), None);
    }

    #[test]
    fn placeholder_pattern_is_stable() {
        // 'C'+'A'+'M'+'0'+'0'+'1' = 67+65+77+48+48+49 = 354
        assert_eq!(placeholder_pattern("CAM001"), 354 % 4);
        assert_eq!(placeholder_pattern("CAM001"), placeholder_pattern("CAM001"));
    }
}
