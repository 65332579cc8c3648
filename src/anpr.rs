//! Simulated plate-recognition feed.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::draws::{pick, Entropy};
use crate::feed::{CappedFeed, Panel, TickOutput};
use crate::logging::Domain;
use crate::projection::Projection;

const PLATE_POOL: [&str; 10] = [
    "JKL345", "MNO678", "PQR901", "STU234", "VWX567", "YZA890", "BCD123", "EFG456", "HIJ789",
    "KLM012",
];

const LOCATIONS: [&str; 4] = [
    "Main St & 1st Ave",
    "Broadway & 42nd St",
    "5th Ave & Central Park",
    "Wall St & Water St",
];

const CAMERAS: [&str; 4] = ["CAM001", "CAM002", "CAM003", "CAM004"];

const FLAG_REASONS: [&str; 2] = ["Watchlist Match", "Traffic Violation"];

const FLAG_P: f64 = 0.15;

/// Detections younger than this count as recent.
pub const RECENT_WINDOW_SECS: i64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleType {
    Car,
    Truck,
    Motorcycle,
    Bus,
}

impl VehicleType {
    pub const ALL: [VehicleType; 4] =
        [VehicleType::Car, VehicleType::Truck, VehicleType::Motorcycle, VehicleType::Bus];

    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleType::Car => "car",
            VehicleType::Truck => "truck",
            VehicleType::Motorcycle => "motorcycle",
            VehicleType::Bus => "bus",
        }
    }
}

impl FromStr for VehicleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "car" => Ok(VehicleType::Car),
            "truck" => Ok(VehicleType::Truck),
            "motorcycle" => Ok(VehicleType::Motorcycle),
            "bus" => Ok(VehicleType::Bus),
            other => Err(format!("unknown vehicle type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlateDetection {
    pub id: String,
    pub plate_number: String,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
    pub location: String,
    pub camera_id: String,
    pub vehicle_type: VehicleType,
    pub flagged: bool,
    /// Present only on flagged detections.
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

pub fn confidence_band(confidence: f64) -> ConfidenceBand {
    if confidence >= 0.9 {
        ConfidenceBand::High
    } else if confidence >= 0.8 {
        ConfidenceBand::Medium
    } else {
        ConfidenceBand::Low
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnprState {
    pub detections: CappedFeed<PlateDetection>,
    next_id: u64,
}

impl AnprState {
    fn allocate_id(&mut self) -> String {
        let id = format!("DET{:03}", self.next_id);
        self.next_id += 1;
        id
    }

    pub fn flagged_count(&self) -> usize {
        self.detections.iter().filter(|d| d.flagged).count()
    }

    /// Share of detections read with high confidence, as a percentage.
    /// An empty feed reports 0.
    pub fn high_confidence_pct(&self) -> f64 {
        if self.detections.is_empty() {
            return 0.0;
        }
        let high = self
            .detections
            .iter()
            .filter(|d| confidence_band(d.confidence) == ConfidenceBand::High)
            .count();
        high as f64 / self.detections.len() as f64 * 100.0
    }

    pub fn recent_count(&self, now: DateTime<Utc>) -> usize {
        self.detections
            .iter()
            .filter(|d| (now - d.timestamp).num_seconds() < RECENT_WINDOW_SECS)
            .count()
    }
}

/// Search/filter controls of the detection table.
#[derive(Debug, Clone, Default)]
pub struct DetectionFilter {
    pub plate_query: String,
    pub vehicle_type: Option<VehicleType>,
    pub flagged_only: bool,
}

impl DetectionFilter {
    pub fn apply<'s>(&self, state: &'s AnprState) -> Vec<&'s PlateDetection> {
        Projection::new()
            .search(self.plate_query.as_str(), |d: &PlateDetection| d.plate_number.as_str())
            .category(self.vehicle_type, |d: &PlateDetection| d.vehicle_type)
            .flag(self.flagged_only, |d: &PlateDetection| d.flagged)
            .apply(state.detections.iter())
    }
}

#[derive(Debug, Clone)]
pub struct AnprPanel {
    pub interval: Duration,
    pub spawn_p: f64,
    pub cap: usize,
}

impl Default for AnprPanel {
    fn default() -> Self {
        Self { interval: Duration::from_secs(3), spawn_p: 0.4, cap: 50 }
    }
}

impl AnprPanel {
    /// Draw order: plate, confidence, location, camera, vehicle type, flag, reason.
    fn draw_detection(
        &self,
        state: &mut AnprState,
        draws: &mut dyn Entropy,
        now: DateTime<Utc>,
    ) -> PlateDetection {
        let plate_number = pick(draws, &PLATE_POOL).to_string();
        let confidence = draws.float_between(0.7, 1.0);
        let location = pick(draws, &LOCATIONS).to_string();
        let camera_id = pick(draws, &CAMERAS).to_string();
        let vehicle_type = *pick(draws, &VehicleType::ALL);
        let flagged = draws.chance(FLAG_P);
        let reason = if flagged { Some(pick(draws, &FLAG_REASONS).to_string()) } else { None };
        PlateDetection {
            id: state.allocate_id(),
            plate_number,
            confidence,
            timestamp: now,
            location,
            camera_id,
            vehicle_type,
            flagged,
            reason,
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn sample(
    id: &str,
    plate: &str,
    confidence: f64,
    age_secs: i64,
    location: &str,
    camera: &str,
    vehicle_type: VehicleType,
    reason: Option<&str>,
    now: DateTime<Utc>,
) -> PlateDetection {
    PlateDetection {
        id: id.to_string(),
        plate_number: plate.to_string(),
        confidence,
        timestamp: now - chrono::Duration::seconds(age_secs),
        location: location.to_string(),
        camera_id: camera.to_string(),
        vehicle_type,
        flagged: reason.is_some(),
        reason: reason.map(str::to_string),
    }
}

impl Panel for AnprPanel {
    type State = AnprState;

    fn name(&self) -> &'static str {
        "anpr"
    }

    fn domain(&self) -> Domain {
        Domain::Anpr
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn seed(&self, _draws: &mut dyn Entropy, now: DateTime<Utc>) -> AnprState {
        let seeded = vec![
            sample(
                "DET001",
                "ABC123",
                0.95,
                30,
                LOCATIONS[0],
                "CAM001",
                VehicleType::Car,
                Some("Stolen Vehicle"),
                now,
            ),
            sample(
                "DET002",
                "XYZ789",
                0.87,
                120,
                LOCATIONS[1],
                "CAM002",
                VehicleType::Truck,
                None,
                now,
            ),
            sample(
                "DET003",
                "DEF456",
                0.92,
                180,
                LOCATIONS[2],
                "CAM003",
                VehicleType::Car,
                Some("Outstanding Warrant"),
                now,
            ),
            sample(
                "DET004",
                "GHI012",
                0.78,
                300,
                LOCATIONS[3],
                "CAM004",
                VehicleType::Motorcycle,
                None,
                now,
            ),
        ];
        AnprState {
            detections: CappedFeed::from_newest_first(seeded, Some(self.cap)),
            next_id: 5,
        }
    }

    fn tick(

        &self,

        state: &AnprState,

        draws: &mut dyn Entropy,

        now: DateTime<Utc>,

    ) -> TickOutput<AnprState> {
        let mut next = state.clone();
        if !draws.chance(self.spawn_p) {
            return TickOutput::quiet(next);
        }
        let detection = self.draw_detection(&mut next, draws, now);
        next.detections.prepend(detection);
        TickOutput { next, notices: Vec::new(), touched: 1 }
    }

    fn len(&self, state: &AnprState) -> usize {
        state.detections.len()
    }
}
