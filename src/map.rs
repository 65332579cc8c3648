//! Intersection feed and the contract with the map rendering surface.
//!
//! The surface itself is opaque: it receives marker descriptors and hands
//! back selection events. When it cannot render, the panel degrades to a
//! placeholder instead of failing.

use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::draws::Entropy;
use crate::error::DashboardError;
use crate::feed::{Panel, TickOutput};
use crate::logging::{log, obj, v_str, Domain, Level};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Light {
    Red,
    Yellow,
    Green,
}

impl Light {
    /// green → yellow → red → green
    pub fn next(self) -> Light {
        match self {
            Light::Green => Light::Yellow,
            Light::Yellow => Light::Red,
            Light::Red => Light::Green,
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Light::Red => "#ef4444",
            Light::Yellow => "#eab308",
            Light::Green => "#22c55e",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IntersectionStatus {
    Online,
    Offline,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

/// Position on the static city image, in percent of width/height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GridPos {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Intersection {
    pub id: String,
    pub name: String,
    pub coordinates: LatLng,
    pub position: GridPos,
    pub current_light: Light,
    pub vehicle_count: u32,
    pub waiting_time: u32,
    pub queue_length: u32,
    pub status: IntersectionStatus,
}

fn nudge(value: u32, delta: i64) -> u32 {
    (value as i64 + delta).max(0) as u32
}

#[derive(Debug, Clone, Serialize)]
pub struct MapState {
    pub intersections: Vec<Intersection>,
}

impl MapState {
    pub fn get(&self, id: &str) -> Option<&Intersection> {
        self.intersections.iter().find(|i| i.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn name_of(&self, id: &str) -> Result<&str, DashboardError> {
        self.get(id)
            .map(|i| i.name.as_str())
            .ok_or_else(|| DashboardError::UnknownIntersection(id.to_string()))
    }

    pub fn markers(&self, selected: Option<&str>) -> Vec<Marker> {
        self.intersections
            .iter()
            .map(|i| Marker {
                id: i.id.clone(),
                coordinates: i.coordinates,
                color: i.current_light.color(),
                selected: selected == Some(i.id.as_str()),
            })
            .collect()
    }
}

/// Seed intersections shared by the map, camera and override panels.
pub fn seed_intersections() -> Vec<Intersection> {
    let mk = |id: &str, name: &str, lat, lng, x, y, light, v, w, q, status| Intersection {
        id: id.to_string(),
        name: name.to_string(),
        coordinates: LatLng { lat, lng },
        position: GridPos { x, y },
        current_light: light,
        vehicle_count: v,
        waiting_time: w,
        queue_length: q,
        status,
    };
    vec![
        mk(
            "INT001",
            "Main St & 1st Ave",
            40.7128,
            -74.0060,
            25.0,
            30.0,
            Light::Green,
            12,
            45,
            8,
            IntersectionStatus::Online,
        ),
        mk(
            "INT002",
            "Broadway & 42nd St",
            40.7589,
            -73.9851,
            60.0,
            40.0,
            Light::Red,
            28,
            120,
            15,
            IntersectionStatus::Online,
        ),
        mk(
            "INT003",
            "5th Ave & Central Park",
            40.7831,
            -73.9712,
            75.0,
            25.0,
            Light::Yellow,
            19,
            78,
            11,
            IntersectionStatus::Warning,
        ),
        mk(
            "INT004",
            "Wall St & Water St",
            40.7074,
            -74.0113,
            40.0,
            70.0,
            Light::Green,
            7,
            30,
            4,
            IntersectionStatus::Offline,
        ),
    ]
}

#[derive(Debug, Clone)]
pub struct MapPanel {
    pub interval: Duration,
    /// Chance per tick that an intersection's light advances.
    pub light_change_p: f64,
}

impl Default for MapPanel {
    fn default() -> Self {
        Self { interval: Duration::from_secs(2), light_change_p: 0.3 }
    }
}

impl Panel for MapPanel {
    type State = MapState;

    fn name(&self) -> &'static str {
        "map"
    }

    fn domain(&self) -> Domain {
        Domain::Map
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn seed(&self, _draws: &mut dyn Entropy, _now: DateTime<Utc>) -> MapState {
        MapState { intersections: seed_intersections() }
    }

    /// Per intersection, in order: light change, vehicle, waiting, queue deltas.
    fn tick(
        &self,
        state: &MapState,
        draws: &mut dyn Entropy,
        _now: DateTime<Utc>,
    ) -> TickOutput<MapState> {
        let mut changed = 0;
        let intersections = state
            .intersections
            .iter()
            .map(|i| {
                let current_light = if draws.chance(self.light_change_p) {
                    changed += 1;
                    i.current_light.next()
                } else {
                    i.current_light
                };
                Intersection {
                    current_light,
                    vehicle_count: nudge(i.vehicle_count, draws.int_between(-3, 2)),
                    waiting_time: nudge(i.waiting_time, draws.int_between(-10, 9)),
                    queue_length: nudge(i.queue_length, draws.int_between(-2, 1)),
                    ..i.clone()
                }
            })
            .collect();
        TickOutput { next: MapState { intersections }, notices: Vec::new(), touched: changed }
    }

    fn len(&self, state: &MapState) -> usize {
        state.intersections.len()
    }
}

// =============================================================================
// Rendering surface
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub id: String,
    pub coordinates: LatLng,
    pub color: &'static str,
    pub selected: bool,
}

pub trait MapSurface {
    fn render(&mut self, markers: &[Marker]) -> Result<()>;

    /// Marker the operator clicked since the last call, if any.
    fn take_selection(&mut self) -> Option<String>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum MapView {
    Rendered { markers: usize },
    Placeholder { reason: String },
}

/// Render through the surface, falling back to a placeholder on failure.
pub fn render_or_placeholder(surface: &mut dyn MapSurface, markers: &[Marker]) -> MapView {
    match surface.render(markers) {
        Ok(()) => MapView::Rendered { markers: markers.len() },
        Err(e) => {
            log(
                Level::Warn,
                Domain::Map,
                "surface_unavailable",
                obj(&[("msg", v_str(&e.to_string()))]),
            );
            MapView::Placeholder { reason: e.to_string() }
        }
    }
}

/// In-memory surface that records the last frame it was given.
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    pub last_frame: Vec<Marker>,
    pub pending_selection: Option<String>,
}

impl MapSurface for HeadlessSurface {
    fn render(&mut self, markers: &[Marker]) -> Result<()> {
        self.last_frame = markers.to_vec();
        Ok(())
    }

    fn take_selection(&mut self) -> Option<String> {
        self.pending_selection.take()
    }
}
