//! Peak-hour buckets. Only the bucket marked as the current hour moves.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::draws::Entropy;
use crate::error::DashboardError;
use crate::feed::{Panel, TickOutput};
use crate::logging::Domain;
use crate::metrics::CongestionBand;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeakHourBucket {
    pub hour: String,
    pub avg_vehicles: u32,
    pub avg_wait_time: u32,
    pub congestion_level: CongestionBand,
    pub is_current_hour: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeakState {
    pub buckets: Vec<PeakHourBucket>,
}

impl PeakState {
    pub fn current(&self) -> Option<&PeakHourBucket> {
        self.buckets.iter().find(|b| b.is_current_hour)
    }

    /// Move the current-hour marker; every other bucket loses it.
    pub fn mark_current(&mut self, hour: &str) -> Result<(), DashboardError> {
        if !self.buckets.iter().any(|b| b.hour == hour) {
            return Err(DashboardError::UnknownHour(hour.to_string()));
        }
        for b in self.buckets.iter_mut() {
            b.is_current_hour = b.hour == hour;
        }
        Ok(())
    }

    pub fn high_congestion(&self) -> Vec<&PeakHourBucket> {
        self.buckets
            .iter()
            .filter(|b| b.congestion_level == CongestionBand::High)
            .collect()
    }

    /// Bar height as a percentage of the busiest bucket.
    pub fn bar_height_pct(&self, bucket: &PeakHourBucket) -> f64 {
        let max = self.buckets.iter().map(|b| b.avg_vehicles).max().unwrap_or(0);
        if max == 0 {
            return 0.0;
        }
        bucket.avg_vehicles as f64 / max as f64 * 100.0
    }
}

#[derive(Debug, Clone)]
pub struct PeakPanel {
    pub interval: Duration,
}

impl Default for PeakPanel {
    fn default() -> Self {
        Self { interval: Duration::from_secs(4) }
    }
}

impl Panel for PeakPanel {
    type State = PeakState;

    fn name(&self) -> &'static str {
        "peak"
    }

    fn domain(&self) -> Domain {
        Domain::Peak
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn seed(&self, _draws: &mut dyn Entropy, _now: DateTime<Utc>) -> PeakState {
        use CongestionBand::{High, Low, Medium};
        let rows = [
            ("06:00", 45, 35, Medium),
            ("07:00", 78, 65, High),
            ("08:00", 92, 85, High),
            ("09:00", 65, 45, Medium),
            ("10:00", 42, 28, Low),
            ("11:00", 38, 25, Low),
            ("12:00", 55, 40, Medium),
            ("13:00", 48, 35, Medium),
            ("17:00", 85, 75, High),
            ("18:00", 95, 90, High),
            ("19:00", 72, 55, Medium),
            ("20:00", 45, 32, Low),
        ];
        let buckets = rows
            .iter()
            .map(|&(hour, v, w, level)| PeakHourBucket {
                hour: hour.to_string(),
                avg_vehicles: v,
                avg_wait_time: w,
                congestion_level: level,
                is_current_hour: hour == "09:00",
            })
            .collect();
        PeakState { buckets }
    }

    fn tick(
        &self,
        state: &PeakState,
        draws: &mut dyn Entropy,
        _now: DateTime<Utc>,
    ) -> TickOutput<PeakState> {
        let mut next = state.clone();
        let mut touched = 0;
        if let Some(b) = next.buckets.iter_mut().find(|b| b.is_current_hour) {
            let variation = draws.int_between(-5, 4);
            let wait_delta = (variation as f64 * 0.8).floor() as i64;
            b.avg_vehicles = (b.avg_vehicles as i64 + variation).max(0) as u32;
            b.avg_wait_time = (b.avg_wait_time as i64 + wait_delta).max(0) as u32;
            touched = 1;
        }
        TickOutput { next, notices: Vec::new(), touched }
    }

    fn len(&self, state: &PeakState) -> usize {
        state.buckets.len()
    }
}
