//! Live metrics: a fixed-length window of per-minute samples and the headline
//! figures derived from the newest one.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::draws::Entropy;
use crate::feed::{Panel, SlidingWindow, TickOutput};
use crate::logging::Domain;

/// Headline vehicles = newest sample × this, as a city-wide estimate.
const CITY_SCALE: u32 = 4;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSample {
    /// HH:MM, 24-hour.
    pub time: String,
    pub vehicles: u32,
    pub speed: u32,
    pub congestion: u32,
    pub incidents: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CongestionBand {
    Low,
    Medium,
    High,
}

pub fn congestion_band(level: u32) -> CongestionBand {
    if level < 30 {
        CongestionBand::Low
    } else if level < 60 {
        CongestionBand::Medium
    } else {
        CongestionBand::High
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CurrentMetrics {
    pub total_vehicles: u32,
    pub avg_speed: u32,
    pub congestion_level: u32,
    pub active_incidents: u32,
}

impl CurrentMetrics {
    fn from_sample(s: &MetricSample) -> Self {
        Self {
            total_vehicles: s.vehicles * CITY_SCALE,
            avg_speed: s.speed,
            congestion_level: s.congestion,
            active_incidents: s.incidents,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsState {
    pub window: SlidingWindow<MetricSample>,
    pub current: CurrentMetrics,
}

fn draw_sample(draws: &mut dyn Entropy, at: DateTime<Utc>) -> MetricSample {
    MetricSample {
        time: at.format("%H:%M").to_string(),
        vehicles: draws.int_between(50, 149) as u32,
        speed: draws.int_between(25, 54) as u32,
        congestion: draws.int_between(10, 89) as u32,
        incidents: draws.int_between(0, 4) as u32,
    }
}

#[derive(Debug, Clone)]
pub struct MetricsPanel {
    pub interval: Duration,
    pub window: usize,
}

impl Default for MetricsPanel {
    fn default() -> Self {
        Self { interval: Duration::from_secs(2), window: 30 }
    }
}

impl Panel for MetricsPanel {
    type State = MetricsState;

    fn name(&self) -> &'static str {
        "metrics"
    }

    fn domain(&self) -> Domain {
        Domain::Metrics
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    /// One sample per minute, ending at `now`. Headline figures stay zero
    /// until the first tick.
    fn seed(&self, draws: &mut dyn Entropy, now: DateTime<Utc>) -> MetricsState {
        let mut window = SlidingWindow::new(self.window);
        for i in (0..self.window as i64).rev() {
            window.push(draw_sample(draws, now - chrono::Duration::minutes(i)));
        }
        MetricsState { window, current: CurrentMetrics::default() }
    }

    fn tick(

        &self,

        state: &MetricsState,

        draws: &mut dyn Entropy,

        now: DateTime<Utc>,

    ) -> TickOutput<MetricsState> {
        let mut next = state.clone();
        let sample = draw_sample(draws, now);
        next.current = CurrentMetrics::from_sample(&sample);
        next.window.push(sample);
        TickOutput { next, notices: Vec::new(), touched: 1 }
    }

    fn len(&self, state: &MetricsState) -> usize {
        state.window.len()
    }
}
