use std::time::Duration;

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

const PANEL_SECS_MIN: u64 = 2;
const PANEL_SECS_MAX: u64 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    /// Base seed; unset means every panel draws from OS entropy.
    pub seed: Option<u64>,
    /// How long the headless driver runs; 0 runs until Ctrl-C.
    pub run_secs: u64,
    pub summary_secs: u64,
    pub anpr_interval_secs: u64,
    pub anpr_spawn_p: f64,
    pub anpr_cap: usize,
    pub alert_interval_secs: u64,
    pub alert_spawn_p: f64,
    pub alert_sound: bool,
    pub map_interval_secs: u64,
    pub light_change_p: f64,
    pub metrics_interval_secs: u64,
    pub metrics_window: usize,
    pub peak_interval_secs: u64,
    /// Period of the status counter walk; the header clock itself refreshes every second.
    pub status_interval_secs: u64,
    pub status_raise_p: f64,
    pub override_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seed: None,
            run_secs: 60,
            summary_secs: 15,
            anpr_interval_secs: 3,
            anpr_spawn_p: 0.4,
            anpr_cap: 50,
            alert_interval_secs: 10,
            alert_spawn_p: 0.15,
            alert_sound: true,
            map_interval_secs: 2,
            light_change_p: 0.3,
            metrics_interval_secs: 2,
            metrics_window: 30,
            peak_interval_secs: 4,
            status_interval_secs: 5,
            status_raise_p: 0.3,
            override_secs: 300,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            seed: std::env::var("SIM_SEED").ok().and_then(|v| v.parse().ok()),
            run_secs: env_parse("RUN_SECS", d.run_secs),
            summary_secs: env_parse("SUMMARY_SECS", d.summary_secs),
            anpr_interval_secs: env_parse("ANPR_INTERVAL_SECS", d.anpr_interval_secs),
            anpr_spawn_p: env_parse("ANPR_SPAWN_P", d.anpr_spawn_p),
            anpr_cap: env_parse("ANPR_CAP", d.anpr_cap),
            alert_interval_secs: env_parse("ALERT_INTERVAL_SECS", d.alert_interval_secs),
            alert_spawn_p: env_parse("ALERT_SPAWN_P", d.alert_spawn_p),
            alert_sound: std::env::var("ALERT_SOUND")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(d.alert_sound),
            map_interval_secs: env_parse("MAP_INTERVAL_SECS", d.map_interval_secs),
            light_change_p: env_parse("LIGHT_CHANGE_P", d.light_change_p),
            metrics_interval_secs: env_parse("METRICS_INTERVAL_SECS", d.metrics_interval_secs),
            metrics_window: env_parse("METRICS_WINDOW", d.metrics_window),
            peak_interval_secs: env_parse("PEAK_INTERVAL_SECS", d.peak_interval_secs),
            status_interval_secs: env_parse("STATUS_INTERVAL_SECS", d.status_interval_secs),
            status_raise_p: env_parse("STATUS_RAISE_P", d.status_raise_p),
            override_secs: env_parse("OVERRIDE_SECS", d.override_secs),
        }
        .sanitized()
    }

    /// Clamp probabilities into [0, 1], panel cadences into 2..=10 s, and keep
    /// the remaining periods and sizes non-zero.
    pub fn sanitized(mut self) -> Self {
        for p in [
            &mut self.anpr_spawn_p,
            &mut self.alert_spawn_p,
            &mut self.light_change_p,
            &mut self.status_raise_p,
        ] {
            *p = if p.is_finite() { (*p).clamp(0.0, 1.0) } else { 0.0 };
        }
        for secs in [
            &mut self.anpr_interval_secs,
            &mut self.alert_interval_secs,
            &mut self.map_interval_secs,
            &mut self.metrics_interval_secs,
            &mut self.peak_interval_secs,
            &mut self.status_interval_secs,
        ] {
            *secs = (*secs).clamp(PANEL_SECS_MIN, PANEL_SECS_MAX);
        }
        for secs in [&mut self.summary_secs, &mut self.override_secs] {
            *secs = (*secs).max(1);
        }
        self.anpr_cap = self.anpr_cap.max(1);
        self.metrics_window = self.metrics_window.max(1);
        self
    }

    pub fn override_duration(&self) -> Duration {
        Duration::from_secs(self.override_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_dashboard_cadence() {
        let cfg = Config::default();
        assert_eq!(cfg.anpr_cap, 50);
        assert_eq!(cfg.metrics_window, 30);
        assert_eq!(cfg.override_duration(), Duration::from_secs(300));
        assert!((2..=10).contains(&cfg.anpr_interval_secs));
        assert!((2..=10).contains(&cfg.alert_interval_secs));
    }

    #[test]
    fn sanitized_clamps_out_of_range_values() {
        let cfg = Config {
            anpr_spawn_p: 3.0,
            light_change_p: f64::NAN,
            map_interval_secs: 0,
            anpr_cap: 0,
            ..Config::default()
        }
        .sanitized();
        assert_eq!(cfg.anpr_spawn_p, 1.0);
        assert_eq!(cfg.light_change_p, 0.0);
        assert_eq!(cfg.map_interval_secs, 2);
        assert_eq!(cfg.anpr_cap, 1);
    }

    #[test]
    fn panel_cadences_stay_within_two_to_ten_seconds() {
        let cfg = Config {
            anpr_interval_secs: 1,
            alert_interval_secs: 60,
            peak_interval_secs: 11,
            status_interval_secs: 0,
            summary_secs: 120,
            override_secs: 900,
            ..Config::default()
        }
        .sanitized();
        assert_eq!(cfg.anpr_interval_secs, 2);
        assert_eq!(cfg.alert_interval_secs, 10);
        assert_eq!(cfg.peak_interval_secs, 10);
        assert_eq!(cfg.status_interval_secs, 2);
        assert_eq!(cfg.metrics_interval_secs, 2);
        // non-panel periods are only kept non-zero
        assert_eq!(cfg.summary_secs, 120);
        assert_eq!(cfg.override_secs, 900);
    }
}
