//! Structured logging for the simulated operations dashboard.
//!
//! Every record is a single JSON line carrying a run id, a monotonically
//! increasing sequence number and the panel domain that produced it, so a run
//! can be filtered per panel and replayed in order.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

// =============================================================================
// Log Levels
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Fatal = 5,
}

impl Level {
    pub fn from_env() -> Self {
        match std::env::var("LOG_LEVEL").as_deref() {
            Ok("trace") => Level::Trace,
            Ok("debug") => Level::Debug,
            Ok("info") => Level::Info,
            Ok("warn") => Level::Warn,
            Ok("error") => Level::Error,
            Ok("fatal") => Level::Fatal,
            _ => Level::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
        }
    }
}

// =============================================================================
// Log Domains (one per panel, plus system-level categories)
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Anpr,     // Plate detections
    Alerts,   // Alert feed, acknowledgements
    Map,      // Intersections, light cycles, selection
    Metrics,  // Live metric window
    Peak,     // Peak-hour buckets
    Cameras,  // Camera feed status
    Status,   // Header status bar
    Override, // Manual signal overrides
    Session,  // Timer lifecycle
    System,   // Startup, shutdown, summaries
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Anpr => "anpr",
            Domain::Alerts => "alerts",
            Domain::Map => "map",
            Domain::Metrics => "metrics",
            Domain::Peak => "peak",
            Domain::Cameras => "cameras",
            Domain::Status => "status",
            Domain::Override => "override",
            Domain::Session => "session",
            Domain::System => "system",
        }
    }

    pub fn is_enabled(&self) -> bool {
        // LOG_DOMAINS is a comma-separated list or "all"
        match std::env::var("LOG_DOMAINS").as_deref() {
            Ok("all") | Err(_) => true,
            Ok(domains) => domains.split(',').any(|d| d.trim() == self.as_str()),
        }
    }
}

// =============================================================================
// Run context
// =============================================================================

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);
static RUN_CONTEXT: OnceLock<RunContext> = OnceLock::new();

fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst)
}

#[derive(Debug)]
struct RunContext {
    run_id: String,
    events: Option<Mutex<BufWriter<File>>>,
}

fn ensure_run_context() -> &'static RunContext {
    RUN_CONTEXT.get_or_init(|| {
        let run_id = std::env::var("RUN_ID")
            .unwrap_or_else(|_| format!("r-{}-{}", ts_epoch_ms(), process::id()));
        // File output is opt-in; stdout always receives every record.
        let events = std::env::var("LOG_DIR").ok().and_then(|base| {
            let mut run_dir = PathBuf::from(base);
            run_dir.push(&run_id);
            if let Err(err) = create_dir_all(&run_dir) {
                eprintln!("[log] failed to create run dir: {}", err);
                return None;
            }
            match File::create(run_dir.join("events.jsonl")) {
                Ok(file) => Some(Mutex::new(BufWriter::new(file))),
                Err(err) => {
                    eprintln!("[log] failed to create events log: {}", err);
                    None
                }
            }
        });
        RunContext { run_id, events }
    })
}

fn split_fields(mut fields: Map<String, Value>) -> (Map<String, Value>, Map<String, Value>) {
    let mut top = Map::new();
    for key in ["panel", "intersection_id", "record_id", "msg"] {
        if let Some(value) = fields.remove(key) {
            top.insert(key.to_string(), value);
        }
    }
    (top, fields)
}

fn write_line(writer: &Mutex<BufWriter<File>>, line: &str) {
    if let Ok(mut w) = writer.lock() {
        let _ = writeln!(w, "{}", line);
        let _ = w.flush();
    }
}

// =============================================================================
// Core logging functions
// =============================================================================

/// RFC3339 timestamp with milliseconds
pub fn ts_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Epoch milliseconds
pub fn ts_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

/// Emit a structured log entry
pub fn log(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    let min_level = Level::from_env();
    if level < min_level || !domain.is_enabled() {
        return;
    }

    emit_record(level, domain.as_str(), event, fields);
}

fn emit_record(level: Level, component: &str, event: &str, fields: Map<String, Value>) {
    let ctx = ensure_run_context();
    let (mut top, data) = split_fields(fields);

    let msg = top.remove("msg").unwrap_or(Value::String(String::new()));
    let mut entry = Map::new();
    entry.insert("ts".to_string(), json!(ts_now()));
    entry.insert("run_id".to_string(), json!(ctx.run_id.clone()));
    entry.insert("seq".to_string(), json!(next_seq()));
    entry.insert("lvl".to_string(), json!(level.as_str().to_uppercase()));
    entry.insert("component".to_string(), json!(component));
    entry.insert("event".to_string(), json!(event));
    entry.insert("msg".to_string(), msg);
    for (k, v) in top {
        entry.insert(k, v);
    }
    entry.insert("data".to_string(), Value::Object(data));

    let line = Value::Object(entry).to_string();
    if let Some(events) = &ctx.events {
        write_line(events, &line);
    }
    println!("{}", line);
}

// =============================================================================
// Domain-specific helpers
// =============================================================================

/// Timer lifecycle of one panel session.
pub fn log_session(panel: &str, event: &str, interval_ms: u64) {
    log(
        Level::Info,
        Domain::Session,
        event,
        obj(&[("panel", v_str(panel)), ("interval_ms", json!(interval_ms))]),
    );
}

/// A notice delivered to the notification surface.
pub fn log_notice(domain: Domain, title: &str, message: &str, severity: &str) {
    log(
        Level::Info,
        domain,
        "notice",
        obj(&[
            ("msg", v_str(message)),
            ("title", v_str(title)),
            ("severity", v_str(severity)),
        ]),
    );
}

pub fn log_override_transition(intersection_id: &str, from: &str, to: &str, cause: &str) {
    log(
        Level::Info,
        Domain::Override,
        "transition",
        obj(&[
            ("intersection_id", v_str(intersection_id)),
            ("from", v_str(from)),
            ("to", v_str(to)),
            ("cause", v_str(cause)),
        ]),
    );
}

#[derive(Debug, Clone)]
pub struct PanelSummary {
    pub panel: &'static str,
    pub records: usize,
    pub ticks: u64,
    pub running: bool,
}

/// Periodic summary for aggregation
pub fn log_periodic_summary(period_secs: u64, panels: &[PanelSummary], active_overrides: usize) {
    let panel_json: Vec<Value> = panels
        .iter()
        .map(|p| {
            json!({
                "panel": p.panel,
                "records": p.records,
                "ticks": p.ticks,
                "running": p.running,
            })
        })
        .collect();

    log(
        Level::Info,
        Domain::System,
        "periodic_summary",
        obj(&[
            ("period_secs", json!(period_secs)),
            ("panels", Value::Array(panel_json)),
            ("active_overrides", json!(active_overrides)),
        ]),
    );
}

pub fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert((*k).to_string(), v.clone());
    }
    map
}

pub fn v_str(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn v_num(n: f64) -> Value {
    json!(n)
}

// =============================================================================
// Aggregated counters for periodic summaries
// =============================================================================

static AGGREGATOR: OnceLock<Mutex<LogAggregator>> = OnceLock::new();

fn get_aggregator() -> &'static Mutex<LogAggregator> {
    AGGREGATOR.get_or_init(|| Mutex::new(LogAggregator::new()))
}

struct LogAggregator {
    detections: u64,
    alerts: u64,
    notices: u64,
    light_changes: u64,
    last_flush: Instant,
    flush_interval_secs: u64,
}

impl LogAggregator {
    fn new() -> Self {
        Self {
            detections: 0,
            alerts: 0,
            notices: 0,
            light_changes: 0,
            last_flush: Instant::now(),
            flush_interval_secs: std::env::var("LOG_FLUSH_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
        }
    }

    fn increment(&mut self, event: &str, by: u64) {
        match event {
            "detection" => self.detections += by,
            "alert" => self.alerts += by,
            "notice" => self.notices += by,
            "light_change" => self.light_changes += by,
            _ => {}
        }
    }

    fn maybe_flush(&mut self) -> Option<(u64, u64, u64, u64)> {
        if self.last_flush.elapsed().as_secs() >= self.flush_interval_secs {
            let result = (self.detections, self.alerts, self.notices, self.light_changes);
            self.detections = 0;
            self.alerts = 0;
            self.notices = 0;
            self.light_changes = 0;
            self.last_flush = Instant::now();
            Some(result)
        } else {
            None
        }
    }
}

/// Call periodically to emit aggregated stats
pub fn tick_aggregator() {
    if let Ok(mut agg) = get_aggregator().lock() {
        if let Some((detections, alerts, notices, light_changes)) = agg.maybe_flush() {
            log(
                Level::Info,
                Domain::System,
                "aggregated_stats",
                obj(&[
                    ("detections", json!(detections)),
                    ("alerts", json!(alerts)),
                    ("notices", json!(notices)),
                    ("light_changes", json!(light_changes)),
                ]),
            );
        }
    }
}

/// Increment a counter in the aggregator
pub fn agg_increment(event: &str, by: u64) {
    if by == 0 {
        return;
    }
    if let Ok(mut agg) = get_aggregator().lock() {
        agg.increment(event, by);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(Level::Trace < Level::Debug);
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warn);
        assert!(Level::Warn < Level::Error);
        assert!(Level::Error < Level::Fatal);
    }

    #[test]
    fn test_obj_helper() {
        let m = obj(&[("key", v_str("value")), ("num", v_num(42.0))]);
        assert_eq!(m.get("key").unwrap(), "value");
        assert_eq!(m.get("num").unwrap(), 42.0);
    }

    #[test]
    fn test_split_fields_promotes_panel_keys() {
        let fields = obj(&[
            ("panel", v_str("anpr")),
            ("intersection_id", v_str("INT001")),
            ("vehicles", v_num(3.0)),
        ]);
        let (top, data) = split_fields(fields);
        assert_eq!(top.get("panel").unwrap(), "anpr");
        assert_eq!(top.get("intersection_id").unwrap(), "INT001");
        assert!(data.contains_key("vehicles"));
        assert!(!data.contains_key("panel"));
    }

    #[test]
    fn test_aggregator_ignores_unknown_events() {
        let mut agg = LogAggregator::new();
        agg.increment("detection", 2);
        agg.increment("bogus", 5);
        assert_eq!(agg.detections, 2);
        assert_eq!(agg.alerts, 0);
    }

    #[test]
    fn test_seq_increments() {
        let s1 = next_seq();
        let s2 = next_seq();
        assert!(s2 > s1);
    }
}
