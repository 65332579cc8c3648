//! Notification surface: fire-and-forget toasts raised by ticks and operator
//! actions.

use std::sync::Mutex;

use serde::Serialize;

use crate::logging::{log_notice, Domain};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Critical,
}

impl NoticeLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoticeLevel::Info => "info",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub title: String,
    pub message: String,
    pub level: NoticeLevel,
}

impl Notice {
    pub fn new(title: impl Into<String>, message: impl Into<String>, level: NoticeLevel) -> Self {
        Self { title: title.into(), message: message.into(), level }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, message: &str, level: NoticeLevel);
}

pub fn deliver(notifier: &dyn Notifier, notices: &[Notice]) {
    for n in notices {
        notifier.notify(&n.title, &n.message, n.level);
    }
}

/// Writes notices to the structured log under one domain.
#[derive(Debug, Clone, Copy)]
pub struct LogNotifier {
    pub domain: Domain,
}

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, message: &str, level: NoticeLevel) {
        log_notice(self.domain, title, message, level.as_str());
    }
}

/// Keeps every notice it receives.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    seen: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.seen.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn count_titled(&self, title: &str) -> usize {
        self.notices().iter().filter(|n| n.title == title).count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, title: &str, message: &str, level: NoticeLevel) {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(Notice::new(title, message, level));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_notifier_keeps_order() {
        let rec = RecordingNotifier::new();
        deliver(
            &rec,
            &[
                Notice::new("A", "first", NoticeLevel::Info),
                Notice::new("B", "second", NoticeLevel::Critical),
            ],
        );
        let seen = rec.notices();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].title, "A");
        assert_eq!(seen[1].level, NoticeLevel::Critical);
        assert_eq!(rec.count_titled("B"), 1);
    }
}
