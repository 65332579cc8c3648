use std::fmt;

/// Operator action against a record that does not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardError {
    UnknownAlert(String),
    UnknownCamera(String),
    UnknownIntersection(String),
    UnknownHour(String),
}

impl fmt::Display for DashboardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DashboardError::UnknownAlert(id) => write!(f, "unknown alert: {}", id),
            DashboardError::UnknownCamera(id) => write!(f, "unknown camera: {}", id),
            DashboardError::UnknownIntersection(id) => write!(f, "unknown intersection: {}", id),
            DashboardError::UnknownHour(label) => write!(f, "no peak-hour bucket for {}", label),
        }
    }
}

impl std::error::Error for DashboardError {}
