//! Simulated traffic-operations dashboard core: timed panel feeds, manual
//! signal overrides, and the views derived from them.

pub mod alerts;
pub mod anpr;
pub mod cameras;
pub mod config;
pub mod dashboard;
pub mod draws;
pub mod error;
pub mod feed;
pub mod logging;
pub mod map;
pub mod metrics;
pub mod notify;
pub mod overrides;
pub mod peak;
pub mod projection;
pub mod session;
pub mod status;
