//! Detection-and-alert control loop.
//!
//! The [`Monitor`] resolves the stream once, then repeatedly reads a frame,
//! runs the detector and lets the [`AlertGate`] decide whether the first
//! qualifying detection may be announced.

mod gate;
mod service;

pub use gate::AlertGate;
pub use service::{
    Monitor, MonitorConfig, MonitorOutcome, MonitorPhase, MonitorStats, format_alert_message,
};
