//! zoowatch library crate.
//!
//! Polls a live stream, runs an object detector over sampled frames and sends
//! an alert when the target class shows up, at most once per cooldown window.

pub mod config;
pub mod detector;
pub mod error;
pub mod frames;
pub mod logging;
pub mod monitor;
pub mod notification;
pub mod utils;

pub use error::{Error, Result};
