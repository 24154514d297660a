//! Background Tasks Module
//!
//! Contains background tasks that run periodically while a client is alive.
//!
//! # Tasks
//! - TTL Cleanup: Removes expired cache entries at configured intervals
//! - Health Probe: Checks every endpoint's health path at configured intervals

mod cleanup;
mod probe;

pub use cleanup::spawn_cleanup_task;
pub use probe::spawn_probe_task;
