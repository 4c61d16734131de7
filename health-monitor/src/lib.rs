//! # Health Monitor
//!
//! Periodic liveness checks for pm2-managed services with throttled restarts.
//!
//! ## Modules
//! - `runtime`: Process-manager and listening-port adapters.
//! - `probe`: TCP connect and HTTP `/health` probes.
//! - `report`: Per-cycle report model and its on-disk writer.
//! - `supervisor`: The check cycle, restart cooldown and the timer loop.

pub mod config;
pub mod probe;
pub mod report;
pub mod runtime;
pub mod supervisor;

pub use probe::{NetworkProber, ProbeFailure, Prober};
pub use report::{HealthReport, ReportWriter};
pub use supervisor::{MonitorSettings, RestartTracker, Supervisor};
