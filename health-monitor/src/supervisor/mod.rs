pub mod restart;
pub mod worker;

pub use restart::RestartTracker;
pub use worker::{MonitorSettings, Supervisor};
