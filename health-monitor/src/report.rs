use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use storefront_core::fs::persistence::{append_line, save_state};

pub const LATEST_FILE: &str = "health_scan_report_latest.json";
pub const HISTORY_FILE: &str = "health_scan_report_history.ndjson";

/// Outcome of both probes on one port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortCheck {
    pub port: u16,
    pub tcp_ok: bool,
    pub tcp_reason: String,
    pub health_ok: bool,
    pub health_reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceHealthRecord {
    pub name: String,
    pub pm2_id: i64,
    pub pid: u32,
    pub pm2_status: String,
    pub ports: Vec<u16>,
    pub checks: Vec<PortCheck>,
    pub healthy: bool,
    pub restarted: bool,
    /// Empty when healthy.
    pub reason: String,
}

impl ServiceHealthRecord {
    pub fn all_tcp_ok(&self) -> bool {
        self.checks.iter().all(|c| c.tcp_ok)
    }

    pub fn all_health_ok(&self) -> bool {
        self.checks.iter().all(|c| c.health_ok)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_services: usize,
    pub unhealthy_services: usize,
    pub restarted_services: usize,
    pub ok: bool,
    pub duration_ms: u64,
}

/// One cycle's snapshot, as written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub timestamp: DateTime<Utc>,
    pub interval_ms: u64,
    pub monitor_name: String,
    pub summary: Summary,
    pub services: Vec<ServiceHealthRecord>,
}

impl HealthReport {
    pub fn new(
        interval_ms: u64,
        monitor_name: &str,
        services: Vec<ServiceHealthRecord>,
        duration_ms: u64,
    ) -> Self {
        let unhealthy = services.iter().filter(|s| !s.healthy).count();
        let restarted = services.iter().filter(|s| s.restarted).count();
        Self {
            timestamp: Utc::now(),
            interval_ms,
            monitor_name: monitor_name.to_string(),
            summary: Summary {
                total_services: services.len(),
                unhealthy_services: unhealthy,
                restarted_services: restarted,
                ok: unhealthy == 0,
                duration_ms,
            },
            services,
        }
    }
}

/// Persists reports: the latest snapshot is replaced, the history log grows
/// until it passes `history_max_bytes`, then it is rotated to `<name>.1`.
pub struct ReportWriter {
    dir: PathBuf,
    history_max_bytes: u64,
}

impl ReportWriter {
    pub fn new(dir: impl Into<PathBuf>, history_max_bytes: u64) -> Self {
        Self {
            dir: dir.into(),
            history_max_bytes,
        }
    }

    pub fn latest_path(&self) -> PathBuf {
        self.dir.join(LATEST_FILE)
    }

    pub fn history_path(&self) -> PathBuf {
        self.dir.join(HISTORY_FILE)
    }

    pub fn write(&self, report: &HealthReport) -> Result<()> {
        let latest = self.latest_path();
        save_state(&latest, report)
            .with_context(|| format!("writing {}", latest.display()))?;

        let history = self.history_path();
        self.rotate_if_needed(&history)?;
        append_line(&history, report)
            .with_context(|| format!("appending to {}", history.display()))?;
        Ok(())
    }

    fn rotate_if_needed(&self, history: &Path) -> Result<()> {
        let size = match std::fs::metadata(history) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e).context("reading history size"),
        };
        if size < self.history_max_bytes {
            return Ok(());
        }

        let mut rotated = history.as_os_str().to_os_string();
        rotated.push(".1");
        std::fs::rename(history, &rotated)
            .with_context(|| format!("rotating {}", history.display()))?;
        log::info!("Report: Rotated history log ({} bytes)", size);
        Ok(())
    }
}
