use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Monitor settings. Every flag can also come from the environment.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Health monitor and restarter for pm2-managed services", long_about = None)]
pub struct MonitorConfig {
    /// Milliseconds between two check cycles
    #[arg(long, env = "MONITOR_INTERVAL_MS", default_value_t = 60_000)]
    interval_ms: u64,

    /// TCP connect timeout per port, in milliseconds
    #[arg(long, env = "MONITOR_CONNECT_TIMEOUT_MS", default_value_t = 1_500)]
    connect_timeout_ms: u64,

    /// HTTP health probe timeout per port, in milliseconds
    #[arg(long, env = "MONITOR_HEALTH_TIMEOUT_MS", default_value_t = 3_000)]
    health_timeout_ms: u64,

    /// Minimum gap between two restarts of the same service, in milliseconds
    #[arg(long, env = "MONITOR_RESTART_COOLDOWN_MS", default_value_t = 120_000)]
    restart_cooldown_ms: u64,

    /// pm2 name of this monitor, excluded from checks
    #[arg(long, env = "MONITOR_NAME", default_value = "pm2-health-monitor")]
    monitor_name: String,

    /// Path probed on every candidate port
    #[arg(long, env = "MONITOR_HEALTH_PATH", default_value = "/health")]
    health_path: String,

    /// Directory receiving the latest report and the history log
    #[arg(long, env = "MONITOR_REPORT_DIR", default_value = "./storage/health")]
    report_dir: PathBuf,

    /// History log size that triggers rotation
    #[arg(long, env = "MONITOR_HISTORY_MAX_BYTES", default_value_t = 10 * 1024 * 1024)]
    history_max_bytes: u64,

    /// pm2 executable
    #[arg(long, env = "MONITOR_PM2_BIN", default_value = "pm2")]
    pm2_bin: String,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }

    pub fn restart_cooldown(&self) -> Duration {
        Duration::from_millis(self.restart_cooldown_ms)
    }

    pub fn monitor_name(&self) -> &str {
        self.monitor_name.trim()
    }

    /// Blank falls back to `/health`; a missing leading slash is added.
    pub fn health_path(&self) -> String {
        let path = self.health_path.trim();
        if path.is_empty() {
            "/health".to_string()
        } else if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        }
    }

    pub fn report_dir(&self) -> &PathBuf {
        &self.report_dir
    }

    pub fn history_max_bytes(&self) -> u64 {
        self.history_max_bytes
    }

    pub fn pm2_bin(&self) -> &str {
        &self.pm2_bin
    }

    pub fn once(&self) -> bool {
        self.once
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let config = MonitorConfig::parse_from([
            "health-monitor",
            "--interval-ms",
            "500",
            "--health-path",
            "status",
            "--monitor-name",
            " watcher ",
            "--once",
        ]);
        assert_eq!(config.interval(), Duration::from_millis(500));
        assert_eq!(config.health_path(), "/status");
        assert_eq!(config.monitor_name(), "watcher");
        assert!(config.once());
    }

    #[test]
    fn test_blank_health_path_falls_back() {
        let config = MonitorConfig::parse_from(["health-monitor", "--health-path", "  "]);
        assert_eq!(config.health_path(), "/health");
    }
}
