use anyhow::Context;
use clap::Parser;
use health_monitor::config::MonitorConfig;
use health_monitor::runtime::{detect_inspector, Pm2ProcessManager};
use health_monitor::{MonitorSettings, NetworkProber, ReportWriter, RestartTracker, Supervisor};
use log::info;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("=== Health Monitor Starting ===");

    let config = MonitorConfig::parse();

    // 1. Report directory
    std::fs::create_dir_all(config.report_dir())
        .with_context(|| format!("creating report dir {}", config.report_dir().display()))?;
    let writer = ReportWriter::new(config.report_dir(), config.history_max_bytes());

    // 2. Adapters
    let manager = Arc::new(Pm2ProcessManager::new(config.pm2_bin()));
    let inspector = detect_inspector();
    let prober = Arc::new(
        NetworkProber::new(
            config.connect_timeout(),
            config.health_timeout(),
            config.health_path(),
        )
        .context("building HTTP client")?,
    );

    let supervisor = Supervisor::new(
        manager,
        inspector,
        prober,
        MonitorSettings {
            interval: config.interval(),
            monitor_name: config.monitor_name().to_string(),
        },
    );
    let mut tracker = RestartTracker::new(config.restart_cooldown());

    // 3. Loop
    if config.once() {
        return match supervisor.run_cycle(&writer, &mut tracker).await {
            Some(_) => Ok(()),
            None => anyhow::bail!("single check cycle failed"),
        };
    }

    supervisor
        .run(writer, tracker, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;
    info!("Health Monitor stopped");
    Ok(())
}
