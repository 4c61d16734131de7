use super::restart::RestartTracker;
use crate::probe::{ProbeFailure, ProbeResult, Prober};
use crate::report::{HealthReport, PortCheck, ReportWriter, ServiceHealthRecord};
use crate::runtime::{ManagedProcess, PortInspector, PortMap, ProcessManager};
use anyhow::{Context, Result};
use futures::FutureExt;
use log::{error, info, warn};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::time::{self, Duration, MissedTickBehavior};

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub interval: Duration,
    /// The monitor's own process-manager name; never checked or restarted.
    pub monitor_name: String,
}

/// Polls every managed service, probes its ports and restarts the unhealthy
/// ones, one cycle at a time.
///
/// Use `Supervisor::new(...)` to create it, then either `check_once()` for a
/// single cycle or `run()` for the timer loop.
pub struct Supervisor<M: ProcessManager, P: Prober> {
    manager: Arc<M>,
    inspector: Arc<dyn PortInspector>,
    prober: Arc<P>,
    settings: MonitorSettings,
}

impl<M: ProcessManager, P: Prober> Supervisor<M, P> {
    pub fn new(
        manager: Arc<M>,
        inspector: Arc<dyn PortInspector>,
        prober: Arc<P>,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            manager,
            inspector,
            prober,
            settings,
        }
    }

    /// Runs cycles on the interval (the first one immediately) until
    /// `shutdown` resolves. A failed cycle is logged and the loop goes on.
    pub async fn run(
        self,
        writer: ReportWriter,
        mut tracker: RestartTracker,
        shutdown: impl Future<Output = ()>,
    ) {
        info!(
            "Supervisor: Starting health loop every {:?} (self: '{}')",
            self.settings.interval, self.settings.monitor_name
        );
        let mut ticker = time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_cycle(&writer, &mut tracker).await;
                }
                _ = &mut shutdown => {
                    info!("Supervisor: Shutdown requested, leaving health loop");
                    break;
                }
            }
        }
    }

    /// One cycle plus persistence. Never fails: errors are logged.
    pub async fn run_cycle(
        &self,
        writer: &ReportWriter,
        tracker: &mut RestartTracker,
    ) -> Option<HealthReport> {
        let report = match self.check_once(tracker).await {
            Ok(report) => report,
            Err(e) => {
                error!("Supervisor: Check cycle failed: {:#}", e);
                return None;
            }
        };

        if let Err(e) = writer.write(&report) {
            error!("Supervisor: Failed to persist report: {:#}", e);
        }
        info!(
            "Supervisor: total={} unhealthy={} restarted={} ({} ms)",
            report.summary.total_services,
            report.summary.unhealthy_services,
            report.summary.restarted_services,
            report.summary.duration_ms
        );
        Some(report)
    }

    /// Checks every managed service once and restarts the unhealthy ones that
    /// are out of cooldown.
    ///
    /// # Returns
    /// * `Ok(HealthReport)` for the cycle.
    /// * `Err` only if the process list itself cannot be read.
    pub async fn check_once(&self, tracker: &mut RestartTracker) -> Result<HealthReport> {
        let started = std::time::Instant::now();

        let processes = self
            .manager
            .list()
            .await
            .context("listing managed processes")?;

        let port_map = match self.inspector.listening_ports().await {
            Ok(map) => map,
            Err(e) => {
                warn!(
                    "Supervisor: Port inspection failed, using declared ports only: {:#}",
                    e
                );
                PortMap::new()
            }
        };

        let mut services = Vec::new();
        for process in processes
            .iter()
            .filter(|p| p.name != self.settings.monitor_name)
        {
            let mut record = match AssertUnwindSafe(self.evaluate(process, &port_map))
                .catch_unwind()
                .await
            {
                Ok(record) => record,
                Err(_) => {
                    error!("Supervisor: Checks for '{}' panicked", process.name);
                    panicked_record(process, &port_map)
                }
            };

            if !record.healthy {
                warn!("Supervisor: '{}' unhealthy: {}", record.name, record.reason);
                if tracker.should_restart(&record.name) {
                    match self.manager.restart(&record.name).await {
                        Ok(()) => {
                            info!("Supervisor: '{}' restarted", record.name);
                            record.restarted = true;
                        }
                        Err(e) => {
                            error!("Supervisor: Restart of '{}' failed: {:#}", record.name, e);
                            record.reason.push_str(&format!("; restart_failed={}", e));
                        }
                    }
                } else {
                    info!("Supervisor: '{}' within restart cooldown", record.name);
                }
            }

            services.push(record);
        }

        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let interval_ms = u64::try_from(self.settings.interval.as_millis()).unwrap_or(u64::MAX);
        Ok(HealthReport::new(
            interval_ms,
            &self.settings.monitor_name,
            services,
            duration_ms,
        ))
    }

    async fn evaluate(&self, process: &ManagedProcess, port_map: &PortMap) -> ServiceHealthRecord {
        let mut record = blank_record(process, port_map);
        if record.ports.is_empty() {
            record.reason = "no_port_detected".to_string();
            return record;
        }

        for &port in &record.ports {
            let tcp = self.prober.tcp(port).await;
            let health = match tcp {
                Ok(()) => self.prober.health(port).await,
                Err(_) => Err(ProbeFailure::SkippedTcpFailed),
            };
            record.checks.push(PortCheck {
                port,
                tcp_ok: tcp.is_ok(),
                tcp_reason: reason_text(&tcp),
                health_ok: health.is_ok(),
                health_reason: reason_text(&health),
            });
        }

        let tcp_ok = record.all_tcp_ok();
        let health_ok = record.all_health_ok();
        record.healthy = tcp_ok && health_ok && process.is_online();
        if !record.healthy {
            record.reason = format!(
                "pm2={}; tcp={}; health={}",
                process.status, tcp_ok, health_ok
            );
            if let Some(cause) = first_failure(&record.checks) {
                record.reason.push_str("; cause=");
                record.reason.push_str(cause);
            }
        }
        record
    }
}

fn blank_record(process: &ManagedProcess, port_map: &PortMap) -> ServiceHealthRecord {
    ServiceHealthRecord {
        name: process.name.clone(),
        pm2_id: process.pm2_id,
        pid: process.pid,
        pm2_status: process.status.clone(),
        ports: process.candidate_ports(port_map),
        checks: Vec::new(),
        healthy: false,
        restarted: false,
        reason: String::new(),
    }
}

fn panicked_record(process: &ManagedProcess, port_map: &PortMap) -> ServiceHealthRecord {
    let mut record = blank_record(process, port_map);
    record.reason = "check_panicked".to_string();
    record
}

fn reason_text(result: &ProbeResult) -> String {
    match result {
        Ok(()) => String::new(),
        Err(failure) => failure.to_string(),
    }
}

/// Code of the first failing probe: TCP reason if the connect failed, else
/// the HTTP reason.
fn first_failure(checks: &[PortCheck]) -> Option<&str> {
    checks.iter().find_map(|c| {
        if !c.tcp_ok {
            Some(c.tcp_reason.as_str())
        } else if !c.health_ok {
            Some(c.health_reason.as_str())
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    // --- Mock Process Manager ---
    #[derive(Default)]
    struct MockManager {
        processes: Vec<ManagedProcess>,
        restarted: Mutex<Vec<String>>,
        fail_restart: bool,
    }

    #[async_trait]
    impl ProcessManager for MockManager {
        async fn list(&self) -> Result<Vec<ManagedProcess>> {
            Ok(self.processes.clone())
        }

        async fn restart(&self, name: &str) -> Result<()> {
            self.restarted.lock().unwrap().push(name.to_string());
            if self.fail_restart {
                return Err(anyhow!("pm2 not reachable"));
            }
            Ok(())
        }
    }

    struct MockInspector(PortMap);

    #[async_trait]
    impl PortInspector for MockInspector {
        async fn listening_ports(&self) -> Result<PortMap> {
            Ok(self.0.clone())
        }
    }

    struct FailingInspector;

    #[async_trait]
    impl PortInspector for FailingInspector {
        async fn listening_ports(&self) -> Result<PortMap> {
            Err(anyhow!("lsof missing"))
        }
    }

    // --- Mock Prober: per-port scripted outcomes; port 666 panics ---
    #[derive(Default)]
    struct MockProber {
        tcp: HashMap<u16, ProbeResult>,
        health: HashMap<u16, ProbeResult>,
        health_calls: Mutex<Vec<u16>>,
    }

    #[async_trait]
    impl Prober for MockProber {
        async fn tcp(&self, port: u16) -> ProbeResult {
            if port == 666 {
                panic!("probe exploded");
            }
            self.tcp.get(&port).cloned().unwrap_or(Ok(()))
        }

        async fn health(&self, port: u16) -> ProbeResult {
            self.health_calls.lock().unwrap().push(port);
            self.health.get(&port).cloned().unwrap_or(Ok(()))
        }
    }

    fn process(name: &str, pid: u32, status: &str, port: Option<u16>) -> ManagedProcess {
        ManagedProcess {
            name: name.into(),
            pm2_id: 0,
            pid,
            status: status.into(),
            declared_port: port,
        }
    }

    fn settings() -> MonitorSettings {
        MonitorSettings {
            interval: Duration::from_secs(60),
            monitor_name: "pm2-health-monitor".into(),
        }
    }

    fn supervisor(
        manager: MockManager,
        prober: MockProber,
    ) -> (Supervisor<MockManager, MockProber>, Arc<MockManager>, Arc<MockProber>) {
        let manager = Arc::new(manager);
        let prober = Arc::new(prober);
        let sup = Supervisor::new(
            manager.clone(),
            Arc::new(MockInspector(PortMap::new())),
            prober.clone(),
            settings(),
        );
        (sup, manager, prober)
    }

    #[tokio::test]
    async fn test_healthy_service() {
        let _ = env_logger::builder().is_test(true).try_init();
        let (sup, manager, _) = supervisor(
            MockManager {
                processes: vec![process("api", 10, "online", Some(3000))],
                ..Default::default()
            },
            MockProber::default(),
        );
        let mut tracker = RestartTracker::new(Duration::from_secs(120));

        let report = sup.check_once(&mut tracker).await.unwrap();
        assert!(report.summary.ok);
        let svc = &report.services[0];
        assert!(svc.healthy);
        assert!(svc.reason.is_empty());
        assert_eq!(svc.checks.len(), 1);
        assert!(manager.restarted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_degraded_payload_is_unhealthy() {
        let (sup, manager, _) = supervisor(
            MockManager {
                processes: vec![process("api", 10, "online", Some(3000))],
                ..Default::default()
            },
            MockProber {
                health: [(3000, Err(ProbeFailure::PayloadInvalid))].into_iter().collect(),
                ..Default::default()
            },
        );
        let mut tracker = RestartTracker::new(Duration::from_secs(120));

        let report = sup.check_once(&mut tracker).await.unwrap();
        let svc = &report.services[0];
        assert!(!svc.healthy);
        assert!(svc.restarted);
        assert_eq!(svc.checks[0].health_reason, "health_payload_invalid");
        assert_eq!(
            svc.reason,
            "pm2=online; tcp=true; health=false; cause=health_payload_invalid"
        );
        assert_eq!(*manager.restarted.lock().unwrap(), vec!["api".to_string()]);
    }

    /// Verification Test: TCP failure short-circuits the HTTP probe
    ///
    /// **Objective**: a port that refuses connections is recorded with
    /// `skip_health_tcp_failed` and the health endpoint is never called.
    #[tokio::test]
    async fn test_tcp_failure_skips_health_probe() {
        let (sup, _, prober) = supervisor(
            MockManager {
                processes: vec![process("api", 10, "online", Some(3000))],
                ..Default::default()
            },
            MockProber {
                tcp: [(3000, Err(ProbeFailure::TcpTimeout))].into_iter().collect(),
                ..Default::default()
            },
        );
        let mut tracker = RestartTracker::new(Duration::from_secs(120));

        let report = sup.check_once(&mut tracker).await.unwrap();
        let check = &report.services[0].checks[0];
        assert!(!check.tcp_ok);
        assert_eq!(check.tcp_reason, "tcp_timeout");
        assert_eq!(check.health_reason, "skip_health_tcp_failed");
        assert!(prober.health_calls.lock().unwrap().is_empty());
        assert!(report.services[0].reason.ends_with("cause=tcp_timeout"));
    }

    #[tokio::test]
    async fn test_offline_status_is_unhealthy_even_if_probes_pass() {
        let (sup, _, _) = supervisor(
            MockManager {
                processes: vec![process("api", 10, "errored", Some(3000))],
                ..Default::default()
            },
            MockProber::default(),
        );
        let mut tracker = RestartTracker::new(Duration::from_secs(120));

        let report = sup.check_once(&mut tracker).await.unwrap();
        assert!(!report.services[0].healthy);
        assert_eq!(report.services[0].reason, "pm2=errored; tcp=true; health=true");
    }

    #[tokio::test]
    async fn test_no_port_and_self_exclusion() {
        let (sup, _, prober) = supervisor(
            MockManager {
                processes: vec![
                    process("pm2-health-monitor", 1, "online", None),
                    process("cron", 2, "online", None),
                ],
                ..Default::default()
            },
            MockProber::default(),
        );
        let mut tracker = RestartTracker::new(Duration::from_secs(120));

        let report = sup.check_once(&mut tracker).await.unwrap();
        assert_eq!(report.summary.total_services, 1);
        let svc = &report.services[0];
        assert_eq!(svc.name, "cron");
        assert_eq!(svc.reason, "no_port_detected");
        assert!(svc.checks.is_empty());
        assert!(prober.health_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_observed_ports_are_probed() {
        let manager = Arc::new(MockManager {
            processes: vec![process("api", 42, "online", Some(3000))],
            ..Default::default()
        });
        let prober = Arc::new(MockProber::default());
        let mut observed = PortMap::new();
        observed.insert(42, [3000, 9000].into_iter().collect());
        let sup = Supervisor::new(
            manager,
            Arc::new(MockInspector(observed)),
            prober.clone(),
            settings(),
        );

        let report = sup
            .check_once(&mut RestartTracker::new(Duration::from_secs(1)))
            .await
            .unwrap();
        assert_eq!(report.services[0].ports, vec![3000, 9000]);
        assert_eq!(*prober.health_calls.lock().unwrap(), vec![3000, 9000]);
    }

    #[tokio::test]
    async fn test_inspector_failure_degrades_to_declared_ports() {
        let manager = Arc::new(MockManager {
            processes: vec![process("api", 42, "online", Some(3000))],
            ..Default::default()
        });
        let sup = Supervisor::new(
            manager,
            Arc::new(FailingInspector),
            Arc::new(MockProber::default()),
            settings(),
        );

        let report = sup
            .check_once(&mut RestartTracker::new(Duration::from_secs(1)))
            .await
            .unwrap();
        assert_eq!(report.services[0].ports, vec![3000]);
        assert!(report.services[0].healthy);
    }

    /// Verification Test: Per-service isolation
    ///
    /// **Objective**: a panic while checking one service is recorded for that
    /// service only; the others are still checked.
    #[tokio::test]
    async fn test_panic_is_isolated_to_one_service() {
        let (sup, _, _) = supervisor(
            MockManager {
                processes: vec![
                    process("cursed", 1, "online", Some(666)),
                    process("api", 2, "online", Some(3000)),
                ],
                ..Default::default()
            },
            MockProber::default(),
        );
        let mut tracker = RestartTracker::new(Duration::from_secs(120));

        let report = sup.check_once(&mut tracker).await.unwrap();
        assert_eq!(report.summary.total_services, 2);
        assert_eq!(report.services[0].reason, "check_panicked");
        assert!(report.services[0].restarted);
        assert!(report.services[1].healthy);
    }

    #[tokio::test]
    async fn test_restart_failure_is_noted() {
        let (sup, _, _) = supervisor(
            MockManager {
                processes: vec![process("api", 10, "stopped", None)],
                fail_restart: true,
                ..Default::default()
            },
            MockProber::default(),
        );
        let mut tracker = RestartTracker::new(Duration::from_secs(120));

        let report = sup.check_once(&mut tracker).await.unwrap();
        let svc = &report.services[0];
        assert!(!svc.restarted);
        assert_eq!(svc.reason, "no_port_detected; restart_failed=pm2 not reachable");
        assert_eq!(report.summary.restarted_services, 0);
        assert!(tracker.last_restart("api").is_some());
    }

    /// Verification Test: Restart cooldown across cycles
    ///
    /// **Scenario**:
    /// 1. First unhealthy cycle -> restart.
    /// 2. Next cycle, inside the 120 s window -> no restart.
    /// 3. Cycle after the window elapsed -> restart again.
    #[tokio::test(start_paused = true)]
    async fn test_restart_cooldown_across_cycles() {
        let (sup, manager, _) = supervisor(
            MockManager {
                processes: vec![process("api", 10, "online", Some(3000))],
                ..Default::default()
            },
            MockProber {
                health: [(3000, Err(ProbeFailure::HttpStatus(502)))].into_iter().collect(),
                ..Default::default()
            },
        );
        let mut tracker = RestartTracker::new(Duration::from_secs(120));

        let first = sup.check_once(&mut tracker).await.unwrap();
        assert!(first.services[0].restarted);

        time::advance(Duration::from_secs(60)).await;
        let second = sup.check_once(&mut tracker).await.unwrap();
        assert!(!second.services[0].healthy);
        assert!(!second.services[0].restarted);

        time::advance(Duration::from_secs(61)).await;
        let third = sup.check_once(&mut tracker).await.unwrap();
        assert!(third.services[0].restarted);

        assert_eq!(manager.restarted.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_list_failure_fails_the_cycle_not_the_loop() {
        struct BrokenManager;

        #[async_trait]
        impl ProcessManager for BrokenManager {
            async fn list(&self) -> Result<Vec<ManagedProcess>> {
                Err(anyhow!("pm2 daemon down"))
            }
            async fn restart(&self, _name: &str) -> Result<()> {
                Ok(())
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(dir.path(), 1024);
        let sup = Supervisor::new(
            Arc::new(BrokenManager),
            Arc::new(MockInspector(PortMap::new())),
            Arc::new(MockProber::default()),
            settings(),
        );
        let mut tracker = RestartTracker::new(Duration::from_secs(1));

        assert!(sup.check_once(&mut tracker).await.is_err());
        assert!(sup.run_cycle(&writer, &mut tracker).await.is_none());
        assert!(!writer.latest_path().exists());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown_after_first_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(dir.path(), 1024 * 1024);
        let latest = writer.latest_path();
        let (sup, _, _) = supervisor(
            MockManager {
                processes: vec![process("api", 10, "online", Some(3000))],
                ..Default::default()
            },
            MockProber::default(),
        );
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let handle = tokio::spawn(sup.run(
            writer,
            RestartTracker::new(Duration::from_secs(1)),
            async {
                let _ = rx.await;
            },
        ));
        tokio::time::sleep(Duration::from_millis(200)).await;
        tx.send(()).unwrap();
        handle.await.unwrap();

        assert!(latest.exists(), "first cycle runs immediately");
    }
}
