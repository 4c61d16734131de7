use super::traits::{ManagedProcess, ProcessManager};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::{info, warn};
use serde::Deserialize;
use serde_json::Value;
use tokio::process::Command;

/// Talks to pm2 through its CLI (`pm2 jlist`, `pm2 restart <name>`).
pub struct Pm2ProcessManager {
    bin: String,
}

impl Pm2ProcessManager {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }
}

#[async_trait]
impl ProcessManager for Pm2ProcessManager {
    async fn list(&self) -> Result<Vec<ManagedProcess>> {
        let output = Command::new(&self.bin)
            .arg("jlist")
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("running `{} jlist`", self.bin))?;

        if !output.status.success() {
            return Err(anyhow!(
                "`{} jlist` exited with {}: {}",
                self.bin,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        parse_jlist(&String::from_utf8_lossy(&output.stdout))
    }

    async fn restart(&self, name: &str) -> Result<()> {
        info!("Runtime: Restarting '{}' via {}", name, self.bin);
        let output = Command::new(&self.bin)
            .arg("restart")
            .arg(name)
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("running `{} restart`", self.bin))?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("Runtime: Restart of '{}' failed: {}", name, stderr.trim());
            Err(anyhow!("exit {}: {}", output.status, stderr.trim()))
        }
    }
}

#[derive(Debug, Deserialize)]
struct JlistEntry {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    pm_id: Option<i64>,
    #[serde(default)]
    pid: Option<i64>,
    #[serde(default)]
    pm2_env: Option<JlistEnv>,
}

#[derive(Debug, Default, Deserialize)]
struct JlistEnv {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    env: Option<serde_json::Map<String, Value>>,
}

/// Parses `pm2 jlist` output.
///
/// pm2 may print log lines before the JSON array, some of them starting with
/// `[` themselves (`[PM2] Spawning PM2 daemon ...`). The array is the first
/// line starting with `[` from which a JSON array of processes parses.
pub fn parse_jlist(raw: &str) -> Result<Vec<ManagedProcess>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut last_error = None;
    let mut offset = 0;
    for line in raw.split_inclusive('\n') {
        let candidate = &raw[offset..];
        offset += line.len();
        if !line.trim_start().starts_with('[') {
            continue;
        }
        let mut stream =
            serde_json::Deserializer::from_str(candidate.trim_start()).into_iter::<Vec<JlistEntry>>();
        match stream.next() {
            Some(Ok(entries)) => return Ok(entries_to_processes(entries)),
            Some(Err(e)) => last_error = Some(e),
            None => {}
        }
    }

    match last_error {
        Some(e) => Err(e).context("parsing pm2 jlist output"),
        None => Err(anyhow!("pm2 jlist output is not a JSON array")),
    }
}

fn entries_to_processes(entries: Vec<JlistEntry>) -> Vec<ManagedProcess> {
    entries
        .into_iter()
        .map(|entry| {
            let env = entry.pm2_env.unwrap_or_default();
            let declared_port = env
                .env
                .as_ref()
                .and_then(|vars| vars.get("PORT"))
                .and_then(port_from_value);
            ManagedProcess {
                name: entry.name.unwrap_or_default(),
                pm2_id: entry.pm_id.unwrap_or(-1),
                pid: entry.pid.and_then(|p| u32::try_from(p).ok()).unwrap_or(0),
                status: env.status.unwrap_or_default(),
                declared_port,
            }
        })
        .collect()
}

fn port_from_value(value: &Value) -> Option<u16> {
    let port = match value {
        Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<u16>().ok(),
        _ => None,
    }?;
    (port > 0).then_some(port)
}
