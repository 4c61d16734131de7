//! TCP and HTTP liveness probes.
//!
//! A failed probe is data: every outcome is a `ProbeFailure` code that ends up
//! in the report, never an error that aborts the cycle.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeFailure {
    #[error("tcp_timeout")]
    TcpTimeout,
    #[error("tcp_error")]
    TcpError,
    #[error("http_{0}")]
    HttpStatus(u16),
    #[error("health_payload_invalid")]
    PayloadInvalid,
    #[error("health_json_invalid")]
    JsonInvalid,
    #[error("health_timeout")]
    HealthTimeout,
    #[error("health_error")]
    HealthError,
    /// HTTP probe not attempted because TCP already failed.
    #[error("skip_health_tcp_failed")]
    SkippedTcpFailed,
}

pub type ProbeResult = Result<(), ProbeFailure>;

#[async_trait]
pub trait Prober: Send + Sync {
    /// Can a TCP connection be opened on `127.0.0.1:port`?
    async fn tcp(&self, port: u16) -> ProbeResult;

    /// Does the health path answer 200 with `{"status":"ok"}`?
    async fn health(&self, port: u16) -> ProbeResult;
}

/// Probes local ports over the network with hard timeouts.
pub struct NetworkProber {
    client: reqwest::Client,
    connect_timeout: Duration,
    health_timeout: Duration,
    health_path: String,
}

impl NetworkProber {
    pub fn new(
        connect_timeout: Duration,
        health_timeout: Duration,
        health_path: impl Into<String>,
    ) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().no_proxy().build()?;
        Ok(Self {
            client,
            connect_timeout,
            health_timeout,
            health_path: health_path.into(),
        })
    }

    async fn fetch(&self, url: &str) -> Result<(u16, String), reqwest::Error> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok((status, body))
    }
}

#[async_trait]
impl Prober for NetworkProber {
    async fn tcp(&self, port: u16) -> ProbeResult {
        match tokio::time::timeout(self.connect_timeout, TcpStream::connect(("127.0.0.1", port))).await {
            Ok(Ok(_stream)) => Ok(()),
            Ok(Err(_)) => Err(ProbeFailure::TcpError),
            Err(_) => Err(ProbeFailure::TcpTimeout),
        }
    }

    async fn health(&self, port: u16) -> ProbeResult {
        let url = format!("http://127.0.0.1:{}{}", port, self.health_path);
        let (status, body) = match tokio::time::timeout(self.health_timeout, self.fetch(&url)).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) if e.is_timeout() => return Err(ProbeFailure::HealthTimeout),
            Ok(Err(_)) => return Err(ProbeFailure::HealthError),
            Err(_) => return Err(ProbeFailure::HealthTimeout),
        };
        judge_health_reply(status, &body)
    }
}

/// 200 plus a JSON body whose `status` is `"ok"`. An empty body reads as `{}`.
pub fn judge_health_reply(status: u16, body: &str) -> ProbeResult {
    if status != 200 {
        return Err(ProbeFailure::HttpStatus(status));
    }
    let body = if body.trim().is_empty() { "{}" } else { body };
    let json: serde_json::Value =
        serde_json::from_str(body).map_err(|_| ProbeFailure::JsonInvalid)?;
    match json.get("status").and_then(|s| s.as_str()) {
        Some("ok") => Ok(()),
        _ => Err(ProbeFailure::PayloadInvalid),
    }
}
