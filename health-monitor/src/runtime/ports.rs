use super::traits::{PortInspector, PortMap};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::process::Command;

/// Picks the listening-socket inspector for the current OS, once.
pub fn detect_inspector() -> Arc<dyn PortInspector> {
    if cfg!(windows) {
        Arc::new(NetstatInspector)
    } else {
        Arc::new(LsofInspector)
    }
}

/// Unix: `lsof -nP -iTCP -sTCP:LISTEN`.
pub struct LsofInspector;

#[async_trait]
impl PortInspector for LsofInspector {
    async fn listening_ports(&self) -> Result<PortMap> {
        let output = Command::new("lsof")
            .args(["-nP", "-iTCP", "-sTCP:LISTEN"])
            .kill_on_drop(true)
            .output()
            .await
            .context("running lsof")?;
        // lsof exits 1 when nothing matches; the output is what counts.
        Ok(parse_lsof_output(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Windows: `netstat -ano -p tcp`.
pub struct NetstatInspector;

#[async_trait]
impl PortInspector for NetstatInspector {
    async fn listening_ports(&self) -> Result<PortMap> {
        let output = Command::new("netstat")
            .args(["-ano", "-p", "tcp"])
            .kill_on_drop(true)
            .output()
            .await
            .context("running netstat")?;
        Ok(parse_netstat_output(&String::from_utf8_lossy(&output.stdout)))
    }
}

pub fn parse_lsof_output(output: &str) -> PortMap {
    let mut map = PortMap::new();
    for line in output.lines() {
        if !line.contains("LISTEN") {
            continue;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 9 {
            continue;
        }
        let Ok(pid) = parts[1].parse::<u32>() else {
            continue;
        };
        if let Some(port) = port_of_endpoint(parts[8]) {
            map.entry(pid).or_default().insert(port);
        }
    }
    map
}

pub fn parse_netstat_output(output: &str) -> PortMap {
    let mut map = PortMap::new();
    for line in output.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 5 {
            continue;
        }
        if !parts[0].eq_ignore_ascii_case("TCP") || !parts[3].eq_ignore_ascii_case("LISTENING") {
            continue;
        }
        let Ok(pid) = parts[4].parse::<u32>() else {
            continue;
        };
        if let Some(port) = port_of_endpoint(parts[1]) {
            map.entry(pid).or_default().insert(port);
        }
    }
    map
}

/// `*:3000`, `127.0.0.1:3000`, `[::]:3000` -> 3000.
fn port_of_endpoint(endpoint: &str) -> Option<u16> {
    let (_, port) = endpoint.rsplit_once(':')?;
    port.parse::<u16>().ok().filter(|p| *p > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lsof() {
        let output = "\
COMMAND   PID USER   FD   TYPE DEVICE SIZE/OFF NODE NAME
node     4321 app    20u  IPv4  12345      0t0  TCP *:3000 (LISTEN)
node     4321 app    21u  IPv6  12346      0t0  TCP [::1]:9229 (LISTEN)
nginx     800 root    6u  IPv4  11111      0t0  TCP 127.0.0.1:80 (LISTEN)
node     4321 app    22u  IPv4  12347      0t0  TCP 10.0.0.2:51000->10.0.0.9:443 (ESTABLISHED)
";
        let map = parse_lsof_output(output);
        assert_eq!(map.len(), 2);
        assert_eq!(map[&4321].iter().copied().collect::<Vec<_>>(), vec![3000, 9229]);
        assert!(map[&800].contains(&80));
    }

    #[test]
    fn test_parse_netstat() {
        let output = "\r
Active Connections\r
\r
  Proto  Local Address          Foreign Address        State           PID\r
  TCP    0.0.0.0:3000           0.0.0.0:0              LISTENING       4321\r
  TCP    [::]:3001              [::]:0                 LISTENING       4321\r
  TCP    127.0.0.1:52000        127.0.0.1:3000         ESTABLISHED     900\r
  TCP    0.0.0.0:0              0.0.0.0:0              LISTENING       12\r
";
        let map = parse_netstat_output(output);
        assert_eq!(map.len(), 1);
        assert_eq!(map[&4321].iter().copied().collect::<Vec<_>>(), vec![3000, 3001]);
    }
}
