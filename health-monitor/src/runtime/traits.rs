use anyhow::Result;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};

/// Listening TCP ports keyed by OS process id.
pub type PortMap = HashMap<u32, BTreeSet<u16>>;

/// One entry of the process manager's live list.
#[derive(Debug, Clone, PartialEq)]
pub struct ManagedProcess {
    pub name: String,
    pub pm2_id: i64,
    /// 0 when the process is not running.
    pub pid: u32,
    /// Manager-reported status, `online` when up.
    pub status: String,
    /// `PORT` from the service's own environment, if it declares one.
    pub declared_port: Option<u16>,
}

impl ManagedProcess {
    pub fn is_online(&self) -> bool {
        self.status == "online"
    }

    /// Declared port unioned with the ports observed for the pid, ascending.
    pub fn candidate_ports(&self, observed: &PortMap) -> Vec<u16> {
        let mut ports: BTreeSet<u16> = self.declared_port.into_iter().collect();
        if self.pid > 0 {
            if let Some(held) = observed.get(&self.pid) {
                ports.extend(held.iter().copied());
            }
        }
        ports.into_iter().collect()
    }
}

/// The process manager the monitor reads from and restarts through.
#[async_trait]
pub trait ProcessManager: Send + Sync {
    /// All processes currently registered with the manager.
    async fn list(&self) -> Result<Vec<ManagedProcess>>;

    /// Restarts a process by name.
    async fn restart(&self, name: &str) -> Result<()>;
}

/// Capability: "which ports is each pid listening on".
#[async_trait]
pub trait PortInspector: Send + Sync {
    async fn listening_ports(&self) -> Result<PortMap>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn process(pid: u32, declared: Option<u16>) -> ManagedProcess {
        ManagedProcess {
            name: "api".into(),
            pm2_id: 0,
            pid,
            status: "online".into(),
            declared_port: declared,
        }
    }

    #[test]
    fn test_candidate_ports_union_declared_and_observed() {
        let mut observed = PortMap::new();
        observed.insert(42, [3000, 9229].into_iter().collect());

        assert_eq!(process(42, Some(3000)).candidate_ports(&observed), vec![3000, 9229]);
        assert_eq!(process(42, Some(80)).candidate_ports(&observed), vec![80, 3000, 9229]);
        assert_eq!(process(7, Some(80)).candidate_ports(&observed), vec![80]);
        assert!(process(0, None).candidate_ports(&observed).is_empty());
    }
}
