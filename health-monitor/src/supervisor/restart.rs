use std::collections::HashMap;
use tokio::time::{Duration, Instant};

/// Last restart per service name, owned by the caller of each cycle.
///
/// A restart is recorded when it is *attempted*, so a failing restart
/// command is not retried before the cooldown elapses either.
#[derive(Debug, Clone)]
pub struct RestartTracker {
    cooldown: Duration,
    last_restart: HashMap<String, Instant>,
}

impl RestartTracker {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_restart: HashMap::new(),
        }
    }

    /// Returns true, and records now, if `name` is outside its cooldown.
    pub fn should_restart(&mut self, name: &str) -> bool {
        let now = Instant::now();
        if let Some(previous) = self.last_restart.get(name) {
            if now.duration_since(*previous) < self.cooldown {
                return false;
            }
        }
        self.last_restart.insert(name.to_string(), now);
        true
    }

    pub fn last_restart(&self, name: &str) -> Option<Instant> {
        self.last_restart.get(name).copied()
    }
}
