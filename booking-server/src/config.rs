use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use storefront_core::fs::LockOptions;

/// Booking server settings. Every flag can also come from the environment.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Hotel booking API server", long_about = None)]
pub struct ServerConfig {
    /// Interface to bind
    #[arg(long, env = "HOTEL_BIND_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Directory holding hotel_orders.json
    #[arg(long, env = "HOTEL_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    /// Admin key for order routes; empty leaves them open (dev mode)
    #[arg(long, env = "HOTEL_ADMIN_KEY", default_value = "", hide_env_values = true)]
    admin_key: String,

    /// Telegram bot token for notices and callback acknowledgements
    #[arg(long, env = "TG_BOT_TOKEN", default_value = "", hide_env_values = true)]
    tg_bot_token: String,

    /// Telegram chat receiving new-order notices
    #[arg(long, env = "TG_ADMIN_ID", default_value = "")]
    tg_admin_id: String,

    /// Pause between lock attempts, in milliseconds
    #[arg(long, env = "HOTEL_LOCK_RETRY_MS", default_value_t = 10)]
    lock_retry_ms: u64,

    /// Lock attempts before answering 503
    #[arg(long, env = "HOTEL_LOCK_MAX_ATTEMPTS", default_value_t = 120)]
    lock_max_attempts: u32,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    pub fn admin_key(&self) -> &str {
        self.admin_key.trim()
    }

    /// Token, if Telegram is configured at all.
    pub fn tg_bot_token(&self) -> Option<&str> {
        Some(self.tg_bot_token.trim()).filter(|t| !t.is_empty())
    }

    pub fn tg_admin_id(&self) -> Option<&str> {
        Some(self.tg_admin_id.trim()).filter(|t| !t.is_empty())
    }

    pub fn lock_options(&self) -> LockOptions {
        LockOptions {
            retry_interval: Duration::from_millis(self.lock_retry_ms),
            max_attempts: self.lock_max_attempts,
        }
    }

    /// Test helper: defaults with a custom data directory and admin key.
    pub fn for_data_dir(data_dir: impl Into<PathBuf>, admin_key: &str) -> Self {
        let mut config = Self::parse_from(["booking-server"]);
        config.data_dir = data_dir.into();
        config.admin_key = admin_key.to_string();
        config.tg_bot_token.clear();
        config.tg_admin_id.clear();
        config
    }
}
