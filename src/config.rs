use std::env;
use std::str::FromStr;
use std::time::Duration;
use std::num::NonZeroU32;
use governor::Quota;
use crate::state::poller::PollerSettings;

#[derive(Clone, Debug)]
pub struct Config {
    // HTTP
    pub bind_address: String,
    pub port: u16,

    // Rate limiting for pushed state updates
    pub state_update_period_secs: u64,
    pub state_update_burst_limit: u32,

    // Server configs
    pub servers_file: String,
    pub config_reload_secs: u64,

    // Polling and command execution
    pub status_update_secs: u64,
    pub rcon_timeout_ms: u64,
    pub poll_timeout_ms: u64,
    pub shutdown_grace_secs: u64,
    pub rcon_log_address: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            state_update_period_secs: 1,
            state_update_burst_limit: 10,
            servers_file: "servers.json".to_string(),
            config_reload_secs: 1800, // 30 minutes
            status_update_secs: 10,
            rcon_timeout_ms: 5000,
            poll_timeout_ms: 8000,
            shutdown_grace_secs: 5,
            rcon_log_address: None,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_address: env::var("BIND_ADDRESS").unwrap_or(defaults.bind_address),
            port: env_or("PORT", defaults.port),
            state_update_period_secs: env_or("STATE_UPDATE_PERIOD_SECS", defaults.state_update_period_secs),
            state_update_burst_limit: env_or("STATE_UPDATE_BURST_LIMIT", defaults.state_update_burst_limit),
            servers_file: env::var("SERVERS_FILE").unwrap_or(defaults.servers_file),
            config_reload_secs: env_or("CONFIG_RELOAD_SECS", defaults.config_reload_secs),
            status_update_secs: env_or("STATUS_UPDATE_SECS", defaults.status_update_secs),
            rcon_timeout_ms: env_or("RCON_TIMEOUT_MS", defaults.rcon_timeout_ms),
            poll_timeout_ms: env_or("POLL_TIMEOUT_MS", defaults.poll_timeout_ms),
            shutdown_grace_secs: env_or("SHUTDOWN_GRACE_SECS", defaults.shutdown_grace_secs),
            rcon_log_address: env::var("RCON_LOG_ADDRESS").ok().filter(|v| !v.is_empty()),
        }
    }

    pub fn bind(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    pub fn exec_timeout(&self) -> Duration {
        Duration::from_millis(self.rcon_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn poller_settings(&self) -> PollerSettings {
        PollerSettings {
            status_interval: Duration::from_secs(self.status_update_secs.max(1)),
            reload_interval: Duration::from_secs(self.config_reload_secs.max(1)),
            poll_timeout: Duration::from_millis(self.poll_timeout_ms),
            log_address: self.rcon_log_address.clone(),
        }
    }

    pub fn state_update_quota(&self) -> Quota {
        let burst = NonZeroU32::new(self.state_update_burst_limit).unwrap_or(NonZeroU32::MIN);
        Quota::with_period(Duration::from_secs(self.state_update_period_secs))
            .unwrap_or_else(|| Quota::per_second(burst))
            .allow_burst(burst)
    }
}
