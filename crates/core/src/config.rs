//! Server configuration
//!
//! Every field has a default; `from_env` overrides them from `CHESS_*`
//! variables. Durations are read as whole milliseconds.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::matching::MatchSettings;

const ENV_PREFIX: &str = "CHESS_";

#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP adapter listens on. Default: 127.0.0.1:3000.
    pub bind_address: String,
    /// Pool workers, which is also the most matches running at once. Default: 64.
    pub workers: usize,
    /// Clock time each player gets for a whole game. Default: 10 min.
    pub max_time: Duration,
    /// Bound on handing one message to one player. Default: 5s.
    pub delivery_timeout: Duration,
    /// How long a finished match waits for its clients. Default: 30s.
    pub client_done_timeout: Duration,
    /// Idle time after which a login expires. Default: 30 min.
    pub session_ttl: Duration,
    /// Period of the session and match sweepers. Default: 60s.
    pub sweep_interval: Duration,
    /// `host:port` of the bot engine; no engine matches when unset.
    pub engine_address: Option<String>,
    /// Bound on reaching the engine. Default: 5s.
    pub engine_connect_timeout: Duration,
    /// Players each pool queue holds before refusing more. Default: 1024.
    pub queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:3000".to_string(),
            workers: 64,
            max_time: Duration::from_secs(600),
            delivery_timeout: Duration::from_secs(5),
            client_done_timeout: Duration::from_secs(30),
            session_ttl: Duration::from_secs(30 * 60),
            sweep_interval: Duration::from_secs(60),
            engine_address: None,
            engine_connect_timeout: Duration::from_secs(5),
            queue_capacity: 1024,
        }
    }
}

impl Config {
    /// Defaults overridden by the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each `CHESS_*` key
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        let mut config = Self::default();

        if let Some(value) = get("BIND_ADDRESS") {
            config.bind_address = value;
        }
        if let Some(value) = get("WORKERS") {
            config.workers = parse("WORKERS", &value)?;
        }
        if let Some(value) = get("MAX_TIME_MS") {
            config.max_time = millis("MAX_TIME_MS", &value)?;
        }
        if let Some(value) = get("DELIVERY_TIMEOUT_MS") {
            config.delivery_timeout = millis("DELIVERY_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = get("CLIENT_DONE_TIMEOUT_MS") {
            config.client_done_timeout = millis("CLIENT_DONE_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = get("SESSION_TTL_MS") {
            config.session_ttl = millis("SESSION_TTL_MS", &value)?;
        }
        if let Some(value) = get("SWEEP_INTERVAL_MS") {
            config.sweep_interval = millis("SWEEP_INTERVAL_MS", &value)?;
        }
        if let Some(value) = get("ENGINE_ADDRESS") {
            config.engine_address = Some(value).filter(|address| !address.trim().is_empty());
        }
        if let Some(value) = get("ENGINE_CONNECT_TIMEOUT_MS") {
            config.engine_connect_timeout = millis("ENGINE_CONNECT_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = get("QUEUE_CAPACITY") {
            config.queue_capacity = parse("QUEUE_CAPACITY", &value)?;
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bind_address.trim().is_empty() {
            return Err(Error::InvalidConfig("bind_address must not be empty".to_string()));
        }
        if self.workers == 0 {
            return Err(Error::InvalidConfig("workers must be >= 1".to_string()));
        }
        if self.queue_capacity == 0 {
            return Err(Error::InvalidConfig("queue_capacity must be >= 1".to_string()));
        }
        let durations = [
            ("max_time", self.max_time),
            ("delivery_timeout", self.delivery_timeout),
            ("client_done_timeout", self.client_done_timeout),
            ("session_ttl", self.session_ttl),
            ("sweep_interval", self.sweep_interval),
            ("engine_connect_timeout", self.engine_connect_timeout),
        ];
        for (name, value) in durations {
            if value.is_zero() {
                return Err(Error::InvalidConfig(format!("{name} must be > 0")));
            }
        }
        Ok(())
    }

    pub fn match_settings(&self) -> MatchSettings {
        MatchSettings {
            max_time: self.max_time,
            delivery_timeout: self.delivery_timeout,
            client_done_timeout: self.client_done_timeout,
            random_colors: true,
        }
    }
}

fn parse<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::InvalidConfig(format!("{ENV_PREFIX}{name}: cannot parse {value:?}")))
}

fn millis(name: &str, value: &str) -> Result<Duration> {
    parse::<u64>(name, value).map(Duration::from_millis)
}
