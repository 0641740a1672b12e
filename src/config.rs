//! Gateway configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Strategy choices are read once at
//! startup and never change for the life of the process.

use std::net::SocketAddr;
use std::time::Duration;

use crate::domain::RegistryKind;
use crate::executor::ExecutorStrategy;

/// Errors raised while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `LISTEN_ADDR` is not a socket address.
    #[error("invalid LISTEN_ADDR: {0}")]
    ListenAddr(#[from] std::net::AddrParseError),

    /// A strategy variable names an unknown implementation.
    #[error("{key}: {message}")]
    UnknownStrategy {
        /// Environment variable name.
        key: &'static str,
        /// Parser message.
        message: String,
    },
}

/// Top-level gateway configuration.
///
/// Loaded once at startup via [`PushConfig::from_env`].
#[derive(Debug, Clone)]
pub struct PushConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:3000`).
    pub listen_addr: SocketAddr,

    /// Executor running wire sends.
    pub push_executor: ExecutorStrategy,

    /// Executor running in-process listener notification.
    pub event_executor: ExecutorStrategy,

    /// Connection registry implementation.
    pub registry: RegistryKind,

    /// Per-connection outbound frame queue capacity.
    pub outbound_queue_capacity: usize,

    /// Capacity of the EventBus broadcast channel.
    pub event_bus_capacity: usize,

    /// Interval of the stale-connection sweep; `None` disables it.
    pub sweep_interval: Option<Duration>,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            push_executor: ExecutorStrategy::Inline,
            event_executor: ExecutorStrategy::Inline,
            registry: RegistryKind::Sharded,
            outbound_queue_capacity: 256,
            event_bus_capacity: 10_000,
            sweep_interval: Some(Duration::from_secs(30)),
        }
    }
}

impl PushConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to [`PushConfig::default`] values when a variable is not
    /// set. Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is set but cannot be parsed as a
    /// [`SocketAddr`], or if `PUSH_EXECUTOR`, `EVENT_EXECUTOR` or
    /// `CONNECTION_REGISTRY` names an unknown strategy.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let listen_addr = match std::env::var("LISTEN_ADDR") {
            Ok(addr) => addr.parse()?,
            Err(_) => defaults.listen_addr,
        };

        let push_executor = executor_from_env("PUSH_EXECUTOR")?;
        let event_executor = executor_from_env("EVENT_EXECUTOR")?;

        let registry = match std::env::var("CONNECTION_REGISTRY") {
            Ok(name) => name
                .parse()
                .map_err(|message| ConfigError::UnknownStrategy {
                    key: "CONNECTION_REGISTRY",
                    message,
                })?,
            Err(_) => defaults.registry,
        };

        let outbound_queue_capacity =
            parse_env("OUTBOUND_QUEUE_CAPACITY", defaults.outbound_queue_capacity);
        let event_bus_capacity = parse_env("EVENT_BUS_CAPACITY", defaults.event_bus_capacity);
        let sweep_interval = match parse_env("SWEEP_INTERVAL_SECS", 30_u64) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Ok(Self {
            listen_addr,
            push_executor,
            event_executor,
            registry,
            outbound_queue_capacity,
            event_bus_capacity,
            sweep_interval,
        })
    }
}

/// Reads `<PREFIX>`, `<PREFIX>_LANES` and `<PREFIX>_LANE_CAPACITY`.
fn executor_from_env(prefix: &'static str) -> Result<ExecutorStrategy, ConfigError> {
    let Ok(name) = std::env::var(prefix) else {
        return Ok(ExecutorStrategy::Inline);
    };
    let lanes = parse_env(&format!("{prefix}_LANES"), ExecutorStrategy::DEFAULT_LANES);
    let lane_capacity = parse_env(
        &format!("{prefix}_LANE_CAPACITY"),
        ExecutorStrategy::DEFAULT_LANE_CAPACITY,
    );
    ExecutorStrategy::parse(&name, lanes, lane_capacity).map_err(|message| {
        ConfigError::UnknownStrategy {
            key: prefix,
            message,
        }
    })
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
