//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

/// Default marker a worker emits when its task is done.
pub const DEFAULT_COMPLETION_TOKEN: &str = "TASK_COMPLETE";

/// Default prefix that flags a turn's output as a cross-worker announcement.
pub const DEFAULT_BROADCAST_PREFIX: &str = "BROADCAST:";

/// Fleet scheduling configuration.
#[derive(Debug, Clone)]
pub struct FleetConfig {
    /// Scheduler tick interval.
    pub tick_interval: Duration,
    /// Minimum gap between the end of one turn and the start of the next.
    pub turn_cooldown: Duration,
    /// Recovery manager check interval.
    pub recovery_interval: Duration,
    /// Literal substring that marks a worker's task as complete.
    pub completion_token: String,
    /// Literal prefix that marks a worker's output as a broadcast.
    pub broadcast_prefix: String,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(100),
            turn_cooldown: Duration::from_millis(800),
            recovery_interval: Duration::from_secs(1),
            completion_token: DEFAULT_COMPLETION_TOKEN.to_string(),
            broadcast_prefix: DEFAULT_BROADCAST_PREFIX.to_string(),
        }
    }
}

impl FleetConfig {
    /// Build from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            tick_interval: env_millis("AI_FLEET_TICK_MS").unwrap_or(defaults.tick_interval),
            turn_cooldown: env_millis("AI_FLEET_COOLDOWN_MS").unwrap_or(defaults.turn_cooldown),
            recovery_interval: env_millis("AI_FLEET_RECOVERY_MS")
                .unwrap_or(defaults.recovery_interval),
            ..defaults
        }
    }

    /// Config with no cool-down, for driving ticks by hand.
    pub fn without_cooldown() -> Self {
        Self {
            turn_cooldown: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// HTTP server and storage configuration for the binary.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub db_path: PathBuf,
    /// Directory for rolling log files (None = stderr only).
    pub log_dir: Option<PathBuf>,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let port: u16 = std::env::var("AI_FLEET_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .unwrap_or(8080);

        let db_path = std::env::var("AI_FLEET_DB_PATH")
            .unwrap_or_else(|_| "./data/ai-fleet.db".to_string())
            .into();

        let log_dir = std::env::var("AI_FLEET_LOG_DIR").ok().map(PathBuf::from);

        Self {
            port,
            db_path,
            log_dir,
        }
    }
}

fn env_millis(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_fleet_timing() {
        let config = FleetConfig::default();
        assert_eq!(config.tick_interval, Duration::from_millis(100));
        assert_eq!(config.turn_cooldown, Duration::from_millis(800));
        assert_eq!(config.recovery_interval, Duration::from_secs(1));
        assert_eq!(config.completion_token, "TASK_COMPLETE");
        assert_eq!(config.broadcast_prefix, "BROADCAST:");
    }

    #[test]
    fn without_cooldown_keeps_other_defaults() {
        let config = FleetConfig::without_cooldown();
        assert_eq!(config.turn_cooldown, Duration::ZERO);
        assert_eq!(config.tick_interval, Duration::from_millis(100));
    }

    #[test]
    fn env_millis_ignores_missing_keys() {
        assert!(env_millis("AI_FLEET_TEST_KEY_THAT_IS_NEVER_SET").is_none());
    }
}
