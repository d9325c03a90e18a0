use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default)]
#[clap(about = "Agentdash pipeline feed viewer", version)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[clap(long, env = "AGENTDASH_WS_URL", help = "Feed WebSocket endpoint, e.g. ws://127.0.0.1:8765/ws.")]
    pub ws_url: Option<String>,

    #[clap(long, env = "AGENTDASH_SESSION_ID", help = "Pipeline session to follow; appended to the endpoint path.")]
    pub session_id: Option<String>,

    #[clap(long, env = "AGENTDASH_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "AGENTDASH_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "AGENTDASH_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[clap(long, env = "AGENTDASH_RECONNECT_DELAY_MS", help = "Fixed delay in milliseconds between reconnect attempts.")]
    pub reconnect_delay_ms: Option<u64>,

    #[clap(long, env = "AGENTDASH_MAX_RECONNECT_ATTEMPTS", help = "Reconnect attempts before giving up.")]
    pub max_reconnect_attempts: Option<u32>,

    #[clap(long, env = "AGENTDASH_HEARTBEAT_TIMEOUT_SECONDS", help = "Seconds of silence before the connection is presumed dead (0 disables).")]
    pub heartbeat_timeout_seconds: Option<u64>,

    #[clap(long, env = "AGENTDASH_MESSAGE_BATCH_SIZE", help = "Agent messages rendered per batch.")]
    pub message_batch_size: Option<usize>,

    #[clap(long, env = "AGENTDASH_MESSAGE_BATCH_INTERVAL_MS", help = "Maximum milliseconds a message waits before rendering.")]
    pub message_batch_interval_ms: Option<u64>,

    #[clap(long, env = "AGENTDASH_MESSAGE_LOG_CAPACITY", help = "Agent messages retained in memory.")]
    pub message_log_capacity: Option<usize>,
}

impl Config {
    // Merge two Config structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            ws_url: other.ws_url.or(self.ws_url),
            session_id: other.session_id.or(self.session_id),
            config_path: other.config_path.or(self.config_path),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            reconnect_delay_ms: other.reconnect_delay_ms.or(self.reconnect_delay_ms),
            max_reconnect_attempts: other.max_reconnect_attempts.or(self.max_reconnect_attempts),
            heartbeat_timeout_seconds: other
                .heartbeat_timeout_seconds
                .or(self.heartbeat_timeout_seconds),
            message_batch_size: other.message_batch_size.or(self.message_batch_size),
            message_batch_interval_ms: other
                .message_batch_interval_ms
                .or(self.message_batch_interval_ms),
            message_log_capacity: other.message_log_capacity.or(self.message_log_capacity),
        }
    }
}

pub fn load_config() -> Config {
    // 1. Load defaults
    let default_config = Config {
        ws_url: Some("ws://127.0.0.1:8765/ws".to_string()),
        log_dir: Some(PathBuf::from("./logs")),
        log_level: Some("info".to_string()),
        reconnect_delay_ms: Some(3000),
        max_reconnect_attempts: Some(10),
        heartbeat_timeout_seconds: Some(45),
        message_batch_size: Some(10),
        message_batch_interval_ms: Some(100),
        message_log_capacity: Some(500),
        ..Default::default()
    };

    // 2. Load from config file (dashboard_feed.conf) if present.
    //    Allow overriding the config file path with a CLI arg.
    let cli_args_for_path = Config::parse();
    let config_file_path = cli_args_for_path
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("dashboard_feed.conf"));

    let mut current_config = default_config;

    if config_file_path.exists() {
        match fs::read_to_string(&config_file_path) {
            Ok(config_str) => match serde_json::from_str::<Config>(&config_str) {
                Ok(file_config) => current_config = current_config.merge(file_config),
                Err(e) => eprintln!(
                    "Failed to parse config file {}: {}. Falling back to other sources.",
                    config_file_path.display(),
                    e
                ),
            },
            Err(e) => eprintln!(
                "Failed to read config file {}: {}. Falling back to other sources.",
                config_file_path.display(),
                e
            ),
        }
    }

    // 3. Override with environment variables and CLI arguments, which clap
    //    has already folded together.
    current_config.merge(cli_args_for_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_prefers_override() {
        let base = Config {
            ws_url: Some("ws://base".to_string()),
            reconnect_delay_ms: Some(3000),
            ..Default::default()
        };
        let over = Config {
            reconnect_delay_ms: Some(500),
            session_id: Some("run-1".to_string()),
            ..Default::default()
        };

        let merged = base.merge(over);
        assert_eq!(merged.ws_url.as_deref(), Some("ws://base"));
        assert_eq!(merged.reconnect_delay_ms, Some(500));
        assert_eq!(merged.session_id.as_deref(), Some("run-1"));
    }

    #[test]
    fn test_config_file_round_trip() {
        let json = r#"{"wsUrl": "ws://file:9000/ws", "messageBatchSize": 25}"#;
        let parsed: Config = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.ws_url.as_deref(), Some("ws://file:9000/ws"));
        assert_eq!(parsed.message_batch_size, Some(25));
        assert_eq!(parsed.log_level, None);
    }
}
