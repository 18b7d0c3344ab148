use std::time::Duration;

use clap::Parser;

use protocol::DEFAULT_MAX_LINE_LEN;

pub const DEFAULT_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_WRITE_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Command line flags for the chat-server binary
#[derive(Debug, Parser)]
#[command(name = "chat-server", version, about = "Multi-client broadcast chat server")]
pub struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = DEFAULT_ADDR)]
    pub addr: String,

    /// Longest accepted client line in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_LINE_LEN)]
    pub max_line_length: usize,

    /// Give up on a single recipient write after this many milliseconds
    #[arg(long, default_value_t = DEFAULT_WRITE_TIMEOUT_MS)]
    pub write_timeout_ms: u64,

    /// Log filter, overridden by RUST_LOG when set
    #[arg(long, default_value = DEFAULT_LOG_LEVEL)]
    pub log_level: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub addr: String,
    pub max_line_length: usize,
    pub write_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            addr: DEFAULT_ADDR.to_owned(),
            max_line_length: DEFAULT_MAX_LINE_LEN,
            write_timeout: Duration::from_millis(DEFAULT_WRITE_TIMEOUT_MS),
        }
    }
}

impl From<&Args> for ServerConfig {
    fn from(args: &Args) -> Self {
        ServerConfig {
            addr: args.addr.clone(),
            max_line_length: args.max_line_length,
            write_timeout: Duration::from_millis(args.write_timeout_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_server_config() {
        let args = Args::try_parse_from(["chat-server"]).unwrap();
        assert_eq!(ServerConfig::from(&args), ServerConfig::default());
        assert_eq!(args.log_level, "info");
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::try_parse_from([
            "chat-server", "-a", "127.0.0.1:9000", "--max-line-length", "128",
            "--write-timeout-ms", "250", "--log-level", "debug",
        ]).unwrap();
        let config = ServerConfig::from(&args);

        assert_eq!(config.addr, "127.0.0.1:9000");
        assert_eq!(config.max_line_length, 128);
        assert_eq!(config.write_timeout, Duration::from_millis(250));
        assert_eq!(args.log_level, "debug");
    }

    #[test]
    fn rejects_non_numeric_timeout() {
        assert!(Args::try_parse_from(["chat-server", "--write-timeout-ms", "soon"]).is_err());
    }
}
