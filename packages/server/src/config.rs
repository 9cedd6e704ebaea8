//! Command-line and environment configuration.

use std::time::Duration;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "easel-server")]
#[command(about = "Room coordination server for the Easel party game", long_about = None)]
pub struct ServerConfig {
    /// Host address to bind the server to
    #[arg(short = 'H', long, env = "EASEL_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, env = "EASEL_PORT", default_value = "8080")]
    pub port: u16,

    /// Redis URL shared by every server process; in-memory state when absent
    #[arg(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,

    /// OpenAI API key; built-in questions and placeholder pictures when absent
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Base URL of an OpenAI-compatible API
    #[arg(long, env = "OPENAI_BASE_URL")]
    pub openai_base_url: Option<String>,

    /// How long room and session state survive without writes, in seconds
    #[arg(long, env = "EASEL_STATE_TTL_SECS", default_value = "3600")]
    pub state_ttl_secs: u64,

    /// Default log level when RUST_LOG is not set
    #[arg(long, env = "EASEL_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl ServerConfig {
    pub fn state_ttl(&self) -> Duration {
        Duration::from_secs(self.state_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        // テスト項目: 引数なしでは既定値になる
        // given (前提条件):
        let args = ["easel-server"];

        // when (操作):
        let config = ServerConfig::try_parse_from(args).unwrap();

        // then (期待する結果):
        assert_eq!(config.port, 8080);
        assert_eq!(config.state_ttl(), Duration::from_secs(3600));
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_flags_override_defaults() {
        // テスト項目: コマンドライン引数で上書きできる
        // given (前提条件):
        let args = [
            "easel-server",
            "--host",
            "0.0.0.0",
            "-p",
            "3000",
            "--redis-url",
            "redis://127.0.0.1/",
            "--state-ttl-secs",
            "60",
        ];

        // when (操作):
        let config = ServerConfig::try_parse_from(args).unwrap();

        // then (期待する結果):
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.redis_url.as_deref(), Some("redis://127.0.0.1/"));
        assert_eq!(config.state_ttl_secs, 60);
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        // テスト項目: 範囲外のポート番号はエラーになる
        // given (前提条件):
        let args = ["easel-server", "--port", "70000"];

        // when (操作):
        let result = ServerConfig::try_parse_from(args);

        // then (期待する結果):
        assert!(result.is_err());
    }
}
