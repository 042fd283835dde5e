use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use lanework_core::app::StoreWritePolicy;
use lanework_core::handlers::MailerConfig;
use lanework_core::queue::RetryPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Background job server: HTTP submission API plus per-lane workers.
#[derive(Debug, Clone, Parser)]
#[command(name = "lanework", version, about)]
pub struct Config {
    #[arg(long, env = "API_PORT", default_value_t = 3000)]
    pub api_port: u16,

    /// SQLite URL, or `memory` for a non-durable in-process store.
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://lanework.db")]
    pub database_url: String,

    /// Directory for CSV_EXPORT output files.
    #[arg(long, env = "OUTPUT_DIR", default_value = "output")]
    pub output_dir: PathBuf,

    #[arg(long, env = "MAIL_HOST", default_value = "mailhog")]
    pub mail_host: String,

    #[arg(long, env = "MAIL_PORT", default_value_t = 1025)]
    pub mail_port: u16,

    #[arg(long, env = "MAIL_FROM", default_value = "noreply@example.com")]
    pub mail_from: String,

    #[arg(long, env = "HIGH_CONCURRENCY", default_value_t = 1)]
    pub high_concurrency: usize,

    #[arg(long, env = "DEFAULT_CONCURRENCY", default_value_t = 1)]
    pub default_concurrency: usize,

    #[arg(long, env = "MAX_ATTEMPTS", default_value_t = 3)]
    pub max_attempts: u32,

    /// Backoff before the second attempt; doubles for each later one.
    #[arg(long, env = "BASE_DELAY_MS", default_value_t = 1000)]
    pub base_delay_ms: u64,

    /// Tries per status write. 1 means best effort.
    #[arg(long, env = "STORE_WRITE_ATTEMPTS", default_value_t = 1)]
    pub store_write_attempts: u32,

    /// Let unknown job types spend the retry budget instead of failing at once.
    #[arg(long, env = "RETRY_UNKNOWN_TYPES", default_value_t = false)]
    pub retry_unknown_types: bool,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,
}

impl Config {
    pub fn uses_memory_store(&self) -> bool {
        self.database_url.eq_ignore_ascii_case("memory")
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
            .with_base_delay(Duration::from_millis(self.base_delay_ms))
            .with_retry_permanent(self.retry_unknown_types)
    }

    pub fn write_policy(&self) -> StoreWritePolicy {
        if self.store_write_attempts <= 1 {
            StoreWritePolicy::best_effort()
        } else {
            StoreWritePolicy::retrying(self.store_write_attempts, Duration::from_millis(200))
        }
    }

    pub fn mailer(&self) -> MailerConfig {
        MailerConfig {
            host: self.mail_host.clone(),
            port: self.mail_port,
            from: self.mail_from.clone(),
            ..MailerConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_deployment() {
        let config = Config::try_parse_from(["lanework"]).unwrap();
        assert_eq!(config.api_port, 3000);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.high_concurrency, 1);
        assert_eq!(config.default_concurrency, 1);
        assert_eq!(config.retry_policy().next_delay(1), Duration::from_millis(1000));
        assert_eq!(config.retry_policy().next_delay(2), Duration::from_millis(2000));
        assert_eq!(config.write_policy(), StoreWritePolicy::best_effort());
        assert_eq!(config.mailer().port, 1025);
    }

    #[test]
    fn flags_override_defaults() {
        let config = Config::try_parse_from([
            "lanework",
            "--database-url",
            "memory",
            "--base-delay-ms",
            "10",
            "--store-write-attempts",
            "3",
            "--retry-unknown-types",
            "--log-format",
            "pretty",
        ])
        .unwrap();
        assert!(config.uses_memory_store());
        assert_eq!(config.retry_policy().next_delay(1), Duration::from_millis(10));
        assert!(config.retry_policy().retry_permanent);
        assert_eq!(config.write_policy().attempts, 3);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }
}
