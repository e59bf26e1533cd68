//! Configuration handling for the data-access layer.
//!
//! This module provides configuration management via CLI arguments and environment
//! variables, and turns it into the connection options used to build the pool.

use crate::error::{DbError, DbResult};
use clap::{Parser, Subcommand};
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_DRIVER: &str = "postgres";
pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 5432;
pub const DEFAULT_USER: &str = "postgres";
pub const DEFAULT_DBNAME: &str = "postgres";
pub const DEFAULT_SSLMODE: &str = "disable";

// Initial connection retry defaults
pub const DEFAULT_CONNECT_ATTEMPTS: u32 = 12;
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 5;

// Pool configuration defaults
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_MIN_CONNECTIONS: u32 = 1;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_STATEMENT_TIMEOUT_SECS: u64 = 30;

/// Keys accepted in a key/value DSN.
const DSN_KEYS: &[&str] = &[
    "user",
    "password",
    "dbname",
    "host",
    "port",
    "sslmode",
    "application_name",
];

/// Connection pool configuration options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolOptions {
    /// Maximum connections in pool
    pub max_connections: u32,
    /// Minimum idle connections kept open
    pub min_connections: u32,
    /// Idle timeout in seconds
    pub idle_timeout_secs: u64,
    /// Connection acquire timeout in seconds
    pub acquire_timeout_secs: u64,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
        }
    }
}

impl PoolOptions {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    /// Validate pool options and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_connections == 0 {
            return Err("max_connections must be greater than 0".to_string());
        }
        if self.min_connections > self.max_connections {
            return Err(format!(
                "min_connections ({}) cannot exceed max_connections ({})",
                self.min_connections, self.max_connections
            ));
        }
        Ok(())
    }
}

/// Bounded retry for establishing the pool at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub attempts: u32,
    /// Pause between two consecutive attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_CONNECT_ATTEMPTS,
            delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
        }
    }
}

impl RetryPolicy {
    /// A single attempt with no delay.
    pub fn once() -> Self {
        Self {
            attempts: 1,
            delay: Duration::ZERO,
        }
    }
}

/// Everything needed to open the pool.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub driver: String,
    /// Explicit DSN; overrides the individual parts below when set.
    pub dsn: Option<String>,
    pub user: String,
    /// Sensitive - never logged.
    pub password: String,
    pub dbname: String,
    pub host: String,
    pub port: u16,
    pub sslmode: String,
    pub pool_options: PoolOptions,
    pub retry: RetryPolicy,
    pub statement_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DEFAULT_DRIVER.to_string(),
            dsn: None,
            user: DEFAULT_USER.to_string(),
            password: String::new(),
            dbname: DEFAULT_DBNAME.to_string(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            sslmode: DEFAULT_SSLMODE.to_string(),
            pool_options: PoolOptions::default(),
            retry: RetryPolicy::default(),
            statement_timeout: Duration::from_secs(DEFAULT_STATEMENT_TIMEOUT_SECS),
        }
    }
}

impl DatabaseConfig {
    /// Config for an explicit DSN with default pool and retry settings.
    pub fn from_dsn(dsn: impl Into<String>) -> Self {
        Self {
            dsn: Some(dsn.into()),
            ..Self::default()
        }
    }

    /// The DSN used to connect.
    ///
    /// Format: `user=<u> password=<p> dbname=<d> host=<h> port=<p> sslmode=<m>`
    pub fn dsn(&self) -> String {
        match &self.dsn {
            Some(dsn) => dsn.clone(),
            None => format!(
                "user={} password={} dbname={} host={} port={} sslmode={}",
                self.user, self.password, self.dbname, self.host, self.port, self.sslmode
            ),
        }
    }

    /// The DSN with the password masked, for logs.
    pub fn redacted_dsn(&self) -> String {
        redact_dsn(&self.dsn())
    }

    /// Reject configuration that no amount of retrying can fix.
    pub fn validate(&self) -> DbResult<()> {
        if self.driver != DEFAULT_DRIVER {
            return Err(DbError::configuration(format!(
                "unsupported driver: {}; only postgres is supported",
                self.driver
            )));
        }
        self.pool_options
            .validate()
            .map_err(DbError::configuration)?;
        if self.retry.attempts == 0 {
            return Err(DbError::configuration(
                "connect attempts must be greater than 0",
            ));
        }
        parse_dsn(&self.dsn()).map(|_| ())
    }
}

/// Parse a key/value DSN (or a `postgres://` URL) into connect options.
///
/// Values cannot contain whitespace. Unknown keys, a non-numeric port and an
/// unknown `sslmode` are configuration errors.
pub fn parse_dsn(dsn: &str) -> DbResult<PgConnectOptions> {
    let dsn = dsn.trim();
    if dsn.starts_with("postgres://") || dsn.starts_with("postgresql://") {
        return PgConnectOptions::from_str(dsn)
            .map_err(|e| DbError::configuration(format!("invalid database URL: {}", e)));
    }

    let mut options = PgConnectOptions::new_without_pgpass();
    for pair in dsn.split_whitespace() {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| DbError::configuration(format!("invalid DSN segment: '{}'", pair)))?;
        let key = key.to_ascii_lowercase();
        if !DSN_KEYS.contains(&key.as_str()) {
            return Err(DbError::configuration(format!("unknown DSN key: '{}'", key)));
        }

        options = match key.as_str() {
            "user" => options.username(value),
            "password" => options.password(value),
            "dbname" => options.database(value),
            "host" => options.host(value),
            "port" => options.port(value.parse().map_err(|_| {
                DbError::configuration(format!("invalid port in DSN: '{}'", value))
            })?),
            "sslmode" => options.ssl_mode(PgSslMode::from_str(value).map_err(|_| {
                DbError::configuration(format!("invalid sslmode in DSN: '{}'", value))
            })?),
            _ => options.application_name(value),
        };
    }
    Ok(options)
}

/// Mask the password of a key/value DSN or URL.
fn redact_dsn(dsn: &str) -> String {
    if let Some(scheme_end) = dsn.find("://") {
        let rest = &dsn[scheme_end + 3..];
        if let Some(at) = rest.find('@') {
            let userinfo = &rest[..at];
            if let Some(colon) = userinfo.find(':') {
                return format!(
                    "{}{}:***{}",
                    &dsn[..scheme_end + 3],
                    &userinfo[..colon],
                    &rest[at..]
                );
            }
        }
        return dsn.to_string();
    }

    dsn.split_whitespace()
        .map(|pair| match pair.split_once('=') {
            Some((key, _)) if key.eq_ignore_ascii_case("password") => format!("{}=***", key),
            _ => pair.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Bootstrap operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Connect, ping the database and exit
    Ping,
    /// Create every registered table (idempotent)
    CreateTables,
    /// Drop every registered table in reverse registration order
    DropTables,
    /// Drop then recreate every registered table
    Reset,
}

/// Configuration for the bootstrap binary.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "game-data",
    about = "Bootstrap the game database - connect, create and drop registered tables",
    version,
    author
)]
pub struct Config {
    /// Database driver (only "postgres" is supported)
    #[arg(long, default_value = DEFAULT_DRIVER, env = "DB_DRIVER")]
    pub driver: String,

    /// Full DSN; overrides the individual connection parts
    #[arg(long, env = "DB_DSN", hide_env_values = true)]
    pub dsn: Option<String>,

    /// Database user
    #[arg(long, default_value = DEFAULT_USER, env = "DB_USER")]
    pub user: String,

    /// Database password
    #[arg(long, default_value = "", env = "DB_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Database name
    #[arg(long, default_value = DEFAULT_DBNAME, env = "DB_NAME")]
    pub dbname: String,

    /// Database host
    #[arg(long, default_value = DEFAULT_HOST, env = "DB_HOST")]
    pub host: String,

    /// Database port
    #[arg(long, default_value_t = DEFAULT_PORT, env = "DB_PORT")]
    pub port: u16,

    /// TLS mode (disable, prefer, require, ...)
    #[arg(long, default_value = DEFAULT_SSLMODE, env = "DB_SSLMODE")]
    pub sslmode: String,

    /// Attempts to establish the pool before giving up
    #[arg(long, default_value_t = DEFAULT_CONNECT_ATTEMPTS, env = "DB_CONNECT_ATTEMPTS")]
    pub connect_attempts: u32,

    /// Seconds to wait between connection attempts
    #[arg(long, default_value_t = DEFAULT_RETRY_DELAY_SECS, env = "DB_RETRY_DELAY")]
    pub retry_delay_secs: u64,

    /// Maximum pooled connections
    #[arg(long, default_value_t = DEFAULT_MAX_CONNECTIONS, env = "DB_MAX_CONNECTIONS")]
    pub max_connections: u32,

    /// Minimum pooled connections
    #[arg(long, default_value_t = DEFAULT_MIN_CONNECTIONS, env = "DB_MIN_CONNECTIONS")]
    pub min_connections: u32,

    /// Seconds to wait for a pooled connection
    #[arg(long, default_value_t = DEFAULT_ACQUIRE_TIMEOUT_SECS, env = "DB_ACQUIRE_TIMEOUT")]
    pub acquire_timeout_secs: u64,

    /// Seconds an idle pooled connection is kept
    #[arg(long, default_value_t = DEFAULT_IDLE_TIMEOUT_SECS, env = "DB_IDLE_TIMEOUT")]
    pub idle_timeout_secs: u64,

    /// Per-statement timeout in seconds
    #[arg(long, default_value_t = DEFAULT_STATEMENT_TIMEOUT_SECS, env = "DB_STATEMENT_TIMEOUT")]
    pub statement_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "LOG_JSON")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Config {
    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            driver: DEFAULT_DRIVER.to_string(),
            dsn: None,
            user: DEFAULT_USER.to_string(),
            password: String::new(),
            dbname: DEFAULT_DBNAME.to_string(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            sslmode: DEFAULT_SSLMODE.to_string(),
            connect_attempts: DEFAULT_CONNECT_ATTEMPTS,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            statement_timeout_secs: DEFAULT_STATEMENT_TIMEOUT_SECS,
            log_level: "info".to_string(),
            json_logs: false,
            command: None,
        }
    }

    /// The bootstrap operation to run, `ping` when none was given.
    pub fn command(&self) -> Command {
        self.command.unwrap_or(Command::Ping)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.connect_attempts,
            delay: Duration::from_secs(self.retry_delay_secs),
        }
    }

    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            max_connections: self.max_connections,
            min_connections: self.min_connections,
            idle_timeout_secs: self.idle_timeout_secs,
            acquire_timeout_secs: self.acquire_timeout_secs,
        }
    }

    /// Collect the connection settings.
    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            driver: self.driver.clone(),
            dsn: self.dsn.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
            dbname: self.dbname.clone(),
            host: self.host.clone(),
            port: self.port,
            sslmode: self.sslmode.clone(),
            pool_options: self.pool_options(),
            retry: self.retry_policy(),
            statement_timeout: Duration::from_secs(self.statement_timeout_secs),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}
