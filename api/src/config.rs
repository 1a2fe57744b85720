use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use tenant_query::{QueryLimits, RawSqlGuard};

pub const DEFAULT_DATABASE_URL: &str = "sqlite:./billing.db?mode=rwc";

/// Bounds applied while an ad-hoc or raw statement occupies a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionLimits {
    pub timeout: Duration,
    pub max_rows: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(5000),
            max_rows: 1000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub max_connections: u32,
    pub query_limits: QueryLimits,
    pub raw_sql_guard: RawSqlGuard,
    pub execution: ExecutionLimits,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            port: 8080,
            max_connections: 5,
            query_limits: QueryLimits::default(),
            raw_sql_guard: RawSqlGuard::default(),
            execution: ExecutionLimits::default(),
        }
    }
}

impl AppConfig {
    /// Reads the process environment. Unparseable values fall back to the
    /// default and are logged, so a typo never takes the server down.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let query_limits = QueryLimits {
            default_limit: env_or("QUERY_DEFAULT_LIMIT", defaults.query_limits.default_limit),
            max_limit: env_or("QUERY_MAX_LIMIT", defaults.query_limits.max_limit),
        };
        let timeout_ms = env_or(
            "RAW_SQL_TIMEOUT_MS",
            defaults.execution.timeout.as_millis() as u64,
        );

        Self {
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            port: env_or("PORT", defaults.port),
            max_connections: env_or("DATABASE_MAX_CONNECTIONS", defaults.max_connections),
            query_limits,
            raw_sql_guard: RawSqlGuard::new(env_or(
                "RAW_SQL_MAX_LENGTH",
                defaults.raw_sql_guard.max_length(),
            )),
            execution: ExecutionLimits {
                timeout: Duration::from_millis(timeout_ms),
                max_rows: env_or("RAW_SQL_MAX_ROWS", defaults.execution.max_rows),
            },
        }
    }
}

fn env_or<T>(name: &str, default: T) -> T
where
    T: FromStr + Display,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid {}={:?}, using default {}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}
