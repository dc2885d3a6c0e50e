use super::config::PgStoreConfig;
use crate::core::{StoreError, StoreResult};
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Build a bounded connection pool and verify the database answers before
/// handing the pool out.
pub async fn connect(config: &PgStoreConfig) -> StoreResult<PgPool> {
    config.validate().map_err(StoreError::InvalidInput)?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .max_lifetime(config.max_lifetime)
        .idle_timeout(config.idle_timeout)
        .connect_lazy_with(connect_options(config)?);

    health_check(&pool, config.health_check_timeout).await?;

    info!(
        url = %config.redacted_url(),
        max_connections = config.max_connections,
        statement_timeout_ms = config.statement_timeout.map(|t| t.as_millis() as u64),
        "connected to PostgreSQL"
    );
    Ok(pool)
}

/// Per-connection options. A configured statement timeout becomes the
/// session's `statement_timeout`, so the server aborts an overrunning
/// statement (SQLSTATE 57014) instead of letting it commit after the
/// caller has given up.
pub fn connect_options(config: &PgStoreConfig) -> StoreResult<PgConnectOptions> {
    let options = PgConnectOptions::from_str(&config.database_url)
        .map_err(|err| StoreError::invalid_input(format!("invalid database url: {}", err)))?;

    Ok(match config.statement_timeout {
        Some(timeout) => options.options([(
            "statement_timeout",
            format!("{}ms", timeout.as_millis().max(1)),
        )]),
        None => options,
    })
}

/// Round-trip a trivial statement, failing with `Unavailable` if the database
/// does not answer within `timeout`.
pub async fn health_check(pool: &PgPool, timeout: Duration) -> StoreResult<()> {
    match tokio::time::timeout(timeout, sqlx::query("SELECT 1").execute(pool)).await {
        Ok(result) => {
            result?;
            Ok(())
        }
        Err(_) => Err(StoreError::unavailable(format!(
            "health check timed out after {:?}",
            timeout
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;

    #[test]
    fn test_statement_timeout_is_sent_to_server() {
        let config = PgStoreConfig::new("postgres://calendar@localhost/calendar")
            .statement_timeout(Duration::from_millis(300));

        let options = connect_options(&config).unwrap();
        let sent = options.get_options().unwrap_or_default();
        assert!(sent.contains("statement_timeout=300ms"), "options were: {}", sent);
    }

    #[test]
    fn test_no_statement_timeout_by_default() {
        let config = PgStoreConfig::new("postgres://calendar@localhost/calendar");

        let options = connect_options(&config).unwrap();
        assert!(options.get_options().is_none());
    }

    #[test]
    fn test_malformed_url_is_invalid_input() {
        let config = PgStoreConfig::new("not a url");

        let err = connect_options(&config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
