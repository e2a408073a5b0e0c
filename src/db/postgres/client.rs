use anyhow::Context;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use log::{info, warn};
use std::time::Duration;
use tokio_postgres::NoTls;

use crate::config::PostgresSettings;

const CONNECT_ATTEMPTS: u32 = 3;

/// Exponential backoff base between connection attempts
const CONNECT_BACKOFF_MS: u64 = 100;

const SCHEMA_PATH: &str = "schema/postgres.sql";

/// Split SQL into statements, respecting `$$ ... $$` quoted bodies.
fn split_sql_statements(sql: &str) -> Vec<&str> {
    let bytes = sql.as_bytes();
    let mut statements = Vec::new();
    let mut in_dollar_quote = false;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'$' if bytes.get(i + 1) == Some(&b'$') => {
                in_dollar_quote = !in_dollar_quote;
                i += 2;
                continue;
            },
            b';' if !in_dollar_quote => {
                statements.push(&sql[start..i]);
                start = i + 1;
            },
            _ => {},
        }
        i += 1;
    }
    statements.push(&sql[start..]);

    statements.retain(|stmt| !stmt.trim().is_empty());
    statements
}

/// PostgreSQL storage backend with connection pooling.
///
/// Holds the sync checkpoint, the pair registry and every history table.
/// Uses `deadpool-postgres` for connection management; each chunk is
/// committed in a single transaction.
#[derive(Clone)]
pub struct PostgresClient {
    pub pool: Pool,
}

impl PostgresClient {
    pub async fn new(settings: PostgresSettings) -> anyhow::Result<Self> {
        info!(
            "Connecting to PostgreSQL at {}:{}/{}",
            settings.host, settings.port, settings.database
        );

        let mut pg_config = tokio_postgres::Config::new();
        pg_config
            .host(&settings.host)
            .port(settings.port)
            .user(&settings.user)
            .password(&settings.password)
            .dbname(&settings.database);

        let mgr = Manager::from_config(
            pg_config,
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );
        let pool = Pool::builder(mgr)
            .max_size(settings.pool_size)
            .build()
            .context("Failed to create PostgreSQL connection pool")?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            match pool.get().await {
                Ok(_conn) => {
                    info!("Connected to PostgreSQL");
                    return Ok(Self { pool });
                },
                Err(e) if attempt < CONNECT_ATTEMPTS => {
                    let delay = Duration::from_millis(CONNECT_BACKOFF_MS * 2_u64.pow(attempt));
                    warn!(
                        "Failed to connect to PostgreSQL (attempt {}/{}): {}, retrying in {:?}",
                        attempt, CONNECT_ATTEMPTS, e, delay
                    );
                    tokio::time::sleep(delay).await;
                },
                Err(e) => {
                    return Err(anyhow::anyhow!(
                        "Failed to connect to PostgreSQL after {} attempts: {}",
                        CONNECT_ATTEMPTS,
                        e
                    ));
                },
            }
        }
    }

    pub(crate) async fn run_migrations(&self) -> anyhow::Result<()> {
        info!("Running PostgreSQL migrations");
        let client = self.pool.get().await?;

        let schema = tokio::fs::read_to_string(SCHEMA_PATH)
            .await
            .with_context(|| format!("Failed to read {}", SCHEMA_PATH))?;

        for stmt in split_sql_statements(&schema) {
            let stmt = stmt.trim();
            client
                .execute(stmt, &[])
                .await
                .with_context(|| format!("Failed to execute migration statement: {}", stmt))?;
        }

        info!("PostgreSQL migrations completed successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sql_statements() {
        let sql = "CREATE TABLE a (id INT);\n\nCREATE TABLE b (id INT)";
        let statements: Vec<&str> = split_sql_statements(sql).into_iter().map(str::trim).collect();
        assert_eq!(statements, vec!["CREATE TABLE a (id INT)", "CREATE TABLE b (id INT)"]);
    }

    #[test]
    fn test_split_sql_statements_keeps_dollar_quotes() {
        let sql = "CREATE FUNCTION f() RETURNS INT AS $$ SELECT 1; $$ LANGUAGE sql; SELECT 2;";
        let statements = split_sql_statements(sql);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].contains("SELECT 1;"));
    }
}
