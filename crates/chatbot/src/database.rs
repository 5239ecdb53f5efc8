use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chatbot_migration::{Migrator, MigratorTrait};
use sea_orm::sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sea_orm::sqlx::{self, Executor};
use sea_orm::{ConnectionTrait, DatabaseConnection, SqlxSqliteConnector};
use tracing::{debug, info};

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create database directory {}", parent.display()))?;
        }
    }
    Ok(())
}

fn create_sqlite_options(path: &Path) -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(30))
        .optimize_on_close(true, None)
        .pragma("cache_size", "-16384")
        .pragma("temp_store", "MEMORY")
}

async fn database_connection(path: &Path) -> Result<DatabaseConnection> {
    let pool = SqlitePoolOptions::new()
        .max_connections(16)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(3600))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                // per-connection pragmas; the pool may open connections lazily
                conn.execute("PRAGMA busy_timeout = 30000;").await?;
                conn.execute("PRAGMA journal_mode = WAL;").await?;
                conn.execute("PRAGMA synchronous = NORMAL;").await?;

                let row: (i64,) = sqlx::query_as("PRAGMA busy_timeout;").fetch_one(&mut *conn).await?;
                tracing::debug!("new sqlite connection, busy_timeout = {}ms", row.0);
                Ok(())
            })
        })
        .connect_with(create_sqlite_options(path))
        .await?;

    debug!("sqlite pool ready at {}", path.display());
    Ok(SqlxSqliteConnector::from_sqlx_sqlite_pool(pool))
}

async fn migrate_database(path: &Path) -> Result<()> {
    if path.exists() {
        debug!("existing database found, applying pending migrations");
    } else {
        debug!("no database file yet, creating {}", path.display());
    }

    // single connection so migrations run strictly in order
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(create_sqlite_options(path))
        .await?;
    let connection = SqlxSqliteConnector::from_sqlx_sqlite_pool(pool.clone());

    Migrator::up(&connection, None).await?;

    pool.close().await;
    debug!("migrations applied, migration pool closed");
    Ok(())
}

/// Migrates the database at `path` and returns a pooled connection.
pub async fn setup_database(path: &Path) -> Result<DatabaseConnection> {
    ensure_parent_dir(path)?;
    migrate_database(path).await.context("database migration failed")?;
    let connection = database_connection(path)
        .await
        .context("failed to open database connection pool")?;
    info!("database ready: {}", path.display());
    Ok(connection)
}

/// Cheap liveness probe used by the health endpoint.
pub async fn ping(connection: &DatabaseConnection) -> Result<(), sea_orm::DbErr> {
    connection.execute_unprepared("SELECT 1").await.map(|_| ())
}

/// Fresh in-memory database with all migrations applied.
///
/// The pool holds exactly one connection that never expires, since every
/// sqlite in-memory connection is its own database.
#[cfg(test)]
pub async fn setup_memory_database() -> DatabaseConnection {
    use std::str::FromStr;

    let options = SqliteConnectOptions::from_str("sqlite::memory:").expect("valid in-memory url");
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .expect("open in-memory sqlite");
    let connection = SqlxSqliteConnector::from_sqlx_sqlite_pool(pool);
    Migrator::up(&connection, None).await.expect("apply migrations");
    connection
}
