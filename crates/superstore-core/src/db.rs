use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{Connection, Executor};
use tracing::{debug, warn};

use crate::config::EtlConfig;
use crate::error::{EtlError, Result};

/// Connection options for `database` on the configured server.
pub fn connect_options(config: &EtlConfig, database: &str) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.user)
        .password(&config.password)
        .database(database)
        .application_name("superstore-etl")
}

/// Opens a connection to the administrative database.
pub async fn connect_admin(config: &EtlConfig) -> Result<PgConnection> {
    connect(config, &config.admin_database).await
}

/// Opens a connection scoped to the target database.
pub async fn connect_target(config: &EtlConfig) -> Result<PgConnection> {
    connect(config, config.target_database.as_str()).await
}

async fn connect(config: &EtlConfig, database: &str) -> Result<PgConnection> {
    let conn = PgConnection::connect_with(&connect_options(config, database))
        .await
        .map_err(|source| EtlError::Connect {
            database: database.to_string(),
            source,
        })?;
    debug!(database, host = %config.host, "Opened database connection");
    Ok(conn)
}

/// Gracefully closes a connection, logging rather than failing if the
/// server has already gone away.
pub async fn close_quietly(conn: PgConnection, label: &str) {
    if let Err(err) = conn.close().await {
        warn!(connection = label, "failed to close connection cleanly: {err}");
    }
}

/// One named DDL statement. Steps run one at a time so that a failure is
/// attributable to the step that caused it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DdlStep {
    pub name: String,
    pub sql: String,
}

impl DdlStep {
    pub fn new(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
        }
    }
}

/// Executes `steps` in order on `conn`, stopping at the first failure.
/// `wrap` turns the failing step's name and the driver error into the
/// caller's stage error.
pub async fn execute_steps<W>(conn: &mut PgConnection, steps: &[DdlStep], wrap: W) -> Result<()>
where
    W: Fn(String, sqlx::Error) -> EtlError,
{
    for step in steps {
        (&mut *conn)
            .execute(step.sql.as_str())
            .await
            .map_err(|source| wrap(step.name.clone(), source))?;
        debug!(step = %step.name, "Executed DDL step");
    }
    Ok(())
}
