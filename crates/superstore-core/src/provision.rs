use tracing::info;

use crate::config::EtlConfig;
use crate::db::{self, DdlStep};
use crate::error::{EtlError, Result};
use crate::ident::Identifier;

/// Drop-then-create statements for the target database.
pub fn provision_steps(target: &Identifier) -> Vec<DdlStep> {
    vec![
        DdlStep::new(
            format!("drop database {target}"),
            format!("DROP DATABASE IF EXISTS {}", target.quoted()),
        ),
        DdlStep::new(
            format!("create database {target}"),
            format!("CREATE DATABASE {}", target.quoted()),
        ),
    ]
}

/// Destroys and recreates the target database from the administrative
/// database. Statements run outside any transaction block, which
/// `CREATE DATABASE` requires.
pub async fn provision_database(config: &EtlConfig) -> Result<()> {
    let mut conn = db::connect_admin(config).await?;
    let result = db::execute_steps(
        &mut conn,
        &provision_steps(&config.target_database),
        |step, source| EtlError::Provision { step, source },
    )
    .await;
    db::close_quietly(conn, "admin").await;
    result?;

    info!(database = %config.target_database, "Target database recreated");
    Ok(())
}
