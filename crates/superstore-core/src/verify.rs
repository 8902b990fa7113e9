use serde::Serialize;
use sqlx::postgres::PgConnection;
use tracing::info;

use crate::error::{EtlError, Result, Stage};
use crate::load::LoadReport;
use crate::schema::{DIMENSIONS, ORDERS_TABLE};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableCount {
    pub table: &'static str,
    pub rows: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub database: String,
    pub wait_attempts: Option<u32>,
    pub csv_rows: u64,
    pub staged_rows: u64,
    pub fact_rows: i64,
    pub dimensions: Vec<TableCount>,
}

async fn count_rows(conn: &mut PgConnection, table: &'static str) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {table}");
    sqlx::query_scalar::<_, i64>(&sql)
        .fetch_one(&mut *conn)
        .await
        .map_err(|source| EtlError::Reporting {
            step: format!("count {table}"),
            stage: Stage::Verify,
            source,
        })
}

/// Counts the final tables and checks that normalization neither dropped
/// nor duplicated fact rows.
pub async fn verify(
    conn: &mut PgConnection,
    database: &str,
    wait_attempts: Option<u32>,
    load: &LoadReport,
) -> Result<RunSummary> {
    let fact_rows = count_rows(conn, ORDERS_TABLE).await?;
    if u64::try_from(fact_rows).ok() != Some(load.copied_rows) {
        return Err(EtlError::Verification(format!(
            "{ORDERS_TABLE} holds {fact_rows} rows but {} were copied",
            load.copied_rows
        )));
    }

    let mut dimensions = Vec::with_capacity(DIMENSIONS.len());
    for dim in &DIMENSIONS {
        let rows = count_rows(conn, dim.table).await?;
        dimensions.push(TableCount {
            table: dim.table,
            rows,
        });
    }

    info!(fact_rows, "Row counts verified");
    Ok(RunSummary {
        database: database.to_string(),
        wait_attempts,
        csv_rows: load.csv_rows,
        staged_rows: load.copied_rows,
        fact_rows,
        dimensions,
    })
}
