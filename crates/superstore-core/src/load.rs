//! Bulk load of the flat CSV into the staging table.

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sqlx::postgres::PgConnection;
use sqlx::Connection;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tracing::{info, warn};

use crate::db::{self, DdlStep};
use crate::error::{EtlError, Result};
use crate::schema::{create_staging_table_sql, ORDERS_TABLE, STAGING_COLUMNS, STAGING_COLUMN_COUNT};

const COPY_CHUNK_SIZE: usize = 64 * 1024;

/// Dates in the source are month/day/year regardless of server locale.
pub const DATESTYLE_SQL: &str = "SET datestyle = 'ISO, MDY'";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CsvPreflight {
    pub path: PathBuf,
    pub data_rows: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub csv_rows: u64,
    pub copied_rows: u64,
}

/// Scans the CSV once and checks every data record has the staging width.
/// Nothing is written anywhere; value parsing is left to the server.
pub fn preflight_csv(path: &Path) -> Result<CsvPreflight> {
    let file = File::open(path).map_err(|source| EtlError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file);

    let header_width = reader
        .headers()
        .map_err(|source| EtlError::Csv { line: 1, source })?
        .len();
    if header_width == 0 {
        return Err(EtlError::MalformedRow {
            line: 1,
            expected: STAGING_COLUMN_COUNT,
            found: 0,
        });
    }

    let mut data_rows = 0u64;
    for record in reader.records() {
        let record = record.map_err(|source| EtlError::Csv {
            line: source.position().map(|p| p.line()).unwrap_or(0),
            source,
        })?;
        if record.len() != STAGING_COLUMN_COUNT {
            return Err(EtlError::MalformedRow {
                line: record.position().map(|p| p.line()).unwrap_or(0),
                expected: STAGING_COLUMN_COUNT,
                found: record.len(),
            });
        }
        data_rows += 1;
    }

    Ok(CsvPreflight {
        path: path.to_path_buf(),
        data_rows,
    })
}

pub fn copy_statement() -> String {
    let columns: Vec<&str> = STAGING_COLUMNS.iter().map(|c| c.name).collect();
    format!(
        "COPY {ORDERS_TABLE} ({}) FROM STDIN WITH (FORMAT csv, DELIMITER ',')",
        columns.join(", ")
    )
}

fn staging_steps() -> Vec<DdlStep> {
    vec![
        DdlStep::new(
            "drop staging table",
            format!("DROP TABLE IF EXISTS {ORDERS_TABLE}"),
        ),
        DdlStep::new("create staging table", create_staging_table_sql()),
    ]
}

/// Creates the staging table and streams the CSV body into it with COPY.
///
/// Table creation and the copy share one transaction, committed after the
/// last byte is accepted, so the staging load is all-or-nothing.
pub async fn load_staging(conn: &mut PgConnection, csv_path: &Path) -> Result<LoadReport> {
    let preflight = preflight_csv(csv_path)?;
    info!(path = %csv_path.display(), rows = preflight.data_rows, "CSV preflight passed");

    db::execute_steps(
        conn,
        &[DdlStep::new("set datestyle", DATESTYLE_SQL)],
        load_error,
    )
    .await?;

    let mut tx = conn
        .begin()
        .await
        .map_err(|source| load_error("begin staging transaction".into(), source))?;
    let copied_rows = match create_and_copy(&mut tx, csv_path).await {
        Ok(rows) => rows,
        Err(err) => {
            if let Err(rollback) = tx.rollback().await {
                warn!("failed to roll back staging load: {rollback}");
            }
            return Err(err);
        }
    };
    tx.commit()
        .await
        .map_err(|source| load_error("commit staging load".into(), source))?;

    if copied_rows != preflight.data_rows {
        warn!(
            copied_rows,
            csv_rows = preflight.data_rows,
            "COPY row count differs from CSV record count"
        );
    }
    info!(table = ORDERS_TABLE, rows = copied_rows, "CSV data copied into staging table");

    Ok(LoadReport {
        csv_rows: preflight.data_rows,
        copied_rows,
    })
}

async fn create_and_copy(conn: &mut PgConnection, csv_path: &Path) -> Result<u64> {
    db::execute_steps(conn, &staging_steps(), load_error).await?;
    info!(table = ORDERS_TABLE, "Staging table created");
    copy_csv_body(conn, csv_path).await
}

async fn copy_csv_body(conn: &mut PgConnection, csv_path: &Path) -> Result<u64> {
    let io_error = |source| EtlError::Io {
        path: csv_path.to_path_buf(),
        source,
    };
    let file = tokio::fs::File::open(csv_path).await.map_err(io_error)?;
    let mut reader = BufReader::new(file);

    let mut header = Vec::new();
    reader.read_until(b'\n', &mut header).await.map_err(io_error)?;

    let mut copy = conn
        .copy_in_raw(&copy_statement())
        .await
        .map_err(|source| load_error("start copy".into(), source))?;

    let mut buf = vec![0u8; COPY_CHUNK_SIZE];
    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(source) => {
                if let Err(err) = copy.abort("failed reading CSV source").await {
                    warn!("failed to abort COPY: {err}");
                }
                return Err(io_error(source));
            }
        };
        copy.send(&buf[..n])
            .await
            .map_err(|source| load_error("copy csv into orders".into(), source))?;
    }

    copy.finish()
        .await
        .map_err(|source| load_error("copy csv into orders".into(), source))
}

fn load_error(step: String, source: sqlx::Error) -> EtlError {
    EtlError::Load { step, source }
}
