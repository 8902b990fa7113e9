//! Splits the flat staging table into four dimensions plus a fact table.
//!
//! The whole plan runs inside one transaction: if any constraint cannot be
//! created, every derived table and every pruned column is rolled back with
//! it. Order matters and is fixed by [`Phase`]:
//!
//! 1. derive each dimension as a `SELECT DISTINCT` over the staging table
//! 2. drop the descriptive columns that now live in the dimensions
//! 3. add each dimension's primary key (with `NOT NULL`, in one statement)
//! 4. add the fact surrogate key, then one foreign key per dimension
//!
//! A foreign key before its primary key is impossible, and a dimension
//! derived from a different snapshot than the fact rows would leave dangling
//! references. The normalizer never repairs data; a violation aborts.

use sqlx::postgres::PgConnection;
use sqlx::{Connection, Executor};
use tracing::{debug, info, warn};

use crate::db::DdlStep;
use crate::error::{EtlError, Result};
use crate::schema::{pruned_columns, Dimension, DIMENSIONS, FACT_SURROGATE_KEY, ORDERS_TABLE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    DeriveDimensions,
    PruneStaging,
    DimensionKeys,
    FactConstraints,
}

impl Phase {
    pub fn describe(self) -> &'static str {
        match self {
            Phase::DeriveDimensions => "dimension tables derived",
            Phase::PruneStaging => "redundant staging columns dropped",
            Phase::DimensionKeys => "dimension primary keys added",
            Phase::FactConstraints => "fact surrogate key and foreign keys added",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStep {
    pub phase: Phase,
    pub table: &'static str,
    pub step: DdlStep,
}

impl PlannedStep {
    fn new(phase: Phase, table: &'static str, name: String, sql: String) -> Self {
        Self {
            phase,
            table,
            step: DdlStep::new(name, sql),
        }
    }
}

fn derive_dimension(dim: &Dimension) -> [PlannedStep; 2] {
    [
        PlannedStep::new(
            Phase::DeriveDimensions,
            dim.table,
            format!("drop table {}", dim.table),
            format!("DROP TABLE IF EXISTS {}", dim.table),
        ),
        PlannedStep::new(
            Phase::DeriveDimensions,
            dim.table,
            format!("create dimension {}", dim.table),
            format!(
                "CREATE TABLE {} AS SELECT DISTINCT {} FROM {ORDERS_TABLE}",
                dim.table,
                dim.columns.join(", ")
            ),
        ),
    ]
}

fn prune_staging() -> PlannedStep {
    let drops: Vec<String> = pruned_columns()
        .into_iter()
        .map(|column| format!("DROP COLUMN {column}"))
        .collect();
    PlannedStep::new(
        Phase::PruneStaging,
        ORDERS_TABLE,
        format!("drop redundant columns from {ORDERS_TABLE}"),
        format!("ALTER TABLE {ORDERS_TABLE} {}", drops.join(", ")),
    )
}

/// The primary key and the NOT NULL go in one ALTER so a nullable key can
/// never exist, even transiently.
fn dimension_key(dim: &Dimension) -> PlannedStep {
    let key = dim.key_column();
    PlannedStep::new(
        Phase::DimensionKeys,
        dim.table,
        format!("primary key {}", dim.table),
        format!(
            "ALTER TABLE {} ADD CONSTRAINT {} PRIMARY KEY ({key}), ALTER COLUMN {key} SET NOT NULL",
            dim.table, dim.primary_key
        ),
    )
}

fn fact_surrogate_key() -> PlannedStep {
    PlannedStep::new(
        Phase::FactConstraints,
        ORDERS_TABLE,
        format!("surrogate key {ORDERS_TABLE}"),
        format!("ALTER TABLE {ORDERS_TABLE} ADD COLUMN {FACT_SURROGATE_KEY} SERIAL PRIMARY KEY"),
    )
}

fn fact_foreign_key(dim: &Dimension) -> PlannedStep {
    let key = dim.key_column();
    PlannedStep::new(
        Phase::FactConstraints,
        dim.table,
        format!("foreign key {}", dim.foreign_key),
        format!(
            "ALTER TABLE {ORDERS_TABLE} ADD CONSTRAINT {} FOREIGN KEY ({key}) REFERENCES {} ({key})",
            dim.foreign_key, dim.table
        ),
    )
}

/// Every statement the normalizer runs, in execution order.
pub fn normalization_plan() -> Vec<PlannedStep> {
    let mut plan = Vec::new();
    for dim in &DIMENSIONS {
        plan.extend(derive_dimension(dim));
    }
    plan.push(prune_staging());
    plan.extend(DIMENSIONS.iter().map(dimension_key));
    plan.push(fact_surrogate_key());
    plan.extend(DIMENSIONS.iter().map(fact_foreign_key));
    plan
}

/// Runs [`normalization_plan`] in a single transaction.
pub async fn normalize(conn: &mut PgConnection) -> Result<()> {
    let plan = normalization_plan();

    let mut tx = conn.begin().await.map_err(|source| EtlError::Normalize {
        step: "begin normalization transaction".into(),
        source,
    })?;

    match execute_plan(&mut tx, &plan).await {
        Ok(()) => {
            tx.commit().await.map_err(|source| EtlError::Normalize {
                step: "commit normalization".into(),
                source,
            })?;
            info!("Normalization committed");
            Ok(())
        }
        Err(err) => {
            if let Err(rollback) = tx.rollback().await {
                warn!("failed to roll back normalization: {rollback}");
            }
            Err(err)
        }
    }
}

async fn execute_plan(conn: &mut PgConnection, plan: &[PlannedStep]) -> Result<()> {
    for (i, planned) in plan.iter().enumerate() {
        (&mut *conn)
            .execute(planned.step.sql.as_str())
            .await
            .map_err(|source| EtlError::Normalize {
                step: planned.step.name.clone(),
                source,
            })?;
        debug!(step = %planned.step.name, "Executed normalization step");

        let phase_done = plan
            .get(i + 1)
            .map_or(true, |next| next.phase != planned.phase);
        if phase_done {
            info!(phase = ?planned.phase, "Normalization: {}", planned.phase.describe());
        }
    }
    Ok(())
}
