//! Secondary indexes on the fact table and the `customer_category` view.

use std::fmt;

use serde::Serialize;
use sqlx::postgres::PgConnection;
use tracing::info;

use crate::db::{self, DdlStep};
use crate::error::{EtlError, Result, Stage};
use crate::schema::{CUSTOMERS, DIMENSIONS, ORDERS_TABLE};

pub const CUSTOMER_CATEGORY_VIEW: &str = "customer_category";

/// Spend below this is Silver.
pub const GOLD_FLOOR_CENTS: i64 = 500_000;
/// Spend above this is Diamond; the ceiling itself is still Gold.
pub const GOLD_CEILING_CENTS: i64 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CustomerTier {
    Silver,
    Gold,
    Diamond,
}

impl CustomerTier {
    /// Tier for a total spend given in cents (`sales * quantity`, summed).
    pub fn for_spend_cents(cents: i64) -> Self {
        if cents < GOLD_FLOOR_CENTS {
            CustomerTier::Silver
        } else if cents <= GOLD_CEILING_CENTS {
            CustomerTier::Gold
        } else {
            CustomerTier::Diamond
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CustomerTier::Silver => "Silver",
            CustomerTier::Gold => "Gold",
            CustomerTier::Diamond => "Diamond",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Silver" => Some(CustomerTier::Silver),
            "Gold" => Some(CustomerTier::Gold),
            "Diamond" => Some(CustomerTier::Diamond),
            _ => None,
        }
    }
}

impl fmt::Display for CustomerTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Renders cents as an exact SQL numeric literal.
fn numeric_literal(cents: i64) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}

pub fn index_steps() -> Vec<DdlStep> {
    DIMENSIONS
        .iter()
        .map(|dim| {
            DdlStep::new(
                format!("create index {}", dim.index),
                format!(
                    "CREATE INDEX {} ON {ORDERS_TABLE} ({})",
                    dim.index,
                    dim.key_column()
                ),
            )
        })
        .collect()
}

pub fn customer_category_view_sql() -> String {
    let spend = "COALESCE(SUM(o.sales * o.quantity), 0)";
    let key = CUSTOMERS.key_column();
    format!(
        "CREATE VIEW {view} AS
SELECT
    c.{key},
    c.customer_name,
    {spend} AS amount_spent,
    CASE
        WHEN {spend} < {floor} THEN '{silver}'
        WHEN {spend} <= {ceiling} THEN '{gold}'
        ELSE '{diamond}'
    END AS customer_category
FROM {customers} AS c
LEFT JOIN {ORDERS_TABLE} AS o USING ({key})
GROUP BY c.{key}, c.customer_name
ORDER BY amount_spent DESC, c.{key}",
        view = CUSTOMER_CATEGORY_VIEW,
        customers = CUSTOMERS.table,
        floor = numeric_literal(GOLD_FLOOR_CENTS),
        ceiling = numeric_literal(GOLD_CEILING_CENTS),
        silver = CustomerTier::Silver,
        gold = CustomerTier::Gold,
        diamond = CustomerTier::Diamond,
    )
}

pub fn view_steps() -> Vec<DdlStep> {
    vec![
        DdlStep::new(
            format!("drop view {CUSTOMER_CATEGORY_VIEW}"),
            format!("DROP VIEW IF EXISTS {CUSTOMER_CATEGORY_VIEW}"),
        ),
        DdlStep::new(
            format!("create view {CUSTOMER_CATEGORY_VIEW}"),
            customer_category_view_sql(),
        ),
    ]
}

pub async fn create_indexes(conn: &mut PgConnection) -> Result<()> {
    db::execute_steps(conn, &index_steps(), |step, source| EtlError::Reporting {
        step,
        stage: Stage::Index,
        source,
    })
    .await?;
    info!(count = DIMENSIONS.len(), "Foreign key indexes created");
    Ok(())
}

pub async fn create_customer_category_view(conn: &mut PgConnection) -> Result<()> {
    db::execute_steps(conn, &view_steps(), |step, source| EtlError::Reporting {
        step,
        stage: Stage::View,
        source,
    })
    .await?;
    info!(view = CUSTOMER_CATEGORY_VIEW, "Reporting view created");
    Ok(())
}
