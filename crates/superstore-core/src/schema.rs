//! The star schema: the flat staging table, the four dimensions mined from
//! it, and the names of every constraint and index that wire them together.

/// Staging table; after normalization the same table is the fact table.
pub const ORDERS_TABLE: &str = "orders";

/// Generated primary key added to the fact table.
pub const FACT_SURROGATE_KEY: &str = "order_serial_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub sql_type: &'static str,
}

const fn col(name: &'static str, sql_type: &'static str) -> Column {
    Column { name, sql_type }
}

/// Staging columns in CSV order.
pub const STAGING_COLUMNS: [Column; 23] = [
    col("order_id", "CHAR(14)"),
    col("order_date", "DATE"),
    col("ship_date", "DATE"),
    col("ship_mode", "TEXT"),
    col("customer_id", "CHAR(8)"),
    col("customer_name", "TEXT"),
    col("segment", "TEXT"),
    col("sales_rep", "TEXT"),
    col("sales_team", "TEXT"),
    col("sales_team_manager", "TEXT"),
    col("location_id", "TEXT"),
    col("city", "TEXT"),
    col("state", "TEXT"),
    col("postal_code", "CHAR(5)"),
    col("region", "TEXT"),
    col("product_id", "CHAR(15)"),
    col("category", "TEXT"),
    col("sub_category", "TEXT"),
    col("product_name", "TEXT"),
    col("sales", "NUMERIC(10,2)"),
    col("quantity", "INTEGER"),
    col("discount", "NUMERIC(10,2)"),
    col("profit", "NUMERIC(10,2)"),
];

pub const STAGING_COLUMN_COUNT: usize = STAGING_COLUMNS.len();

/// A dimension derived as the distinct projection of `columns` from the
/// staging table. `columns[0]` is the natural key, which stays on the fact
/// table as the foreign key column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimension {
    pub table: &'static str,
    pub columns: &'static [&'static str],
    pub primary_key: &'static str,
    pub foreign_key: &'static str,
    pub index: &'static str,
}

impl Dimension {
    pub fn key_column(&self) -> &'static str {
        self.columns[0]
    }

    /// Descriptive columns that move off the staging table.
    pub fn attribute_columns(&self) -> &'static [&'static str] {
        &self.columns[1..]
    }
}

pub const CUSTOMERS: Dimension = Dimension {
    table: "customers",
    columns: &["customer_id", "customer_name", "segment"],
    primary_key: "customers_pk",
    foreign_key: "fk_customer_id",
    index: "idx_orders_customer_id",
};

pub const PRODUCT: Dimension = Dimension {
    table: "product",
    columns: &["product_id", "product_name", "category", "sub_category"],
    primary_key: "product_pk",
    foreign_key: "fk_product_id",
    index: "idx_orders_product_id",
};

pub const SALES_TEAM: Dimension = Dimension {
    table: "sales_team",
    columns: &["sales_rep", "sales_team", "sales_team_manager"],
    primary_key: "sales_team_pk",
    foreign_key: "fk_sales_rep",
    index: "idx_orders_sales_rep",
};

pub const LOCATION: Dimension = Dimension {
    table: "location",
    columns: &["location_id", "city", "state", "postal_code", "region"],
    primary_key: "location_pk",
    foreign_key: "fk_location_id",
    index: "idx_orders_location_id",
};

pub const DIMENSIONS: [Dimension; 4] = [CUSTOMERS, PRODUCT, SALES_TEAM, LOCATION];

/// Staging columns dropped once the dimensions exist, in staging order.
pub fn pruned_columns() -> Vec<&'static str> {
    STAGING_COLUMNS
        .iter()
        .map(|c| c.name)
        .filter(|name| {
            DIMENSIONS
                .iter()
                .any(|dim| dim.attribute_columns().contains(name))
        })
        .collect()
}

/// Columns the fact table keeps (before the surrogate key is added).
pub fn fact_columns() -> Vec<&'static str> {
    let pruned = pruned_columns();
    STAGING_COLUMNS
        .iter()
        .map(|c| c.name)
        .filter(|name| !pruned.contains(name))
        .collect()
}

pub fn create_staging_table_sql() -> String {
    let columns: Vec<String> = STAGING_COLUMNS
        .iter()
        .map(|c| format!("    {} {}", c.name, c.sql_type))
        .collect();
    format!("CREATE TABLE {ORDERS_TABLE} (\n{}\n)", columns.join(",\n"))
}
