#![allow(dead_code)]

use std::collections::HashMap;
use std::env;
use std::io::Write;

use superstore_core::config::{
    EtlConfig, CSV_PATH_VAR, DB_HOST_VAR, DB_NAME_VAR, DB_PASSWORD_VAR, DB_PORT_VAR, DB_USER_VAR,
    WAIT_INTERVAL_VAR, WAIT_MAX_ATTEMPTS_VAR,
};
use tempfile::NamedTempFile;

pub const HEADER: &str = "Order ID,Order Date,Ship Date,Ship Mode,Customer ID,Customer Name,Segment,Sales Rep,Sales Team,Sales Team Manager,Location ID,City,State,Postal Code,Region,Product ID,Category,Sub-Category,Product Name,Sales,Quantity,Discount,Profit";

/// Builds a config pointing at the test server, or `None` when the test
/// database variables are not set.
pub fn test_config(database: &str, csv: &NamedTempFile) -> Option<EtlConfig> {
    let host = env::var("SUPERSTORE_TEST_DB_HOST").ok()?;
    let user = env::var("SUPERSTORE_TEST_DB_USER").ok()?;
    let password = env::var("SUPERSTORE_TEST_DB_PASSWORD").ok()?;

    let mut vars = HashMap::from([
        (DB_HOST_VAR, host),
        (DB_USER_VAR, user),
        (DB_PASSWORD_VAR, password),
        (DB_NAME_VAR, database.to_string()),
        (CSV_PATH_VAR, csv.path().display().to_string()),
        (WAIT_INTERVAL_VAR, "1".to_string()),
        (WAIT_MAX_ATTEMPTS_VAR, "5".to_string()),
    ]);
    if let Ok(port) = env::var("SUPERSTORE_TEST_DB_PORT") {
        vars.insert(DB_PORT_VAR, port);
    }

    Some(EtlConfig::from_lookup(|var| vars.get(var).cloned()).expect("test config"))
}

pub fn skip(test: &str) {
    eprintln!(
        "Skipping {test} because SUPERSTORE_TEST_DB_HOST, SUPERSTORE_TEST_DB_USER and SUPERSTORE_TEST_DB_PASSWORD are not set"
    );
}

/// One CSV line with consistent dimension attributes derived from the keys.
#[derive(Debug, Clone)]
pub struct OrderLine {
    pub order_id: String,
    pub order_date: String,
    pub ship_date: String,
    pub customer_id: String,
    pub customer_name: String,
    pub sales_rep: String,
    pub location_id: String,
    pub product_id: String,
    pub sales: String,
    pub quantity: String,
}

impl OrderLine {
    pub fn new(order_id: &str, customer_id: &str, sales: &str, quantity: u32) -> Self {
        Self {
            order_id: order_id.to_string(),
            order_date: "11/8/2016".to_string(),
            ship_date: "11/11/2016".to_string(),
            customer_id: customer_id.to_string(),
            customer_name: format!("Customer {customer_id}"),
            sales_rep: "Anna Andreadi".to_string(),
            location_id: "US-Henderson-42420".to_string(),
            product_id: "FUR-BO-10001798".to_string(),
            sales: sales.to_string(),
            quantity: quantity.to_string(),
        }
    }

    pub fn product(mut self, product_id: &str) -> Self {
        self.product_id = product_id.to_string();
        self
    }

    pub fn location(mut self, location_id: &str) -> Self {
        self.location_id = location_id.to_string();
        self
    }

    pub fn sales_rep(mut self, sales_rep: &str) -> Self {
        self.sales_rep = sales_rep.to_string();
        self
    }

    pub fn dates(mut self, order_date: &str, ship_date: &str) -> Self {
        self.order_date = order_date.to_string();
        self.ship_date = ship_date.to_string();
        self
    }

    pub fn to_csv(&self) -> String {
        let postal = self
            .location_id
            .rsplit('-')
            .next()
            .unwrap_or("00000")
            .to_string();
        [
            self.order_id.clone(),
            self.order_date.clone(),
            self.ship_date.clone(),
            "Second Class".to_string(),
            self.customer_id.clone(),
            self.customer_name.clone(),
            "Consumer".to_string(),
            self.sales_rep.clone(),
            format!("Team of {}", self.sales_rep),
            "Alan Barnes".to_string(),
            self.location_id.clone(),
            format!("City {}", self.location_id),
            "Kentucky".to_string(),
            postal,
            "South".to_string(),
            self.product_id.clone(),
            "Furniture".to_string(),
            "Bookcases".to_string(),
            format!("\"Product {}, Oak\"", self.product_id),
            self.sales.clone(),
            self.quantity.clone(),
            "0.00".to_string(),
            "1.00".to_string(),
        ]
        .join(",")
    }
}

pub fn write_csv(lines: &[OrderLine]) -> NamedTempFile {
    let body: Vec<String> = lines.iter().map(OrderLine::to_csv).collect();
    write_raw_csv(&body)
}

pub fn write_raw_csv(lines: &[String]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp csv");
    writeln!(file, "{HEADER}").expect("write header");
    for line in lines {
        writeln!(file, "{line}").expect("write row");
    }
    file.flush().expect("flush csv");
    file
}
