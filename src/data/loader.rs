//! CSV loading for retail sales rows
//!
//! Required columns: `qty`, `unit_price`, `freight_price`, `month`.
//! Optional columns default to 0 when absent or empty, which the state
//! encoder reads as "missing".

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{Reader, StringRecord};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{PricingError, Result};
use crate::rl::core::RetailRow;

pub const REQUIRED_COLUMNS: [&str; 4] = ["qty", "unit_price", "freight_price", "month"];
pub const OPTIONAL_COLUMNS: [&str; 4] = ["comp_1", "lag_price", "inventory_level", "demand_forecast"];

#[derive(Debug, Deserialize)]
struct CsvRow {
    qty: f64,
    unit_price: f64,
    freight_price: f64,
    month: f64,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    comp_1: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    lag_price: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    inventory_level: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    demand_forecast: Option<f64>,
    #[serde(default)]
    product_id: Option<String>,
}

impl From<CsvRow> for RetailRow {
    fn from(row: CsvRow) -> Self {
        RetailRow {
            quantity: row.qty,
            unit_price: row.unit_price,
            freight_cost: row.freight_price,
            month: row.month.round().clamp(1.0, 12.0) as u32,
            competitor_price: row.comp_1.unwrap_or(0.0),
            lag_price: row.lag_price.unwrap_or(0.0),
            inventory_level: row.inventory_level.unwrap_or(0.0),
            demand_forecast: row.demand_forecast.unwrap_or(0.0),
        }
    }
}

/// Loader for retail sales CSV files
#[derive(Debug, Clone, Default)]
pub struct RetailDataLoader {
    product: Option<String>,
}

impl RetailDataLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only rows whose `product_id` matches
    pub fn with_product(mut self, product: impl Into<String>) -> Self {
        self.product = Some(product.into());
        self
    }

    /// Load rows from a CSV file
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<Vec<RetailRow>> {
        let file = File::open(path.as_ref())?;
        let rows = self.read_rows(file)?;
        info!("Loaded {} rows from {:?}", rows.len(), path.as_ref());
        Ok(rows)
    }

    /// Load rows from any CSV source
    pub fn read_rows<R: Read>(&self, source: R) -> Result<Vec<RetailRow>> {
        let mut reader = Reader::from_reader(source);
        let headers = reader.headers()?.clone();
        check_columns(&headers, self.product.is_some())?;

        let mut rows = Vec::new();
        for record in reader.deserialize() {
            let row: CsvRow = record?;
            if let Some(product) = &self.product {
                if row.product_id.as_deref() != Some(product.as_str()) {
                    continue;
                }
            }
            rows.push(RetailRow::from(row));
        }

        if rows.is_empty() {
            return Err(PricingError::EmptyDataset);
        }
        Ok(rows)
    }
}

fn check_columns(headers: &StringRecord, needs_product: bool) -> Result<()> {
    let has = |name: &str| headers.iter().any(|h| h == name);

    for column in REQUIRED_COLUMNS {
        if !has(column) {
            return Err(PricingError::MissingColumn(column.to_string()));
        }
    }
    if needs_product && !has("product_id") {
        return Err(PricingError::MissingColumn("product_id".to_string()));
    }

    let absent: Vec<&str> = OPTIONAL_COLUMNS
        .into_iter()
        .filter(|column| !has(*column))
        .collect();
    if !absent.is_empty() {
        debug!("Optional columns absent, defaulting to 0: {}", absent.join(", "));
    }
    Ok(())
}
