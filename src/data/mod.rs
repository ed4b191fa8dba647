//! Retail data ingestion

mod loader;

pub use loader::{RetailDataLoader, OPTIONAL_COLUMNS, REQUIRED_COLUMNS};
