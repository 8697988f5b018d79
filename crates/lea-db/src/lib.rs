//! lea-db - Warehouse abstraction layer for lea
//!
//! This crate provides the `Warehouse` capability trait the executor is
//! polymorphic over, a DuckDB implementation (also covering MotherDuck
//! and DuckLake connection strings), and a BigQuery stub.

pub mod bigquery;
pub mod duckdb;
pub mod error;
pub mod traits;

pub use crate::duckdb::DuckDbWarehouse;
pub use bigquery::BigQueryWarehouse;
pub use error::{DbError, DbResult};
pub use traits::{DepsResolution, Warehouse};
