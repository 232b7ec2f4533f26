//! Data types for the table extraction pipeline.

pub mod config;
pub mod document;
pub mod schema;
pub mod stats;
pub mod table;
pub mod unit;
