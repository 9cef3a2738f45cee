//! Inventory domain types and code generation helpers.

pub mod barcode;
pub mod types;
