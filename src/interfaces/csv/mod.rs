//! CSV adapters.

pub mod product_reader;
