//! Adapters implementing the domain ports.

pub mod clock;
pub mod identity;
pub mod in_memory;
pub mod password;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
