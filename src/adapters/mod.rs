//! Concrete adapter implementations for ports.

#[cfg(feature = "sqlite")]
pub mod sqlite_store;
pub mod csv_export;
pub mod csv_import;
pub mod file_config_adapter;
pub mod memory_cache;
pub mod memory_store;
