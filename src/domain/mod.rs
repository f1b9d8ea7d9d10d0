//! Core domain types and logic.

pub mod observation;
pub mod records;
pub mod selection;
pub mod weights;
pub mod differ;
pub mod returns;
pub mod builder;
pub mod build_guard;
pub mod query;
pub mod config_validation;
pub mod dates;
pub mod format;
pub mod error;
