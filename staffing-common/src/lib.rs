//! # Staffing Common Library
//!
//! Shared code for the staffing tools including:
//! - Persisted entity models (business managers, consultants, missions)
//! - Database initialization and the destructive schema reset
//! - Configuration file loading and root folder resolution
//! - Common error types

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
