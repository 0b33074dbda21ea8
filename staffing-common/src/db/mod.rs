//! Database models and schema management

pub mod init;
pub mod models;

pub use init::*;
pub use models::*;
