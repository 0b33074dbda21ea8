//! Errors shared by the store and config layers

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Store, filesystem and configuration failures
#[derive(Error, Debug)]
pub enum Error {
    /// SQLite statement or connection failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Creating the database directory failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unreadable config file, bad environment value or rejected setting
    #[error("Configuration error: {0}")]
    Config(String),

    /// Stored or supplied value outside its domain (e.g. an unknown mission status)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Store row that cannot be decoded, or a batch used after it closed
    #[error("Internal error: {0}")]
    Internal(String),
}
