//! Database access for staffing-sync
//!
//! Every operation takes a `&mut SqliteConnection` so it can run either on a
//! pooled connection or inside the run's batch transaction.

pub mod consultants;
pub mod managers;
pub mod missions;

use staffing_common::{Error, Result};
use uuid::Uuid;

/// Parse a guid column
pub(crate) fn parse_guid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| Error::Internal(format!("Invalid guid {:?}: {}", value, e)))
}
