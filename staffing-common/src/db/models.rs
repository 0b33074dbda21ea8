//! Persisted entity models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Business manager (persisted)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessManager {
    pub guid: Uuid,
    pub last_name: String,
    pub first_name: String,
    /// Unique, lowercase
    pub email: String,
    pub phone: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl BusinessManager {
    pub fn new(last_name: String, first_name: String, email: String) -> Self {
        Self {
            guid: Uuid::new_v4(),
            last_name,
            first_name,
            email,
            phone: None,
            active: true,
            created_at: Utc::now(),
        }
    }
}

/// Consultant (persisted)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consultant {
    pub guid: Uuid,
    pub last_name: String,
    pub first_name: String,
    /// Unique, lowercase; the identity join key
    pub email: String,
    pub phone: Option<String>,
    pub salary: Option<f64>,
    pub active: bool,
    /// Company / entity label (`EntiteCollab`)
    pub company: Option<String>,
    pub contract_date: Option<NaiveDate>,
}

impl Consultant {
    pub fn new(last_name: String, first_name: String, email: String) -> Self {
        Self {
            guid: Uuid::new_v4(),
            last_name,
            first_name,
            email,
            phone: None,
            salary: None,
            active: true,
            company: None,
            contract_date: None,
        }
    }
}

/// Canonical mission status, derived from dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissionStatus {
    /// Open-ended or ending in the future
    Active,
    /// Ended in the past
    Terminee,
}

impl MissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MissionStatus::Active => "active",
            MissionStatus::Terminee => "terminee",
        }
    }

    /// `active` unless the end date is known and strictly before `today`
    pub fn from_end_date(end_date: Option<NaiveDate>, today: NaiveDate) -> Self {
        match end_date {
            Some(end) if end < today => MissionStatus::Terminee,
            _ => MissionStatus::Active,
        }
    }
}

impl std::str::FromStr for MissionStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "active" => Ok(MissionStatus::Active),
            "terminee" => Ok(MissionStatus::Terminee),
            other => Err(crate::Error::InvalidInput(format!(
                "Unknown mission status: {}",
                other
            ))),
        }
    }
}

/// One real-world engagement after consolidating all of its fragments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalMission {
    pub consultant_id: Uuid,
    /// Unique per consultant
    pub mission_code: String,
    pub client_name: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub daily_rate: Option<f64>,
    pub status: MissionStatus,
}
