//! Raw rows read from the VSA extract
//!
//! Rows keep a closed set of named fields, but each value stays as loosely
//! typed as the spreadsheet cell it came from. Interpretation belongs to the
//! normalizer and the classifier.

use chrono::NaiveDateTime;

/// Values the VSA export uses to mean "nothing here"
const PLACEHOLDERS: [&str; 8] = ["", "nan", "none", "null", "n/a", "na", "-", "#n/a"];

/// True when `s` is blank or one of the export's placeholder markers
pub fn is_placeholder(s: &str) -> bool {
    let trimmed = s.trim().to_lowercase();
    PLACEHOLDERS.contains(&trimmed.as_str())
}

/// One untyped spreadsheet cell
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RawValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
}

impl RawValue {
    /// Text cell helper, mostly for tests and recovered fragments
    pub fn text(s: impl Into<String>) -> Self {
        RawValue::Text(s.into())
    }

    /// True for empty cells and placeholder text
    pub fn is_blank(&self) -> bool {
        match self {
            RawValue::Empty => true,
            RawValue::Text(s) => is_placeholder(s),
            RawValue::Number(n) => n.is_nan(),
            _ => false,
        }
    }

    /// Trimmed textual form, or `None` when blank
    ///
    /// Whole numbers render without a fractional part, so an identifier
    /// exported as `190.0` reads back as `"190"`.
    pub fn as_text(&self) -> Option<String> {
        if self.is_blank() {
            return None;
        }
        match self {
            RawValue::Empty => None,
            RawValue::Text(s) => Some(s.trim().to_string()),
            RawValue::Number(n) => Some(format_number(*n)),
            RawValue::Bool(b) => Some(b.to_string()),
            RawValue::DateTime(dt) => {
                if dt.time() == chrono::NaiveTime::MIN {
                    Some(dt.date().format("%Y-%m-%d").to_string())
                } else {
                    Some(dt.format("%Y-%m-%d %H:%M:%S").to_string())
                }
            }
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// One row of the person roster
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExternalPersonRow {
    /// 1-based sheet row number (header is row 1)
    pub row_number: usize,
    pub user_id: RawValue,
    pub firstname: RawValue,
    pub lastname: RawValue,
    pub email: RawValue,
    pub mobile_number: RawValue,
    pub job_title: RawValue,
    pub manager_name: RawValue,
    pub entity: RawValue,
    pub contract_date: RawValue,
    pub active_label: RawValue,
    pub salary: RawValue,
}

impl ExternalPersonRow {
    /// External identifier, if present
    pub fn external_id(&self) -> Option<String> {
        self.user_id.as_text()
    }

    /// "First Last" for logs
    pub fn display_name(&self) -> String {
        let first = self.firstname.as_text().unwrap_or_default();
        let last = self.lastname.as_text().unwrap_or_default();
        format!("{} {}", first, last).trim().to_string()
    }
}

/// One row of the mission-history roster
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExternalMissionRow {
    /// 1-based sheet row number (header is row 1)
    pub row_number: usize,
    pub user_id: RawValue,
    pub order_id: RawValue,
    pub code: RawValue,
    pub client_name: RawValue,
    pub start_date: RawValue,
    pub end_date: RawValue,
    pub tjm: RawValue,
    pub cjm_f1: RawValue,
    pub cjm_f2: RawValue,
    pub title: RawValue,
    pub header_description: RawValue,
    pub summary: RawValue,
    pub description: RawValue,
}
