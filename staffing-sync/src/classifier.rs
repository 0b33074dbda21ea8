//! Role Classifier
//!
//! Assigns every person row of the roster to exactly one role. Rules are
//! evaluated in order, first match wins:
//! 1. **Named override**: normalized first+last name or email listed in the
//!    configuration forces a fixed role
//! 2. **Practice-director carve-out**: job titles such as "Directeur de
//!    Practice" are consultants even if they read manager-like
//! 3. **Manager phrases**: case-insensitive substring match on the job title
//! 4. **Default**: consultant
//!
//! A manager-classified row is only materialized when at least one consultant
//! reports to it (or an override forces it); the rest are dropped so noisy
//! source rows do not create orphan managers.

use crate::models::ExternalPersonRow;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Organizational role of one person row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    BusinessManager,
    Consultant,
}

/// Explicit correction for a person the title heuristic gets wrong
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RoleOverride {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub role: Role,
}

/// Classification rules (phrases and overrides)
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierRules {
    pub manager_phrases: Vec<String>,
    pub practice_director_phrases: Vec<String>,
    pub overrides: Vec<RoleOverride>,
}

impl Default for ClassifierRules {
    fn default() -> Self {
        Self {
            manager_phrases: default_manager_phrases(),
            practice_director_phrases: default_practice_director_phrases(),
            overrides: Vec::new(),
        }
    }
}

pub fn default_manager_phrases() -> Vec<String> {
    [
        "business manager",
        "ingénieur d'affaires",
        "ingenieur d'affaires",
        "account manager",
        "directeur commercial",
        "responsable commercial",
        "directeur d'agence",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

pub fn default_practice_director_phrases() -> Vec<String> {
    vec![
        "directeur de practice".to_string(),
        "practice director".to_string(),
    ]
}

/// Lowercase, unify apostrophes, collapse whitespace
fn normalize_text(s: &str) -> String {
    s.to_lowercase()
        .replace('\u{2019}', "'")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Order-insensitive key for a person's display name
///
/// "LAPINA Eric", "Eric Lapina" and " eric  lapina " share one key.
pub fn display_name_key(name: &str) -> String {
    let mut tokens: Vec<String> = name
        .split_whitespace()
        .map(|t| t.to_lowercase())
        .collect();
    tokens.sort();
    tokens.join(" ")
}

fn person_name_key(first: &str, last: &str) -> String {
    display_name_key(&format!("{} {}", first, last))
}

fn row_name_key(row: &ExternalPersonRow) -> Option<String> {
    let key = display_name_key(&row.display_name());
    if key.is_empty() {
        None
    } else {
        Some(key)
    }
}

struct CompiledOverride {
    name_key: Option<String>,
    email: Option<String>,
    role: Role,
}

/// Title heuristic plus named overrides
pub struct RoleClassifier {
    manager_phrases: Vec<String>,
    practice_director_phrases: Vec<String>,
    overrides: Vec<CompiledOverride>,
}

impl RoleClassifier {
    pub fn new(rules: &ClassifierRules) -> Self {
        let overrides = rules
            .overrides
            .iter()
            .map(|o| CompiledOverride {
                name_key: match (&o.first_name, &o.last_name) {
                    (Some(first), Some(last)) => Some(person_name_key(first, last)),
                    _ => None,
                },
                email: o
                    .email
                    .as_ref()
                    .map(|e| e.trim().to_lowercase())
                    .filter(|e| !e.is_empty()),
                role: o.role,
            })
            .collect();

        Self {
            manager_phrases: rules.manager_phrases.iter().map(|p| normalize_text(p)).collect(),
            practice_director_phrases: rules
                .practice_director_phrases
                .iter()
                .map(|p| normalize_text(p))
                .collect(),
            overrides,
        }
    }

    /// Role forced by a named override, if any
    pub fn override_for(&self, row: &ExternalPersonRow) -> Option<Role> {
        let name_key = row_name_key(row);
        let email = row.email.as_text().map(|e| e.to_lowercase());

        self.overrides
            .iter()
            .find(|o| {
                let by_name = o.name_key.is_some() && o.name_key == name_key;
                let by_email = o.email.is_some() && o.email == email;
                by_name || by_email
            })
            .map(|o| o.role)
    }

    /// Classify one person row
    pub fn classify(&self, row: &ExternalPersonRow) -> Role {
        if let Some(role) = self.override_for(row) {
            debug!(row = row.row_number, ?role, "Role forced by override");
            return role;
        }

        let title = normalize_text(&row.job_title.as_text().unwrap_or_default());

        if self
            .practice_director_phrases
            .iter()
            .any(|p| title.contains(p.as_str()))
        {
            return Role::Consultant;
        }

        if self.manager_phrases.iter().any(|p| title.contains(p.as_str())) {
            return Role::BusinessManager;
        }

        Role::Consultant
    }

    /// Name keys of managers forced by override, referenced or not
    fn forced_manager_keys(&self) -> impl Iterator<Item = &String> {
        self.overrides
            .iter()
            .filter(|o| o.role == Role::BusinessManager)
            .filter_map(|o| o.name_key.as_ref())
    }
}

/// People split by role, after dropping unreferenced managers
#[derive(Debug, Default)]
pub struct ClassifiedPeople {
    pub managers: Vec<ExternalPersonRow>,
    pub consultants: Vec<ExternalPersonRow>,
    pub dropped_managers: Vec<ExternalPersonRow>,
}

/// Name keys of every manager referenced by at least one consultant row,
/// plus managers forced by override
pub fn referenced_managers<'a>(
    consultants: impl IntoIterator<Item = &'a ExternalPersonRow>,
    classifier: &RoleClassifier,
) -> BTreeSet<String> {
    let mut keys: BTreeSet<String> = consultants
        .into_iter()
        .filter_map(|row| row.manager_name.as_text())
        .map(|name| display_name_key(&name))
        .filter(|key| !key.is_empty())
        .collect();

    keys.extend(classifier.forced_manager_keys().cloned());
    keys
}

/// Classify every row, keeping only managers somebody reports to
pub fn partition_people(
    persons: &[ExternalPersonRow],
    classifier: &RoleClassifier,
) -> ClassifiedPeople {
    let mut people = ClassifiedPeople::default();
    let mut candidate_managers = Vec::new();

    for row in persons {
        match classifier.classify(row) {
            Role::BusinessManager => candidate_managers.push(row.clone()),
            Role::Consultant => people.consultants.push(row.clone()),
        }
    }

    let referenced = referenced_managers(&people.consultants, classifier);

    for row in candidate_managers {
        let forced = classifier.override_for(&row) == Some(Role::BusinessManager);
        let is_referenced = row_name_key(&row)
            .map(|key| referenced.contains(&key))
            .unwrap_or(false);

        if forced || is_referenced {
            people.managers.push(row);
        } else {
            info!(
                row = row.row_number,
                name = %row.display_name(),
                "Manager-classified person has no reports; not materialized"
            );
            people.dropped_managers.push(row);
        }
    }

    info!(
        "Classified {} people: {} managers kept, {} dropped, {} consultants",
        persons.len(),
        people.managers.len(),
        people.dropped_managers.len(),
        people.consultants.len()
    );

    people
}
