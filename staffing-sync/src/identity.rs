//! Identity Resolver
//!
//! Maps the external (VSA) person identifier to the internal consultant id by
//! joining on normalized email against persisted consultants. Unmatched rows
//! are omitted here; their missions surface later as `skipped_unmapped`.

use crate::models::ExternalPersonRow;
use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Trimmed, lowercase email used as the join key
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// External person id → consultant id, built once per run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentityMap {
    entries: HashMap<String, Uuid>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consultant for an external id, if resolved
    pub fn resolve(&self, external_id: &str) -> Option<Uuid> {
        self.entries.get(external_id.trim()).copied()
    }

    /// Insert a mapping, returning the previous consultant if it differed
    pub fn insert(&mut self, external_id: String, consultant_id: Uuid) -> Option<Uuid> {
        self.entries
            .insert(external_id, consultant_id)
            .filter(|previous| *previous != consultant_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Build the identity map from person rows and a persisted email index
///
/// `email_index` maps normalized consultant email → consultant id. Duplicate
/// external ids resolving to different consultants keep the last one and are
/// logged.
pub fn build_identity_map(
    persons: &[ExternalPersonRow],
    email_index: &HashMap<String, Uuid>,
) -> IdentityMap {
    let mut map = IdentityMap::new();
    let mut unmatched = 0usize;

    for row in persons {
        let Some(external_id) = row.external_id() else {
            debug!(row = row.row_number, "Person row without external id; not mappable");
            continue;
        };
        let Some(email) = row.email.as_text() else {
            debug!(row = row.row_number, external_id = %external_id, "Person row without email; not mappable");
            continue;
        };

        match email_index.get(&normalize_email(&email)) {
            Some(&consultant_id) => {
                if let Some(previous) = map.insert(external_id.clone(), consultant_id) {
                    warn!(
                        row = row.row_number,
                        external_id = %external_id,
                        %previous,
                        current = %consultant_id,
                        "Duplicate external id maps to a different consultant; keeping the last"
                    );
                }
            }
            None => {
                unmatched += 1;
                debug!(row = row.row_number, external_id = %external_id, email = %email, "No persisted consultant for email");
            }
        }
    }

    info!(
        "Identity map built: {} external ids resolved, {} persons without consultant match",
        map.len(),
        unmatched
    );

    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawValue;

    fn person(id: &str, email: &str) -> ExternalPersonRow {
        ExternalPersonRow {
            row_number: 2,
            user_id: RawValue::text(id),
            email: RawValue::text(email),
            ..Default::default()
        }
    }

    #[test]
    fn test_matches_case_insensitive_trimmed_email() {
        let eric = Uuid::new_v4();
        let index = HashMap::from([("eric.lapina@x.fr".to_string(), eric)]);

        let map = build_identity_map(&[person("190", "  Eric.Lapina@X.fr ")], &index);
        assert_eq!(map.resolve("190"), Some(eric));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_unmatched_and_emailless_rows_are_omitted() {
        let index = HashMap::from([("known@x.fr".to_string(), Uuid::new_v4())]);

        let persons = vec![person("1", "stranger@x.fr"), person("2", "")];
        let map = build_identity_map(&persons, &index);
        assert!(map.is_empty());
        assert_eq!(map.resolve("1"), None);
    }

    #[test]
    fn test_duplicate_external_id_last_write_wins() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let index = HashMap::from([
            ("first@x.fr".to_string(), first),
            ("second@x.fr".to_string(), second),
        ]);

        let persons = vec![person("7", "first@x.fr"), person("7", "second@x.fr")];
        let map = build_identity_map(&persons, &index);
        assert_eq!(map.resolve("7"), Some(second));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_numeric_ids_resolve_as_text() {
        let consultant = Uuid::new_v4();
        let index = HashMap::from([("a@x.fr".to_string(), consultant)]);
        let row = ExternalPersonRow {
            user_id: RawValue::Number(190.0),
            email: RawValue::text("a@x.fr"),
            ..Default::default()
        };

        let map = build_identity_map(&[row], &index);
        assert_eq!(map.resolve("190"), Some(consultant));
        assert_eq!(map.resolve("190.0"), None);
        assert_eq!(map.len(), 1);
    }
}
