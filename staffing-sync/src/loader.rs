//! Record Loader
//!
//! Reads the person and mission sheets of the VSA workbook into ordered,
//! loosely-typed rows. Purely structural: the first row of each sheet is the
//! header, columns are located by header name, values are copied as-is.
//! Expected columns missing from a header are logged (the field then reads
//! as empty) but never rejected here.

use crate::error::{SyncError, SyncResult};
use crate::models::{ExternalMissionRow, ExternalPersonRow, RawValue};
use calamine::{open_workbook_auto, Data, Range, Reader};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// Person sheet column headers
pub mod person_columns {
    pub const USER_ID: &str = "user_id";
    pub const FIRSTNAME: &str = "firstname";
    pub const LASTNAME: &str = "lastname";
    pub const EMAIL: &str = "email";
    pub const MOBILE_NUMBER: &str = "mobile_number";
    pub const JOB_TITLE: &str = "job_title";
    pub const MANAGER_NAME: &str = "ManagerName";
    pub const ENTITY: &str = "EntiteCollab";
    pub const CONTRACT_DATE: &str = "contract_date";
    pub const ACTIVE: &str = "UseActive";
    pub const SALARY: &str = "Salaire";

    pub const ALL: [&str; 11] = [
        USER_ID, FIRSTNAME, LASTNAME, EMAIL, MOBILE_NUMBER, JOB_TITLE, MANAGER_NAME, ENTITY,
        CONTRACT_DATE, ACTIVE, SALARY,
    ];
}

/// Mission sheet column headers
pub mod mission_columns {
    pub const USER_ID: &str = "user_id";
    pub const ORDER_ID: &str = "order_id";
    pub const CODE: &str = "code";
    pub const CLIENT: &str = "name";
    pub const START: &str = "DateDebutMission";
    pub const END: &str = "DateFinMission";
    pub const TJM: &str = "TJM";
    pub const CJM_F1: &str = "CJM_f1";
    pub const CJM_F2: &str = "CJM_f2";
    pub const TITLE: &str = "TITRE";
    pub const HEADER_DESCRIPTION: &str = "description_Entete";
    pub const SUMMARY: &str = "RESUME";
    pub const DESCRIPTION: &str = "Description";

    pub const ALL: [&str; 13] = [
        USER_ID, ORDER_ID, CODE, CLIENT, START, END, TJM, CJM_F1, CJM_F2, TITLE,
        HEADER_DESCRIPTION, SUMMARY, DESCRIPTION,
    ];
}

/// Both rosters, in source order
#[derive(Debug, Default)]
pub struct LoadedRecords {
    pub persons: Vec<ExternalPersonRow>,
    pub missions: Vec<ExternalMissionRow>,
}

/// Open the workbook and read both named sheets
pub fn load_workbook(
    path: &Path,
    person_sheet: &str,
    mission_sheet: &str,
) -> SyncResult<LoadedRecords> {
    let mut workbook = open_workbook_auto(path).map_err(|e| SyncError::SourceUnavailable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let sheet_names = workbook.sheet_names();
    for sheet in [person_sheet, mission_sheet] {
        if !sheet_names.iter().any(|name| name == sheet) {
            return Err(SyncError::SheetNotFound(sheet.to_string()));
        }
    }

    let person_range = workbook
        .worksheet_range(person_sheet)
        .map_err(|e| SyncError::SourceUnavailable {
            path: path.to_path_buf(),
            reason: format!("sheet {}: {}", person_sheet, e),
        })?;
    let mission_range = workbook
        .worksheet_range(mission_sheet)
        .map_err(|e| SyncError::SourceUnavailable {
            path: path.to_path_buf(),
            reason: format!("sheet {}: {}", mission_sheet, e),
        })?;

    let records = LoadedRecords {
        persons: person_rows(&person_range, person_sheet),
        missions: mission_rows(&mission_range, mission_sheet),
    };

    info!(
        "Loaded {} person rows from '{}' and {} mission rows from '{}'",
        records.persons.len(),
        person_sheet,
        records.missions.len(),
        mission_sheet
    );

    Ok(records)
}

/// Convert one calamine cell without interpreting it
pub fn raw_value(cell: &Data) -> RawValue {
    match cell {
        Data::Empty => RawValue::Empty,
        Data::String(s) => RawValue::Text(s.clone()),
        Data::Int(n) => RawValue::Number(*n as f64),
        Data::Float(f) => RawValue::Number(*f),
        Data::Bool(b) => RawValue::Bool(*b),
        Data::Error(e) => RawValue::Text(format!("#ERR({:?})", e)),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(value) => RawValue::DateTime(value),
            None => RawValue::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) => RawValue::Text(s.clone()),
        Data::DurationIso(s) => RawValue::Text(s.clone()),
    }
}

/// Header lookup for one sheet
struct SheetColumns {
    index: HashMap<String, usize>,
}

impl SheetColumns {
    fn from_header(header: &[Data], sheet: &str, expected: &[&str]) -> Self {
        let index: HashMap<String, usize> = header
            .iter()
            .enumerate()
            .filter_map(|(i, cell)| match cell {
                Data::String(name) => Some((name.trim().to_string(), i)),
                _ => None,
            })
            .collect();

        for column in expected {
            if !index.contains_key(*column) {
                warn!(sheet, column, "Expected column missing from header; values read as empty");
            }
        }

        Self { index }
    }

    fn get(&self, row: &[Data], column: &str) -> RawValue {
        self.index
            .get(column)
            .and_then(|&i| row.get(i))
            .map(raw_value)
            .unwrap_or(RawValue::Empty)
    }
}

/// Rows after the header, with their 1-based sheet row numbers, skipping
/// rows where every cell is empty
fn data_rows<'a>(range: &'a Range<Data>) -> impl Iterator<Item = (usize, &'a [Data])> + 'a {
    let first_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);
    range
        .rows()
        .enumerate()
        .skip(1)
        .filter(|(_, cells)| cells.iter().any(|c| !matches!(c, Data::Empty)))
        .map(move |(offset, cells)| (first_row + offset + 1, cells))
}

/// Read person rows from a sheet range
pub fn person_rows(range: &Range<Data>, sheet: &str) -> Vec<ExternalPersonRow> {
    use person_columns as col;

    let Some(header) = range.rows().next() else {
        warn!(sheet, "Sheet is empty");
        return Vec::new();
    };
    let columns = SheetColumns::from_header(header, sheet, &col::ALL);

    data_rows(range)
        .map(|(row_number, cells)| ExternalPersonRow {
            row_number,
            user_id: columns.get(cells, col::USER_ID),
            firstname: columns.get(cells, col::FIRSTNAME),
            lastname: columns.get(cells, col::LASTNAME),
            email: columns.get(cells, col::EMAIL),
            mobile_number: columns.get(cells, col::MOBILE_NUMBER),
            job_title: columns.get(cells, col::JOB_TITLE),
            manager_name: columns.get(cells, col::MANAGER_NAME),
            entity: columns.get(cells, col::ENTITY),
            contract_date: columns.get(cells, col::CONTRACT_DATE),
            active_label: columns.get(cells, col::ACTIVE),
            salary: columns.get(cells, col::SALARY),
        })
        .collect()
}

/// Read mission rows from a sheet range
pub fn mission_rows(range: &Range<Data>, sheet: &str) -> Vec<ExternalMissionRow> {
    use mission_columns as col;

    let Some(header) = range.rows().next() else {
        warn!(sheet, "Sheet is empty");
        return Vec::new();
    };
    let columns = SheetColumns::from_header(header, sheet, &col::ALL);

    data_rows(range)
        .map(|(row_number, cells)| ExternalMissionRow {
            row_number,
            user_id: columns.get(cells, col::USER_ID),
            order_id: columns.get(cells, col::ORDER_ID),
            code: columns.get(cells, col::CODE),
            client_name: columns.get(cells, col::CLIENT),
            start_date: columns.get(cells, col::START),
            end_date: columns.get(cells, col::END),
            tjm: columns.get(cells, col::TJM),
            cjm_f1: columns.get(cells, col::CJM_F1),
            cjm_f2: columns.get(cells, col::CJM_F2),
            title: columns.get(cells, col::TITLE),
            header_description: columns.get(cells, col::HEADER_DESCRIPTION),
            summary: columns.get(cells, col::SUMMARY),
            description: columns.get(cells, col::DESCRIPTION),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(rows: &[&[Data]]) -> Range<Data> {
        let width = rows.iter().map(|r| r.len()).max().unwrap_or(1) as u32;
        let mut range = Range::new((0, 0), (rows.len() as u32 - 1, width - 1));
        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                range.set_value((r as u32, c as u32), cell.clone());
            }
        }
        range
    }

    fn s(value: &str) -> Data {
        Data::String(value.to_string())
    }

    #[test]
    fn test_mission_rows_follow_header_names() {
        let range = sheet(&[
            &[s("code"), s("user_id"), s("TJM"), s("name")],
            &[s("AFFAS263"), Data::Float(190.0), Data::Int(500), s("ACME")],
            &[Data::Empty, Data::Empty, Data::Empty, Data::Empty],
            &[s(""), Data::Float(42.0), s("n/a"), Data::Empty],
        ]);

        let rows = mission_rows(&range, "Missions");
        assert_eq!(rows.len(), 2, "blank rows are skipped");

        assert_eq!(rows[0].row_number, 2);
        assert_eq!(rows[0].code, RawValue::text("AFFAS263"));
        assert_eq!(rows[0].user_id, RawValue::Number(190.0));
        assert_eq!(rows[0].tjm, RawValue::Number(500.0));
        assert_eq!(rows[0].client_name, RawValue::text("ACME"));
        // Column absent from the header
        assert_eq!(rows[0].order_id, RawValue::Empty);

        assert_eq!(rows[1].row_number, 4);
        assert_eq!(rows[1].tjm, RawValue::text("n/a"));
    }

    #[test]
    fn test_person_rows_preserve_source_order() {
        let range = sheet(&[
            &[s("user_id"), s("firstname"), s("lastname"), s("email")],
            &[Data::Int(190), s("Eric"), s("LAPINA"), s("eric.lapina@x.fr")],
            &[Data::Int(191), s("Jane"), s("DOE"), Data::Empty],
        ]);

        let rows = person_rows(&range, "Collaborateurs");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].external_id(), Some("190".to_string()));
        assert_eq!(rows[1].display_name(), "Jane DOE");
        assert_eq!(rows[1].email, RawValue::Empty);
    }

    #[test]
    fn test_missing_workbook_is_source_unavailable() {
        let result = load_workbook(Path::new("/nonexistent/vsa_export.xlsx"), "A", "B");
        assert!(matches!(result, Err(SyncError::SourceUnavailable { .. })));
    }
}
