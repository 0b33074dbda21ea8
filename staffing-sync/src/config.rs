//! Configuration resolution for staffing-sync
//!
//! Each setting is resolved with CLI → ENV → TOML → default priority. A
//! setting found in more than one source is logged as a warning (potential
//! misconfiguration) and the highest-priority source wins.
//!
//! The TOML file is loaded first on its own (`load_toml`) so the binary can
//! install logging before resolution emits its warnings.

use crate::classifier::{
    default_manager_phrases, default_practice_director_phrases, ClassifierRules, RoleOverride,
};
use crate::consolidator::RecoveredFragment;
use serde::Deserialize;
use staffing_common::config::{
    config_file_path, default_root_folder, read_toml_file, resolve_root_folder, TomlConfig,
};
use staffing_common::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const DATABASE_ENV_VAR: &str = "STAFFING_DATABASE";
pub const WORKBOOK_ENV_VAR: &str = "STAFFING_WORKBOOK";
pub const PERSON_SHEET_ENV_VAR: &str = "STAFFING_PERSON_SHEET";
pub const MISSION_SHEET_ENV_VAR: &str = "STAFFING_MISSION_SHEET";
pub const BATCH_SIZE_ENV_VAR: &str = "STAFFING_BATCH_SIZE";
pub const DRY_RUN_ENV_VAR: &str = "STAFFING_DRY_RUN";

pub const DEFAULT_PERSON_SHEET: &str = "Collaborateurs";
pub const DEFAULT_MISSION_SHEET: &str = "Missions";
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_EMAIL_DOMAIN: &str = "example.com";
pub const DEFAULT_WORKBOOK_FILE: &str = "vsa_export.xlsx";
pub const DEFAULT_DATABASE_FILE: &str = "staffing.db";
/// Upper bound for `history_grace_days` (about a century)
pub const MAX_HISTORY_GRACE_DAYS: i64 = 36_500;

/// Full TOML file: shared bootstrap keys plus the `[import]` section
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncToml {
    #[serde(flatten)]
    pub common: TomlConfig,

    #[serde(default)]
    pub import: ImportToml,
}

/// `[import]` section
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImportToml {
    pub workbook_path: Option<PathBuf>,
    pub person_sheet: Option<String>,
    pub mission_sheet: Option<String>,
    pub batch_size: Option<usize>,
    pub dry_run: Option<bool>,
    pub default_email_domain: Option<String>,
    pub history_grace_days: Option<i64>,
    pub manager_phrases: Option<Vec<String>>,
    pub practice_director_phrases: Option<Vec<String>>,

    #[serde(default)]
    pub overrides: Vec<RoleOverride>,

    #[serde(default)]
    pub recovered_fragments: Vec<RecoveredFragment>,
}

/// Values given on the command line (highest priority)
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config: Option<PathBuf>,
    pub root_folder: Option<PathBuf>,
    pub workbook: Option<PathBuf>,
    pub person_sheet: Option<String>,
    pub mission_sheet: Option<String>,
    pub database: Option<PathBuf>,
    pub batch_size: Option<usize>,
    pub dry_run: bool,
}

/// Fully resolved configuration of one import run
#[derive(Debug, Clone)]
pub struct ImportConfig {
    pub root_folder: PathBuf,
    pub database_path: PathBuf,
    pub workbook_path: PathBuf,
    pub person_sheet: String,
    pub mission_sheet: String,
    /// Successful outcomes per commit
    pub batch_size: usize,
    /// Run everything in one transaction and roll it back
    pub dry_run: bool,
    /// Domain of emails derived for people the export lists without one
    pub default_email_domain: String,
    /// Days a consultant's first mission may trail their contract date
    /// before the history is flagged as truncated
    pub history_grace_days: i64,
    pub log_level: String,
    pub classifier: ClassifierRules,
    pub recovered_fragments: Vec<RecoveredFragment>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self::with_root(default_root_folder())
    }
}

impl ImportConfig {
    /// Compiled defaults under `root_folder`
    pub fn with_root(root_folder: PathBuf) -> Self {
        Self {
            database_path: root_folder.join(DEFAULT_DATABASE_FILE),
            workbook_path: root_folder.join(DEFAULT_WORKBOOK_FILE),
            root_folder,
            person_sheet: DEFAULT_PERSON_SHEET.to_string(),
            mission_sheet: DEFAULT_MISSION_SHEET.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            dry_run: false,
            default_email_domain: DEFAULT_EMAIL_DOMAIN.to_string(),
            history_grace_days: 0,
            log_level: "info".to_string(),
            classifier: ClassifierRules::default(),
            recovered_fragments: Vec::new(),
        }
    }

    /// Resolve every setting from CLI, environment, TOML and defaults
    pub fn resolve(cli: &CliOverrides, toml: SyncToml) -> Result<Self> {
        let SyncToml { common, import } = toml;

        let root_folder = resolve_root_folder(cli.root_folder.as_deref(), common.root_folder.as_deref());

        let database_path = resolve_setting(
            "Database path",
            cli.database.clone(),
            env_value(DATABASE_ENV_VAR).map(PathBuf::from),
            common.database_path,
        )
        .unwrap_or_else(|| root_folder.join(DEFAULT_DATABASE_FILE));

        let workbook_path = resolve_setting(
            "Workbook path",
            cli.workbook.clone(),
            env_value(WORKBOOK_ENV_VAR).map(PathBuf::from),
            import.workbook_path,
        )
        .unwrap_or_else(|| root_folder.join(DEFAULT_WORKBOOK_FILE));

        let person_sheet = resolve_setting(
            "Person sheet",
            cli.person_sheet.clone(),
            env_value(PERSON_SHEET_ENV_VAR),
            import.person_sheet,
        )
        .unwrap_or_else(|| DEFAULT_PERSON_SHEET.to_string());

        let mission_sheet = resolve_setting(
            "Mission sheet",
            cli.mission_sheet.clone(),
            env_value(MISSION_SHEET_ENV_VAR),
            import.mission_sheet,
        )
        .unwrap_or_else(|| DEFAULT_MISSION_SHEET.to_string());

        let batch_size = resolve_setting(
            "Batch size",
            cli.batch_size,
            env_parse::<usize>(BATCH_SIZE_ENV_VAR)?,
            import.batch_size,
        )
        .unwrap_or(DEFAULT_BATCH_SIZE);

        let dry_run = resolve_setting(
            "Dry run",
            cli.dry_run.then_some(true),
            env_flag(DRY_RUN_ENV_VAR)?,
            import.dry_run,
        )
        .unwrap_or(false);

        let classifier = ClassifierRules {
            manager_phrases: import.manager_phrases.unwrap_or_else(default_manager_phrases),
            practice_director_phrases: import
                .practice_director_phrases
                .unwrap_or_else(default_practice_director_phrases),
            overrides: import.overrides,
        };

        let config = Self {
            root_folder,
            database_path,
            workbook_path,
            person_sheet,
            mission_sheet,
            batch_size,
            dry_run,
            default_email_domain: import
                .default_email_domain
                .unwrap_or_else(|| DEFAULT_EMAIL_DOMAIN.to_string()),
            history_grace_days: import.history_grace_days.unwrap_or(0),
            log_level: common.logging.level,
            classifier,
            recovered_fragments: import.recovered_fragments,
        };

        config.validate()?;

        info!(
            "Import configuration: workbook={}, database={}, sheets=({}, {}), batch_size={}, dry_run={}",
            config.workbook_path.display(),
            config.database_path.display(),
            config.person_sheet,
            config.mission_sheet,
            config.batch_size,
            config.dry_run
        );

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".to_string()));
        }
        if self.person_sheet.trim().is_empty() || self.mission_sheet.trim().is_empty() {
            return Err(Error::Config("Sheet names must not be empty".to_string()));
        }
        if self.default_email_domain.trim().is_empty() || self.default_email_domain.contains('@') {
            return Err(Error::Config(format!(
                "Invalid default_email_domain: {:?}",
                self.default_email_domain
            )));
        }
        if !(0..=MAX_HISTORY_GRACE_DAYS).contains(&self.history_grace_days) {
            return Err(Error::Config(format!(
                "history_grace_days must be between 0 and {}, got {}",
                MAX_HISTORY_GRACE_DAYS, self.history_grace_days
            )));
        }
        Ok(())
    }
}

/// Load the TOML file named by `--config`, `STAFFING_CONFIG` or the default
/// location
///
/// A missing file at the default location is fine; a missing file that was
/// named explicitly is a configuration error.
pub fn load_toml(explicit: Option<&Path>) -> Result<SyncToml> {
    let Some(path) = config_file_path(explicit) else {
        return Ok(SyncToml::default());
    };

    if explicit.is_some() && !path.exists() {
        return Err(Error::Config(format!(
            "Config file not found: {}",
            path.display()
        )));
    }

    Ok(read_toml_file::<SyncToml>(&path)?.unwrap_or_default())
}

/// Pick the highest-priority value, warning when several sources set it
fn resolve_setting<T>(name: &str, cli: Option<T>, env: Option<T>, toml: Option<T>) -> Option<T> {
    let sources: Vec<&str> = [
        ("command line", cli.is_some()),
        ("environment", env.is_some()),
        ("TOML", toml.is_some()),
    ]
    .into_iter()
    .filter(|(_, set)| *set)
    .map(|(source, _)| source)
    .collect();

    if sources.len() > 1 {
        warn!(
            "{} found in multiple sources: {}. Using {} (highest priority).",
            name,
            sources.join(", "),
            sources[0]
        );
    }

    cli.or(env).or(toml)
}

/// Non-blank environment variable value
fn env_value(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(var: &str) -> Result<Option<T>> {
    match env_value(var) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| Error::Config(format!("{} has an invalid value: {:?}", var, raw))),
        None => Ok(None),
    }
}

fn env_flag(var: &str) -> Result<Option<bool>> {
    match env_value(var).map(|v| v.to_lowercase()) {
        None => Ok(None),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(Error::Config(format!("{} has an invalid value: {:?}", var, v))),
        },
    }
}
