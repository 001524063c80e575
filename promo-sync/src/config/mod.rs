//! Job configuration
//!
//! Built-in defaults describe the production deployment. A TOML file can
//! replace any section, and a handful of environment variables override the
//! values that differ between machines:
//!
//! - `PROMO_SYNC_DATABASE_URL` (falls back to `DATABASE_URL`)
//! - `PROMO_SYNC_REMOTE`, `PROMO_SYNC_REMOTE_PATH`
//! - `PROMO_SYNC_RCLONE`, `PROMO_SYNC_RCLONE_CONFIG`
//! - `PROMO_SYNC_STAGING_DIR`

pub mod templates;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::error::{EtlError, Result};

pub use templates::{StepTemplate, SubStepTemplate, default_steps, default_sub_steps};

/// Canonical fields the column map must produce
pub mod fields {
    pub const TITLE: &str = "title";
    pub const START_DATE: &str = "start_date";
    pub const END_DATE: &str = "end_date";
    pub const CLEARANCE_DATE: &str = "clearance_date";
    pub const RAW_CODE: &str = "raw_code";

    pub const REQUIRED: [&str; 5] = [TITLE, START_DATE, END_DATE, CLEARANCE_DATE, RAW_CODE];
}

const CONFIG_ENV: &str = "PROMO_SYNC_CONFIG";

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub remote: RemoteConfig,
    pub staging: StagingConfig,
    pub database: DatabaseConfig,
    pub columns: ColumnConfig,
    pub steps: Vec<StepTemplate>,
    pub sub_steps: Vec<SubStepTemplate>,
}

/// Where the planning spreadsheet lives and how to copy it
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// rclone executable
    pub rclone: PathBuf,
    /// rclone config file, passed as `--config` when set
    pub rclone_config: Option<PathBuf>,
    /// Remote store name as declared in the rclone config
    pub remote: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    pub dir: PathBuf,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub campaigns_table: String,
    pub steps_table: String,
    pub sub_steps_table: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ColumnConfig {
    /// Spreadsheet header -> canonical field
    pub map: BTreeMap<String, String>,
    /// Header of the year column used to build campaign codes
    pub year: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            remote: RemoteConfig::default(),
            staging: StagingConfig::default(),
            database: DatabaseConfig::default(),
            columns: ColumnConfig::default(),
            steps: default_steps(),
            sub_steps: default_sub_steps(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            rclone: PathBuf::from("rclone"),
            rclone_config: None,
            remote: "Prod".to_string(),
            path: "Promo/Retroplanning Promo Yannis.xlsx".to_string(),
        }
    }
}

impl Default for StagingConfig {
    fn default() -> Self {
        let dir = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("promo-sync");

        Self {
            dir,
            file_name: "retroplanning.xlsx".to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://postgres@localhost:5432/workflow_promo".to_string(),
            campaigns_table: "campaigns".to_string(),
            steps_table: "steps".to_string(),
            sub_steps_table: "sub_steps".to_string(),
        }
    }
}

impl Default for ColumnConfig {
    fn default() -> Self {
        let map = [
            ("Clôture GAME \nEnvoi Supply", fields::CLEARANCE_DATE),
            ("N°BCP", fields::RAW_CODE),
            ("FERMETURE ENGAGEMENT niveau magasin", fields::END_DATE),
            ("OUVERTURE ENGAGEMENT", fields::START_DATE),
            ("CATALOGUES / COLLECTIONS", fields::TITLE),
        ]
        .into_iter()
        .map(|(header, field)| (header.to_string(), field.to_string()))
        .collect();

        Self {
            map,
            year: "Année".to_string(),
        }
    }
}

impl StagingConfig {
    /// Full path of the downloaded spreadsheet
    pub fn file_path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }
}

impl RemoteConfig {
    /// `remote:path` reference understood by rclone
    pub fn source_ref(&self) -> String {
        format!("{}:{}", self.remote, self.path)
    }
}

impl Config {
    /// Resolve the configuration for a run.
    ///
    /// An explicit path must exist. Without one, `$PROMO_SYNC_CONFIG` and then
    /// `<config dir>/promo-sync/config.toml` are tried; if neither is present
    /// the defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, default_config_path().as_deref(), |key| std::env::var(key).ok())
    }

    /// [`Config::load`] with the user config path and the environment supplied
    /// by the caller
    fn load_with<F>(explicit: Option<&Path>, user_file: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match resolve_path(explicit, user_file, &lookup) {
            Some(file) => {
                log::info!("Loading configuration from {}", file.display());
                let content = std::fs::read_to_string(&file)?;
                Self::from_toml(&content)?
            }
            None => {
                log::debug!("No configuration file found, using defaults");
                Self::default()
            }
        };

        config.apply_env_overrides(lookup);
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply machine-specific overrides looked up through `lookup`
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("PROMO_SYNC_DATABASE_URL").or_else(|| lookup("DATABASE_URL")) {
            self.database.url = url;
        }
        if let Some(remote) = lookup("PROMO_SYNC_REMOTE") {
            self.remote.remote = remote;
        }
        if let Some(path) = lookup("PROMO_SYNC_REMOTE_PATH") {
            self.remote.path = path;
        }
        if let Some(rclone) = lookup("PROMO_SYNC_RCLONE") {
            self.remote.rclone = PathBuf::from(rclone);
        }
        if let Some(rclone_config) = lookup("PROMO_SYNC_RCLONE_CONFIG") {
            self.remote.rclone_config = Some(PathBuf::from(rclone_config));
        }
        if let Some(dir) = lookup("PROMO_SYNC_STAGING_DIR") {
            self.staging.dir = PathBuf::from(dir);
        }
    }

    /// Reject configurations the job cannot run with
    pub fn validate(&self) -> Result<()> {
        self.validate_columns()?;
        self.validate_tables()?;
        self.validate_templates()
    }

    fn validate_columns(&self) -> Result<()> {
        let mut seen: HashMap<&str, &str> = HashMap::new();
        for (header, field) in &self.columns.map {
            if !fields::REQUIRED.contains(&field.as_str()) {
                return Err(EtlError::validation(format!(
                    "column {:?} maps to unknown field '{}'",
                    header, field
                )));
            }
            if let Some(previous) = seen.insert(field.as_str(), header.as_str()) {
                return Err(EtlError::validation(format!(
                    "columns {:?} and {:?} both map to '{}'",
                    previous, header, field
                )));
            }
        }

        for field in fields::REQUIRED {
            if !seen.contains_key(field) {
                return Err(EtlError::validation(format!("no column maps to '{}'", field)));
            }
        }

        if self.columns.year.trim().is_empty() {
            return Err(EtlError::validation("year column name is empty"));
        }

        Ok(())
    }

    fn validate_tables(&self) -> Result<()> {
        for table in [
            &self.database.campaigns_table,
            &self.database.steps_table,
            &self.database.sub_steps_table,
        ] {
            if !IDENTIFIER.is_match(table) {
                return Err(EtlError::validation(format!("'{}' is not a valid table name", table)));
            }
        }
        Ok(())
    }

    fn validate_templates(&self) -> Result<()> {
        if self.steps.is_empty() {
            return Err(EtlError::validation("step template is empty"));
        }

        let mut names = HashSet::new();
        for step in &self.steps {
            if !names.insert(step.name.as_str()) {
                return Err(EtlError::validation(format!("step '{}' is defined twice", step.name)));
            }
        }

        let mut orders: HashMap<&str, Vec<i32>> = HashMap::new();
        for sub in &self.sub_steps {
            if !names.contains(sub.step.as_str()) {
                return Err(EtlError::validation(format!(
                    "sub-step '{}' belongs to unknown step '{}'",
                    sub.name, sub.step
                )));
            }
            orders.entry(sub.step.as_str()).or_default().push(sub.order);
        }

        for (step, mut values) in orders {
            values.sort_unstable();
            if values.iter().zip(1..).any(|(order, expected)| *order != expected) {
                return Err(EtlError::validation(format!(
                    "sub-step orders of '{}' must run 1..={} without gaps, got {:?}",
                    step,
                    values.len(),
                    values
                )));
            }
        }

        Ok(())
    }
}

/// Config file to read, in lookup order: explicit path, `$PROMO_SYNC_CONFIG`,
/// then `user_file` when it exists
fn resolve_path<F>(explicit: Option<&Path>, user_file: Option<&Path>, lookup: F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(path) = lookup(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    user_file.filter(|p| p.exists()).map(Path::to_path_buf)
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("promo-sync").join("config.toml"))
}
