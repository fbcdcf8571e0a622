//! CLI command implementations
//!
//! Each command loads the configuration, wires the file-backed stores and
//! returns one JSON value; [`run_command`] writes it to stdout.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::design::{DesignKind, DesignRequest, FileDesignProvider, KindCatalog, TenantId};
use crate::observability::{log_event, Event, Logger, Severity};
use crate::schema::{CatalogSchemaStore, SchemaStore};
use crate::sync::{DesignSynchronizer, SyncOutcome, SyncSettings, DEFAULT_TEXT_SIZE};
use crate::version;
use crate::versions::FileVersionStore;

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::write_response;

const SCHEMA_DIR: &str = "schema";
const CATALOG_FILE: &str = "catalog.json";
const VERSIONS_DIR: &str = "versions";
const DESIGNS_DIR: &str = "designs";

/// Configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory (required)
    pub data_dir: String,

    /// Where design documents are dropped (optional, default `<data_dir>/designs`)
    #[serde(default)]
    pub design_dir: Option<String>,

    /// Size of text columns with no declared max length (optional, default 4000)
    #[serde(default = "default_text_size")]
    pub default_text_size: u32,

    /// Size of other-option text columns (optional, default 4000)
    #[serde(default = "default_text_size")]
    pub other_option_size: u32,

    /// Minimum log level (optional, default "info")
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_text_size() -> u32 {
    DEFAULT_TEXT_SIZE
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;

        let config = Self::from_json(&content)?;

        let shown = path.display().to_string();
        log_event(
            Event::ConfigLoaded,
            &[
                ("path", shown.as_str()),
                ("data_dir", config.data_dir.as_str()),
                ("log_level", config.log_level.as_str()),
            ],
        );

        Ok(config)
    }

    /// Parse and validate configuration JSON
    pub fn from_json(content: &str) -> CliResult<Self> {
        let config: Config = serde_json::from_str(content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> CliResult<()> {
        if self.data_dir.trim().is_empty() {
            return Err(CliError::config_error("data_dir must not be empty"));
        }

        if matches!(&self.design_dir, Some(dir) if dir.trim().is_empty()) {
            return Err(CliError::config_error("design_dir must not be empty when set"));
        }

        if self.default_text_size == 0 {
            return Err(CliError::config_error("default_text_size must be > 0"));
        }

        if self.other_option_size == 0 {
            return Err(CliError::config_error("other_option_size must be > 0"));
        }

        self.severity()?;

        Ok(())
    }

    /// Configured minimum log severity
    pub fn severity(&self) -> CliResult<Severity> {
        match Severity::parse(&self.log_level) {
            Some(severity) if severity != Severity::Fatal => Ok(severity),
            _ => Err(CliError::config_error(format!(
                "Invalid log_level: '{}'. Must be one of trace, info, warn, error.",
                self.log_level
            ))),
        }
    }

    /// Get data directory as Path
    pub fn data_path(&self) -> &Path {
        Path::new(&self.data_dir)
    }

    pub fn design_path(&self) -> PathBuf {
        match &self.design_dir {
            Some(dir) => PathBuf::from(dir),
            None => self.data_path().join(DESIGNS_DIR),
        }
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.data_path().join(SCHEMA_DIR).join(CATALOG_FILE)
    }

    pub fn versions_path(&self) -> PathBuf {
        self.data_path().join(VERSIONS_DIR)
    }

    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            default_text_size: self.default_text_size,
            other_option_size: self.other_option_size,
            ..SyncSettings::default()
        }
    }
}

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    let data = match cmd {
        Command::Init { config } => init(&load_config(&config, false)?)?,
        Command::Apply {
            config,
            tenant,
            kind,
            design,
            version,
            quiet,
        } => {
            let config = load_config(&config, quiet)?;
            let request = design_request(&tenant, &kind, design, version)?;
            apply(&config, &request)?
        }
        Command::Inspect {
            config,
            tenant,
            table,
        } => inspect(&load_config(&config, false)?, &tenant, table.as_deref())?,
        Command::Compare { a, b } => compare(&a, &b)?,
    };

    write_response(data)
}

fn load_config(path: &Path, quiet: bool) -> CliResult<Config> {
    let config = Config::load(path)?;
    let severity = if quiet {
        config.severity()?.max(Severity::Warn)
    } else {
        config.severity()?
    };
    Logger::set_min_severity(severity);
    Ok(config)
}

/// Create the data, schema, version and design directories.
///
/// Safe to repeat; existing directories and their contents are kept.
pub fn init(config: &Config) -> CliResult<Value> {
    let dirs = [
        config.data_path().join(SCHEMA_DIR),
        config.versions_path(),
        config.design_path(),
    ];

    for dir in &dirs {
        fs::create_dir_all(dir).map_err(|e| {
            CliError::config_error(format!("Failed to create directory {:?}: {}", dir, e))
        })?;
    }

    Ok(json!({
        "initialized": true,
        "data_dir": config.data_dir,
        "design_dir": config.design_path().to_string_lossy(),
    }))
}

/// Build a design request from command line values
pub fn design_request(
    tenant: &str,
    kind: &str,
    design: Option<String>,
    version: Option<String>,
) -> CliResult<DesignRequest> {
    if tenant.trim().is_empty() {
        return Err(CliError::invalid_argument("--tenant must not be empty"));
    }

    let kind = DesignKind::parse(kind).ok_or_else(|| {
        CliError::invalid_argument(format!(
            "Unknown design kind '{}'. Must be 'survey' or 'participant_properties'.",
            kind
        ))
    })?;

    match kind {
        DesignKind::Survey => {
            let design = design
                .ok_or_else(|| CliError::invalid_argument("--design is required for surveys"))?;
            let version = version
                .ok_or_else(|| CliError::invalid_argument("--version is required for surveys"))?;
            Ok(DesignRequest::survey(tenant, design, version))
        }
        DesignKind::ParticipantProperties => Ok(DesignRequest::participant_properties(tenant)),
    }
}

/// Synchronize one design from the design directory
pub fn apply(config: &Config, request: &DesignRequest) -> CliResult<Value> {
    ensure_initialized(config)?;

    let provider = FileDesignProvider::new(config.design_path(), KindCatalog::standard());
    let synchronizer = DesignSynchronizer::with_settings(
        Arc::new(open_catalog(config)?),
        Arc::new(FileVersionStore::new(config.versions_path())),
        config.sync_settings(),
    );

    let outcome = synchronizer
        .synchronize_from(&provider, request)
        .map_err(|e| CliError::sync_failed(e.to_string()))?;

    let mut data = match outcome {
        SyncOutcome::Applied { version, plan } => json!({
            "outcome": "applied",
            "version": version.as_str(),
            "operations": plan,
        }),
        SyncOutcome::Skipped { requested, current } => json!({
            "outcome": "skipped",
            "version": requested.as_str(),
            "current": current.as_str(),
        }),
    };
    data["metrics"] = serde_json::to_value(synchronizer.metrics().snapshot())?;

    Ok(data)
}

/// List a tenant's committed tables, or a single one
pub fn inspect(config: &Config, tenant: &str, table: Option<&str>) -> CliResult<Value> {
    ensure_initialized(config)?;

    let store = open_catalog(config)?;
    let tenant = TenantId::new(tenant);

    match table {
        Some(name) => {
            let table = store
                .get_table(&tenant, name)
                .map_err(|e| CliError::io_error(e.to_string()))?
                .ok_or_else(|| {
                    CliError::invalid_argument(format!("No table '{}' for tenant '{}'", name, tenant))
                })?;
            Ok(serde_json::to_value(table)?)
        }
        None => {
            let tables = store
                .list_tables(&tenant)
                .map_err(|e| CliError::io_error(e.to_string()))?;
            Ok(serde_json::to_value(tables)?)
        }
    }
}

/// Compare two dotted versions
pub fn compare(a: &str, b: &str) -> CliResult<Value> {
    let ordering = version::compare(a, b).map_err(|e| CliError::invalid_argument(e.to_string()))?;
    Ok(json!(ordering))
}

fn open_catalog(config: &Config) -> CliResult<CatalogSchemaStore> {
    CatalogSchemaStore::open(config.catalog_path()).map_err(|e| CliError::io_error(e.to_string()))
}

fn ensure_initialized(config: &Config) -> CliResult<()> {
    if config.data_path().join(SCHEMA_DIR).is_dir() && config.versions_path().is_dir() {
        Ok(())
    } else {
        Err(CliError::not_initialized())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::errors::CliErrorCode;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> Config {
        Config::from_json(&json!({"data_dir": dir.path().to_string_lossy()}).to_string()).unwrap()
    }

    fn write_survey(config: &Config, version: &str, steps: Value) {
        let doc = json!({"activity": {
            "metadata": {"studyId": "T1", "activityId": "Daily", "version": version},
            "steps": steps
        }});
        let path = config.design_path().join(format!("T1_Daily_{}.json", version));
        fs::write(path, doc.to_string()).unwrap();
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::from_json(r#"{"data_dir": "/tmp/ds"}"#).unwrap();
        assert_eq!(config.default_text_size, 4000);
        assert_eq!(config.other_option_size, 4000);
        assert_eq!(config.severity().unwrap(), Severity::Info);
        assert_eq!(config.design_path(), PathBuf::from("/tmp/ds").join("designs"));
        assert_eq!(
            config.catalog_path(),
            PathBuf::from("/tmp/ds").join("schema").join("catalog.json")
        );
    }

    #[test]
    fn test_config_rejections() {
        for raw in [
            r#"{"data_dir": ""}"#,
            r#"{"data_dir": "/x", "default_text_size": 0}"#,
            r#"{"data_dir": "/x", "other_option_size": 0}"#,
            r#"{"data_dir": "/x", "log_level": "loud"}"#,
            r#"{"data_dir": "/x", "design_dir": " "}"#,
            r#"{"design_dir": "/x"}"#,
        ] {
            let err = Config::from_json(raw).unwrap_err();
            assert_eq!(err.code(), &CliErrorCode::ConfigError, "{}", raw);
        }
    }

    #[test]
    fn test_settings_follow_config() {
        let config = Config::from_json(
            r#"{"data_dir": "/x", "default_text_size": 255, "other_option_size": 100}"#,
        )
        .unwrap();
        let settings = config.sync_settings();
        assert_eq!(settings.default_text_size, 255);
        assert_eq!(settings.other_option_size, 100);
        assert_eq!(settings.enrollment_token_size, 4000);
    }

    #[test]
    fn test_design_request() {
        let request = design_request("T1", "survey", Some("Daily".into()), Some("1.1".into())).unwrap();
        assert_eq!(request.kind, DesignKind::Survey);
        assert_eq!(request.version.as_deref(), Some("1.1"));

        let request = design_request("T1", "participant_properties", None, None).unwrap();
        assert_eq!(request.kind, DesignKind::ParticipantProperties);

        assert!(design_request("T1", "survey", Some("Daily".into()), None).is_err());
        assert!(design_request("T1", "poll", None, None).is_err());
        assert!(design_request(" ", "survey", None, None).is_err());
    }

    #[test]
    fn test_apply_requires_init() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let request = DesignRequest::survey("T1", "Daily", "1.0");
        let err = apply(&config, &request).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::NotInitialized);
    }

    #[test]
    fn test_init_apply_inspect() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        init(&config).unwrap();
        init(&config).unwrap();

        write_survey(
            &config,
            "1.1",
            json!([{"type": "question", "resultType": "scale", "key": "Mood"}]),
        );

        let data = apply(&config, &DesignRequest::survey("T1", "Daily", "1.1")).unwrap();
        assert_eq!(data["outcome"], "applied");
        assert_eq!(data["version"], "1.1");
        assert_eq!(data["metrics"]["applied"], 1);

        let again = apply(&config, &DesignRequest::survey("T1", "Daily", "1.1")).unwrap();
        assert_eq!(again["outcome"], "skipped");

        let tables = inspect(&config, "T1", None).unwrap();
        assert_eq!(tables.as_array().unwrap().len(), 1);

        let table = inspect(&config, "T1", Some("Daily")).unwrap();
        assert_eq!(table["name"], "Daily");

        let err = inspect(&config, "T1", Some("Weekly")).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::InvalidArgument);
    }

    #[test]
    fn test_apply_missing_design_fails() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        init(&config).unwrap();

        let err = apply(&config, &DesignRequest::survey("T1", "Daily", "9")).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::SyncFailed);
        assert!(err.message().contains("SYNC_INVALID_DESIGN"));
    }

    #[test]
    fn test_compare() {
        assert_eq!(compare("1.0", "1.0.0").unwrap(), json!(0));
        assert_eq!(compare("1.10", "1.9").unwrap(), json!(1));
        assert_eq!(compare("1.2", "1.10").unwrap(), json!(-1));
        assert!(compare("1.x", "1").is_err());
    }
}
