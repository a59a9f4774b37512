//! Configuration file handling.

use std::path::{Path, PathBuf};

use alertledger_parse::AlertKind;
use anyhow::Context;
use serde::{Deserialize, Serialize};

const APP_DIR: &str = "alertledger";

/// Log filter used when neither `RUST_LOG` nor the config sets one.
pub const DEFAULT_LOG_FILTER: &str = "alertledger=info,alertledger_core=info";

/// Settings read from `config.json`. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Ledger database location. Defaults to the platform data directory.
    pub database_path: Option<PathBuf>,
    /// `tracing` filter directive.
    pub log_filter: String,
    /// Alert kinds with a handling path. Others are quarantined as unsupported.
    pub handled_alert_kinds: Vec<AlertKind>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            handled_alert_kinds: AlertKind::ALL.to_vec(),
        }
    }
}

impl Config {
    /// Default location: `<config dir>/alertledger/config.json`.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.json")
    }

    /// Load from `path`, or from the default location. A missing file yields
    /// the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but can't be read or parsed.
    pub async fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = path.map_or_else(Self::default_path, Path::to_path_buf);

        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;

        serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
    }

    /// Resolved database path. Creates the parent directory when needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory can't be created.
    pub async fn database_path(&self) -> anyhow::Result<PathBuf> {
        let path = match &self.database_path {
            Some(path) => path.clone(),
            None => dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR)
                .join("alertledger.db"),
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        Ok(path)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(Some(&dir.path().join("absent.json")))
            .await
            .unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.handled_alert_kinds.len(), 3);
    }

    #[tokio::test]
    async fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        tokio::fs::write(
            &path,
            r#"{ "database_path": "ledger.db", "handled_alert_kinds": ["transaction"] }"#,
        )
        .await
        .unwrap();

        let config = Config::load(Some(&path)).await.unwrap();

        assert_eq!(config.database_path, Some(PathBuf::from("ledger.db")));
        assert_eq!(config.handled_alert_kinds, vec![AlertKind::Transaction]);
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
    }

    #[tokio::test]
    async fn test_unknown_alert_kind_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        tokio::fs::write(&path, r#"{ "handled_alert_kinds": ["mortgage"] }"#)
            .await
            .unwrap();

        assert!(Config::load(Some(&path)).await.is_err());
    }

    #[tokio::test]
    async fn test_database_parent_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            database_path: Some(dir.path().join("nested").join("ledger.db")),
            ..Config::default()
        };

        let path = config.database_path().await.unwrap();

        assert!(path.parent().unwrap().is_dir());
    }
}
