//! Application configuration.
//!
//! One YAML file plus `MFOPS_*` environment overrides. The config decides
//! which sheet backend to talk to; secrets (the API bearer token) can stay
//! out of the file and come from the environment.

use crate::error::{OpsError, OpsResult};
use crate::schema::NormalizerConfig;
use crate::sheets::{MemorySheets, RemoteSheets, SheetStore, XlsxSheets};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Xlsx,
    Remote,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetConfig {
    #[serde(default)]
    pub spreadsheet_id: String,
    #[serde(default = "default_worksheet")]
    pub worksheet: String,
    #[serde(default = "default_archive_worksheet")]
    pub archive_worksheet: String,
    #[serde(default = "default_backend")]
    pub backend: BackendKind,
    /// Workbook path for the xlsx backend.
    #[serde(default)]
    pub xlsx_path: Option<PathBuf>,
    /// Bearer token for the remote backend. Usually injected via
    /// `MFOPS_API_TOKEN` rather than written here.
    #[serde(default)]
    pub api_token: Option<String>,
}

fn default_worksheet() -> String {
    "Otter_Tasks".to_string()
}

fn default_archive_worksheet() -> String {
    "Archive".to_string()
}

fn default_backend() -> BackendKind {
    BackendKind::Xlsx
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            worksheet: default_worksheet(),
            archive_worksheet: default_archive_worksheet(),
            backend: default_backend(),
            xlsx_path: None,
            api_token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpsConfig {
    #[serde(default)]
    pub sheet: SheetConfig,
    #[serde(default)]
    pub normalizer: NormalizerConfig,
    /// Seconds a loaded table stays cached before the next read refetches.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,
    #[serde(default)]
    pub server: ServerConfig,
}

fn default_cache_ttl_secs() -> u64 {
    45
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("credentials.yaml")
}

impl Default for OpsConfig {
    fn default() -> Self {
        Self {
            sheet: SheetConfig::default(),
            normalizer: NormalizerConfig::default(),
            cache_ttl_secs: default_cache_ttl_secs(),
            credentials_path: default_credentials_path(),
            server: ServerConfig::default(),
        }
    }
}

impl OpsConfig {
    /// Load from a YAML file, or fall back to defaults when no path is given
    /// and the conventional `mfops.yaml` does not exist. Environment
    /// overrides are applied either way.
    pub fn load(path: Option<&Path>) -> OpsResult<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let conventional = Path::new("mfops.yaml");
                if conventional.exists() {
                    Self::from_file(conventional)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env();
        Ok(config)
    }

    fn from_file(path: &Path) -> OpsResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// `MFOPS_*` environment variables win over the file.
    pub fn apply_env(&mut self) {
        if let Ok(id) = std::env::var("MFOPS_SPREADSHEET_ID") {
            self.sheet.spreadsheet_id = id;
        }
        if let Ok(token) = std::env::var("MFOPS_API_TOKEN") {
            self.sheet.api_token = Some(token);
        }
        if let Ok(path) = std::env::var("MFOPS_XLSX_PATH") {
            self.sheet.xlsx_path = Some(PathBuf::from(path));
        }
        if let Ok(worksheet) = std::env::var("MFOPS_WORKSHEET") {
            self.sheet.worksheet = worksheet;
        }
        if let Ok(ttl) = std::env::var("MFOPS_CACHE_TTL_SECS") {
            if let Ok(secs) = ttl.parse() {
                self.cache_ttl_secs = secs;
            }
        }
        if let Ok(creds) = std::env::var("MFOPS_CREDENTIALS") {
            self.credentials_path = PathBuf::from(creds);
        }
    }

    /// Construct the configured sheet backend.
    pub fn open_store(&self) -> OpsResult<Box<dyn SheetStore + Send>> {
        match self.sheet.backend {
            BackendKind::Xlsx => {
                let path = self.sheet.xlsx_path.as_ref().ok_or_else(|| {
                    OpsError::Config("xlsx backend requires sheet.xlsx_path".to_string())
                })?;
                Ok(Box::new(XlsxSheets::new(path)))
            }
            BackendKind::Remote => {
                if self.sheet.spreadsheet_id.is_empty() {
                    return Err(OpsError::Config(
                        "remote backend requires sheet.spreadsheet_id".to_string(),
                    ));
                }
                let token = self.sheet.api_token.as_ref().ok_or_else(|| {
                    OpsError::Config(
                        "remote backend requires sheet.api_token (or MFOPS_API_TOKEN)".to_string(),
                    )
                })?;
                Ok(Box::new(RemoteSheets::new(
                    &self.sheet.spreadsheet_id,
                    token,
                )))
            }
            BackendKind::Memory => Ok(Box::new(MemorySheets::new())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn minimal_yaml_fills_defaults() {
        let config: OpsConfig = serde_yaml::from_str(
            r#"
sheet:
  backend: memory
"#,
        )
        .unwrap();
        assert_eq!(config.sheet.worksheet, "Otter_Tasks");
        assert_eq!(config.sheet.archive_worksheet, "Archive");
        assert_eq!(config.cache_ttl_secs, 45);
        assert_eq!(config.normalizer.max_columns, 10);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn backend_requirements_are_checked() {
        let mut config = OpsConfig::default();
        config.sheet.backend = BackendKind::Xlsx;
        config.sheet.xlsx_path = None;
        assert!(config.open_store().is_err());

        config.sheet.backend = BackendKind::Remote;
        assert!(config.open_store().is_err());

        config.sheet.backend = BackendKind::Memory;
        assert!(config.open_store().is_ok());
    }

    #[test]
    fn full_yaml_round_trip() {
        let config: OpsConfig = serde_yaml::from_str(
            r#"
sheet:
  spreadsheet_id: 1U_9CEbWHWMQVS2C20O0fpOG5gVxoYjB7BmppKlTHIzc
  worksheet: Otter_Tasks
  backend: remote
  api_token: test-token
normalizer:
  max_columns: 12
cache_ttl_secs: 30
server:
  host: 0.0.0.0
  port: 3000
"#,
        )
        .unwrap();
        assert_eq!(config.sheet.backend, BackendKind::Remote);
        assert_eq!(config.normalizer.max_columns, 12);
        assert_eq!(config.server.host, "0.0.0.0");
    }
}
