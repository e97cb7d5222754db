// config.rs — Daemon configuration, loaded from vf.toml.
//
// Every field has a default, so an empty (or absent) file yields a working
// configuration for the stock generators in the current directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use vf_generator::{stock_generators, validate_allow_list, GeneratorError, GeneratorSpec};
use vf_workspace::{WorkspaceError, WorkspaceLayout};

/// Conventional config file name.
pub const DEFAULT_CONFIG_FILE: &str = "vf.toml";

/// Errors loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error(transparent)]
    Layout(#[from] WorkspaceError),

    #[error(transparent)]
    Generators(#[from] GeneratorError),

    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Top-level daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Socket address the HTTP server listens on.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Directory holding the generator programs.
    #[serde(default = "default_scripts_dir")]
    pub scripts_dir: PathBuf,

    /// Base spreadsheet used when a request carries none. Defaults to
    /// `<scripts_dir>/<base dir>/<base file>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_base_file: Option<PathBuf>,

    /// Parent directory of all per-request workspaces.
    #[serde(default = "default_work_root")]
    pub work_root: PathBuf,

    #[serde(default)]
    pub layout: WorkspaceLayout,

    /// The generator allow-list, in run order.
    #[serde(default = "stock_generators")]
    pub generators: Vec<GeneratorSpec>,

    #[serde(default = "default_generator_timeout_secs")]
    pub generator_timeout_secs: u64,

    /// Limit on staging + running + archiving for one request.
    #[serde(default = "default_request_deadline_secs")]
    pub request_deadline_secs: u64,

    /// Generators run at once within a request. 1 = sequential.
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// Append `manifest.json` with per-generator outcomes to the archive.
    #[serde(default)]
    pub include_manifest: bool,

    /// File name offered to the browser for the archive.
    #[serde(default = "default_download_name")]
    pub download_name: String,

    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Answer CORS preflights permissively.
    #[serde(default = "default_cors")]
    pub cors: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            scripts_dir: default_scripts_dir(),
            default_base_file: None,
            work_root: default_work_root(),
            layout: WorkspaceLayout::default(),
            generators: stock_generators(),
            generator_timeout_secs: default_generator_timeout_secs(),
            request_deadline_secs: default_request_deadline_secs(),
            max_parallel: default_max_parallel(),
            include_manifest: false,
            download_name: default_download_name(),
            max_upload_bytes: default_max_upload_bytes(),
            cors: default_cors(),
        }
    }
}

// Serde default functions
fn default_bind() -> String {
    "127.0.0.1:8787".to_string()
}

fn default_scripts_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_work_root() -> PathBuf {
    std::env::temp_dir().join("vf-work")
}

fn default_generator_timeout_secs() -> u64 {
    120
}

fn default_request_deadline_secs() -> u64 {
    600
}

fn default_max_parallel() -> usize {
    1
}

fn default_download_name() -> String {
    "abris-velos-variantes.zip".to_string()
}

fn default_max_upload_bytes() -> usize {
    25 * 1024 * 1024
}

fn default_cors() -> bool {
    true
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub bind: Option<String>,
    pub scripts_dir: Option<PathBuf>,
    pub work_root: Option<PathBuf>,
}

impl DaemonConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `path` if it exists, otherwise use defaults. A file that exists
    /// but does not parse is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!("no config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn apply(&mut self, overrides: ConfigOverrides) {
        if let Some(bind) = overrides.bind {
            self.bind = bind;
        }
        if let Some(dir) = overrides.scripts_dir {
            self.scripts_dir = dir;
        }
        if let Some(root) = overrides.work_root {
            self.work_root = root;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.layout.validate()?;
        validate_allow_list(&self.generators)?;

        if self.generator_timeout_secs == 0 {
            return Err(invalid("generator_timeout_secs", "must be at least 1"));
        }
        if self.request_deadline_secs == 0 {
            return Err(invalid("request_deadline_secs", "must be at least 1"));
        }
        if self.max_upload_bytes == 0 {
            return Err(invalid("max_upload_bytes", "must be greater than 0"));
        }
        if self.download_name.is_empty()
            || !self
                .download_name
                .chars()
                .all(|c| c.is_ascii_graphic() && c != '"' && c != '\\' && c != '/')
        {
            return Err(invalid(
                "download_name",
                "must be a non-empty printable ASCII file name",
            ));
        }
        Ok(())
    }

    pub fn generator_timeout(&self) -> Duration {
        Duration::from_secs(self.generator_timeout_secs)
    }

    pub fn request_deadline(&self) -> Duration {
        Duration::from_secs(self.request_deadline_secs)
    }

    /// Where the fallback base spreadsheet is read from.
    pub fn default_base_path(&self) -> PathBuf {
        match &self.default_base_file {
            Some(path) => path.clone(),
            None => self
                .scripts_dir
                .join(&self.layout.base_dir_name)
                .join(&self.layout.base_file_name),
        }
    }

    /// Allow-listed generators with no file in `scripts_dir`.
    pub fn missing_generators(&self) -> Vec<&GeneratorSpec> {
        self.generators
            .iter()
            .filter(|g| !self.scripts_dir.join(&g.name).is_file())
            .collect()
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}
