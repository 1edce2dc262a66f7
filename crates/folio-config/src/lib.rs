//! Configuration management for Folio.
//!
//! Parses `folio.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `server.host`
//! - `storage.data_dir`
//! - `build.command`
//! - `build.args`
//! - `auth.editors[].token`

mod expand;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override server host.
    pub host: Option<String>,
    /// Override server port.
    pub port: Option<u16>,
    /// Override data directory.
    pub data_dir: Option<PathBuf>,
    /// Override build debounce window.
    pub debounce_ms: Option<u64>,
}

/// Configuration filename to search for.
pub const CONFIG_FILENAME: &str = "folio.toml";

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Storage configuration (paths are relative strings from TOML).
    storage: StorageConfigRaw,
    /// Build configuration.
    pub build: BuildConfig,
    /// Editor credentials.
    pub auth: AuthConfig,

    /// Resolved storage configuration (set after loading).
    #[serde(skip)]
    pub storage_resolved: StorageConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Server configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Where unrouted requests are redirected.
    pub admin_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 2727,
            admin_path: "/admin/".to_owned(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StorageConfigRaw {
    data_dir: Option<String>,
    database: Option<String>,
}

/// Resolved storage locations.
#[derive(Debug, Default)]
pub struct StorageConfig {
    /// Root of sources, sites and the database.
    pub data_dir: PathBuf,
    /// SQLite database file.
    pub database: PathBuf,
}

/// Build scheduler and generator configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Quiet period after the last edit before a build starts.
    pub debounce_ms: u64,
    /// Builds that may run at the same time.
    pub workers: usize,
    /// Maximum duration of one build.
    pub timeout_secs: u64,
    /// Generator program.
    pub command: String,
    /// Generator arguments. `{source}` and `{output}` are replaced with the
    /// project's source and output directories.
    pub args: Vec<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 2000,
            workers: 2,
            timeout_secs: 600,
            command: "npx".to_owned(),
            args: vec!["rspress".to_owned(), "build".to_owned()],
        }
    }
}

impl BuildConfig {
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Editor credentials accepted by the API.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub editors: Vec<EditorToken>,
}

/// A bearer token and the user it authenticates.
#[derive(Debug, Clone, Deserialize)]
pub struct EditorToken {
    pub token: String,
    pub user_id: i64,
    pub username: String,
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`build.command`").
        field: String,
        /// Error message (e.g., "${`FOLIO_TOKEN`} not set").
        message: String,
    },
}

fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `folio.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails,
    /// or the result does not validate.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
            config.validate()?;
        }

        Ok(config)
    }

    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(host) = &settings.host {
            self.server.host.clone_from(host);
        }
        if let Some(port) = settings.port {
            self.server.port = port;
        }
        if let Some(data_dir) = &settings.data_dir {
            let database = self
                .storage
                .database
                .as_deref()
                .unwrap_or(DEFAULT_DATABASE)
                .to_owned();
            self.storage_resolved = StorageConfig {
                database: data_dir.join(database),
                data_dir: data_dir.clone(),
            };
        }
        if let Some(debounce_ms) = settings.debounce_ms {
            self.build.debounce_ms = debounce_ms;
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    fn default_with_base(base: &Path) -> Self {
        let data_dir = base.join(DEFAULT_DATA_DIR);
        Self {
            server: ServerConfig::default(),
            storage: StorageConfigRaw::default(),
            build: BuildConfig::default(),
            auth: AuthConfig::default(),
            storage_resolved: StorageConfig {
                database: data_dir.join(DEFAULT_DATABASE),
                data_dir,
            },
            config_path: None,
        }
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` naming the first invalid field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_build()?;
        self.validate_auth()?;
        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.server.host, "server.host")?;
        if self.server.port == 0 {
            return Err(ConfigError::Validation("server.port cannot be 0".to_owned()));
        }
        if !self.server.admin_path.starts_with('/') {
            return Err(ConfigError::Validation(
                "server.admin_path must start with /".to_owned(),
            ));
        }
        Ok(())
    }

    fn validate_build(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.build.command, "build.command")?;
        if self.build.workers == 0 {
            return Err(ConfigError::Validation(
                "build.workers must be at least 1".to_owned(),
            ));
        }
        if self.build.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "build.timeout_secs must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }

    fn validate_auth(&self) -> Result<(), ConfigError> {
        for (i, editor) in self.auth.editors.iter().enumerate() {
            require_non_empty(&editor.token, &format!("auth.editors[{i}].token"))?;
        }
        Ok(())
    }

    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        self.server.host = expand::expand_env(&self.server.host, "server.host")?;

        if let Some(ref data_dir) = self.storage.data_dir {
            self.storage.data_dir = Some(expand::expand_env(data_dir, "storage.data_dir")?);
        }

        self.build.command = expand::expand_env(&self.build.command, "build.command")?;
        self.build.args = self
            .build
            .args
            .iter()
            .map(|arg| expand::expand_env(arg, "build.args"))
            .collect::<Result<_, _>>()?;

        for (i, editor) in self.auth.editors.iter_mut().enumerate() {
            editor.token = expand::expand_env(&editor.token, &format!("auth.editors[{i}].token"))?;
        }

        Ok(())
    }

    /// Resolve `data_dir` against the config directory and the database
    /// against `data_dir`.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let data_dir = config_dir.join(self.storage.data_dir.as_deref().unwrap_or(DEFAULT_DATA_DIR));
        let database = data_dir.join(self.storage.database.as_deref().unwrap_or(DEFAULT_DATABASE));
        self.storage_resolved = StorageConfig { data_dir, database };
    }
}

const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_DATABASE: &str = "folio.db";
