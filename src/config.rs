use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration for Duende
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub references: ReferencesConfig,
    pub content: ContentConfig,
}

/// Configuration for the HTTP server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,
    /// Origins allowed by the CORS layer
    pub allowed_origins: Vec<String>,
    /// Shared secret guarding the admin endpoints — literal value or
    /// "env:VAR_NAME" to read from the environment
    pub admin_secret: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3030,
            allowed_origins: vec![
                "https://buscador.afland.es".into(),
                "https://duende-frontend.vercel.app".into(),
                "https://afland.es".into(),
                "http://localhost:3000".into(),
                "http://localhost:5173".into(),
            ],
            admin_secret: Some("env:ADMIN_SECRET_KEY".into()),
        }
    }
}

/// Configuration for the event store
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file path (defaults to events.db in the data directory)
    pub path: Option<PathBuf>,
}

/// Configuration for the reference data used by term classification
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ReferencesConfig {
    /// Reference data file (defaults to the built-in lists)
    pub path: Option<PathBuf>,
}

/// Configuration for AI content generation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    /// API key — literal value or "env:VAR_NAME" to read from environment
    pub api_key: Option<String>,
    /// Model identifier
    pub model: String,
    /// API base URL (overridable for tests)
    pub base_url: String,
    /// Events processed per batch-generation run
    pub batch_size: usize,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            api_key: Some("env:GEMINI_API_KEY".into()),
            model: "gemini-1.5-flash".into(),
            base_url: "https://generativelanguage.googleapis.com".into(),
            batch_size: 25,
        }
    }
}

/// Resolve a secret value, supporting "env:VAR_NAME" syntax.
fn resolve_secret(raw: Option<&str>) -> Option<String> {
    raw.and_then(|value| {
        if let Some(var_name) = value.strip_prefix("env:") {
            std::env::var(var_name).ok().filter(|v| !v.is_empty())
        } else if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        }
    })
}

impl ServerConfig {
    pub fn resolve_admin_secret(&self) -> Option<String> {
        resolve_secret(self.admin_secret.as_deref())
    }
}

impl ContentConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_secret(self.api_key.as_deref())
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    /// Get the path to the duende data directory under a root
    pub fn data_dir(root: &Path) -> PathBuf {
        root.join(".duende")
    }

    /// Get the config file path under a root
    pub fn config_path(root: &Path) -> PathBuf {
        Self::data_dir(root).join("config.toml")
    }

    /// Get the SQLite database path, honoring the configured override
    pub fn db_path(&self, root: &Path) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| Self::data_dir(root).join("events.db"))
    }

    /// Default data root when no path is given on the command line
    pub fn default_root() -> Result<PathBuf> {
        let project_dirs = directories::ProjectDirs::from("es", "afland", "duende")
            .context("Failed to determine user directories")?;
        Ok(project_dirs.data_dir().to_path_buf())
    }
}
