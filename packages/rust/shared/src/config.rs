//! Docset configuration for docgraph.
//!
//! Config lives at `<docset root>/docgraph.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{DocGraphError, Result};

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "docgraph.toml";

// ---------------------------------------------------------------------------
// Config structs (matching docgraph.toml schema)
// ---------------------------------------------------------------------------

/// Top-level docset config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Build settings.
    #[serde(default)]
    pub build: BuildConfig,

    /// Moniker (version) definitions.
    #[serde(default)]
    pub monikers: MonikerConfig,

    /// Localization token settings.
    #[serde(default)]
    pub localization: LocalizationConfig,

    /// Global metadata applied to every TOC.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// `[build]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Number of TOC files loaded concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Culture used for localized tokens.
    #[serde(default = "default_culture")]
    pub culture: String,

    /// File names that mark a file as a TOC (case-insensitive).
    #[serde(default = "default_toc_file_names")]
    pub toc_file_names: Vec<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            culture: default_culture(),
            toc_file_names: default_toc_file_names(),
        }
    }
}

fn default_concurrency() -> usize {
    4
}
fn default_culture() -> String {
    "en-us".into()
}
fn default_toc_file_names() -> Vec<String> {
    vec!["toc.md".into(), "toc.yml".into(), "toc.yaml".into()]
}

/// `[monikers]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonikerConfig {
    /// Monikers in ascending version order.
    #[serde(default)]
    pub definitions: Vec<String>,
}

/// `[localization]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocalizationConfig {
    /// Directory (relative to the docset root) holding `<culture>.json` token files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_dir: Option<String>,
}

// ---------------------------------------------------------------------------
// Graph config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime graph-build configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    /// Worker pool size for TOC loading.
    pub concurrency: usize,
    /// File names that mark a file as a TOC.
    pub toc_file_names: Vec<String>,
}

impl GraphConfig {
    /// Whether `file_name` names a TOC file.
    pub fn is_toc_name(&self, file_name: &str) -> bool {
        self.toc_file_names
            .iter()
            .any(|name| name.eq_ignore_ascii_case(file_name))
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for GraphConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            concurrency: config.build.concurrency.max(1),
            toc_file_names: config.build.toc_file_names.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config file of a docset.
pub fn config_file_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE_NAME)
}

/// Load the docset config. Returns defaults if the file does not exist.
pub fn load_config(root: &Path) -> Result<AppConfig> {
    let path = config_file_path(root);

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the docset config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DocGraphError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        DocGraphError::config(format!("failed to parse {}: {e}", path.display()))
    })?;

    if config.build.concurrency == 0 {
        return Err(DocGraphError::config("build.concurrency must be at least 1"));
    }
    Ok(config)
}

/// Write a default config file into the docset root.
/// Returns the path to the created file.
pub fn init_config(root: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(root).map_err(|e| DocGraphError::io(root, e))?;

    let path = config_file_path(root);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| DocGraphError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DocGraphError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
