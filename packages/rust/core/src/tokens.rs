//! Localized string tables, loaded eagerly at startup.
//!
//! Lookup falls back from the requested culture (`fr-ca`) to its neutral
//! language (`fr`) and then to `en-us`.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, instrument};

use docgraph_shared::{DocGraphError, LocalizationConfig, Result, TokenStore};

const FALLBACK_CULTURE: &str = "en-us";

const BUILTIN_EN_US: &[(&str, &str)] = &[
    ("note", "Note"),
    ("tip", "Tip"),
    ("important", "Important"),
    ("warning", "Warning"),
    ("caution", "Caution"),
];

#[derive(Debug, Clone, Default)]
pub struct LocalizationTokens {
    tables: HashMap<String, HashMap<String, String>>,
}

impl LocalizationTokens {
    /// Only the built-in `en-us` table.
    pub fn builtin() -> Self {
        let mut tokens = Self::default();
        for (key, value) in BUILTIN_EN_US {
            tokens.insert(FALLBACK_CULTURE, key, value);
        }
        tokens
    }

    /// Built-in tokens plus every `<culture>.json` file in the configured
    /// tokens directory (relative to `root`).
    pub fn from_config(root: &Path, config: &LocalizationConfig) -> Result<Self> {
        let mut tokens = Self::builtin();
        if let Some(dir) = &config.tokens_dir {
            tokens.load_dir(&root.join(dir))?;
        }
        Ok(tokens)
    }

    /// Load every `*.json` file in `dir`; the file stem names the culture.
    #[instrument(skip_all, fields(dir = %dir.display()))]
    pub fn load_dir(&mut self, dir: &Path) -> Result<()> {
        let entries = std::fs::read_dir(dir).map_err(|e| DocGraphError::io(dir, e))?;
        for entry in entries {
            let path = entry.map_err(|e| DocGraphError::io(dir, e))?.path();
            let is_json = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
            let Some(culture) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if !is_json {
                continue;
            }

            let content =
                std::fs::read_to_string(&path).map_err(|e| DocGraphError::io(&path, e))?;
            let table: HashMap<String, String> = serde_json::from_str(&content).map_err(|e| {
                DocGraphError::parse(format!("invalid token file {}: {e}", path.display()))
            })?;
            debug!(culture, tokens = table.len(), "loaded token table");
            for (key, value) in table {
                self.insert(culture, &key, &value);
            }
        }
        Ok(())
    }

    pub fn insert(&mut self, culture: &str, key: &str, value: &str) {
        self.tables
            .entry(culture.to_ascii_lowercase())
            .or_default()
            .insert(key.to_string(), value.to_string());
    }

    /// Cultures with at least one token, sorted.
    pub fn cultures(&self) -> Vec<&str> {
        let mut cultures: Vec<&str> = self.tables.keys().map(String::as_str).collect();
        cultures.sort_unstable();
        cultures
    }

    fn get(&self, culture: &str, key: &str) -> Option<&String> {
        self.tables.get(culture).and_then(|table| table.get(key))
    }
}

impl TokenStore for LocalizationTokens {
    fn lookup(&self, culture: &str, key: &str) -> Option<String> {
        let culture = culture.to_ascii_lowercase();
        let neutral = culture.split('-').next().unwrap_or(&culture);
        self.get(&culture, key)
            .or_else(|| self.get(neutral, key))
            .or_else(|| self.get(FALLBACK_CULTURE, key))
            .cloned()
    }
}
