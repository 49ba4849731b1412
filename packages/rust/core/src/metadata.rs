//! TOC metadata: docset-wide values from `docgraph.toml` under the TOC's own
//! front matter.

use serde_json::{Map, Value};

use docgraph_shared::{AppConfig, FileId, MetadataProvider, TocMetadata};

const CULTURE_KEY: &str = "culture";
const MONIKER_RANGE_KEY: &str = "monikerRange";

#[derive(Debug, Clone, Default)]
pub struct GlobalMetadata {
    global: Map<String, Value>,
    culture: Option<String>,
}

impl GlobalMetadata {
    pub fn new(global: Map<String, Value>, culture: Option<String>) -> Self {
        Self { global, culture }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.metadata.clone(), Some(config.build.culture.clone()))
    }
}

impl MetadataProvider for GlobalMetadata {
    fn toc_metadata(&self, _file: &FileId, inline: &Map<String, Value>) -> TocMetadata {
        let mut values = self.global.clone();
        values.extend(inline.iter().map(|(k, v)| (k.clone(), v.clone())));

        let culture = take_string(&mut values, CULTURE_KEY).or_else(|| self.culture.clone());
        let moniker_range = take_string(&mut values, MONIKER_RANGE_KEY);

        TocMetadata {
            culture,
            moniker_range,
            monikers: Vec::new(),
            values,
        }
    }
}

fn take_string(values: &mut Map<String, Value>, key: &str) -> Option<String> {
    match values.remove(key)? {
        Value::String(s) => Some(s),
        other => {
            values.insert(key.to_string(), other);
            None
        }
    }
}
