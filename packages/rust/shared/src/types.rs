//! Core domain types for docgraph content graphs.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// FileId
// ---------------------------------------------------------------------------

/// A docset-relative file path, normalized to forward slashes with no `.` or
/// `..` segments.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(String);

impl FileId {
    /// Normalize `path` into a file identity. `..` segments that would climb
    /// above the docset root are dropped.
    pub fn new(path: impl AsRef<str>) -> Self {
        let mut segments: Vec<&str> = Vec::new();
        for segment in path.as_ref().split(['/', '\\']) {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                s => segments.push(s),
            }
        }
        Self(segments.join("/"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Directory part of the path (empty for files at the docset root).
    pub fn dir(&self) -> &str {
        self.0.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
    }

    pub fn file_name(&self) -> &str {
        self.0.rsplit_once('/').map(|(_, name)| name).unwrap_or(&self.0)
    }

    /// Lowercased extension without the dot.
    pub fn extension(&self) -> Option<String> {
        self.file_name()
            .rsplit_once('.')
            .filter(|(stem, _)| !stem.is_empty())
            .map(|(_, ext)| ext.to_ascii_lowercase())
    }

    pub fn with_extension(&self, ext: &str) -> Self {
        let name = self.file_name();
        let stem = name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(name);
        let renamed = if ext.is_empty() {
            stem.to_string()
        } else {
            format!("{stem}.{ext}")
        };
        match self.dir() {
            "" => Self(renamed),
            dir => Self(format!("{dir}/{renamed}")),
        }
    }

    /// Resolve a reference written inside this file.
    ///
    /// Paths starting with `/` or `~/` are docset-rooted. Returns `None` when
    /// the reference climbs above the docset root.
    pub fn resolve(&self, reference: &str) -> Option<Self> {
        let (base, rest) = if let Some(rooted) = reference.strip_prefix("~/") {
            ("", rooted)
        } else if let Some(rooted) = reference.strip_prefix('/') {
            ("", rooted)
        } else {
            (self.dir(), reference)
        };

        let mut segments: Vec<&str> = base.split('/').filter(|s| !s.is_empty()).collect();
        for segment in rest.split(['/', '\\']) {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop()?;
                }
                s => segments.push(s),
            }
        }
        if segments.is_empty() {
            return None;
        }
        Some(Self(segments.join("/")))
    }

    /// Path to this file as seen from the directory of `from`.
    pub fn relative_to(&self, from: &FileId) -> String {
        let from_dir: Vec<&str> = from.dir().split('/').filter(|s| !s.is_empty()).collect();
        let target: Vec<&str> = self.0.split('/').collect();
        let target_dir = &target[..target.len().saturating_sub(1)];

        let common = from_dir
            .iter()
            .zip(target_dir.iter())
            .take_while(|(a, b)| a == b)
            .count();

        let mut parts: Vec<&str> = vec![".."; from_dir.len() - common];
        parts.extend_from_slice(&target[common..]);
        parts.join("/")
    }

    /// Where this file lands in the built site: markdown pages become `.html`.
    pub fn site_path(&self) -> Self {
        match self.extension().as_deref() {
            Some("md") => self.with_extension("html"),
            _ => self.clone(),
        }
    }

    /// Href to this file's built page, as seen from `from`.
    pub fn href_from(&self, from: &FileId) -> String {
        self.site_path().relative_to(from)
    }
}

/// Split an href into its path and its `?query`/`#fragment` suffix.
pub fn split_link(href: &str) -> (&str, &str) {
    match href.find(['?', '#']) {
        Some(at) => href.split_at(at),
        None => (href, ""),
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FileId {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

// ---------------------------------------------------------------------------
// TocItem
// ---------------------------------------------------------------------------

/// A single node of a table of contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TocItem {
    /// Display title.
    pub title: String,
    /// Navigable link (resolved when resolution succeeded, as authored otherwise).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    /// The docset file the href resolved to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileId>,
    /// Moniker range expression declared on the item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moniker_range: Option<String>,
    /// Monikers the item applies to, filled by the annotation pass.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub monikers: Vec<String>,
    /// Per-item metadata overrides.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    /// Nested child items.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TocItem>,
    /// 1-based source line, when the TOC format provides one.
    #[serde(skip)]
    pub line: Option<usize>,
}

impl TocItem {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_href(mut self, href: impl Into<String>) -> Self {
        self.href = Some(href.into());
        self
    }

    pub fn with_children(mut self, children: Vec<TocItem>) -> Self {
        self.children = children;
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

// ---------------------------------------------------------------------------
// TocMetadata
// ---------------------------------------------------------------------------

/// TOC-level metadata produced by a metadata provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TocMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub culture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moniker_range: Option<String>,
    /// File-level monikers of the TOC itself.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub monikers: Vec<String>,
    /// Every other key, merged from global and inline metadata.
    #[serde(flatten)]
    pub values: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// MonikerMap
// ---------------------------------------------------------------------------

/// File identity → ordered monikers that file applies to.
#[derive(Debug, Clone, Default)]
pub struct MonikerMap {
    files: HashMap<FileId, Vec<String>>,
}

impl MonikerMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, file: FileId, monikers: Vec<String>) {
        self.files.insert(file, monikers);
    }

    pub fn get(&self, file: &FileId) -> Option<&[String]> {
        self.files.get(file).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FromIterator<(FileId, Vec<String>)> for MonikerMap {
    fn from_iter<I: IntoIterator<Item = (FileId, Vec<String>)>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}
