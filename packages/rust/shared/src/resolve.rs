//! Capability traits injected into renders and TOC loads.
//!
//! Every operation returns its failure as a [`Diagnostic`] rather than
//! raising. Callers append the diagnostic to their sink and keep going with a
//! best-effort substitute.

use serde_json::{Map, Value};

use crate::diagnostics::Diagnostic;
use crate::types::{FileId, TocMetadata};

/// Why a piece of content is being pulled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyKind {
    /// Markdown include spliced into a rendered document.
    Include,
    /// TOC fragment spliced into another TOC.
    TocInclude,
}

/// Content pulled in through an include.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedContent {
    pub content: String,
    pub file: FileId,
}

/// A navigable link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLink {
    pub href: String,
    /// The docset file behind the link, if any.
    pub file: Option<FileId>,
}

/// A cross-reference target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedXref {
    pub href: String,
    pub display: String,
    pub file: FileId,
}

/// Resolves references between files of a docset.
pub trait ContentResolver: Send + Sync {
    /// Read a file of the docset by identity.
    fn read_file(&self, file: &FileId) -> Result<String, Diagnostic>;

    /// Resolve `path`, written in `relative_to`, to file content.
    fn resolve_content(
        &self,
        path: &str,
        relative_to: &FileId,
        kind: DependencyKind,
    ) -> Result<ResolvedContent, Diagnostic>;

    /// Resolve `path`, written in `relative_to`, to an href that is correct
    /// when displayed from `display_relative_to`.
    fn resolve_link(
        &self,
        path: &str,
        relative_to: &FileId,
        display_relative_to: &FileId,
    ) -> Result<ResolvedLink, Diagnostic>;

    /// Resolve a cross-reference identifier; the href is relative to `root`.
    fn resolve_xref(
        &self,
        uid: &str,
        current: &FileId,
        root: &FileId,
    ) -> Result<ResolvedXref, Diagnostic>;
}

/// Turns moniker range expressions into ordered moniker lists.
pub trait MonikerProvider: Send + Sync {
    /// Evaluate a range expression such as `>= 2.0`.
    fn parse_range(&self, range: &str) -> Result<Vec<String>, Diagnostic>;

    /// Monikers a file applies to given its declared range (if any).
    fn file_level_monikers(
        &self,
        file: &FileId,
        declared_range: Option<&str>,
    ) -> Result<Vec<String>, Diagnostic>;
}

/// Produces the effective metadata of a TOC file.
pub trait MetadataProvider: Send + Sync {
    fn toc_metadata(&self, file: &FileId, inline: &Map<String, Value>) -> TocMetadata;
}

/// Localized string lookup. A missing key is `None`, never an error.
pub trait TokenStore: Send + Sync {
    fn lookup(&self, culture: &str, key: &str) -> Option<String>;
}
