//! Content diagnostics: warnings and errors collected during a build.
//!
//! A [`Diagnostic`] is a plain value. Resolvers return it through `Err`,
//! loaders and render contexts append it to a sink, and the build carries on
//! with a best-effort substitute.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::FileId;

/// Stable diagnostic codes emitted by docgraph.
pub mod codes {
    pub const FILE_NOT_FOUND: &str = "file-not-found";
    pub const LINK_OUT_OF_DOCSET: &str = "link-out-of-docset";
    pub const XREF_NOT_FOUND: &str = "xref-not-found";
    pub const CIRCULAR_REFERENCE: &str = "circular-reference";
    pub const CIRCULAR_TOC_INCLUDE: &str = "circular-toc-include";
    pub const MONIKER_MISMATCH: &str = "moniker-mismatch";
    pub const INVALID_MONIKER_RANGE: &str = "invalid-moniker-range";
    pub const UNCLOSED_MONIKER_ZONE: &str = "unclosed-moniker-zone";
    pub const UNEXPECTED_MONIKER_ZONE_END: &str = "unexpected-moniker-zone-end";
    pub const EMPTY_MONIKER_ZONE: &str = "empty-moniker-zone";
    pub const INVALID_FRONT_MATTER: &str = "invalid-front-matter";
    pub const INVALID_TOC: &str = "invalid-toc";
    pub const UNEXPECTED_FAILURE: &str = "unexpected-failure";
}

/// How bad a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Degraded but usable result.
    Warning,
    /// The affected unit (one file or one TOC branch) is unusable.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => f.write_str("warning"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// A 1-based line/column span in a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRange {
    pub line: usize,
    pub column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

impl SourceRange {
    /// A range covering the start of a single line.
    pub fn line(line: usize) -> Self {
        Self {
            line,
            column: 1,
            end_line: line,
            end_column: 1,
        }
    }
}

/// A warning or error attributed to a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<SourceRange>,
}

impl Diagnostic {
    pub fn new(severity: Severity, code: &str, message: impl Into<String>) -> Self {
        Self {
            severity,
            code: code.to_string(),
            message: message.into(),
            file: None,
            range: None,
        }
    }

    pub fn warning(code: &str, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, message)
    }

    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, message)
    }

    pub fn with_file(mut self, file: &FileId) -> Self {
        self.file = Some(file.clone());
        self
    }

    pub fn with_line(mut self, line: usize) -> Self {
        self.range = Some(SourceRange::line(line));
        self
    }

    /// Attribute to `file` (and `line`) unless the producer already did.
    ///
    /// Resolvers know which file failed to resolve but not where the
    /// reference was written; the caller fills in the gaps.
    pub fn locate(mut self, file: &FileId, line: Option<usize>) -> Self {
        if self.file.is_none() {
            self.file = Some(file.clone());
        }
        if self.range.is_none() {
            self.range = line.map(SourceRange::line);
        }
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.severity)?;
        if let Some(file) = &self.file {
            write!(f, " {file}")?;
            if let Some(range) = &self.range {
                write!(f, ":{}", range.line)?;
            }
        }
        write!(f, ": [{}] {}", self.code, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_location_and_code() {
        let diag = Diagnostic::warning(codes::FILE_NOT_FOUND, "missing.md does not exist")
            .with_file(&FileId::new("docs/toc.md"))
            .with_line(2);
        assert_eq!(
            diag.to_string(),
            "warning docs/toc.md:2: [file-not-found] missing.md does not exist"
        );
    }

    #[test]
    fn locate_keeps_existing_attribution() {
        let included = FileId::new("b/toc.md");
        let diag = Diagnostic::error(codes::INVALID_TOC, "bad")
            .with_file(&included)
            .locate(&FileId::new("a/toc.md"), Some(4));
        assert_eq!(diag.file, Some(included));
        assert_eq!(diag.range, Some(SourceRange::line(4)));
        assert!(diag.is_error());
    }

    #[test]
    fn severity_serializes_lowercase() {
        let json = serde_json::to_string(&Severity::Warning).expect("serialize");
        assert_eq!(json, "\"warning\"");
    }
}
