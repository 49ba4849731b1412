//! An in-memory docset, for embedding and tests.

use std::collections::{BTreeMap, HashMap};

use crate::diagnostics::{Diagnostic, codes};
use crate::resolve::{
    ContentResolver, DependencyKind, ResolvedContent, ResolvedLink, ResolvedXref,
};
use crate::types::{FileId, split_link};

/// A [`ContentResolver`] over files held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryResolver {
    files: BTreeMap<FileId, String>,
    xrefs: HashMap<String, (FileId, String)>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: &str, content: &str) -> Self {
        self.insert_file(path, content);
        self
    }

    /// Register `uid` as a cross-reference to `path`, displayed as `display`.
    pub fn with_xref(mut self, uid: &str, path: &str, display: &str) -> Self {
        self.xrefs
            .insert(uid.to_string(), (FileId::new(path), display.to_string()));
        self
    }

    pub fn insert_file(&mut self, path: &str, content: &str) {
        self.files.insert(FileId::new(path), content.to_string());
    }

    pub fn contains(&self, file: &FileId) -> bool {
        self.files.contains_key(file)
    }

    /// Every file, in path order.
    pub fn files(&self) -> impl Iterator<Item = &FileId> {
        self.files.keys()
    }

    fn locate(&self, path: &str, relative_to: &FileId) -> Result<FileId, Diagnostic> {
        relative_to.resolve(path).ok_or_else(|| {
            Diagnostic::warning(
                codes::LINK_OUT_OF_DOCSET,
                format!("'{path}' points outside the docset"),
            )
        })
    }
}

impl ContentResolver for MemoryResolver {
    fn read_file(&self, file: &FileId) -> Result<String, Diagnostic> {
        self.files.get(file).cloned().ok_or_else(|| {
            Diagnostic::error(codes::FILE_NOT_FOUND, format!("file '{file}' not found"))
        })
    }

    fn resolve_content(
        &self,
        path: &str,
        relative_to: &FileId,
        _kind: DependencyKind,
    ) -> Result<ResolvedContent, Diagnostic> {
        let file = self
            .locate(path, relative_to)
            .map_err(|d| Diagnostic::error(&d.code, d.message))?;
        match self.files.get(&file) {
            Some(content) => Ok(ResolvedContent {
                content: content.clone(),
                file,
            }),
            None => Err(Diagnostic::error(
                codes::FILE_NOT_FOUND,
                format!("included file '{path}' not found"),
            )),
        }
    }

    fn resolve_link(
        &self,
        path: &str,
        relative_to: &FileId,
        display_relative_to: &FileId,
    ) -> Result<ResolvedLink, Diagnostic> {
        let (target, suffix) = split_link(path);
        if target.is_empty() {
            return Ok(ResolvedLink {
                href: path.to_string(),
                file: None,
            });
        }
        let file = self.locate(target, relative_to)?;
        if !self.files.contains_key(&file) {
            return Err(Diagnostic::warning(
                codes::FILE_NOT_FOUND,
                format!("link target '{target}' not found"),
            ));
        }
        Ok(ResolvedLink {
            href: format!("{}{suffix}", file.href_from(display_relative_to)),
            file: Some(file),
        })
    }

    fn resolve_xref(
        &self,
        uid: &str,
        _current: &FileId,
        root: &FileId,
    ) -> Result<ResolvedXref, Diagnostic> {
        let (file, display) = self.xrefs.get(uid).ok_or_else(|| {
            Diagnostic::warning(codes::XREF_NOT_FOUND, format!("cross reference '{uid}' not found"))
        })?;
        Ok(ResolvedXref {
            href: file.href_from(root),
            display: display.clone(),
            file: file.clone(),
        })
    }
}
