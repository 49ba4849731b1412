//! Per-render state threaded explicitly through a render and its includes.
//!
//! A [`RenderContext`] belongs to exactly one execution context (one worker
//! handling one file). Each render pushes a [`RenderJob`]; includes push
//! nested jobs on the same stack so their diagnostics roll up into the
//! outermost render's sink. [`RenderScope`] pops on every exit path,
//! unwinding included.

use std::ops::{Deref, DerefMut};

use tracing::trace;

use docgraph_shared::{
    ContentResolver, DependencyKind, Diagnostic, DocGraphError, FileId, MonikerProvider,
    ResolvedContent, ResolvedLink, ResolvedXref, Result, TokenStore,
};

use crate::pipeline::PipelineKind;

/// One entry of the render stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderJob {
    pub file: FileId,
    pub kind: PipelineKind,
    /// Culture for localized tokens; inherited from the enclosing render.
    pub culture: String,
}

/// Proof of a `begin_render`, consumed by `end_render`.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a render must be ended with `end_render`"]
pub struct RenderHandle {
    depth: usize,
}

impl RenderHandle {
    /// Stack depth including this job (1 for a top-level render).
    pub fn depth(&self) -> usize {
        self.depth
    }
}

/// Render state for a single execution context.
pub struct RenderContext<'r> {
    resolver: &'r dyn ContentResolver,
    monikers: Option<&'r dyn MonikerProvider>,
    tokens: Option<&'r dyn TokenStore>,
    culture: String,
    stack: Vec<RenderJob>,
    diagnostics: Vec<Diagnostic>,
}

impl<'r> RenderContext<'r> {
    pub fn new(resolver: &'r dyn ContentResolver) -> Self {
        Self {
            resolver,
            monikers: None,
            tokens: None,
            culture: "en-us".to_string(),
            stack: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn with_monikers(mut self, monikers: &'r dyn MonikerProvider) -> Self {
        self.monikers = Some(monikers);
        self
    }

    pub fn with_tokens(mut self, tokens: &'r dyn TokenStore) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn with_culture(mut self, culture: impl Into<String>) -> Self {
        self.culture = culture.into();
        self
    }

    /// Culture of the innermost render, or the context default when idle.
    pub fn culture(&self) -> &str {
        self.stack
            .last()
            .map_or(self.culture.as_str(), |job| job.culture.as_str())
    }

    /// Switch the culture of the innermost render and its nested renders.
    pub fn set_culture(&mut self, culture: impl Into<String>) -> Result<()> {
        let job = self.stack.last_mut().ok_or(DocGraphError::NoActiveRender)?;
        job.culture = culture.into();
        Ok(())
    }

    /// Number of renders currently on the stack.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn is_active(&self) -> bool {
        !self.stack.is_empty()
    }

    /// Whether `file` is being rendered anywhere on the stack.
    pub fn is_rendering(&self, file: &FileId) -> bool {
        self.stack.iter().any(|job| &job.file == file)
    }

    // -----------------------------------------------------------------------
    // Stack management
    // -----------------------------------------------------------------------

    /// Push a render of `file`. A top-level render starts a fresh sink.
    pub fn begin_render(&mut self, kind: PipelineKind, file: &FileId) -> RenderHandle {
        if self.stack.is_empty() {
            self.diagnostics.clear();
        }
        let culture = self.culture().to_string();
        self.stack.push(RenderJob {
            file: file.clone(),
            kind,
            culture,
        });
        trace!(file = %file, kind = %kind, depth = self.stack.len(), "begin render");
        RenderHandle {
            depth: self.stack.len(),
        }
    }

    /// Pop the render identified by `handle`.
    ///
    /// Ending the top-level render hands back every diagnostic collected by it
    /// and its nested renders; ending a nested render returns nothing.
    pub fn end_render(&mut self, handle: RenderHandle) -> Result<Vec<Diagnostic>> {
        if handle.depth != self.stack.len() {
            return Err(DocGraphError::RenderStackMismatch {
                expected: handle.depth,
                actual: self.stack.len(),
            });
        }
        self.stack.pop();
        trace!(depth = self.stack.len(), "end render");
        if self.stack.is_empty() {
            Ok(std::mem::take(&mut self.diagnostics))
        } else {
            Ok(Vec::new())
        }
    }

    /// Begin a render that ends when the returned scope is finished or dropped.
    pub fn scope(&mut self, kind: PipelineKind, file: &FileId) -> RenderScope<'_, 'r> {
        let handle = self.begin_render(kind, file);
        RenderScope {
            ctx: self,
            handle: Some(handle),
        }
    }

    fn abandon(&mut self, handle: RenderHandle) {
        self.stack.truncate(handle.depth.saturating_sub(1));
    }

    // -----------------------------------------------------------------------
    // Active render accessors
    // -----------------------------------------------------------------------

    /// The innermost active render.
    pub fn current(&self) -> Result<&RenderJob> {
        self.stack.last().ok_or(DocGraphError::NoActiveRender)
    }

    /// The file of the outermost render; links are displayed relative to it.
    pub fn root_file(&self) -> Result<&FileId> {
        self.stack
            .first()
            .map(|job| &job.file)
            .ok_or(DocGraphError::NoActiveRender)
    }

    /// Diagnostics collected so far by the active top-level render.
    pub fn diagnostics(&self) -> Result<&[Diagnostic]> {
        self.current()?;
        Ok(&self.diagnostics)
    }

    /// Append a diagnostic, attributing it to the current file if needed.
    pub fn report(&mut self, diagnostic: Diagnostic) -> Result<()> {
        self.report_at(diagnostic, None)
    }

    pub fn report_at(&mut self, diagnostic: Diagnostic, line: Option<usize>) -> Result<()> {
        let file = self.current()?.file.clone();
        self.diagnostics.push(diagnostic.locate(&file, line));
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Resolver capabilities
    // -----------------------------------------------------------------------

    /// Resolve an include written in the current file.
    pub fn resolve_content(
        &mut self,
        path: &str,
        line: Option<usize>,
    ) -> Result<Option<ResolvedContent>> {
        let current = self.current()?.file.clone();
        match self
            .resolver
            .resolve_content(path, &current, DependencyKind::Include)
        {
            Ok(resolved) => Ok(Some(resolved)),
            Err(diagnostic) => self.report_at(diagnostic, line).map(|_| None),
        }
    }

    /// Resolve a link written in the current file, displayed from the root file.
    pub fn resolve_link(&mut self, path: &str, line: Option<usize>) -> Result<Option<ResolvedLink>> {
        let current = self.current()?.file.clone();
        let root = self.root_file()?.clone();
        match self.resolver.resolve_link(path, &current, &root) {
            Ok(resolved) => Ok(Some(resolved)),
            Err(diagnostic) => self.report_at(diagnostic, line).map(|_| None),
        }
    }

    pub fn resolve_xref(&mut self, uid: &str, line: Option<usize>) -> Result<Option<ResolvedXref>> {
        let current = self.current()?.file.clone();
        let root = self.root_file()?.clone();
        match self.resolver.resolve_xref(uid, &current, &root) {
            Ok(resolved) => Ok(Some(resolved)),
            Err(diagnostic) => self.report_at(diagnostic, line).map(|_| None),
        }
    }

    /// Evaluate a moniker range. Without a provider every range is empty.
    pub fn resolve_moniker_range(&mut self, range: &str, line: Option<usize>) -> Result<Vec<String>> {
        self.current()?;
        let Some(monikers) = self.monikers else {
            return Ok(Vec::new());
        };
        match monikers.parse_range(range) {
            Ok(list) => Ok(list),
            Err(diagnostic) => self.report_at(diagnostic, line).map(|_| Vec::new()),
        }
    }

    pub fn localized_token(&self, key: &str) -> Option<String> {
        self.tokens.and_then(|tokens| tokens.lookup(self.culture(), key))
    }
}

/// RAII guard for one render on a [`RenderContext`].
pub struct RenderScope<'c, 'r> {
    ctx: &'c mut RenderContext<'r>,
    handle: Option<RenderHandle>,
}

impl RenderScope<'_, '_> {
    /// End the render, returning the top-level diagnostics (empty when nested).
    pub fn finish(mut self) -> Result<Vec<Diagnostic>> {
        match self.handle.take() {
            Some(handle) => self.ctx.end_render(handle),
            None => Ok(Vec::new()),
        }
    }
}

impl<'r> Deref for RenderScope<'_, 'r> {
    type Target = RenderContext<'r>;

    fn deref(&self) -> &Self::Target {
        self.ctx
    }
}

impl<'r> DerefMut for RenderScope<'_, 'r> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.ctx
    }
}

impl Drop for RenderScope<'_, '_> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.ctx.abandon(handle);
        }
    }
}
