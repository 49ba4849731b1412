//! TOC loading: parse, splice included TOCs, resolve hrefs, annotate monikers.
//!
//! A load never fails as a whole. Every problem becomes a [`Diagnostic`] in
//! the result and the affected item keeps its authored href.

use std::collections::BTreeSet;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

use docgraph_markdown::{TocOutline, is_local_href, parse_toc};
use docgraph_shared::{
    ContentResolver, DependencyKind, Diagnostic, FileId, GraphConfig, MetadataProvider,
    MonikerMap, MonikerProvider, TocItem, TocMetadata, codes, split_link,
};

use crate::yaml_toc::parse_yaml_toc;

// ---------------------------------------------------------------------------
// Result type
// ---------------------------------------------------------------------------

/// Everything learned from loading one TOC file.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TocFileResult {
    pub file: FileId,
    pub items: Vec<TocItem>,
    pub metadata: TocMetadata,
    pub errors: Vec<Diagnostic>,
    /// Distinct content files linked from the TOC (included TOCs too), sorted.
    pub referenced_files: Vec<FileId>,
    /// Distinct TOC files spliced in, directly or transitively, sorted.
    pub referenced_tocs: Vec<FileId>,
    /// SHA-256 of the TOC source, hex encoded. Empty when it could not be read.
    pub fingerprint: String,
}

impl TocFileResult {
    /// A result carrying nothing but one failure.
    pub fn failed(file: &FileId, diagnostic: Diagnostic) -> Self {
        Self {
            file: file.clone(),
            errors: vec![diagnostic.locate(file, None)],
            ..Self::default()
        }
    }

    pub fn has_errors(&self) -> bool {
        self.errors.iter().any(Diagnostic::is_error)
    }
}

/// Per-load bookkeeping.
struct LoadState {
    root: FileId,
    /// TOC files currently being spliced, outermost first.
    chain: Vec<FileId>,
    errors: Vec<Diagnostic>,
    referenced_files: BTreeSet<FileId>,
    referenced_tocs: BTreeSet<FileId>,
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Loads TOC files through injected capabilities.
pub struct TocLoader<'a> {
    resolver: &'a dyn ContentResolver,
    monikers: &'a dyn MonikerProvider,
    metadata: &'a dyn MetadataProvider,
    config: &'a GraphConfig,
    moniker_map: Option<&'a MonikerMap>,
}

impl<'a> TocLoader<'a> {
    pub fn new(
        resolver: &'a dyn ContentResolver,
        monikers: &'a dyn MonikerProvider,
        metadata: &'a dyn MetadataProvider,
        config: &'a GraphConfig,
    ) -> Self {
        Self {
            resolver,
            monikers,
            metadata,
            config,
            moniker_map: None,
        }
    }

    /// Annotate items with monikers from `map`.
    pub fn with_moniker_map(mut self, map: &'a MonikerMap) -> Self {
        self.moniker_map = Some(map);
        self
    }

    /// Read and load `file`.
    #[instrument(skip_all, fields(toc = %file))]
    pub fn load(&self, file: &FileId) -> TocFileResult {
        match self.resolver.read_file(file) {
            Ok(content) => self.load_content(file, &content),
            Err(diagnostic) => {
                warn!(code = %diagnostic.code, "toc could not be read");
                TocFileResult::failed(file, diagnostic)
            }
        }
    }

    /// Load `file` from already-read `content`.
    pub fn load_content(&self, file: &FileId, content: &str) -> TocFileResult {
        let mut state = LoadState {
            root: file.clone(),
            chain: vec![file.clone()],
            errors: Vec::new(),
            referenced_files: BTreeSet::new(),
            referenced_tocs: BTreeSet::new(),
        };

        let outline = self.parse(file, content, &mut state);
        let mut items = outline.items;
        self.resolve_items(&mut items, file, &mut state);

        let mut metadata = self.metadata.toc_metadata(file, &outline.metadata);
        match self
            .monikers
            .file_level_monikers(file, metadata.moniker_range.as_deref())
        {
            Ok(monikers) => metadata.monikers = monikers,
            Err(diagnostic) => state.errors.push(diagnostic.locate(file, None)),
        }

        if let Some(map) = self.moniker_map {
            self.annotate(&mut items, map, file, &mut state.errors);
        }

        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        let fingerprint = format!("{:x}", hasher.finalize());

        debug!(
            items = items.len(),
            files = state.referenced_files.len(),
            tocs = state.referenced_tocs.len(),
            errors = state.errors.len(),
            "toc loaded"
        );

        TocFileResult {
            file: file.clone(),
            items,
            metadata,
            errors: state.errors,
            referenced_files: state.referenced_files.into_iter().collect(),
            referenced_tocs: state.referenced_tocs.into_iter().collect(),
            fingerprint,
        }
    }

    fn parse(&self, file: &FileId, content: &str, state: &mut LoadState) -> TocOutline {
        let mut outline = match file.extension().as_deref() {
            Some("yml" | "yaml") => parse_yaml_toc(content),
            _ => parse_toc(content),
        };
        state.errors.extend(
            outline
                .diagnostics
                .drain(..)
                .map(|diagnostic| diagnostic.locate(file, None)),
        );
        outline
    }

    fn is_toc_reference(&self, href: &str) -> bool {
        let (path, _) = split_link(href);
        let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
        self.config.is_toc_name(name)
    }

    // -----------------------------------------------------------------------
    // Href resolution
    // -----------------------------------------------------------------------

    /// Resolve hrefs depth-first in source order: an item before its children.
    fn resolve_items(&self, items: &mut [TocItem], containing: &FileId, state: &mut LoadState) {
        for item in items.iter_mut() {
            match item.href.clone() {
                Some(href) if href.starts_with("xref:") => {
                    self.resolve_xref_item(item, &href["xref:".len()..], containing, state);
                }
                Some(href) if is_local_href(&href) && self.is_toc_reference(&href) => {
                    // Authored children come before the spliced roots.
                    self.resolve_items(&mut item.children, containing, state);
                    self.splice_toc(item, &href, containing, state);
                    continue;
                }
                Some(href) if is_local_href(&href) => {
                    self.resolve_link_item(item, &href, containing, state);
                }
                _ => {}
            }
            self.resolve_items(&mut item.children, containing, state);
        }
    }

    fn resolve_xref_item(
        &self,
        item: &mut TocItem,
        uid: &str,
        containing: &FileId,
        state: &mut LoadState,
    ) {
        match self.resolver.resolve_xref(uid, containing, &state.root) {
            Ok(xref) => {
                if item.title.is_empty() {
                    item.title = xref.display;
                }
                item.href = Some(xref.href);
                state.referenced_files.insert(xref.file.clone());
                item.file = Some(xref.file);
            }
            Err(diagnostic) => state.errors.push(diagnostic.locate(containing, item.line)),
        }
    }

    fn resolve_link_item(
        &self,
        item: &mut TocItem,
        href: &str,
        containing: &FileId,
        state: &mut LoadState,
    ) {
        match self.resolver.resolve_link(href, containing, &state.root) {
            Ok(link) => {
                item.href = Some(link.href);
                if let Some(file) = link.file {
                    state.referenced_files.insert(file.clone());
                    item.file = Some(file);
                }
            }
            Err(diagnostic) => state.errors.push(diagnostic.locate(containing, item.line)),
        }
    }

    /// Replace a link to another TOC with that TOC's roots.
    fn splice_toc(&self, item: &mut TocItem, href: &str, containing: &FileId, state: &mut LoadState) {
        let (path, _) = split_link(href);
        let included = match self
            .resolver
            .resolve_content(path, containing, DependencyKind::TocInclude)
        {
            Ok(included) => included,
            Err(diagnostic) => {
                state.errors.push(diagnostic.locate(containing, item.line));
                return;
            }
        };

        if state.chain.contains(&included.file) {
            let cycle: Vec<&str> = state
                .chain
                .iter()
                .map(FileId::as_str)
                .chain(std::iter::once(included.file.as_str()))
                .collect();
            state.errors.push(
                Diagnostic::error(
                    codes::CIRCULAR_TOC_INCLUDE,
                    format!("circular TOC include: {}", cycle.join(" -> ")),
                )
                .locate(containing, item.line),
            );
            return;
        }

        debug!(from = %containing, toc = %included.file, "splicing toc");
        state.referenced_tocs.insert(included.file.clone());
        state.chain.push(included.file.clone());

        let outline = self.parse(&included.file, &included.content, state);
        let mut roots = outline.items;
        self.resolve_items(&mut roots, &included.file, state);

        state.chain.pop();
        // From here on spliced items are located at the entry that pulled them in.
        relocate(&mut roots, item.line);
        item.children.extend(roots);
        item.href = None;
    }

    // -----------------------------------------------------------------------
    // Moniker annotation
    // -----------------------------------------------------------------------

    /// Fill `monikers` on every item and return the ordered union of
    /// `items`' monikers.
    fn annotate(
        &self,
        items: &mut [TocItem],
        map: &MonikerMap,
        toc: &FileId,
        errors: &mut Vec<Diagnostic>,
    ) -> Vec<String> {
        let mut union: Vec<String> = Vec::new();
        for item in items.iter_mut() {
            item.monikers = if item.is_leaf() {
                self.leaf_monikers(item, map, toc, errors)
            } else {
                self.annotate(&mut item.children, map, toc, errors)
            };
            for moniker in &item.monikers {
                if !union.contains(moniker) {
                    union.push(moniker.clone());
                }
            }
        }
        union
    }

    fn leaf_monikers(
        &self,
        item: &TocItem,
        map: &MonikerMap,
        toc: &FileId,
        errors: &mut Vec<Diagnostic>,
    ) -> Vec<String> {
        let declared = match item.moniker_range.as_deref() {
            Some(range) => match self.monikers.parse_range(range) {
                Ok(list) => Some(list),
                Err(diagnostic) => {
                    errors.push(diagnostic.locate(toc, item.line));
                    None
                }
            },
            None => None,
        };
        let target = item
            .file
            .as_ref()
            .and_then(|file| map.get(file))
            .filter(|monikers| !monikers.is_empty());

        match (declared, target) {
            (Some(declared), Some(target)) => {
                let kept: Vec<String> = target
                    .iter()
                    .filter(|moniker| declared.contains(moniker))
                    .cloned()
                    .collect();
                if kept.is_empty() {
                    errors.push(
                        Diagnostic::warning(
                            codes::MONIKER_MISMATCH,
                            format!(
                                "'{}' declares '{}' but its target applies to {}",
                                item.title,
                                item.moniker_range.as_deref().unwrap_or_default(),
                                target.join(", ")
                            ),
                        )
                        .locate(toc, item.line),
                    );
                }
                kept
            }
            (Some(declared), None) => declared,
            (None, Some(target)) => target.to_vec(),
            (None, None) => Vec::new(),
        }
    }
}

fn relocate(items: &mut [TocItem], line: Option<usize>) {
    for item in items {
        item.line = line;
        relocate(&mut item.children, line);
    }
}
