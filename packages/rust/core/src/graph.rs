//! Parallel TOC graph construction.
//!
//! Each TOC file is loaded on tokio's blocking pool, bounded by a semaphore.
//! Workers write into a shared [`DashMap`]; once every worker has finished the
//! map is frozen into an ordered, read-only [`TocGraph`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use docgraph_shared::{
    ContentResolver, Diagnostic, FileId, GraphConfig, MetadataProvider, MonikerMap,
    MonikerProvider, codes,
};

use crate::loader::{TocFileResult, TocLoader};

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for graph builds.
pub trait GraphProgress: Send + Sync {
    /// Called once before any TOC is loaded.
    fn started(&self, total: usize);
    /// Called as each TOC finishes, in completion-collection order.
    fn toc_loaded(&self, file: &FileId, current: usize, total: usize);
    /// Called when the build is complete.
    fn finished(&self, tocs: usize, diagnostics: usize);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl GraphProgress for SilentProgress {
    fn started(&self, _total: usize) {}
    fn toc_loaded(&self, _file: &FileId, _current: usize, _total: usize) {}
    fn finished(&self, _tocs: usize, _diagnostics: usize) {}
}

// ---------------------------------------------------------------------------
// Graph types
// ---------------------------------------------------------------------------

/// What one TOC file links to.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TocGraphEntry {
    pub referenced_files: Vec<FileId>,
    pub referenced_tocs: Vec<FileId>,
    pub fingerprint: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl From<TocFileResult> for TocGraphEntry {
    fn from(result: TocFileResult) -> Self {
        Self {
            referenced_files: result.referenced_files,
            referenced_tocs: result.referenced_tocs,
            fingerprint: result.fingerprint,
            diagnostics: result.errors,
        }
    }
}

/// Immutable TOC → references graph.
#[derive(Debug, Clone, Serialize)]
pub struct TocGraph {
    built_at: DateTime<Utc>,
    entries: BTreeMap<FileId, TocGraphEntry>,
}

impl TocGraph {
    pub fn empty() -> Self {
        Self {
            built_at: Utc::now(),
            entries: BTreeMap::new(),
        }
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, toc: &FileId) -> Option<&TocGraphEntry> {
        self.entries.get(toc)
    }

    pub fn entries(&self) -> &BTreeMap<FileId, TocGraphEntry> {
        &self.entries
    }

    /// Every diagnostic of every TOC.
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.values().flat_map(|entry| entry.diagnostics.iter())
    }

    /// TOCs that link to or include `file`, in path order.
    pub fn tocs_referencing(&self, file: &FileId) -> Vec<&FileId> {
        self.entries
            .iter()
            .filter(|(_, entry)| {
                entry.referenced_files.contains(file) || entry.referenced_tocs.contains(file)
            })
            .map(|(toc, _)| toc)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Shared, thread-safe capabilities handed to every worker.
#[derive(Clone)]
pub struct BuildContext {
    pub resolver: Arc<dyn ContentResolver>,
    pub monikers: Arc<dyn MonikerProvider>,
    pub metadata: Arc<dyn MetadataProvider>,
    pub config: GraphConfig,
}

pub struct TocGraphBuilder {
    ctx: BuildContext,
}

impl TocGraphBuilder {
    pub fn new(ctx: BuildContext) -> Self {
        Self { ctx }
    }

    /// Load every TOC in `files` (without moniker annotation) and record what
    /// each references.
    #[instrument(skip_all, fields(files = files.len(), concurrency = self.ctx.config.concurrency))]
    pub async fn build(&self, files: &[FileId], progress: &dyn GraphProgress) -> TocGraph {
        if files.is_empty() {
            debug!("no toc files, empty graph");
            return TocGraph::empty();
        }

        let results = self.load_all(files, None, progress).await;
        let entries: BTreeMap<FileId, TocGraphEntry> = results
            .into_iter()
            .map(|(file, result)| (file, TocGraphEntry::from(result)))
            .collect();
        let graph = TocGraph {
            built_at: Utc::now(),
            entries,
        };

        let diagnostics = graph.diagnostics().count();
        info!(tocs = graph.len(), diagnostics, "toc graph built");
        progress.finished(graph.len(), diagnostics);
        graph
    }

    /// Final pass: load every TOC with moniker annotation and return the full
    /// per-file results, in path order.
    #[instrument(skip_all, fields(files = files.len(), concurrency = self.ctx.config.concurrency))]
    pub async fn build_tocs(
        &self,
        files: &[FileId],
        moniker_map: Option<Arc<MonikerMap>>,
        progress: &dyn GraphProgress,
    ) -> Vec<TocFileResult> {
        if files.is_empty() {
            return Vec::new();
        }

        let results: Vec<TocFileResult> = self
            .load_all(files, moniker_map, progress)
            .await
            .into_values()
            .collect();
        let diagnostics = results.iter().map(|r| r.errors.len()).sum();
        progress.finished(results.len(), diagnostics);
        results
    }

    async fn load_all(
        &self,
        files: &[FileId],
        moniker_map: Option<Arc<MonikerMap>>,
        progress: &dyn GraphProgress,
    ) -> BTreeMap<FileId, TocFileResult> {
        let unique: BTreeSet<&FileId> = files.iter().collect();
        let total = unique.len();
        progress.started(total);

        let accumulator: Arc<DashMap<FileId, TocFileResult>> = Arc::new(DashMap::new());
        let semaphore = Arc::new(Semaphore::new(self.ctx.config.concurrency.max(1)));
        let mut handles = Vec::with_capacity(total);

        for file in unique {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .expect("graph semaphore is never closed");
            let ctx = self.ctx.clone();
            let map = moniker_map.clone();
            let results = Arc::clone(&accumulator);
            let toc = file.clone();

            handles.push((
                file.clone(),
                tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    let mut loader = TocLoader::new(
                        ctx.resolver.as_ref(),
                        ctx.monikers.as_ref(),
                        ctx.metadata.as_ref(),
                        &ctx.config,
                    );
                    if let Some(map) = map.as_deref() {
                        loader = loader.with_moniker_map(map);
                    }
                    let result = loader.load(&toc);
                    results.insert(toc, result);
                }),
            ));
        }

        // Collect results
        for (current, (file, handle)) in handles.into_iter().enumerate() {
            if let Err(e) = handle.await {
                warn!(toc = %file, error = %e, "toc worker failed");
                let diagnostic = Diagnostic::error(
                    codes::UNEXPECTED_FAILURE,
                    format!("loading '{file}' failed unexpectedly: {e}"),
                );
                accumulator.insert(file.clone(), TocFileResult::failed(&file, diagnostic));
            }
            progress.toc_loaded(&file, current + 1, total);
        }

        let accumulator = Arc::try_unwrap(accumulator).unwrap_or_else(|shared| (*shared).clone());
        accumulator.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::metadata::GlobalMetadata;
    use crate::moniker::OrderedMonikers;
    use docgraph_shared::{
        DependencyKind, MemoryResolver, ResolvedContent, ResolvedLink, ResolvedXref,
    };

    /// Panics when asked to read `poison/toc.md`.
    struct PoisonResolver(MemoryResolver);

    impl ContentResolver for PoisonResolver {
        fn read_file(&self, file: &FileId) -> Result<String, Diagnostic> {
            if file.as_str() == "poison/toc.md" {
                panic!("poisoned toc");
            }
            self.0.read_file(file)
        }

        fn resolve_content(
            &self,
            path: &str,
            relative_to: &FileId,
            kind: DependencyKind,
        ) -> Result<ResolvedContent, Diagnostic> {
            self.0.resolve_content(path, relative_to, kind)
        }

        fn resolve_link(
            &self,
            path: &str,
            relative_to: &FileId,
            display_relative_to: &FileId,
        ) -> Result<ResolvedLink, Diagnostic> {
            self.0.resolve_link(path, relative_to, display_relative_to)
        }

        fn resolve_xref(
            &self,
            uid: &str,
            current: &FileId,
            root: &FileId,
        ) -> Result<ResolvedXref, Diagnostic> {
            self.0.resolve_xref(uid, current, root)
        }
    }

    #[derive(Default)]
    struct CountingProgress {
        loaded: AtomicUsize,
        total: AtomicUsize,
    }

    impl GraphProgress for CountingProgress {
        fn started(&self, total: usize) {
            self.total.store(total, Ordering::SeqCst);
        }
        fn toc_loaded(&self, _file: &FileId, _current: usize, _total: usize) {
            self.loaded.fetch_add(1, Ordering::SeqCst);
        }
        fn finished(&self, _tocs: usize, _diagnostics: usize) {}
    }

    fn docset() -> MemoryResolver {
        MemoryResolver::new()
            .with_file("toc.md", "# [Home](index.md)\n# [Guide](guide/toc.md)\n")
            .with_file("index.md", "# Home\n")
            .with_file("guide/toc.md", "# [Install](install.md)\n# [Missing](missing.md)\n")
            .with_file("guide/install.md", "# Install\n")
            .with_file("a/toc.md", "# [B](../b/toc.md)\n")
            .with_file("b/toc.md", "# [A](../a/toc.md)\n")
    }

    fn builder(resolver: impl ContentResolver + 'static, concurrency: usize) -> TocGraphBuilder {
        TocGraphBuilder::new(BuildContext {
            resolver: Arc::new(resolver),
            monikers: Arc::new(OrderedMonikers::new(vec!["1.0".into(), "2.0".into(), "3.0".into()])),
            metadata: Arc::new(GlobalMetadata::default()),
            config: GraphConfig {
                concurrency,
                ..GraphConfig::default()
            },
        })
    }

    fn tocs(paths: &[&str]) -> Vec<FileId> {
        paths.iter().map(FileId::new).collect()
    }

    #[tokio::test]
    async fn empty_input_builds_an_empty_graph() {
        let progress = CountingProgress::default();
        let graph = builder(docset(), 4).build(&[], &progress).await;
        assert!(graph.is_empty());
        assert_eq!(progress.total.load(Ordering::SeqCst), 0);
        assert_eq!(progress.loaded.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn graph_records_references() {
        let progress = CountingProgress::default();
        let graph = builder(docset(), 4)
            .build(&tocs(&["toc.md", "guide/toc.md"]), &progress)
            .await;

        assert_eq!(graph.len(), 2);
        let root = graph.get(&FileId::new("toc.md")).expect("root entry");
        assert_eq!(root.referenced_tocs, tocs(&["guide/toc.md"]));
        assert_eq!(root.referenced_files, tocs(&["guide/install.md", "index.md"]));
        assert_eq!(root.diagnostics.len(), 1);
        assert_eq!(root.diagnostics[0].code, codes::FILE_NOT_FOUND);
        assert_eq!(
            graph.tocs_referencing(&FileId::new("guide/install.md")),
            vec![&FileId::new("guide/toc.md"), &FileId::new("toc.md")]
        );
        assert_eq!(progress.loaded.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn worker_count_does_not_change_the_graph() {
        let files = tocs(&["toc.md", "guide/toc.md", "a/toc.md", "b/toc.md", "missing/toc.md"]);
        let serial = builder(docset(), 1).build(&files, &SilentProgress).await;
        let parallel = builder(docset(), 8).build(&files, &SilentProgress).await;
        assert_eq!(serial.entries(), parallel.entries());
        assert_eq!(serial.len(), 5);
    }

    #[tokio::test]
    async fn independent_tocs_build_the_same_graph_with_any_worker_count() {
        let resolver = || {
            (0..12).fold(MemoryResolver::new(), |resolver, i| {
                resolver.with_file(&format!("section{i}/toc.md"), &format!("# Section {i}\n"))
            })
        };
        let files: Vec<FileId> = (0..12)
            .map(|i| FileId::new(format!("section{i}/toc.md")))
            .collect();

        let serial = builder(resolver(), 1).build(&files, &SilentProgress).await;
        let parallel = builder(resolver(), 6).build(&files, &SilentProgress).await;

        assert_eq!(serial.len(), 12);
        assert_eq!(serial.entries(), parallel.entries());
        for entry in parallel.entries().values() {
            assert!(entry.referenced_files.is_empty());
            assert!(entry.referenced_tocs.is_empty());
            assert!(entry.diagnostics.is_empty());
            assert_eq!(entry.fingerprint.len(), 64);
        }
    }

    #[tokio::test]
    async fn include_cycle_terminates_with_errors() {
        let graph = builder(docset(), 2)
            .build(&tocs(&["a/toc.md", "b/toc.md"]), &SilentProgress)
            .await;
        for toc in ["a/toc.md", "b/toc.md"] {
            let entry = graph.get(&FileId::new(toc)).expect("entry");
            assert_eq!(entry.diagnostics.len(), 1, "{toc}");
            assert_eq!(entry.diagnostics[0].code, codes::CIRCULAR_TOC_INCLUDE);
        }
        assert_eq!(
            graph.get(&FileId::new("a/toc.md")).map(|e| e.referenced_tocs.clone()),
            Some(tocs(&["b/toc.md"]))
        );
    }

    #[tokio::test]
    async fn panicking_worker_only_fails_its_own_file() {
        let resolver = PoisonResolver(docset().with_file("poison/toc.md", "# X\n"));
        let graph = builder(resolver, 4)
            .build(&tocs(&["toc.md", "poison/toc.md", "guide/toc.md"]), &SilentProgress)
            .await;

        assert_eq!(graph.len(), 3);
        let poisoned = graph.get(&FileId::new("poison/toc.md")).expect("poison entry");
        assert!(poisoned.referenced_files.is_empty());
        assert!(poisoned.referenced_tocs.is_empty());
        assert_eq!(poisoned.diagnostics.len(), 1);
        assert_eq!(poisoned.diagnostics[0].code, codes::UNEXPECTED_FAILURE);

        let root = graph.get(&FileId::new("toc.md")).expect("root entry");
        assert_eq!(root.referenced_tocs, tocs(&["guide/toc.md"]));
    }

    #[tokio::test]
    async fn duplicate_inputs_load_once() {
        let progress = CountingProgress::default();
        let graph = builder(docset(), 2)
            .build(&tocs(&["toc.md", "toc.md"]), &progress)
            .await;
        assert_eq!(graph.len(), 1);
        assert_eq!(progress.loaded.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn final_pass_annotates_monikers() {
        let resolver = MemoryResolver::new()
            .with_file(
                "toc.yml",
                "- name: Newer\n  href: page.md\n  monikerRange: '> 1.0'\n- name: Newest\n  href: page.md\n  monikerRange: '> 3.0'\n",
            )
            .with_file("page.md", "");
        let map: MonikerMap = [(
            FileId::new("page.md"),
            vec!["1.0".to_string(), "2.0".to_string(), "3.0".to_string()],
        )]
        .into_iter()
        .collect();

        let results = builder(resolver, 2)
            .build_tocs(&tocs(&["toc.yml"]), Some(Arc::new(map)), &SilentProgress)
            .await;

        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert_eq!(result.items[0].monikers, vec!["2.0", "3.0"]);
        assert!(result.items[1].monikers.is_empty());
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].code, codes::MONIKER_MISMATCH);
    }
}
