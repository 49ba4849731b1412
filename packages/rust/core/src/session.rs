//! A docset opened for building: config, collaborators, and the end-to-end
//! graph build used by the CLI.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, instrument};

use docgraph_markdown::{PipelineKind, PipelineRegistry, RenderContext, RenderOutput, render};
use docgraph_shared::{
    AppConfig, Diagnostic, DocGraphError, FileId, GraphConfig, MonikerMap, Result, load_config,
};

use crate::docset::Docset;
use crate::graph::{BuildContext, GraphProgress, TocGraph, TocGraphBuilder};
use crate::loader::{TocFileResult, TocLoader};
use crate::metadata::GlobalMetadata;
use crate::moniker::OrderedMonikers;
use crate::tokens::LocalizationTokens;

pub struct Session {
    root: PathBuf,
    config: AppConfig,
    docset: Arc<Docset>,
    monikers: Arc<OrderedMonikers>,
    metadata: Arc<GlobalMetadata>,
    tokens: Arc<LocalizationTokens>,
}

impl Session {
    /// Open the docset at `root` with its `docgraph.toml` (or defaults).
    pub fn open(root: &Path) -> Result<Self> {
        let config = load_config(root)?;
        Self::with_config(root, config)
    }

    #[instrument(skip_all, fields(root = %root.display()))]
    pub fn with_config(root: &Path, config: AppConfig) -> Result<Self> {
        PipelineRegistry::init();

        let docset = Docset::open(root, &config)?;
        let tokens = LocalizationTokens::from_config(root, &config.localization)?;
        info!(
            files = docset.len(),
            cultures = tokens.cultures().len(),
            "docset opened"
        );

        Ok(Self {
            root: root.to_path_buf(),
            monikers: Arc::new(OrderedMonikers::from_config(&config.monikers)),
            metadata: Arc::new(GlobalMetadata::from_config(&config)),
            tokens: Arc::new(tokens),
            docset: Arc::new(docset),
            config,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn docset(&self) -> &Docset {
        &self.docset
    }

    pub fn graph_config(&self) -> GraphConfig {
        GraphConfig::from(&self.config)
    }

    pub fn build_context(&self, config: GraphConfig) -> BuildContext {
        BuildContext {
            resolver: self.docset.clone(),
            monikers: self.monikers.clone(),
            metadata: self.metadata.clone(),
            config,
        }
    }

    pub fn moniker_map(&self) -> (MonikerMap, Vec<Diagnostic>) {
        self.docset.moniker_map(self.monikers.as_ref())
    }

    /// Load a single TOC, optionally annotating monikers.
    pub fn load_toc(&self, file: &FileId, with_monikers: bool) -> TocFileResult {
        let config = self.graph_config();
        let loader = TocLoader::new(
            self.docset.as_ref(),
            self.monikers.as_ref(),
            self.metadata.as_ref(),
            &config,
        );
        if !with_monikers {
            return loader.load(file);
        }

        let (map, errors) = self.moniker_map();
        let mut result = loader.with_moniker_map(&map).load(file);
        result.errors.extend(errors);
        result
    }

    /// Render one markdown file with a fresh context.
    pub fn render(&self, file: &FileId, kind: PipelineKind) -> Result<RenderOutput> {
        let path = self.docset.path_of(file);
        let content = std::fs::read_to_string(&path).map_err(|e| DocGraphError::io(&path, e))?;

        let mut ctx = RenderContext::new(self.docset.as_ref())
            .with_monikers(self.monikers.as_ref())
            .with_tokens(self.tokens.as_ref())
            .with_culture(self.config.build.culture.clone());
        render(&mut ctx, &content, kind, file)
    }
}

/// Result of a full docset build.
#[derive(Debug, Serialize)]
pub struct BuildReport {
    pub graph: TocGraph,
    pub tocs: Vec<TocFileResult>,
    /// Pages whose own `monikerRange` could not be evaluated.
    pub moniker_errors: Vec<Diagnostic>,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl BuildReport {
    pub fn error_count(&self) -> usize {
        self.diagnostics().filter(|d| d.is_error()).count()
    }

    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.moniker_errors
            .iter()
            .chain(self.tocs.iter().flat_map(|toc| toc.errors.iter()))
    }
}

/// Build the docset: graph pass, then the annotated final pass.
///
/// 1. Discover TOC files
/// 2. Build the reference graph
/// 3. Evaluate page monikers
/// 4. Load every TOC again with moniker annotation
#[instrument(skip_all, fields(root = %session.root().display(), concurrency = config.concurrency))]
pub async fn build_docset(
    session: &Session,
    config: GraphConfig,
    progress: &dyn GraphProgress,
) -> Result<BuildReport> {
    if config.concurrency == 0 {
        return Err(DocGraphError::config("concurrency must be at least 1"));
    }
    let start = Instant::now();

    let files = session.docset().toc_files();
    info!(tocs = files.len(), "starting build");

    let builder = TocGraphBuilder::new(session.build_context(config));
    let graph = builder.build(&files, progress).await;

    let (map, moniker_errors) = session.moniker_map();
    let tocs = builder
        .build_tocs(&files, Some(Arc::new(map)), progress)
        .await;

    let report = BuildReport {
        graph,
        tocs,
        moniker_errors,
        elapsed: start.elapsed(),
    };
    info!(
        tocs = report.tocs.len(),
        errors = report.error_count(),
        elapsed_ms = report.elapsed.as_millis() as u64,
        "build complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::SilentProgress;
    use docgraph_shared::codes;

    fn fixture_root() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures/docset")
    }

    fn session() -> Session {
        Session::open(&fixture_root()).expect("open fixture docset")
    }

    #[test]
    fn opens_fixture_with_its_config() {
        let session = session();
        assert_eq!(session.config().build.concurrency, 2);
        assert_eq!(session.graph_config().concurrency, 2);
        assert!(session.docset().contains(&FileId::new("guide/configure.md")));
    }

    #[test]
    fn root_toc_splices_guide() {
        let result = session().load_toc(&FileId::new("toc.md"), false);
        assert!(!result.has_errors(), "{:?}", result.errors);
        let titles: Vec<&str> = result.items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["Home", "Guide", "API"]);

        let guide = &result.items[1];
        assert_eq!(guide.href, None);
        let guide_titles: Vec<&str> = guide.children.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(guide_titles, vec!["Install", "Configure", "Client reference"]);
        assert_eq!(guide.children[0].href.as_deref(), Some("guide/install.html"));

        assert!(result.referenced_tocs.contains(&FileId::new("guide/toc.yml")));
        assert!(result.referenced_files.contains(&FileId::new("index.md")));
    }

    #[test]
    fn annotated_toc_carries_monikers() {
        let result = session().load_toc(&FileId::new("guide/toc.yml"), true);
        let configure = &result.items[1];
        assert_eq!(configure.monikers, vec!["widgets-2.0", "widgets-3.0"]);
        assert!(result.errors.iter().all(|d| d.code != codes::MONIKER_MISMATCH));
    }

    #[test]
    fn render_fixture_page() {
        let output = session()
            .render(&FileId::new("index.md"), PipelineKind::Document)
            .expect("render");
        assert_eq!(output.title.as_deref(), Some("Welcome to Widgets"));
        assert!(output.html.contains("href=\"guide/install.html\""));
    }

    #[test]
    fn render_missing_file_is_io_error() {
        let err = session()
            .render(&FileId::new("nope.md"), PipelineKind::Document)
            .unwrap_err();
        assert!(matches!(err, DocGraphError::Io { .. }));
    }

    #[tokio::test]
    async fn build_fixture_docset() {
        let session = session();
        let report = build_docset(&session, session.graph_config(), &SilentProgress)
            .await
            .expect("build");

        assert_eq!(report.graph.len(), 3);
        assert_eq!(report.tocs.len(), 3);
        assert_eq!(
            report.graph.tocs_referencing(&FileId::new("guide/toc.yml")),
            vec![&FileId::new("toc.md")]
        );
        assert_eq!(report.error_count(), 0);
    }

    #[tokio::test]
    async fn zero_concurrency_is_rejected() {
        let session = session();
        let config = GraphConfig {
            concurrency: 0,
            ..session.graph_config()
        };
        assert!(build_docset(&session, config, &SilentProgress).await.is_err());
    }
}
