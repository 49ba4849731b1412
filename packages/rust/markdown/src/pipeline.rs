//! Named markdown parsing configurations.
//!
//! The four pipelines are built together, once per process, the first time
//! [`PipelineRegistry::init`] (or any accessor) runs. After that the registry
//! is immutable and shared freely across threads.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use pulldown_cmark::Options;
use tracing::debug;

use docgraph_shared::DocGraphError;

static REGISTRY: OnceLock<PipelineRegistry> = OnceLock::new();

/// Which parsing configuration to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineKind {
    /// Full document: every extension plus title extraction.
    Document,
    /// Full document grammar without title extraction (block includes).
    Plain,
    /// Inline constructs only (inline includes, link text).
    Inline,
    /// Restricted grammar for TOC files.
    Toc,
}

impl PipelineKind {
    pub const ALL: [PipelineKind; 4] = [Self::Document, Self::Plain, Self::Inline, Self::Toc];

    pub fn name(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Plain => "plain",
            Self::Inline => "inline",
            Self::Toc => "toc",
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Document => 0,
            Self::Plain => 1,
            Self::Inline => 2,
            Self::Toc => 3,
        }
    }
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PipelineKind {
    type Err = DocGraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| DocGraphError::parse(format!("unknown pipeline kind '{s}'")))
    }
}

/// Grammar extensions layered on top of CommonMark.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Extensions {
    /// Leading `---` YAML block.
    pub front_matter: bool,
    /// Block-level constructs (block includes, alerts, fenced code awareness).
    pub block_constructs: bool,
    /// `[!INCLUDE [title](path)]`.
    pub includes: bool,
    /// First H1 becomes the document title.
    pub title: bool,
    /// Relative link and image hrefs go through the resolver.
    pub link_resolution: bool,
    /// `<xref:uid>` and `[text](xref:uid)`.
    pub xrefs: bool,
    /// `::: moniker range="..."` zones.
    pub moniker_zones: bool,
    /// GFM alerts (`> [!NOTE]`) with localized titles.
    pub alerts: bool,
    /// Any run of `#` opens a heading, with no depth cap.
    pub unbounded_headings: bool,
}

/// An immutable parse configuration.
#[derive(Debug)]
pub struct Pipeline {
    kind: PipelineKind,
    options: Options,
    extensions: Extensions,
}

impl Pipeline {
    pub fn kind(&self) -> PipelineKind {
        self.kind
    }

    /// `pulldown-cmark` options for this pipeline.
    pub fn options(&self) -> Options {
        self.options
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }
}

/// The process-wide set of pipelines.
#[derive(Debug)]
pub struct PipelineRegistry {
    pipelines: [Pipeline; 4],
}

impl PipelineRegistry {
    /// Build the registry if needed and return it.
    ///
    /// Concurrent callers block on a single initialisation.
    pub fn init() -> &'static PipelineRegistry {
        REGISTRY.get_or_init(|| {
            debug!("building markdown pipelines");
            Self::build()
        })
    }

    /// The process-wide registry.
    pub fn global() -> &'static PipelineRegistry {
        Self::init()
    }

    pub fn get(&self, kind: PipelineKind) -> &Pipeline {
        &self.pipelines[kind.index()]
    }

    fn build() -> Self {
        let block = Options::ENABLE_TABLES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS
            | Options::ENABLE_FOOTNOTES
            | Options::ENABLE_HEADING_ATTRIBUTES
            | Options::ENABLE_GFM;

        let document = Extensions {
            front_matter: true,
            block_constructs: true,
            includes: true,
            title: true,
            link_resolution: true,
            xrefs: true,
            moniker_zones: true,
            alerts: true,
            unbounded_headings: false,
        };

        Self {
            pipelines: [
                Pipeline {
                    kind: PipelineKind::Document,
                    options: block,
                    extensions: document,
                },
                Pipeline {
                    kind: PipelineKind::Plain,
                    options: block,
                    extensions: Extensions {
                        title: false,
                        ..document
                    },
                },
                Pipeline {
                    kind: PipelineKind::Inline,
                    options: Options::ENABLE_STRIKETHROUGH,
                    extensions: Extensions {
                        front_matter: false,
                        block_constructs: false,
                        title: false,
                        moniker_zones: false,
                        alerts: false,
                        ..document
                    },
                },
                Pipeline {
                    kind: PipelineKind::Toc,
                    options: Options::empty(),
                    extensions: Extensions {
                        front_matter: true,
                        xrefs: true,
                        unbounded_headings: true,
                        ..Extensions::default()
                    },
                },
            ],
        }
    }
}

/// Shorthand for `PipelineRegistry::global().get(kind)`.
pub fn pipeline(kind: PipelineKind) -> &'static Pipeline {
    PipelineRegistry::global().get(kind)
}
