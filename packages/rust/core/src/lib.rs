//! TOC loading and graph construction for docgraph.
//!
//! [`TocLoader`] turns one TOC file into resolved items; [`TocGraphBuilder`]
//! runs it across a docset on a bounded worker pool. The remaining modules are
//! the on-disk collaborators the CLI wires in through [`Session`].

pub mod docset;
pub mod graph;
pub mod loader;
pub mod metadata;
pub mod moniker;
pub mod session;
pub mod tokens;
pub mod yaml_toc;

pub use docset::{Docset, PageInfo};
pub use graph::{
    BuildContext, GraphProgress, SilentProgress, TocGraph, TocGraphBuilder, TocGraphEntry,
};
pub use loader::{TocFileResult, TocLoader};
pub use metadata::GlobalMetadata;
pub use moniker::OrderedMonikers;
pub use session::{BuildReport, Session, build_docset};
pub use tokens::LocalizationTokens;
pub use yaml_toc::parse_yaml_toc;
