//! Shared types, diagnostics, capability traits, and configuration for docgraph.
//!
//! This crate is the foundation depended on by all other docgraph crates.
//! It provides:
//! - [`DocGraphError`]: the unified operational error type
//! - [`Diagnostic`]: collected warnings/errors about content
//! - Domain types ([`FileId`], [`TocItem`], [`TocMetadata`], [`MonikerMap`])
//! - Capability traits ([`ContentResolver`], [`MonikerProvider`], [`MetadataProvider`], [`TokenStore`])
//! - Configuration ([`AppConfig`], [`GraphConfig`], config loading)
//! - [`MemoryResolver`]: an in-memory docset

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod memory;
pub mod resolve;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BuildConfig, CONFIG_FILE_NAME, GraphConfig, LocalizationConfig, MonikerConfig,
    config_file_path, init_config, load_config, load_config_from,
};
pub use diagnostics::{Diagnostic, Severity, SourceRange, codes};
pub use error::{DocGraphError, Result};
pub use memory::MemoryResolver;
pub use resolve::{
    ContentResolver, DependencyKind, MetadataProvider, MonikerProvider, ResolvedContent,
    ResolvedLink, ResolvedXref, TokenStore,
};
pub use types::{FileId, MonikerMap, TocItem, TocMetadata, split_link};
