//! Markdown pipelines, render context, and TOC outline parsing.
//!
//! Rendering is driven by an explicit [`RenderContext`] owned by the caller.
//! Includes render recursively on the same context, so a file's diagnostics
//! and those of everything it pulls in come back from one [`render`] call.

pub mod context;
pub mod front_matter;
pub mod pipeline;
pub mod render;
pub mod toc;

pub use context::{RenderContext, RenderHandle, RenderJob, RenderScope};
pub use front_matter::FrontMatter;
pub use pipeline::{Extensions, Pipeline, PipelineKind, PipelineRegistry, pipeline};
pub use render::{RenderOutput, is_local_href, render};
pub use toc::{TocOutline, build_hierarchy, parse_toc};
