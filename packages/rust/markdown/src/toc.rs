//! Markdown TOC outlines.
//!
//! A TOC file is a list of headings, each optionally a link. Heading depth is
//! unbounded (`####### Deep` is a level-7 heading). Blank lines, thematic
//! breaks and raw HTML are ignored; any other text is reported and skipped.

use std::sync::LazyLock;

use pulldown_cmark::{Event, LinkType, Options, Parser, Tag, TagEnd};
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use docgraph_shared::{Diagnostic, TocItem, codes};

use crate::front_matter;
use crate::pipeline::{Extensions, PipelineKind, pipeline};

/// Deepest ATX heading CommonMark recognises.
const MAX_ATX_LEVEL: usize = 6;

/// A parsed TOC file before any resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TocOutline {
    pub items: Vec<TocItem>,
    /// Front matter of the TOC file.
    pub metadata: Map<String, Value>,
    /// Parse problems, with line numbers but no file.
    pub diagnostics: Vec<Diagnostic>,
}

/// Parse a markdown TOC with the TOC pipeline.
#[instrument(skip_all, fields(len = content.len()))]
pub fn parse_toc(content: &str) -> TocOutline {
    let toc = pipeline(PipelineKind::Toc);
    parse_outline(content, toc.options(), toc.extensions())
}

fn parse_outline(content: &str, options: Options, ext: &Extensions) -> TocOutline {
    static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^ {0,3}(#+)(?:[ \t]+(.*?))?[ \t]*$").expect("valid regex")
    });
    static CLOSING_HASHES_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?:^|[ \t]+)#+$").expect("valid regex"));
    static BREAK_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^ {0,3}(?:(?:-[ \t]*){3,}|(?:\*[ \t]*){3,}|(?:_[ \t]*){3,})$")
            .expect("valid regex")
    });

    let mut outline = TocOutline::default();
    let split = if ext.front_matter {
        front_matter::split(content)
    } else {
        front_matter::FrontMatter {
            yaml: None,
            body: content,
            body_line: 1,
        }
    };
    if let Some(yaml) = split.yaml {
        match front_matter::parse(yaml) {
            Ok(map) => outline.metadata = map,
            Err(message) => outline.diagnostics.push(
                Diagnostic::warning(codes::INVALID_FRONT_MATTER, message).with_line(1),
            ),
        }
    }

    let mut flat: Vec<(usize, TocItem)> = Vec::new();
    let mut in_comment = false;

    for (index, raw) in split.body.lines().enumerate() {
        let line_no = split.body_line + index;
        let line = raw.trim_end_matches('\r');

        if in_comment {
            in_comment = !line.contains("-->");
            continue;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() || BREAK_RE.is_match(line) {
            continue;
        }
        if trimmed.starts_with('<') {
            in_comment = trimmed.starts_with("<!--") && !trimmed.contains("-->");
            continue;
        }

        let heading = HEADING_RE
            .captures(line)
            .filter(|caps| ext.unbounded_headings || caps[1].len() <= MAX_ATX_LEVEL);
        match heading {
            Some(caps) => {
                let level = caps[1].len();
                let text = caps.get(2).map_or("", |m| m.as_str());
                let text = CLOSING_HASHES_RE.replace(text, "");
                let mut item = heading_item(&text, options, ext);
                item.line = Some(line_no);
                flat.push((level, item));
            }
            None => outline.diagnostics.push(
                Diagnostic::warning(
                    codes::INVALID_TOC,
                    format!("unexpected content in TOC: '{trimmed}'"),
                )
                .with_line(line_no),
            ),
        }
    }

    debug!(headings = flat.len(), "parsed toc outline");
    outline.items = build_hierarchy(flat);
    outline
}

/// Title and href of one heading's inline content.
fn heading_item(text: &str, options: Options, ext: &Extensions) -> TocItem {
    let mut title = String::new();
    let mut href: Option<String> = None;
    let mut in_autolink = false;

    for event in Parser::new_ext(text, options) {
        match event {
            Event::Start(Tag::Link {
                link_type,
                dest_url,
                ..
            }) if href.is_none() && (ext.xrefs || !dest_url.starts_with("xref:")) => {
                href = Some(dest_url.to_string());
                in_autolink = matches!(link_type, LinkType::Autolink);
            }
            Event::End(TagEnd::Link) => in_autolink = false,
            Event::Text(t) | Event::Code(t) if !in_autolink => title.push_str(&t),
            Event::SoftBreak | Event::HardBreak => title.push(' '),
            _ => {}
        }
    }

    TocItem {
        title: title.trim().to_string(),
        href,
        ..TocItem::default()
    }
}

/// Nest a flat `(level, item)` list: each item becomes a child of the nearest
/// preceding item with a strictly lower level, or a root if there is none.
pub fn build_hierarchy(flat: Vec<(usize, TocItem)>) -> Vec<TocItem> {
    fn attach(stack: &mut [(usize, TocItem)], roots: &mut Vec<TocItem>, item: TocItem) {
        match stack.last_mut() {
            Some((_, parent)) => parent.children.push(item),
            None => roots.push(item),
        }
    }

    let mut roots = Vec::new();
    let mut stack: Vec<(usize, TocItem)> = Vec::new();

    for (level, item) in flat {
        while stack.last().is_some_and(|(top, _)| *top >= level) {
            if let Some((_, done)) = stack.pop() {
                attach(&mut stack, &mut roots, done);
            }
        }
        stack.push((level, item));
    }
    while let Some((_, done)) = stack.pop() {
        attach(&mut stack, &mut roots, done);
    }
    roots
}
