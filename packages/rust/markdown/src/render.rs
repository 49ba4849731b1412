//! Markdown → HTML rendering through a named pipeline.
//!
//! Rendering happens in three passes:
//! 1. A line pass expands includes and moniker zones into placeholders.
//! 2. `pulldown-cmark` parses the result; link, image, and alert events are
//!    rewritten through the active [`RenderContext`].
//! 3. Placeholders in the generated HTML are swapped for their content.

use std::sync::LazyLock;

use pulldown_cmark::{
    BlockQuoteKind, CowStr, Event, HeadingLevel, LinkType, Parser, Tag, TagEnd, html,
};
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use tracing::{debug, instrument};
use url::Url;

use docgraph_shared::{Diagnostic, DocGraphError, FileId, Result, codes};

use crate::context::RenderContext;
use crate::front_matter;
use crate::pipeline::{Extensions, PipelineKind, pipeline};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Result of rendering one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderOutput {
    pub html: String,
    /// First H1 of the document (document pipeline only).
    pub title: Option<String>,
    /// Parsed front matter.
    pub metadata: Map<String, Value>,
    /// Diagnostics of the whole render, includes included. Always empty for a
    /// nested render; its diagnostics belong to the outermost one.
    pub diagnostics: Vec<Diagnostic>,
}

/// Whether `href` points at something inside the docset (not a URL, not a
/// bare fragment, not protocol-relative).
pub fn is_local_href(href: &str) -> bool {
    !href.is_empty()
        && !href.starts_with('#')
        && !href.starts_with("//")
        && Url::parse(href).is_err()
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Render `content` (the source of `file`) with the `kind` pipeline.
///
/// Called on an idle context this is a top-level render and the output
/// carries every diagnostic. Called while another render is active (an
/// include) it nests on the same stack.
#[instrument(skip_all, fields(file = %file, kind = %kind))]
pub fn render(
    ctx: &mut RenderContext<'_>,
    content: &str,
    kind: PipelineKind,
    file: &FileId,
) -> Result<RenderOutput> {
    // TOC files have their own grammar; see `parse_toc`.
    if kind == PipelineKind::Toc {
        return Err(DocGraphError::NotRenderable(kind.to_string()));
    }

    let mut scope = ctx.scope(kind, file);
    let mut output = render_active(&mut scope, content, kind)?;
    output.diagnostics = scope.finish()?;

    debug!(
        html_len = output.html.len(),
        diagnostics = output.diagnostics.len(),
        "render complete"
    );
    Ok(output)
}

fn render_active(
    ctx: &mut RenderContext<'_>,
    content: &str,
    kind: PipelineKind,
) -> Result<RenderOutput> {
    let pipeline = pipeline(kind);
    let ext = *pipeline.extensions();

    let (body, body_line, metadata) = if ext.front_matter {
        let split = front_matter::split(content);
        let metadata = match split.yaml.map(front_matter::parse) {
            Some(Ok(map)) => map,
            Some(Err(message)) => {
                ctx.report_at(
                    Diagnostic::warning(codes::INVALID_FRONT_MATTER, message),
                    Some(1),
                )?;
                Map::new()
            }
            None => Map::new(),
        };
        (split.body, split.body_line, metadata)
    } else {
        (content, 1, Map::new())
    };
    if let Some(culture) = metadata.get("culture").and_then(Value::as_str) {
        ctx.set_culture(culture)?;
    }

    let expanded = expand_lines(ctx, body, body_line, &ext)?;
    let lines = LineIndex::new(&expanded.text, body_line);

    let mut rewriter = Rewriter::new(kind, ext);
    for (event, range) in Parser::new_ext(&expanded.text, pipeline.options()).into_offset_iter() {
        rewriter.push(ctx, event, lines.line_of(range.start))?;
    }
    let (events, title) = rewriter.finish();

    let mut out = String::with_capacity(expanded.text.len() * 3 / 2);
    html::push_html(&mut out, events.into_iter());
    let mut html = expanded.splice_into(&out);
    if kind == PipelineKind::Inline {
        html.truncate(html.trim_end().len());
    }

    Ok(RenderOutput {
        html,
        title,
        metadata,
        diagnostics: Vec::new(),
    })
}

// ---------------------------------------------------------------------------
// Line pass: includes and moniker zones
// ---------------------------------------------------------------------------

/// Source text with block and inline substitutions replaced by placeholders.
/// Each source line maps to exactly one output line.
struct Expanded {
    text: String,
    splices: Vec<String>,
}

impl Expanded {
    fn placeholder(&mut self, html: String) -> String {
        let index = self.splices.len();
        self.splices.push(html);
        format!("<!--docgraph:splice:{index}-->")
    }

    fn push_line(&mut self, line: &str) {
        self.text.push_str(line);
        self.text.push('\n');
    }

    fn push_splice(&mut self, html: String) {
        let placeholder = self.placeholder(html);
        self.push_line(&placeholder);
    }

    fn splice_into(&self, html: &str) -> String {
        static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"<!--docgraph:splice:(\d+)-->").expect("valid regex")
        });

        PLACEHOLDER_RE
            .replace_all(html, |caps: &Captures| {
                caps[1]
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| self.splices.get(index))
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}

/// An open `::: moniker` zone.
struct Zone {
    line: usize,
    has_content: bool,
}

fn expand_lines(
    ctx: &mut RenderContext<'_>,
    body: &str,
    first_line: usize,
    ext: &Extensions,
) -> Result<Expanded> {
    static BLOCK_INCLUDE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^\s*\[!INCLUDE\s*\[[^\]]*\]\(([^)]+)\)\]\s*$").expect("valid regex")
    });
    static INLINE_INCLUDE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\[!INCLUDE\s*\[[^\]]*\]\(([^)]+)\)\]").expect("valid regex")
    });
    static ZONE_START_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"^\s*:::\s*moniker\s+range\s*=\s*"([^"]*)"\s*$"#).expect("valid regex")
    });
    static ZONE_END_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^\s*:::\s*moniker-end\s*$").expect("valid regex")
    });

    let mut out = Expanded {
        text: String::with_capacity(body.len()),
        splices: Vec::new(),
    };
    let mut fence: Option<(char, usize)> = None;
    let mut zones: Vec<Zone> = Vec::new();

    for (index, raw) in body.lines().enumerate() {
        let line_no = first_line + index;
        let line = raw.strip_suffix('\r').unwrap_or(raw);

        if ext.block_constructs {
            if let Some(open) = fence {
                if closes_fence(line, open) {
                    fence = None;
                }
                out.push_line(line);
                continue;
            }
            if let Some(open) = opens_fence(line) {
                fence = Some(open);
                out.push_line(line);
                continue;
            }
        }

        if ext.moniker_zones {
            if let Some(caps) = ZONE_START_RE.captures(line) {
                let html = open_zone(ctx, caps[1].trim(), line_no)?;
                for zone in &mut zones {
                    zone.has_content = true;
                }
                zones.push(Zone {
                    line: line_no,
                    has_content: false,
                });
                out.push_splice(html);
                continue;
            }
            if ZONE_END_RE.is_match(line) {
                match zones.pop() {
                    Some(zone) => {
                        if !zone.has_content {
                            ctx.report_at(
                                Diagnostic::warning(
                                    codes::EMPTY_MONIKER_ZONE,
                                    "moniker zone has no content",
                                ),
                                Some(zone.line),
                            )?;
                        }
                        out.push_splice("</div>".to_string());
                    }
                    None => {
                        ctx.report_at(
                            Diagnostic::warning(
                                codes::UNEXPECTED_MONIKER_ZONE_END,
                                "'::: moniker-end' without an open moniker zone",
                            ),
                            Some(line_no),
                        )?;
                        out.push_line("");
                    }
                }
                continue;
            }
            if !line.trim().is_empty() {
                for zone in &mut zones {
                    zone.has_content = true;
                }
            }
        }

        if ext.includes {
            if ext.block_constructs {
                if let Some(caps) = BLOCK_INCLUDE_RE.captures(line) {
                    let html = include(ctx, caps[1].trim(), PipelineKind::Plain, line_no)?;
                    out.push_splice(html);
                    continue;
                }
            }
            if INLINE_INCLUDE_RE.is_match(line) {
                let mut rewritten = String::with_capacity(line.len());
                let mut last = 0;
                for caps in INLINE_INCLUDE_RE.captures_iter(line) {
                    let Some(whole) = caps.get(0) else { continue };
                    rewritten.push_str(&line[last..whole.start()]);
                    let html = include(ctx, caps[1].trim(), PipelineKind::Inline, line_no)?;
                    rewritten.push_str(&out.placeholder(html));
                    last = whole.end();
                }
                rewritten.push_str(&line[last..]);
                out.push_line(&rewritten);
                continue;
            }
        }

        out.push_line(line);
    }

    for zone in zones.into_iter().rev() {
        ctx.report_at(
            Diagnostic::warning(
                codes::UNCLOSED_MONIKER_ZONE,
                "moniker zone is missing '::: moniker-end'",
            ),
            Some(zone.line),
        )?;
        out.push_splice("</div>".to_string());
    }

    Ok(out)
}

fn open_zone(ctx: &mut RenderContext<'_>, range: &str, line: usize) -> Result<String> {
    let monikers = ctx.resolve_moniker_range(range, Some(line))?;
    let mut html = format!(
        "<div data-moniker=\"{}\"",
        html_escape::encode_double_quoted_attribute(range)
    );
    if !monikers.is_empty() {
        html.push_str(&format!(
            " data-monikers=\"{}\"",
            html_escape::encode_double_quoted_attribute(&monikers.join(" "))
        ));
    }
    html.push('>');
    Ok(html)
}

/// Render an included file in place. Failures splice in nothing.
fn include(
    ctx: &mut RenderContext<'_>,
    path: &str,
    kind: PipelineKind,
    line: usize,
) -> Result<String> {
    let Some(resolved) = ctx.resolve_content(path, Some(line))? else {
        return Ok(String::new());
    };
    if ctx.is_rendering(&resolved.file) {
        ctx.report_at(
            Diagnostic::error(
                codes::CIRCULAR_REFERENCE,
                format!("include of '{}' is circular", resolved.file),
            ),
            Some(line),
        )?;
        return Ok(String::new());
    }
    let output = render(ctx, &resolved.content, kind, &resolved.file)?;
    Ok(output.html)
}

fn opens_fence(line: &str) -> Option<(char, usize)> {
    let rest = line.trim_start_matches(' ');
    if line.len() - rest.len() > 3 {
        return None;
    }
    let marker = rest.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let run = rest.chars().take_while(|c| *c == marker).count();
    (run >= 3).then_some((marker, run))
}

fn closes_fence(line: &str, (marker, len): (char, usize)) -> bool {
    match opens_fence(line) {
        Some((found, run)) => {
            found == marker && run >= len && line.trim().chars().all(|c| c == marker)
        }
        None => false,
    }
}

// ---------------------------------------------------------------------------
// Event pass
// ---------------------------------------------------------------------------

/// Maps byte offsets of the expanded text back to 1-based source lines.
struct LineIndex {
    starts: Vec<usize>,
    first_line: usize,
}

impl LineIndex {
    fn new(text: &str, first_line: usize) -> Self {
        let starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(at, _)| at + 1))
            .collect();
        Self { starts, first_line }
    }

    fn line_of(&self, offset: usize) -> usize {
        self.first_line + self.starts.partition_point(|&start| start <= offset) - 1
    }
}

/// A link whose text may be replaced once its end is seen.
struct PendingLink<'a> {
    start: Event<'a>,
    display: Option<String>,
    autolink: bool,
    inner: Vec<Event<'a>>,
}

struct Rewriter<'a> {
    kind: PipelineKind,
    ext: Extensions,
    events: Vec<Event<'a>>,
    link: Option<PendingLink<'a>>,
    /// One entry per open blockquote: whether it renders as an alert.
    quotes: Vec<bool>,
    title: Option<String>,
    heading: Option<String>,
}

impl<'a> Rewriter<'a> {
    fn new(kind: PipelineKind, ext: Extensions) -> Self {
        Self {
            kind,
            ext,
            events: Vec::new(),
            link: None,
            quotes: Vec::new(),
            title: None,
            heading: None,
        }
    }

    fn push(&mut self, ctx: &mut RenderContext<'_>, event: Event<'a>, line: usize) -> Result<()> {
        match event {
            Event::Start(Tag::Link {
                link_type,
                dest_url,
                title,
                id,
            }) => {
                let autolink = matches!(link_type, LinkType::Autolink);
                let (dest_url, display) = self.rewrite_dest(ctx, dest_url, line, true)?;
                let start = Event::Start(Tag::Link {
                    link_type,
                    dest_url,
                    title,
                    id,
                });
                self.link = Some(PendingLink {
                    start,
                    display,
                    autolink,
                    inner: Vec::new(),
                });
            }
            Event::End(TagEnd::Link) => {
                if let Some(link) = self.link.take() {
                    self.emit(link.start);
                    let has_text = link.inner.iter().any(
                        |e| matches!(e, Event::Text(t) | Event::Code(t) if !t.trim().is_empty()),
                    );
                    match link.display {
                        Some(display) if link.autolink || !has_text => {
                            self.emit(Event::Text(display.into()));
                        }
                        _ => {
                            for inner in link.inner {
                                self.emit(inner);
                            }
                        }
                    }
                }
                self.emit(Event::End(TagEnd::Link));
            }
            Event::Start(Tag::Image {
                link_type,
                dest_url,
                title,
                id,
            }) => {
                let (dest_url, _) = self.rewrite_dest(ctx, dest_url, line, false)?;
                self.route(Event::Start(Tag::Image {
                    link_type,
                    dest_url,
                    title,
                    id,
                }));
            }
            Event::Start(Tag::BlockQuote(Some(kind))) if self.ext.alerts => {
                let label = alert_label(kind);
                let heading = ctx
                    .localized_token(label)
                    .unwrap_or_else(|| default_alert_title(kind).to_string());
                self.quotes.push(true);
                self.route(Event::Html(
                    format!(
                        "<div class=\"alert alert-{label}\">\n<h5>{}</h5>\n",
                        html_escape::encode_text(&heading)
                    )
                    .into(),
                ));
            }
            Event::Start(Tag::BlockQuote(kind)) => {
                self.quotes.push(false);
                self.route(Event::Start(Tag::BlockQuote(kind)));
            }
            Event::End(end @ TagEnd::BlockQuote { .. }) => {
                if self.quotes.pop() == Some(true) {
                    self.route(Event::Html("</div>\n".into()));
                } else {
                    self.route(Event::End(end));
                }
            }
            Event::Start(Tag::Paragraph) | Event::End(TagEnd::Paragraph)
                if self.kind == PipelineKind::Inline => {}
            other => self.route(other),
        }
        Ok(())
    }

    /// Rewrite a link or image destination. Returns the new destination and,
    /// for resolved xrefs, the display text.
    fn rewrite_dest(
        &self,
        ctx: &mut RenderContext<'_>,
        dest: CowStr<'a>,
        line: usize,
        allow_xref: bool,
    ) -> Result<(CowStr<'a>, Option<String>)> {
        if self.ext.xrefs && allow_xref {
            if let Some(uid) = dest.strip_prefix("xref:").map(str::to_string) {
                return Ok(match ctx.resolve_xref(&uid, Some(line))? {
                    Some(xref) => (xref.href.into(), Some(xref.display)),
                    None => (dest, None),
                });
            }
        }
        if self.ext.link_resolution && is_local_href(&dest) {
            if let Some(link) = ctx.resolve_link(&dest, Some(line))? {
                return Ok((link.href.into(), None));
            }
        }
        Ok((dest, None))
    }

    fn route(&mut self, event: Event<'a>) {
        match &mut self.link {
            Some(link) => link.inner.push(event),
            None => self.emit(event),
        }
    }

    fn emit(&mut self, event: Event<'a>) {
        if self.ext.title && self.title.is_none() {
            match &event {
                Event::Start(Tag::Heading {
                    level: HeadingLevel::H1,
                    ..
                }) => self.heading = Some(String::new()),
                Event::Text(text) | Event::Code(text) => {
                    if let Some(heading) = &mut self.heading {
                        heading.push_str(text);
                    }
                }
                Event::End(TagEnd::Heading(HeadingLevel::H1)) => {
                    if let Some(heading) = self.heading.take() {
                        let heading = heading.trim();
                        if !heading.is_empty() {
                            self.title = Some(heading.to_string());
                        }
                    }
                }
                _ => {}
            }
        }
        self.events.push(event);
    }

    fn finish(mut self) -> (Vec<Event<'a>>, Option<String>) {
        // An unterminated link cannot come out of the parser, but flush it
        // rather than lose its text.
        if let Some(link) = self.link.take() {
            self.emit(link.start);
            for inner in link.inner {
                self.emit(inner);
            }
        }
        (self.events, self.title)
    }
}

fn alert_label(kind: BlockQuoteKind) -> &'static str {
    match kind {
        BlockQuoteKind::Note => "note",
        BlockQuoteKind::Tip => "tip",
        BlockQuoteKind::Important => "important",
        BlockQuoteKind::Warning => "warning",
        BlockQuoteKind::Caution => "caution",
    }
}

fn default_alert_title(kind: BlockQuoteKind) -> &'static str {
    match kind {
        BlockQuoteKind::Note => "Note",
        BlockQuoteKind::Tip => "Tip",
        BlockQuoteKind::Important => "Important",
        BlockQuoteKind::Warning => "Warning",
        BlockQuoteKind::Caution => "Caution",
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use super::*;
    use docgraph_shared::{
        ContentResolver, DependencyKind, MemoryResolver, ResolvedContent, ResolvedLink,
        ResolvedXref, TokenStore,
    };

    fn render_file(resolver: &MemoryResolver, path: &str) -> RenderOutput {
        let file = FileId::new(path);
        let content = resolver.read_file(&file).expect("fixture file");
        let mut ctx = RenderContext::new(resolver);
        render(&mut ctx, &content, PipelineKind::Document, &file).expect("render")
    }

    /// Panics when asked to include `boom.md`.
    struct ExplodingResolver(MemoryResolver);

    impl ContentResolver for ExplodingResolver {
        fn read_file(&self, file: &FileId) -> std::result::Result<String, Diagnostic> {
            self.0.read_file(file)
        }

        fn resolve_content(
            &self,
            path: &str,
            relative_to: &FileId,
            kind: DependencyKind,
        ) -> std::result::Result<ResolvedContent, Diagnostic> {
            if path == "boom.md" {
                panic!("resolver exploded");
            }
            self.0.resolve_content(path, relative_to, kind)
        }

        fn resolve_link(
            &self,
            path: &str,
            relative_to: &FileId,
            display_relative_to: &FileId,
        ) -> std::result::Result<ResolvedLink, Diagnostic> {
            self.0.resolve_link(path, relative_to, display_relative_to)
        }

        fn resolve_xref(
            &self,
            uid: &str,
            current: &FileId,
            root: &FileId,
        ) -> std::result::Result<ResolvedXref, Diagnostic> {
            self.0.resolve_xref(uid, current, root)
        }
    }

    struct FrenchTokens;

    impl TokenStore for FrenchTokens {
        fn lookup(&self, culture: &str, key: &str) -> Option<String> {
            (culture == "fr-fr" && key == "note").then(|| "Remarque".to_string())
        }
    }

    #[test]
    fn document_title_and_front_matter() {
        let resolver = MemoryResolver::new()
            .with_file("index.md", "---\ntitle: Welcome\nuid: home\n---\n# Getting *started*\n\nBody.\n");
        let output = render_file(&resolver, "index.md");
        assert_eq!(output.title.as_deref(), Some("Getting started"));
        assert_eq!(output.metadata["uid"], "home");
        assert!(output.html.contains("<h1>Getting <em>started</em></h1>"));
        assert!(!output.html.contains("uid: home"));
        assert!(output.diagnostics.is_empty());
    }

    #[test]
    fn invalid_front_matter_is_a_warning() {
        let resolver = MemoryResolver::new().with_file("a.md", "---\n- x\n---\nText\n");
        let output = render_file(&resolver, "a.md");
        assert_eq!(output.diagnostics.len(), 1);
        assert_eq!(output.diagnostics[0].code, codes::INVALID_FRONT_MATTER);
        assert!(output.html.contains("<p>Text</p>"));
    }

    #[test]
    fn toc_pipeline_is_not_a_document_renderer() {
        let resolver = MemoryResolver::new();
        let mut ctx = RenderContext::new(&resolver);
        let err = render(
            &mut ctx,
            "# A\n####### Deep\n",
            PipelineKind::Toc,
            &FileId::new("toc.md"),
        )
        .unwrap_err();
        assert!(matches!(err, DocGraphError::NotRenderable(ref kind) if kind == "toc"));
        assert!(!ctx.is_active());
    }

    #[test]
    fn block_include_diagnostics_roll_up_with_their_own_location() {
        let resolver = MemoryResolver::new()
            .with_file("index.md", "# Home\n\n[!INCLUDE [snippet](includes/snippet.md)]\n")
            .with_file("includes/snippet.md", "Snippet with [a broken link](missing.md).\n");
        let output = render_file(&resolver, "index.md");
        assert!(output.html.contains("<p>Snippet with <a href=\"missing.md\">a broken link</a>.</p>"));
        assert!(!output.html.contains("docgraph:splice"));
        assert_eq!(output.diagnostics.len(), 1);
        let diagnostic = &output.diagnostics[0];
        assert_eq!(diagnostic.code, codes::FILE_NOT_FOUND);
        assert_eq!(diagnostic.file, Some(FileId::new("includes/snippet.md")));
        assert_eq!(diagnostic.range.map(|r| r.line), Some(1));
    }

    #[test]
    fn included_links_are_displayed_from_the_including_page() {
        let resolver = MemoryResolver::new()
            .with_file("index.md", "[!INCLUDE [x](guide/snippet.md)]\n")
            .with_file("guide/snippet.md", "[Install](install.md)\n")
            .with_file("guide/install.md", "# Install\n");
        let output = render_file(&resolver, "index.md");
        assert!(output.html.contains("href=\"guide/install.html\""));
        assert!(output.diagnostics.is_empty());
    }

    #[test]
    fn circular_include_is_an_error_with_empty_splice() {
        let resolver = MemoryResolver::new()
            .with_file("a.md", "A start\n\n[!INCLUDE [b](b.md)]\n")
            .with_file("b.md", "B start\n\n[!INCLUDE [a](a.md)]\n");
        let output = render_file(&resolver, "a.md");
        assert!(output.html.contains("<p>A start</p>"));
        assert!(output.html.contains("<p>B start</p>"));
        assert_eq!(output.html.matches("A start").count(), 1);
        assert_eq!(output.diagnostics.len(), 1);
        assert_eq!(output.diagnostics[0].code, codes::CIRCULAR_REFERENCE);
        assert!(output.diagnostics[0].is_error());
        assert_eq!(output.diagnostics[0].file, Some(FileId::new("b.md")));
    }

    #[test]
    fn missing_include_is_an_error() {
        let resolver = MemoryResolver::new().with_file("a.md", "Before\n\n[!INCLUDE [x](gone.md)]\n\nAfter\n");
        let output = render_file(&resolver, "a.md");
        assert!(output.html.contains("<p>Before</p>"));
        assert!(output.html.contains("<p>After</p>"));
        assert_eq!(output.diagnostics.len(), 1);
        assert!(output.diagnostics[0].is_error());
        assert_eq!(output.diagnostics[0].range.map(|r| r.line), Some(3));
    }

    #[test]
    fn inline_include_is_not_wrapped_in_a_paragraph() {
        let resolver = MemoryResolver::new()
            .with_file("a.md", "Version [!INCLUDE [v](version.md)] is out.\n")
            .with_file("version.md", "**2.0**\n");
        let output = render_file(&resolver, "a.md");
        assert!(output.html.contains("<p>Version <strong>2.0</strong> is out.</p>"));
    }

    #[test]
    fn relative_links_are_rewritten_and_failures_keep_their_href() {
        let resolver = MemoryResolver::new()
            .with_file(
                "guide/index.md",
                "# Guide\n\n[Linux](install.md#linux) and [gone](gone.md) and [web](https://example.com)\n",
            )
            .with_file("guide/install.md", "# Install\n");
        let output = render_file(&resolver, "guide/index.md");
        assert!(output.html.contains("href=\"install.html#linux\""));
        assert!(output.html.contains("href=\"gone.md\""));
        assert!(output.html.contains("href=\"https://example.com\""));
        assert_eq!(output.diagnostics.len(), 1);
        assert_eq!(output.diagnostics[0].range.map(|r| r.line), Some(3));
    }

    #[test]
    fn xrefs_take_their_display_text() {
        let resolver = MemoryResolver::new()
            .with_file("index.md", "See <xref:guide.install>, [setup](xref:guide.install) and [x](xref:nope).\n")
            .with_file("guide/install.md", "# Install\n")
            .with_xref("guide.install", "guide/install.md", "Installing");
        let output = render_file(&resolver, "index.md");
        assert!(output.html.contains("<a href=\"guide/install.html\">Installing</a>"));
        assert!(output.html.contains("<a href=\"guide/install.html\">setup</a>"));
        assert!(output.html.contains("href=\"xref:nope\""));
        assert_eq!(output.diagnostics.len(), 1);
        assert_eq!(output.diagnostics[0].code, codes::XREF_NOT_FOUND);
    }

    #[test]
    fn moniker_zones_wrap_their_content() {
        let resolver = MemoryResolver::new().with_file(
            "a.md",
            "::: moniker range=\"v2\"\nVersioned text\n::: moniker-end\n",
        );
        let output = render_file(&resolver, "a.md");
        assert!(output.html.contains("<div data-moniker=\"v2\">\n<p>Versioned text</p>\n</div>"));
        assert!(output.diagnostics.is_empty());
    }

    #[test]
    fn moniker_zone_mistakes_are_warnings() {
        let resolver = MemoryResolver::new().with_file(
            "a.md",
            "::: moniker-end\n::: moniker range=\"v1\"\n::: moniker-end\n::: moniker range=\"v2\"\nOpen\n",
        );
        let output = render_file(&resolver, "a.md");
        let found: Vec<(&str, Option<usize>)> = output
            .diagnostics
            .iter()
            .map(|d| (d.code.as_str(), d.range.map(|r| r.line)))
            .collect();
        assert_eq!(
            found,
            vec![
                (codes::UNEXPECTED_MONIKER_ZONE_END, Some(1)),
                (codes::EMPTY_MONIKER_ZONE, Some(2)),
                (codes::UNCLOSED_MONIKER_ZONE, Some(4)),
            ]
        );
        assert!(output.html.trim_end().ends_with("</div>"));
    }

    #[test]
    fn fenced_code_is_left_alone() {
        let resolver = MemoryResolver::new()
            .with_file("a.md", "```md\n[!INCLUDE [x](gone.md)]\n::: moniker-end\n```\n");
        let output = render_file(&resolver, "a.md");
        assert!(output.html.contains("[!INCLUDE [x](gone.md)]"));
        assert!(output.diagnostics.is_empty());
    }

    #[test]
    fn alerts_use_localized_titles() {
        let resolver = MemoryResolver::new();
        let tokens = FrenchTokens;
        let mut ctx = RenderContext::new(&resolver)
            .with_tokens(&tokens)
            .with_culture("fr-fr");
        let output = render(
            &mut ctx,
            "> [!NOTE]\n> Be careful.\n\n> [!TIP]\n> Try this.\n",
            PipelineKind::Document,
            &FileId::new("a.md"),
        )
        .expect("render");
        assert!(output.html.contains("<div class=\"alert alert-note\">\n<h5>Remarque</h5>"));
        assert!(output.html.contains("<h5>Tip</h5>"));
        assert!(output.html.contains("Be careful."));
        assert!(!output.html.contains("<blockquote>"));
    }

    #[test]
    fn front_matter_culture_applies_to_that_file_only() {
        let resolver = MemoryResolver::new()
            .with_file("index.md", "> [!NOTE]\n> Outer.\n\n[!INCLUDE [fr](fr.md)]\n\n> [!NOTE]\n> Again.\n")
            .with_file("fr.md", "---\nculture: fr-fr\n---\n> [!NOTE]\n> Inner.\n");
        let tokens = FrenchTokens;
        let file = FileId::new("index.md");
        let content = resolver.read_file(&file).expect("fixture file");
        let mut ctx = RenderContext::new(&resolver).with_tokens(&tokens);
        let output = render(&mut ctx, &content, PipelineKind::Document, &file).expect("render");

        assert_eq!(output.html.matches("<h5>Remarque</h5>").count(), 1);
        assert_eq!(output.html.matches("<h5>Note</h5>").count(), 2);
        assert_eq!(ctx.culture(), "en-us");
    }

    #[test]
    fn inline_pipeline_output_is_unwrapped() {
        let resolver = MemoryResolver::new();
        let mut ctx = RenderContext::new(&resolver);
        let output = render(&mut ctx, "Hello *world*\n", PipelineKind::Inline, &FileId::new("a.md"))
            .expect("render");
        assert_eq!(output.html, "Hello <em>world</em>");
        assert_eq!(output.title, None);
    }

    #[test]
    fn panic_in_nested_include_leaves_the_stack_empty() {
        let resolver = ExplodingResolver(
            MemoryResolver::new()
                .with_file("index.md", "[!INCLUDE [a](a.md)]\n")
                .with_file("a.md", "[!INCLUDE [boom](boom.md)]\n"),
        );
        let mut ctx = RenderContext::new(&resolver);
        let result = catch_unwind(AssertUnwindSafe(|| {
            render(
                &mut ctx,
                "[!INCLUDE [a](a.md)]\n",
                PipelineKind::Document,
                &FileId::new("index.md"),
            )
        }));
        assert!(result.is_err());
        assert_eq!(ctx.depth(), 0);

        let output = render(&mut ctx, "# Again\n", PipelineKind::Document, &FileId::new("index.md"))
            .expect("context is reusable");
        assert_eq!(output.title.as_deref(), Some("Again"));
        assert!(output.diagnostics.is_empty());
    }

    #[test]
    fn local_hrefs() {
        assert!(is_local_href("guide/install.md"));
        assert!(is_local_href("../a.md#x"));
        assert!(!is_local_href("#top"));
        assert!(!is_local_href("https://example.com"));
        assert!(!is_local_href("mailto:docs@example.com"));
        assert!(!is_local_href("//cdn.example.com/x.js"));
        assert!(!is_local_href(""));
    }
}
