//! Markdown to page rendering.
//!
//! Converts markdown text to HTML using comrak with GFM extensions. Each
//! top-level block is rendered on its own so it can carry the markup the page
//! behaviors bind to: heading ids for the TOC, `reveal`/`stagger` classes for
//! scroll reveal, and copy buttons on fenced code. Block metadata (kind,
//! plain text, links) is kept alongside for the simulator.

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::Path;

use comrak::{
    format_html,
    nodes::{AstNode, NodeValue},
    parse_document, Arena, Options,
};

use crate::config::SiteConfig;
use crate::web_assets;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A heading extracted from the document for TOC construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingEntry {
    /// Heading level (1–6).
    pub level: u8,
    /// Plain-text content of the heading.
    pub text: String,
    /// URL-safe anchor ID, deduplicated within the document.
    ///
    /// The first occurrence of a heading slug is bare (e.g. `my-heading`);
    /// subsequent occurrences receive a numeric suffix (`my-heading-1`, `my-heading-2`).
    /// Ids already taken by another heading or a code block are skipped.
    pub anchor_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRef {
    pub url: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    /// Index into [`RenderedPage::headings`].
    Heading(usize),
    Code { anchor_id: String },
    List { items: Vec<String> },
    Paragraph,
    Table,
    Quote,
    Rule,
    Other,
}

/// One top-level block of the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub kind: BlockKind,
    /// Plain text (code blocks keep their literal source).
    pub text: String,
    pub links: Vec<LinkRef>,
    /// Rendered fragment, already carrying the page-behavior markup.
    pub html: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedPage {
    pub headings: Vec<HeadingEntry>,
    pub blocks: Vec<Block>,
}

impl RenderedPage {
    /// The concatenated body fragment.
    pub fn body_html(&self) -> String {
        self.blocks.iter().map(|b| b.html.as_str()).collect()
    }

    /// First H1 text, if any.
    pub fn title(&self) -> Option<&str> {
        self.headings
            .iter()
            .find(|h| h.level == 1)
            .map(|h| h.text.as_str())
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

/// Build comrak render options with GFM extensions and secure defaults.
///
/// Raw HTML from the input is never passed through (`render.unsafe_` stays
/// false), so the only tags in the output are the ones comrak generates.
fn make_options() -> Options<'static> {
    let mut options = Options::default();
    options.extension.strikethrough = true;
    options.extension.table = true;
    options.extension.autolink = true;
    options.extension.tasklist = true;
    options.render.unsafe_ = false;
    options
}

/// Convert heading text to a URL-safe anchor slug.
///
/// Algorithm: lowercase the text, map spaces/hyphens/underscores to `-`,
/// strip all other non-alphanumeric characters, collapse consecutive hyphens,
/// and trim leading/trailing hyphens.
fn slugify(text: &str) -> String {
    let mut slug = String::new();
    for c in text.to_lowercase().chars() {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if (c == ' ' || c == '-' || c == '_') && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_owned()
}

/// Hands out element ids for one page.
///
/// Heading slugs, code block ids and copy button ids share a single
/// namespace, so a heading titled `Code block 1` or `Foo 1` never lands on an
/// id another element already holds.
#[derive(Debug, Default)]
struct IdAllocator {
    used: HashSet<String>,
    // Next suffix to try per base slug.
    suffixes: HashMap<String, usize>,
    code_blocks: usize,
}

impl IdAllocator {
    /// `base`, then `base-1`, `base-2`, ... skipping ids already taken.
    fn heading(&mut self, base: &str) -> String {
        let next = self.suffixes.entry(base.to_owned()).or_insert(0);
        loop {
            let candidate = match *next {
                0 => base.to_owned(),
                n => format!("{base}-{n}"),
            };
            *next += 1;
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    /// `code-block-N`, reserving the matching `copy-code-block-N` button id.
    fn code_block(&mut self) -> String {
        loop {
            self.code_blocks += 1;
            let id = format!("code-block-{}", self.code_blocks);
            let button = format!("copy-{id}");
            if !self.used.contains(&id) && !self.used.contains(&button) {
                self.used.insert(button);
                self.used.insert(id.clone());
                return id;
            }
        }
    }
}

/// Plain-text content of a node and its descendants.
fn collect_text<'a>(node: &'a AstNode<'a>) -> String {
    let mut text = String::new();
    for child in node.children() {
        match &child.data.borrow().value {
            NodeValue::Text(s) => text.push_str(s),
            NodeValue::Code(c) => text.push_str(&c.literal),
            NodeValue::CodeBlock(cb) => text.push_str(&cb.literal),
            NodeValue::SoftBreak | NodeValue::LineBreak => text.push(' '),
            _ => text.push_str(&collect_text(child)),
        }
    }
    text
}

fn collect_links<'a>(node: &'a AstNode<'a>) -> Vec<LinkRef> {
    node.descendants()
        .filter_map(|n| match &n.data.borrow().value {
            NodeValue::Link(link) => Some(LinkRef {
                url: link.url.clone(),
                text: collect_text(n),
            }),
            _ => None,
        })
        .collect()
}

/// Minimal HTML entity escaping for text content and attribute values.
fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Add `attr="value"` to the first opening tag of `html`, merging into an
/// existing `class` attribute when `attr` is `class`.
fn add_to_first_tag(html: &str, attr: &str, value: &str) -> String {
    let Some(start) = html.find('<') else {
        return html.to_owned();
    };
    // Comments (`<!-- raw HTML omitted -->`) and closing tags are left alone.
    if !html[start + 1..].starts_with(|c: char| c.is_ascii_alphabetic()) {
        return html.to_owned();
    }
    let Some(end) = html[start..].find('>').map(|i| start + i) else {
        return html.to_owned();
    };
    let tag = &html[start..end];
    let existing = format!(" {attr}=\"");
    let mut out = String::with_capacity(html.len() + attr.len() + value.len() + 4);
    match tag.find(&existing) {
        Some(pos) if attr == "class" => {
            let insert_at = start + pos + existing.len();
            out.push_str(&html[..insert_at]);
            out.push_str(&html_escape(value));
            out.push(' ');
            out.push_str(&html[insert_at..]);
        }
        _ => {
            // Self-closing tags (`<hr />`) keep their slash last.
            let insert_at = if tag.ends_with('/') { end - 1 } else { end };
            let insert_at = if html[..insert_at].ends_with(' ') {
                insert_at - 1
            } else {
                insert_at
            };
            out.push_str(&html[..insert_at]);
            out.push_str(&format!(" {attr}=\"{}\"", html_escape(value)));
            out.push_str(&html[insert_at..]);
        }
    }
    out
}

fn render_node<'a>(node: &'a AstNode<'a>, options: &Options) -> io::Result<String> {
    let mut bytes = Vec::new();
    format_html(node, options, &mut bytes)?;
    String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Build the `<ul>…</ul>` HTML for the TOC.
///
/// Only headings at `levels` are listed. Returns an empty string when none
/// qualify.
fn build_toc_html(headings: &[HeadingEntry], levels: &[u8]) -> String {
    let listed: Vec<&HeadingEntry> = headings
        .iter()
        .filter(|h| levels.contains(&h.level))
        .collect();
    if listed.is_empty() {
        return String::new();
    }
    let mut html = String::from("<ul>\n");
    for heading in listed {
        let class = format!("toc-h{}", heading.level);
        let anchor = heading.anchor_id.as_str();
        let text = html_escape(&heading.text);
        html.push_str(&format!(
            "<li class=\"{class}\"><a href=\"#{anchor}\">{text}</a></li>\n",
        ));
    }
    html.push_str("</ul>\n");
    html
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Render a markdown string into page blocks and heading metadata.
///
/// Logs `headings=<count> blocks=<count>` at debug level.
pub fn render_markdown(
    input: &str,
    file_path: &Path,
    config: &SiteConfig,
) -> io::Result<RenderedPage> {
    let arena = Arena::new();
    let options = make_options();
    let root = parse_document(&arena, input, &options);

    let mut page = RenderedPage::default();
    let mut ids = IdAllocator::default();
    let mut code_blocks = 0usize;

    for node in root.children() {
        let value = node.data.borrow().value.clone();
        let html = render_node(node, &options)?;
        let links = collect_links(node);

        let (kind, text, html) = match value {
            NodeValue::Heading(nh) => {
                let text = collect_text(node);
                let anchor_id = ids.heading(&slugify(&text));
                let html = add_to_first_tag(&html, "id", &anchor_id);
                page.headings.push(HeadingEntry {
                    level: nh.level,
                    text: text.clone(),
                    anchor_id,
                });
                (BlockKind::Heading(page.headings.len() - 1), text, html)
            }
            NodeValue::CodeBlock(cb) => {
                code_blocks += 1;
                let anchor_id = ids.code_block();
                let pre = add_to_first_tag(&html, "id", &anchor_id);
                let copy = &config.copy;
                let html = format!(
                    "<div class=\"code-block {reveal}\">\n\
<button type=\"button\" id=\"copy-{anchor_id}\" class=\"{button}\" {attr}=\"{anchor_id}\" aria-label=\"Copy code\">{label}</button>\n\
{pre}</div>\n",
                    reveal = html_escape(&config.reveal.reveal_class),
                    button = html_escape(&copy.button_class),
                    attr = html_escape(&copy.target_attribute),
                    label = html_escape(&copy.label),
                );
                (BlockKind::Code { anchor_id }, cb.literal.clone(), html)
            }
            NodeValue::List(_) => {
                let items = node.children().map(collect_text).collect();
                let html = add_to_first_tag(&html, "class", &config.reveal.stagger_class);
                (BlockKind::List { items }, collect_text(node), html)
            }
            other => {
                let kind = match other {
                    NodeValue::Paragraph => BlockKind::Paragraph,
                    NodeValue::Table(_) => BlockKind::Table,
                    NodeValue::BlockQuote => BlockKind::Quote,
                    NodeValue::ThematicBreak => BlockKind::Rule,
                    _ => BlockKind::Other,
                };
                let html = match kind {
                    BlockKind::Paragraph | BlockKind::Table | BlockKind::Quote => {
                        add_to_first_tag(&html, "class", &config.reveal.reveal_class)
                    }
                    _ => html,
                };
                (kind, collect_text(node), html)
            }
        };

        page.blocks.push(Block {
            kind,
            text,
            links,
            html,
        });
    }

    tracing::debug!(
        path = %file_path.display(),
        headings = page.headings.len(),
        blocks = page.blocks.len(),
        code_blocks,
        "markdown rendered"
    );
    Ok(page)
}

/// Build the full HTML page: `<!DOCTYPE html>` with the header controls,
/// progress bar, TOC sidebar (doubling as the mobile nav menu) and content.
///
/// The site config is embedded as JSON so the browser side binds to the same
/// ids and classes the markup was rendered with.
pub fn build_page_shell(page: &RenderedPage, file_path: &Path, config: &SiteConfig) -> String {
    // Page title: first H1 text, then file stem, then a safe default.
    let title_raw = page
        .title()
        .or_else(|| file_path.file_stem().and_then(|s| s.to_str()))
        .unwrap_or("Document");
    let title = html_escape(title_raw);
    let content_html = page.body_html();
    let toc_html = build_toc_html(&page.headings, &config.toc.heading_levels);

    // Inline theme script: reads storage before CSS paints. The stylesheet
    // and wasm module take over once loaded.
    let storage_key = serde_json::to_string(&config.theme_storage_key())
        .unwrap_or_else(|_| "\"pagewire.theme\"".to_owned());
    let theme_attr = html_escape(&config.theme.attribute);
    let theme_init_script = format!(
        "<script>(function(){{\
try{{var s=localStorage.getItem({storage_key});}}catch(e){{s=null;}}\
var dark=s==='dark'||(s!=='light'&&window.matchMedia('(prefers-color-scheme: dark)').matches);\
document.documentElement.setAttribute('{theme_attr}',dark?'dark':'light');\
}}());</script>"
    );

    // `<` is escaped so config strings can never close the script element.
    let config_json = serde_json::to_string(config)
        .unwrap_or_else(|_| "{}".to_owned())
        .replace('<', "\\u003c");

    let theme_toggle_id = html_escape(&config.theme.toggle_id);
    let nav_toggle_id = html_escape(&config.nav.toggle_id);
    let nav_menu_id = html_escape(&config.nav.menu_id);
    let toc_id = html_escape(&config.toc.container_id);
    let progress_id = html_escape(&config.progress.bar_id);
    let status_id = html_escape(&config.copy.status_id);
    let css_path = web_assets::CSS_PATH;
    let module_path = web_assets::MODULE_PATH;

    format!(
        "<!DOCTYPE html>\n\
<html lang=\"en\">\n\
<head>\n\
<meta charset=\"utf-8\">\n\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
<title>{title}</title>\n\
{theme_init_script}\n\
<link rel=\"stylesheet\" href=\"{css_path}\">\n\
<script type=\"application/json\" id=\"pagewire-config\">{config_json}</script>\n\
</head>\n\
<body>\n\
<div id=\"{progress_id}\" class=\"scroll-progress\"></div>\n\
<header class=\"site-header\">\n\
<button id=\"{nav_toggle_id}\" class=\"nav-toggle\" type=\"button\" aria-label=\"Table of contents\">\u{2630}</button>\n\
<span class=\"site-title\">{title}</span>\n\
<button id=\"{theme_toggle_id}\" class=\"theme-toggle\" type=\"button\" aria-label=\"Toggle dark mode\">\u{25d0}</button>\n\
</header>\n\
<div class=\"layout\">\n\
<nav id=\"{nav_menu_id}\" class=\"toc-sidebar\" aria-label=\"Contents\">\n\
<div id=\"{toc_id}\">\n\
{toc_html}</div>\n\
</nav>\n\
<main class=\"content\">\n\
{content_html}</main>\n\
</div>\n\
<div id=\"{status_id}\" class=\"visually-hidden\" aria-live=\"polite\"></div>\n\
<script type=\"module\">import init from \"{module_path}\"; init();</script>\n\
</body>\n\
</html>\n"
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
