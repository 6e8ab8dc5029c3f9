//! Headless replay of page behavior.
//!
//! Builds an in-memory [`Document`] with the same structure the page shell
//! renders, lays the blocks out on a fixed grid, and drives a [`Page`] through
//! a scripted sequence of reader actions. A [`Snapshot`] of the observable
//! page state is taken after every step.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SiteConfig;
use crate::copy::ClipboardError;
use crate::dom::{Document, Dom, NodeId};
use crate::html::{BlockKind, RenderedPage};
use crate::page::{Effect, Environment, Page, PageEvent};
use crate::progress::ScrollMetrics;
use crate::theme::MemoryStore;
use crate::visibility::{OptionsError, Rect};

const HEADER_HEIGHT: f64 = 64.0;
const SIDEBAR_WIDTH: f64 = 280.0;
const CONTENT_PADDING: f64 = 32.0;
const BLOCK_GAP: f64 = 16.0;
const ITEM_GAP: f64 = 4.0;
const LINE_HEIGHT: f64 = 24.0;
const CODE_LINE_HEIGHT: f64 = 20.0;
const CHAR_WIDTH: f64 = 8.0;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("invalid script: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("viewport must be positive, got {width}x{height}")]
    InvalidViewport { width: f64, height: f64 },
    #[error("no element matches {0:?}")]
    UnknownElement(String),
    #[error(transparent)]
    Observer(#[from] OptionsError),
}

// ---------------------------------------------------------------------------
// Script format
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 800.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    #[default]
    Available,
    Disabled,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipboardMode {
    #[default]
    Available,
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorScheme {
    Dark,
    Light,
}

/// One reader action.
///
/// `click` takes an element id, or `#fragment` for the first link pointing
/// at that fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptEvent {
    Scroll(f64),
    ScrollTo(String),
    Click(String),
    Key(String),
    ColorScheme(ColorScheme),
    Resize(Viewport),
    AdvanceMs(u64),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Script {
    pub viewport: Viewport,
    pub prefers_dark: bool,
    pub prefers_reduced_motion: bool,
    pub stored_theme: Option<String>,
    pub storage: StorageMode,
    pub clipboard: ClipboardMode,
    pub host: Option<String>,
    pub events: Vec<ScriptEvent>,
}

impl Script {
    pub fn parse(json: &str) -> Result<Self, ScriptError> {
        let script: Self = serde_json::from_str(json)?;
        validate_viewport(script.viewport)?;
        Ok(script)
    }
}

fn validate_viewport(viewport: Viewport) -> Result<(), ScriptError> {
    if viewport.width > 0.0 && viewport.height > 0.0 {
        Ok(())
    } else {
        Err(ScriptError::InvalidViewport {
            width: viewport.width,
            height: viewport.height,
        })
    }
}

/// Observable page state after one step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub step: usize,
    /// `None` for the state right after startup.
    pub event: Option<ScriptEvent>,
    pub scroll_y: f64,
    pub active: Option<String>,
    pub revealed: usize,
    pub total: usize,
    pub progress: Option<f64>,
    pub theme: String,
    pub nav_open: bool,
    pub announcement: Option<String>,
    pub buttons: Vec<String>,
}

// ---------------------------------------------------------------------------
// Document and layout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Shape {
    Heading(u8),
    Code { lines: usize },
    List(Vec<(NodeId, usize)>),
    Text { chars: usize },
    Rule,
}

#[derive(Debug, Clone)]
struct PlacedBlock {
    node: NodeId,
    shape: Shape,
}

/// Mirror of the rendered page shell.
fn build_document(
    page: &RenderedPage,
    config: &SiteConfig,
    host: Option<&str>,
) -> (Document, Vec<PlacedBlock>) {
    let mut doc = match host {
        Some(host) => Document::new().with_host(host),
        None => Document::new(),
    };
    let root = doc.root_id();
    let body = doc.append_element(root, "body", &[]);
    doc.append_element(
        body,
        "div",
        &[("id", config.progress.bar_id.as_str()), ("class", "scroll-progress")],
    );

    let header = doc.append_element(body, "header", &[("class", "site-header")]);
    doc.append_element(
        header,
        "button",
        &[("id", config.nav.toggle_id.as_str()), ("class", "nav-toggle")],
    );
    doc.append_element(
        header,
        "button",
        &[("id", config.theme.toggle_id.as_str()), ("class", "theme-toggle")],
    );

    let nav = doc.append_element(
        body,
        "nav",
        &[("id", config.nav.menu_id.as_str()), ("class", "toc-sidebar")],
    );
    let toc = doc.append_element(nav, "div", &[("id", config.toc.container_id.as_str())]);
    let list = doc.append_element(toc, "ul", &[]);
    for heading in page
        .headings
        .iter()
        .filter(|h| config.toc.heading_levels.contains(&h.level))
    {
        let class = format!("toc-h{}", heading.level);
        let item = doc.append_element(list, "li", &[("class", class.as_str())]);
        let href = format!("#{}", heading.anchor_id);
        doc.append_text_element(item, "a", &[("href", href.as_str())], &heading.text);
    }

    let main = doc.append_element(body, "main", &[("class", "content")]);
    let reveal = config.reveal.reveal_class.as_str();
    let mut placed = Vec::with_capacity(page.blocks.len());
    for block in &page.blocks {
        let (node, shape) = match &block.kind {
            BlockKind::Heading(index) => {
                let heading = &page.headings[*index];
                let tag = format!("h{}", heading.level);
                let attrs = [("id", heading.anchor_id.as_str())];
                let node = doc.append_text_element(main, &tag, &attrs, &heading.text);
                (node, Shape::Heading(heading.level))
            }
            BlockKind::Code { anchor_id } => {
                let class = format!("code-block {reveal}");
                let button_id = format!("copy-{anchor_id}");
                let wrapper = doc.append_element(main, "div", &[("class", class.as_str())]);
                doc.append_text_element(
                    wrapper,
                    "button",
                    &[
                        ("id", button_id.as_str()),
                        ("class", config.copy.button_class.as_str()),
                        (config.copy.target_attribute.as_str(), anchor_id.as_str()),
                    ],
                    &config.copy.label,
                );
                let pre = doc.append_element(wrapper, "pre", &[("id", anchor_id.as_str())]);
                doc.append_text_element(pre, "code", &[], &block.text);
                let lines = block.text.lines().count().max(1);
                (wrapper, Shape::Code { lines })
            }
            BlockKind::List { items } => {
                let attrs = [("class", config.reveal.stagger_class.as_str())];
                let list = doc.append_element(main, "ul", &attrs);
                let items = items
                    .iter()
                    .map(|text| {
                        let item = doc.append_text_element(list, "li", &[], text);
                        (item, text.chars().count())
                    })
                    .collect();
                (list, Shape::List(items))
            }
            BlockKind::Rule => (doc.append_element(main, "hr", &[]), Shape::Rule),
            kind => {
                let reveal_attrs = [("class", reveal)];
                let (tag, attrs): (&str, &[(&str, &str)]) = match kind {
                    BlockKind::Paragraph => ("p", &reveal_attrs),
                    BlockKind::Table => ("table", &reveal_attrs),
                    BlockKind::Quote => ("blockquote", &reveal_attrs),
                    _ => ("div", &[]),
                };
                let chars = block.text.chars().count();
                let node = if block.links.is_empty() {
                    doc.append_text_element(main, tag, attrs, &block.text)
                } else {
                    let node = doc.append_element(main, tag, attrs);
                    for link in &block.links {
                        let href = [("href", link.url.as_str())];
                        doc.append_text_element(node, "a", &href, &link.text);
                    }
                    node
                };
                (node, Shape::Text { chars })
            }
        };
        placed.push(PlacedBlock { node, shape });
    }

    doc.append_element(body, "div", &[("id", config.copy.status_id.as_str())]);
    (doc, placed)
}

#[derive(Debug, Clone, Default)]
struct Layout {
    rects: HashMap<NodeId, Rect>,
    height: f64,
}

fn text_lines(chars: usize, per_line: usize) -> usize {
    chars.div_ceil(per_line).max(1)
}

/// Stack blocks under the header. The sidebar takes horizontal space only
/// at desktop widths.
fn layout(blocks: &[PlacedBlock], viewport_width: f64, breakpoint: f64) -> Layout {
    let sidebar = if viewport_width >= breakpoint { SIDEBAR_WIDTH } else { 0.0 };
    let x = sidebar + CONTENT_PADDING;
    let width = (viewport_width - x - CONTENT_PADDING).max(CHAR_WIDTH * 20.0);
    let per_line = ((width / CHAR_WIDTH).floor() as usize).max(1);

    let mut out = Layout::default();
    let mut y = HEADER_HEIGHT + CONTENT_PADDING;
    for block in blocks {
        let height = match &block.shape {
            Shape::Heading(1) => 48.0,
            Shape::Heading(2) => 40.0,
            Shape::Heading(_) => 32.0,
            Shape::Code { lines } => *lines as f64 * CODE_LINE_HEIGHT + 2.0 * BLOCK_GAP,
            Shape::Text { chars } => text_lines(*chars, per_line) as f64 * LINE_HEIGHT,
            Shape::Rule => BLOCK_GAP,
            Shape::List(items) => {
                let mut item_y = y;
                for (node, chars) in items {
                    let h = text_lines(*chars, per_line) as f64 * LINE_HEIGHT;
                    out.rects.insert(*node, Rect::new(x, item_y, width, h));
                    item_y += h + ITEM_GAP;
                }
                (item_y - y - ITEM_GAP).max(0.0)
            }
        };
        out.rects.insert(block.node, Rect::new(x, y, width, height));
        y += height + BLOCK_GAP;
    }
    out.height = y + CONTENT_PADDING;
    out
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

pub struct Simulator {
    doc: Document,
    page: Page<Document, MemoryStore>,
    blocks: Vec<PlacedBlock>,
    layout: Layout,
    breakpoint: f64,
    viewport: Viewport,
    scroll_y: f64,
    clipboard: ClipboardMode,
    clipboard_log: Vec<String>,
    now_ms: u64,
    /// `(due, button)` label resets waiting on the clock.
    timers: Vec<(u64, NodeId)>,
    step: usize,
}

impl Simulator {
    /// Start the page and run the initial intersection check.
    pub fn new(
        rendered: &RenderedPage,
        config: &SiteConfig,
        script: &Script,
    ) -> Result<Self, ScriptError> {
        validate_viewport(script.viewport)?;
        let (mut doc, blocks) = build_document(rendered, config, script.host.as_deref());

        let store = match (script.storage, &script.stored_theme) {
            (StorageMode::Disabled, stored) => {
                if stored.is_some() {
                    tracing::warn!("stored_theme ignored because storage is disabled");
                }
                MemoryStore::disabled()
            }
            (StorageMode::Available, Some(theme)) => {
                MemoryStore::new().with_value(&config.theme_storage_key(), theme)
            }
            (StorageMode::Available, None) => MemoryStore::new(),
        };
        let env = Environment {
            prefers_dark: script.prefers_dark,
            prefers_reduced_motion: script.prefers_reduced_motion,
        };
        let page = Page::init(&mut doc, config, env, store)?;
        let breakpoint = config.nav.breakpoint_px;
        let layout = layout(&blocks, script.viewport.width, breakpoint);

        let mut sim = Self {
            doc,
            page,
            blocks,
            layout,
            breakpoint,
            viewport: script.viewport,
            scroll_y: 0.0,
            clipboard: script.clipboard,
            clipboard_log: Vec::new(),
            now_ms: 0,
            timers: Vec::new(),
            step: 0,
        };
        sim.refresh();
        Ok(sim)
    }

    pub fn snapshot(&self, event: Option<ScriptEvent>) -> Snapshot {
        let (revealed, total) = self.page.reveal_counts();
        Snapshot {
            step: self.step,
            event,
            scroll_y: self.scroll_y,
            active: self.page.active_heading().map(str::to_owned),
            revealed,
            total,
            progress: self.page.progress_percent(),
            theme: self.page.theme().as_str().to_owned(),
            nav_open: self.page.nav_open(),
            announcement: self.page.announcement().map(str::to_owned),
            buttons: self
                .page
                .copy_buttons()
                .iter()
                .map(|button| self.doc.text(button))
                .collect(),
        }
    }

    /// Apply one event and return the resulting snapshot.
    pub fn apply(&mut self, event: &ScriptEvent) -> Result<Snapshot, ScriptError> {
        tracing::debug!(step = self.step + 1, ?event, "simulate");
        match event {
            ScriptEvent::Scroll(y) => {
                self.scroll_to(*y);
                self.refresh();
            }
            ScriptEvent::ScrollTo(id) => {
                let rect = self
                    .doc
                    .element_by_id(id)
                    .and_then(|node| self.layout.rects.get(&node).copied())
                    .ok_or_else(|| ScriptError::UnknownElement(id.clone()))?;
                self.scroll_to(rect.y - HEADER_HEIGHT);
                self.refresh();
            }
            ScriptEvent::Click(target) => {
                let node = self.resolve(target)?;
                let effects = self.page.handle(&mut self.doc, PageEvent::Click(node));
                self.run_effects(effects);
            }
            ScriptEvent::Key(key) => {
                self.page.handle(&mut self.doc, PageEvent::Key(key.clone()));
            }
            ScriptEvent::ColorScheme(scheme) => {
                let dark = *scheme == ColorScheme::Dark;
                self.page.handle(&mut self.doc, PageEvent::ColorSchemeChanged { dark });
            }
            ScriptEvent::Resize(viewport) => {
                validate_viewport(*viewport)?;
                self.viewport = *viewport;
                self.layout = layout(&self.blocks, viewport.width, self.breakpoint);
                self.scroll_to(self.scroll_y);
                self.page.handle(&mut self.doc, PageEvent::Resize { width: viewport.width });
                self.refresh();
            }
            ScriptEvent::AdvanceMs(ms) => self.advance(*ms),
        }
        self.step += 1;
        Ok(self.snapshot(Some(event.clone())))
    }

    /// Text successfully written to the clipboard, oldest first.
    pub fn clipboard_log(&self) -> &[String] {
        &self.clipboard_log
    }

    /// Laid-out box of the element with `id`.
    pub fn rect_of(&self, id: &str) -> Option<Rect> {
        let node = self.doc.element_by_id(id)?;
        self.layout.rects.get(&node).copied()
    }

    pub fn max_scroll(&self) -> f64 {
        (self.layout.height - self.viewport.height).max(0.0)
    }

    fn scroll_to(&mut self, y: f64) {
        self.scroll_y = y.clamp(0.0, self.max_scroll());
    }

    fn resolve(&self, target: &str) -> Result<NodeId, ScriptError> {
        let found = if target.starts_with('#') {
            self.doc
                .elements_with_tags(&["a"])
                .into_iter()
                .find(|link| self.doc.attribute(link, "href").as_deref() == Some(target))
        } else {
            self.doc.element_by_id(target)
        };
        found.ok_or_else(|| ScriptError::UnknownElement(target.to_owned()))
    }

    /// Push the current scroll position through progress and both trackers.
    fn refresh(&mut self) {
        let metrics = ScrollMetrics {
            scroll_top: self.scroll_y,
            scroll_height: self.layout.height,
            client_height: self.viewport.height,
        };
        self.page.handle(&mut self.doc, PageEvent::Scroll(metrics));
        let viewport = Rect::new(0.0, self.scroll_y, self.viewport.width, self.viewport.height);
        let rects = &self.layout.rects;
        self.page
            .intersection_check(&mut self.doc, viewport, |node| rects.get(node).copied());
    }

    fn run_effects(&mut self, mut effects: Vec<Effect<NodeId>>) {
        while !effects.is_empty() {
            let mut next = Vec::new();
            for effect in effects {
                match effect {
                    Effect::WriteClipboard(request) => {
                        let result = match self.clipboard {
                            ClipboardMode::Available => {
                                self.clipboard_log.push(request.text.clone());
                                Ok(())
                            }
                            ClipboardMode::Denied => {
                                Err(ClipboardError::Rejected("permission denied".to_owned()))
                            }
                        };
                        next.extend(
                            self.page
                                .handle(&mut self.doc, PageEvent::CopyFinished { request, result }),
                        );
                    }
                    Effect::ResetCopyLabelAfter { button, delay } => {
                        self.timers.push((self.now_ms + millis(delay), button));
                    }
                }
            }
            effects = next;
        }
    }

    fn advance(&mut self, ms: u64) {
        self.now_ms += ms;
        let now = self.now_ms;
        let (due, waiting): (Vec<_>, Vec<_>) =
            self.timers.drain(..).partition(|(at, _)| *at <= now);
        self.timers = waiting;
        let mut due = due;
        due.sort_by_key(|(at, _)| *at);
        for (_, button) in due {
            let effects = self.page.handle(&mut self.doc, PageEvent::ResetCopyLabel(button));
            self.run_effects(effects);
        }
    }
}

fn millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

/// Replay `script` and return the startup snapshot followed by one snapshot
/// per event.
pub fn run(
    rendered: &RenderedPage,
    config: &SiteConfig,
    script: &Script,
) -> Result<Vec<Snapshot>, ScriptError> {
    let mut sim = Simulator::new(rendered, config, script)?;
    let mut snapshots = Vec::with_capacity(script.events.len() + 1);
    snapshots.push(sim.snapshot(None));
    for event in &script.events {
        snapshots.push(sim.apply(event)?);
    }
    Ok(snapshots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::render_markdown;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn paragraph(n: usize) -> String {
        format!("Paragraph {n}. {}\n\n", "Lorem ipsum dolor sit amet. ".repeat(10))
    }

    fn long_doc() -> String {
        let mut md = String::from("# Guide\n\n## Alpha\n\n");
        for n in 0..10 {
            md.push_str(&paragraph(n));
        }
        md.push_str("## Beta\n\n- one\n- two\n\n");
        for n in 10..20 {
            md.push_str(&paragraph(n));
        }
        md.push_str("```sh\ncargo build\n```\n\nSee [Rust](https://www.rust-lang.org).\n");
        md
    }

    fn rendered(md: &str) -> RenderedPage {
        render_markdown(md, Path::new("guide.md"), &SiteConfig::default()).expect("render")
    }

    fn script(json: &str) -> Script {
        Script::parse(json).expect("script")
    }

    fn sim(json: &str) -> Simulator {
        Simulator::new(&rendered(&long_doc()), &SiteConfig::default(), &script(json)).expect("sim")
    }

    #[test]
    fn script_parses_every_event_form() {
        let s = script(
            r##"{
                "viewport": {"width": 800, "height": 600},
                "stored_theme": "dark",
                "storage": "disabled",
                "clipboard": "denied",
                "events": [
                    {"scroll": 120},
                    {"scroll_to": "alpha"},
                    {"click": "#beta"},
                    {"key": "Escape"},
                    {"color_scheme": "dark"},
                    {"resize": {"width": 400, "height": 700}},
                    {"advance_ms": 2000}
                ]
            }"##,
        );
        assert_eq!(s.viewport, Viewport { width: 800.0, height: 600.0 });
        assert_eq!(s.storage, StorageMode::Disabled);
        assert_eq!(s.clipboard, ClipboardMode::Denied);
        assert_eq!(s.events.len(), 7);
        assert_eq!(s.events[2], ScriptEvent::Click("#beta".to_owned()));
        assert_eq!(s.events[6], ScriptEvent::AdvanceMs(2000));
    }

    #[test]
    fn script_rejects_unknown_fields_and_bad_viewports() {
        assert!(matches!(Script::parse(r#"{"colour": 1}"#), Err(ScriptError::Parse(_))));
        assert!(matches!(
            Script::parse(r#"{"viewport": {"width": 0, "height": 600}}"#),
            Err(ScriptError::InvalidViewport { .. })
        ));
    }

    #[test]
    fn scrolling_moves_the_active_heading() {
        let mut sim = sim(r#"{"viewport": {"width": 1280, "height": 400}}"#);
        assert_eq!(sim.snapshot(None).active, None);

        // The TOC band sits 20% down the viewport.
        let band = 0.2 * 400.0;
        let beta = sim.rect_of("beta").expect("beta laid out");
        let snap = sim.apply(&ScriptEvent::Scroll(beta.y - band + 5.0)).unwrap();
        assert_eq!(snap.active.as_deref(), Some("beta"));

        let alpha = sim.rect_of("alpha").expect("alpha laid out");
        let snap = sim.apply(&ScriptEvent::Scroll(alpha.y - band + 5.0)).unwrap();
        assert_eq!(snap.active.as_deref(), Some("alpha"));
    }

    #[test]
    fn progress_tracks_scroll_position() {
        let mut sim = sim("{}");
        assert_eq!(sim.snapshot(None).progress, Some(0.0));
        let snap = sim.apply(&ScriptEvent::Scroll(1.0e9)).unwrap();
        assert_eq!(snap.progress, Some(100.0));
        assert_eq!(snap.scroll_y, sim.max_scroll());
    }

    #[test]
    fn stepwise_scrolling_reveals_everything_once() {
        let mut sim = sim(r#"{"viewport": {"width": 1280, "height": 400}}"#);
        let mut last = sim.snapshot(None).revealed;
        let total = sim.snapshot(None).total;
        assert!(total > 20, "total reveal targets: {total}");
        let mut y = 0.0;
        while y < sim.max_scroll() + 100.0 {
            y += 100.0;
            let snap = sim.apply(&ScriptEvent::Scroll(y)).unwrap();
            assert!(snap.revealed >= last);
            last = snap.revealed;
        }
        let snap = sim.apply(&ScriptEvent::Scroll(0.0)).unwrap();
        assert_eq!(snap.revealed, total);
    }

    #[test]
    fn reduced_motion_reveals_at_startup() {
        let sim = sim(r#"{"prefers_reduced_motion": true}"#);
        let snap = sim.snapshot(None);
        assert!(snap.total > 0);
        assert_eq!(snap.revealed, snap.total);
    }

    #[test]
    fn stagger_group_takes_the_visible_class_the_stylesheet_targets() {
        let mut sim = sim(r#"{"viewport": {"width": 1280, "height": 400}}"#);
        let mut y = 0.0;
        while y < sim.max_scroll() {
            y += 100.0;
            sim.apply(&ScriptEvent::Scroll(y)).unwrap();
        }
        let groups = sim.doc.elements_with_class("stagger");
        assert_eq!(groups.len(), 1);
        let group = &groups[0];
        let items = sim.doc.children(group);
        assert_eq!(items.len(), 2);

        assert!(sim.doc.has_class(group, "visible"));
        assert!(items.iter().all(|item| !sim.doc.has_class(item, "visible")));
        assert!(crate::web_assets::CSS.contains("[data-pagewire] .stagger.visible > *"));
    }

    #[test]
    fn oversized_code_block_is_revealed() {
        let mut md = String::from("# Listing\n\n```\n");
        for n in 0..500 {
            md.push_str(&format!("line {n}\n"));
        }
        md.push_str("```\n");
        let mut sim = Simulator::new(
            &rendered(&md),
            &SiteConfig::default(),
            &script(r#"{"viewport": {"width": 1280, "height": 400}}"#),
        )
        .expect("sim");
        let wrapper = sim.doc.elements_with_class("code-block")[0];
        assert!(sim.layout.rects[&wrapper].height > 10.0 * 400.0);

        let mut y = 0.0;
        while y < sim.max_scroll() {
            y += 100.0;
            sim.apply(&ScriptEvent::Scroll(y)).unwrap();
        }
        let snap = sim.snapshot(None);
        assert_eq!((snap.revealed, snap.total), (1, 1));
    }

    #[test]
    fn heading_named_like_a_code_block_keeps_copy_working() {
        let md = "## Code block 1\n\n```sh\nrm -rf build\n```\n";
        let mut sim = Simulator::new(&rendered(md), &SiteConfig::default(), &script("{}"))
            .expect("sim");
        assert!(matches!(
            sim.apply(&ScriptEvent::Click("copy-code-block-1".to_owned())),
            Err(ScriptError::UnknownElement(_))
        ));
        let snap = sim.apply(&ScriptEvent::Click("copy-code-block-2".to_owned())).unwrap();
        assert_eq!(snap.buttons, vec!["Copied!".to_owned()]);
        assert_eq!(sim.clipboard_log(), ["rm -rf build\n".to_owned()]);
    }

    #[test]
    fn copy_then_label_resets_after_delay() {
        let mut sim = sim("{}");
        let snap = sim.apply(&ScriptEvent::Click("copy-code-block-1".to_owned())).unwrap();
        assert_eq!(snap.buttons, vec!["Copied!".to_owned()]);
        assert_eq!(snap.announcement.as_deref(), Some("Copied to clipboard"));
        assert_eq!(sim.clipboard_log(), ["cargo build\n".to_owned()]);

        let snap = sim.apply(&ScriptEvent::AdvanceMs(1999)).unwrap();
        assert_eq!(snap.buttons, vec!["Copied!".to_owned()]);
        let snap = sim.apply(&ScriptEvent::AdvanceMs(1)).unwrap();
        assert_eq!(snap.buttons, vec!["Copy".to_owned()]);
    }

    #[test]
    fn denied_clipboard_falls_back_to_selection() {
        let mut sim = sim(r#"{"clipboard": "denied"}"#);
        let snap = sim.apply(&ScriptEvent::Click("copy-code-block-1".to_owned())).unwrap();
        assert_eq!(snap.buttons, vec!["Press Ctrl+C".to_owned()]);
        assert!(snap.announcement.unwrap().starts_with("Copy failed"));
        assert!(sim.clipboard_log().is_empty());
    }

    #[test]
    fn theme_follows_storage_then_toggle() {
        let mut sim = sim(r#"{"stored_theme": "dark"}"#);
        assert_eq!(sim.snapshot(None).theme, "dark");
        let snap = sim.apply(&ScriptEvent::Click("theme-toggle".to_owned())).unwrap();
        assert_eq!(snap.theme, "light");
        // An explicit choice outranks the system preference.
        let snap = sim.apply(&ScriptEvent::ColorScheme(ColorScheme::Dark)).unwrap();
        assert_eq!(snap.theme, "light");
    }

    #[test]
    fn disabled_storage_still_toggles() {
        let mut sim = sim(r#"{"prefers_dark": true, "storage": "disabled"}"#);
        assert_eq!(sim.snapshot(None).theme, "dark");
        let snap = sim.apply(&ScriptEvent::Click("theme-toggle".to_owned())).unwrap();
        assert_eq!(snap.theme, "light");
    }

    #[test]
    fn mobile_nav_opens_and_closes() {
        let mut sim = sim(r#"{"viewport": {"width": 600, "height": 800}}"#);
        let toggle = ScriptEvent::Click("nav-toggle".to_owned());
        assert!(sim.apply(&toggle).unwrap().nav_open);
        assert!(!sim.apply(&ScriptEvent::Key("Escape".to_owned())).unwrap().nav_open);
        assert!(sim.apply(&toggle).unwrap().nav_open);
        assert!(!sim.apply(&ScriptEvent::Click("#alpha".to_owned())).unwrap().nav_open);
        assert!(sim.apply(&toggle).unwrap().nav_open);
        let wide = ScriptEvent::Resize(Viewport {
            width: 1024.0,
            height: 800.0,
        });
        assert!(!sim.apply(&wide).unwrap().nav_open);
    }

    #[test]
    fn unknown_targets_are_errors() {
        let mut sim = sim("{}");
        assert!(matches!(
            sim.apply(&ScriptEvent::Click("missing".to_owned())),
            Err(ScriptError::UnknownElement(id)) if id == "missing"
        ));
        assert!(matches!(
            sim.apply(&ScriptEvent::ScrollTo("nowhere".to_owned())),
            Err(ScriptError::UnknownElement(_))
        ));
    }

    #[test]
    fn run_returns_startup_plus_one_snapshot_per_event() {
        let s = script(r#"{"events": [{"scroll_to": "beta"}, {"key": "Tab"}]}"#);
        let snaps = run(&rendered(&long_doc()), &SiteConfig::default(), &s).unwrap();
        assert_eq!(snaps.len(), 3);
        assert_eq!(snaps[0].event, None);
        assert_eq!(snaps[2].step, 2);
        assert_eq!(snaps[1].event, Some(ScriptEvent::ScrollTo("beta".to_owned())));
    }

    #[test]
    fn page_without_headings_or_code_still_runs() {
        let s = script(r#"{"events": [{"scroll": 50}]}"#);
        let snaps = run(&rendered("just text\n"), &SiteConfig::default(), &s).unwrap();
        assert_eq!(snaps[1].active, None);
        assert!(snaps[1].buttons.is_empty());
    }
}
