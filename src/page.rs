//! Page startup and event routing.
//!
//! [`Page::init`] binds every behavior once against the document and owns
//! the resulting state. The host (browser backend or simulator) feeds events
//! through [`Page::handle`] on a single thread and carries out the returned
//! [`Effect`]s.

use std::time::Duration;

use crate::config::SiteConfig;
use crate::copy::{ClipboardError, CopyButtons, CopyOutcome, CopyRequest};
use crate::dom::{Binding, Dom};
use crate::external::annotate_external_links;
use crate::nav::NavMenu;
use crate::progress::{ScrollMetrics, ScrollProgress};
use crate::reveal::RevealAnimator;
use crate::theme::{PreferenceStore, Preferences, Theme, ThemeController};
use crate::toc::TocHighlighter;
use crate::visibility::{
    OptionsError, Rect, VisibilityEntry, VisibilityObserver, VisibilityTracker,
};

/// System preferences sampled at startup.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Environment {
    pub prefers_dark: bool,
    pub prefers_reduced_motion: bool,
}

/// Which visibility tracker a batch belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackerKind {
    Toc,
    Reveal,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent<N> {
    Click(N),
    Key(String),
    Scroll(ScrollMetrics),
    Resize { width: f64 },
    ColorSchemeChanged { dark: bool },
    Visibility {
        kind: TrackerKind,
        batch: Vec<VisibilityEntry<N>>,
    },
    CopyFinished {
        request: CopyRequest<N>,
        result: Result<(), ClipboardError>,
    },
    ResetCopyLabel(N),
}

/// Work the host performs on the page's behalf.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect<N> {
    WriteClipboard(CopyRequest<N>),
    /// Deliver [`PageEvent::ResetCopyLabel`] after `delay`.
    ResetCopyLabelAfter { button: N, delay: Duration },
}

pub struct Page<D: Dom, S> {
    prefs: Preferences<S>,
    theme: ThemeController<D::Node>,
    nav: Binding<NavMenu<D::Node>>,
    progress: Binding<ScrollProgress<D::Node>>,
    copy: Binding<CopyButtons<D::Node>>,
    toc: Binding<TocHighlighter<D::Node>>,
    reveal: Binding<RevealAnimator<D::Node>>,
    toc_tracker: Option<VisibilityTracker<D::Node>>,
    reveal_tracker: Option<VisibilityTracker<D::Node>>,
    external_links: usize,
}

impl<D: Dom, S: PreferenceStore> Page<D, S> {
    /// Bind all behaviors. Missing elements leave the matching behavior
    /// inactive; only invalid observer options are an error.
    pub fn init(
        dom: &mut D,
        config: &SiteConfig,
        env: Environment,
        store: S,
    ) -> Result<Self, OptionsError> {
        let prefs = Preferences::new(store);
        let theme = ThemeController::init(
            dom,
            &config.theme,
            config.theme_storage_key(),
            &prefs,
            env.prefers_dark,
        );
        let nav = NavMenu::bind(dom, &config.nav);
        let progress = ScrollProgress::bind(dom, &config.progress);
        let copy = CopyButtons::bind(dom, &config.copy);
        let toc = TocHighlighter::bind(dom, &config.toc);
        let reveal = RevealAnimator::bind(dom, &config.reveal, env.prefers_reduced_motion);

        let toc_tracker = match toc.as_ref() {
            Some(toc) => {
                let options = TocHighlighter::<D::Node>::observer_options(&config.toc)?;
                let mut tracker = VisibilityTracker::new(options);
                for heading in toc.targets() {
                    tracker.observe(heading.clone());
                }
                Some(tracker)
            }
            None => None,
        };
        let reveal_tracker = match reveal.as_ref() {
            Some(reveal) if !reveal.pending_targets().is_empty() => {
                let mut tracker = VisibilityTracker::new(
                    RevealAnimator::<D::Node>::observer_options(&config.reveal)?,
                );
                for target in reveal.pending_targets() {
                    tracker.observe(target);
                }
                Some(tracker)
            }
            _ => None,
        };

        let external_links = annotate_external_links(dom, &config.external);

        for (name, reason) in [
            ("nav", unbound_reason(&nav)),
            ("progress", unbound_reason(&progress)),
            ("copy", unbound_reason(&copy)),
            ("toc", unbound_reason(&toc)),
            ("reveal", unbound_reason(&reveal)),
        ] {
            if let Some(reason) = reason {
                tracing::debug!(behavior = name, reason, "behavior inactive");
            }
        }
        tracing::info!(
            theme = %theme.current(),
            toc_targets = toc_tracker.as_ref().map_or(0, VisibilityTracker::len),
            reveal_targets = reveal_tracker.as_ref().map_or(0, VisibilityTracker::len),
            external_links,
            "page initialised"
        );

        Ok(Self {
            prefs,
            theme,
            nav,
            progress,
            copy,
            toc,
            reveal,
            toc_tracker,
            reveal_tracker,
            external_links,
        })
    }

    /// Route one host event. Returns the effects the host must carry out.
    pub fn handle(&mut self, dom: &mut D, event: PageEvent<D::Node>) -> Vec<Effect<D::Node>> {
        let mut effects = Vec::new();
        match event {
            PageEvent::Click(target) => {
                let on_theme_toggle = self
                    .theme
                    .toggle_node()
                    .is_some_and(|toggle| dom.contains(toggle, &target));
                if on_theme_toggle {
                    let theme = self.theme.toggle(dom, &mut self.prefs);
                    tracing::debug!(%theme, "theme toggled");
                }
                if let Some(request) = self.copy.as_ref().and_then(|c| c.request(dom, &target)) {
                    effects.push(Effect::WriteClipboard(request));
                }
                if let Some(nav) = self.nav.as_mut() {
                    nav.handle_click(dom, &target);
                }
            }
            PageEvent::Key(key) => {
                if let Some(nav) = self.nav.as_mut() {
                    nav.handle_key(dom, &key);
                }
            }
            PageEvent::Scroll(metrics) => {
                if let Some(progress) = self.progress.as_mut() {
                    progress.update(dom, metrics);
                }
            }
            PageEvent::Resize { width } => {
                if let Some(nav) = self.nav.as_mut() {
                    nav.handle_resize(dom, width);
                }
            }
            PageEvent::ColorSchemeChanged { dark } => self.theme.system_changed(dom, dark),
            PageEvent::Visibility { kind, batch } => self.dispatch_batch(dom, kind, &batch),
            PageEvent::CopyFinished { request, result } => {
                if let Some(copy) = self.copy.as_mut() {
                    let outcome = copy.complete(dom, &request, result);
                    tracing::debug!(copied = outcome == CopyOutcome::Copied, "copy finished");
                    effects.push(Effect::ResetCopyLabelAfter {
                        button: request.button,
                        delay: copy.reset_delay(),
                    });
                }
            }
            PageEvent::ResetCopyLabel(button) => {
                if let Some(copy) = self.copy.as_mut() {
                    copy.reset(dom, &button);
                }
            }
        }
        effects
    }

    /// Check both trackers against element geometry and dispatch the
    /// resulting batches. Used when the host has no native observer.
    pub fn intersection_check<F>(&mut self, dom: &mut D, viewport: Rect, mut geometry: F)
    where
        F: FnMut(&D::Node) -> Option<Rect>,
    {
        let toc_batch = self
            .toc_tracker
            .as_mut()
            .map(|tracker| tracker.check(viewport, &mut geometry))
            .unwrap_or_default();
        let reveal_batch = self
            .reveal_tracker
            .as_mut()
            .map(|tracker| tracker.check(viewport, &mut geometry))
            .unwrap_or_default();
        if !toc_batch.is_empty() {
            self.apply_batch(dom, TrackerKind::Toc, &toc_batch);
        }
        if !reveal_batch.is_empty() {
            self.apply_batch(dom, TrackerKind::Reveal, &reveal_batch);
        }
    }

    /// A batch computed by the host's own observer.
    fn dispatch_batch(
        &mut self,
        dom: &mut D,
        kind: TrackerKind,
        batch: &[VisibilityEntry<D::Node>],
    ) {
        if let Some(tracker) = self.tracker_mut(kind) {
            tracker.record(batch);
        }
        self.apply_batch(dom, kind, batch);
    }

    fn apply_batch(&mut self, dom: &mut D, kind: TrackerKind, batch: &[VisibilityEntry<D::Node>]) {
        match kind {
            TrackerKind::Toc => {
                if let Some(toc) = self.toc.as_mut() {
                    toc.on_batch(dom, batch);
                }
            }
            TrackerKind::Reveal => {
                if let Some(reveal) = self.reveal.as_mut() {
                    reveal.on_batch(dom, batch);
                }
            }
        }
    }

    fn tracker_mut(&mut self, kind: TrackerKind) -> Option<&mut VisibilityTracker<D::Node>> {
        match kind {
            TrackerKind::Toc => self.toc_tracker.as_mut(),
            TrackerKind::Reveal => self.reveal_tracker.as_mut(),
        }
    }

    pub fn tracker(&self, kind: TrackerKind) -> Option<&VisibilityTracker<D::Node>> {
        match kind {
            TrackerKind::Toc => self.toc_tracker.as_ref(),
            TrackerKind::Reveal => self.reveal_tracker.as_ref(),
        }
    }

    pub fn theme(&self) -> Theme {
        self.theme.current()
    }

    pub fn active_heading(&self) -> Option<&str> {
        self.toc.as_ref().and_then(TocHighlighter::active)
    }

    /// `(revealed, total)` reveal targets.
    pub fn reveal_counts(&self) -> (usize, usize) {
        self.reveal
            .as_ref()
            .map_or((0, 0), |r| (r.revealed_count(), r.total()))
    }

    pub fn nav_open(&self) -> bool {
        self.nav.as_ref().is_some_and(NavMenu::is_open)
    }

    pub fn progress_percent(&self) -> Option<f64> {
        self.progress.as_ref().and_then(ScrollProgress::percent)
    }

    pub fn announcement(&self) -> Option<&str> {
        self.copy.as_ref().and_then(CopyButtons::announcement)
    }

    pub fn copy_buttons(&self) -> &[D::Node] {
        match self.copy.as_ref() {
            Some(copy) => copy.buttons(),
            None => &[],
        }
    }

    pub fn external_links(&self) -> usize {
        self.external_links
    }

    pub fn preferences(&self) -> &Preferences<S> {
        &self.prefs
    }
}

fn unbound_reason<T>(binding: &Binding<T>) -> Option<&'static str> {
    match binding {
        Binding::Bound(_) => None,
        Binding::Unbound(reason) => Some(reason),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
