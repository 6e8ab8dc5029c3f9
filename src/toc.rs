//! Table-of-contents highlighting.
//!
//! Watches the section headings through a thin band near the top of the
//! viewport and mirrors the heading currently in that band onto the matching
//! TOC link (`active` class plus `aria-current`).

use crate::config::TocConfig;
use crate::dom::{Binding, Dom};
use crate::visibility::{ObserverOptions, OptionsError, VisibilityObserver};

#[derive(Debug, Clone)]
struct TocLink<N> {
    node: N,
    /// Fragment after `#` in the link's href.
    fragment: Option<String>,
}

/// Keeps the TOC link list in sync with the heading being read.
#[derive(Debug, Clone)]
pub struct TocHighlighter<N> {
    links: Vec<TocLink<N>>,
    headings: Vec<N>,
    active: Option<String>,
    active_class: String,
}

impl<N: Clone + PartialEq> TocHighlighter<N> {
    /// Resolve the TOC container, its links and the observed headings.
    ///
    /// Unbound when the container is missing or the page has no headings
    /// with an id at the configured levels.
    pub fn bind<D: Dom<Node = N>>(dom: &D, config: &TocConfig) -> Binding<Self> {
        let Some(container) = dom.element_by_id(&config.container_id) else {
            return Binding::Unbound("toc container missing");
        };

        let tags: Vec<String> = config.heading_levels.iter().map(|l| format!("h{l}")).collect();
        let tags: Vec<&str> = tags.iter().map(String::as_str).collect();
        let headings: Vec<N> = dom
            .elements_with_tags(&tags)
            .into_iter()
            .filter(|h| dom.id(h).is_some())
            .collect();
        if headings.is_empty() {
            return Binding::Unbound("no headings with ids");
        }

        let links = dom
            .descendants_with_tag(&container, "a")
            .into_iter()
            .map(|node| {
                let fragment = dom
                    .attribute(&node, "href")
                    .and_then(|href| href.split_once('#').map(|(_, frag)| frag.to_owned()))
                    .filter(|frag| !frag.is_empty());
                TocLink { node, fragment }
            })
            .collect::<Vec<_>>();

        tracing::debug!(headings = headings.len(), links = links.len(), "toc highlighter bound");
        Binding::Bound(Self {
            links,
            headings,
            active: None,
            active_class: config.active_class.clone(),
        })
    }

    /// Observation policy: a thin band just below the top of the viewport.
    pub fn observer_options(config: &TocConfig) -> Result<ObserverOptions, OptionsError> {
        ObserverOptions::new(&config.root_margin, &[0.0])
    }

    /// Headings to observe, in document order.
    pub fn targets(&self) -> &[N] {
        &self.headings
    }

    /// Id of the heading last reported inside the band.
    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Point every link's active state at `heading_id`.
    ///
    /// Only the first link targeting the heading is marked, so at most one
    /// link is ever active.
    fn activate<D: Dom<Node = N>>(&mut self, dom: &mut D, heading_id: &str) {
        let mut marked = false;
        for link in &self.links {
            let on = !marked && link.fragment.as_deref() == Some(heading_id);
            marked |= on;
            dom.set_class(&link.node, &self.active_class, on);
            if on {
                dom.set_attribute(&link.node, "aria-current", "true");
            } else {
                dom.remove_attribute(&link.node, "aria-current");
            }
        }
        if !marked {
            tracing::trace!(heading = heading_id, "active heading has no toc link");
        }
        self.active = Some(heading_id.to_owned());
    }
}

impl<D: Dom> VisibilityObserver<D> for TocHighlighter<D::Node> {
    fn on_visibility_changed(&mut self, dom: &mut D, target: &D::Node, visible: bool) {
        if !visible {
            return;
        }
        if let Some(id) = dom.id(target) {
            self.activate(dom, &id);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
