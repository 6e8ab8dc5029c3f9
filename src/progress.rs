//! Reading-progress bar.

use crate::config::ProgressConfig;
use crate::dom::{Binding, Dom};

/// Scroll position of the document, as read from the host.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

impl ScrollMetrics {
    /// Share of the scrollable distance covered, clamped to `[0, 1]`.
    /// A page that cannot scroll reports 0.
    pub fn fraction(&self) -> f64 {
        let scrollable = self.scroll_height - self.client_height;
        if scrollable <= 0.0 {
            return 0.0;
        }
        (self.scroll_top / scrollable).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone)]
pub struct ScrollProgress<N> {
    bar: N,
    /// Last percentage written, rounded to one decimal.
    last: Option<f64>,
}

impl<N: Clone + PartialEq> ScrollProgress<N> {
    pub fn bind<D: Dom<Node = N>>(dom: &mut D, config: &ProgressConfig) -> Binding<Self> {
        let Some(bar) = dom.element_by_id(&config.bar_id) else {
            return Binding::Unbound("progress bar missing");
        };
        dom.set_attribute(&bar, "role", "progressbar");
        dom.set_attribute(&bar, "aria-valuemin", "0");
        dom.set_attribute(&bar, "aria-valuemax", "100");
        Binding::Bound(Self { bar, last: None })
    }

    pub fn percent(&self) -> Option<f64> {
        self.last
    }

    /// Write the bar for `metrics`. Returns false when nothing changed.
    pub fn update<D: Dom<Node = N>>(&mut self, dom: &mut D, metrics: ScrollMetrics) -> bool {
        let percent = (metrics.fraction() * 1000.0).round() / 10.0;
        if self.last == Some(percent) {
            return false;
        }
        self.last = Some(percent);
        dom.set_style(&self.bar, "width", &format!("{percent:.1}%"));
        dom.set_attribute(&self.bar, "aria-valuenow", &format!("{}", percent.round() as u32));
        true
    }
}
