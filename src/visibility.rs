//! Viewport visibility tracking.
//!
//! [`VisibilityTracker`] mirrors the browser's intersection observer: it owns a
//! set of observed elements and an [`ObserverOptions`] policy, and turns
//! intersection checks into batches of [`VisibilityEntry`] values. In the
//! browser the host computes the geometry and the tracker only keeps
//! bookkeeping ([`VisibilityTracker::record`]); natively the tracker computes
//! the geometry itself from element rectangles ([`VisibilityTracker::check`]).
//!
//! Consumers implement [`VisibilityObserver`]. The tracker never touches the
//! document.

use std::fmt;

use thiserror::Error;

use crate::dom::Dom;

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// Axis-aligned rectangle in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Overlap of two rectangles, or `None` when they neither overlap nor
    /// touch.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right < left || bottom < top {
            return None;
        }
        Some(Rect::new(left, top, right - left, bottom - top))
    }
}

/// A single root-margin length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Length {
    Px(f64),
    Percent(f64),
}

impl Length {
    fn resolve(&self, basis: f64) -> f64 {
        match self {
            Length::Px(px) => *px,
            Length::Percent(pct) => basis * pct / 100.0,
        }
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Length::Px(px) => write!(f, "{px}px"),
            Length::Percent(pct) => write!(f, "{pct}%"),
        }
    }
}

/// Offsets applied to the viewport before intersecting, in CSS margin order.
///
/// Positive values grow the trigger zone, negative values shrink it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RootMargin {
    pub top: Length,
    pub right: Length,
    pub bottom: Length,
    pub left: Length,
}

impl Default for RootMargin {
    fn default() -> Self {
        Self {
            top: Length::Px(0.0),
            right: Length::Px(0.0),
            bottom: Length::Px(0.0),
            left: Length::Px(0.0),
        }
    }
}

impl RootMargin {
    /// Parse CSS margin shorthand: one to four `px` or `%` lengths.
    pub fn parse(input: &str) -> Result<Self, OptionsError> {
        let lengths = input
            .split_whitespace()
            .map(parse_length)
            .collect::<Result<Vec<_>, _>>()?;
        let (top, right, bottom, left) = match lengths.as_slice() {
            [all] => (*all, *all, *all, *all),
            [vertical, horizontal] => (*vertical, *horizontal, *vertical, *horizontal),
            [top, horizontal, bottom] => (*top, *horizontal, *bottom, *horizontal),
            [top, right, bottom, left] => (*top, *right, *bottom, *left),
            _ => return Err(OptionsError::MarginArity(input.to_owned())),
        };
        Ok(Self {
            top,
            right,
            bottom,
            left,
        })
    }

    /// Grow or shrink `viewport` by this margin.
    pub fn apply(&self, viewport: Rect) -> Rect {
        let top = self.top.resolve(viewport.height);
        let bottom = self.bottom.resolve(viewport.height);
        let left = self.left.resolve(viewport.width);
        let right = self.right.resolve(viewport.width);
        Rect::new(
            viewport.x - left,
            viewport.y - top,
            viewport.width + left + right,
            viewport.height + top + bottom,
        )
    }
}

impl fmt::Display for RootMargin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.top, self.right, self.bottom, self.left)
    }
}

fn parse_length(token: &str) -> Result<Length, OptionsError> {
    let invalid = || OptionsError::InvalidLength(token.to_owned());
    if let Some(number) = token.strip_suffix("px") {
        return number.parse().map(Length::Px).map_err(|_| invalid());
    }
    if let Some(number) = token.strip_suffix('%') {
        return number.parse().map(Length::Percent).map_err(|_| invalid());
    }
    // Only a bare zero may omit its unit.
    match token.parse::<f64>() {
        Ok(value) if value == 0.0 => Ok(Length::Px(0.0)),
        _ => Err(invalid()),
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptionsError {
    #[error("invalid root margin length {0:?} (expected px or %)")]
    InvalidLength(String),
    #[error("root margin {0:?} must have between one and four lengths")]
    MarginArity(String),
    #[error("threshold {0} is outside [0, 1]")]
    ThresholdRange(f64),
}

const HOST_THRESHOLD_HALVINGS: u32 = 6;

/// Visibility policy for one tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct ObserverOptions {
    pub root_margin: RootMargin,
    /// Sorted, deduplicated, never empty.
    thresholds: Vec<f64>,
}

impl ObserverOptions {
    pub fn new(root_margin: &str, thresholds: &[f64]) -> Result<Self, OptionsError> {
        let root_margin = RootMargin::parse(root_margin)?;
        let mut sorted = Vec::with_capacity(thresholds.len().max(1));
        for &threshold in thresholds {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(OptionsError::ThresholdRange(threshold));
            }
            sorted.push(threshold);
        }
        if sorted.is_empty() {
            sorted.push(0.0);
        }
        sorted.sort_by(f64::total_cmp);
        sorted.dedup();
        Ok(Self {
            root_margin,
            thresholds: sorted,
        })
    }

    pub fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }

    /// Thresholds to hand a host observer that only reports crossings.
    ///
    /// Adds halvings of the lowest non-zero threshold so targets many times
    /// taller than the root still produce callbacks while they scroll in.
    pub fn host_thresholds(&self) -> Vec<f64> {
        let mut all = self.thresholds.clone();
        if let Some(&lowest) = self.thresholds.iter().find(|t| **t > 0.0) {
            all.extend((1..=HOST_THRESHOLD_HALVINGS).map(|n| lowest / f64::from(1u32 << n)));
            all.sort_by(f64::total_cmp);
            all.dedup();
        }
        all
    }

    /// Visibility as the consumers see it: intersecting and at or above the
    /// lowest threshold, scaled by the share of the target that can fit in
    /// the root at all (see [`reachable_ratio`]).
    pub fn is_visible(&self, intersecting: bool, ratio: f64, reachable: f64) -> bool {
        intersecting && ratio >= self.thresholds[0] * reachable
    }

    /// Number of (scaled) thresholds reached, or `None` when not intersecting.
    fn threshold_index(&self, intersecting: bool, ratio: f64, reachable: f64) -> Option<usize> {
        intersecting.then(|| {
            self.thresholds
                .iter()
                .filter(|t| ratio >= **t * reachable)
                .count()
        })
    }
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

/// One visibility notification.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibilityEntry<N> {
    pub target: N,
    pub is_visible: bool,
    pub ratio: f64,
}

#[derive(Debug, Clone)]
struct ObservedElement<N> {
    node: N,
    visible: bool,
    /// `None` until the first check has reported on this element.
    threshold_index: Option<Option<usize>>,
}

/// Observed elements plus the policy they are checked against.
#[derive(Debug, Clone)]
pub struct VisibilityTracker<N> {
    options: ObserverOptions,
    observed: Vec<ObservedElement<N>>,
}

impl<N: Clone + PartialEq> VisibilityTracker<N> {
    pub fn new(options: ObserverOptions) -> Self {
        Self {
            options,
            observed: Vec::new(),
        }
    }

    pub fn options(&self) -> &ObserverOptions {
        &self.options
    }

    /// Register `node`. Returns false (and does nothing) if it is already
    /// observed.
    pub fn observe(&mut self, node: N) -> bool {
        if self.observed.iter().any(|o| o.node == node) {
            return false;
        }
        self.observed.push(ObservedElement {
            node,
            visible: false,
            threshold_index: None,
        });
        true
    }

    pub fn len(&self) -> usize {
        self.observed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observed.is_empty()
    }

    pub fn targets(&self) -> impl Iterator<Item = &N> {
        self.observed.iter().map(|o| &o.node)
    }

    /// Last reported visibility of `node`, or `None` if it is not observed.
    pub fn is_visible(&self, node: &N) -> Option<bool> {
        self.observed
            .iter()
            .find(|o| &o.node == node)
            .map(|o| o.visible)
    }

    /// Run one intersection check against `viewport`.
    ///
    /// `geometry` returns the current rectangle of an element (same
    /// coordinate space as `viewport`); elements without geometry count as
    /// not intersecting. Entries come back in observation order, one per
    /// element whose threshold index changed.
    pub fn check<F>(&mut self, viewport: Rect, mut geometry: F) -> Vec<VisibilityEntry<N>>
    where
        F: FnMut(&N) -> Option<Rect>,
    {
        let root = self.options.root_margin.apply(viewport);
        let mut batch = Vec::new();
        for observed in &mut self.observed {
            let (intersecting, ratio, reachable) = match geometry(&observed.node) {
                Some(rect) => {
                    let (intersecting, ratio) = intersection_ratio(&rect, &root);
                    (intersecting, ratio, reachable_ratio(&rect, &root))
                }
                None => (false, 0.0, 1.0),
            };
            let index = self.options.threshold_index(intersecting, ratio, reachable);
            if observed.threshold_index == Some(index) {
                continue;
            }
            observed.threshold_index = Some(index);
            observed.visible = self.options.is_visible(intersecting, ratio, reachable);
            batch.push(VisibilityEntry {
                target: observed.node.clone(),
                is_visible: observed.visible,
                ratio,
            });
        }
        if !batch.is_empty() {
            tracing::trace!(entries = batch.len(), "intersection check");
        }
        batch
    }

    /// Update bookkeeping from a batch the host computed.
    pub fn record(&mut self, batch: &[VisibilityEntry<N>]) {
        for entry in batch {
            if let Some(observed) = self.observed.iter_mut().find(|o| o.node == entry.target) {
                observed.visible = entry.is_visible;
            }
        }
    }
}

/// Whether `target` intersects `root`, and which share of it does.
pub fn intersection_ratio(target: &Rect, root: &Rect) -> (bool, f64) {
    match target.intersection(root) {
        None => (false, 0.0),
        Some(_) if target.area() == 0.0 => (true, 1.0),
        Some(overlap) => (true, (overlap.area() / target.area()).clamp(0.0, 1.0)),
    }
}

/// Largest intersection ratio `target` can reach inside `root`.
///
/// 1.0 unless the target is wider or taller than the root; a block three
/// viewports tall can show at most a third of itself.
pub fn reachable_ratio(target: &Rect, root: &Rect) -> f64 {
    let fit = |outer: f64, inner: f64| {
        if inner > outer && inner > 0.0 {
            (outer.max(0.0) / inner).clamp(0.0, 1.0)
        } else {
            1.0
        }
    };
    fit(root.width, target.width) * fit(root.height, target.height)
}

/// Consumer of visibility notifications.
pub trait VisibilityObserver<D: Dom> {
    fn on_visibility_changed(&mut self, dom: &mut D, target: &D::Node, visible: bool);

    /// Apply a batch in order, so the last entry for an element wins.
    fn on_batch(&mut self, dom: &mut D, batch: &[VisibilityEntry<D::Node>]) {
        for entry in batch {
            self.on_visibility_changed(dom, &entry.target, entry.is_visible);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
