//! Scroll-triggered reveal of content blocks.
//!
//! Blocks tagged `reveal` (or whole `stagger` groups) start hidden via CSS
//! and receive the `visible` class once they scroll into view. The
//! transition is one-way. With reduced motion requested, everything is
//! revealed at bind time and nothing is observed.

use crate::config::RevealConfig;
use crate::dom::{Binding, Dom};
use crate::visibility::{ObserverOptions, OptionsError, VisibilityObserver};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealMode {
    /// Targets are revealed as they intersect the viewport.
    Observed,
    /// Reduced motion: all targets were revealed at bind time.
    Immediate,
}

#[derive(Debug, Clone)]
pub struct RevealAnimator<N> {
    targets: Vec<N>,
    revealed: Vec<bool>,
    mode: RevealMode,
    visible_class: String,
}

impl<N: Clone + PartialEq> RevealAnimator<N> {
    /// Collect reveal targets and prepare stagger groups.
    ///
    /// `prefers_reduced_motion` is sampled once here and never re-read.
    pub fn bind<D: Dom<Node = N>>(
        dom: &mut D,
        config: &RevealConfig,
        prefers_reduced_motion: bool,
    ) -> Binding<Self> {
        let mut targets: Vec<N> = Vec::new();
        for class in [&config.reveal_class, &config.stagger_class] {
            for node in dom.elements_with_class(class) {
                if !targets.contains(&node) {
                    targets.push(node);
                }
            }
        }
        if targets.is_empty() {
            return Binding::Unbound("no reveal targets");
        }

        for group in dom.elements_with_class(&config.stagger_class) {
            for (index, child) in dom.children(&group).iter().enumerate() {
                dom.set_style(child, "--stagger-index", &index.to_string());
            }
        }

        let mut animator = Self {
            revealed: vec![false; targets.len()],
            targets,
            mode: RevealMode::Observed,
            visible_class: config.visible_class.clone(),
        };

        if prefers_reduced_motion {
            animator.mode = RevealMode::Immediate;
            for idx in 0..animator.targets.len() {
                animator.reveal(dom, idx);
            }
            tracing::debug!(targets = animator.targets.len(), "reduced motion, revealed all");
        } else {
            tracing::debug!(targets = animator.targets.len(), "reveal animator bound");
        }
        Binding::Bound(animator)
    }

    pub fn observer_options(config: &RevealConfig) -> Result<ObserverOptions, OptionsError> {
        ObserverOptions::new(&config.root_margin, &[config.threshold])
    }

    pub fn mode(&self) -> RevealMode {
        self.mode
    }

    /// Elements that still need observation; empty under reduced motion.
    pub fn pending_targets(&self) -> Vec<N> {
        match self.mode {
            RevealMode::Immediate => Vec::new(),
            RevealMode::Observed => self
                .targets
                .iter()
                .zip(&self.revealed)
                .filter(|(_, revealed)| !**revealed)
                .map(|(node, _)| node.clone())
                .collect(),
        }
    }

    pub fn total(&self) -> usize {
        self.targets.len()
    }

    pub fn revealed_count(&self) -> usize {
        self.revealed.iter().filter(|r| **r).count()
    }

    pub fn is_revealed(&self, node: &N) -> bool {
        self.targets
            .iter()
            .position(|t| t == node)
            .is_some_and(|idx| self.revealed[idx])
    }

    fn reveal<D: Dom<Node = N>>(&mut self, dom: &mut D, idx: usize) {
        dom.set_class(&self.targets[idx], &self.visible_class, true);
        self.revealed[idx] = true;
    }
}

impl<D: Dom> VisibilityObserver<D> for RevealAnimator<D::Node> {
    fn on_visibility_changed(&mut self, dom: &mut D, target: &D::Node, visible: bool) {
        // One-way: leaving the viewport never hides a block again.
        if !visible {
            return;
        }
        if let Some(idx) = self.targets.iter().position(|t| t == target) {
            self.reveal(dom, idx);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
