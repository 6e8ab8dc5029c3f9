//! Copy-to-clipboard buttons for code blocks.
//!
//! A click produces a [`CopyRequest`]; the host performs the (possibly
//! asynchronous) clipboard write and reports back through
//! [`CopyButtons::complete`]. A failed write falls back to selecting the
//! text so the reader can copy it by hand.

use std::time::Duration;

use thiserror::Error;

use crate::config::CopyConfig;
use crate::dom::{Binding, Dom};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClipboardError {
    #[error("clipboard API is unavailable")]
    Unavailable,
    #[error("clipboard write was rejected: {0}")]
    Rejected(String),
}

/// A pending clipboard write.
#[derive(Debug, Clone, PartialEq)]
pub struct CopyRequest<N> {
    pub button: N,
    pub source: N,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    Copied,
    /// The write failed and the source text was selected instead.
    Selected,
}

#[derive(Debug, Clone)]
pub struct CopyButtons<N> {
    buttons: Vec<N>,
    status: Option<N>,
    config: CopyConfig,
    announcement: Option<String>,
}

impl<N: Clone + PartialEq> CopyButtons<N> {
    pub fn bind<D: Dom<Node = N>>(dom: &mut D, config: &CopyConfig) -> Binding<Self> {
        let buttons = dom.elements_with_class(&config.button_class);
        if buttons.is_empty() {
            return Binding::Unbound("no copy buttons");
        }
        let status = dom.element_by_id(&config.status_id);
        if let Some(status) = &status {
            dom.set_attribute(status, "aria-live", "polite");
        }
        tracing::debug!(
            buttons = buttons.len(),
            live_region = status.is_some(),
            "copy buttons bound"
        );
        Binding::Bound(Self {
            buttons,
            status,
            config: config.clone(),
            announcement: None,
        })
    }

    /// Last message announced through the live region.
    pub fn announcement(&self) -> Option<&str> {
        self.announcement.as_deref()
    }

    pub fn buttons(&self) -> &[N] {
        &self.buttons
    }

    pub fn reset_delay(&self) -> Duration {
        Duration::from_millis(self.config.reset_ms)
    }

    /// Build a request when `target` is (inside) a copy button whose source
    /// element exists.
    pub fn request<D: Dom<Node = N>>(&self, dom: &D, target: &N) -> Option<CopyRequest<N>> {
        let button = self.buttons.iter().find(|b| dom.contains(b, target))?;
        let Some(source_id) = dom.attribute(button, &self.config.target_attribute) else {
            tracing::debug!("copy button without target attribute");
            return None;
        };
        let Some(source) = dom.element_by_id(&source_id) else {
            tracing::debug!(source = %source_id, "copy target missing");
            return None;
        };
        Some(CopyRequest {
            button: button.clone(),
            text: dom.text(&source),
            source,
        })
    }

    /// Reflect the result of a clipboard write on the page.
    pub fn complete<D: Dom<Node = N>>(
        &mut self,
        dom: &mut D,
        request: &CopyRequest<N>,
        result: Result<(), ClipboardError>,
    ) -> CopyOutcome {
        match result {
            Ok(()) => {
                dom.set_text(&request.button, &self.config.success_label);
                dom.set_class(&request.button, &self.config.copied_class, true);
                let message = self.config.success_message.clone();
                self.announce(dom, message);
                CopyOutcome::Copied
            }
            Err(err) => {
                tracing::debug!(error = %err, "clipboard write failed, selecting text");
                dom.select_contents(&request.source);
                dom.set_text(&request.button, &self.config.failure_label);
                let message = self.config.failure_message.clone();
                self.announce(dom, message);
                CopyOutcome::Selected
            }
        }
    }

    /// Restore the idle label after the feedback delay.
    pub fn reset<D: Dom<Node = N>>(&mut self, dom: &mut D, button: &N) {
        dom.set_text(button, &self.config.label);
        dom.set_class(button, &self.config.copied_class, false);
    }

    fn announce<D: Dom<Node = N>>(&mut self, dom: &mut D, message: String) {
        if let Some(status) = &self.status {
            dom.set_text(status, &message);
        }
        self.announcement = Some(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Document, NodeId};

    struct Fixture {
        doc: Document,
        button: NodeId,
        code: NodeId,
        status: NodeId,
    }

    fn fixture() -> (Fixture, CopyButtons<NodeId>) {
        let mut doc = Document::new();
        let root = doc.root_id();
        let status = doc.append_element(root, "div", &[("id", "copy-status")]);
        let block = doc.append_element(root, "div", &[("class", "code-block")]);
        let button = doc.append_text_element(
            block,
            "button",
            &[("class", "copy-button"), ("data-copy-target", "code-1")],
            "Copy",
        );
        let pre = doc.append_element(block, "pre", &[("id", "code-1")]);
        doc.append_text_element(pre, "code", &[], "cargo build\n");
        let buttons = match CopyButtons::bind(&mut doc, &CopyConfig::default()) {
            Binding::Bound(b) => b,
            Binding::Unbound(reason) => panic!("{reason}"),
        };
        (
            Fixture {
                doc,
                button,
                code: pre,
                status,
            },
            buttons,
        )
    }

    #[test]
    fn click_on_button_builds_request_with_source_text() {
        let (fx, buttons) = fixture();
        let request = buttons.request(&fx.doc, &fx.button).expect("request");
        assert_eq!(request.text, "cargo build\n");
        assert_eq!(request.source, fx.code);
        assert!(buttons.request(&fx.doc, &fx.code).is_none());
        assert_eq!(fx.doc.attribute(&fx.status, "aria-live").as_deref(), Some("polite"));
    }

    #[test]
    fn success_updates_label_and_announces() {
        let (mut fx, mut buttons) = fixture();
        let request = buttons.request(&fx.doc, &fx.button).unwrap();
        assert_eq!(buttons.complete(&mut fx.doc, &request, Ok(())), CopyOutcome::Copied);
        assert_eq!(fx.doc.text(&fx.button), "Copied!");
        assert!(fx.doc.has_class(&fx.button, "copied"));
        assert_eq!(fx.doc.text(&fx.status), "Copied to clipboard");
        assert_eq!(fx.doc.selection(), None);

        buttons.reset(&mut fx.doc, &fx.button);
        assert_eq!(fx.doc.text(&fx.button), "Copy");
        assert!(!fx.doc.has_class(&fx.button, "copied"));
    }

    #[test]
    fn failure_selects_text_and_announces() {
        let (mut fx, mut buttons) = fixture();
        let request = buttons.request(&fx.doc, &fx.button).unwrap();
        let outcome = buttons.complete(
            &mut fx.doc,
            &request,
            Err(ClipboardError::Rejected("denied".to_owned())),
        );
        assert_eq!(outcome, CopyOutcome::Selected);
        assert_eq!(fx.doc.selection(), Some(fx.code));
        assert_eq!(fx.doc.text(&fx.button), "Press Ctrl+C");
        assert!(buttons.announcement().unwrap().starts_with("Copy failed"));
    }

    #[test]
    fn button_with_dangling_target_does_nothing() {
        let mut doc = Document::new();
        let root = doc.root_id();
        let button = doc.append_element(
            root,
            "button",
            &[("class", "copy-button"), ("data-copy-target", "nope")],
        );
        let buttons = match CopyButtons::bind(&mut doc, &CopyConfig::default()) {
            Binding::Bound(b) => b,
            Binding::Unbound(reason) => panic!("{reason}"),
        };
        assert!(buttons.request(&doc, &button).is_none());
    }

    #[test]
    fn reset_delay_comes_from_config() {
        let (_, buttons) = fixture();
        assert_eq!(buttons.reset_delay(), Duration::from_millis(2000));
    }
}
