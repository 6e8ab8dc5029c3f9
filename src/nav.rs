//! Mobile navigation menu toggle.

use crate::config::NavConfig;
use crate::dom::{Binding, Dom};

#[derive(Debug, Clone)]
pub struct NavMenu<N> {
    toggle: N,
    menu: N,
    open: bool,
    open_class: String,
    breakpoint_px: f64,
}

impl<N: Clone + PartialEq> NavMenu<N> {
    pub fn bind<D: Dom<Node = N>>(dom: &mut D, config: &NavConfig) -> Binding<Self> {
        let Some(toggle) = dom.element_by_id(&config.toggle_id) else {
            return Binding::Unbound("nav toggle missing");
        };
        let Some(menu) = dom.element_by_id(&config.menu_id) else {
            return Binding::Unbound("nav menu missing");
        };
        dom.set_attribute(&toggle, "aria-expanded", "false");
        dom.set_attribute(&toggle, "aria-controls", &config.menu_id);
        dom.set_class(&menu, &config.open_class, false);
        Binding::Bound(Self {
            toggle,
            menu,
            open: false,
            open_class: config.open_class.clone(),
            breakpoint_px: config.breakpoint_px,
        })
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    fn set_open<D: Dom<Node = N>>(&mut self, dom: &mut D, open: bool) {
        self.open = open;
        dom.set_class(&self.menu, &self.open_class, open);
        dom.set_attribute(&self.toggle, "aria-expanded", if open { "true" } else { "false" });
        tracing::trace!(open, "nav menu");
    }

    /// Route a click. Returns true when the click changed the menu state.
    pub fn handle_click<D: Dom<Node = N>>(&mut self, dom: &mut D, target: &N) -> bool {
        if dom.contains(&self.toggle, target) {
            let open = !self.open;
            self.set_open(dom, open);
            return true;
        }
        if !self.open {
            return false;
        }
        if dom.contains(&self.menu, target) {
            // Following a link inside the menu closes it; other clicks inside
            // (padding, headings) leave it open.
            if self.inside_link(dom, target) {
                self.set_open(dom, false);
                return true;
            }
            return false;
        }
        self.set_open(dom, false);
        true
    }

    /// Escape closes the menu and hands focus back to the toggle.
    pub fn handle_key<D: Dom<Node = N>>(&mut self, dom: &mut D, key: &str) -> bool {
        if key != "Escape" || !self.open {
            return false;
        }
        self.set_open(dom, false);
        dom.focus(&self.toggle);
        true
    }

    pub fn handle_resize<D: Dom<Node = N>>(&mut self, dom: &mut D, width: f64) {
        if self.open && width >= self.breakpoint_px {
            self.set_open(dom, false);
        }
    }

    fn inside_link<D: Dom<Node = N>>(&self, dom: &D, target: &N) -> bool {
        dom.descendants_with_tag(&self.menu, "a")
            .iter()
            .any(|link| dom.contains(link, target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Document, NodeId};

    struct Fixture {
        doc: Document,
        toggle: NodeId,
        menu: NodeId,
        link: NodeId,
        outside: NodeId,
    }

    fn fixture() -> (Fixture, NavMenu<NodeId>) {
        let mut doc = Document::new();
        let root = doc.root_id();
        let toggle = doc.append_element(root, "button", &[("id", "nav-toggle")]);
        let menu = doc.append_element(root, "ul", &[("id", "nav-menu")]);
        let item = doc.append_element(menu, "li", &[]);
        let link = doc.append_text_element(item, "a", &[("href", "/about")], "About");
        let outside = doc.append_element(root, "main", &[]);
        let nav = match NavMenu::bind(&mut doc, &NavConfig::default()) {
            Binding::Bound(nav) => nav,
            Binding::Unbound(reason) => panic!("{reason}"),
        };
        (
            Fixture {
                doc,
                toggle,
                menu,
                link,
                outside,
            },
            nav,
        )
    }

    #[test]
    fn bind_sets_aria_state() {
        let (fx, nav) = fixture();
        assert!(!nav.is_open());
        assert_eq!(fx.doc.attribute(&fx.toggle, "aria-expanded").as_deref(), Some("false"));
        assert_eq!(fx.doc.attribute(&fx.toggle, "aria-controls").as_deref(), Some("nav-menu"));
    }

    #[test]
    fn toggle_click_flips_open_state() {
        let (mut fx, mut nav) = fixture();
        assert!(nav.handle_click(&mut fx.doc, &fx.toggle));
        assert!(nav.is_open());
        assert!(fx.doc.has_class(&fx.menu, "open"));
        assert_eq!(fx.doc.attribute(&fx.toggle, "aria-expanded").as_deref(), Some("true"));
        nav.handle_click(&mut fx.doc, &fx.toggle);
        assert!(!fx.doc.has_class(&fx.menu, "open"));
    }

    #[test]
    fn link_click_and_outside_click_close() {
        let (mut fx, mut nav) = fixture();
        nav.handle_click(&mut fx.doc, &fx.toggle);
        assert!(!nav.handle_click(&mut fx.doc, &fx.menu));
        assert!(nav.is_open());
        assert!(nav.handle_click(&mut fx.doc, &fx.link));
        assert!(!nav.is_open());

        nav.handle_click(&mut fx.doc, &fx.toggle);
        assert!(nav.handle_click(&mut fx.doc, &fx.outside));
        assert!(!nav.is_open());
        assert!(!nav.handle_click(&mut fx.doc, &fx.outside));
    }

    #[test]
    fn escape_closes_and_restores_focus() {
        let (mut fx, mut nav) = fixture();
        assert!(!nav.handle_key(&mut fx.doc, "Escape"));
        nav.handle_click(&mut fx.doc, &fx.toggle);
        assert!(!nav.handle_key(&mut fx.doc, "Enter"));
        assert!(nav.handle_key(&mut fx.doc, "Escape"));
        assert!(!nav.is_open());
        assert_eq!(fx.doc.focused(), Some(fx.toggle));
    }

    #[test]
    fn wide_resize_closes() {
        let (mut fx, mut nav) = fixture();
        nav.handle_click(&mut fx.doc, &fx.toggle);
        nav.handle_resize(&mut fx.doc, 500.0);
        assert!(nav.is_open());
        nav.handle_resize(&mut fx.doc, 1024.0);
        assert!(!nav.is_open());
    }

    #[test]
    fn missing_menu_is_unbound() {
        let mut doc = Document::new();
        let root = doc.root_id();
        doc.append_element(root, "button", &[("id", "nav-toggle")]);
        assert_eq!(
            NavMenu::<NodeId>::bind(&mut doc, &NavConfig::default()).as_ref().map(|n| n.is_open()),
            None
        );
    }
}
