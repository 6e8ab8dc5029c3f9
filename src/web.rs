//! Browser backend.
//!
//! Implements [`Dom`] over `web-sys`, persists the theme in `localStorage`,
//! and wires native events, `IntersectionObserver`s, the async clipboard and
//! timers into a shared [`Page`]. Only compiled on `wasm32` targets.

use std::cell::RefCell;
use std::rc::Rc;

use js_sys::{Array, Function, Promise, Reflect};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::{
    DomRectReadOnly, Element, Event, HtmlElement, IntersectionObserver, IntersectionObserverEntry,
    IntersectionObserverInit, KeyboardEvent, Storage, Window,
};

use crate::config::SiteConfig;
use crate::copy::ClipboardError;
use crate::dom::Dom;
use crate::page::{Effect, Environment, Page, PageEvent, TrackerKind};
use crate::progress::ScrollMetrics;
use crate::theme::{PreferenceStore, StoreError};
use crate::visibility::{reachable_ratio, ObserverOptions, Rect, VisibilityEntry};
use crate::web_assets;

const CONFIG_ELEMENT_ID: &str = "pagewire-config";

fn console_error(msg: &str) {
    web_sys::console::error_1(&JsValue::from_str(msg));
}

fn install_panic_hook() {
    use std::sync::Once;

    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        std::panic::set_hook(Box::new(|info| {
            let msg = match info.location() {
                Some(loc) => format!(
                    "panic at {}:{}:{}: {info}",
                    loc.file(),
                    loc.line(),
                    loc.column()
                ),
                None => format!("panic: {info}"),
            };
            console_error(&msg);
        }));
    });
}

fn js_error(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

// ---------------------------------------------------------------------------
// DOM
// ---------------------------------------------------------------------------

pub struct WebDom {
    window: Window,
    document: web_sys::Document,
}

impl WebDom {
    fn new(window: Window) -> Result<Self, JsValue> {
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("window has no document"))?;
        Ok(Self { window, document })
    }

    fn query_all(&self, scope: Option<&Element>, selector: &str) -> Vec<Element> {
        let list = match scope {
            Some(scope) => scope.query_selector_all(selector),
            None => self.document.query_selector_all(selector),
        };
        let Ok(list) = list else {
            return Vec::new();
        };
        (0..list.length())
            .filter_map(|i| list.get(i))
            .filter_map(|node| node.dyn_into::<Element>().ok())
            .collect()
    }
}

impl Dom for WebDom {
    type Node = Element;

    fn root(&self) -> Option<Element> {
        self.document.document_element()
    }

    fn element_by_id(&self, id: &str) -> Option<Element> {
        self.document.get_element_by_id(id)
    }

    fn elements_with_class(&self, class: &str) -> Vec<Element> {
        let collection = self.document.get_elements_by_class_name(class);
        (0..collection.length()).filter_map(|i| collection.item(i)).collect()
    }

    fn elements_with_tags(&self, tags: &[&str]) -> Vec<Element> {
        if tags.is_empty() {
            return Vec::new();
        }
        self.query_all(None, &tags.join(","))
    }

    fn descendants_with_tag(&self, scope: &Element, tag: &str) -> Vec<Element> {
        self.query_all(Some(scope), tag)
    }

    fn children(&self, node: &Element) -> Vec<Element> {
        let children = node.children();
        (0..children.length()).filter_map(|i| children.item(i)).collect()
    }

    fn contains(&self, ancestor: &Element, node: &Element) -> bool {
        ancestor.contains(Some(node))
    }

    fn attribute(&self, node: &Element, name: &str) -> Option<String> {
        node.get_attribute(name)
    }

    fn set_attribute(&mut self, node: &Element, name: &str, value: &str) {
        let _ = node.set_attribute(name, value);
    }

    fn remove_attribute(&mut self, node: &Element, name: &str) {
        let _ = node.remove_attribute(name);
    }

    fn has_class(&self, node: &Element, class: &str) -> bool {
        node.class_list().contains(class)
    }

    fn set_class(&mut self, node: &Element, class: &str, on: bool) {
        let _ = node.class_list().toggle_with_force(class, on);
    }

    fn text(&self, node: &Element) -> String {
        node.text_content().unwrap_or_default()
    }

    fn set_text(&mut self, node: &Element, text: &str) {
        node.set_text_content(Some(text));
    }

    fn set_style(&mut self, node: &Element, property: &str, value: &str) {
        if let Some(html) = node.dyn_ref::<HtmlElement>() {
            let _ = html.style().set_property(property, value);
        }
    }

    fn focus(&mut self, node: &Element) {
        if let Some(html) = node.dyn_ref::<HtmlElement>() {
            let _ = html.focus();
        }
    }

    fn select_contents(&mut self, node: &Element) {
        let Ok(range) = self.document.create_range() else {
            return;
        };
        if range.select_node_contents(node).is_err() {
            return;
        }
        if let Ok(Some(selection)) = self.window.get_selection() {
            let _ = selection.remove_all_ranges();
            let _ = selection.add_range(&range);
        }
    }

    fn page_host(&self) -> Option<String> {
        self.window.location().host().ok().filter(|host| !host.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// `window.localStorage`; accessing it can throw when storage is disabled.
pub struct LocalStorage {
    storage: Option<Storage>,
}

impl LocalStorage {
    fn new(window: &Window) -> Self {
        Self {
            storage: window.local_storage().ok().flatten(),
        }
    }
}

impl PreferenceStore for LocalStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        let storage = self.storage.as_ref().ok_or(StoreError::Unavailable)?;
        storage
            .get_item(key)
            .map_err(|e| StoreError::Rejected(format!("{e:?}")))
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let storage = self.storage.as_ref().ok_or(StoreError::Unavailable)?;
        storage
            .set_item(key, value)
            .map_err(|e| StoreError::Rejected(format!("{e:?}")))
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

struct State {
    dom: WebDom,
    page: Page<WebDom, LocalStorage>,
}

type Shared = Rc<RefCell<State>>;

fn dispatch(state: &Shared, event: PageEvent<Element>) {
    let effects = {
        let mut guard = state.borrow_mut();
        let State { dom, page } = &mut *guard;
        page.handle(dom, event)
    };
    run_effects(state, effects);
}

fn run_effects(state: &Shared, effects: Vec<Effect<Element>>) {
    for effect in effects {
        match effect {
            Effect::WriteClipboard(request) => {
                let state = Rc::clone(state);
                spawn_local(async move {
                    let result = write_clipboard(&request.text).await;
                    dispatch(&state, PageEvent::CopyFinished { request, result });
                });
            }
            Effect::ResetCopyLabelAfter { button, delay } => {
                let state = Rc::clone(state);
                let callback = Closure::once_into_js(move || {
                    dispatch(&state, PageEvent::ResetCopyLabel(button));
                });
                let ms = i32::try_from(delay.as_millis()).unwrap_or(i32::MAX);
                if let Some(window) = web_sys::window() {
                    let _ = window.set_timeout_with_callback_and_timeout_and_arguments_0(
                        callback.unchecked_ref(),
                        ms,
                    );
                }
            }
        }
    }
}

/// `navigator.clipboard.writeText(text)`.
async fn write_clipboard(text: &str) -> Result<(), ClipboardError> {
    let window = web_sys::window().ok_or(ClipboardError::Unavailable)?;
    let navigator = window.navigator();
    let clipboard = Reflect::get(&navigator, &JsValue::from_str("clipboard"))
        .ok()
        .filter(|value| !value.is_undefined() && !value.is_null())
        .ok_or(ClipboardError::Unavailable)?;
    let write_text = Reflect::get(&clipboard, &JsValue::from_str("writeText"))
        .ok()
        .and_then(|value| value.dyn_into::<Function>().ok())
        .ok_or(ClipboardError::Unavailable)?;
    let promise = write_text
        .call1(&clipboard, &JsValue::from_str(text))
        .map_err(|e| ClipboardError::Rejected(format!("{e:?}")))?
        .dyn_into::<Promise>()
        .map_err(|_| ClipboardError::Unavailable)?;
    JsFuture::from(promise)
        .await
        .map(|_| ())
        .map_err(|e| ClipboardError::Rejected(format!("{e:?}")))
}

fn media_matches(window: &Window, query: &str) -> bool {
    matches!(window.match_media(query), Ok(Some(list)) if list.matches())
}

fn scroll_metrics(window: &Window, document: &web_sys::Document) -> ScrollMetrics {
    let scroll_height = document
        .document_element()
        .map_or(0.0, |root| f64::from(root.scroll_height()));
    ScrollMetrics {
        scroll_top: window.scroll_y().unwrap_or(0.0),
        scroll_height,
        client_height: window.inner_height().ok().and_then(|h| h.as_f64()).unwrap_or(0.0),
    }
}

/// Config embedded by the renderer; defaults when absent or invalid.
fn read_config(document: &web_sys::Document) -> SiteConfig {
    let Some(raw) = document
        .get_element_by_id(CONFIG_ELEMENT_ID)
        .and_then(|el| el.text_content())
    else {
        return SiteConfig::default();
    };
    let parsed = serde_json::from_str::<SiteConfig>(&raw)
        .map_err(|e| e.to_string())
        .and_then(|config| config.validate().map(|()| config).map_err(|e| e.to_string()));
    match parsed {
        Ok(config) => config,
        Err(err) => {
            web_sys::console::warn_1(&JsValue::from_str(&format!(
                "pagewire: ignoring embedded config: {err}"
            )));
            SiteConfig::default()
        }
    }
}

fn listen(
    target: &web_sys::EventTarget,
    name: &str,
    handler: impl FnMut(Event) + 'static,
) -> Result<(), JsValue> {
    let closure = Closure::<dyn FnMut(Event)>::new(handler);
    target.add_event_listener_with_callback(name, closure.as_ref().unchecked_ref())?;
    // Listeners live as long as the page.
    closure.forget();
    Ok(())
}

fn rect(r: &DomRectReadOnly) -> Rect {
    Rect::new(r.x(), r.y(), r.width(), r.height())
}

fn observe(state: &Shared, kind: TrackerKind) -> Result<(), JsValue> {
    let (options, targets): (ObserverOptions, Vec<Element>) = {
        let guard = state.borrow();
        let Some(tracker) = guard.page.tracker(kind) else {
            return Ok(());
        };
        (tracker.options().clone(), tracker.targets().cloned().collect())
    };

    let init = IntersectionObserverInit::new();
    init.set_root_margin(&options.root_margin.to_string());
    let thresholds: Array = options
        .host_thresholds()
        .into_iter()
        .map(JsValue::from_f64)
        .collect();
    init.set_threshold(&thresholds);

    let callback_state = Rc::clone(state);
    let callback = Closure::<dyn FnMut(Array)>::new(move |entries: Array| {
        let batch: Vec<VisibilityEntry<Element>> = entries
            .iter()
            .filter_map(|entry| entry.dyn_into::<IntersectionObserverEntry>().ok())
            .map(|entry| {
                let ratio = entry.intersection_ratio();
                let reachable = entry.root_bounds().map_or(1.0, |root| {
                    reachable_ratio(&rect(&entry.bounding_client_rect()), &rect(&root))
                });
                VisibilityEntry {
                    target: entry.target(),
                    is_visible: options.is_visible(entry.is_intersecting(), ratio, reachable),
                    ratio,
                }
            })
            .collect();
        dispatch(&callback_state, PageEvent::Visibility { kind, batch });
    });
    let observer =
        IntersectionObserver::new_with_options(callback.as_ref().unchecked_ref(), &init)?;
    callback.forget();
    for target in &targets {
        observer.observe(target);
    }
    Ok(())
}

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    install_panic_hook();

    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let mut dom = WebDom::new(window.clone())?;
    let config = read_config(&dom.document);
    let env = Environment {
        prefers_dark: media_matches(&window, "(prefers-color-scheme: dark)"),
        prefers_reduced_motion: media_matches(&window, "(prefers-reduced-motion: reduce)"),
    };
    let store = LocalStorage::new(&window);
    let page = Page::init(&mut dom, &config, env, store).map_err(js_error)?;
    let document = dom.document.clone();
    let state: Shared = Rc::new(RefCell::new(State { dom, page }));

    observe(&state, TrackerKind::Toc)?;
    observe(&state, TrackerKind::Reveal)?;
    if let Some(root) = document.document_element() {
        root.set_attribute(web_assets::READY_ATTRIBUTE, web_assets::READY_VALUE)?;
    }

    let click_state = Rc::clone(&state);
    listen(&document, "click", move |event| {
        if let Some(target) = event.target().and_then(|t| t.dyn_into::<Element>().ok()) {
            dispatch(&click_state, PageEvent::Click(target));
        }
    })?;

    let key_state = Rc::clone(&state);
    listen(&document, "keydown", move |event| {
        if let Some(key) = event.dyn_ref::<KeyboardEvent>().map(KeyboardEvent::key) {
            dispatch(&key_state, PageEvent::Key(key));
        }
    })?;

    let scroll_state = Rc::clone(&state);
    let scroll_window = window.clone();
    let scroll_document = document.clone();
    listen(&window, "scroll", move |_| {
        let metrics = scroll_metrics(&scroll_window, &scroll_document);
        dispatch(&scroll_state, PageEvent::Scroll(metrics));
    })?;

    let resize_state = Rc::clone(&state);
    let resize_window = window.clone();
    let resize_document = document.clone();
    listen(&window, "resize", move |_| {
        let width = resize_window.inner_width().ok().and_then(|w| w.as_f64()).unwrap_or(0.0);
        dispatch(&resize_state, PageEvent::Resize { width });
        let metrics = scroll_metrics(&resize_window, &resize_document);
        dispatch(&resize_state, PageEvent::Scroll(metrics));
    })?;

    if let Ok(Some(scheme)) = window.match_media("(prefers-color-scheme: dark)") {
        let scheme_state = Rc::clone(&state);
        let list = scheme.clone();
        listen(&scheme, "change", move |_| {
            dispatch(&scheme_state, PageEvent::ColorSchemeChanged { dark: list.matches() });
        })?;
    }

    dispatch(&state, PageEvent::Scroll(scroll_metrics(&window, &document)));
    Ok(())
}
