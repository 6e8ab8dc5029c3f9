//! Light/dark theme with a persisted preference.
//!
//! The user's explicit choice is kept in a scoped [`PreferenceStore`]; when
//! nothing is stored the system color-scheme preference decides, and live
//! changes to that preference are followed. Storage failures never surface:
//! a failed read is "no preference" and a failed write is dropped.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

use crate::config::ThemeConfig;
use crate::dom::Dom;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    /// Parse a stored value; anything unexpected counts as no preference.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            _ => None,
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Preference storage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("preference storage is unavailable")]
    Unavailable,
    #[error("preference storage rejected the write: {0}")]
    Rejected(String),
}

/// String key-value storage supplied by the host (`localStorage` in the
/// browser).
pub trait PreferenceStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn write(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// Store kept in memory; can be switched off to behave like disabled
/// browser storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
    disabled: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn disabled() -> Self {
        Self {
            values: HashMap::new(),
            disabled: true,
        }
    }

    pub fn with_value(mut self, key: &str, value: &str) -> Self {
        self.values.insert(key.to_owned(), value.to_owned());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

impl PreferenceStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        if self.disabled {
            return Err(StoreError::Unavailable);
        }
        Ok(self.values.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        if self.disabled {
            return Err(StoreError::Unavailable);
        }
        self.values.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

/// Best-effort wrapper that swallows storage failures.
#[derive(Debug, Clone)]
pub struct Preferences<S> {
    store: S,
}

impl<S: PreferenceStore> Preferences<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match self.store.read(key) {
            Ok(value) => value,
            Err(err) => {
                tracing::debug!(key, error = %err, "preference read failed");
                None
            }
        }
    }

    pub fn set(&mut self, key: &str, value: &str) {
        if let Err(err) = self.store.write(key, value) {
            tracing::debug!(key, error = %err, "preference write failed");
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

pub struct ThemeController<N> {
    root: Option<N>,
    toggle: Option<N>,
    stored: Option<Theme>,
    system_dark: bool,
    storage_key: String,
    attribute: String,
}

impl<N: Clone + PartialEq> ThemeController<N> {
    /// Resolve the initial theme and apply it to the page.
    pub fn init<D: Dom<Node = N>, S: PreferenceStore>(
        dom: &mut D,
        config: &ThemeConfig,
        storage_key: String,
        prefs: &Preferences<S>,
        system_dark: bool,
    ) -> Self {
        let stored = prefs.get(&storage_key).as_deref().and_then(Theme::parse);
        let controller = Self {
            root: dom.root(),
            toggle: dom.element_by_id(&config.toggle_id),
            stored,
            system_dark,
            storage_key,
            attribute: config.attribute.clone(),
        };
        controller.apply(dom);
        tracing::debug!(
            theme = %controller.current(),
            stored = stored.is_some(),
            toggle = controller.toggle.is_some(),
            "theme applied"
        );
        controller
    }

    /// Stored choice if any, otherwise the system preference.
    pub fn current(&self) -> Theme {
        self.stored.unwrap_or(if self.system_dark {
            Theme::Dark
        } else {
            Theme::Light
        })
    }

    pub fn stored(&self) -> Option<Theme> {
        self.stored
    }

    pub fn toggle_node(&self) -> Option<&N> {
        self.toggle.as_ref()
    }

    /// Flip the theme and persist the explicit choice.
    pub fn toggle<D: Dom<Node = N>, S: PreferenceStore>(
        &mut self,
        dom: &mut D,
        prefs: &mut Preferences<S>,
    ) -> Theme {
        let next = self.current().opposite();
        self.stored = Some(next);
        prefs.set(&self.storage_key, next.as_str());
        self.apply(dom);
        next
    }

    /// Follow a live system change unless the user has chosen explicitly.
    pub fn system_changed<D: Dom<Node = N>>(&mut self, dom: &mut D, dark: bool) {
        self.system_dark = dark;
        if self.stored.is_none() {
            self.apply(dom);
        }
    }

    fn apply<D: Dom<Node = N>>(&self, dom: &mut D) {
        let theme = self.current();
        if let Some(root) = &self.root {
            dom.set_attribute(root, &self.attribute, theme.as_str());
        }
        if let Some(toggle) = &self.toggle {
            let pressed = if theme == Theme::Dark { "true" } else { "false" };
            dom.set_attribute(toggle, "aria-pressed", pressed);
            let label = format!("Switch to {} theme", theme.opposite());
            dom.set_attribute(toggle, "aria-label", &label);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
