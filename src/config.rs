//! Site configuration: the DOM contract each behavior binds to and the
//! observer policies.
//!
//! Every field has a default, so an empty JSON object (or no config file at
//! all) yields the stock contract used by the page renderer.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::visibility::{ObserverOptions, OptionsError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid {section} observer options: {source}")]
    Observer {
        section: &'static str,
        #[source]
        source: OptionsError,
    },
    #[error("toc heading level {0} is outside 1..=6")]
    HeadingLevel(u8),
    #[error("{0} must not be empty")]
    Empty(&'static str),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    pub theme: ThemeConfig,
    pub nav: NavConfig,
    pub progress: ProgressConfig,
    pub copy: CopyConfig,
    pub toc: TocConfig,
    pub reveal: RevealConfig,
    pub external: ExternalLinksConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThemeConfig {
    /// Prefix for preference keys (`<scope>.<key>`).
    pub storage_scope: String,
    pub storage_key: String,
    pub toggle_id: String,
    /// Attribute set on the root element (`data-theme`).
    pub attribute: String,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            storage_scope: "pagewire".to_owned(),
            storage_key: "theme".to_owned(),
            toggle_id: "theme-toggle".to_owned(),
            attribute: "data-theme".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NavConfig {
    pub toggle_id: String,
    pub menu_id: String,
    pub open_class: String,
    /// Viewport width at which the menu is always shown and any open state
    /// is dropped.
    pub breakpoint_px: f64,
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            toggle_id: "nav-toggle".to_owned(),
            menu_id: "nav-menu".to_owned(),
            open_class: "open".to_owned(),
            breakpoint_px: 768.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProgressConfig {
    pub bar_id: String,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            bar_id: "scroll-progress".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CopyConfig {
    pub button_class: String,
    /// Attribute on the button naming the id of the element to copy.
    pub target_attribute: String,
    /// Live region for announcements.
    pub status_id: String,
    pub copied_class: String,
    pub label: String,
    pub success_label: String,
    pub failure_label: String,
    pub success_message: String,
    pub failure_message: String,
    pub reset_ms: u64,
}

impl Default for CopyConfig {
    fn default() -> Self {
        Self {
            button_class: "copy-button".to_owned(),
            target_attribute: "data-copy-target".to_owned(),
            status_id: "copy-status".to_owned(),
            copied_class: "copied".to_owned(),
            label: "Copy".to_owned(),
            success_label: "Copied!".to_owned(),
            failure_label: "Press Ctrl+C".to_owned(),
            success_message: "Copied to clipboard".to_owned(),
            failure_message: "Copy failed. The code is selected; press Ctrl+C to copy it."
                .to_owned(),
            reset_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TocConfig {
    pub container_id: String,
    pub heading_levels: Vec<u8>,
    pub root_margin: String,
    pub active_class: String,
}

impl Default for TocConfig {
    fn default() -> Self {
        Self {
            container_id: "toc".to_owned(),
            heading_levels: vec![2, 3],
            root_margin: "-20% 0px -80% 0px".to_owned(),
            active_class: "active".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RevealConfig {
    pub reveal_class: String,
    pub stagger_class: String,
    pub visible_class: String,
    pub root_margin: String,
    pub threshold: f64,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            reveal_class: "reveal".to_owned(),
            stagger_class: "stagger".to_owned(),
            visible_class: "visible".to_owned(),
            root_margin: "0px 0px -50px 0px".to_owned(),
            threshold: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExternalLinksConfig {
    pub class: String,
    /// Appended to the link text in the generated `aria-label`.
    pub new_tab_note: String,
}

impl Default for ExternalLinksConfig {
    fn default() -> Self {
        Self {
            class: "external".to_owned(),
            new_tab_note: "(opens in new tab)".to_owned(),
        }
    }
}

impl SiteConfig {
    /// Load and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// Load `path` when given, otherwise fall back to the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ObserverOptions::new(&self.toc.root_margin, &[0.0]).map_err(|source| {
            ConfigError::Observer {
                section: "toc",
                source,
            }
        })?;
        ObserverOptions::new(&self.reveal.root_margin, &[self.reveal.threshold]).map_err(
            |source| ConfigError::Observer {
                section: "reveal",
                source,
            },
        )?;
        if self.toc.heading_levels.is_empty() {
            return Err(ConfigError::Empty("toc.heading_levels"));
        }
        if let Some(level) = self
            .toc
            .heading_levels
            .iter()
            .copied()
            .find(|l| !(1..=6).contains(l))
        {
            return Err(ConfigError::HeadingLevel(level));
        }
        if self.theme.storage_key.is_empty() {
            return Err(ConfigError::Empty("theme.storage_key"));
        }
        Ok(())
    }

    /// The preference key the theme is stored under.
    pub fn theme_storage_key(&self) -> String {
        if self.theme.storage_scope.is_empty() {
            self.theme.storage_key.clone()
        } else {
            format!("{}.{}", self.theme.storage_scope, self.theme.storage_key)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
