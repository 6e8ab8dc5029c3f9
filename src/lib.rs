//! Interactive behaviors for long-form documentation pages.
//!
//! The behaviors (TOC highlighting, scroll reveal, theme, mobile nav, reading
//! progress, copy buttons, external links) are written against the [`dom::Dom`]
//! trait and driven by [`page::Page`]. The browser backend in `web` binds them
//! to the live DOM; [`simulate`] replays them headlessly over the page that
//! [`html`] renders.

pub mod config;
pub mod copy;
pub mod dom;
pub mod external;
pub mod html;
pub mod nav;
pub mod page;
pub mod progress;
pub mod reveal;
pub mod simulate;
pub mod theme;
pub mod toc;
pub mod visibility;
pub mod web_assets;

#[cfg(target_arch = "wasm32")]
mod web;
