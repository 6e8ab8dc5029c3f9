//! Static web assets shipped with rendered pages.
//!
//! The stylesheet is compiled into the binary via `include_str!` so `render`
//! is self-contained. The behavior module is the wasm build of this crate,
//! produced separately by `wasm-pack build --target web --out-dir pkg`.

/// Stylesheet for rendered pages, loaded from `src/assets/pagewire.css` at
/// compile time.
pub const CSS: &str = include_str!("assets/pagewire.css");

/// Where the page shell links the stylesheet, relative to `index.html`.
pub const CSS_PATH: &str = "assets/pagewire.css";

/// ES module entry point emitted by `wasm-pack --target web`.
pub const MODULE_PATH: &str = "./pkg/pagewire.js";

/// Set on `<html>` once the behavior module has bound. The stylesheet only
/// hides reveal targets under this attribute, so a page whose module never
/// loads keeps its content visible.
pub const READY_ATTRIBUTE: &str = "data-pagewire";
pub const READY_VALUE: &str = "ready";
