//! External-link annotation.

use crate::config::ExternalLinksConfig;
use crate::dom::Dom;

/// Host part of an absolute (`http(s)://`) or protocol-relative (`//`) URL.
fn url_host(url: &str) -> Option<&str> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .or_else(|| url.strip_prefix("//"))?;
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let authority = &rest[..end];
    // Drop any `user:pass@` prefix.
    let host = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    (!host.is_empty()).then_some(host)
}

/// True when `href` leaves the site served from `page_host`.
///
/// Relative, fragment-only and non-web (`mailto:`) links are never external.
/// With no known page host every absolute web link counts as external.
pub fn is_external(href: &str, page_host: Option<&str>) -> bool {
    match (url_host(href.trim()), page_host) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(host), Some(page)) => !host.eq_ignore_ascii_case(page),
    }
}

/// Mark every external anchor to open in a new tab and say so to assistive
/// technology. Returns the number of links annotated.
pub fn annotate_external_links<D: Dom>(dom: &mut D, config: &ExternalLinksConfig) -> usize {
    let page_host = dom.page_host();
    let mut annotated = 0usize;
    for link in dom.elements_with_tags(&["a"]) {
        let Some(href) = dom.attribute(&link, "href") else {
            continue;
        };
        if !is_external(&href, page_host.as_deref()) {
            continue;
        }
        dom.set_attribute(&link, "target", "_blank");
        dom.set_attribute(&link, "rel", "noopener noreferrer");
        dom.set_class(&link, &config.class, true);
        if dom.attribute(&link, "aria-label").is_none() {
            let text = dom.text(&link);
            let label = format!("{} {}", text.trim(), config.new_tab_note);
            dom.set_attribute(&link, "aria-label", label.trim());
        }
        annotated += 1;
    }
    tracing::debug!(annotated, host = page_host.as_deref().unwrap_or("-"), "external links");
    annotated
}
