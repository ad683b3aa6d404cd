//! Generic fallback scanner.
//!
//! Broad, unscoped document scans used only after the targeted cascade came
//! back empty for a field. Each scan walks the document in order and returns
//! the first plausible candidate.

use scraper::{Html, Selector};

use crate::cascade::read_source;
use crate::dom;
use crate::image;
use crate::page::PageContext;
use crate::price;
use crate::rules::{default_sources, RuleTable};
use crate::title;
use crate::types::FieldKind;

const HEADINGS: &str = "h1, h2, h3";
const BODY_ELEMENTS: &str = "body *";
const IMAGES: &str = "img";

/// Headings first, then the own text of every visible element.
pub fn scan_title(document: &Html, page: &PageContext, rules: &RuleTable) -> Option<String> {
    if let Ok(sel) = Selector::parse(HEADINGS) {
        for el in document.select(&sel) {
            if dom::is_hidden(&el) {
                continue;
            }
            let text = dom::element_text(&el);
            if let Some(found) = title::validate_fallback_title(&text, page, rules) {
                tracing::debug!("Fallback title from <{}>", el.value().name());
                return Some(found);
            }
        }
    }

    let sel = Selector::parse(BODY_ELEMENTS).ok()?;
    for el in document.select(&sel) {
        if dom::is_hidden(&el) {
            continue;
        }
        let text = dom::own_text(&el);
        if let Some(found) = title::validate_fallback_title(&text, page, rules) {
            tracing::debug!("Fallback title from <{}> text", el.value().name());
            return Some(found);
        }
    }
    None
}

/// First currency-prefixed amount in document order that is not struck
/// through and clears the sanity floor.
pub fn scan_price(document: &Html, page: &PageContext, rules: &RuleTable) -> Option<String> {
    let sel = Selector::parse(BODY_ELEMENTS).ok()?;
    let floor = rules.price_floor();

    for el in document.select(&sel) {
        if dom::is_hidden(&el) {
            continue;
        }
        let text = dom::own_text(&el);
        if text.is_empty() {
            continue;
        }
        let mut candidates = rules.currency_amount_pattern().find_iter(&text).peekable();
        if candidates.peek().is_none() {
            continue;
        }
        if dom::is_struck(&el, rules.struck_classes()) {
            continue;
        }
        for m in candidates {
            match price::normalize_price(m.as_str(), page.family, rules) {
                Some(p) if p.value >= floor => {
                    tracing::debug!("Fallback price {p} from <{}>", el.value().name());
                    return Some(p.to_string());
                }
                Some(p) => tracing::debug!("Discarding implausible price {p}"),
                None => {}
            }
        }
    }
    None
}

/// First `<img>` source that looks like product imagery.
pub fn scan_image(document: &Html, page: &PageContext, rules: &RuleTable) -> Option<String> {
    let sel = Selector::parse(IMAGES).ok()?;
    let sources = default_sources(FieldKind::Image);

    for el in document.select(&sel) {
        for source in &sources {
            let Some(raw) = read_source(&el, source) else {
                continue;
            };
            let Some(url) = image::resolve_image(&raw, &page.url, rules) else {
                continue;
            };
            if image::looks_like_product_image(&url, rules) {
                tracing::debug!("Fallback image {url}");
                return Some(url);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn with_page<T>(html: &str, f: impl FnOnce(&Html, &PageContext, &RuleTable) -> T) -> T {
        let rules = RuleTable::builtin().unwrap();
        let doc = Html::parse_document(html);
        let page = PageContext::new(&rules, Url::parse("https://example.com/item/123").unwrap(), &doc);
        f(&doc, &page, &rules)
    }

    #[test]
    fn test_title_prefers_headings() {
        let title = with_page(
            r#"<div>Free shipping on orders over fifty dollars</div>
               <h2>Ergonomic Wireless Mouse with USB Receiver</h2>"#,
            scan_title,
        );
        assert_eq!(title.as_deref(), Some("Ergonomic Wireless Mouse with USB Receiver"));
    }

    #[test]
    fn test_title_scans_all_elements() {
        let title = with_page(
            r#"<h1>Example Site</h1>
               <div class="x"><span>Ergonomic Wireless Mouse with USB Receiver</span></div>"#,
            scan_title,
        );
        assert_eq!(title.as_deref(), Some("Ergonomic Wireless Mouse with USB Receiver"));
    }

    #[test]
    fn test_title_none_when_only_boilerplate() {
        let title = with_page("<h1>Example Site</h1>", scan_title);
        assert_eq!(title, None);
    }

    #[test]
    fn test_price_skips_struck_and_tiny() {
        let price = with_page(
            r#"<p>Shipping: $0.50</p>
               <del>$49.99</del>
               <span>Now $29.99 only</span>"#,
            scan_price,
        );
        assert_eq!(price.as_deref(), Some("$29.99"));
    }

    #[test]
    fn test_price_ignores_scripts() {
        let price = with_page(
            r#"<script>window.price = "$999.00";</script><b>$12.00</b>"#,
            scan_price,
        );
        assert_eq!(price.as_deref(), Some("$12.00"));
    }

    #[test]
    fn test_image_allow_and_deny() {
        let image = with_page(
            r#"<img src="/static/logo.png">
               <img src="data:image/png;base64,AAAA">
               <img src="https://tracker.example.com/t?id=1">
               <img data-src="https://cdn.example.com/img/mouse.jpg">"#,
            scan_image,
        );
        assert_eq!(image.as_deref(), Some("https://cdn.example.com/img/mouse.jpg"));
    }
}
