//! Selector cascade engine.
//!
//! For one field, tries each rule in declaration order against every element
//! the rule selects, reading candidate values through the rule's attribute
//! preference list. The first candidate that passes the field's validator
//! wins. Read-only and infallible: exhaustion is `None`.

use scraper::{ElementRef, Html};

use crate::dom;
use crate::image;
use crate::page::PageContext;
use crate::price;
use crate::rules::{AttrSource, RuleTable, SelectorRule};
use crate::title;
use crate::types::{FieldKind, FieldTrace};

/// A validated value and the rule that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeMatch {
    pub value: String,
    pub rule_index: usize,
    pub selector: String,
}

/// Run the cascade for `field`, recording rejected candidates in `trace`.
pub fn run_cascade(
    document: &Html,
    rules: &[SelectorRule],
    field: FieldKind,
    page: &PageContext,
    table: &RuleTable,
    trace: &mut FieldTrace,
) -> Option<CascadeMatch> {
    for rule in rules {
        for el in document.select(&rule.selector) {
            for source in &rule.attributes {
                let Some(raw) = read_candidate(&el, source, field, table) else {
                    continue;
                };
                if raw.trim().is_empty() {
                    continue;
                }
                match validate(field, &raw, &el, source, page, table) {
                    Some(value) => {
                        tracing::debug!(
                            field = %field,
                            rule = rule.index,
                            selector = %rule.source,
                            "Cascade match"
                        );
                        return Some(CascadeMatch {
                            value,
                            rule_index: rule.index,
                            selector: rule.source.clone(),
                        });
                    }
                    None => trace.record_rejected(&raw),
                }
            }
        }
    }
    tracing::debug!(field = %field, "Cascade exhausted");
    None
}

/// Read one candidate value from an element.
pub fn read_source(el: &ElementRef, source: &AttrSource) -> Option<String> {
    match source {
        AttrSource::Text => Some(dom::element_text(el)),
        AttrSource::Srcset => el
            .value()
            .attr("srcset")
            .and_then(image::first_srcset_url)
            .map(String::from),
        AttrSource::Attr(name) => el.value().attr(name).map(String::from),
    }
}

/// Price text leaves out struck-through children so a wrapper holding both
/// the list and the current price yields the current one.
fn read_candidate(
    el: &ElementRef,
    source: &AttrSource,
    field: FieldKind,
    table: &RuleTable,
) -> Option<String> {
    match (field, source) {
        (FieldKind::Price, AttrSource::Text) => {
            Some(dom::unstruck_text(el, table.struck_classes()))
        }
        _ => read_source(el, source),
    }
}

fn validate(
    field: FieldKind,
    raw: &str,
    el: &ElementRef,
    source: &AttrSource,
    page: &PageContext,
    table: &RuleTable,
) -> Option<String> {
    // Visible text only; attribute values are read from hidden nodes too
    // (meta tags, lazy-load sources).
    if *source == AttrSource::Text && dom::is_hidden(el) {
        return None;
    }
    match field {
        FieldKind::Title => title::validate_title(raw, page, table),
        FieldKind::Price => {
            if dom::is_struck(el, table.struck_classes()) {
                return None;
            }
            price::normalize_price(raw, page.family, table).map(|p| p.to_string())
        }
        FieldKind::Image => image::resolve_image(raw, &page.url, table),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn cascade(html: &str, field: FieldKind) -> (Option<CascadeMatch>, FieldTrace) {
        let table = RuleTable::builtin().unwrap();
        let doc = Html::parse_document(html);
        let page = PageContext::new(&table, Url::parse("https://example.com/item/123").unwrap(), &doc);
        let mut trace = FieldTrace::default();
        let m = run_cascade(&doc, table.rules(field), field, &page, &table, &mut trace);
        (m, trace)
    }

    #[test]
    fn test_first_rule_wins() {
        let (m, _) = cascade(
            r#"<h1 class="product-title-x">Lower Priority Heading</h1>
               <h1 data-pl="product-title">Wireless Mouse</h1>"#,
            FieldKind::Title,
        );
        let m = m.unwrap();
        assert_eq!(m.value, "Wireless Mouse");
        assert_eq!(m.rule_index, 1);
    }

    #[test]
    fn test_all_matches_of_a_rule_are_tried() {
        let (m, trace) = cascade(
            r#"<h1>Example Site</h1><h1>Wireless Gaming Mouse</h1>"#,
            FieldKind::Title,
        );
        assert_eq!(m.unwrap().value, "Wireless Gaming Mouse");
        assert_eq!(trace.rejected, vec!["Example Site".to_string()]);
    }

    #[test]
    fn test_hidden_text_is_skipped() {
        let (m, _) = cascade(
            r#"<h1 style="display:none">Hidden Product Name</h1>
               <meta property="og:title" content="Visible Product Name">"#,
            FieldKind::Title,
        );
        assert_eq!(m.unwrap().value, "Visible Product Name");
    }

    #[test]
    fn test_price_skips_struck_through() {
        let (m, _) = cascade(
            r#"<div class="price--originalText">$39.99</div>
               <div class="price--current">$19.99</div>"#,
            FieldKind::Price,
        );
        assert_eq!(m.unwrap().value, "$19.99");
    }

    #[test]
    fn test_price_wrapper_ignores_struck_child() {
        let (m, _) = cascade(
            r#"<div class="product-price"><del>$39.99</del><span>$19.99</span></div>"#,
            FieldKind::Price,
        );
        let m = m.unwrap();
        assert_eq!(m.value, "$19.99");
        assert_eq!(m.selector, r#"[class*="product-price"]"#);
    }

    #[test]
    fn test_price_wrapper_with_only_struck_text_is_skipped() {
        let (m, _) = cascade(
            r#"<div class="product-price"><s>$39.99</s></div>
               <span id="sale-price">$24.50</span>"#,
            FieldKind::Price,
        );
        assert_eq!(m.unwrap().value, "$24.50");
    }

    #[test]
    fn test_image_attribute_preference() {
        let (m, trace) = cascade(
            r#"<div class="slider--item--FefNjlj">
                 <img src="data:image/gif;base64,R0lGOD" data-src="//cdn.example.com/p/1.jpg">
               </div>"#,
            FieldKind::Image,
        );
        let m = m.unwrap();
        assert_eq!(m.value, "https://cdn.example.com/p/1.jpg");
        assert_eq!(m.rule_index, 0);
        assert_eq!(trace.rejected.len(), 1);
    }

    #[test]
    fn test_image_name_containing_denied_term() {
        let (m, trace) = cascade(
            r#"<div class="slider--item--FefNjlj">
                 <img src="https://cdn.example.com/p/silicone-case.jpg">
               </div>"#,
            FieldKind::Image,
        );
        assert_eq!(
            m.unwrap().value,
            "https://cdn.example.com/p/silicone-case.jpg"
        );
        assert!(trace.rejected.is_empty());
    }

    #[test]
    fn test_exhaustion_is_none() {
        let (m, _) = cascade("<p>nothing here</p>", FieldKind::Price);
        assert!(m.is_none());
    }
}
