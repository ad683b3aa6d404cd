//! Read-only DOM helpers shared by the cascade and the fallback scanner.

use scraper::ElementRef;

/// Elements whose text is never page content.
const NON_CONTENT_TAGS: &[&str] = &["script", "style", "noscript", "template", "svg", "head"];

/// Tags that render their content struck through.
const STRUCK_TAGS: &[&str] = &["del", "s", "strike"];

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// All descendant text, whitespace collapsed.
pub(crate) fn element_text(el: &ElementRef) -> String {
    collapse_whitespace(&el.text().collect::<String>())
}

/// Text of the element's direct text children only.
pub(crate) fn own_text(el: &ElementRef) -> String {
    let joined = el
        .children()
        .filter_map(|child| child.value().as_text())
        .map(|t| &**t)
        .collect::<Vec<&str>>()
        .join(" ");
    collapse_whitespace(&joined)
}

/// The element followed by all of its element ancestors.
fn self_and_ancestors<'a>(el: &ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    std::iter::once(*el).chain(el.ancestors().filter_map(ElementRef::wrap))
}

/// Inside a script, style, or similar non-rendered container.
pub(crate) fn is_non_content(el: &ElementRef) -> bool {
    self_and_ancestors(el).any(|e| NON_CONTENT_TAGS.contains(&e.value().name()))
}

/// Hidden by markup: `hidden`, `aria-hidden`, inline `display:none` or
/// `visibility:hidden` on the element or any ancestor, or non-content.
pub(crate) fn is_hidden(el: &ElementRef) -> bool {
    self_and_ancestors(el).any(|e| {
        let v = e.value();
        if NON_CONTENT_TAGS.contains(&v.name()) || v.attr("hidden").is_some() {
            return true;
        }
        if v.attr("aria-hidden") == Some("true") {
            return true;
        }
        v.attr("style").is_some_and(|style| {
            let style: String = style
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_ascii_lowercase();
            style.contains("display:none") || style.contains("visibility:hidden")
        })
    })
}

/// Rendered as a struck-through (original / list) price.
pub(crate) fn is_struck(el: &ElementRef, struck_classes: &[String]) -> bool {
    self_and_ancestors(el).any(|e| strikes_through(&e, struck_classes))
}

/// Descendant text with struck-through subtrees left out, whitespace
/// collapsed. A wrapper holding both the list price and the current price
/// reads as the current price only.
pub(crate) fn unstruck_text(el: &ElementRef, struck_classes: &[String]) -> String {
    let mut text = String::new();
    push_unstruck(el, struck_classes, &mut text);
    collapse_whitespace(&text)
}

fn push_unstruck(el: &ElementRef, struck_classes: &[String], out: &mut String) {
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child) = ElementRef::wrap(child) {
            if !strikes_through(&child, struck_classes) {
                push_unstruck(&child, struck_classes, out);
            }
        }
    }
}

fn strikes_through(e: &ElementRef, struck_classes: &[String]) -> bool {
    let v = e.value();
    if STRUCK_TAGS.contains(&v.name()) {
        return true;
    }
    if v.attr("data-a-strike") == Some("true") {
        return true;
    }
    if let Some(style) = v.attr("style") {
        if style.to_ascii_lowercase().contains("line-through") {
            return true;
        }
    }
    v.attr("class").is_some_and(|class| {
        let class = class.to_ascii_lowercase();
        struck_classes.iter().any(|c| class.contains(c.as_str()))
    })
}
