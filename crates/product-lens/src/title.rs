//! Title validation.

use crate::dom::collapse_whitespace;
use crate::page::PageContext;
use crate::rules::RuleTable;

/// Titles must be strictly longer than this many characters.
pub const MIN_TITLE_CHARS: usize = 5;

/// Boilerplate that is never a product title: the site's own name standing
/// alone, or a verification / CAPTCHA interstitial.
pub fn is_rejected_title(text: &str, page: &PageContext, rules: &RuleTable) -> bool {
    let lower = text.to_lowercase();
    if rules
        .title_markers()
        .iter()
        .any(|m| lower.contains(&m.to_lowercase()))
    {
        return true;
    }
    page.is_brand_only(text, rules.brand_suffixes())
}

/// Cascade validation: collapsed text longer than [`MIN_TITLE_CHARS`] and not
/// boilerplate.
pub fn validate_title(raw: &str, page: &PageContext, rules: &RuleTable) -> Option<String> {
    let text = collapse_whitespace(raw);
    if text.chars().count() <= MIN_TITLE_CHARS {
        return None;
    }
    if is_rejected_title(&text, page, rules) {
        return None;
    }
    Some(text)
}

/// Fallback validation: within the plausible title length window.
pub fn validate_fallback_title(raw: &str, page: &PageContext, rules: &RuleTable) -> Option<String> {
    let bounds = rules.fallback_title();
    let text = collapse_whitespace(raw);
    let len = text.chars().count();
    if len < bounds.min_len || len > bounds.max_len {
        return None;
    }
    validate_title(&text, page, rules)
}
