//! Image URL validation and resolution.

use url::Url;

use crate::rules::RuleTable;

/// First URL of a `srcset` attribute value.
pub fn first_srcset_url(srcset: &str) -> Option<&str> {
    srcset
        .split(',')
        .next()
        .and_then(|candidate| candidate.split_whitespace().next())
        .filter(|u| !u.is_empty())
}

/// Accept absolute, protocol-relative, or root-relative URLs that are not
/// data URIs or denylisted, and resolve them against the page URL.
pub fn resolve_image(raw: &str, base: &Url, rules: &RuleTable) -> Option<String> {
    let raw = raw.trim();
    let is_data_uri = raw
        .get(..5)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:"));
    if raw.is_empty() || is_data_uri {
        return None;
    }

    let resolved = if raw.starts_with("//") {
        Url::parse(&format!("{}:{raw}", base.scheme())).ok()?
    } else if raw.starts_with('/') {
        base.join(raw).ok()?
    } else {
        let url = Url::parse(raw).ok()?;
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }
        url
    };

    let mut path = resolved.path().to_string();
    if let Some(query) = resolved.query() {
        path.push('?');
        path.push_str(query);
    }
    if is_denied(&path, rules) {
        return None;
    }
    Some(resolved.to_string())
}

/// Icon, logo, placeholder and similar non-product imagery. Callers pass the
/// path and query so that host names never trip the denylist. Terms match
/// whole words only: `silicone-case.jpg` is not an icon.
pub fn is_denied(path: &str, rules: &RuleTable) -> bool {
    rules
        .image_denylist_pattern()
        .is_some_and(|re| re.is_match(path))
}

/// Allow-list used by the fallback scanner: the URL mentions a product/image
/// path segment or its path carries a known image extension.
pub fn looks_like_product_image(url: &str, rules: &RuleTable) -> bool {
    let lower = url.to_ascii_lowercase();
    if rules.image_allowlist().iter().any(|a| lower.contains(a.as_str())) {
        return true;
    }
    let path = Url::parse(url)
        .map(|u| u.path().to_ascii_lowercase())
        .unwrap_or(lower);
    rules
        .image_extensions()
        .iter()
        .any(|ext| path.contains(ext.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://shop.example.com/item/123").unwrap()
    }

    #[test]
    fn test_resolve_forms() {
        let rules = RuleTable::builtin().unwrap();
        assert_eq!(
            resolve_image("https://cdn.example.com/img/mouse.jpg", &base(), &rules).as_deref(),
            Some("https://cdn.example.com/img/mouse.jpg")
        );
        assert_eq!(
            resolve_image("//ae01.alicdn.com/kf/S1.jpg_640x640.jpg", &base(), &rules).as_deref(),
            Some("https://ae01.alicdn.com/kf/S1.jpg_640x640.jpg")
        );
        assert_eq!(
            resolve_image("/media/p/42.webp", &base(), &rules).as_deref(),
            Some("https://shop.example.com/media/p/42.webp")
        );
    }

    #[test]
    fn test_rejects() {
        let rules = RuleTable::builtin().unwrap();
        for raw in [
            "",
            "data:image/png;base64,iVBORw0KGgo=",
            "DATA:image/gif;base64,R0lGOD",
            "images/relative.jpg",
            "javascript:void(0)",
            "https://cdn.example.com/assets/logo.png",
            "https://cdn.example.com/icons/cart-icon.svg",
            "/static/placeholder.jpg",
        ] {
            assert_eq!(resolve_image(raw, &base(), &rules), None, "{raw:?}");
        }
    }

    #[test]
    fn test_denylist_terms_inside_words_are_kept() {
        let rules = RuleTable::builtin().unwrap();
        for raw in [
            "https://cdn.example.com/p/silicone-case.jpg",
            "https://cdn.example.com/p/eco-logotype-free/bag.jpg",
            "https://cdn.example.com/p/uploading-station.png",
        ] {
            assert_eq!(resolve_image(raw, &base(), &rules).as_deref(), Some(raw), "{raw:?}");
        }
        assert_eq!(
            resolve_image("https://cdn.example.com/icons/star.png", &base(), &rules),
            None
        );
    }

    #[test]
    fn test_srcset() {
        assert_eq!(
            first_srcset_url("/a.jpg 1x, /b.jpg 2x"),
            Some("/a.jpg")
        );
        assert_eq!(first_srcset_url("  "), None);
    }

    #[test]
    fn test_product_image_allow_list() {
        let rules = RuleTable::builtin().unwrap();
        assert!(looks_like_product_image("https://cdn.example.com/product/1", &rules));
        assert!(looks_like_product_image("https://cdn.example.com/a/b/c.JPG?w=800", &rules));
        assert!(!looks_like_product_image("https://tracker.example.com/pixel?id=3", &rules));
    }
}
