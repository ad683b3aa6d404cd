//! Inbound extraction request validation.

use url::Url;

use crate::rules::RuleTable;
use crate::types::{ExtractError, ExtractResult};

/// A validated absolute HTTP(S) product page URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRequest {
    url: Url,
}

impl ExtractionRequest {
    /// Validate a raw link. Empty, relative, or non-HTTP(S) input is rejected.
    pub fn parse(raw: &str) -> ExtractResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ExtractError::InvalidInput("link is required".to_string()));
        }

        let url = Url::parse(raw)
            .map_err(|e| ExtractError::InvalidInput(format!("malformed link {raw:?}: {e}")))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ExtractError::InvalidInput(format!(
                "unsupported scheme {:?}, expected http or https",
                url.scheme()
            )));
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(ExtractError::InvalidInput(format!("link {raw:?} has no host")));
        }

        Ok(Self { url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    /// Apply the site family's mobile hostname substitution, if one matches.
    ///
    /// Returns the request unchanged when no family rewrites this host.
    pub fn to_mobile(&self, rules: &RuleTable) -> Self {
        let rewrite = rules
            .family_for(self.host())
            .and_then(|f| f.mobile.as_ref())
            .filter(|m| m.from.eq_ignore_ascii_case(self.host()));

        let Some(rewrite) = rewrite else {
            return self.clone();
        };

        let mut url = self.url.clone();
        match url.set_host(Some(&rewrite.to)) {
            Ok(()) => {
                tracing::debug!(from = %self.url, to = %url, "Rewrote link to mobile site");
                Self { url }
            }
            Err(e) => {
                tracing::warn!("Ignoring mobile rewrite to {:?}: {e}", rewrite.to);
                self.clone()
            }
        }
    }

    pub fn is_rewritten_from(&self, original: &ExtractionRequest) -> bool {
        self.url != original.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_absolute_http_urls() {
        let req = ExtractionRequest::parse("  https://example.com/item/123 ").unwrap();
        assert_eq!(req.as_str(), "https://example.com/item/123");
        assert_eq!(req.host(), "example.com");
        assert!(ExtractionRequest::parse("http://shop.example.org/p?id=1").is_ok());
    }

    #[test]
    fn test_rejects_bad_input() {
        for raw in ["", "   ", "not a url", "/item/123", "ftp://example.com/a", "mailto:a@b.c"] {
            let err = ExtractionRequest::parse(raw).unwrap_err();
            assert!(
                matches!(err, ExtractError::InvalidInput(_)),
                "{raw:?} should be invalid input"
            );
        }
    }

    #[test]
    fn test_mobile_rewrite() {
        let rules = RuleTable::builtin().unwrap();
        let req =
            ExtractionRequest::parse("https://www.aliexpress.com/item/1005001.html?spm=x").unwrap();
        let mobile = req.to_mobile(&rules);
        assert_eq!(mobile.as_str(), "https://m.aliexpress.com/item/1005001.html?spm=x");
        assert!(mobile.is_rewritten_from(&req));
    }

    #[test]
    fn test_mobile_rewrite_leaves_other_hosts() {
        let rules = RuleTable::builtin().unwrap();
        let req = ExtractionRequest::parse("https://example.com/item/123").unwrap();
        assert_eq!(req.to_mobile(&rules), req);

        // Family matches but only the exact desktop host is rewritten.
        let req = ExtractionRequest::parse("https://pt.aliexpress.com/item/1.html").unwrap();
        assert_eq!(req.to_mobile(&rules), req);
    }
}
