//! Field extraction over one document snapshot.

use std::sync::Arc;

use scraper::Html;
use url::Url;

use crate::cascade::run_cascade;
use crate::challenge::{ChallengeDetector, MarkerDetector};
use crate::fallback;
use crate::page::PageContext;
use crate::rules::RuleTable;
use crate::types::{Diagnostics, FieldKind, FieldResult, MatchSource, ProductResult};

/// Runs the selector cascade, then the fallback scanner, for each field.
///
/// Cheap to clone; the compiled rule table and detector are shared.
#[derive(Clone)]
pub struct Extractor {
    rules: Arc<RuleTable>,
    detector: Arc<dyn ChallengeDetector>,
}

impl Extractor {
    pub fn new(rules: Arc<RuleTable>) -> Self {
        let detector = Arc::new(MarkerDetector::from_rules(&rules));
        Self { rules, detector }
    }

    pub fn with_detector(mut self, detector: Arc<dyn ChallengeDetector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    pub fn is_challenge(&self, url: &str, html: &str) -> bool {
        self.detector.is_challenge(url, html)
    }

    /// Extract all three fields from a serialized document.
    ///
    /// Pure with respect to its inputs: the same markup and URL always give
    /// the same result.
    pub fn extract(&self, html: &str, page_url: &Url) -> ProductResult {
        let document = Html::parse_document(html);
        let page = PageContext::new(&self.rules, page_url.clone(), &document);
        let mut diagnostics = Diagnostics {
            family: page.family_name(),
            attempts: 1,
            ..Diagnostics::default()
        };

        let mut field = |kind: FieldKind| -> FieldResult {
            let trace = diagnostics.trace_mut(kind);
            if let Some(m) = run_cascade(&document, self.rules.rules(kind), kind, &page, &self.rules, trace) {
                return FieldResult::Found {
                    value: m.value,
                    source: MatchSource::Rule {
                        index: m.rule_index,
                        selector: m.selector,
                    },
                };
            }
            let scanned = match kind {
                FieldKind::Title => fallback::scan_title(&document, &page, &self.rules),
                FieldKind::Price => fallback::scan_price(&document, &page, &self.rules),
                FieldKind::Image => fallback::scan_image(&document, &page, &self.rules),
            };
            match scanned {
                Some(value) => FieldResult::Found {
                    value,
                    source: MatchSource::Fallback,
                },
                None => FieldResult::NotFound,
            }
        };

        let title = field(FieldKind::Title);
        let price = field(FieldKind::Price);
        let image = field(FieldKind::Image);

        tracing::debug!(
            url = %page_url,
            title = title.is_found(),
            price = price.is_found(),
            image = image.is_found(),
            "Extraction pass complete"
        );

        ProductResult {
            title,
            price,
            image,
            diagnostics,
        }
    }
}

impl std::fmt::Debug for Extractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extractor")
            .field("title_rules", &self.rules.rules(FieldKind::Title).len())
            .field("price_rules", &self.rules.rules(FieldKind::Price).len())
            .field("image_rules", &self.rules.rules(FieldKind::Image).len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> Extractor {
        Extractor::new(Arc::new(RuleTable::builtin().unwrap()))
    }

    #[test]
    fn test_records_sources_and_family() {
        let url = Url::parse("https://www.aliexpress.com/item/1005.html").unwrap();
        let result = extractor().extract(
            r#"<html><body>
                 <h1 data-pl="product-title">Wireless Mouse</h1>
                 <p>Limited offer: US $12.50 today</p>
               </body></html>"#,
            &url,
        );
        assert_eq!(result.title.value(), Some("Wireless Mouse"));
        assert_eq!(result.title.rule_index(), Some(1));
        assert_eq!(result.price.value(), Some("$12.50"));
        assert_eq!(result.price.source(), Some(&MatchSource::Fallback));
        assert_eq!(result.image, FieldResult::NotFound);
        assert_eq!(result.diagnostics.family.as_deref(), Some("aliexpress"));
        assert_eq!(result.diagnostics.attempts, 1);
    }

    #[test]
    fn test_custom_detector() {
        let extractor = extractor().with_detector(Arc::new(|_: &str, html: &str| html.contains("blocked")));
        assert!(extractor.is_challenge("https://example.com", "<p>blocked</p>"));
        assert!(!extractor.is_challenge("https://example.com/_____tmd_____/punish", "<p>ok</p>"));
    }
}
