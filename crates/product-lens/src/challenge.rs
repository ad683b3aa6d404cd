//! Bot-challenge / interstitial detection.

use crate::rules::RuleTable;

/// Decides whether a loaded page is a verification interstitial rather than
/// the requested product page.
pub trait ChallengeDetector: Send + Sync {
    fn is_challenge(&self, url: &str, html: &str) -> bool;
}

impl<F> ChallengeDetector for F
where
    F: Fn(&str, &str) -> bool + Send + Sync,
{
    fn is_challenge(&self, url: &str, html: &str) -> bool {
        self(url, html)
    }
}

/// Case-insensitive substring match of known markers. Page markers are
/// looked for in the URL and the whole markup; vendor markers only in the URL
/// and the document `<title>`.
#[derive(Debug, Clone)]
pub struct MarkerDetector {
    markers: Vec<String>,
    vendor_markers: Vec<String>,
}

impl MarkerDetector {
    pub fn new(markers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            markers: lowercase_all(markers),
            vendor_markers: Vec::new(),
        }
    }

    pub fn with_vendor_markers(
        mut self,
        markers: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.vendor_markers = lowercase_all(markers);
        self
    }

    pub fn from_rules(rules: &RuleTable) -> Self {
        Self::new(rules.challenge_markers().iter().cloned())
            .with_vendor_markers(rules.challenge_vendor_markers().iter().cloned())
    }
}

fn lowercase_all(markers: impl IntoIterator<Item = impl Into<String>>) -> Vec<String> {
    markers
        .into_iter()
        .map(|m| m.into().to_lowercase())
        .filter(|m| !m.is_empty())
        .collect()
}

/// Text of the first `<title>` element, lowercased.
fn document_title(html: &str) -> Option<String> {
    let lower = html.to_lowercase();
    let open = lower.find("<title")?;
    let start = open + lower[open..].find('>')? + 1;
    let end = start + lower[start..].find("</title")?;
    Some(lower[start..end].trim().to_string())
}

impl ChallengeDetector for MarkerDetector {
    fn is_challenge(&self, url: &str, html: &str) -> bool {
        let url = url.to_lowercase();
        let in_url = self
            .markers
            .iter()
            .chain(&self.vendor_markers)
            .find(|m| url.contains(m.as_str()));
        if let Some(m) = in_url {
            tracing::debug!("Challenge marker {m:?} in URL");
            return true;
        }
        if let Some(title) = document_title(html) {
            if let Some(m) = self.vendor_markers.iter().find(|m| title.contains(m.as_str())) {
                tracing::debug!("Challenge marker {m:?} in page title");
                return true;
            }
        }
        let html = html.to_lowercase();
        match self.markers.iter().find(|m| html.contains(m.as_str())) {
            Some(m) => {
                tracing::debug!("Challenge marker {m:?} in page body");
                true
            }
            None => false,
        }
    }
}
