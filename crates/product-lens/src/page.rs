//! Per-document facts the validators need: URL, site family, brand names.

use scraper::{Html, Selector};
use url::Url;

use crate::rules::{RuleTable, SiteFamily};

/// Second-level labels that sit under a country code (`example.co.uk`).
const GENERIC_SLDS: &[&str] = &["co", "com", "net", "org", "ac", "gov", "edu"];

/// Meta tags that name the site itself.
const SITE_NAME_META: &str = r#"meta[property="og:site_name"], meta[name="application-name"], meta[name="apple-mobile-web-app-title"]"#;

pub struct PageContext<'a> {
    pub url: Url,
    pub family: Option<&'a SiteFamily>,
    /// Brand names, normalized with [`normalize_brand`].
    brands: Vec<String>,
    /// Registrable label of the host, e.g. `example` for `www.example.co.uk`.
    host_label: Option<String>,
}

impl<'a> PageContext<'a> {
    pub fn new(rules: &'a RuleTable, url: Url, document: &Html) -> Self {
        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        let family = rules.family_for(&host);

        let mut brands: Vec<String> = family
            .map(|f| f.brands.iter().map(|b| normalize_brand(b)).collect())
            .unwrap_or_default();

        if let Ok(sel) = Selector::parse(SITE_NAME_META) {
            for el in document.select(&sel) {
                if let Some(content) = el.value().attr("content") {
                    let brand = normalize_brand(content);
                    if !brand.is_empty() && !brands.contains(&brand) {
                        brands.push(brand);
                    }
                }
            }
        }

        Self {
            host_label: registrable_label(&host),
            url,
            family,
            brands,
        }
    }

    /// A title made of nothing but the site's own name.
    pub fn is_brand_only(&self, text: &str, suffixes: &[String]) -> bool {
        let candidate = normalize_brand(text);
        if candidate.is_empty() {
            return false;
        }
        if self.brands.iter().any(|b| *b == candidate) {
            return true;
        }
        match &self.host_label {
            Some(label) => {
                candidate == *label
                    || candidate
                        .strip_prefix(label.as_str())
                        .is_some_and(|rest| suffixes.iter().any(|s| normalize_brand(s) == rest))
            }
            None => false,
        }
    }

    pub fn family_name(&self) -> Option<String> {
        self.family.map(|f| f.name.clone())
    }
}

/// Lowercase alphanumerics only, so "Example Site" == "example-site".
pub fn normalize_brand(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn registrable_label(host: &str) -> Option<String> {
    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    let label = match labels.len() {
        0 => return None,
        1 => labels[0],
        n => {
            let sld = labels[n - 2];
            if n >= 3 && GENERIC_SLDS.contains(&sld) && labels[n - 1].len() == 2 {
                labels[n - 3]
            } else {
                sld
            }
        }
    };
    Some(normalize_brand(label))
}
