//! Declarative selector rule table.
//!
//! Every field (title, price, image) has one ordered, site-agnostic cascade of
//! CSS selector rules. Site families only carry host-specific facts: brand
//! names, a currency prefix, and a mobile hostname rewrite. The built-in table
//! is embedded at compile time from `rules.json`; a replacement can be loaded
//! from disk with the same schema. Selectors are compiled once per table.

use std::path::Path;

use regex::Regex;
use scraper::Selector;
use serde::{Deserialize, Serialize};

use crate::types::{ExtractError, ExtractResult, FieldKind};

/// Built-in rule table, embedded so there is no runtime file I/O.
const BUILTIN_RULES: &str = include_str!("rules.json");

/// Decimal number with optional comma thousands separators.
const NUMBER_PATTERN: &str = r"(\d{1,3}(?:,\d{3})+|\d+)(?:\.(\d+))?";

/// Attribute sources tried for image rules that do not list their own.
const DEFAULT_IMAGE_SOURCES: &[&str] = &[
    "src",
    "data-src",
    "data-lazy-src",
    "data-original",
    "data-zoom-image",
    "content",
    "srcset",
];

// ── Serialized form ──────────────────────────────────────────────────────────

/// Where a rule reads its candidate value from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AttrSource {
    /// Visible text content, whitespace collapsed.
    Text,
    /// First URL of a `srcset` attribute.
    Srcset,
    /// Any other named attribute, read verbatim.
    Attr(String),
}

impl From<String> for AttrSource {
    fn from(s: String) -> Self {
        match s.as_str() {
            "text" => AttrSource::Text,
            "srcset" => AttrSource::Srcset,
            _ => AttrSource::Attr(s),
        }
    }
}

impl From<AttrSource> for String {
    fn from(source: AttrSource) -> Self {
        match source {
            AttrSource::Text => "text".to_string(),
            AttrSource::Srcset => "srcset".to_string(),
            AttrSource::Attr(name) => name,
        }
    }
}

/// One selector rule as written in the rule file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSpec {
    pub selector: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<AttrSource>,
}

/// Hostname substitution applied before navigation in mobile mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MobileRewrite {
    pub from: String,
    pub to: String,
}

/// A group of sites sharing brand names and currency conventions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteFamily {
    pub name: String,
    pub hosts: Vec<String>,
    #[serde(default)]
    pub brands: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile: Option<MobileRewrite>,
}

impl SiteFamily {
    /// Exact host or any subdomain of one of the family's hosts.
    pub fn matches_host(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.hosts.iter().any(|h| {
            let h = h.to_ascii_lowercase();
            host == h || host.ends_with(&format!(".{h}"))
        })
    }
}

/// Currency marker found in price text and the prefix it maps to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencyToken {
    pub token: String,
    pub prefix: String,
}

/// Length window for fallback title candidates, in characters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TitleBounds {
    pub min_len: usize,
    pub max_len: usize,
}

impl Default for TitleBounds {
    fn default() -> Self {
        Self {
            min_len: 20,
            max_len: 200,
        }
    }
}

fn default_currency_prefix() -> String {
    "$".to_string()
}

fn default_price_floor() -> f64 {
    1.0
}

/// The full rule file schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleFile {
    pub title: Vec<RuleSpec>,
    pub price: Vec<RuleSpec>,
    pub image: Vec<RuleSpec>,
    #[serde(default)]
    pub families: Vec<SiteFamily>,
    #[serde(default)]
    pub currencies: Vec<CurrencyToken>,
    #[serde(default = "default_currency_prefix")]
    pub default_currency_prefix: String,
    #[serde(default)]
    pub title_markers: Vec<String>,
    #[serde(default)]
    pub challenge_markers: Vec<String>,
    /// Challenge vendor hosts and titles. Matched against the page URL and
    /// `<title>` only, since product pages embed these vendors' scripts.
    #[serde(default)]
    pub challenge_vendor_markers: Vec<String>,
    #[serde(default)]
    pub brand_suffixes: Vec<String>,
    #[serde(default)]
    pub struck_classes: Vec<String>,
    #[serde(default)]
    pub image_denylist: Vec<String>,
    #[serde(default)]
    pub image_allowlist: Vec<String>,
    #[serde(default)]
    pub image_extensions: Vec<String>,
    #[serde(default = "default_price_floor")]
    pub price_floor: f64,
    #[serde(default)]
    pub fallback_title: TitleBounds,
}

// ── Compiled form ────────────────────────────────────────────────────────────

/// A compiled selector rule bound to one field.
#[derive(Debug, Clone)]
pub struct SelectorRule {
    /// Position in the field's cascade (0 = highest priority).
    pub index: usize,
    pub field: FieldKind,
    pub selector: Selector,
    /// Selector source text, reported in diagnostics.
    pub source: String,
    pub attributes: Vec<AttrSource>,
}

/// Rule file plus compiled selectors and price patterns.
#[derive(Debug, Clone)]
pub struct RuleTable {
    file: RuleFile,
    title: Vec<SelectorRule>,
    price: Vec<SelectorRule>,
    image: Vec<SelectorRule>,
    number: Regex,
    currency_amount: Regex,
    image_deny: Option<Regex>,
}

impl RuleTable {
    /// The table embedded in the binary.
    pub fn builtin() -> ExtractResult<Self> {
        Self::from_json(BUILTIN_RULES)
    }

    /// Load a rule file from disk.
    pub fn from_path(path: impl AsRef<Path>) -> ExtractResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        tracing::info!("Loading rule table from {}", path.display());
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> ExtractResult<Self> {
        let file: RuleFile = serde_json::from_str(raw)?;
        Self::compile(file)
    }

    /// Compile every selector and the currency patterns.
    pub fn compile(file: RuleFile) -> ExtractResult<Self> {
        let title = compile_rules(FieldKind::Title, &file.title)?;
        let price = compile_rules(FieldKind::Price, &file.price)?;
        let image = compile_rules(FieldKind::Image, &file.image)?;

        let number = Regex::new(NUMBER_PATTERN)
            .map_err(|e| ExtractError::Rules(format!("number pattern: {e}")))?;

        // Longest tokens first so "US $" wins over "$".
        let mut tokens: Vec<&str> = file.currencies.iter().map(|c| c.token.as_str()).collect();
        tokens.sort_by(|a, b| b.len().cmp(&a.len()));
        let alternation = if tokens.is_empty() {
            regex::escape(&file.default_currency_prefix)
        } else {
            tokens
                .iter()
                .map(|t| regex::escape(t))
                .collect::<Vec<_>>()
                .join("|")
        };
        let currency_amount = Regex::new(&format!(r"(?:{alternation})\s*{NUMBER_PATTERN}"))
            .map_err(|e| ExtractError::Rules(format!("currency pattern: {e}")))?;

        let image_deny = compile_denylist(&file.image_denylist)?;

        Ok(Self {
            file,
            title,
            price,
            image,
            number,
            currency_amount,
            image_deny,
        })
    }

    /// Ordered cascade for a field.
    pub fn rules(&self, field: FieldKind) -> &[SelectorRule] {
        match field {
            FieldKind::Title => &self.title,
            FieldKind::Price => &self.price,
            FieldKind::Image => &self.image,
        }
    }

    pub fn file(&self) -> &RuleFile {
        &self.file
    }

    pub fn families(&self) -> &[SiteFamily] {
        &self.file.families
    }

    /// First site family whose hosts cover `host`.
    pub fn family_for(&self, host: &str) -> Option<&SiteFamily> {
        self.file.families.iter().find(|f| f.matches_host(host))
    }

    /// Prefix for the first currency token present in `text`.
    pub fn detect_currency(&self, text: &str) -> Option<&str> {
        let mut tokens: Vec<&CurrencyToken> = self.file.currencies.iter().collect();
        tokens.sort_by(|a, b| b.token.len().cmp(&a.token.len()));
        tokens
            .into_iter()
            .find(|c| text.contains(c.token.as_str()))
            .map(|c| c.prefix.as_str())
    }

    pub fn default_currency_prefix(&self) -> &str {
        &self.file.default_currency_prefix
    }

    /// Bare decimal number, captures: integer part, fraction digits.
    pub fn number_pattern(&self) -> &Regex {
        &self.number
    }

    /// Currency token followed by a number.
    pub fn currency_amount_pattern(&self) -> &Regex {
        &self.currency_amount
    }

    pub fn title_markers(&self) -> &[String] {
        &self.file.title_markers
    }

    pub fn challenge_markers(&self) -> &[String] {
        &self.file.challenge_markers
    }

    pub fn challenge_vendor_markers(&self) -> &[String] {
        &self.file.challenge_vendor_markers
    }

    pub fn brand_suffixes(&self) -> &[String] {
        &self.file.brand_suffixes
    }

    pub fn struck_classes(&self) -> &[String] {
        &self.file.struck_classes
    }

    pub fn image_denylist(&self) -> &[String] {
        &self.file.image_denylist
    }

    /// Denylist terms as whole words of an image path, `None` when the list
    /// is empty.
    pub fn image_denylist_pattern(&self) -> Option<&Regex> {
        self.image_deny.as_ref()
    }

    pub fn image_allowlist(&self) -> &[String] {
        &self.file.image_allowlist
    }

    pub fn image_extensions(&self) -> &[String] {
        &self.file.image_extensions
    }

    pub fn price_floor(&self) -> f64 {
        self.file.price_floor
    }

    pub fn fallback_title(&self) -> TitleBounds {
        self.file.fallback_title
    }

    /// Pretty JSON of the source rule file.
    pub fn to_json(&self) -> ExtractResult<String> {
        Ok(serde_json::to_string_pretty(&self.file)?)
    }
}

/// Default attribute preference for a field.
pub fn default_sources(field: FieldKind) -> Vec<AttrSource> {
    match field {
        FieldKind::Title | FieldKind::Price => vec![AttrSource::Text],
        FieldKind::Image => DEFAULT_IMAGE_SOURCES
            .iter()
            .map(|s| AttrSource::from(s.to_string()))
            .collect(),
    }
}

/// One case-insensitive alternation of denylist terms. A term only matches
/// where it is not glued to neighbouring letters (digits too, when the term
/// starts or ends with one), so `icon` rejects `cart-icon.svg` and `icons/`
/// but not `silicone-case.jpg`.
fn compile_denylist(terms: &[String]) -> ExtractResult<Option<Regex>> {
    let alternatives: Vec<String> = terms
        .iter()
        .map(|t| t.trim().trim_matches(|c: char| !c.is_ascii_alphanumeric()))
        .filter(|t| !t.is_empty())
        .map(|t| {
            let starts_digit = t.starts_with(|c: char| c.is_ascii_digit());
            let ends_digit = t.ends_with(|c: char| c.is_ascii_digit());
            let left = if starts_digit { "[^a-z0-9]" } else { "[^a-z]" };
            let right = if ends_digit { "[^a-z0-9]" } else { "[^a-z]" };
            let plural = if ends_digit { "" } else { "s?" };
            format!("(?:^|{left}){}{plural}(?:{right}|$)", regex::escape(t))
        })
        .collect();
    if alternatives.is_empty() {
        return Ok(None);
    }
    Regex::new(&format!("(?i){}", alternatives.join("|")))
        .map(Some)
        .map_err(|e| ExtractError::Rules(format!("image denylist: {e}")))
}

fn compile_rules(field: FieldKind, specs: &[RuleSpec]) -> ExtractResult<Vec<SelectorRule>> {
    specs
        .iter()
        .enumerate()
        .map(|(index, spec)| {
            let selector = Selector::parse(&spec.selector).map_err(|e| {
                ExtractError::Rules(format!(
                    "{field} rule {index} has an invalid selector {:?}: {e:?}",
                    spec.selector
                ))
            })?;
            let attributes = if spec.attributes.is_empty() {
                default_sources(field)
            } else {
                spec.attributes.clone()
            };
            Ok(SelectorRule {
                index,
                field,
                selector,
                source: spec.selector.clone(),
                attributes,
            })
        })
        .collect()
}
