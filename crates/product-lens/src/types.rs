//! Core data types for extraction results.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Maximum number of rejected candidates kept per field in diagnostics.
const MAX_REJECTED: usize = 8;

/// Maximum characters kept from a single rejected candidate.
const MAX_REJECTED_CHARS: usize = 120;

/// One of the three extracted product attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Title,
    Price,
    Image,
}

impl FieldKind {
    pub const ALL: [FieldKind; 3] = [FieldKind::Title, FieldKind::Price, FieldKind::Image];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Title => "title",
            FieldKind::Price => "price",
            FieldKind::Image => "image",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a field value came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchSource {
    /// A targeted selector rule, by its position in the field's cascade.
    Rule { index: usize, selector: String },
    /// The broad last-resort document scan.
    Fallback,
}

/// Outcome for a single field. There is no "uncertain" state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FieldResult {
    Found { value: String, source: MatchSource },
    NotFound,
}

impl FieldResult {
    pub fn value(&self) -> Option<&str> {
        match self {
            FieldResult::Found { value, .. } => Some(value),
            FieldResult::NotFound => None,
        }
    }

    pub fn source(&self) -> Option<&MatchSource> {
        match self {
            FieldResult::Found { source, .. } => Some(source),
            FieldResult::NotFound => None,
        }
    }

    /// Cascade rule index, if the value came from a targeted rule.
    pub fn rule_index(&self) -> Option<usize> {
        match self.source() {
            Some(MatchSource::Rule { index, .. }) => Some(*index),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, FieldResult::Found { .. })
    }
}

/// Raw candidates that were looked at and rejected for one field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldTrace {
    pub rejected: Vec<String>,
}

impl FieldTrace {
    /// Remember a rejected candidate, bounded in count and length.
    pub fn record_rejected(&mut self, raw: &str) {
        if self.rejected.len() >= MAX_REJECTED {
            return;
        }
        let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        let clipped: String = collapsed.chars().take(MAX_REJECTED_CHARS).collect();
        if !clipped.is_empty() && !self.rejected.contains(&clipped) {
            self.rejected.push(clipped);
        }
    }
}

/// Tuning information attached to every extraction pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Site family matched from the page host, if any.
    pub family: Option<String>,
    /// Number of extraction passes taken (set by the retry controller).
    pub attempts: u32,
    pub title: FieldTrace,
    pub price: FieldTrace,
    pub image: FieldTrace,
}

impl Diagnostics {
    pub fn trace_mut(&mut self, field: FieldKind) -> &mut FieldTrace {
        match field {
            FieldKind::Title => &mut self.title,
            FieldKind::Price => &mut self.price,
            FieldKind::Image => &mut self.image,
        }
    }
}

/// Aggregate result of one extraction pass over a document snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductResult {
    pub title: FieldResult,
    pub price: FieldResult,
    pub image: FieldResult,
    pub diagnostics: Diagnostics,
}

impl ProductResult {
    pub fn field(&self, kind: FieldKind) -> &FieldResult {
        match kind {
            FieldKind::Title => &self.title,
            FieldKind::Price => &self.price,
            FieldKind::Image => &self.image,
        }
    }

    /// Title is the only mandatory field.
    pub fn has_title(&self) -> bool {
        self.title.is_found()
    }

    /// Flatten into the caller-facing response shape.
    pub fn summary(&self, with_diagnostics: bool) -> ProductSummary {
        ProductSummary {
            title: self.title.value().map(String::from),
            image: self.image.value().map(String::from),
            price: self.price.value().map(String::from),
            diagnostics: with_diagnostics.then(|| SummaryDiagnostics {
                sources: FieldSources {
                    title: self.title.source().cloned(),
                    price: self.price.source().cloned(),
                    image: self.image.source().cloned(),
                },
                trace: self.diagnostics.clone(),
            }),
        }
    }
}

/// `{ title, image, price }` with optional diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub title: Option<String>,
    pub image: Option<String>,
    pub price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<SummaryDiagnostics>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryDiagnostics {
    pub sources: FieldSources,
    #[serde(flatten)]
    pub trace: Diagnostics,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSources {
    pub title: Option<MatchSource>,
    pub price: Option<MatchSource>,
    pub image: Option<MatchSource>,
}

/// Errors that can occur while extracting a product.
#[derive(thiserror::Error, Debug)]
pub enum ExtractError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Product title not found after {attempts} attempt(s)")]
    NotFound {
        attempts: u32,
        partial: Box<ProductResult>,
    },

    #[error("Challenge page suspected at {url}")]
    ChallengeSuspected { url: String },

    #[error("Page not usable within {timeout_ms}ms")]
    UpstreamTimeout { timeout_ms: u64 },

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Rule table error: {0}")]
    Rules(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ExtractError {
    /// Stable machine-readable name for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractError::InvalidInput(_) => "invalid_input",
            ExtractError::NotFound { .. } => "not_found",
            ExtractError::ChallengeSuspected { .. } => "challenge_suspected",
            ExtractError::UpstreamTimeout { .. } => "upstream_timeout",
            ExtractError::Upstream(_) => "upstream",
            ExtractError::Rules(_) | ExtractError::Io(_) | ExtractError::Json(_) => "internal",
        }
    }

    /// Whether the browser that served the request should be discarded.
    pub fn resets_browser(&self) -> bool {
        matches!(
            self,
            ExtractError::Upstream(_)
                | ExtractError::UpstreamTimeout { .. }
                | ExtractError::ChallengeSuspected { .. }
        )
    }
}

/// Convenience result type.
pub type ExtractResult<T> = Result<T, ExtractError>;
