//! Product Lens: title, price, and image extraction from rendered e-commerce product pages.

pub mod cascade;
pub mod challenge;
pub(crate) mod dom;
pub mod extractor;
pub mod fallback;
pub mod image;
pub mod page;
pub mod price;
pub mod request;
pub mod retry;
pub mod rules;
pub mod title;
pub mod types;

pub use cascade::{run_cascade, CascadeMatch};
pub use challenge::{ChallengeDetector, MarkerDetector};
pub use extractor::Extractor;
pub use price::{normalize_price, NormalizedPrice};
pub use request::ExtractionRequest;
pub use retry::{
    DocumentSource, RetryController, RetryOutcome, RetryPolicy, RetryState, Snapshot,
    StaticDocument,
};
pub use rules::{RuleFile, RuleTable, SelectorRule, SiteFamily};
pub use types::*;
