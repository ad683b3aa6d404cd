//! Retry controller.
//!
//! Dynamic pages often render the title late. The controller takes a fresh
//! snapshot, extracts, and while no title has been found waits a fixed delay
//! and tries again, up to a bounded number of passes:
//!
//! ```text
//! Pending(n) --title found--------------> Found
//! Pending(n) --no title, n > 1--wait----> Pending(n - 1)
//! Pending(1) --no title-----------------> Exhausted
//! ```
//!
//! Only the first snapshot is checked for challenge markers; later passes
//! observe the same navigation.

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::extractor::Extractor;
use crate::types::{ExtractError, ExtractResult, ProductResult};

/// Serialized markup and current URL of a loaded document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub url: String,
    pub html: String,
}

/// Something that can be snapshotted repeatedly, typically a live page.
#[async_trait]
pub trait DocumentSource: Send {
    async fn snapshot(&mut self) -> ExtractResult<Snapshot>;
}

/// A fixed document. Every snapshot is identical.
#[derive(Debug, Clone)]
pub struct StaticDocument {
    snapshot: Snapshot,
}

impl StaticDocument {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            snapshot: Snapshot {
                url: url.into(),
                html: html.into(),
            },
        }
    }
}

#[async_trait]
impl DocumentSource for StaticDocument {
    async fn snapshot(&mut self) -> ExtractResult<Snapshot> {
        Ok(self.snapshot.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total extraction passes, including the first. Never less than one.
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Pending { remaining: u32 },
    Found,
    Exhausted,
}

#[derive(Debug, Clone)]
pub struct RetryController {
    policy: RetryPolicy,
    state: RetryState,
    attempts: u32,
}

impl RetryController {
    pub fn new(policy: RetryPolicy) -> Self {
        let max_attempts = policy.max_attempts.max(1);
        Self {
            policy: RetryPolicy {
                max_attempts,
                ..policy
            },
            state: RetryState::Pending {
                remaining: max_attempts,
            },
            attempts: 0,
        }
    }

    pub fn state(&self) -> RetryState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Feed one extraction pass into the state machine. Terminal states are
    /// sticky.
    pub fn observe(&mut self, result: &ProductResult) -> RetryState {
        if let RetryState::Pending { remaining } = self.state {
            self.attempts += 1;
            self.state = if result.has_title() {
                RetryState::Found
            } else if remaining > 1 {
                RetryState::Pending {
                    remaining: remaining - 1,
                }
            } else {
                RetryState::Exhausted
            };
        }
        self.state
    }

    /// Drive extraction against `source` until a title is found or the
    /// attempt budget is spent.
    ///
    /// `fallback_url` is used when a snapshot reports a URL that does not
    /// parse.
    pub async fn run<S>(
        mut self,
        extractor: &Extractor,
        source: &mut S,
        fallback_url: &Url,
    ) -> ExtractResult<RetryOutcome>
    where
        S: DocumentSource + ?Sized,
    {
        loop {
            let snapshot = source.snapshot().await?;

            if self.attempts == 0 && extractor.is_challenge(&snapshot.url, &snapshot.html) {
                tracing::warn!("Challenge page detected at {}", snapshot.url);
                return Err(ExtractError::ChallengeSuspected { url: snapshot.url });
            }

            let page_url = Url::parse(&snapshot.url).unwrap_or_else(|_| fallback_url.clone());
            let mut result = extractor.extract(&snapshot.html, &page_url);

            let state = self.observe(&result);
            result.diagnostics.attempts = self.attempts;
            tracing::debug!(attempt = self.attempts, ?state, "Extraction attempt");

            match state {
                RetryState::Pending { .. } => {
                    if !self.policy.delay.is_zero() {
                        tokio::time::sleep(self.policy.delay).await;
                    }
                }
                RetryState::Found | RetryState::Exhausted => {
                    return Ok(RetryOutcome {
                        result,
                        state,
                        attempts: self.attempts,
                    });
                }
            }
        }
    }
}

/// Final result of a controller run.
#[derive(Debug, Clone)]
pub struct RetryOutcome {
    pub result: ProductResult,
    pub state: RetryState,
    pub attempts: u32,
}

impl RetryOutcome {
    /// `Exhausted` becomes `NotFound` unless partial results are allowed.
    pub fn into_result(self, allow_partial: bool) -> ExtractResult<ProductResult> {
        match self.state {
            RetryState::Exhausted if !allow_partial => Err(ExtractError::NotFound {
                attempts: self.attempts,
                partial: Box::new(self.result),
            }),
            _ => Ok(self.result),
        }
    }
}
