//! Request orchestration: validate, render, extract, clean up.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::time::error::Elapsed;

use product_lens::{
    DocumentSource, ExtractError, ExtractResult, ExtractionRequest, Extractor, ProductResult,
    RetryController, Snapshot,
};

use crate::browser::SharedBrowser;
use crate::config::ServerConfig;
use crate::renderer::RenderContext;

/// Upper bound on closing a page once extraction is over.
const PAGE_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct ProductService {
    config: ServerConfig,
    extractor: Extractor,
    browser: Arc<SharedBrowser>,
}

impl ProductService {
    pub fn new(config: ServerConfig, extractor: Extractor, browser: Arc<SharedBrowser>) -> Self {
        Self {
            config,
            extractor,
            browser,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn browser(&self) -> &SharedBrowser {
        &self.browser
    }

    /// Extract title, price, and image for one product link.
    ///
    /// The whole operation is bounded by the configured request timeout. The
    /// page is closed on every path, timeouts included. On upstream failure
    /// the shared browser is reset.
    pub async fn extract_product(&self, link: &str) -> ExtractResult<ProductResult> {
        let request = ExtractionRequest::parse(link)?;
        let started = Instant::now();
        tracing::info!(url = %request.as_str(), "Extracting product");

        let outcome = self.render_and_extract(&request).await;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            Ok(result) => tracing::info!(
                url = %request.as_str(),
                attempts = result.diagnostics.attempts,
                elapsed_ms,
                "Extraction complete"
            ),
            Err(e) => {
                tracing::warn!(url = %request.as_str(), kind = e.kind(), elapsed_ms, "Extraction failed: {e}");
                if e.resets_browser() {
                    self.browser.invalidate().await;
                }
            }
        }
        outcome
    }

    async fn render_and_extract(&self, request: &ExtractionRequest) -> ExtractResult<ProductResult> {
        let timeout = self.config.request_timeout;
        let deadline = tokio::time::Instant::now() + timeout;
        let timed_out = || ExtractError::UpstreamTimeout {
            timeout_ms: millis(timeout),
        };

        let target = if self.config.mobile {
            request.to_mobile(self.extractor.rules())
        } else {
            request.clone()
        };
        let mobile = target.is_rewritten_from(request);

        let mut page = match tokio::time::timeout_at(deadline, self.open_page()).await {
            Ok(page) => page?,
            Err(_) => return Err(timed_out()),
        };

        // The timed future only borrows the page, so it can be closed after
        // the deadline fires.
        let result = match tokio::time::timeout_at(
            deadline,
            self.extract_from_page(page.as_mut(), &target, mobile),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(timed_out()),
        };

        match tokio::time::timeout(PAGE_CLOSE_TIMEOUT, page.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!("Failed to close page: {e:#}"),
            Err(_) => tracing::debug!("Timed out closing page"),
        }
        result
    }

    async fn open_page(&self) -> ExtractResult<Box<dyn RenderContext>> {
        let renderer = self.browser.get().await.map_err(upstream)?;
        renderer.new_context().await.map_err(upstream)
    }

    async fn extract_from_page(
        &self,
        page: &mut dyn RenderContext,
        target: &ExtractionRequest,
        mobile: bool,
    ) -> ExtractResult<ProductResult> {
        page.set_user_agent(self.config.user_agent_for(mobile))
            .await
            .map_err(upstream)?;

        let nav_timeout = self.config.navigation_timeout;
        let nav = page
            .navigate(target.as_str(), millis(nav_timeout))
            .await
            .map_err(|e| {
                if e.downcast_ref::<Elapsed>().is_some() {
                    ExtractError::UpstreamTimeout {
                        timeout_ms: millis(nav_timeout),
                    }
                } else {
                    upstream(e)
                }
            })?;
        tracing::debug!(final_url = %nav.final_url, load_time_ms = nav.load_time_ms, "Page loaded");

        let mut source = PageSource { page };
        let outcome = RetryController::new(self.config.retry_policy())
            .run(&self.extractor, &mut source, target.url())
            .await?;
        outcome.into_result(self.config.allow_partial)
    }
}

/// Snapshots a live browser page.
struct PageSource<'a> {
    page: &'a mut dyn RenderContext,
}

#[async_trait]
impl DocumentSource for PageSource<'_> {
    async fn snapshot(&mut self) -> ExtractResult<Snapshot> {
        let html = self.page.get_html().await.map_err(upstream)?;
        let url = self.page.get_url().await.map_err(upstream)?;
        Ok(Snapshot { url, html })
    }
}

fn upstream(e: anyhow::Error) -> ExtractError {
    ExtractError::Upstream(format!("{e:#}"))
}

fn millis(d: Duration) -> u64 {
    d.as_millis().try_into().unwrap_or(u64::MAX)
}
