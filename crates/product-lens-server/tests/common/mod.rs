//! In-memory renderer shared by the server integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use product_lens::{Extractor, RuleTable};
use product_lens_server::{
    NavigationResult, ProductService, RenderContext, Renderer, ServerConfig, SharedBrowser,
};

pub const PRODUCT_URL: &str = "https://example.com/item/123";

pub const PRODUCT_PAGE: &str = r#"<!doctype html>
<html>
  <body>
    <h1 data-pl="product-title">Wireless Mouse</h1>
    <span class="price">$19.99</span>
    <img src="https://cdn.example.com/img/mouse.jpg">
  </body>
</html>"#;

pub const BOILERPLATE_PAGE: &str = "<html><body><h1>Example Site</h1></body></html>";

/// What navigating to a URL does.
#[derive(Clone)]
pub enum FakePage {
    Html { final_url: String, html: String },
    Fail(&'static str),
    NavigationTimeout,
    Hang,
}

impl FakePage {
    pub fn html(url: &str, html: &str) -> Self {
        FakePage::Html {
            final_url: url.to_string(),
            html: html.to_string(),
        }
    }
}

#[derive(Default)]
pub struct FakeRenderer {
    pages: Arc<HashMap<String, FakePage>>,
    pub user_agents: Arc<Mutex<Vec<String>>>,
    pub opened: Arc<AtomicUsize>,
    pub closed: Arc<AtomicUsize>,
    pub shutdowns: Arc<AtomicUsize>,
}

impl FakeRenderer {
    pub fn new(pages: impl IntoIterator<Item = (&'static str, FakePage)>) -> Self {
        Self {
            pages: Arc::new(
                pages
                    .into_iter()
                    .map(|(url, page)| (url.to_string(), page))
                    .collect(),
            ),
            ..Self::default()
        }
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeContext {
            pages: Arc::clone(&self.pages),
            user_agents: Arc::clone(&self.user_agents),
            closed: Arc::clone(&self.closed),
            current: None,
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.opened.load(Ordering::SeqCst) - self.closed.load(Ordering::SeqCst)
    }
}

struct FakeContext {
    pages: Arc<HashMap<String, FakePage>>,
    user_agents: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicUsize>,
    current: Option<(String, String)>,
}

#[async_trait]
impl RenderContext for FakeContext {
    async fn set_user_agent(&mut self, user_agent: &str) -> Result<()> {
        self.user_agents.lock().unwrap().push(user_agent.to_string());
        Ok(())
    }

    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult> {
        match self.pages.get(url).cloned() {
            Some(FakePage::Html { final_url, html }) => {
                self.current = Some((final_url.clone(), html));
                Ok(NavigationResult {
                    final_url,
                    load_time_ms: 1,
                })
            }
            Some(FakePage::Fail(reason)) => anyhow::bail!("navigation failed: {reason}"),
            Some(FakePage::NavigationTimeout) => {
                let elapsed = tokio::time::timeout(Duration::ZERO, std::future::pending::<()>())
                    .await
                    .unwrap_err();
                Err(anyhow::Error::new(elapsed)
                    .context(format!("navigation timed out after {timeout_ms}ms")))
            }
            Some(FakePage::Hang) => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                anyhow::bail!("still loading")
            }
            None => anyhow::bail!("net::ERR_NAME_NOT_RESOLVED at {url}"),
        }
    }

    async fn get_html(&self) -> Result<String> {
        Ok(self.current.as_ref().map(|(_, html)| html.clone()).unwrap_or_default())
    }

    async fn get_url(&self) -> Result<String> {
        Ok(self.current.as_ref().map(|(url, _)| url.clone()).unwrap_or_default())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Test config: no retry delay, short timeouts.
pub fn fast_config() -> ServerConfig {
    ServerConfig {
        retry_delay: Duration::ZERO,
        request_timeout: Duration::from_millis(2_000),
        ..ServerConfig::default()
    }
}

pub fn service(renderer: Arc<FakeRenderer>, config: ServerConfig) -> Arc<ProductService> {
    let extractor = Extractor::new(Arc::new(RuleTable::builtin().unwrap()));
    let browser = Arc::new(SharedBrowser::with_renderer(renderer));
    Arc::new(ProductService::new(config, extractor, browser))
}
