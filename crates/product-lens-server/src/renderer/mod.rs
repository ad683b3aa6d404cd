//! Renderer abstraction for browser-based page rendering.
//!
//! Defines the `Renderer` and `RenderContext` traits that abstract over
//! the browser engine (currently Chromium via chromiumoxide).

pub mod chromium;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

/// A browser engine that can open pages.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Open a new blank page (tab).
    async fn new_context(&self) -> Result<Box<dyn RenderContext>>;
    /// Shut down the browser engine.
    async fn shutdown(&self) -> Result<()>;
    /// Number of currently open pages.
    fn active_contexts(&self) -> usize;
}

/// A single browser page.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Override the user agent for subsequent navigations.
    async fn set_user_agent(&mut self, user_agent: &str) -> Result<()>;
    /// Navigate to a URL, waiting at most `timeout_ms` for the document.
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult>;
    /// Serialized markup of the live document.
    async fn get_html(&self) -> Result<String>;
    /// Current URL of the page.
    async fn get_url(&self) -> Result<String>;
    /// Close this page.
    async fn close(self: Box<Self>) -> Result<()>;
}
