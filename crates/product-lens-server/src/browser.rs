//! Lazily launched, shared browser handle.
//!
//! One renderer serves every request. It is launched on first use, reused
//! afterwards, and discarded after a failed request so the next request
//! starts from a fresh process.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::Mutex;

use crate::renderer::chromium::ChromiumRenderer;
use crate::renderer::Renderer;

/// Produces a new renderer on demand.
pub type Launcher = Arc<dyn Fn() -> BoxFuture<'static, Result<Arc<dyn Renderer>>> + Send + Sync>;

pub struct SharedBrowser {
    launcher: Launcher,
    slot: Mutex<Option<Arc<dyn Renderer>>>,
}

impl SharedBrowser {
    pub fn new<F>(launcher: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, Result<Arc<dyn Renderer>>> + Send + Sync + 'static,
    {
        Self {
            launcher: Arc::new(launcher),
            slot: Mutex::new(None),
        }
    }

    /// Headless Chromium, resolved from `executable` or the usual locations.
    pub fn chromium(executable: Option<PathBuf>) -> Self {
        Self::new(move || {
            let executable = executable.clone();
            async move {
                let renderer = ChromiumRenderer::launch(executable).await?;
                Ok::<_, anyhow::Error>(Arc::new(renderer) as Arc<dyn Renderer>)
            }
            .boxed()
        })
    }

    /// Always hands out `renderer`, also after invalidation.
    pub fn with_renderer(renderer: Arc<dyn Renderer>) -> Self {
        Self::new(move || {
            let renderer = Arc::clone(&renderer);
            async move { Ok::<_, anyhow::Error>(renderer) }.boxed()
        })
    }

    /// The running renderer, launching one if needed. Concurrent callers wait
    /// for a single launch.
    pub async fn get(&self) -> Result<Arc<dyn Renderer>> {
        let mut slot = self.slot.lock().await;
        if let Some(renderer) = slot.as_ref() {
            return Ok(Arc::clone(renderer));
        }
        tracing::info!("Launching browser");
        let renderer = (self.launcher)().await?;
        *slot = Some(Arc::clone(&renderer));
        Ok(renderer)
    }

    /// Drop the current renderer; the next [`get`](Self::get) relaunches.
    pub async fn invalidate(&self) {
        let previous = self.slot.lock().await.take();
        if let Some(renderer) = previous {
            tracing::warn!("Resetting shared browser");
            if let Err(e) = renderer.shutdown().await {
                tracing::debug!("Browser shutdown failed: {e:#}");
            }
        }
    }

    pub async fn is_running(&self) -> bool {
        self.slot.lock().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::RenderContext;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Idle;

    #[async_trait]
    impl Renderer for Idle {
        async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
            anyhow::bail!("no pages")
        }
        async fn shutdown(&self) -> Result<()> {
            Ok(())
        }
        fn active_contexts(&self) -> usize {
            0
        }
    }

    fn counting() -> (SharedBrowser, Arc<AtomicUsize>) {
        let launches = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&launches);
        let browser = SharedBrowser::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, anyhow::Error>(Arc::new(Idle) as Arc<dyn Renderer>) }.boxed()
        });
        (browser, launches)
    }

    #[tokio::test]
    async fn test_lazy_launch_and_reuse() {
        let (browser, launches) = counting();
        assert!(!browser.is_running().await);
        assert_eq!(launches.load(Ordering::SeqCst), 0);

        browser.get().await.unwrap();
        browser.get().await.unwrap();
        assert!(browser.is_running().await);
        assert_eq!(launches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_relaunches() {
        let (browser, launches) = counting();
        browser.get().await.unwrap();
        browser.invalidate().await;
        assert!(!browser.is_running().await);
        browser.get().await.unwrap();
        assert_eq!(launches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_launch_failure_leaves_slot_empty() {
        let browser = SharedBrowser::new(|| {
            async { Err::<Arc<dyn Renderer>, _>(anyhow::anyhow!("no chromium")) }.boxed()
        });
        assert!(browser.get().await.is_err());
        assert!(!browser.is_running().await);
    }
}
