//! Product Lens server: headless-browser product extraction behind a JSON API.

pub mod browser;
pub mod config;
pub mod renderer;
pub mod rest;
pub mod service;

pub use browser::SharedBrowser;
pub use config::{ConfigArgs, ServerConfig};
pub use renderer::{NavigationResult, RenderContext, Renderer};
pub use service::ProductService;
