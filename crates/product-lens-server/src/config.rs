//! Configuration loading and resolution.
//!
//! Every setting resolves as CLI flag > `PRODUCT_LENS_*` environment variable
//! > built-in default.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use product_lens::{RetryPolicy, RuleTable};

pub const DEFAULT_ADDR: &str = "127.0.0.1:3000";

/// Desktop Chrome on Windows.
pub const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Mobile Safari on iPhone, sent when a mobile host rewrite is active.
pub const MOBILE_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";

const ENV_PREFIX: &str = "PRODUCT_LENS_";

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub addr: String,
    /// Wall-clock budget for one whole extraction request.
    pub request_timeout: Duration,
    pub navigation_timeout: Duration,
    pub max_attempts: u32,
    pub retry_delay: Duration,
    /// Overrides both built-in user agents when set.
    pub user_agent: Option<String>,
    /// Rewrite hosts to their mobile variant when the site family has one.
    pub mobile: bool,
    pub rules_path: Option<PathBuf>,
    /// Return a title-less result instead of `NotFound` once retries run out.
    pub allow_partial: bool,
    /// Attach rule provenance and rejected candidates to responses.
    pub diagnostics: bool,
    pub chromium_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            request_timeout: Duration::from_millis(20_000),
            navigation_timeout: Duration::from_millis(10_000),
            max_attempts: 3,
            retry_delay: Duration::from_millis(1_000),
            user_agent: None,
            mobile: false,
            rules_path: None,
            allow_partial: false,
            diagnostics: false,
            chromium_path: None,
        }
    }
}

/// Command-line overrides. Unset flags leave the environment/default value.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Listen address (host:port).
    #[arg(long)]
    pub addr: Option<String>,

    /// Overall request timeout in milliseconds.
    #[arg(long)]
    pub request_timeout_ms: Option<u64>,

    /// Navigation timeout in milliseconds.
    #[arg(long)]
    pub navigation_timeout_ms: Option<u64>,

    /// Extraction passes per request, including the first.
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Delay between extraction passes in milliseconds.
    #[arg(long)]
    pub retry_delay_ms: Option<u64>,

    /// User agent sent for every page.
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Rewrite hosts to mobile variants where the rule table defines one.
    #[arg(long)]
    pub mobile: bool,

    /// Path to a JSON rule file replacing the built-in table.
    #[arg(long)]
    pub rules: Option<PathBuf>,

    /// Return results without a title instead of failing with not_found.
    #[arg(long)]
    pub allow_partial: bool,

    /// Include extraction diagnostics in responses.
    #[arg(long)]
    pub diagnostics: bool,

    /// Path to the Chromium executable.
    #[arg(long)]
    pub chromium: Option<PathBuf>,
}

impl ServerConfig {
    /// Defaults overlaid with `PRODUCT_LENS_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}"))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = Self::default();

        if let Some(addr) = var("ADDR") {
            config.addr = addr;
        }
        if let Some(ms) = parse_var::<u64>("REQUEST_TIMEOUT_MS", var("REQUEST_TIMEOUT_MS"))? {
            config.request_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>("NAVIGATION_TIMEOUT_MS", var("NAVIGATION_TIMEOUT_MS"))? {
            config.navigation_timeout = Duration::from_millis(ms);
        }
        if let Some(n) = parse_var::<u32>("MAX_ATTEMPTS", var("MAX_ATTEMPTS"))? {
            config.max_attempts = n;
        }
        if let Some(ms) = parse_var::<u64>("RETRY_DELAY_MS", var("RETRY_DELAY_MS"))? {
            config.retry_delay = Duration::from_millis(ms);
        }
        config.user_agent = var("USER_AGENT");
        config.mobile = parse_flag("MOBILE", var("MOBILE"))?;
        config.rules_path = var("RULES").map(PathBuf::from);
        config.allow_partial = parse_flag("ALLOW_PARTIAL", var("ALLOW_PARTIAL"))?;
        config.diagnostics = parse_flag("DIAGNOSTICS", var("DIAGNOSTICS"))?;
        config.chromium_path = var("CHROMIUM_PATH").map(PathBuf::from);

        Ok(config)
    }

    /// Apply command-line overrides on top.
    pub fn merge(mut self, args: &ConfigArgs) -> Self {
        if let Some(addr) = &args.addr {
            self.addr = addr.clone();
        }
        if let Some(ms) = args.request_timeout_ms {
            self.request_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = args.navigation_timeout_ms {
            self.navigation_timeout = Duration::from_millis(ms);
        }
        if let Some(n) = args.max_attempts {
            self.max_attempts = n;
        }
        if let Some(ms) = args.retry_delay_ms {
            self.retry_delay = Duration::from_millis(ms);
        }
        if let Some(ua) = &args.user_agent {
            self.user_agent = Some(ua.clone());
        }
        if let Some(path) = &args.rules {
            self.rules_path = Some(path.clone());
        }
        if let Some(path) = &args.chromium {
            self.chromium_path = Some(path.clone());
        }
        self.mobile |= args.mobile;
        self.allow_partial |= args.allow_partial;
        self.diagnostics |= args.diagnostics;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            delay: self.retry_delay,
        }
    }

    /// The configured rule file, or the built-in table.
    pub fn load_rules(&self) -> Result<RuleTable> {
        match &self.rules_path {
            Some(path) => RuleTable::from_path(path)
                .with_context(|| format!("failed to load rule table {}", path.display())),
            None => RuleTable::builtin().context("built-in rule table is invalid"),
        }
    }

    /// User agent for a page, depending on whether its URL was rewritten to
    /// a mobile host.
    pub fn user_agent_for(&self, mobile_rewrite: bool) -> &str {
        match &self.user_agent {
            Some(ua) => ua,
            None if mobile_rewrite => MOBILE_USER_AGENT,
            None => DESKTOP_USER_AGENT,
        }
    }
}

fn parse_var<T>(name: &str, value: Option<String>) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .map(|v| {
            v.parse::<T>()
                .with_context(|| format!("invalid {ENV_PREFIX}{name}: {v:?}"))
        })
        .transpose()
}

fn parse_flag(name: &str, value: Option<String>) -> Result<bool> {
    match value.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(false),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => anyhow::bail!("invalid {ENV_PREFIX}{name}: {other:?} (expected true/false)"),
    }
}
