//! Product Lens entry point.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use url::Url;

use product_lens::{ExtractError, Extractor};
use product_lens_server::{ConfigArgs, ProductService, ServerConfig, SharedBrowser};

#[derive(Parser)]
#[command(
    name = "product-lens",
    about = "Extract title, price, and image from e-commerce product pages",
    version
)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API (default).
    Serve,

    /// Extract one product page through the browser and print JSON.
    Extract {
        /// Product page URL.
        url: String,
    },

    /// Run extraction over a saved HTML file, without a browser.
    ///
    /// Prints the result with diagnostics, for tuning rule tables.
    Inspect {
        /// Saved HTML document.
        file: PathBuf,

        /// URL the document was loaded from.
        #[arg(long)]
        url: String,
    },

    /// Print the effective rule table as JSON.
    Rules,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   product-lens completions bash > ~/.local/share/bash-completion/completions/product-lens
    ///   product-lens completions zsh > ~/.zfunc/_product-lens
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let config = ServerConfig::from_env()?.merge(&cli.config);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let addr = config.addr.clone();
            let service = build_service(config)?;
            tracing::info!("Product Lens v{}", env!("CARGO_PKG_VERSION"));
            product_lens_server::rest::start(&addr, service).await?;
        }

        Commands::Extract { url } => {
            let with_diagnostics = config.diagnostics;
            let service = build_service(config)?;
            match service.extract_product(&url).await {
                Ok(result) => {
                    let summary = result.summary(with_diagnostics);
                    println!("{}", serde_json::to_string_pretty(&summary)?);
                }
                Err(e) => {
                    print_error(&e)?;
                    std::process::exit(1);
                }
            }
        }

        Commands::Inspect { file, url } => {
            let page_url = Url::parse(&url).with_context(|| format!("invalid --url {url:?}"))?;
            let html = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let extractor = Extractor::new(Arc::new(config.load_rules()?));
            if extractor.is_challenge(page_url.as_str(), &html) {
                tracing::warn!("Document looks like a challenge page");
            }
            let result = extractor.extract(&html, &page_url);
            println!("{}", serde_json::to_string_pretty(&result.summary(true))?);
        }

        Commands::Rules => {
            let rules = config.load_rules()?;
            println!("{}", rules.to_json()?);
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "product-lens", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn build_service(config: ServerConfig) -> anyhow::Result<Arc<ProductService>> {
    let rules = Arc::new(config.load_rules()?);
    let browser = Arc::new(SharedBrowser::chromium(config.chromium_path.clone()));
    Ok(Arc::new(ProductService::new(
        config,
        Extractor::new(rules),
        browser,
    )))
}

fn print_error(err: &ExtractError) -> anyhow::Result<()> {
    let body = serde_json::json!({
        "message": "Error fetching product data",
        "error": err.to_string(),
        "kind": err.kind(),
    });
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}
