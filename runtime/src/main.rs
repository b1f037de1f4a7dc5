use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use docview_runtime::cli;
use docview_runtime::config::EngineConfig;
use docview_runtime::renderer::chromium::ChromiumRenderer;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "docview",
    about = "Docview: extract text and markdown from iframed document viewers",
    version,
    after_help = "Run 'docview <command> --help' for details on each command."
)]
struct Cli {
    /// Config file (defaults to ~/.docview/config.json when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Show the browser window
    #[arg(long, global = true)]
    headful: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find the viewer URLs of a board page's attachments
    Resolve {
        /// Board page URL
        page_url: String,
        /// Base for relative candidates (defaults to the page origin)
        #[arg(long)]
        base_url: Option<String>,
    },
    /// Extract text from viewer URLs in one browser session
    Extract {
        /// Viewer URLs, processed in order
        #[arg(required = true)]
        urls: Vec<String>,
        /// Use the configured retry policy per URL
        #[arg(long)]
        retry: bool,
    },
    /// Resolve a page's previews and print the populated document as JSON
    Document {
        /// Board page URL
        page_url: String,
        /// Document title
        #[arg(long)]
        title: Option<String>,
    },
    /// Render article pages to fit and raw markdown
    Markdown {
        /// Article URLs, processed in order
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Check environment and diagnose issues
    Doctor,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = EngineConfig::load(cli.config.as_deref()).context("failed to load config")?;
    if cli.headful {
        config.browser.headless = false;
        config.markdown.browser_headless = false;
    }
    Ok(config)
}

async fn dispatch(cli: Cli) -> Result<()> {
    let renderer = ChromiumRenderer::new();
    match &cli.command {
        Commands::Resolve { page_url, base_url } => {
            let config = load_config(&cli)?;
            cli::resolve_cmd::run(&renderer, &config, page_url, base_url.as_deref()).await
        }
        Commands::Extract { urls, retry } => {
            let config = load_config(&cli)?;
            cli::extract_cmd::run(&renderer, &config, urls, *retry).await
        }
        Commands::Document { page_url, title } => {
            let config = load_config(&cli)?;
            cli::document_cmd::run(&renderer, &config, page_url, title.as_deref()).await
        }
        Commands::Markdown { urls } => {
            let config = load_config(&cli)?;
            cli::markdown_cmd::run(&renderer, &config, urls).await
        }
        Commands::Doctor => {
            let config = load_config(&cli).map_err(|e| format!("{e:#}"));
            cli::doctor::run(cli.config.as_deref(), config.as_ref().map_err(Clone::clone)).await
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(*shell, &mut cmd, "docview", &mut std::io::stdout());
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    cli::output::configure(cli.json, cli.verbose);
    cli::init_tracing(cli.verbose, cli.json);

    let result = dispatch(cli).await;

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        if cli::output::is_json() {
            cli::output::print_json(&serde_json::json!({
                "error": true,
                "message": format!("{e:#}"),
            }));
        } else {
            eprintln!("  Error: {e:#}");
        }
        std::process::exit(1);
    }

    result
}
