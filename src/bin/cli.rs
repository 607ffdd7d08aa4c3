//! hub-scout CLI
//!
//! Runs the poll loop against the configured hub, or helps with setup.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use hub_scout::{
    config::{load_ca_certificate, load_config},
    error::Result,
    models::Config,
    pipeline,
    services::{PageFetcher, PageSelector, WebFetcher, extract},
    utils::{checksum, http},
};

/// hub-scout - content hub polling client
#[derive(Parser, Debug)]
#[command(
    name = "hub-scout",
    version,
    about = "Checks feeds and pages for a content hub"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll the hub until interrupted
    Run {
        /// Run a single iteration and exit
        #[arg(long)]
        once: bool,
    },

    /// Check the configuration and CA certificate
    Validate,

    /// Fetch a page and show what a selector extracts from it
    Extract {
        /// Page URL
        url: String,

        /// XPath or CSS selector
        selector: String,
    },
}

const DEFAULT_CONFIG: &str = "hub-scout.toml";

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

async fn execute(cli: Cli) -> Result<()> {
    let explicit = cli.config.is_some();
    let config_path = cli.config.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));

    match cli.command {
        Command::Run { once } => {
            let config = load_config(&config_path, explicit)?;
            run(&config, once).await
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            let config = load_config(&config_path, explicit)?;
            log::info!("✓ Config OK (hub {})", config.hub.url);

            load_ca_certificate(&config.hub.ca_cert)?;
            log::info!("✓ CA certificate OK ({})", config.hub.ca_cert.display());

            log::info!("All validations passed!");
            Ok(())
        }

        Command::Extract { url, selector } => {
            // Hub credentials are not needed here, so an incomplete config is fine.
            let config = if explicit {
                load_config(&config_path, true)?
            } else {
                Config::default()
            };
            inspect(&config, &url, &selector).await
        }
    }
}

async fn run(config: &Config, once: bool) -> Result<()> {
    let mut poller = pipeline::build_poll_loop(config)?;
    log::info!("hub-scout starting, hub at {}", config.hub.url);

    poller.start().await?;

    if once {
        let report = poller.run_iteration().await;
        log::info!("Iteration finished: {:?}", report);
    } else {
        poller.run(shutdown_signal()).await;
    }

    log::info!("Done!");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

async fn inspect(config: &Config, url: &str, selector: &str) -> Result<()> {
    let selector = PageSelector::parse(selector)?;
    let fetcher = WebFetcher::new(http::create_web_client(config)?);

    let body = fetcher.fetch(url).await?;
    let extraction = extract(&String::from_utf8_lossy(&body), &selector);

    println!("title:    {}", extraction.title.as_deref().unwrap_or("-"));
    println!("checksum: {}", checksum(&extraction.content));
    println!("content:\n{}", extraction.content);
    Ok(())
}
