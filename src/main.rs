use anyhow::Result;
use clap::{Parser, Subcommand};
use proxy_harvest::{
    config::{ForwardKind, PoolBackend, RunMode, Settings},
    crawl::{CrawlEngine, DEFAULT_TEST_PAGE_LIMIT},
    pool, proxy, sites,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Harvests public proxy listings into a deduplicated pool
#[derive(Parser)]
#[command(name = "proxy-harvest")]
#[command(about = "Harvests public proxy listings into a deduplicated pool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file
    #[arg(short, long, default_value = "harvest.toml")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the crawl loop
    Run {
        /// Stop after a single pass
        #[arg(long)]
        once: bool,
    },
    /// Crawl the first pages of one source and print what its parser finds
    Test {
        /// Source key
        key: String,
        /// Number of pages to visit
        #[arg(short, long, default_value_t = DEFAULT_TEST_PAGE_LIMIT)]
        pages: usize,
    },
    /// List configured sources
    Sources,
}

fn setup_logging(verbose: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if quiet {
            EnvFilter::new("error")
        } else {
            match verbose {
                0 => EnvFilter::new("proxy_harvest=info,warn"),
                1 => EnvFilter::new("proxy_harvest=debug,info"),
                _ => EnvFilter::new("trace"),
            }
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn build_engine(settings: &Settings) -> Result<CrawlEngine> {
    let (sites, parsers) = sites::build_registries(settings)?;
    let sink = pool::open_sink(&settings.pool, &settings.forward).await?;

    let mut engine = CrawlEngine::new(settings.crawler.clone(), sites, parsers, sink);
    if let Some(supply) = proxy::open_supply(&settings.proxy_supply).await? {
        engine = engine.with_proxy_supply(supply);
    }
    Ok(engine)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    let mut settings = Settings::load(&cli.config)?;
    tracing::info!(
        config = %cli.config.display(),
        sources = settings.sources.len(),
        "configuration loaded"
    );

    match cli.command {
        Commands::Run { once } => {
            if once {
                settings.crawler.mode = RunMode::SinglePass;
            }
            let engine = build_engine(&settings).await?;
            engine.run().await?;
        }
        Commands::Test { key, pages } => {
            // display mode never reaches the pool
            settings.pool.backend = PoolBackend::Memory;
            settings.forward.kind = ForwardKind::Log;
            let engine = build_engine(&settings).await?;
            let report = engine.test_crawl(&key, pages).await?;
            println!(
                "{}: {} pages fetched, {} skipped, {} candidates",
                report.source, report.pages_fetched, report.pages_skipped, report.candidates
            );
        }
        Commands::Sources => {
            let (sites, parsers) = sites::build_registries(&settings)?;
            if sites.is_empty() {
                println!("No sources configured.");
            }
            for source in sites.iter() {
                let status = if source.enabled { "✓" } else { "○" };
                let parser = source.parser.as_deref().unwrap_or("-");
                println!(
                    "{} {} - {} pages, parser: {}{}",
                    status,
                    source.key,
                    source.pages.len(),
                    parser,
                    if source.use_proxy { ", via proxy" } else { "" }
                );
                if !parsers.contains(&source.key) {
                    println!("   (no parser bound, pages are fetched but ignored)");
                }
            }
        }
    }

    Ok(())
}
