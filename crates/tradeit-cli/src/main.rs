use std::fmt::Display;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use tradeit_core::config::{Config, LoggingConfig};
use tradeit_core::types::{ItemRecord, SearchReport};

#[derive(Parser)]
#[command(
    name = "tradeit",
    about = "Search the tradeit.gg bot inventory and print what is listed",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the bot inventory for one or more items
    Search {
        /// Item names, searched one after another in the same session
        #[arg(required = true)]
        items: Vec<String>,

        /// Steam app id of the game filter
        #[arg(short, long, default_value = "730")]
        game: String,

        /// Print reports as JSON
        #[arg(long)]
        json: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Get a specific config value
    Get { key: String },
    /// Set a config value
    Set { key: String, value: String },
    /// Check the configuration for mistakes
    Validate,
    /// Print the config file location
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_path);
    let config = Config::load(&config_path)?;

    init_logging(config.logging.as_ref(), cli.verbose);

    match cli.command {
        Commands::Search { items, game, json } => {
            let reports = run_search(&config, &items, &game).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                for report in &reports {
                    print_report(report);
                }
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let effective = Config {
                    site: Some(config.site()),
                    waits: Some(config.waits()),
                    browser: Some(config.browser()),
                    logging: config.logging.clone(),
                };
                println!("{}", serde_json::to_string_pretty(&effective)?);
            }
            ConfigAction::Get { key } => match config.get_path(&key) {
                Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                None => anyhow::bail!("Unknown config key: {key}"),
            },
            ConfigAction::Set { key, value } => {
                let value = serde_json::from_str(&value)
                    .unwrap_or(serde_json::Value::String(value));
                let mut config = config;
                config.set_path(&key, value)?;
                config.save(&config_path)?;
                println!("Set {key} in {}", config_path.display());
            }
            ConfigAction::Validate => {
                let (warnings, errors) = config.validate();
                for warning in &warnings {
                    println!("warning: {warning}");
                }
                for error in &errors {
                    println!("error: {error}");
                }
                if !errors.is_empty() {
                    anyhow::bail!("{} error(s) in {}", errors.len(), config_path.display());
                }
                println!("Config OK ({} warning(s))", warnings.len());
            }
            ConfigAction::Path => println!("{}", config_path.display()),
        },
    }

    Ok(())
}

/// Install the global subscriber. `-v` forces `debug`, otherwise `RUST_LOG`
/// wins over the configured level and filters.
fn init_logging(logging: Option<&LoggingConfig>, verbose: bool) {
    let logging = logging.cloned().unwrap_or_default();

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let mut directives = vec![logging.level.clone().unwrap_or_else(|| "info".into())];
            directives.extend(logging.filters.iter().cloned());
            EnvFilter::new(directives.join(","))
        })
    };

    let writer = if logging.output == "stdout" {
        BoxMakeWriter::new(std::io::stdout)
    } else {
        BoxMakeWriter::new(std::io::stderr)
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Launch Chromium, run every search in one session, and close the browser
/// whether or not the searches succeeded.
#[cfg(feature = "browser")]
async fn run_search(
    config: &Config,
    items: &[String],
    game: &str,
) -> anyhow::Result<Vec<SearchReport>> {
    use tradeit_browser::ChromeDriver;

    let driver = ChromeDriver::launch(&config.browser()).await?;
    let outcome = search_all(&driver, config, items, game).await;
    if let Err(e) = driver.close().await {
        tracing::warn!(%e, "Failed to close browser");
    }
    outcome
}

#[cfg(feature = "browser")]
async fn search_all(
    driver: &tradeit_browser::ChromeDriver,
    config: &Config,
    items: &[String],
    game: &str,
) -> anyhow::Result<Vec<SearchReport>> {
    let bot = tradeit_browser::TradeitBot::from_config(driver, config).await?;
    let mut reports = Vec::with_capacity(items.len());
    for item in items {
        let records = bot.search(item, game).await?;
        reports.push(SearchReport::new(item.as_str(), game, records));
    }
    Ok(reports)
}

#[cfg(not(feature = "browser"))]
async fn run_search(
    _config: &Config,
    _items: &[String],
    _game: &str,
) -> anyhow::Result<Vec<SearchReport>> {
    anyhow::bail!("tradeit was built without the `browser` feature")
}

fn print_report(report: &SearchReport) {
    println!(
        "{} (game {}): {} item(s) at {}",
        report.item,
        report.game,
        report.items.len(),
        report.scraped_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    for record in &report.items {
        println!("  {}", item_line(record));
    }
}

fn item_line(record: &ItemRecord) -> String {
    format!(
        "{name} | wear {wear} | float {float} | paint {paint} | price {price}{st}{locked}",
        name = or_dash(&record.name),
        wear = or_dash(&record.wear),
        float = or_dash(&record.floatvalue),
        paint = or_dash(&record.paint),
        price = or_dash(&record.price),
        st = if record.stattrack { " | StatTrak" } else { "" },
        locked = record
            .locked
            .as_ref()
            .map(|l| format!(" | locked {l}"))
            .unwrap_or_default(),
    )
}

fn or_dash<T: Display>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "-".into())
}
