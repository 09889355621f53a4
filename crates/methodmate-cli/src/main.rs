use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use methodmate_core::{
    Config, CozeOracle, Enricher, InMemoryProvider, MethodExtractor, Paper, VenueClassifier,
    config_file,
};
use tokio_util::sync::CancellationToken;

mod output;

use output::ColorMode;

const MISSING_CREDENTIALS: &str =
    "Set COZE_API_KEY and COZE_BOT_ID, or add an [oracle] table to .methodmate.toml";

/// MethodMate - Extract research methodology from academic papers
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract the methodology from plain-text papers
    Extract {
        /// Text files, one paper each (the file stem is used as the title)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Number of papers processed concurrently
        #[arg(short, long)]
        workers: Option<usize>,

        /// Publication venue recorded for every input paper
        #[arg(long)]
        venue: Option<String>,
    },

    /// Check whether a venue is on the top-venue list
    Venue {
        /// Venue name as printed in a citation
        venue: String,
    },

    /// Format keywords as a comma-delimited search query
    Keywords {
        /// Keyword string, a raw oracle reply with --reply, or a research
        /// description with --ask
        raw: String,

        /// Parse RAW as a free-form oracle reply first
        #[arg(long, conflicts_with = "ask")]
        reply: bool,

        /// Ask the oracle for keywords describing RAW
        #[arg(long)]
        ask: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let color = ColorMode(!cli.no_color);
    let config = resolve_config();

    match cli.command {
        Command::Extract {
            files,
            workers,
            venue,
        } => extract(config, files, workers, venue, color).await,
        Command::Venue { venue } => {
            let result = VenueClassifier::new(&config.venues).classify(&venue);
            output::print_venue(&mut std::io::stdout(), &venue, &result, color)?;
            Ok(())
        }
        Command::Keywords { raw, reply, ask } => {
            let query = if ask {
                config.validate().context(MISSING_CREDENTIALS)?;
                let oracle = CozeOracle::new(&config.oracle, methodmate_core::build_http_client()?);
                methodmate_core::suggest_query(&oracle, &raw).await?
            } else if reply {
                methodmate_core::format_query(&methodmate_core::parse_keywords_reply(&raw))
            } else {
                methodmate_core::format_query(&raw)
            };
            println!("{}", query);
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Resolve configuration: env vars > config file > defaults.
/// Command-line flags are applied on top by each subcommand.
fn resolve_config() -> Config {
    let mut config = Config::default();
    config_file::load_config().apply_to(&mut config);

    if let Ok(key) = std::env::var("COZE_API_KEY") {
        config.oracle.api_key = Some(key);
    }
    if let Ok(url) = std::env::var("COZE_API_URL") {
        config.oracle.api_url = url;
    }
    if let Ok(bot) = std::env::var("COZE_BOT_ID") {
        config.oracle.bot_id = bot;
    }
    if let Ok(user) = std::env::var("COZE_USER_ID") {
        config.oracle.user_id = user;
    }
    if let Some(secs) = std::env::var("ORACLE_TIMEOUT")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
    {
        config.oracle.timeout = Duration::from_secs(secs);
    }
    config
}

/// Read each file as one paper, titled by its file stem.
///
/// Full text is looked up by title, so files whose stems match ignoring case
/// are rejected.
fn load_papers(
    files: &[PathBuf],
    venue: Option<&str>,
) -> anyhow::Result<(Vec<Paper>, InMemoryProvider)> {
    let mut papers = Vec::with_capacity(files.len());
    let mut provider = InMemoryProvider::new();
    let mut seen: HashMap<String, &PathBuf> = HashMap::new();

    for path in files {
        if !path.exists() {
            anyhow::bail!("File not found: {}", path.display());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let title = path
            .file_stem()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        if let Some(earlier) = seen.insert(title.trim().to_lowercase(), path) {
            anyhow::bail!(
                "{} and {} share the title \"{}\"; rename one of them",
                earlier.display(),
                path.display(),
                title
            );
        }

        provider.insert(&title, text);
        papers.push(Paper {
            venue: venue.map(str::to_string),
            ..Paper::new(title)
        });
    }
    Ok((papers, provider))
}

async fn extract(
    mut config: Config,
    files: Vec<PathBuf>,
    workers: Option<usize>,
    venue: Option<String>,
    color: ColorMode,
) -> anyhow::Result<()> {
    if let Some(workers) = workers {
        config.num_workers = workers;
    }
    config.validate().context(MISSING_CREDENTIALS)?;
    tracing::debug!(?config, "resolved configuration");

    let (papers, provider) = load_papers(&files, venue.as_deref())?;

    let client = methodmate_core::build_http_client()?;
    let oracle = Arc::new(CozeOracle::new(&config.oracle, client));
    let enricher = Arc::new(Enricher::new(
        Arc::new(provider),
        MethodExtractor::new(oracle, config.extraction.clone()),
        VenueClassifier::new(&config.venues),
    ));

    let mut writer = std::io::stdout();
    writeln!(writer, "Extracting methodology from {} papers\n", papers.len())?;

    let progress_writer = Arc::new(Mutex::new(std::io::stdout()));
    let progress = {
        let pw = Arc::clone(&progress_writer);
        Arc::new(move |event: methodmate_core::ProgressEvent| {
            if let Ok(mut w) = pw.lock() {
                let _ = output::print_progress(&mut *w, &event, color);
                let _ = w.flush();
            }
        })
    };

    let cancel = CancellationToken::new();

    // Set up Ctrl+C handler
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_clone.cancel();
        }
    });

    let results =
        methodmate_core::enrich_papers(enricher, papers, config.num_workers, cancel, progress)
            .await;

    writeln!(writer)?;
    output::print_report(&mut writer, &results, color)?;
    output::print_summary(&mut writer, &results, color)?;

    Ok(())
}
