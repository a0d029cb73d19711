//! Command-line interface for niftyswing

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use swing_stock::market::normalize_symbol;
use swing_stock::report::{exits_table, recommendations_table, stats_table};
use swing_stock::{
    LearningDb, SwingConfig, SwingPath, SwingPipeline, Universe, provider_chain,
};
use swing_utils::{AppInfo, init_tracing, load_dotenv};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "swing", version)]
#[command(about = "Swing-trade screener for NSE/BSE equities", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./.swing.json when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Screen the universe and write ranked picks
    Run {
        #[arg(long, value_enum, default_value_t = PathArg::All)]
        path: PathArg,

        /// Universe CSV (symbol,name,aliases,...)
        #[arg(long)]
        universe: Option<PathBuf>,

        /// Number of picks to keep
        #[arg(long)]
        top: Option<usize>,

        /// Score news with the keyword heuristic only
        #[arg(long)]
        no_ai: bool,

        /// Check news claims against web search
        #[arg(long)]
        verify: bool,
    },

    /// Review open positions for exits
    Exits {
        #[arg(long)]
        positions: PathBuf,
    },

    /// Record outcomes for a past run at current prices
    Feedback {
        #[arg(long)]
        run_id: i64,

        /// Return (%) counted as a success
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Show per-ticker reliability and recent runs
    Stats {
        #[arg(long)]
        ticker: Option<String>,

        /// Recent runs to list
        #[arg(long, default_value_t = 5)]
        runs: usize,
    },

    /// Print the full decision for one ticker as JSON
    Analyze {
        ticker: String,

        #[arg(long, value_enum, default_value_t = PathArg::Rebound)]
        path: PathArg,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum PathArg {
    Rebound,
    Momentum,
    All,
}

impl PathArg {
    fn paths(self) -> Vec<SwingPath> {
        match self {
            PathArg::Rebound => vec![SwingPath::Rebound],
            PathArg::Momentum => vec![SwingPath::Momentum],
            PathArg::All => SwingPath::ALL.to_vec(),
        }
    }
}

fn load_universe(config: &SwingConfig, required: bool) -> Result<Universe> {
    let path = &config.market.universe;
    match Universe::load(path, &config.market.default_suffix) {
        Ok(universe) => Ok(universe),
        Err(e) if !required => {
            warn!(universe = %path.display(), error = %e, "Universe not loaded, using bare symbols");
            Ok(Universe::default())
        }
        Err(e) => Err(e).with_context(|| format!("loading universe {}", path.display())),
    }
}

async fn build_pipeline(config: SwingConfig, universe: Universe) -> Result<SwingPipeline> {
    let chain = provider_chain(&config);
    if config.ai.enabled && chain.is_none() {
        warn!("No AI provider configured; news is scored with the keyword heuristic");
    }
    SwingPipeline::builder(config, universe)
        .provider_chain(chain)
        .build()
        .await
        .context("setting up pipeline")
}

async fn run(mut config: SwingConfig, path: PathArg, universe: Option<PathBuf>, top: Option<usize>, no_ai: bool, verify: bool) -> Result<()> {
    if let Some(universe) = universe {
        config.market.universe = universe;
    }
    if let Some(top) = top {
        config.output.top_n = top;
    }
    if no_ai {
        config.ai.enabled = false;
    }
    if verify {
        config.verification.enabled = true;
    }
    config.validate()?;

    let universe = load_universe(&config, true)?;
    let pipeline = build_pipeline(config, universe).await?;

    for summary in pipeline.run_paths(&path.paths()).await? {
        println!(
            "\n{} path: {} analysed, {} skipped{}",
            summary.path,
            summary.analyzed,
            summary.skipped,
            summary.run_id.map(|id| format!(", run #{id}")).unwrap_or_default()
        );
        println!("{}", recommendations_table(&summary.recommendations));
        println!("Report: {}", summary.report.display());
    }
    Ok(())
}

async fn exits(config: SwingConfig, positions: &Path) -> Result<()> {
    let universe = load_universe(&config, false)?;
    let pipeline = build_pipeline(config, universe).await?;
    let summary = pipeline
        .run_exits(positions)
        .await
        .with_context(|| format!("reviewing positions in {}", positions.display()))?;

    println!("{}", exits_table(&summary.recommendations));
    if summary.skipped > 0 {
        println!("{} position(s) skipped, see log", summary.skipped);
    }
    println!("Report: {}", summary.report.display());
    Ok(())
}

async fn feedback(mut config: SwingConfig, run_id: i64, threshold: Option<f64>) -> Result<()> {
    config.learning.enabled = true;
    let universe = load_universe(&config, false)?;
    let pipeline = build_pipeline(config, universe).await?;

    let outcomes = pipeline
        .record_feedback(run_id, threshold)
        .await
        .with_context(|| format!("recording feedback for run {run_id}"))?;
    if outcomes.is_empty() {
        println!("Nothing new to record for run #{run_id}");
        return Ok(());
    }
    for o in &outcomes {
        println!(
            "{:<14} entry {:>10.2}  now {:>10.2}  {:>+7.2}%  {}",
            o.ticker,
            o.entry_price,
            o.exit_price,
            o.return_pct,
            if o.success { "hit" } else { "miss" }
        );
    }
    let hits = outcomes.iter().filter(|o| o.success).count();
    println!("{hits}/{} successful", outcomes.len());
    Ok(())
}

async fn stats(config: SwingConfig, ticker: Option<String>, runs: usize) -> Result<()> {
    let db = LearningDb::open(&config.learning.db_url)
        .await
        .with_context(|| format!("opening {}", config.learning.db_url))?;

    let stats = match ticker {
        Some(t) => {
            let symbol = normalize_symbol(&t, &config.market.default_suffix);
            match db.ticker_stats(&symbol).await? {
                Some(s) => vec![s],
                None => bail!("no feedback recorded for {symbol}"),
            }
        }
        None => db.all_stats().await?,
    };
    println!("{}", stats_table(&stats));

    for run in db.recent_runs(runs).await? {
        println!(
            "run #{:<4} {:<9} {}  {} tickers  {}",
            run.id,
            run.path,
            run.started_at.format("%Y-%m-%d %H:%M"),
            run.tickers_analyzed,
            run.provider.as_deref().unwrap_or("heuristic")
        );
    }
    Ok(())
}

async fn analyze(config: SwingConfig, ticker: &str, path: PathArg) -> Result<()> {
    let path = match path {
        PathArg::Momentum => SwingPath::Momentum,
        PathArg::Rebound | PathArg::All => SwingPath::Rebound,
    };
    let universe = load_universe(&config, false)?;
    let pipeline = build_pipeline(config, universe).await?;
    let analysis = pipeline
        .analyze_ticker(ticker, path)
        .await
        .with_context(|| format!("analysing {ticker}"))?;
    println!("{}", serde_json::to_string_pretty(&analysis)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_file = load_dotenv(None);
    init_tracing(cli.json_logs);

    let app = AppInfo::default();
    info!(version = %app.version, environment = %app.environment, "Starting {}", app.app_name);
    if let Some(file) = env_file {
        info!(file = %file.display(), "Loaded environment file");
    }

    let config = SwingConfig::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Command::Run {
            path,
            universe,
            top,
            no_ai,
            verify,
        } => run(config, path, universe, top, no_ai, verify).await,
        Command::Exits { positions } => exits(config, &positions).await,
        Command::Feedback { run_id, threshold } => feedback(config, run_id, threshold).await,
        Command::Stats { ticker, runs } => stats(config, ticker, runs).await,
        Command::Analyze { ticker, path } => analyze(config, &ticker, path).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::try_parse_from([
            "swing", "--config", "alt.json", "run", "--path", "momentum", "--top", "5", "--no-ai",
        ])
        .unwrap();
        assert_eq!(cli.config.as_deref(), Some(Path::new("alt.json")));
        match cli.command {
            Command::Run { path, top, no_ai, verify, .. } => {
                assert_eq!(path, PathArg::Momentum);
                assert_eq!(top, Some(5));
                assert!(no_ai);
                assert!(!verify);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_parses_analyze_and_feedback() {
        let cli = Cli::try_parse_from(["swing", "analyze", "RELIANCE"]).unwrap();
        assert!(matches!(cli.command, Command::Analyze { ref ticker, path: PathArg::Rebound } if ticker == "RELIANCE"));

        let cli = Cli::try_parse_from(["swing", "feedback", "--run-id", "7", "--json-logs"]).unwrap();
        assert!(cli.json_logs);
        assert!(matches!(cli.command, Command::Feedback { run_id: 7, threshold: None }));
    }

    #[test]
    fn test_path_arg_expansion() {
        assert_eq!(PathArg::All.paths(), vec![SwingPath::Rebound, SwingPath::Momentum]);
        assert_eq!(PathArg::Rebound.paths(), vec![SwingPath::Rebound]);
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["swing"]).is_err());
    }
}
