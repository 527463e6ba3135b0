mod common;
mod logic;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use common::{run_store_dir, split_csv};
use logic::{
    CampaignTester, PlayStrategy, RunOptions, ScenarioResult, StoreChoice, resolve_seed_inputs,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    /// Keep saves in process memory (fast)
    Memory,
    /// Write saves as JSON files under --store-dir
    JsonDir,
}

#[derive(Debug, Parser)]
#[command(name = "clubhouse-tester", version = "0.1.0")]
#[command(
    about = "Automated campaign runs for the Clubhouse season engine with per-turn invariant checks"
)]
struct Args {
    /// Seeds to run (comma-separated numbers or single-word phrases)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Play strategies to run (comma-separated, or `all`)
    #[arg(long, default_value = "all")]
    strategies: String,

    /// Number of campaigns per strategy and seed
    #[arg(long, default_value_t = 3)]
    iterations: usize,

    /// Where campaign saves live
    #[arg(long, value_enum, default_value_t = StoreKind::Memory)]
    store: StoreKind,

    /// Base directory for JSON saves (json-dir store only)
    #[arg(long, default_value = "target/clubhouse-saves")]
    store_dir: String,

    /// Limit for year-end snapshot writes, in milliseconds
    #[arg(long, default_value_t = 2_000)]
    save_timeout_ms: u64,

    /// Commit pending writes every N turns
    #[arg(long, default_value_t = 25)]
    commit_every: u32,

    /// Skip the in-memory replay that checks determinism
    #[arg(long)]
    skip_replay: bool,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["json", "markdown", "console"])]
    report: String,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    announce_banner();

    let start_time = Instant::now();
    let seed_infos = resolve_seed_inputs(&split_csv(&args.seeds))?;
    let strategies =
        PlayStrategy::parse_list(&split_csv(&args.strategies)).map_err(|err| anyhow!(err))?;
    let store = build_store(&args);
    let options = RunOptions {
        save_timeout: Duration::from_millis(args.save_timeout_ms),
        commit_every: args.commit_every,
        verify_determinism: !args.skip_replay,
        ..RunOptions::default()
    };
    let tester = CampaignTester::new(store, options, args.verbose);

    println!("{}", "🧠 Running Campaigns".bright_yellow().bold());
    println!("{}", "-".repeat(30).yellow());

    let mut all_results = Vec::new();
    for strategy in strategies {
        all_results.extend(
            tester
                .run_strategy(strategy, &seed_infos, args.iterations)
                .await,
        );
    }

    write_reports(&args, &all_results, start_time)?;

    if all_results.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }

    Ok(())
}

fn announce_banner() {
    println!("{}", "🏫 Clubhouse Season Tester".bright_cyan().bold());
    println!("{}", "================================".cyan());
}

fn build_store(args: &Args) -> StoreChoice {
    match args.store {
        StoreKind::Memory => StoreChoice::Memory,
        StoreKind::JsonDir => {
            let dir = run_store_dir(&args.store_dir);
            println!("💾 Saving campaigns under {}", dir.display());
            StoreChoice::JsonDir(dir)
        }
    }
}

fn write_reports(args: &Args, results: &[ScenarioResult], start_time: Instant) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;

    match args.report.as_str() {
        "json" => {
            if results.is_empty() {
                writeln!(&mut output_target, "[]")?;
            } else {
                logic::reports::generate_json_report(&mut output_target, results)?;
            }
        }
        "markdown" => {
            if results.is_empty() {
                writeln!(
                    &mut output_target,
                    "# Clubhouse Campaign Test Results\n\n_No campaigns executed._"
                )?;
            } else {
                logic::reports::generate_markdown_report(&mut output_target, results)?;
            }
        }
        _ => {
            let duration = start_time.elapsed();
            if results.is_empty() {
                writeln!(&mut output_target, "No campaigns executed.")?;
            } else {
                logic::reports::generate_console_report(&mut output_target, results, duration)?;
            }
        }
    }

    let duration = start_time.elapsed();
    writeln!(&mut output_target)?;
    writeln!(&mut output_target, "🏁 Total time: {duration:?}")?;
    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}
