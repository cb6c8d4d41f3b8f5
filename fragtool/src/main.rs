use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Parser, ValueHint};
use tracing::level_filters::LevelFilter;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use fragtool::error::ToolError;
use fragtool::io::{read_instance, write_results};
use fragtool::pipeline::rank_candidates;

/// Rank candidate molecular formulas of an MS/MS spectrum by fragmentation tree score
#[derive(Parser, Debug)]
#[command(name = "fragtool")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON instance with peaks, ionization and candidate formulas
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Output file for the ranked results (default: stdout)
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,

    /// Number of worker threads
    #[arg(short, long, default_value_t = 4)]
    threads: usize,

    /// Keep only the best N candidates
    #[arg(long)]
    top: Option<usize>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    if let Err(e) = run(&cli) {
        error!(error = %e, "analysis failed");
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), ToolError> {
    let instance = read_instance(&cli.input)?;
    let input = instance.processed_input()?;
    let ionization = instance.ionization()?;
    let candidates = instance.candidate_formulas()?;
    let scoring = instance.scoring()?;
    info!(
        peaks = input.peaks().len(),
        candidates = candidates.len(),
        ionization = %ionization,
        "instance loaded"
    );

    let mut results = rank_candidates(&input, &scoring, &ionization, &candidates, cli.threads)?;
    if let Some(top) = cli.top {
        results.truncate(top);
    }

    match &cli.output {
        Some(path) => write_results(BufWriter::new(File::create(path)?), &results)?,
        None => write_results(io::stdout().lock(), &results)?,
    }
    Ok(())
}

fn setup_logging(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    // RUST_LOG takes precedence over -v
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}
