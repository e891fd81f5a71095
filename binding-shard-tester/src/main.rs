mod host;
mod reports;
mod scenarios;
mod util;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;
use std::time::Instant;

use scenarios::{
    ScenarioCtx, ScenarioResult, StoreBackend, expand_scenarios, list_scenarios, run_scenario,
};
use util::{parse_seeds, split_csv};

#[derive(Debug, Parser)]
#[command(name = "binding-shard-tester", version = "0.1.0")]
#[command(about = "Scenario runner for the once-per-server binding shard drop rule")]
struct Args {
    /// Scenarios to run (comma-separated, or `all`)
    #[arg(long, default_value = "all")]
    scenarios: String,

    /// List all available scenarios and exit
    #[arg(long)]
    list_scenarios: bool,

    /// Seeds to run (comma-separated, decimal or 0x-hex)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Kills per sequential scenario (distribution runs scale this by 1000)
    #[arg(long, default_value_t = 10)]
    iterations: usize,

    /// Concurrent sessions for the concurrent-kills scenario
    #[arg(long, default_value_t = 64)]
    workers: usize,

    /// Storage backend behind the award machine
    #[arg(long, value_enum, default_value_t = StoreBackend::Memory)]
    store: StoreBackend,

    /// Directory for per-scenario SQLite files (sqlite store only)
    #[arg(long)]
    db_dir: Option<PathBuf>,

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

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if maybe_list_scenarios(&args)? {
        return Ok(());
    }

    // Structured reports on stdout must stay parseable.
    let chatty = args.report == "console" || args.output.is_some();
    if chatty {
        announce_banner();
    }

    let start_time = Instant::now();
    let scenarios = expand_scenarios(&split_csv(&args.scenarios));
    let seeds = parse_seeds(&args.seeds)?;
    let results = run_scenarios(&args, &scenarios, &seeds, chatty);

    write_reports(&args, &results, start_time)?;

    if results.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }

    Ok(())
}

fn maybe_list_scenarios(args: &Args) -> Result<bool> {
    if !args.list_scenarios {
        return Ok(false);
    }
    let mut output_target = OutputTarget::new(args.output.clone())?;
    writeln!(output_target.writer(), "Available scenarios:")?;
    for (key, description) in list_scenarios() {
        writeln!(output_target.writer(), "  {key:25} - {description}")?;
    }
    output_target.flush_inner()?;
    Ok(true)
}

fn announce_banner() {
    println!("{}", "💎 Binding Shard Drop Tester".bright_cyan().bold());
    println!("{}", "============================".cyan());
}

fn run_scenarios(
    args: &Args,
    scenarios: &[String],
    seeds: &[u64],
    chatty: bool,
) -> Vec<ScenarioResult> {
    let mut results = Vec::new();
    for scenario_name in scenarios {
        for &seed in seeds {
            let ctx = ScenarioCtx {
                seed,
                iterations: args.iterations,
                workers: args.workers,
                backend: args.store,
                db_dir: args.db_dir.clone(),
                verbose: args.verbose,
            };
            let Some(result) = run_scenario(scenario_name, &ctx) else {
                eprintln!("⚠️  Unknown scenario: {}", scenario_name.yellow());
                break;
            };
            if result.passed {
                if chatty {
                    println!(
                        "✅ [{} seed {}] {} ms",
                        scenario_name.green(),
                        seed,
                        result.duration_ms
                    );
                }
            } else {
                eprintln!(
                    "❌ [{} seed {}] {}",
                    scenario_name.red(),
                    seed,
                    result.failures.join("; ")
                );
            }
            results.push(result);
        }
    }
    results
}

fn write_reports(args: &Args, results: &[ScenarioResult], start_time: Instant) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;

    match args.report.as_str() {
        "json" => reports::generate_json_report(output_target.writer(), results)?,
        "markdown" => {
            if results.is_empty() {
                writeln!(
                    output_target.writer(),
                    "# Binding Shard Drop Rule Results\n\n_No scenarios executed._"
                )?;
            } else {
                reports::generate_markdown_report(output_target.writer(), results)?;
            }
        }
        _ => {
            if results.is_empty() {
                writeln!(output_target.writer(), "No scenarios executed.")?;
            } else {
                reports::generate_console_report(
                    output_target.writer(),
                    results,
                    start_time.elapsed(),
                )?;
            }
            writeln!(output_target.writer())?;
            writeln!(
                output_target.writer(),
                "🏁 Total time: {:?}",
                start_time.elapsed()
            )?;
        }
    }

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
