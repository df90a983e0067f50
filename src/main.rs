use std::io;
use std::path::PathBuf;
use std::process;

use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use tracing_subscriber::EnvFilter;

use tally::config::{Config, USAGE};
use tally::kernel::DEFAULT_KERNEL_PATH;
use tally::report;
use tally::types::{Method, Partition, RunRecord};

/// Count a byte pattern with serial, multi-core and OpenCL backends,
/// timing each run and writing the results as CSV.
#[derive(Parser)]
#[command(
    name = "tally",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("TALLY_BUILD_COMMIT"), ")"),
    about
)]
struct Cli {
    /// Backends to run: serial, cpu, gpu or all.
    mode: Option<String>,

    /// File to search. Loaded fully into memory.
    input: Option<PathBuf>,

    /// Literal pattern, matched byte for byte.
    pattern: Option<String>,

    /// Repetitions per backend.
    runs: Option<String>,

    /// CSV file to write. Parent directories are created.
    output: Option<PathBuf>,

    /// Worker threads for the cpu backend. Defaults to the number of CPUs.
    #[arg(long)]
    workers: Option<usize>,

    /// How the cpu backend divides the input. `spans` also counts matches
    /// that cross a line break.
    #[arg(long, value_enum, default_value_t = Partition::Lines)]
    partition: Partition,

    /// OpenCL kernel file; the embedded kernel is used if it is missing.
    #[arg(long, default_value = DEFAULT_KERNEL_PATH)]
    kernel: PathBuf,

    /// Also print each run as a JSON line.
    #[arg(long)]
    json: bool,

    /// Skip the summary table.
    #[arg(long)]
    no_summary: bool,

    /// More log output on stderr (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print shell completions for the given shell.
    #[arg(long, value_name = "SHELL")]
    completions: Option<Shell>,
}

fn main() {
    let cli = Cli::parse();

    // Shell completions
    if let Some(shell) = cli.completions {
        clap_complete::generate(shell, &mut Cli::command(), "tally", &mut io::stdout());
        return;
    }

    init_logging(cli.verbose);

    let (Some(mode), Some(input), Some(pattern), Some(runs), Some(output)) =
        (cli.mode, cli.input, cli.pattern, cli.runs, cli.output)
    else {
        println!("{USAGE}");
        return;
    };

    let config = match Config::from_args(&mode, input, &pattern, &runs, output)
        .and_then(|c| match cli.workers {
            Some(n) => c.with_workers(n),
            None => Ok(c),
        })
        .map(|c| c.with_partition(cli.partition).with_kernel_path(cli.kernel))
    {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            println!("{USAGE}");
            process::exit(e.exit_code());
        }
    };

    if config.mode.methods().contains(&Method::ParallelCpu) {
        println!(
            "ParallelCPU -> {} workers, {} partitioning",
            config.workers, config.partition
        );
    }

    let json = cli.json;
    let result = tally::run(&config, |record| print_record(record, json));

    match result {
        Ok(records) => {
            println!("CSV written to: {}", config.output.display());
            if !cli.no_summary {
                println!();
                print!("{}", report::format_summary(&report::summarize(&records)));
            }
        }
        Err(e) => {
            eprintln!("{e}");
            process::exit(e.exit_code());
        }
    }
}

fn print_record(record: &RunRecord, json: bool) {
    if record.result.is_unavailable() {
        println!(
            "{}: unavailable (count -1) after {} ms",
            record.method,
            record.result.millis()
        );
    } else {
        println!(
            "{}: {} occurrences in {} ms",
            record.method,
            record.result.count,
            record.result.millis()
        );
    }
    if json {
        match serde_json::to_string(record) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!(error = %e, "cannot serialize run record"),
        }
    }
}

/// Log to stderr. Default `warn`; each `-v` raises one level.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}
