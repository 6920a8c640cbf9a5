//! storbench CLI entry point

use anyhow::Result;
use std::io::{self, BufRead, Write};
use std::process;

use storbench::config::cli::Cli;
use storbench::config::toml::{merge_cli_with_config, parse_toml_file};
use storbench::config::validator::validate_config;
use storbench::output::text::{print_clocks, print_conditions, print_resource_usage};
use storbench::output::{build_report, write_json_report, ConsoleSink};
use storbench::util::ResourceUsage;
use storbench::{BenchError, Orchestrator, RunConfig};

fn main() {
    let cli = Cli::parse_args();
    init_tracing(&cli);

    if let Err(err) = run(&cli) {
        let code = exit_code(&err);
        match err.downcast_ref::<BenchError>() {
            Some(BenchError::Declined) => println!("Test skipped."),
            _ => eprintln!("\nError: {:#}", err),
        }
        process::exit(code);
    }
}

fn init_tracing(cli: &Cli) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log_filter()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// 1 for configuration errors, 2 for the resource usage query, 3 otherwise
fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<BenchError>()
        .map(BenchError::exit_code)
        .unwrap_or(3)
}

fn load_config(cli: &Cli) -> Result<RunConfig> {
    let file_options = match &cli.config {
        Some(path) => Some(
            parse_toml_file(path).map_err(|e| BenchError::config(format!("{:#}", e)))?,
        ),
        None => None,
    };

    let options = merge_cli_with_config(&cli.options, file_options)?;
    let config = options.resolve()?;
    validate_config(&config)?;
    Ok(config)
}

fn run(cli: &Cli) -> Result<()> {
    println!("storbench v{}", env!("CARGO_PKG_VERSION"));
    println!("Sequential storage throughput benchmark");
    println!();

    let config = load_config(cli)?;
    let mut stdout = io::stdout();
    print_conditions(&mut stdout, &config)?;
    println!();

    let mut orchestrator = Orchestrator::new();
    print_clocks(&mut stdout, orchestrator.timer())?;

    if cli.dry_run {
        println!();
        println!("Dry run mode - configuration validated successfully");
        return Ok(());
    }

    if !cli.yes && !confirm()? {
        return Err(BenchError::Declined.into());
    }

    let report = ConsoleSink::stdout().run(&mut orchestrator, &config)?;

    let usage = ResourceUsage::take()?;
    println!();
    print_resource_usage(&mut stdout, &usage)?;

    if let Some(path) = &cli.json {
        let json = build_report(&config, orchestrator.timer(), &report, Some(usage));
        write_json_report(path, &json)?;
        println!();
        println!("JSON report written to {}", path.display());
    }

    println!();
    println!("Done.");
    Ok(())
}

/// Ask "Start? (Y/N)"; anything but y/Y declines
fn confirm() -> Result<bool> {
    print!("\nStart? (Y/N) ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(matches!(line.trim_start().chars().next(), Some('y' | 'Y')))
}
