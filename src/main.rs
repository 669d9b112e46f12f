use std::io::{self, Write};
use std::path::PathBuf;

use clap::{ArgAction, Parser};
use log::{error, info};

use smart_rom_sync::error::SyncError;
use smart_rom_sync::logger::setup_logger;
use smart_rom_sync::{Config, SyncOptions, SyncStats, SystemSync};

/// Build a sync list for the specified ROMs.
#[derive(Parser)]
#[clap(version, about, long_about = None)]
struct Cli {
    /// Path to the config file containing the list of ROMs
    #[clap(value_parser)]
    config_file: PathBuf,

    /// Run the script with rsync in dry run mode
    #[clap(short = 'n', long, action = ArgAction::SetTrue)]
    dry_run: bool,

    /// Run the script, just print the rsync commands
    #[clap(long, action = ArgAction::SetTrue)]
    no_run: bool,

    /// Set the logging level (TRACE, DEBUG, INFO, WARNING, ERROR, CRITICAL)
    #[clap(long, default_value = "INFO")]
    log_level: String,

    /// Also write log output to this file
    #[clap(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Print the per-system stats as JSON on stdout
    #[clap(short, long, action = ArgAction::SetTrue)]
    json: bool,

    /// Print the loaded configuration before syncing
    #[clap(long, action = ArgAction::SetTrue)]
    print_config: bool,

    /// Write the validated configuration back to the config file, keeping a backup if it changed
    #[clap(long, action = ArgAction::SetTrue)]
    write_config: bool,

    /// Number of threads to use for parsing file names (0 or omitted uses all available threads)
    #[clap(long, value_name = "N")]
    threads: Option<usize>,
}

/// Plans and pushes each system in turn, returning one result per system in config order.
/// A blank line goes to `separator` before each system.
fn sync_systems(
    config: &Config,
    options: SyncOptions,
    separator: &mut dyn Write,
) -> Vec<Result<SyncStats, SyncError>> {
    config
        .systems
        .iter()
        .map(|system| -> Result<SyncStats, SyncError> {
            let _ = writeln!(separator);
            info!("Processing {}...", system.local_dir.display());

            let system_sync = SystemSync::new(system, &config.target, options)
                .map_err(|e| e.with_path(&system.local_dir))?;
            system_sync.print_summary();
            Ok(system_sync.rsync())
        })
        .collect()
}

fn main() {
    let cli = Cli::parse();

    if let Some(num_threads) = cli.threads
        && num_threads != 0
    {
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build_global()
            .unwrap_or_else(|e| {
                eprintln!("Failed to set thread pool: {}", e);
                std::process::exit(1);
            });
    }

    if let Err(e) = setup_logger(&cli.log_level, cli.log_file.as_deref()) {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    let config = match Config::load(&cli.config_file) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let mut had_error = false;

    if cli.print_config {
        info!("{}", config.summary());
    }

    if cli.write_config
        && let Err(e) = config.write(&cli.config_file)
    {
        error!("{}", e);
        had_error = true;
    }

    let options = SyncOptions {
        dry_run: cli.dry_run,
        no_run: cli.no_run,
    };

    let mut all_stats: Vec<SyncStats> = Vec::new();

    // With --json, stdout carries nothing but the JSON document.
    let results = if cli.json {
        sync_systems(&config, options, &mut io::stderr())
    } else {
        sync_systems(&config, options, &mut io::stdout())
    };

    for result in results {
        match result {
            Ok(stats) => {
                had_error |= stats.has_failures();
                all_stats.push(stats);
            }
            Err(e) => {
                error!("{}", e);
                had_error = true;
            }
        }
    }

    info!("Stats:");
    for stats in &all_stats {
        info!("{}", stats);
    }

    if cli.json {
        match serde_json::to_string_pretty(&all_stats) {
            Ok(json_output) => {
                println!("{}", json_output);
            }
            Err(e) => {
                eprintln!("Error serializing combined JSON output: {}", e);
                had_error = true;
            }
        }
    }

    if had_error {
        std::process::exit(1);
    }
}
