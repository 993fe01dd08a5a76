//! mazerace - A* grid pathfinding demos in the terminal
//!
//! Main entry point for the command-line application.
//!
//! # Overview
//!
//! Two demos share one A* implementation:
//! - `solver`: pick a start and a goal on a 5x5 board, drop random obstacles,
//!   then watch the 8-connected search expand cell by cell
//! - `race`: race an A*-driven AI to a random goal on a 15x10 maze that is
//!   regenerated every round (4-connected, Manhattan heuristic)
//!
//! # Execution Flow
//!
//! 1. Parse the command line
//! 2. Load `mazerace.yaml` from the config directory (defaults if missing)
//! 3. Initialize logging -> `<log_dir>/mazerace.<date>`
//! 4. Create a single-threaded tokio runtime
//! 5. Create StateManager, Metrics and the GameController for the chosen demo
//! 6. Spawn the stdin reader and run the event loop until quit or EOF
//! 7. Log the metrics summary and shut the runtime down

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use mazerace::logging::{LOG_PREFIX, setup_logging_with_console};
use mazerace::metrics::Metrics;
use mazerace::ui::{Demo, EventLoopBridge, GameController, InputParser, spawn_state_logger};
use mazerace::{APP_NAME, ConfigManager, StateManager, VERSION};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;

/// CLI arguments
#[derive(Parser)]
#[command(name = "mazerace")]
#[command(about = "A* pathfinding demos: a step-by-step maze solver and a race against an AI")]
#[command(version)]
struct Cli {
    /// Directory holding mazerace.yaml and, by default, the logs
    #[arg(long, value_name = "DIR", default_value = "mazerace_data", global = true)]
    config_dir: Utf8PathBuf,

    /// Log at debug level regardless of the config file
    #[arg(long, global = true)]
    debug: bool,

    /// Do not mirror logs to stderr
    #[arg(long, global = true)]
    quiet: bool,

    /// Seed for obstacle placement and maze generation
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Step-visualized A* on a small grid
    Solver,
    /// Player vs AI race on generated mazes
    Race,
    /// Write the default mazerace.yaml if none exists
    InitConfig,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_manager = ConfigManager::new(&cli.config_dir)?;

    let demo = match cli.command {
        Command::Solver => Demo::Solver,
        Command::Race => Demo::Race,
        Command::InitConfig => {
            if config_manager.write_default_if_missing()? {
                println!("Wrote {}", config_manager.config_path());
            } else {
                println!("{} already exists", config_manager.config_path());
            }
            return Ok(());
        }
    };

    let mut config = config_manager.load()?;
    if cli.debug {
        config.logging.debug_mode = true;
    }
    if cli.quiet {
        config.logging.console = false;
    }

    // The guard flushes the file appender when dropped at the end of main.
    let _log_guard = setup_logging_with_console(
        &config_manager.log_dir(&config),
        LOG_PREFIX,
        config.logging.debug_mode,
        config.logging.console,
    )?;

    tracing::info!("Starting {} v{} ({:?})", APP_NAME, VERSION, demo);
    tracing::info!("Using config directory {}", config_manager.config_dir());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .thread_name("mazerace-main")
        .build()
        .context("Failed to create the tokio runtime")?;

    let state_manager = StateManager::new();
    let metrics = Arc::new(Metrics::new());

    let result = runtime.block_on(async {
        let _state_logger = spawn_state_logger(&state_manager);

        let parser = match demo {
            Demo::Solver => InputParser::solver(),
            Demo::Race => InputParser::race(&config.race.keys),
        }
        .context("Failed to build the input parser")?;

        let mut controller = GameController::new(
            demo,
            config,
            state_manager.clone(),
            Arc::clone(&metrics),
            std::io::stdout(),
            cli.seed,
        )?;

        let bridge = EventLoopBridge::new();
        bridge.spawn_input_reader(BufReader::new(tokio::io::stdin()), parser);
        bridge.run(&mut controller).await
    });

    if let Err(e) = &result {
        tracing::error!("Event loop failed: {:#}", e);
    }

    metrics.log_summary();

    // A pending stdin read cannot be cancelled; don't wait on it for long.
    runtime.shutdown_timeout(Duration::from_millis(500));

    tracing::info!("Application shutdown complete");
    result
}
