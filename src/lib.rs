// mazerace - A* grid pathfinding demos
//
// This is the library crate containing the pathfinding and maze generation
// services, the demo state machines and the terminal front end.
// The binary crate (main.rs) provides the command-line entry point.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod state;
pub mod ui;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use models::{AppState, Connectivity, Grid, MazeConfig, Position};
pub use services::{AStar, Heuristic, MazeGenerator, Path};
pub use state::{StateChange, StateManager};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
