//! Data models for mazerace.
//!
//! This module contains the core data structures shared by the services and the UI:
//! - [`Grid`], [`Position`], [`Connectivity`]: the board both demos play on
//! - [`AppState`]: the central state container holding the running session
//! - [`SolverSession`] / [`RaceSession`]: the two demo state machines
//! - [`MazeConfig`]: settings loaded from `mazerace.yaml`
//!
//! # Architecture Note
//!
//! - **Serializable**: config structs derive `Serialize`/`Deserialize` for YAML persistence
//! - **Cloneable**: AppState is wrapped in `Arc<RwLock<>>` by [`StateManager`](crate::state::StateManager)
//! - **Transitions live on the sessions**: the controller calls them inside
//!   `StateManager::update()` so every change is broadcast

pub mod app_state;
pub mod config;
pub mod grid;

pub use app_state::{
    Agent, AppState, Direction, RacePhase, RaceRules, RaceSession, RoundResult, SetupError,
    SolveOutcome, SolverPhase, SolverSession,
};
pub use config::{ConfigError, KeyAction, LoggingSettings, MazeConfig, RaceSettings, SolverSettings};
pub use grid::{Cell, Connectivity, Grid, GridError, Position};
