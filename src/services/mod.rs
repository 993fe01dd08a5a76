//! Services module - Pure grid algorithms used by both demos.
//!
//! The services are **framework-agnostic**: they take a [`Grid`](crate::models::Grid)
//! and positions, return values, and never touch the terminal, the event loop or
//! [`StateManager`](crate::state::StateManager). Visualization hooks in through
//! [`SearchObserver`].
//!
//! # Components
//!
//! - [`AStar`]: A* search, 4- or 8-connected, with a pluggable [`Heuristic`].
//!   - [`AStar::find_path`] returns the [`Path`] (empty when unreachable)
//!   - [`AStar::search`] also reports every step to an observer and returns a
//!     [`SearchOutcome`] with expansion counts
//!
//! - [`connectivity`]: breadth-first [`is_reachable`], which the generator runs
//!   from every agent start before accepting a layout.
//!
//! - [`MazeGenerator`]: random race mazes where every agent can reach the goal.
//!   Bounded retries per obstacle count, then the count is reduced one at a time
//!   down to zero.
//!
//! - [`place_random_obstacles`]: unchecked random placement for the solver demo.
//!
//! # Usage Example
//!
//! ```
//! use mazerace::models::{Connectivity, Position};
//! use mazerace::services::{GeneratorConfig, MazeGenerator};
//!
//! let config = GeneratorConfig {
//!     rows: 10,
//!     cols: 15,
//!     agent_starts: vec![Position::new(0, 0), Position::new(9, 0)],
//!     attempts_per_count: 100,
//!     connectivity: Connectivity::Four,
//! };
//! let maze = MazeGenerator::with_seed(config, 1).unwrap().generate(10).unwrap();
//! assert!(maze.agent_paths.iter().all(|p| p.goal() == Some(maze.goal)));
//! ```

pub mod connectivity;
pub mod maze_generator;
pub mod pathfinding;

pub use connectivity::is_reachable;
pub use maze_generator::{
    DEFAULT_ATTEMPTS_PER_COUNT, GeneratedMaze, GeneratorConfig, GeneratorError, MazeGenerator,
    place_random_obstacles,
};
pub use pathfinding::{
    AStar, Heuristic, Path, SearchError, SearchNode, SearchObserver, SearchOutcome, SearchStep,
};
