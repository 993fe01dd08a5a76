// Session counters
//
// Atomic tallies of searches, generated mazes and race rounds, logged as a
// summary on shutdown.

use crate::models::Agent;
use crate::services::{GeneratedMaze, SearchOutcome};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Session-wide counters
///
/// Uses atomic operations so a shared reference can be handed to the
/// controller and the summary logger without locks.
#[derive(Debug)]
pub struct Metrics {
    /// Visualized solver searches
    pub searches: AtomicU64,

    /// Nodes expanded across all searches
    pub nodes_expanded: AtomicU64,

    /// Searches that found a path
    pub paths_found: AtomicU64,

    /// Searches that proved the goal unreachable
    pub searches_without_path: AtomicU64,

    /// Race route updates; expansions are not tracked for these
    pub path_queries: AtomicU64,

    /// Race route updates that found no route
    pub path_queries_unreachable: AtomicU64,

    /// Race mazes generated
    pub mazes_generated: AtomicU64,

    /// Layouts tried by the generator
    pub generation_attempts: AtomicU64,

    /// Times the generator lowered the obstacle count
    pub obstacle_reductions: AtomicU64,

    pub rounds_played: AtomicU64,
    pub player_wins: AtomicU64,
    pub ai_wins: AtomicU64,

    /// Input lines that could not be parsed
    pub rejected_inputs: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            searches: AtomicU64::new(0),
            nodes_expanded: AtomicU64::new(0),
            paths_found: AtomicU64::new(0),
            searches_without_path: AtomicU64::new(0),
            path_queries: AtomicU64::new(0),
            path_queries_unreachable: AtomicU64::new(0),
            mazes_generated: AtomicU64::new(0),
            generation_attempts: AtomicU64::new(0),
            obstacle_reductions: AtomicU64::new(0),
            rounds_played: AtomicU64::new(0),
            player_wins: AtomicU64::new(0),
            ai_wins: AtomicU64::new(0),
            rejected_inputs: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a completed search with its expansion count
    pub fn record_search(&self, outcome: &SearchOutcome) {
        self.searches.fetch_add(1, Ordering::Relaxed);
        self.nodes_expanded
            .fetch_add(outcome.expanded as u64, Ordering::Relaxed);
        if outcome.found() {
            self.paths_found.fetch_add(1, Ordering::Relaxed);
        } else {
            self.searches_without_path.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a race route update where only the result is known
    pub fn record_path_query(&self, found: bool) {
        self.path_queries.fetch_add(1, Ordering::Relaxed);
        if !found {
            self.path_queries_unreachable
                .fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_maze(&self, maze: &GeneratedMaze) {
        self.mazes_generated.fetch_add(1, Ordering::Relaxed);
        self.generation_attempts
            .fetch_add(u64::from(maze.attempts), Ordering::Relaxed);
        self.obstacle_reductions
            .fetch_add(maze.reductions as u64, Ordering::Relaxed);
    }

    pub fn record_round(&self, winner: Agent) {
        self.rounds_played.fetch_add(1, Ordering::Relaxed);
        match winner {
            Agent::Player => self.player_wins.fetch_add(1, Ordering::Relaxed),
            Agent::Ai => self.ai_wins.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn record_rejected_input(&self) {
        self.rejected_inputs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average nodes expanded per solver search
    pub fn avg_expanded(&self) -> f64 {
        let total = self.nodes_expanded.load(Ordering::Relaxed);
        let count = self.searches.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Session Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Searches: {} ({} found, {} without path), avg {:.1} nodes expanded",
            self.searches.load(Ordering::Relaxed),
            self.paths_found.load(Ordering::Relaxed),
            self.searches_without_path.load(Ordering::Relaxed),
            self.avg_expanded()
        );
        tracing::info!(
            "Race route updates: {} ({} without route)",
            self.path_queries.load(Ordering::Relaxed),
            self.path_queries_unreachable.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Mazes: {} generated, {} layouts tried, {} count reductions",
            self.mazes_generated.load(Ordering::Relaxed),
            self.generation_attempts.load(Ordering::Relaxed),
            self.obstacle_reductions.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Rounds: {} played, player {} - AI {}",
            self.rounds_played.load(Ordering::Relaxed),
            self.player_wins.load(Ordering::Relaxed),
            self.ai_wins.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Rejected inputs: {}",
            self.rejected_inputs.load(Ordering::Relaxed)
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
