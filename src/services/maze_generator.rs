use crate::models::{Connectivity, Grid, GridError, Position};
use crate::services::connectivity::is_reachable;
use crate::services::pathfinding::{AStar, Path, SearchError};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use thiserror::Error;

/// Default number of layouts tried per obstacle count before reducing it
pub const DEFAULT_ATTEMPTS_PER_COUNT: u32 = 100;

/// Errors that can occur while generating a maze
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeneratorError {
    #[error("Invalid grid: {0}")]
    Grid(#[from] GridError),

    #[error("Agent start {0} is listed more than once")]
    DuplicateStart(Position),

    #[error("Requested {requested} obstacles but at most {capacity} fit")]
    TooManyObstacles { requested: usize, capacity: usize },

    #[error("No free cell left for the goal")]
    NoRoomForGoal,

    #[error("Initial path search failed: {0}")]
    Search(#[from] SearchError),
}

/// Parameters for [`MazeGenerator`]
#[derive(Clone, Debug)]
pub struct GeneratorConfig {
    pub rows: usize,
    pub cols: usize,
    /// Fixed agent start cells; never blocked and never chosen as the goal
    pub agent_starts: Vec<Position>,
    /// Layouts tried per obstacle count before the count is reduced by one
    pub attempts_per_count: u32,
    /// Movement model for the reachability check and the initial paths
    pub connectivity: Connectivity,
}

impl GeneratorConfig {
    /// Largest obstacle count that still leaves a free cell for the goal
    pub fn capacity(&self) -> usize {
        (self.rows * self.cols).saturating_sub(self.agent_starts.len() + 1)
    }
}

/// A validated maze with a reachable goal
#[derive(Clone, Debug)]
pub struct GeneratedMaze {
    pub grid: Grid,
    pub goal: Position,
    /// Obstacles actually placed
    pub obstacle_count: usize,
    /// Obstacles originally asked for
    pub requested: usize,
    /// How many times the count was reduced before a layout succeeded
    pub reductions: usize,
    /// Total layouts tried across all counts
    pub attempts: u32,
    /// Initial path for each agent, in `agent_starts` order
    pub agent_paths: Vec<Path>,
}

/// Random maze generator with a reachability guarantee.
///
/// Each attempt clears the grid, blocks `count` random cells (never an agent
/// start), drops the goal on a random remaining free cell and checks that
/// every agent can reach it. After `attempts_per_count` failed attempts the
/// count drops by one; zero obstacles always succeeds.
pub struct MazeGenerator<R: Rng = StdRng> {
    config: GeneratorConfig,
    rng: R,
}

impl MazeGenerator<StdRng> {
    /// Create a generator seeded from system entropy
    pub fn new(config: GeneratorConfig) -> Result<Self, GeneratorError> {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Create a reproducible generator
    pub fn with_seed(config: GeneratorConfig, seed: u64) -> Result<Self, GeneratorError> {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> MazeGenerator<R> {
    pub fn with_rng(config: GeneratorConfig, rng: R) -> Result<Self, GeneratorError> {
        let probe = Grid::new(config.rows, config.cols)?;
        for (i, start) in config.agent_starts.iter().enumerate() {
            probe.check_bounds(*start)?;
            if config.agent_starts[..i].contains(start) {
                return Err(GeneratorError::DuplicateStart(*start));
            }
        }
        if probe.cell_count() <= config.agent_starts.len() {
            return Err(GeneratorError::NoRoomForGoal);
        }

        Ok(Self { config, rng })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Generate a maze with `requested` obstacles, reducing the count if no
    /// valid layout turns up within the attempt bound.
    pub fn generate(&mut self, requested: usize) -> Result<GeneratedMaze, GeneratorError> {
        let capacity = self.config.capacity();
        if requested > capacity {
            return Err(GeneratorError::TooManyObstacles {
                requested,
                capacity,
            });
        }

        let mut grid = Grid::new(self.config.rows, self.config.cols)?;
        let candidates: Vec<Position> = grid
            .positions()
            .filter(|p| !self.config.agent_starts.contains(p))
            .collect();

        let mut attempts = 0u32;
        for count in (0..=requested).rev() {
            // Zero obstacles cannot fail, so one attempt is enough there.
            let bound = if count == 0 {
                1
            } else {
                self.config.attempts_per_count.max(1)
            };

            for _ in 0..bound {
                attempts += 1;
                let Some(goal) = self.try_layout(&mut grid, &candidates, count)? else {
                    continue;
                };

                let pathfinder = AStar::new(self.config.connectivity);
                let agent_paths = self
                    .config
                    .agent_starts
                    .iter()
                    .map(|&start| pathfinder.find_path(&grid, start, goal))
                    .collect::<Result<Vec<_>, _>>()?;

                let reductions = requested - count;
                if reductions > 0 {
                    tracing::warn!(
                        "Reduced obstacle count from {} to {} to keep the goal reachable",
                        requested,
                        count
                    );
                }
                tracing::info!(
                    "Generated {}x{} maze: {} obstacles, goal {}, {} attempts",
                    self.config.rows,
                    self.config.cols,
                    count,
                    goal,
                    attempts
                );

                return Ok(GeneratedMaze {
                    grid,
                    goal,
                    obstacle_count: count,
                    requested,
                    reductions,
                    attempts,
                    agent_paths,
                });
            }

            tracing::debug!(
                "No valid layout with {} obstacles after {} attempts",
                count,
                bound
            );
        }

        // The zero-obstacle layout connects every cell, so this is only
        // reachable if the grid has no cell for the goal.
        Err(GeneratorError::NoRoomForGoal)
    }

    /// One layout attempt. Returns the goal if every agent can reach it.
    fn try_layout(
        &mut self,
        grid: &mut Grid,
        candidates: &[Position],
        count: usize,
    ) -> Result<Option<Position>, GeneratorError> {
        grid.clear();
        for &position in candidates.choose_multiple(&mut self.rng, count) {
            grid.block(position)?;
        }

        let goal_cells: Vec<Position> = candidates
            .iter()
            .copied()
            .filter(|&p| grid.is_free(p))
            .collect();
        let Some(&goal) = goal_cells.choose(&mut self.rng) else {
            return Ok(None);
        };

        let connectivity = self.config.connectivity;
        let all_reach = self
            .config
            .agent_starts
            .iter()
            .all(|&start| is_reachable(grid, start, goal, connectivity));

        Ok(all_reach.then_some(goal))
    }
}

/// Block up to `count` random free cells, never touching `reserved`.
///
/// No reachability check is made. Returns the cells that were blocked, which
/// is fewer than `count` only if the grid runs out of free cells.
pub fn place_random_obstacles<R: Rng + ?Sized>(
    grid: &mut Grid,
    count: usize,
    reserved: &[Position],
    rng: &mut R,
) -> Result<Vec<Position>, GridError> {
    let available: Vec<Position> = grid
        .free_positions()
        .filter(|p| !reserved.contains(p))
        .collect();

    let chosen: Vec<Position> = available.choose_multiple(rng, count).copied().collect();
    for &position in &chosen {
        grid.block(position)?;
    }

    if chosen.len() < count {
        tracing::warn!(
            "Only {} of {} requested obstacles fit on the grid",
            chosen.len(),
            count
        );
    }

    Ok(chosen)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn race_config() -> GeneratorConfig {
        GeneratorConfig {
            rows: 10,
            cols: 15,
            agent_starts: vec![Position::new(0, 0), Position::new(9, 0)],
            attempts_per_count: DEFAULT_ATTEMPTS_PER_COUNT,
            connectivity: Connectivity::Four,
        }
    }

    #[test]
    fn test_capacity_leaves_room_for_goal() {
        assert_eq!(race_config().capacity(), 150 - 3);
    }

    #[test]
    fn test_generate_exact_count() {
        let mut generator = MazeGenerator::with_seed(race_config(), 7).unwrap();
        let maze = generator.generate(10).unwrap();

        assert_eq!(maze.obstacle_count, 10);
        assert_eq!(maze.grid.blocked_count(), 10);
        assert_eq!(maze.reductions, 0);
        assert_eq!(maze.agent_paths.len(), 2);
        for path in &maze.agent_paths {
            assert_eq!(path.goal(), Some(maze.goal));
        }
    }

    #[test]
    fn test_same_seed_same_maze() {
        let a = MazeGenerator::with_seed(race_config(), 42)
            .unwrap()
            .generate(20)
            .unwrap();
        let b = MazeGenerator::with_seed(race_config(), 42)
            .unwrap()
            .generate(20)
            .unwrap();
        assert_eq!(a.grid, b.grid);
        assert_eq!(a.goal, b.goal);
    }

    #[test]
    fn test_too_many_obstacles_rejected() {
        let mut generator = MazeGenerator::with_seed(race_config(), 1).unwrap();
        assert_eq!(
            generator.generate(148).unwrap_err(),
            GeneratorError::TooManyObstacles {
                requested: 148,
                capacity: 147
            }
        );
    }

    #[test]
    fn test_invalid_starts_rejected() {
        let mut config = race_config();
        config.agent_starts = vec![Position::new(0, 0), Position::new(0, 0)];
        assert!(matches!(
            MazeGenerator::with_seed(config, 0),
            Err(GeneratorError::DuplicateStart(_))
        ));

        let mut config = race_config();
        config.agent_starts = vec![Position::new(10, 0)];
        assert!(matches!(
            MazeGenerator::with_seed(config, 0),
            Err(GeneratorError::Grid(GridError::OutOfBounds { .. }))
        ));
    }

    #[test]
    fn test_saturated_request_degrades() {
        // Every non-start cell but one is requested as an obstacle.
        let config = GeneratorConfig {
            rows: 2,
            cols: 2,
            agent_starts: vec![Position::new(0, 0), Position::new(1, 1)],
            attempts_per_count: 5,
            connectivity: Connectivity::Four,
        };
        let mut generator = MazeGenerator::with_seed(config, 3).unwrap();
        let maze = generator.generate(1).unwrap();

        assert!(maze.obstacle_count <= 1);
        for start in [Position::new(0, 0), Position::new(1, 1)] {
            assert!(is_reachable(&maze.grid, start, maze.goal, Connectivity::Four));
        }
    }

    #[test]
    fn test_place_random_obstacles_skips_reserved() {
        let mut grid = Grid::new(3, 3).unwrap();
        let reserved = [Position::new(0, 0), Position::new(2, 2)];
        let mut rng = StdRng::seed_from_u64(9);

        let placed = place_random_obstacles(&mut grid, 7, &reserved, &mut rng).unwrap();
        assert_eq!(placed.len(), 7);
        assert_eq!(grid.blocked_count(), 7);
        assert!(reserved.iter().all(|&p| grid.is_free(p)));
    }

    #[test]
    fn test_place_random_obstacles_stops_when_full() {
        let mut grid = Grid::new(2, 2).unwrap();
        let reserved = [Position::new(0, 0)];
        let mut rng = StdRng::seed_from_u64(9);

        let placed = place_random_obstacles(&mut grid, 10, &reserved, &mut rng).unwrap();
        assert_eq!(placed.len(), 3);
        assert!(grid.is_free(Position::new(0, 0)));
    }
}
