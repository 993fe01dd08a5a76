use crate::models::{Grid, GridError, Position};
use crate::services::maze_generator::{GeneratedMaze, place_random_obstacles};
use crate::services::pathfinding::{AStar, Path, SearchError, SearchObserver, SearchOutcome, SearchStep};
use rand::Rng;
use std::fmt;
use thiserror::Error;

/// Cells reserved by the solver demo (start and goal) that never hold an obstacle.
pub const SOLVER_RESERVED_CELLS: usize = 2;

/// Errors raised by setup and game transitions.
///
/// These are user mistakes or out-of-order input, not crashes: the session is
/// always left in a consistent phase and usually carries a notice for the user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SetupError {
    #[error("Cannot {action} while {phase}")]
    WrongPhase { action: &'static str, phase: String },

    #[error("The goal cannot be the same cell as the start")]
    GoalEqualsStart,

    #[error("Cell is outside the maze: {0}")]
    CellOutOfBounds(#[from] GridError),

    #[error("Configuration cancelled")]
    Cancelled,

    #[error("Count {value} is out of range (0-{max})")]
    CountOutOfRange { value: i64, max: usize },

    #[error("Error placing obstacles: {0}")]
    Placement(String),

    #[error("Search failed: {0}")]
    Search(#[from] SearchError),
}

/// Setup progression of the solver demo
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SolverPhase {
    #[default]
    SelectingStart,
    SelectingGoal,
    /// The obstacle-count dialog is open
    PlacingObstacles,
    Ready,
}

impl fmt::Display for SolverPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SolverPhase::SelectingStart => "selecting the start",
            SolverPhase::SelectingGoal => "selecting the goal",
            SolverPhase::PlacingObstacles => "placing obstacles",
            SolverPhase::Ready => "ready",
        };
        f.write_str(name)
    }
}

/// Result of the most recent solve
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SolveOutcome {
    Found { steps: usize, cost: f64 },
    NoPath,
}

/// Records expanded cells while forwarding every step to the caller's observer.
struct ExploredRecorder<'a, O: SearchObserver + ?Sized> {
    explored: Vec<Position>,
    inner: &'a mut O,
}

impl<O: SearchObserver + ?Sized> SearchObserver for ExploredRecorder<'_, O> {
    fn on_step(&mut self, step: &SearchStep) {
        if let SearchStep::Expanded { position, .. } = step {
            self.explored.push(*position);
        }
        self.inner.on_step(step);
    }
}

/// State of one solver-demo session: manual start/goal selection, random
/// obstacles, then step-by-step A*.
#[derive(Clone, Debug, PartialEq)]
pub struct SolverSession {
    pub phase: SolverPhase,
    pub grid: Grid,
    pub start: Option<Position>,
    pub goal: Option<Position>,
    pub obstacle_count: usize,
    /// Cells expanded by the last solve, in expansion order
    pub explored: Vec<Position>,
    pub path: Path,
    pub last_outcome: Option<SolveOutcome>,
    /// Completed solves on this session, including re-solves of the same maze
    pub solve_count: u32,
    /// User-facing message about the last rejected or notable action
    pub notice: Option<String>,
}

impl SolverSession {
    pub fn new(rows: usize, cols: usize) -> Result<Self, GridError> {
        Ok(Self {
            phase: SolverPhase::SelectingStart,
            grid: Grid::new(rows, cols)?,
            start: None,
            goal: None,
            obstacle_count: 0,
            explored: Vec::new(),
            path: Path::empty(),
            last_outcome: None,
            solve_count: 0,
            notice: None,
        })
    }

    /// Largest obstacle count the dialog accepts
    pub fn max_obstacles(&self) -> usize {
        self.grid.cell_count().saturating_sub(SOLVER_RESERVED_CELLS)
    }

    /// Text shown under the board for the current phase
    pub fn instructions(&self) -> String {
        match self.phase {
            SolverPhase::SelectingStart => "Select the START cell (row col)".to_string(),
            SolverPhase::SelectingGoal => "Now select the GOAL cell (row col)".to_string(),
            SolverPhase::PlacingObstacles => format!(
                "Enter number of obstacles (0-{}), or 'cancel'",
                self.max_obstacles()
            ),
            SolverPhase::Ready => "Maze configured. Type 'solve' to find the path".to_string(),
        }
    }

    /// Start configuring from scratch
    pub fn begin_setup(&mut self) {
        self.reset();
        tracing::debug!("Solver setup started");
    }

    /// Return to an empty grid in the first setup phase
    pub fn reset(&mut self) {
        self.grid.clear();
        self.phase = SolverPhase::SelectingStart;
        self.start = None;
        self.goal = None;
        self.obstacle_count = 0;
        self.explored.clear();
        self.path = Path::empty();
        self.last_outcome = None;
        self.notice = None;
    }

    /// Handle a click on a cell.
    ///
    /// Clicks after the goal has been chosen are ignored.
    pub fn select_cell(&mut self, position: Position) -> Result<SolverPhase, SetupError> {
        if let Err(e) = self.grid.check_bounds(position) {
            self.notice = Some(e.to_string());
            return Err(e.into());
        }

        match self.phase {
            SolverPhase::SelectingStart => {
                self.start = Some(position);
                self.phase = SolverPhase::SelectingGoal;
                self.notice = None;
                tracing::info!("Start selected at {}", position);
            }
            SolverPhase::SelectingGoal => {
                if self.start == Some(position) {
                    let err = SetupError::GoalEqualsStart;
                    self.notice = Some(err.to_string());
                    tracing::warn!("Rejected goal {}: same as start", position);
                    return Err(err);
                }
                self.goal = Some(position);
                self.phase = SolverPhase::PlacingObstacles;
                self.notice = None;
                tracing::info!("Goal selected at {}", position);
            }
            SolverPhase::PlacingObstacles | SolverPhase::Ready => {
                tracing::debug!("Ignoring click at {} while {}", position, self.phase);
            }
        }

        Ok(self.phase)
    }

    /// Answer the obstacle-count dialog.
    ///
    /// `None` means the dialog was cancelled. A cancelled or out-of-range
    /// answer, or any placement failure, resets the whole session.
    pub fn place_obstacles<R: Rng + ?Sized>(
        &mut self,
        answer: Option<i64>,
        rng: &mut R,
    ) -> Result<usize, SetupError> {
        if self.phase != SolverPhase::PlacingObstacles {
            return Err(SetupError::WrongPhase {
                action: "place obstacles",
                phase: self.phase.to_string(),
            });
        }

        let max = self.max_obstacles();
        let count = match answer {
            None => {
                self.reset();
                tracing::info!("Obstacle dialog cancelled, maze cleared");
                return Err(SetupError::Cancelled);
            }
            Some(value) => match usize::try_from(value) {
                Ok(count) if count <= max => count,
                _ => {
                    let err = SetupError::CountOutOfRange { value, max };
                    self.reset();
                    self.notice = Some(err.to_string());
                    tracing::warn!("Rejected obstacle count {}: {}", value, err);
                    return Err(err);
                }
            },
        };

        let reserved: Vec<Position> = self.start.into_iter().chain(self.goal).collect();
        match place_random_obstacles(&mut self.grid, count, &reserved, rng) {
            Ok(placed) => {
                self.obstacle_count = placed.len();
                self.phase = SolverPhase::Ready;
                self.notice = None;
                tracing::info!("Placed {} obstacles", placed.len());
                Ok(placed.len())
            }
            Err(e) => {
                let err = SetupError::Placement(e.to_string());
                self.reset();
                self.notice = Some(err.to_string());
                tracing::error!("{}", err);
                Err(err)
            }
        }
    }

    /// Run A* from start to goal, forwarding each step to `observer`.
    ///
    /// The session stays `Ready` afterwards so the same maze can be re-solved.
    pub fn solve<O: SearchObserver + ?Sized>(
        &mut self,
        pathfinder: &AStar,
        observer: &mut O,
    ) -> Result<SearchOutcome, SetupError> {
        let (Some(start), Some(goal), SolverPhase::Ready) = (self.start, self.goal, self.phase)
        else {
            let err = SetupError::WrongPhase {
                action: "solve",
                phase: self.phase.to_string(),
            };
            self.notice = Some("Configure the maze completely first".to_string());
            return Err(err);
        };

        let mut recorder = ExploredRecorder {
            explored: Vec::new(),
            inner: observer,
        };
        let outcome = pathfinder.search(&self.grid, start, goal, &mut recorder)?;

        self.explored = recorder.explored;
        self.solve_count += 1;
        self.path = outcome.path.clone();
        self.last_outcome = Some(if outcome.found() {
            SolveOutcome::Found {
                steps: outcome.path.steps(),
                cost: outcome.path.cost(),
            }
        } else {
            SolveOutcome::NoPath
        });
        self.notice = Some(match self.last_outcome {
            Some(SolveOutcome::Found { .. }) => "Path found!".to_string(),
            _ => "No path found!".to_string(),
        });

        Ok(outcome)
    }
}

/// The two racers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Agent {
    Player,
    Ai,
}

/// Movement keys of the race demo
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub fn offset(self) -> (isize, isize) {
        match self {
            Direction::Up => (-1, 0),
            Direction::Down => (1, 0),
            Direction::Left => (0, -1),
            Direction::Right => (0, 1),
        }
    }
}

/// How a round ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RoundResult {
    PlayerReachedGoal,
    AiReachedGoal,
    /// The AI moved onto the player (or the player onto the AI)
    PlayerCaught,
}

impl RoundResult {
    pub fn winner(self) -> Agent {
        match self {
            RoundResult::PlayerReachedGoal => Agent::Player,
            RoundResult::AiReachedGoal | RoundResult::PlayerCaught => Agent::Ai,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            RoundResult::PlayerReachedGoal => "You reached the goal first!",
            RoundResult::AiReachedGoal => "The AI reached the goal first",
            RoundResult::PlayerCaught => "The AI caught you!",
        }
    }
}

/// Round progression of the race demo
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RacePhase {
    /// The block-count dialog is open
    Configuring,
    #[default]
    WaitingToStart,
    Active,
    Resolved(RoundResult),
}

impl fmt::Display for RacePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RacePhase::Configuring => f.write_str("configuring"),
            RacePhase::WaitingToStart => f.write_str("waiting to start"),
            RacePhase::Active => f.write_str("racing"),
            RacePhase::Resolved(result) => write!(f, "resolved ({:?})", result),
        }
    }
}

/// Fixed rules of a race session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RaceRules {
    pub player_start: Position,
    pub ai_start: Position,
    /// Upper bound accepted by the block-count dialog
    pub max_blocks: usize,
}

/// State of one race-demo session. Scores accumulate across rounds.
#[derive(Clone, Debug, PartialEq)]
pub struct RaceSession {
    pub rules: RaceRules,
    pub phase: RacePhase,
    pub grid: Grid,
    pub player: Position,
    pub ai: Position,
    pub goal: Position,
    pub player_path: Path,
    pub ai_path: Path,
    /// Block count the user asked for
    pub block_count: usize,
    /// Blocks actually on the board (may be lower after generator fallback)
    pub placed_blocks: usize,
    pub player_wins: u32,
    pub ai_wins: u32,
    pub rounds_played: u32,
    pub notice: Option<String>,
}

impl RaceSession {
    /// Create a session around a freshly generated first round.
    ///
    /// `maze.agent_paths` must be in `[player, ai]` order.
    pub fn new(rules: RaceRules, block_count: usize, maze: GeneratedMaze) -> Self {
        let mut session = Self {
            rules,
            phase: RacePhase::WaitingToStart,
            grid: maze.grid.clone(),
            player: rules.player_start,
            ai: rules.ai_start,
            goal: maze.goal,
            player_path: Path::empty(),
            ai_path: Path::empty(),
            block_count,
            placed_blocks: 0,
            player_wins: 0,
            ai_wins: 0,
            rounds_played: 0,
            notice: None,
        };
        session.install_round(maze);
        session
    }

    /// Replace the board with a new round and wait for Return.
    pub fn install_round(&mut self, maze: GeneratedMaze) {
        let mut paths = maze.agent_paths.into_iter();
        self.player_path = paths.next().unwrap_or_default();
        self.ai_path = paths.next().unwrap_or_default();
        self.grid = maze.grid;
        self.goal = maze.goal;
        self.player = self.rules.player_start;
        self.ai = self.rules.ai_start;
        self.placed_blocks = maze.obstacle_count;
        self.phase = RacePhase::WaitingToStart;
        self.notice = (maze.reductions > 0).then(|| {
            format!(
                "Could not fit {} blocks with a reachable goal; using {}",
                maze.requested, maze.obstacle_count
            )
        });
    }

    /// Scoreboard line
    pub fn status_line(&self) -> String {
        format!(
            "Wins - You: {} | AI: {} | Blocks: {}",
            self.player_wins, self.ai_wins, self.block_count
        )
    }

    pub fn instructions(&self) -> String {
        match self.phase {
            RacePhase::Configuring => format!(
                "Enter number of blocks (0-{}), or 'cancel'",
                self.rules.max_blocks
            ),
            RacePhase::WaitingToStart => "Press Enter to start".to_string(),
            RacePhase::Active => "Move with your keys, quit to exit".to_string(),
            RacePhase::Resolved(result) => {
                format!("{} Press Enter for the next round", result.message())
            }
        }
    }

    /// Open the block-count dialog. Allowed in any phase; pauses a running round.
    pub fn open_configuration(&mut self) {
        self.phase = RacePhase::Configuring;
        self.notice = None;
    }

    /// Answer the block-count dialog.
    ///
    /// On success the new count is stored and the caller must install a new
    /// round. A cancelled or out-of-range answer aborts configuration and keeps
    /// the current board.
    pub fn configure_blocks(&mut self, answer: Option<i64>) -> Result<usize, SetupError> {
        if self.phase != RacePhase::Configuring {
            return Err(SetupError::WrongPhase {
                action: "configure blocks",
                phase: self.phase.to_string(),
            });
        }

        let max = self.rules.max_blocks;
        let result = match answer {
            None => Err(SetupError::Cancelled),
            Some(value) => match usize::try_from(value) {
                Ok(count) if count <= max => Ok(count),
                _ => Err(SetupError::CountOutOfRange { value, max }),
            },
        };

        match result {
            Ok(count) => {
                self.block_count = count;
                tracing::info!("Block count set to {}", count);
            }
            Err(ref e) => {
                self.phase = RacePhase::WaitingToStart;
                if !matches!(e, SetupError::Cancelled) {
                    self.notice = Some(format!("Please enter a number between 0 and {}", max));
                    tracing::warn!("Rejected block count: {}", e);
                }
            }
        }

        result
    }

    /// Return pressed while waiting: the round begins (or resumes).
    pub fn start_round(&mut self) -> Result<(), SetupError> {
        if self.phase != RacePhase::WaitingToStart {
            return Err(SetupError::WrongPhase {
                action: "start a round",
                phase: self.phase.to_string(),
            });
        }
        self.phase = RacePhase::Active;
        self.notice = None;
        tracing::info!("Round started, goal at {}", self.goal);
        Ok(())
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.phase, RacePhase::Resolved(_))
    }

    /// Move the player one cell. Moves into walls or off the board are ignored.
    pub fn move_player(
        &mut self,
        direction: Direction,
        pathfinder: &AStar,
    ) -> Result<Option<RoundResult>, SetupError> {
        if self.phase != RacePhase::Active {
            return Err(SetupError::WrongPhase {
                action: "move",
                phase: self.phase.to_string(),
            });
        }

        let (d_row, d_col) = direction.offset();
        let Some(target) = self
            .player
            .offset(d_row, d_col)
            .filter(|&p| self.grid.is_free(p))
        else {
            tracing::trace!("Player move {:?} blocked at {}", direction, self.player);
            return Ok(None);
        };

        self.player = target;
        self.player_path = pathfinder.find_path(&self.grid, self.player, self.goal)?;
        Ok(self.check_round_end())
    }

    /// Timer tick: recompute the AI's path from where it stands and take one step.
    pub fn advance_ai(&mut self, pathfinder: &AStar) -> Result<Option<RoundResult>, SetupError> {
        if self.phase != RacePhase::Active {
            return Err(SetupError::WrongPhase {
                action: "advance the AI",
                phase: self.phase.to_string(),
            });
        }

        let path = pathfinder.find_path(&self.grid, self.ai, self.goal)?;
        match path.next_step() {
            Some(next) => {
                self.ai = next;
                self.ai_path = path.trimmed_front();
            }
            None => {
                self.ai_path = path;
            }
        }

        Ok(self.check_round_end())
    }

    /// Resolve the round if someone reached the goal or the AI caught the player.
    fn check_round_end(&mut self) -> Option<RoundResult> {
        let result = if self.player == self.goal {
            RoundResult::PlayerReachedGoal
        } else if self.ai == self.goal {
            RoundResult::AiReachedGoal
        } else if self.player == self.ai {
            RoundResult::PlayerCaught
        } else {
            return None;
        };

        match result.winner() {
            Agent::Player => self.player_wins += 1,
            Agent::Ai => self.ai_wins += 1,
        }
        self.rounds_played += 1;
        self.phase = RacePhase::Resolved(result);
        self.notice = Some(result.message().to_string());
        tracing::info!("Round over: {:?} ({})", result, self.status_line());

        Some(result)
    }
}

/// Single source of truth for the running demo.
///
/// Only one demo runs per process, so exactly one of the sessions is set
/// once the controller has started.
///
/// # Thread Safety
///
/// `AppState` is wrapped in `Arc<RwLock<AppState>>` by [`crate::state::StateManager`].
/// Mutate it through [`StateManager::update`](crate::state::StateManager::update)
/// so change events are emitted.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AppState {
    pub solver: Option<SolverSession>,
    pub race: Option<RaceSession>,
    pub quit_requested: bool,
}
