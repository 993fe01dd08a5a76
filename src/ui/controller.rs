// Game Controller - Bridges terminal input with state management
//
// This module contains the GameController which coordinates between:
// - AppMessages parsed from terminal input (or produced by the timer)
// - StateManager (the running solver or race session)
// - Services (A* pathfinding and maze generation)
// - The ASCII renderer writing to the output stream
//
// Every message is handled to completion before the next one; the
// visualized solve holds up the loop until the search finishes.

use crate::metrics::Metrics;
use crate::models::{
    Agent, KeyAction, MazeConfig, RacePhase, RaceRules, RaceSession, SolverPhase, SolverSession,
};
use crate::services::{AStar, GeneratorConfig, MazeGenerator};
use crate::state::{StateChange, StateManager};
use crate::ui::input::AppMessage;
use crate::ui::render::{StepRenderer, render_race, render_solver};
use anyhow::{Context, Result};
use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

/// The two demos
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Demo {
    /// 5x5 step-visualized A* solver
    Solver,
    /// Player-vs-AI race on generated mazes
    Race,
}

/// Whether the event loop should keep going after a message
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

const SOLVER_HELP: &str = "\
Commands:
  setup            start configuring a maze
  <row> <col>      select a cell (start first, then goal)
  <n> | cancel     answer the obstacle dialog
  solve            run A* step by step
  clear            empty the board
  quit             leave";

/// Controller that owns the running session and reacts to messages
///
/// This is the main coordinator for the terminal front end. It:
/// - Installs the solver or race session into the [`StateManager`]
/// - Applies each [`AppMessage`] through `StateManager::update` so change
///   events are broadcast
/// - Runs the services (search, generation) and records [`Metrics`]
/// - Redraws the board when the state changed
///
/// # Example
/// ```ignore
/// let mut controller = GameController::new(
///     Demo::Race,
///     config,
///     StateManager::new(),
///     Arc::new(Metrics::new()),
///     std::io::stdout(),
///     None,
/// )?;
/// controller.handle(AppMessage::Return)?;
/// ```
pub struct GameController<W: Write> {
    demo: Demo,
    settings: MazeConfig,
    state_manager: StateManager,
    metrics: Arc<Metrics>,
    solver_pathfinder: AStar,
    race_pathfinder: AStar,
    /// Only set for the race
    generator: Option<MazeGenerator>,
    rng: StdRng,
    /// Time accumulated toward the next AI move
    ai_elapsed: Duration,
    out: W,
}

impl<W: Write> GameController<W> {
    /// Create a controller and install the session for `demo`.
    ///
    /// For the race this generates the first maze with the configured
    /// initial block count. `seed` makes obstacle placement reproducible.
    pub fn new(
        demo: Demo,
        settings: MazeConfig,
        state_manager: StateManager,
        metrics: Arc<Metrics>,
        out: W,
        seed: Option<u64>,
    ) -> Result<Self> {
        settings.validate().context("Invalid settings")?;

        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        // Each connectivity picks its own admissible heuristic.
        let solver_pathfinder = AStar::new(settings.solver.connectivity);
        let race_pathfinder = AStar::new(settings.race.connectivity);

        let generator = match demo {
            Demo::Solver => {
                let session = SolverSession::new(settings.solver.rows, settings.solver.cols)
                    .context("Failed to create the solver grid")?;
                state_manager.start_solver(session);
                None
            }
            Demo::Race => {
                let race = &settings.race;
                let config = GeneratorConfig {
                    rows: race.rows,
                    cols: race.cols,
                    agent_starts: vec![race.player_start, race.ai_start],
                    attempts_per_count: race.generation_attempts,
                    connectivity: race.connectivity,
                };
                let generator_seed = rng.r#gen::<u64>();
                let mut generator = MazeGenerator::with_seed(config, generator_seed)
                    .context("Failed to create the maze generator")?;

                let maze = generator
                    .generate(race.initial_blocks)
                    .context("Failed to generate the first maze")?;
                metrics.record_maze(&maze);

                let rules = RaceRules {
                    player_start: race.player_start,
                    ai_start: race.ai_start,
                    max_blocks: race.max_blocks,
                };
                state_manager.start_race(RaceSession::new(rules, race.initial_blocks, maze));
                Some(generator)
            }
        };

        tracing::info!("Game controller initialized for {:?}", demo);

        Ok(Self {
            demo,
            settings,
            state_manager,
            metrics,
            solver_pathfinder,
            race_pathfinder,
            generator,
            rng,
            ai_elapsed: Duration::ZERO,
            out,
        })
    }

    pub fn demo(&self) -> Demo {
        self.demo
    }

    pub fn state_manager(&self) -> &StateManager {
        &self.state_manager
    }

    /// Length of one timer tick
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.settings.race.tick_ms)
    }

    /// True while a race round is running and the AI needs timer ticks
    pub fn wants_ticks(&self) -> bool {
        self.demo == Demo::Race
            && self
                .state_manager
                .read(|state| state.race.as_ref().map(|r| r.phase) == Some(RacePhase::Active))
    }

    /// Draw the current board and instructions
    pub fn render(&mut self) -> Result<()> {
        let text = self.state_manager.read(|state| match self.demo {
            Demo::Solver => state.solver.as_ref().map(render_solver),
            Demo::Race => state.race.as_ref().map(render_race),
        });
        if let Some(text) = text {
            writeln!(self.out, "\n{}", text).context("Failed to write the board")?;
            self.out.flush().context("Failed to flush the board")?;
        }
        Ok(())
    }

    /// Apply one message, redrawing the board if anything changed.
    pub fn handle(&mut self, message: AppMessage) -> Result<Flow> {
        tracing::trace!("Handling {:?}", message);

        let changes = match (self.demo, message) {
            (_, AppMessage::Quit) => {
                self.state_manager.request_quit();
                tracing::info!("Quit requested");
                return Ok(Flow::Quit);
            }
            (_, AppMessage::Help) => {
                self.write_help()?;
                return Ok(Flow::Continue);
            }
            (_, AppMessage::Invalid(reason)) => {
                self.metrics.record_rejected_input();
                writeln!(self.out, "! {} (type 'help')", reason)
                    .context("Failed to write the input error")?;
                return Ok(Flow::Continue);
            }

            (Demo::Solver, AppMessage::BeginSetup) => self.update_solver(|s| {
                s.begin_setup();
            }),
            (Demo::Solver, AppMessage::SelectCell(position)) => self.update_solver(|s| {
                if let Err(e) = s.select_cell(position) {
                    tracing::warn!("Cell selection rejected: {}", e);
                }
            }),
            (Demo::Solver, AppMessage::DialogAnswer(answer)) => self.place_obstacles(answer),
            (Demo::Solver, AppMessage::Solve) => self.solve()?,
            (Demo::Solver, AppMessage::Clear) => self.state_manager.reset_solver(),

            (Demo::Race, AppMessage::Return) => self.race_return()?,
            (Demo::Race, AppMessage::Move(direction)) => {
                let pathfinder = self.race_pathfinder;
                let (result, changes) = self.state_manager.update_with(|state| {
                    state.race.as_mut().map(|race| {
                        race.move_player(direction, &pathfinder)
                            .map(|_| !race.player_path.is_empty())
                    })
                });
                match result {
                    Some(Ok(found)) => {
                        let moved = changes.iter().any(|c| {
                            matches!(c, StateChange::AgentMoved { agent: Agent::Player, .. })
                        });
                        if moved {
                            self.metrics.record_path_query(found);
                        }
                        self.record_rounds(&changes);
                    }
                    Some(Err(e)) => tracing::debug!("Move ignored: {}", e),
                    None => {}
                }
                changes
            }
            (Demo::Race, AppMessage::Tick) => self.tick(),
            (Demo::Race, AppMessage::OpenConfiguration) => self.update_race(|race| {
                race.open_configuration();
            }),
            (Demo::Race, AppMessage::DialogAnswer(answer)) => self.configure_blocks(answer)?,
            (Demo::Race, AppMessage::ConfigureBlocks(value)) => {
                let mut changes = self.update_race(|race| race.open_configuration());
                changes.extend(self.configure_blocks(Some(value))?);
                changes
            }

            (demo, message) => {
                tracing::debug!("{:?} does not apply to the {:?} demo", message, demo);
                Vec::new()
            }
        };

        if !changes.is_empty() {
            self.render()?;
        }
        Ok(Flow::Continue)
    }

    fn write_help(&mut self) -> Result<()> {
        let help = match self.demo {
            Demo::Solver => SOLVER_HELP.to_string(),
            Demo::Race => {
                let mut help = String::from("Keys:\n");
                for action in [
                    KeyAction::Up,
                    KeyAction::Left,
                    KeyAction::Down,
                    KeyAction::Right,
                    KeyAction::Quit,
                ] {
                    if let Some(key) = self.settings.race.key_for(action) {
                        help.push_str(&format!("  {}  {:?}\n", key, action));
                    }
                }
                help.push_str(&format!(
                    "  <Enter>  start / next round\n  blocks [n]  set the number of blocks (0-{})\n  quit  leave",
                    self.settings.race.max_blocks
                ));
                help
            }
        };
        writeln!(self.out, "{}", help).context("Failed to write help")
    }

    fn update_solver(&self, f: impl FnOnce(&mut SolverSession)) -> Vec<StateChange> {
        self.state_manager.update(|state| {
            if let Some(solver) = state.solver.as_mut() {
                f(solver);
            }
        })
    }

    fn update_race(&self, f: impl FnOnce(&mut RaceSession)) -> Vec<StateChange> {
        self.state_manager.update(|state| {
            if let Some(race) = state.race.as_mut() {
                f(race);
            }
        })
    }

    fn place_obstacles(&mut self, answer: Option<i64>) -> Vec<StateChange> {
        let rng = &mut self.rng;
        let (result, changes) = self.state_manager.update_with(|state| {
            state
                .solver
                .as_mut()
                .map(|solver| solver.place_obstacles(answer, rng))
        });
        if let Some(Err(e)) = result {
            tracing::warn!("Obstacle placement aborted: {}", e);
        }
        changes
    }

    /// Run the visualized search, drawing every expansion to the output.
    fn solve(&mut self) -> Result<Vec<StateChange>> {
        let setup = self.state_manager.read(|state| {
            state.solver.as_ref().and_then(|s| match (s.phase, s.start, s.goal) {
                (SolverPhase::Ready, Some(start), Some(goal)) => Some((s.grid.clone(), start, goal)),
                _ => None,
            })
        });

        let Some((grid, start, goal)) = setup else {
            // Let the session record why solving is not possible yet.
            let pathfinder = self.solver_pathfinder;
            return Ok(self.update_solver(|s| {
                if let Err(e) = s.solve(&pathfinder, &mut ()) {
                    tracing::warn!("Solve rejected: {}", e);
                }
            }));
        };

        tracing::info!("Solving from {} to {}", start, goal);
        let delay = Duration::from_millis(self.settings.solver.step_delay_ms);
        let mut renderer = StepRenderer::new(grid, start, goal, delay, &mut self.out);
        let pathfinder = self.solver_pathfinder;

        let (result, changes) = self.state_manager.update_with(|state| {
            state
                .solver
                .as_mut()
                .map(|solver| solver.solve(&pathfinder, &mut renderer))
        });

        match result {
            Some(Ok(outcome)) => {
                self.metrics.record_search(&outcome);
                if outcome.found() {
                    tracing::info!(
                        "Path found: {} steps, {} nodes expanded",
                        outcome.path.steps(),
                        outcome.expanded
                    );
                } else {
                    tracing::info!("No path after expanding {} nodes", outcome.expanded);
                }
            }
            Some(Err(e)) => tracing::warn!("Solve failed: {}", e),
            None => {}
        }
        Ok(changes)
    }

    /// Return key: start a waiting round, or move past a finished one.
    fn race_return(&mut self) -> Result<Vec<StateChange>> {
        let phase = self
            .state_manager
            .read(|state| state.race.as_ref().map(|r| r.phase));

        match phase {
            Some(RacePhase::WaitingToStart) => {
                self.ai_elapsed = Duration::ZERO;
                Ok(self.update_race(|race| {
                    if let Err(e) = race.start_round() {
                        tracing::warn!("{}", e);
                    }
                }))
            }
            Some(RacePhase::Resolved(_)) => self.new_round(),
            _ => Ok(Vec::new()),
        }
    }

    /// Advance the AI once enough ticks have accumulated.
    fn tick(&mut self) -> Vec<StateChange> {
        if !self.wants_ticks() {
            self.ai_elapsed = Duration::ZERO;
            return Vec::new();
        }

        self.ai_elapsed += self.tick_interval();
        let interval = Duration::from_millis(self.settings.race.ai_interval_ms);
        if self.ai_elapsed < interval {
            return Vec::new();
        }
        self.ai_elapsed -= interval;

        let pathfinder = self.race_pathfinder;
        let (result, changes) = self.state_manager.update_with(|state| {
            state.race.as_mut().map(|race| {
                race.advance_ai(&pathfinder)
                    .map(|_| !race.ai_path.is_empty())
            })
        });
        match result {
            Some(Ok(found)) => {
                self.metrics.record_path_query(found);
                self.record_rounds(&changes);
            }
            Some(Err(e)) => tracing::warn!("AI step failed: {}", e),
            None => {}
        }
        changes
    }

    fn record_rounds(&self, changes: &[StateChange]) {
        for change in changes {
            if let StateChange::RoundResolved { result, .. } = change {
                self.metrics.record_round(result.winner());
            }
        }
    }

    fn configure_blocks(&mut self, answer: Option<i64>) -> Result<Vec<StateChange>> {
        let (result, mut changes) = self.state_manager.update_with(|state| {
            state.race.as_mut().map(|race| race.configure_blocks(answer))
        });

        match result {
            Some(Ok(_)) => changes.extend(self.new_round()?),
            Some(Err(e)) => tracing::info!("Block configuration aborted: {}", e),
            None => {}
        }
        Ok(changes)
    }

    /// Generate a maze with the configured block count and install it.
    ///
    /// A generation failure keeps the current board and raises a notice.
    fn new_round(&mut self) -> Result<Vec<StateChange>> {
        let Some(generator) = self.generator.as_mut() else {
            return Ok(Vec::new());
        };
        let blocks = self
            .state_manager
            .read(|state| state.race.as_ref().map(|r| r.block_count))
            .unwrap_or(self.settings.race.initial_blocks);

        match generator.generate(blocks) {
            Ok(maze) => {
                self.metrics.record_maze(&maze);
                self.ai_elapsed = Duration::ZERO;
                Ok(self.update_race(|race| race.install_round(maze)))
            }
            Err(e) => {
                tracing::error!("Maze generation failed: {}", e);
                Ok(self.update_race(|race| {
                    race.phase = RacePhase::WaitingToStart;
                    race.notice = Some(format!("Could not generate a maze: {}", e));
                }))
            }
        }
    }
}
