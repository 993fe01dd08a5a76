// Shared session state
//
// StateManager owns the running demo session behind a lock. Every mutation
// goes through update(), which diffs the session before and after and
// broadcasts what changed (phase moves, agent steps, finished rounds).

use crate::models::{
    Agent, AppState, Position, RacePhase, RaceSession, RoundResult, SolveOutcome, SolverPhase,
    SolverSession,
};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;

/// What an update did to the running session
///
/// Derived by diffing the session, so a closure that leaves the session
/// untouched emits nothing.
#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
    /// A solver session was installed
    SolverStarted { rows: usize, cols: usize },

    /// A race session was installed
    RaceStarted { rows: usize, cols: usize },

    /// The solver moved to another setup phase
    SolverPhaseChanged { phase: SolverPhase },

    /// Random obstacles were placed on the solver grid
    ObstaclesPlaced { count: usize },

    /// A solve finished, with or without a path
    SearchCompleted { outcome: SolveOutcome, expanded: usize },

    /// The race moved to another phase
    RacePhaseChanged { phase: RacePhase },

    /// A fresh race board was installed
    MazeGenerated { goal: Position, blocks: usize },

    /// A racer changed cell
    AgentMoved { agent: Agent, position: Position },

    /// A round ended and the scores were updated
    RoundResolved {
        result: RoundResult,
        player_wins: u32,
        ai_wins: u32,
    },

    /// The configured block count changed
    BlockCountChanged { blocks: usize },

    /// A new notice is waiting to be shown
    NoticeRaised { message: String },

    /// The user asked to leave
    QuitRequested,

    /// State has been reset
    StateReset,
}

/// Lock-protected [`AppState`] plus a broadcast channel of [`StateChange`]s
///
/// # Usage
///
/// - [`read()`](Self::read) borrows the session inside a closure
/// - [`update()`](Self::update) / [`update_with()`](Self::update_with) mutate
///   it and broadcast the diff
/// - [`subscribe()`](Self::subscribe) hands out a receiver for those diffs
///
/// Do not call `read()` from inside an update closure: the write lock is held.
///
/// [`GameController`](crate::ui::controller::GameController) drives every
/// update; the state logger task and the tests subscribe.
pub struct StateManager {
    state: Arc<RwLock<AppState>>,
    state_tx: broadcast::Sender<StateChange>,
}

impl StateManager {
    /// Empty state; the broadcast channel buffers 100 events.
    pub fn new() -> Self {
        let (state_tx, _) = broadcast::channel(100);
        Self {
            state: Arc::new(RwLock::new(AppState::default())),
            state_tx,
        }
    }

    // A poisoned lock still holds a complete AppState.
    fn read_guard(&self) -> RwLockReadGuard<'_, AppState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, AppState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get a cloned snapshot of the current state
    pub fn snapshot(&self) -> AppState {
        self.read_guard().clone()
    }

    /// Run `f` under the read lock
    ///
    /// # Example
    /// ```ignore
    /// let phase = state_manager.read(|state| state.solver.as_ref().map(|s| s.phase));
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&AppState) -> R,
    {
        let state = self.read_guard();
        f(&state)
    }

    /// Mutate the state under the write lock, then broadcast and return
    /// whatever changed.
    pub fn update<F>(&self, update_fn: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut AppState),
    {
        self.update_with(update_fn).1
    }

    /// Like [`update()`](Self::update), but also hands back the closure's result
    ///
    /// # Example
    /// ```ignore
    /// let (placed, changes) = state_manager.update_with(|state| {
    ///     state.solver.as_mut().map(|s| s.place_obstacles(Some(5), &mut rng))
    /// });
    /// ```
    pub fn update_with<F, R>(&self, update_fn: F) -> (R, Vec<StateChange>)
    where
        F: FnOnce(&mut AppState) -> R,
    {
        let mut state = self.write_guard();
        let old_state = state.clone();

        let result = update_fn(&mut state);

        let changes = self.detect_changes(&old_state, &state);
        drop(state);

        for change in &changes {
            // No receivers is fine.
            let _ = self.state_tx.send(change.clone());
        }

        (result, changes)
    }

    /// Receiver for every change broadcast from now on
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    fn detect_changes(&self, old: &AppState, new: &AppState) -> Vec<StateChange> {
        let mut changes = Vec::new();

        match (&old.solver, &new.solver) {
            (None, Some(solver)) => {
                changes.push(StateChange::SolverStarted {
                    rows: solver.grid.rows(),
                    cols: solver.grid.cols(),
                });
                changes.push(StateChange::SolverPhaseChanged {
                    phase: solver.phase,
                });
            }
            (Some(old_solver), Some(solver)) => {
                Self::detect_solver_changes(old_solver, solver, &mut changes)
            }
            _ => {}
        }

        match (&old.race, &new.race) {
            (None, Some(race)) => {
                changes.push(StateChange::RaceStarted {
                    rows: race.grid.rows(),
                    cols: race.grid.cols(),
                });
                changes.push(StateChange::MazeGenerated {
                    goal: race.goal,
                    blocks: race.placed_blocks,
                });
                changes.push(StateChange::RacePhaseChanged { phase: race.phase });
            }
            (Some(old_race), Some(race)) => Self::detect_race_changes(old_race, race, &mut changes),
            _ => {}
        }

        let old_notice = old
            .solver
            .as_ref()
            .and_then(|s| s.notice.as_ref())
            .or_else(|| old.race.as_ref().and_then(|r| r.notice.as_ref()));
        let new_notice = new
            .solver
            .as_ref()
            .and_then(|s| s.notice.as_ref())
            .or_else(|| new.race.as_ref().and_then(|r| r.notice.as_ref()));
        if let Some(message) = new_notice
            && old_notice != Some(message)
        {
            changes.push(StateChange::NoticeRaised {
                message: message.clone(),
            });
        }

        if !old.quit_requested && new.quit_requested {
            changes.push(StateChange::QuitRequested);
        }

        changes
    }

    fn detect_solver_changes(old: &SolverSession, new: &SolverSession, changes: &mut Vec<StateChange>) {
        if old.phase != new.phase {
            changes.push(StateChange::SolverPhaseChanged { phase: new.phase });
        }

        if new.phase == SolverPhase::Ready
            && (old.phase != SolverPhase::Ready || old.obstacle_count != new.obstacle_count)
        {
            changes.push(StateChange::ObstaclesPlaced {
                count: new.obstacle_count,
            });
        }

        if let Some(outcome) = new.last_outcome
            && old.solve_count != new.solve_count
        {
            changes.push(StateChange::SearchCompleted {
                outcome,
                expanded: new.explored.len(),
            });
        }
    }

    fn detect_race_changes(old: &RaceSession, new: &RaceSession, changes: &mut Vec<StateChange>) {
        if old.goal != new.goal || old.grid != new.grid {
            changes.push(StateChange::MazeGenerated {
                goal: new.goal,
                blocks: new.placed_blocks,
            });
        }

        if old.phase != new.phase {
            changes.push(StateChange::RacePhaseChanged { phase: new.phase });
            if let RacePhase::Resolved(result) = new.phase {
                changes.push(StateChange::RoundResolved {
                    result,
                    player_wins: new.player_wins,
                    ai_wins: new.ai_wins,
                });
            }
        }

        if old.player != new.player {
            changes.push(StateChange::AgentMoved {
                agent: Agent::Player,
                position: new.player,
            });
        }
        if old.ai != new.ai {
            changes.push(StateChange::AgentMoved {
                agent: Agent::Ai,
                position: new.ai,
            });
        }

        if old.block_count != new.block_count {
            changes.push(StateChange::BlockCountChanged {
                blocks: new.block_count,
            });
        }
    }

    /// Install a solver session
    pub fn start_solver(&self, session: SolverSession) -> Vec<StateChange> {
        self.update(|state| {
            state.solver = Some(session);
        })
    }

    /// Install a race session
    pub fn start_race(&self, session: RaceSession) -> Vec<StateChange> {
        self.update(|state| {
            state.race = Some(session);
        })
    }

    /// Flag the session for shutdown
    pub fn request_quit(&self) -> Vec<StateChange> {
        self.update(|state| {
            state.quit_requested = true;
        })
    }

    pub fn quit_requested(&self) -> bool {
        self.read(|state| state.quit_requested)
    }

    /// Clear the solver board back to the first setup phase
    pub fn reset_solver(&self) -> Vec<StateChange> {
        let mut changes = self.update(|state| {
            if let Some(solver) = state.solver.as_mut() {
                solver.reset();
            }
        });

        let _ = self.state_tx.send(StateChange::StateReset);
        changes.push(StateChange::StateReset);

        changes
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            state_tx: self.state_tx.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Connectivity, RaceRules};
    use crate::services::{AStar, GeneratorConfig, MazeGenerator};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn race_session() -> RaceSession {
        let rules = RaceRules {
            player_start: Position::new(0, 0),
            ai_start: Position::new(4, 0),
            max_blocks: 10,
        };
        let config = GeneratorConfig {
            rows: 5,
            cols: 5,
            agent_starts: vec![rules.player_start, rules.ai_start],
            attempts_per_count: 50,
            connectivity: Connectivity::Four,
        };
        let maze = MazeGenerator::with_seed(config, 11)
            .unwrap()
            .generate(3)
            .unwrap();
        RaceSession::new(rules, 3, maze)
    }

    #[test]
    fn test_new_state_manager() {
        let manager = StateManager::new();
        let state = manager.snapshot();

        assert!(state.solver.is_none());
        assert!(state.race.is_none());
        assert!(!manager.quit_requested());
    }

    #[test]
    fn test_start_solver_emits_events() {
        let manager = StateManager::new();
        let changes = manager.start_solver(SolverSession::new(5, 5).unwrap());

        assert_eq!(
            changes,
            vec![
                StateChange::SolverStarted { rows: 5, cols: 5 },
                StateChange::SolverPhaseChanged {
                    phase: SolverPhase::SelectingStart
                },
            ]
        );
    }

    #[test]
    fn test_solver_setup_events() {
        let manager = StateManager::new();
        manager.start_solver(SolverSession::new(5, 5).unwrap());

        let (result, changes) = manager.update_with(|state| {
            state
                .solver
                .as_mut()
                .map(|s| s.select_cell(Position::new(0, 0)))
        });
        assert!(matches!(result, Some(Ok(SolverPhase::SelectingGoal))));
        assert_eq!(
            changes,
            vec![StateChange::SolverPhaseChanged {
                phase: SolverPhase::SelectingGoal
            }]
        );

        manager.update(|state| {
            if let Some(s) = state.solver.as_mut() {
                let _ = s.select_cell(Position::new(4, 4));
            }
        });

        let mut rng = StdRng::seed_from_u64(3);
        let changes = manager.update(|state| {
            if let Some(s) = state.solver.as_mut() {
                let _ = s.place_obstacles(Some(4), &mut rng);
            }
        });
        assert!(changes.contains(&StateChange::ObstaclesPlaced { count: 4 }));
    }

    #[test]
    fn test_rejected_goal_raises_notice() {
        let manager = StateManager::new();
        manager.start_solver(SolverSession::new(5, 5).unwrap());
        manager.update(|state| {
            if let Some(s) = state.solver.as_mut() {
                let _ = s.select_cell(Position::new(1, 1));
            }
        });

        let changes = manager.update(|state| {
            if let Some(s) = state.solver.as_mut() {
                let _ = s.select_cell(Position::new(1, 1));
            }
        });

        assert_eq!(changes.len(), 1);
        assert!(matches!(changes[0], StateChange::NoticeRaised { .. }));
    }

    #[test]
    fn test_search_completed_on_every_solve() {
        let manager = StateManager::new();
        let mut session = SolverSession::new(3, 3).unwrap();
        session.start = Some(Position::new(0, 0));
        session.goal = Some(Position::new(2, 2));
        session.phase = SolverPhase::Ready;
        manager.start_solver(session);

        let astar = AStar::new(Connectivity::Eight);
        for _ in 0..2 {
            let changes = manager.update(|state| {
                if let Some(s) = state.solver.as_mut() {
                    let _ = s.solve(&astar, &mut ());
                }
            });
            assert!(changes.iter().any(|c| matches!(
                c,
                StateChange::SearchCompleted {
                    outcome: SolveOutcome::Found { steps: 2, .. },
                    ..
                }
            )));
        }
    }

    #[test]
    fn test_race_events() {
        let manager = StateManager::new();
        let changes = manager.start_race(race_session());
        assert!(matches!(changes[0], StateChange::RaceStarted { rows: 5, cols: 5 }));
        assert!(matches!(changes[1], StateChange::MazeGenerated { blocks: 3, .. }));

        let changes = manager.update(|state| {
            if let Some(r) = state.race.as_mut() {
                let _ = r.start_round();
            }
        });
        assert_eq!(
            changes,
            vec![StateChange::RacePhaseChanged {
                phase: RacePhase::Active
            }]
        );

        let astar = AStar::new(Connectivity::Four);
        let changes = manager.update(|state| {
            if let Some(r) = state.race.as_mut() {
                let _ = r.advance_ai(&astar);
            }
        });
        assert!(
            changes
                .iter()
                .any(|c| matches!(c, StateChange::AgentMoved { agent: Agent::Ai, .. }))
        );
    }

    #[test]
    fn test_round_resolution_event() {
        let manager = StateManager::new();
        let mut session = race_session();
        session.phase = RacePhase::Active;
        manager.start_race(session);

        let astar = AStar::new(Connectivity::Four);
        let mut resolved = None;
        for _ in 0..25 {
            let changes = manager.update(|state| {
                if let Some(r) = state.race.as_mut() {
                    let _ = r.advance_ai(&astar);
                }
            });
            resolved = changes
                .into_iter()
                .find(|c| matches!(c, StateChange::RoundResolved { .. }));
            if resolved.is_some() {
                break;
            }
        }

        assert!(matches!(
            resolved,
            Some(StateChange::RoundResolved { ai_wins: 1, player_wins: 0, .. })
        ));
    }

    #[test]
    fn test_reset_solver() {
        let manager = StateManager::new();
        manager.start_solver(SolverSession::new(5, 5).unwrap());
        manager.update(|state| {
            if let Some(s) = state.solver.as_mut() {
                let _ = s.select_cell(Position::new(0, 0));
            }
        });

        let changes = manager.reset_solver();
        assert!(changes.contains(&StateChange::StateReset));
        assert!(changes.contains(&StateChange::SolverPhaseChanged {
            phase: SolverPhase::SelectingStart
        }));
    }

    #[test]
    fn test_subscribe_to_changes() {
        let manager = StateManager::new();
        let mut rx = manager.subscribe();

        manager.request_quit();

        let event = rx.try_recv();
        assert_eq!(event.unwrap(), StateChange::QuitRequested);
        assert!(manager.quit_requested());
    }

    #[test]
    fn test_multiple_subscribers() {
        let manager = StateManager::new();
        let mut rx1 = manager.subscribe();
        let mut rx2 = manager.subscribe();

        manager.start_solver(SolverSession::new(5, 5).unwrap());

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn test_clone_state_manager() {
        let manager1 = StateManager::new();
        let manager2 = manager1.clone();

        manager1.request_quit();

        assert!(manager2.snapshot().quit_requested);
    }
}
