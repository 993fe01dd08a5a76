//! Integration tests for the terminal front end
//!
//! These tests verify:
//! - Scripted input driving the event loop through a whole solver session
//! - A full race round played through the controller
//! - Rejected input counted and reported without stopping the loop

use mazerace::metrics::Metrics;
use mazerace::models::{Direction, MazeConfig, Position, RacePhase, SolveOutcome, SolverPhase};
use mazerace::ui::{AppMessage, Demo, EventLoopBridge, Flow, GameController, InputParser};
use mazerace::StateManager;
use std::io::{self, Write};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use tokio::time::{Duration, timeout};

/// Writer that keeps everything written for later inspection
#[derive(Clone, Default)]
struct SharedOutput(Arc<Mutex<Vec<u8>>>);

impl SharedOutput {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for SharedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn quiet_config() -> MazeConfig {
    let mut config = MazeConfig::default();
    config.solver.step_delay_ms = 0;
    config
}

fn direction_between(from: Position, to: Position) -> Direction {
    if to.row < from.row {
        Direction::Up
    } else if to.row > from.row {
        Direction::Down
    } else if to.col < from.col {
        Direction::Left
    } else {
        Direction::Right
    }
}

#[tokio::test]
async fn test_scripted_solver_session() {
    let output = SharedOutput::default();
    let state_manager = StateManager::new();
    let metrics = Arc::new(Metrics::new());
    let mut controller = GameController::new(
        Demo::Solver,
        quiet_config(),
        state_manager.clone(),
        Arc::clone(&metrics),
        output.clone(),
        Some(42),
    )
    .unwrap();

    let script: &'static [u8] = b"setup\n0 0\n4,4\n0\nsolve\nquit\nsolve\n";
    let bridge = EventLoopBridge::new();
    bridge.spawn_input_reader(script, InputParser::solver().unwrap());

    timeout(Duration::from_secs(5), bridge.run(&mut controller))
        .await
        .expect("event loop did not finish")
        .unwrap();

    let state = state_manager.snapshot();
    assert!(state.quit_requested);
    let solver = state.solver.unwrap();
    assert_eq!(solver.phase, SolverPhase::Ready);
    assert!(matches!(
        solver.last_outcome,
        Some(SolveOutcome::Found { steps: 4, .. })
    ));

    // The solve after quit is never handled.
    assert_eq!(metrics.searches.load(Ordering::Relaxed), 1);

    let text = output.text();
    assert!(text.contains("> Select the START cell"));
    assert!(text.contains("step 1: expanded (0, 0)"));
    assert!(text.contains("Path: 4 steps"));
}

#[tokio::test]
async fn test_input_eof_ends_loop() {
    let output = SharedOutput::default();
    let mut controller = GameController::new(
        Demo::Race,
        quiet_config(),
        StateManager::new(),
        Arc::new(Metrics::new()),
        output.clone(),
        Some(1),
    )
    .unwrap();

    let parser = InputParser::race(&MazeConfig::default().race.keys).unwrap();
    let bridge = EventLoopBridge::new();
    bridge.spawn_input_reader(&b"blocks 0\n"[..], parser);

    timeout(Duration::from_secs(5), bridge.run(&mut controller))
        .await
        .expect("event loop did not finish")
        .unwrap();

    let race = controller.state_manager().snapshot().race.unwrap();
    assert_eq!(race.block_count, 0);
    assert_eq!(race.grid.blocked_count(), 0);
    assert!(output.text().contains("Blocks: 0"));
}

#[test]
fn test_player_wins_round_on_open_board() {
    let metrics = Arc::new(Metrics::new());
    let mut controller = GameController::new(
        Demo::Race,
        quiet_config(),
        StateManager::new(),
        Arc::clone(&metrics),
        io::sink(),
        Some(7),
    )
    .unwrap();

    controller.handle(AppMessage::ConfigureBlocks(0)).unwrap();
    controller.handle(AppMessage::Return).unwrap();

    // Walk the player's shortest route without ever ticking the AI.
    let route = controller
        .state_manager()
        .read(|s| s.race.as_ref().unwrap().player_path.clone());
    for pair in route.positions().windows(2) {
        let flow = controller
            .handle(AppMessage::Move(direction_between(pair[0], pair[1])))
            .unwrap();
        assert_eq!(flow, Flow::Continue);
    }

    let race = controller.state_manager().snapshot().race.unwrap();
    assert!(matches!(race.phase, RacePhase::Resolved(_)));
    assert_eq!(race.rounds_played, 1);
    assert_eq!(race.player_wins + race.ai_wins, 1);
    assert_eq!(metrics.rounds_played.load(Ordering::Relaxed), 1);

    // Return moves on to a fresh round and keeps the score.
    controller.handle(AppMessage::Return).unwrap();
    let race = controller.state_manager().snapshot().race.unwrap();
    assert_eq!(race.phase, RacePhase::WaitingToStart);
    assert_eq!(race.player, race.rules.player_start);
    assert_eq!(race.rounds_played, 1);
}

#[test]
fn test_rejected_input_reported() {
    tokio_test::block_on(async {
        let output = SharedOutput::default();
        let metrics = Arc::new(Metrics::new());
        let mut controller = GameController::new(
            Demo::Solver,
            quiet_config(),
            StateManager::new(),
            Arc::clone(&metrics),
            output.clone(),
            None,
        )
        .unwrap();

        let bridge = EventLoopBridge::new();
        bridge.spawn_input_reader(&b"jump\n9 9\n"[..], InputParser::solver().unwrap());
        bridge.run(&mut controller).await.unwrap();

        assert_eq!(metrics.rejected_inputs.load(Ordering::Relaxed), 1);
        let text = output.text();
        assert!(text.contains("Unrecognized command: 'jump'"));
        // (9, 9) parses but lies outside the 5x5 board.
        assert!(text.contains("outside"));
    });
}
