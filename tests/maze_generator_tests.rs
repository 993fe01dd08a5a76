//! Integration tests for the maze generator
//!
//! These tests verify that generated mazes:
//! - Never block an agent start and never exceed the requested obstacle count
//! - Always keep the goal reachable from every agent
//! - Degrade gracefully when the requested count cannot be satisfied

use mazerace::models::{Connectivity, Grid, Position};
use mazerace::services::{
    GeneratorConfig, GeneratorError, MazeGenerator, is_reachable, place_random_obstacles,
};
use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;

fn config(rows: usize, cols: usize, starts: Vec<Position>) -> GeneratorConfig {
    GeneratorConfig {
        rows,
        cols,
        agent_starts: starts,
        attempts_per_count: 100,
        connectivity: Connectivity::Four,
    }
}

#[test]
fn test_race_defaults_generate() {
    let starts = vec![Position::new(0, 0), Position::new(9, 0)];
    let mut generator = MazeGenerator::with_seed(config(10, 15, starts.clone()), 2024).unwrap();

    for blocks in [0, 10, 40, 75] {
        let maze = generator.generate(blocks).unwrap();
        assert!(maze.obstacle_count <= blocks);
        assert_eq!(maze.grid.blocked_count(), maze.obstacle_count);
        assert!(!starts.contains(&maze.goal));
        for (start, path) in starts.iter().zip(&maze.agent_paths) {
            assert!(maze.grid.is_free(*start));
            assert_eq!(path.start(), Some(*start));
            assert_eq!(path.goal(), Some(maze.goal));
        }
    }
}

#[test]
fn test_nearly_full_small_grid() {
    // 3x3 with two agents: 7 free cells, request free cells - 1 = 6.
    let starts = vec![Position::new(0, 0), Position::new(2, 0)];
    let mut generator = MazeGenerator::with_seed(config(3, 3, starts.clone()), 99).unwrap();

    let maze = generator.generate(6).unwrap();

    assert!(maze.obstacle_count <= 6);
    assert_eq!(maze.requested, 6);
    assert_eq!(maze.reductions, 6 - maze.obstacle_count);
    for start in starts {
        assert!(is_reachable(&maze.grid, start, maze.goal, Connectivity::Four));
    }
}

#[test]
fn test_single_attempt_budget_still_terminates() {
    let starts = vec![Position::new(0, 0), Position::new(2, 2)];
    let mut cfg = config(3, 3, starts);
    cfg.attempts_per_count = 1;
    let mut generator = MazeGenerator::with_seed(cfg, 5).unwrap();

    let maze = generator.generate(6).unwrap();
    assert!(maze.attempts >= 1);
    assert!(maze.obstacle_count <= 6);
}

#[test]
fn test_request_above_capacity_rejected() {
    let starts = vec![Position::new(0, 0)];
    let mut generator = MazeGenerator::with_seed(config(2, 2, starts), 1).unwrap();
    assert_eq!(
        generator.generate(3).unwrap_err(),
        GeneratorError::TooManyObstacles {
            requested: 3,
            capacity: 2
        }
    );
}

#[test]
fn test_grid_without_room_for_goal_rejected() {
    let starts = vec![Position::new(0, 0)];
    assert!(matches!(
        MazeGenerator::with_seed(config(1, 1, starts), 1),
        Err(GeneratorError::NoRoomForGoal)
    ));
}

#[test]
fn test_solver_placement_leaves_endpoints() {
    let mut grid = Grid::new(5, 5).unwrap();
    let reserved = [Position::new(0, 0), Position::new(4, 4)];
    let mut rng = StdRng::seed_from_u64(77);

    let placed = place_random_obstacles(&mut grid, 23, &reserved, &mut rng).unwrap();
    assert_eq!(placed.len(), 23);
    assert_eq!(grid.free_positions().count(), 2);
    assert!(reserved.iter().all(|&p| grid.is_free(p)));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_generated_mazes_are_valid(
        rows in 2usize..8,
        cols in 2usize..8,
        fill in 0.0f64..1.0,
        seed in any::<u64>(),
    ) {
        let starts = vec![Position::new(0, 0), Position::new(rows - 1, cols - 1)];
        let mut cfg = config(rows, cols, starts.clone());
        cfg.attempts_per_count = 20;
        let capacity = cfg.capacity();
        let requested = (capacity as f64 * fill) as usize;

        let maze = MazeGenerator::with_seed(cfg, seed).unwrap().generate(requested).unwrap();

        prop_assert!(maze.obstacle_count <= requested);
        prop_assert_eq!(maze.grid.blocked_count(), maze.obstacle_count);
        prop_assert!(maze.grid.is_free(maze.goal));
        for start in &starts {
            prop_assert!(maze.grid.is_free(*start));
            prop_assert!(is_reachable(&maze.grid, *start, maze.goal, Connectivity::Four));
        }
    }
}
