// ASCII board rendering
//
// Pure functions from session state to text. The controller writes the text
// to stdout; tests compare it directly.

use crate::models::{Grid, Position, RacePhase, RaceSession, SolveOutcome, SolverSession};
use crate::services::{SearchObserver, SearchStep};
use std::collections::HashSet;
use std::fmt::Write as _;
use std::io::Write;
use std::time::Duration;

pub const FREE: char = '.';
pub const BLOCKED: char = '#';
pub const START: char = 'S';
pub const GOAL: char = 'G';
pub const PATH: char = '*';
pub const EXPLORED: char = 'o';
pub const FRONTIER: char = '+';
pub const PLAYER: char = 'P';
pub const AI: char = 'A';
pub const PLAYER_TRAIL: char = '~';

/// Draw `grid` with a column header and row labels, asking `glyph` for every
/// free cell that has something on it.
fn draw_grid(grid: &Grid, glyph: impl Fn(Position) -> Option<char>) -> String {
    let mut out = String::from("    ");
    for col in 0..grid.cols() {
        let _ = write!(out, "{:>2}", col % 100);
    }
    out.push('\n');

    for row in 0..grid.rows() {
        let _ = write!(out, "{:>3} ", row);
        for col in 0..grid.cols() {
            let position = Position::new(row, col);
            let c = if grid.is_blocked(position) {
                BLOCKED
            } else {
                glyph(position).unwrap_or(FREE)
            };
            let _ = write!(out, " {}", c);
        }
        out.push('\n');
    }
    out
}

/// Solver board: start, goal, obstacles, then the last solve's explored cells
/// and path.
pub fn render_solver(session: &SolverSession) -> String {
    let explored: HashSet<Position> = session.explored.iter().copied().collect();

    let mut out = draw_grid(&session.grid, |p| {
        if session.start == Some(p) {
            Some(START)
        } else if session.goal == Some(p) {
            Some(GOAL)
        } else if session.path.contains(p) {
            Some(PATH)
        } else if explored.contains(&p) {
            Some(EXPLORED)
        } else {
            None
        }
    });

    match session.last_outcome {
        Some(SolveOutcome::Found { steps, cost }) => {
            let _ = writeln!(
                out,
                "Path: {} steps, cost {:.2}, {} cells explored",
                steps,
                cost,
                session.explored.len()
            );
        }
        Some(SolveOutcome::NoPath) => {
            let _ = writeln!(out, "No path ({} cells explored)", session.explored.len());
        }
        None => {}
    }
    if let Some(notice) = &session.notice {
        let _ = writeln!(out, "! {}", notice);
    }
    let _ = writeln!(out, "> {}", session.instructions());
    out
}

/// Race board: both racers, the goal, the AI's planned route and the
/// player's shortest route.
pub fn render_race(session: &RaceSession) -> String {
    let show_routes = matches!(session.phase, RacePhase::Active | RacePhase::WaitingToStart);

    let mut out = draw_grid(&session.grid, |p| {
        if p == session.player {
            Some(PLAYER)
        } else if p == session.ai {
            Some(AI)
        } else if p == session.goal {
            Some(GOAL)
        } else if show_routes && session.ai_path.contains(p) {
            Some(PATH)
        } else if show_routes && session.player_path.contains(p) {
            Some(PLAYER_TRAIL)
        } else {
            None
        }
    });

    let _ = writeln!(out, "{}", session.status_line());
    if let Some(notice) = &session.notice {
        let _ = writeln!(out, "! {}", notice);
    }
    let _ = writeln!(out, "> {}", session.instructions());
    out
}

/// Observer that redraws the board after every search step and pauses so the
/// search can be watched.
///
/// The pause blocks the calling thread.
pub struct StepRenderer<W: Write> {
    grid: Grid,
    start: Position,
    goal: Position,
    closed: HashSet<Position>,
    frontier: HashSet<Position>,
    delay: Duration,
    frames: usize,
    out: W,
}

impl<W: Write> StepRenderer<W> {
    pub fn new(grid: Grid, start: Position, goal: Position, delay: Duration, out: W) -> Self {
        Self {
            grid,
            start,
            goal,
            closed: HashSet::new(),
            frontier: HashSet::new(),
            delay,
            frames: 0,
            out,
        }
    }

    /// Frames drawn so far
    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn frame(&self) -> String {
        draw_grid(&self.grid, |p| {
            if p == self.start {
                Some(START)
            } else if p == self.goal {
                Some(GOAL)
            } else if self.closed.contains(&p) {
                Some(EXPLORED)
            } else if self.frontier.contains(&p) {
                Some(FRONTIER)
            } else {
                None
            }
        })
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> SearchObserver for StepRenderer<W> {
    fn on_step(&mut self, step: &SearchStep) {
        match step {
            SearchStep::Expanded { position, .. } => {
                self.frontier.remove(position);
                self.closed.insert(*position);
            }
            SearchStep::Enqueued { position, .. } => {
                self.frontier.insert(*position);
            }
        }

        // Redraw once per expansion; enqueues only update the frontier.
        if let SearchStep::Expanded { position, g, h } = step {
            self.frames += 1;
            let frame = format!(
                "{}step {}: expanded {} (g={:.2}, h={:.2})\n",
                self.frame(),
                self.frames,
                position,
                g,
                h
            );
            if let Err(e) = self.out.write_all(frame.as_bytes()).and_then(|_| self.out.flush()) {
                tracing::warn!("Failed to draw search step: {}", e);
            }
            if !self.delay.is_zero() {
                std::thread::sleep(self.delay);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Connectivity, SolverPhase};
    use crate::services::AStar;

    #[test]
    fn test_render_solver_setup() {
        let mut session = SolverSession::new(3, 3).unwrap();
        session.select_cell(Position::new(0, 0)).unwrap();
        session.select_cell(Position::new(2, 2)).unwrap();
        session.grid.block(Position::new(1, 1)).unwrap();

        let board = render_solver(&session);
        let rows: Vec<&str> = board.lines().collect();
        assert_eq!(rows[0], "     0 1 2");
        assert_eq!(rows[1], "  0  S . .");
        assert_eq!(rows[2], "  1  . # .");
        assert_eq!(rows[3], "  2  . . G");
        assert!(rows[4].starts_with("> Enter number of obstacles"));
    }

    #[test]
    fn test_render_solver_path() {
        let mut session = SolverSession::new(3, 3).unwrap();
        session.start = Some(Position::new(0, 0));
        session.goal = Some(Position::new(2, 2));
        session.phase = SolverPhase::Ready;
        session
            .solve(&AStar::new(Connectivity::Eight), &mut ())
            .unwrap();

        let board = render_solver(&session);
        assert!(board.contains("  1  . * ."));
        assert!(board.contains("Path: 2 steps, cost 2.83"));
    }

    #[test]
    fn test_step_renderer_draws_each_expansion() {
        let grid = Grid::new(3, 3).unwrap();
        let start = Position::new(0, 0);
        let goal = Position::new(0, 2);
        let mut renderer = StepRenderer::new(grid.clone(), start, goal, Duration::ZERO, Vec::new());

        let outcome = AStar::new(Connectivity::Four)
            .search(&grid, start, goal, &mut renderer)
            .unwrap();

        assert_eq!(renderer.frames(), outcome.expanded);
        let text = String::from_utf8(renderer.into_inner()).unwrap();
        assert!(text.contains("step 1: expanded (0, 0)"));
    }
}
