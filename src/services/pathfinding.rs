use crate::models::{Connectivity, Grid, GridError, Position};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use thiserror::Error;

/// Errors that can occur before a search starts
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    #[error("Start position is invalid: {0}")]
    InvalidStart(GridError),

    #[error("Goal position is invalid: {0}")]
    InvalidGoal(GridError),
}

/// Estimate of the remaining cost from a cell to the goal
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Heuristic {
    Manhattan,
    Euclidean,
    Chebyshev,
    /// Exact open-grid distance for 8-connected moves with diagonal cost √2
    Octile,
}

impl Heuristic {
    pub fn estimate(self, from: Position, to: Position) -> f64 {
        match self {
            Heuristic::Manhattan => from.manhattan(to) as f64,
            Heuristic::Euclidean => from.euclidean(to),
            Heuristic::Chebyshev => from.chebyshev(to) as f64,
            Heuristic::Octile => {
                let dr = from.row.abs_diff(to.row) as f64;
                let dc = from.col.abs_diff(to.col) as f64;
                dr.max(dc) + (std::f64::consts::SQRT_2 - 1.0) * dr.min(dc)
            }
        }
    }

    /// Default admissible heuristic for a connectivity
    pub fn for_connectivity(connectivity: Connectivity) -> Self {
        match connectivity {
            Connectivity::Four => Heuristic::Manhattan,
            Connectivity::Eight => Heuristic::Euclidean,
        }
    }

    /// Whether the heuristic never overestimates under the given cost model
    pub fn is_admissible_for(self, connectivity: Connectivity) -> bool {
        match connectivity {
            Connectivity::Four => true,
            Connectivity::Eight => !matches!(self, Heuristic::Manhattan),
        }
    }
}

/// A transient search node. Parents are indices into the search's node arena.
#[derive(Clone, Debug)]
pub struct SearchNode {
    pub position: Position,
    pub parent: Option<usize>,
    pub g: f64,
    pub h: f64,
    pub f: f64,
}

/// Ordered positions from start to goal. Empty when no path exists.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Path {
    positions: Vec<Position>,
    cost: f64,
}

impl Path {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Number of positions, including start and goal
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Number of moves
    pub fn steps(&self) -> usize {
        self.positions.len().saturating_sub(1)
    }

    pub fn cost(&self) -> f64 {
        self.cost
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn start(&self) -> Option<Position> {
        self.positions.first().copied()
    }

    pub fn goal(&self) -> Option<Position> {
        self.positions.last().copied()
    }

    /// The position one move along the path, if the path has any moves
    pub fn next_step(&self) -> Option<Position> {
        self.positions.get(1).copied()
    }

    /// The same path starting one move later. Adjacent cells are one move
    /// apart, so the dropped move costs their euclidean distance.
    pub fn trimmed_front(&self) -> Path {
        match self.positions.as_slice() {
            [first, second, ..] => Path {
                positions: self.positions[1..].to_vec(),
                cost: (self.cost - first.euclidean(*second)).max(0.0),
            },
            _ => self.clone(),
        }
    }

    pub fn contains(&self, position: Position) -> bool {
        self.positions.contains(&position)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.positions.iter()
    }
}

/// One observable step of a running search
#[derive(Clone, Debug, PartialEq)]
pub enum SearchStep {
    /// A node was popped from the frontier and closed
    Expanded { position: Position, g: f64, h: f64 },
    /// A node entered the frontier or replaced a costlier entry
    Enqueued { position: Position, g: f64, h: f64 },
}

/// Receives search steps as they happen, e.g. to animate the search.
pub trait SearchObserver {
    fn on_step(&mut self, step: &SearchStep);
}

impl SearchObserver for () {
    fn on_step(&mut self, _step: &SearchStep) {}
}

/// Result of an observed search
#[derive(Clone, Debug, PartialEq)]
pub struct SearchOutcome {
    pub path: Path,
    pub expanded: usize,
    pub enqueued: usize,
}

impl SearchOutcome {
    pub fn found(&self) -> bool {
        !self.path.is_empty()
    }
}

/// Frontier entry. `BinaryHeap` is a max-heap, so ordering is reversed to pop
/// the lowest `f` first; ties prefer lower `h`, then earlier insertion.
#[derive(Debug)]
struct OpenEntry {
    f: f64,
    h: f64,
    seq: u64,
    node: usize,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.h.total_cmp(&self.h))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// A* search over a [`Grid`]
///
/// The pathfinder is stateless between calls: every search allocates its own
/// frontier, closed set and node arena and discards them once the path is
/// reconstructed.
///
/// # Example
/// ```
/// use mazerace::models::{Connectivity, Grid, Position};
/// use mazerace::services::AStar;
///
/// let grid = Grid::new(3, 3).unwrap();
/// let path = AStar::new(Connectivity::Eight)
///     .find_path(&grid, Position::new(0, 0), Position::new(2, 2))
///     .unwrap();
/// assert_eq!(path.len(), 3);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct AStar {
    connectivity: Connectivity,
    heuristic: Heuristic,
}

impl AStar {
    pub fn new(connectivity: Connectivity) -> Self {
        Self {
            connectivity,
            heuristic: Heuristic::for_connectivity(connectivity),
        }
    }

    /// Override the default heuristic.
    pub fn with_heuristic(mut self, heuristic: Heuristic) -> Self {
        if !heuristic.is_admissible_for(self.connectivity) {
            tracing::warn!(
                "{:?} heuristic may overestimate on a {} grid; paths may not be optimal",
                heuristic,
                self.connectivity
            );
        }
        self.heuristic = heuristic;
        self
    }

    pub fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    pub fn heuristic(&self) -> Heuristic {
        self.heuristic
    }

    /// Find the lowest-cost path from `start` to `goal`.
    ///
    /// Returns an empty [`Path`] if the goal cannot be reached.
    pub fn find_path(&self, grid: &Grid, start: Position, goal: Position) -> Result<Path, SearchError> {
        self.search(grid, start, goal, &mut ()).map(|outcome| outcome.path)
    }

    /// Run the search, reporting every expansion and enqueue to `observer`.
    pub fn search<O>(
        &self,
        grid: &Grid,
        start: Position,
        goal: Position,
        observer: &mut O,
    ) -> Result<SearchOutcome, SearchError>
    where
        O: SearchObserver + ?Sized,
    {
        grid.check_bounds(start).map_err(SearchError::InvalidStart)?;
        grid.check_bounds(goal).map_err(SearchError::InvalidGoal)?;

        let mut outcome = SearchOutcome {
            path: Path::empty(),
            expanded: 0,
            enqueued: 0,
        };

        if !grid.is_free(start) || !grid.is_free(goal) {
            tracing::debug!("Start {} or goal {} is blocked, no path", start, goal);
            return Ok(outcome);
        }

        let mut nodes: Vec<SearchNode> = Vec::new();
        let mut frontier = BinaryHeap::new();
        let mut best_g: HashMap<Position, f64> = HashMap::new();
        let mut closed: HashSet<Position> = HashSet::new();
        let mut seq: u64 = 0;

        let h = self.heuristic.estimate(start, goal);
        nodes.push(SearchNode {
            position: start,
            parent: None,
            g: 0.0,
            h,
            f: h,
        });
        best_g.insert(start, 0.0);
        frontier.push(OpenEntry {
            f: h,
            h,
            seq,
            node: 0,
        });
        outcome.enqueued += 1;
        observer.on_step(&SearchStep::Enqueued {
            position: start,
            g: 0.0,
            h,
        });

        while let Some(entry) = frontier.pop() {
            let current = nodes[entry.node].clone();

            // Superseded entries stay in the heap; skip them once their
            // position has been closed by a cheaper copy.
            if !closed.insert(current.position) {
                continue;
            }

            outcome.expanded += 1;
            observer.on_step(&SearchStep::Expanded {
                position: current.position,
                g: current.g,
                h: current.h,
            });

            if current.position == goal {
                outcome.path = reconstruct(&nodes, entry.node);
                tracing::debug!(
                    "Path found: {} steps, cost {:.3}, {} nodes expanded",
                    outcome.path.steps(),
                    outcome.path.cost(),
                    outcome.expanded
                );
                return Ok(outcome);
            }

            for (next, step_cost) in grid.neighbors(current.position, self.connectivity) {
                if closed.contains(&next) {
                    continue;
                }

                let g = current.g + step_cost;
                if best_g.get(&next).is_some_and(|&known| g >= known) {
                    continue;
                }

                let h = self.heuristic.estimate(next, goal);
                best_g.insert(next, g);
                nodes.push(SearchNode {
                    position: next,
                    parent: Some(entry.node),
                    g,
                    h,
                    f: g + h,
                });
                seq += 1;
                frontier.push(OpenEntry {
                    f: g + h,
                    h,
                    seq,
                    node: nodes.len() - 1,
                });
                outcome.enqueued += 1;
                observer.on_step(&SearchStep::Enqueued { position: next, g, h });
            }
        }

        tracing::debug!(
            "No path from {} to {} after expanding {} nodes",
            start,
            goal,
            outcome.expanded
        );
        Ok(outcome)
    }
}

impl Default for AStar {
    fn default() -> Self {
        Self::new(Connectivity::default())
    }
}

/// Walk parent links from `goal_index` back to the root and reverse.
fn reconstruct(nodes: &[SearchNode], goal_index: usize) -> Path {
    let cost = nodes[goal_index].g;
    let mut positions = Vec::new();
    let mut cursor = Some(goal_index);

    while let Some(index) = cursor {
        positions.push(nodes[index].position);
        cursor = nodes[index].parent;
    }
    positions.reverse();

    Path { positions, cost }
}
