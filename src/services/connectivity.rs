//! Breadth-first connectivity checks over free cells.

use crate::models::{Connectivity, Grid, Position};
use std::collections::{HashSet, VecDeque};

/// True if `to` can be reached from `from` through free cells.
///
/// Stops as soon as the target is dequeued.
pub fn is_reachable(grid: &Grid, from: Position, to: Position, connectivity: Connectivity) -> bool {
    if !grid.is_free(from) || !grid.is_free(to) {
        return false;
    }

    let mut visited = HashSet::from([from]);
    let mut queue = VecDeque::from([from]);

    while let Some(current) = queue.pop_front() {
        if current == to {
            return true;
        }
        for (next, _) in grid.neighbors(current, connectivity) {
            if visited.insert(next) {
                queue.push_back(next);
            }
        }
    }

    false
}
