use std::collections::VecDeque;

use crate::board::position::Position;
use crate::error::{KnightError, Result};

/// Knight offsets in search order. The order decides which of several
/// equally short paths is returned, so it must not change.
pub const KNIGHT_OFFSETS: [(i8, i8); 8] = [
    (-2, 1),
    (-1, 2),
    (1, 2),
    (2, 1),
    (2, -1),
    (1, -2),
    (-1, -2),
    (-2, -1),
];

const SQUARES: usize = 64;

/// On-board squares one knight move away from `from`, in offset order.
pub fn knight_moves(from: Position) -> Vec<Position> {
    KNIGHT_OFFSETS
        .iter()
        .filter_map(|&(dx, dy)| from.offset(dx, dy))
        .collect()
}

/// True when `a` and `b` are exactly one knight move apart.
pub fn is_knight_move(a: Position, b: Position) -> bool {
    let dx = (a.file() as i8 - b.file() as i8).abs();
    let dy = (a.rank() as i8 - b.rank() as i8).abs();
    (dx == 1 && dy == 2) || (dx == 2 && dy == 1)
}

/// Shortest knight path from `start` to `end`, both ends included.
///
/// Breadth-first search over the 64 squares. Each square is enqueued at
/// most once, and the first time `end` is dequeued the path to it is minimal.
/// `start == end` yields `[start]`.
pub fn find_shortest_path(start: Position, end: Position) -> Result<Vec<Position>> {
    let mut visited = [false; SQUARES];
    let mut parent: [Option<Position>; SQUARES] = [None; SQUARES];
    let mut queue = VecDeque::with_capacity(SQUARES);

    visited[start.index()] = true;
    queue.push_back(start);

    while let Some(current) = queue.pop_front() {
        if current == end {
            return Ok(reconstruct(&parent, start, end));
        }
        for next in knight_moves(current) {
            if !visited[next.index()] {
                visited[next.index()] = true;
                parent[next.index()] = Some(current);
                queue.push_back(next);
            }
        }
    }

    // Unreachable on a connected 8x8 knight graph.
    Err(KnightError::PathNotFound {
        start: start.to_string(),
        end: end.to_string(),
    })
}

/// Parse both coordinates, then search.
pub fn find_shortest_path_str(start: &str, end: &str) -> Result<Vec<Position>> {
    let start = Position::parse(start)?;
    let end = Position::parse(end)?;
    find_shortest_path(start, end)
}

fn reconstruct(parent: &[Option<Position>; SQUARES], start: Position, end: Position) -> Vec<Position> {
    let mut path = vec![end];
    let mut current = end;
    while current != start {
        match parent[current.index()] {
            Some(prev) => {
                path.push(prev);
                current = prev;
            }
            None => break,
        }
    }
    path.reverse();
    path
}
