//! Board geometry and the knight shortest-path search.
//!
//! - [`Position`]: a square in `A1`..`H8` text form
//! - [`find_shortest_path`]: breadth-first search over the knight-move graph

pub mod path;
pub mod position;

pub use path::{find_shortest_path, find_shortest_path_str, is_knight_move, knight_moves};
pub use position::Position;
