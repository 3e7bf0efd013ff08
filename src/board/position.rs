use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{KnightError, Result};

/// Number of files and ranks on the board.
pub const BOARD_SIZE: u8 = 8;

/// A square on the board, stored as 0-based file (A..H) and rank (1..8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    file: u8,
    rank: u8,
}

impl Position {
    /// Build a position from 0-based indices. Returns `None` when off-board.
    pub fn new(file: u8, rank: u8) -> Option<Self> {
        if file < BOARD_SIZE && rank < BOARD_SIZE {
            Some(Self { file, rank })
        } else {
            None
        }
    }

    /// Parse the two-character form: uppercase `A`-`H` then `1`-`8`.
    pub fn parse(input: &str) -> Result<Self> {
        let bytes = input.as_bytes();
        if bytes.len() != 2 {
            return Err(KnightError::InvalidPosition(input.to_string()));
        }
        let (file, rank) = (bytes[0], bytes[1]);
        if !(b'A'..=b'H').contains(&file) || !(b'1'..=b'8').contains(&rank) {
            return Err(KnightError::InvalidPosition(input.to_string()));
        }
        Ok(Self {
            file: file - b'A',
            rank: rank - b'1',
        })
    }

    pub fn file(&self) -> u8 {
        self.file
    }

    pub fn rank(&self) -> u8 {
        self.rank
    }

    /// Apply a signed offset, returning `None` if the result leaves the board.
    pub fn offset(&self, dx: i8, dy: i8) -> Option<Self> {
        let file = self.file as i8 + dx;
        let rank = self.rank as i8 + dy;
        if file < 0 || rank < 0 {
            return None;
        }
        Self::new(file as u8, rank as u8)
    }

    /// Dense index in `0..64`, used by the search tables.
    pub(crate) fn index(&self) -> usize {
        self.rank as usize * BOARD_SIZE as usize + self.file as usize
    }

    /// Every square, rank-major from A1 to H8.
    pub fn all() -> impl Iterator<Item = Position> {
        (0..BOARD_SIZE).flat_map(|rank| (0..BOARD_SIZE).map(move |file| Position { file, rank }))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", (b'A' + self.file) as char, (b'1' + self.rank) as char)
    }
}

impl FromStr for Position {
    type Err = KnightError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Position {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Position {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Position::parse(&raw).map_err(serde::de::Error::custom)
    }
}
