//! Enumeration types for positions on the tree and gnome lifecycle.

use serde::{Deserialize, Serialize};

use crate::ids::GnomeId;

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// Where a gnome currently stands.
///
/// Levels are indexed from 0 at the bottom of the tree. The ground below
/// level 0 has unbounded room and is where every gnome starts and ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    /// Below the tree, unbounded occupancy.
    Ground,
    /// On the level with the given index.
    Level(usize),
}

impl Position {
    /// The position one step up, or `None` if the index would overflow.
    pub const fn above(self) -> Option<Self> {
        match self {
            Self::Ground => Some(Self::Level(0)),
            Self::Level(i) => match i.checked_add(1) {
                Some(next) => Some(Self::Level(next)),
                None => None,
            },
        }
    }

    /// The position one step down, or `None` when already on the ground.
    pub const fn below(self) -> Option<Self> {
        match self {
            Self::Ground => None,
            Self::Level(0) => Some(Self::Ground),
            Self::Level(i) => match i.checked_sub(1) {
                Some(prev) => Some(Self::Level(prev)),
                None => None,
            },
        }
    }

    /// The level index, if this is a level.
    pub const fn level(self) -> Option<usize> {
        match self {
            Self::Ground => None,
            Self::Level(i) => Some(i),
        }
    }

    /// Whether this is the ground.
    pub const fn is_ground(self) -> bool {
        matches!(self, Self::Ground)
    }
}

impl core::fmt::Display for Position {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Ground => write!(f, "the ground floor"),
            Self::Level(i) => write!(f, "level#{i}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// Direction of a crossing between adjacent positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Towards higher level indices.
    Up,
    /// Towards the ground.
    Down,
}

impl Direction {
    /// The other direction.
    pub const fn opposite(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
        }
    }
}

impl core::fmt::Display for Direction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Up => write!(f, "up"),
            Self::Down => write!(f, "down"),
        }
    }
}

// ---------------------------------------------------------------------------
// MoveKind
// ---------------------------------------------------------------------------

/// How a crossing was completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum MoveKind {
    /// The destination had spare room; one occupant moved across.
    Plain,
    /// Exchanged places with a gnome crossing the same boundary the other
    /// way. Occupancy of both levels is unchanged.
    Swap {
        /// The gnome that crossed in the opposite direction.
        partner: GnomeId,
    },
    /// No crossing was possible (ascending from the top level).
    Stayed,
}

impl MoveKind {
    /// Whether the gnome actually changed position.
    pub const fn moved(self) -> bool {
        !matches!(self, Self::Stayed)
    }
}

// ---------------------------------------------------------------------------
// GnomeState
// ---------------------------------------------------------------------------

/// Lifecycle state of a gnome worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GnomeState {
    /// On the ground, deciding whether to fetch another ornament.
    AtGround,
    /// Crossing a boundary upwards.
    Ascending,
    /// Standing on a level, hanging or deciding where to go.
    AtLevel(usize),
    /// Crossing a boundary downwards.
    Descending,
    /// Resting under the tree for good.
    Done,
}
