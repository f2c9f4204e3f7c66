//! Error types for the `tinsel-tree` crate.
//!
//! Configuration problems are reported by [`crate::Tree::new`] before any
//! shared state exists. The remaining variants indicate a caller broke a
//! protocol precondition (for example leaving a level it never entered).

use tinsel_types::Position;

/// Errors that can occur while building or operating a tree.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    /// The tree must have at least one level.
    #[error("n_levels must be a positive integer")]
    NoLevels,

    /// The run must have at least one gnome.
    #[error("n_gnomes must be a positive integer")]
    NoGnomes,

    /// A level that no gnome can ever stand on would strand the gnomes below.
    #[error("gnome_cap of level#{level} must be at least 1")]
    ZeroGnomeCap {
        /// The offending level.
        level: usize,
    },

    /// Gnome capacity must shrink strictly from each level to the one above.
    #[error(
        "gnome_cap must be greater on each level than on the level above: \
         level#{level} allows {cap}, level#{below} allows {below_cap}"
    )]
    CapsNotDecreasing {
        /// The level whose cap is too large.
        level: usize,
        /// Its cap.
        cap: u32,
        /// The level directly below.
        below: usize,
        /// The cap of the level directly below.
        below_cap: u32,
    },

    /// A position outside the tree was passed to an operation.
    #[error("{position} is not part of a tree with {levels} levels")]
    NoSuchPosition {
        /// The invalid position.
        position: Position,
        /// Number of levels in the tree.
        levels: usize,
    },

    /// A boundary index outside the tree.
    #[error("boundary#{boundary} is not part of a tree with {levels} levels")]
    NoSuchBoundary {
        /// The invalid boundary index.
        boundary: usize,
        /// Number of levels in the tree.
        levels: usize,
    },

    /// A gnome left a level that had nobody on it.
    #[error("occupancy of level#{level} would drop below zero")]
    OccupancyUnderflow {
        /// The level.
        level: usize,
    },

    /// A gnome was admitted to a level that was already full.
    #[error("level#{level} is at capacity ({cap})")]
    LevelFull {
        /// The level.
        level: usize,
        /// Its gnome capacity.
        cap: u32,
    },

    /// A completed ornament did not match any pending one.
    #[error("no ornament is pending on level#{level}")]
    NothingPending {
        /// The level.
        level: usize,
    },

    /// More ornaments were completed than the tree can hold.
    #[error("completed ornaments would exceed the target of {target}")]
    CompletionOverflow {
        /// Total ornament capacity of the tree.
        target: u64,
    },

    /// Arithmetic overflow during a checked operation.
    #[error("arithmetic overflow in tree counters")]
    ArithmeticOverflow,
}
