//! Shared type definitions for the Tinsel simulation.
//!
//! This crate is the single source of truth for the small vocabulary shared
//! by the tree protocol, the gnome workers, and the engine binary.
//!
//! # Modules
//!
//! - [`ids`] -- Identifiers for gnomes, runs, and claimed ornaments
//! - [`enums`] -- Positions, directions, move outcomes, and gnome states
//! - [`events`] -- The [`TreeEvent`] trace vocabulary

pub mod enums;
pub mod events;
pub mod ids;

// Re-export all public types at crate root for convenience.
pub use enums::{Direction, GnomeState, MoveKind, Position};
pub use events::{Transition, TreeEvent};
pub use ids::{GnomeId, OrnamentTicket, RunId};
