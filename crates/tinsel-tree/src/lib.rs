//! Capacity-bounded levels and the boundary-crossing protocol.
//!
//! A [`Tree`] is a vertical stack of [`Level`]s above an unbounded ground.
//! Each level bounds how many gnomes may stand on it and how many ornaments
//! it can ever hold. Gnomes move one level at a time through the
//! [`Tree::move_up`] and [`Tree::move_down`] operations, which never exceed
//! a level's gnome capacity and never deadlock when two adjacent levels are
//! both full.
//!
//! # Modules
//!
//! - [`level`] -- Per-level occupancy and ornament accounting.
//! - [`boundary`] -- The single-slot rendezvous between adjacent positions.
//! - [`tree`] -- The [`Tree`] itself and the crossing protocol.
//! - [`completion`] -- The tree-wide count of hung ornaments.
//! - [`audit`] -- Snapshots and invariant checks.
//!
//! # Crossing protocol
//!
//! Every boundary (ground/level 0, level 0/level 1, ...) has one up slot
//! and one down slot, each holding at most one waiting gnome. A gnome whose
//! destination is full announces itself in its slot and waits on the
//! boundary's condition variable. A gnome arriving from the other side that
//! finds that announcement exchanges places with it instead of waiting: the
//! swap leaves both levels' occupancy unchanged, so it never needs spare
//! room at either end.
//!
//! # Lock ordering
//!
//! A crossing holds at most one boundary lock at a time. Under it, level
//! occupancy locks are taken in increasing level order. Neighbouring
//! boundaries are woken only after every lock has been released.

pub mod audit;
pub mod boundary;
pub mod completion;
pub mod error;
pub mod level;
pub mod tree;

pub use audit::{AuditResult, LevelSnapshot, TreeAnomaly, TreeSnapshot, Violation};
pub use boundary::{Rendezvous, Slot};
pub use completion::Progress;
pub use error::TreeError;
pub use level::{Level, LevelSpec, WorkClaim};
pub use tree::{Tree, validate};
