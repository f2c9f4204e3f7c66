//! Type-safe identifiers.
//!
//! Gnomes are numbered densely from zero at spawn time, so [`GnomeId`] wraps
//! a `u32`. A whole run is identified by a UUID v7 ([`RunId`]) so that
//! summaries from repeated runs sort by start time.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a gnome within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GnomeId(pub u32);

impl GnomeId {
    /// Return the inner index.
    pub const fn into_inner(self) -> u32 {
        self.0
    }
}

impl core::fmt::Display for GnomeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "gnome#{}", self.0)
    }
}

impl From<u32> for GnomeId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Unique identifier for a simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Create a new identifier using UUID v7 (time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Return the inner [`Uuid`] value.
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for RunId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single ornament handed out by the delivery queue.
///
/// `serial` counts claims since the start of the run (0-indexed), so every
/// ornament a gnome ever carries has a distinct serial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrnamentTicket {
    /// Claim order across the whole run.
    pub serial: u64,
}

impl core::fmt::Display for OrnamentTicket {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "ornament#{}", self.serial)
    }
}
