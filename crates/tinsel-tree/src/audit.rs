//! Tree snapshots and invariant checks.
//!
//! [`audit`] checks the bounds that must hold at every instant: no level
//! holds more gnomes than its cap, no level books more ornaments than its
//! capacity, and the completed count never passes the target.
//!
//! [`audit_quiescent`] adds the checks that only hold once every gnome has
//! stopped: nobody is left on the tree, nothing is still being hung, and
//! the completed count equals the ornaments installed across all levels.
//!
//! A failed check produces a [`TreeAnomaly`] listing every violation found.

use serde::{Deserialize, Serialize};

/// Counters of one level at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelSnapshot {
    /// Level index (0 is the lowest).
    pub index: usize,
    /// Gnomes on the level.
    pub gnomes: u32,
    /// Maximum gnomes allowed.
    pub gnome_cap: u32,
    /// Ornaments hung.
    pub installed: u32,
    /// Ornaments being hung.
    pub pending: u32,
    /// Maximum ornaments the level can hold.
    pub ornament_cap: u32,
}

/// Counters of the whole tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeSnapshot {
    /// Every level, bottom first.
    pub levels: Vec<LevelSnapshot>,
    /// Ornaments counted as hung tree-wide.
    pub completed: u64,
    /// Total ornament capacity.
    pub target: u64,
}

impl TreeSnapshot {
    /// Sum of `installed` over every level.
    pub fn installed(&self) -> u64 {
        self.levels
            .iter()
            .map(|level| u64::from(level.installed))
            .fold(0, u64::saturating_add)
    }

    /// Gnomes per level, bottom first.
    pub fn occupancy(&self) -> Vec<u32> {
        self.levels.iter().map(|level| level.gnomes).collect()
    }
}

/// One broken invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "violation", rename_all = "snake_case")]
pub enum Violation {
    /// More gnomes on a level than it allows.
    OccupancyOverCap {
        /// The level.
        level: usize,
        /// Gnomes found.
        gnomes: u32,
        /// The level's gnome cap.
        cap: u32,
    },
    /// More ornaments booked on a level than it can hold.
    OrnamentsOverCap {
        /// The level.
        level: usize,
        /// `installed + pending`.
        booked: u64,
        /// The level's ornament cap.
        cap: u32,
    },
    /// The completed count passed the target.
    CompletedOverTarget {
        /// Completed ornaments.
        completed: u64,
        /// Target.
        target: u64,
    },
    /// At rest, the completed count differs from the installed total.
    CompletedMismatch {
        /// Completed ornaments.
        completed: u64,
        /// Ornaments installed across all levels.
        installed: u64,
    },
    /// At rest, an ornament is still marked as being hung.
    PendingAtRest {
        /// The level.
        level: usize,
        /// Pending ornaments.
        pending: u32,
    },
    /// At rest, a gnome is still standing on a level.
    GnomesAtRest {
        /// The level.
        level: usize,
        /// Gnomes found.
        gnomes: u32,
    },
}

/// Every violation found by one audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeAnomaly {
    /// The broken invariants, in level order.
    pub violations: Vec<Violation>,
    /// Human-readable summary.
    pub message: String,
}

impl core::fmt::Display for TreeAnomaly {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Outcome of an audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AuditResult {
    /// Every checked invariant holds.
    Sound,
    /// At least one invariant is broken.
    Anomaly(TreeAnomaly),
}

impl AuditResult {
    /// Whether every checked invariant holds.
    pub const fn is_sound(&self) -> bool {
        matches!(self, Self::Sound)
    }
}

/// Check the bounds that hold at every instant.
pub fn audit(snapshot: &TreeSnapshot) -> AuditResult {
    conclude(bounds(snapshot), "TREE_ANOMALY")
}

/// Check the bounds plus the invariants that hold once every gnome stopped.
pub fn audit_quiescent(snapshot: &TreeSnapshot) -> AuditResult {
    let mut violations = bounds(snapshot);

    for level in &snapshot.levels {
        if level.pending > 0 {
            violations.push(Violation::PendingAtRest {
                level: level.index,
                pending: level.pending,
            });
        }
        if level.gnomes > 0 {
            violations.push(Violation::GnomesAtRest {
                level: level.index,
                gnomes: level.gnomes,
            });
        }
    }

    let installed = snapshot.installed();
    if installed != snapshot.completed {
        violations.push(Violation::CompletedMismatch {
            completed: snapshot.completed,
            installed,
        });
    }

    conclude(violations, "TREE_ANOMALY at rest")
}

fn bounds(snapshot: &TreeSnapshot) -> Vec<Violation> {
    let mut violations = Vec::new();

    for level in &snapshot.levels {
        if level.gnomes > level.gnome_cap {
            violations.push(Violation::OccupancyOverCap {
                level: level.index,
                gnomes: level.gnomes,
                cap: level.gnome_cap,
            });
        }
        let booked = u64::from(level.installed).saturating_add(u64::from(level.pending));
        if booked > u64::from(level.ornament_cap) {
            violations.push(Violation::OrnamentsOverCap {
                level: level.index,
                booked,
                cap: level.ornament_cap,
            });
        }
    }

    if snapshot.completed > snapshot.target {
        violations.push(Violation::CompletedOverTarget {
            completed: snapshot.completed,
            target: snapshot.target,
        });
    }

    violations
}

fn conclude(violations: Vec<Violation>, label: &str) -> AuditResult {
    if violations.is_empty() {
        return AuditResult::Sound;
    }
    let count = violations.len();
    AuditResult::Anomaly(TreeAnomaly {
        violations,
        message: format!("{label}: {count} invariant(s) violated"),
    })
}
