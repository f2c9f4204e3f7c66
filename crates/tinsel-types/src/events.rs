//! Trace events emitted while the tree is being decorated.
//!
//! Every state change a gnome or the delivery makes is described by one
//! [`TreeEvent`]. The [`core::fmt::Display`] form is the human-readable
//! trace line; the serde form is used for machine-readable logs. Lines from
//! independent gnomes interleave in whatever order the scheduler produces.

use serde::{Deserialize, Serialize};

use crate::enums::{MoveKind, Position};
use crate::ids::{GnomeId, OrnamentTicket};

/// The outcome of one boundary crossing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    /// The gnome that moved (or stayed).
    pub gnome: GnomeId,
    /// Position before the crossing.
    pub from: Position,
    /// Position after the crossing.
    pub to: Position,
    /// How the crossing completed.
    pub kind: MoveKind,
}

/// A single entry in the run's trace stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TreeEvent {
    /// A gnome worker started.
    GnomeSpawned {
        /// The new gnome.
        gnome: GnomeId,
    },
    /// A gnome on the ground is blocked until an ornament is delivered.
    WaitingForOrnament {
        /// The waiting gnome.
        gnome: GnomeId,
    },
    /// A gnome took an ornament from the delivery.
    OrnamentPickedUp {
        /// The gnome now carrying it.
        gnome: GnomeId,
        /// The ornament taken.
        ticket: OrnamentTicket,
    },
    /// A gnome crossed (or failed to cross) a boundary.
    Moved(Transition),
    /// A gnome claimed a slot on a level and started hanging.
    HangingStarted {
        /// The gnome doing the work.
        gnome: GnomeId,
        /// Level being decorated.
        level: usize,
        /// Per-level ornament number.
        ornament: u32,
    },
    /// A gnome finished hanging an ornament.
    HangingFinished {
        /// The gnome that did the work.
        gnome: GnomeId,
        /// Level that was decorated.
        level: usize,
        /// Per-level ornament number.
        ornament: u32,
        /// Ornaments hung on the whole tree after this one.
        completed: u64,
        /// Total ornament capacity of the tree.
        target: u64,
    },
    /// A gnome reached the top with no room anywhere and dropped its ornament.
    OrnamentDiscarded {
        /// The gnome that gave up.
        gnome: GnomeId,
        /// The level where it gave up (the top level).
        level: usize,
        /// The ornament lost.
        ticket: OrnamentTicket,
    },
    /// A gnome stopped for good.
    GnomeRested {
        /// The resting gnome.
        gnome: GnomeId,
    },
    /// The delivery released a batch of ornaments.
    DeliveryReleased {
        /// Ornaments in this batch.
        batch: u32,
        /// Ornaments waiting to be picked up after the release.
        available: u64,
    },
    /// The delivery was closed; no further ornaments are handed out.
    DeliveryClosed {
        /// Ornaments left unclaimed.
        available: u64,
    },
}

impl TreeEvent {
    /// The gnome this event concerns, if any.
    pub const fn gnome(&self) -> Option<GnomeId> {
        match self {
            Self::GnomeSpawned { gnome }
            | Self::WaitingForOrnament { gnome }
            | Self::OrnamentPickedUp { gnome, .. }
            | Self::HangingStarted { gnome, .. }
            | Self::HangingFinished { gnome, .. }
            | Self::OrnamentDiscarded { gnome, .. }
            | Self::GnomeRested { gnome } => Some(*gnome),
            Self::Moved(transition) => Some(transition.gnome),
            Self::DeliveryReleased { .. } | Self::DeliveryClosed { .. } => None,
        }
    }
}

impl core::fmt::Display for TreeEvent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GnomeSpawned { gnome } => write!(f, "{gnome} says hi"),
            Self::WaitingForOrnament { gnome } => {
                write!(f, "{gnome} is waiting for an ornament")
            }
            Self::OrnamentPickedUp { gnome, ticket } => {
                write!(f, "{gnome} picked up {ticket}")
            }
            Self::Moved(Transition {
                gnome,
                from,
                to,
                kind,
            }) => match kind {
                MoveKind::Plain if to < from => write!(f, "{gnome} moves down to {to}"),
                MoveKind::Plain => write!(f, "{gnome} moves up to {to}"),
                MoveKind::Swap { partner } if to < from => {
                    write!(f, "{gnome} swaps with {partner} moving down to {to}")
                }
                MoveKind::Swap { partner } => {
                    write!(f, "{gnome} swaps with {partner} moving up to {to}")
                }
                MoveKind::Stayed => write!(f, "{gnome} stays at {from}"),
            },
            Self::HangingStarted {
                gnome,
                level,
                ornament,
            } => write!(
                f,
                "{gnome} started hanging an ornament#{ornament} on level#{level}"
            ),
            Self::HangingFinished {
                gnome,
                level,
                ornament,
                completed,
                target,
            } => write!(
                f,
                "{gnome} finished hanging an ornament#{ornament} on level#{level} ({completed}/{target} hung)"
            ),
            Self::OrnamentDiscarded {
                gnome,
                level,
                ticket,
            } => write!(
                f,
                "{gnome} found no room up to level#{level} and dropped {ticket}"
            ),
            Self::GnomeRested { gnome } => {
                write!(f, "{gnome} has finally rested under the christmas tree")
            }
            Self::DeliveryReleased { batch, available } => write!(
                f,
                "delivery: {batch} ornaments delivered for a total of {available}"
            ),
            Self::DeliveryClosed { available } => {
                write!(f, "delivery: closed with {available} ornaments left")
            }
        }
    }
}
