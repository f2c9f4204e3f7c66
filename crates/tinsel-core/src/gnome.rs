//! The per-gnome state machine.
//!
//! A gnome loops until the tree is fully decorated:
//!
//! - **On the ground**: rest if every ornament is hung. Otherwise pick up an
//!   ornament (waiting for a delivery if needed) and climb to level 0.
//! - **On a level, empty-handed**: climb down one level.
//! - **On a level, carrying**: hang the ornament here if the level has room.
//!   If not, climb one level higher, or drop the ornament when already on
//!   the top level.
//!
//! Every step runs on the gnome's own blocking thread. Hanging an ornament
//! sleeps for the installation time without holding any lock.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tinsel_tree::{Tree, TreeError, WorkClaim};
use tinsel_types::{
    GnomeId, GnomeState, MoveKind, OrnamentTicket, Position, Transition, TreeEvent,
};
use tracing::debug;

use crate::delivery::{DeliveryError, DeliveryQueue};
use crate::sink::EventSink;

/// Errors that stop a gnome.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GnomeError {
    /// A tree operation rejected the gnome's request.
    #[error("{gnome}: {source}")]
    Tree {
        /// The gnome that failed.
        gnome: GnomeId,
        /// The underlying tree error.
        source: TreeError,
    },

    /// The delivery queue failed for a reason other than closing.
    #[error("{gnome}: {source}")]
    Delivery {
        /// The gnome that failed.
        gnome: GnomeId,
        /// The underlying delivery error.
        source: DeliveryError,
    },
}

/// Why a gnome stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every ornament was hung; the gnome rests under the tree.
    Rested,
    /// The delivery closed while the gnome was on the ground.
    DeliveryClosed,
}

/// What one gnome did during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GnomeReport {
    /// The gnome.
    pub gnome: GnomeId,
    /// Ornaments picked up from the delivery.
    pub picked_up: u32,
    /// Ornaments hung.
    pub hung: u32,
    /// Ornaments dropped for lack of room.
    pub discarded: u32,
    /// Boundary crossings, swaps included.
    pub moves: u64,
    /// Crossings completed by exchanging places with another gnome.
    pub swaps: u64,
    /// Why the gnome stopped, once it has.
    pub stopped: Option<StopReason>,
}

impl GnomeReport {
    pub(crate) const fn new(gnome: GnomeId) -> Self {
        Self {
            gnome,
            picked_up: 0,
            hung: 0,
            discarded: 0,
            moves: 0,
            swaps: 0,
            stopped: None,
        }
    }
}

/// One gnome working on a shared tree.
pub struct Gnome<'a> {
    id: GnomeId,
    tree: &'a Tree,
    delivery: &'a DeliveryQueue,
    sink: &'a dyn EventSink,
    installation_time: Duration,
    state: GnomeState,
    position: Position,
    carrying: Option<OrnamentTicket>,
    report: GnomeReport,
}

impl<'a> Gnome<'a> {
    /// Place a new, empty-handed gnome on the ground.
    pub const fn new(
        id: GnomeId,
        tree: &'a Tree,
        delivery: &'a DeliveryQueue,
        sink: &'a dyn EventSink,
        installation_time: Duration,
    ) -> Self {
        Self {
            id,
            tree,
            delivery,
            sink,
            installation_time,
            state: GnomeState::AtGround,
            position: Position::Ground,
            carrying: None,
            report: GnomeReport::new(id),
        }
    }

    /// Where the gnome stands.
    pub const fn position(&self) -> Position {
        self.position
    }

    /// The ornament the gnome is carrying, if any.
    pub const fn carrying(&self) -> Option<OrnamentTicket> {
        self.carrying
    }

    /// Counters so far.
    pub const fn report(&self) -> GnomeReport {
        self.report
    }

    /// Run the state machine until the gnome is done.
    pub fn run(mut self) -> Result<GnomeReport, GnomeError> {
        self.sink.record(&TreeEvent::GnomeSpawned { gnome: self.id });
        while self.step()? != GnomeState::Done {}
        Ok(self.report)
    }

    /// Take one decision and carry it out. Blocks while crossing a boundary,
    /// waiting for a delivery, or hanging an ornament.
    pub fn step(&mut self) -> Result<GnomeState, GnomeError> {
        if self.state == GnomeState::Done {
            return Ok(self.state);
        }

        match self.position {
            Position::Ground => self.step_on_ground()?,
            Position::Level(level) => self.step_on_level(level)?,
        }
        Ok(self.state)
    }

    fn step_on_ground(&mut self) -> Result<(), GnomeError> {
        if self.tree.is_complete() {
            self.sink.record(&TreeEvent::GnomeRested { gnome: self.id });
            self.stop(StopReason::Rested);
            return Ok(());
        }

        if self.carrying.is_none() {
            match self.pick_up()? {
                Some(ticket) => self.carrying = Some(ticket),
                None => {
                    debug!(gnome = %self.id, "Delivery closed, gnome stopping");
                    self.stop(StopReason::DeliveryClosed);
                    return Ok(());
                }
            }
        }

        self.state = GnomeState::Ascending;
        let transition = self
            .tree
            .move_up(self.id, self.position)
            .map_err(|source| self.tree_error(source))?;
        self.arrive(transition);
        Ok(())
    }

    fn step_on_level(&mut self, level: usize) -> Result<(), GnomeError> {
        let Some(ticket) = self.carrying else {
            self.state = GnomeState::Descending;
            let transition = self
                .tree
                .move_down(self.id, self.position)
                .map_err(|source| self.tree_error(source))?;
            self.arrive(transition);
            return Ok(());
        };

        let claim = self
            .tree
            .try_claim_work(level)
            .map_err(|source| self.tree_error(source))?;
        if let Some(claim) = claim {
            self.hang(claim)?;
            self.carrying = None;
            return Ok(());
        }

        if self.tree.is_top(level) {
            self.sink.record(&TreeEvent::OrnamentDiscarded {
                gnome: self.id,
                level,
                ticket,
            });
            self.report.discarded = self.report.discarded.saturating_add(1);
            self.carrying = None;
            return Ok(());
        }

        self.state = GnomeState::Ascending;
        let transition = self
            .tree
            .move_up(self.id, self.position)
            .map_err(|source| self.tree_error(source))?;
        self.arrive(transition);
        Ok(())
    }

    /// Take an ornament from the delivery, or `None` once it is closed.
    fn pick_up(&mut self) -> Result<Option<OrnamentTicket>, GnomeError> {
        let ticket = match self.delivery.try_claim() {
            Ok(Some(ticket)) => ticket,
            Ok(None) => {
                self.sink
                    .record(&TreeEvent::WaitingForOrnament { gnome: self.id });
                match self.delivery.claim() {
                    Ok(ticket) => ticket,
                    Err(DeliveryError::Closed) => return Ok(None),
                    Err(source) => return Err(self.delivery_error(source)),
                }
            }
            Err(DeliveryError::Closed) => return Ok(None),
            Err(source) => return Err(self.delivery_error(source)),
        };

        self.sink.record(&TreeEvent::OrnamentPickedUp {
            gnome: self.id,
            ticket,
        });
        self.report.picked_up = self.report.picked_up.saturating_add(1);
        Ok(Some(ticket))
    }

    fn hang(&mut self, claim: WorkClaim) -> Result<(), GnomeError> {
        let level = claim.level();
        let ornament = claim.ornament();
        self.sink.record(&TreeEvent::HangingStarted {
            gnome: self.id,
            level,
            ornament,
        });

        if !self.installation_time.is_zero() {
            std::thread::sleep(self.installation_time);
        }

        let progress = self
            .tree
            .complete_work(claim)
            .map_err(|source| self.tree_error(source))?;
        self.sink.record(&TreeEvent::HangingFinished {
            gnome: self.id,
            level,
            ornament,
            completed: progress.completed,
            target: progress.target,
        });
        self.report.hung = self.report.hung.saturating_add(1);
        Ok(())
    }

    fn arrive(&mut self, transition: Transition) {
        self.sink.record(&TreeEvent::Moved(transition));
        match transition.kind {
            MoveKind::Plain => {
                self.report.moves = self.report.moves.saturating_add(1);
            }
            MoveKind::Swap { .. } => {
                self.report.moves = self.report.moves.saturating_add(1);
                self.report.swaps = self.report.swaps.saturating_add(1);
            }
            MoveKind::Stayed => {}
        }
        self.position = transition.to;
        self.state = match transition.to {
            Position::Ground => GnomeState::AtGround,
            Position::Level(level) => GnomeState::AtLevel(level),
        };
    }

    fn stop(&mut self, reason: StopReason) {
        self.state = GnomeState::Done;
        self.report.stopped = Some(reason);
    }

    const fn tree_error(&self, source: TreeError) -> GnomeError {
        GnomeError::Tree {
            gnome: self.id,
            source,
        }
    }

    const fn delivery_error(&self, source: DeliveryError) -> GnomeError {
        GnomeError::Delivery {
            gnome: self.id,
            source,
        }
    }
}
