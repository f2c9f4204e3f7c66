//! Single-slot rendezvous between two adjacent positions.
//!
//! Boundary `k` sits directly below level `k`: boundary 0 is the entrance
//! from the ground, boundary 1 joins levels 0 and 1, and so on. Each
//! boundary holds one [`Slot`] per direction. A slot announces at most one
//! gnome that is waiting to cross; other gnomes heading the same way wait on
//! the same condition variable without announcing themselves.

use parking_lot::{Condvar, Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use tinsel_types::{Direction, GnomeId};

/// State of one direction's slot at a boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    /// Nobody is announced.
    #[default]
    Empty,
    /// The gnome is waiting for room or for a swap partner.
    Waiting(GnomeId),
    /// A partner crossing the other way has exchanged places with the gnome.
    /// The gnome has not yet woken up to notice.
    Swapped {
        /// The gnome whose crossing was completed by the swap.
        gnome: GnomeId,
        /// The gnome that initiated the swap.
        partner: GnomeId,
    },
}

/// Both slots of one boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rendezvous {
    /// Slot for gnomes moving up through the boundary.
    pub up: Slot,
    /// Slot for gnomes moving down through the boundary.
    pub down: Slot,
}

impl Rendezvous {
    /// The slot for the given direction.
    pub const fn slot(&self, direction: Direction) -> Slot {
        match direction {
            Direction::Up => self.up,
            Direction::Down => self.down,
        }
    }

    const fn slot_mut(&mut self, direction: Direction) -> &mut Slot {
        match direction {
            Direction::Up => &mut self.up,
            Direction::Down => &mut self.down,
        }
    }

    /// The gnome announced as waiting in `direction`, if any.
    pub const fn waiting(&self, direction: Direction) -> Option<GnomeId> {
        match self.slot(direction) {
            Slot::Waiting(gnome) => Some(gnome),
            Slot::Empty | Slot::Swapped { .. } => None,
        }
    }

    /// If a partner already completed this gnome's crossing, clear the slot
    /// and return the partner.
    pub(crate) fn take_swapped(
        &mut self,
        direction: Direction,
        gnome: GnomeId,
    ) -> Option<GnomeId> {
        let slot = self.slot_mut(direction);
        let current = *slot;
        match current {
            Slot::Swapped {
                gnome: swapped,
                partner,
            } if swapped == gnome => {
                *slot = Slot::Empty;
                Some(partner)
            }
            Slot::Empty | Slot::Waiting(_) | Slot::Swapped { .. } => None,
        }
    }

    /// Announce the gnome in its slot. Returns `true` if the slot changed.
    pub(crate) fn announce(&mut self, direction: Direction, gnome: GnomeId) -> bool {
        let slot = self.slot_mut(direction);
        if *slot == Slot::Empty {
            *slot = Slot::Waiting(gnome);
            true
        } else {
            false
        }
    }

    /// Withdraw the gnome's announcement, if it still holds the slot.
    pub(crate) fn withdraw(&mut self, direction: Direction, gnome: GnomeId) {
        let slot = self.slot_mut(direction);
        if *slot == Slot::Waiting(gnome) {
            *slot = Slot::Empty;
        }
    }

    /// Exchange places with the gnome waiting in the opposite direction.
    ///
    /// Marks the partner's slot as swapped and withdraws `gnome`'s own
    /// announcement. Returns the partner, or `None` if nobody other than
    /// `gnome` is waiting the other way.
    pub(crate) fn swap_with_opposite(
        &mut self,
        direction: Direction,
        gnome: GnomeId,
    ) -> Option<GnomeId> {
        let opposite = direction.opposite();
        let partner = self.waiting(opposite).filter(|&partner| partner != gnome)?;
        *self.slot_mut(opposite) = Slot::Swapped { gnome: partner, partner: gnome };
        self.withdraw(direction, gnome);
        Some(partner)
    }
}

/// A boundary's rendezvous state and the condition variable its waiters
/// sleep on.
#[derive(Debug, Default)]
pub(crate) struct Boundary {
    slots: Mutex<Rendezvous>,
    changed: Condvar,
}

impl Boundary {
    pub(crate) fn lock(&self) -> MutexGuard<'_, Rendezvous> {
        self.slots.lock()
    }

    pub(crate) fn snapshot(&self) -> Rendezvous {
        *self.slots.lock()
    }

    /// Sleep until woken. The caller re-checks its predicate afterwards.
    pub(crate) fn wait(&self, guard: &mut MutexGuard<'_, Rendezvous>) {
        self.changed.wait(guard);
    }

    /// Wake waiters while the caller still holds this boundary's lock.
    pub(crate) fn notify_locked(&self) {
        self.changed.notify_all();
    }

    /// Wake every waiter after a state change made elsewhere.
    ///
    /// Taking the lock first orders the wake-up after any waiter that has
    /// checked its predicate but not yet gone to sleep.
    pub(crate) fn wake_all(&self) {
        drop(self.slots.lock());
        self.changed.notify_all();
    }
}
