//! Per-level capacity accounting.
//!
//! A [`Level`] owns two independently locked counters:
//!
//! - **occupancy** -- gnomes currently standing on the level, bounded by
//!   `gnome_cap`;
//! - **work** -- ornaments already hung (`installed`) plus ornaments being
//!   hung right now (`pending`), together bounded by `ornament_cap`.
//!
//! The two locks are never needed together by a crossing, so hanging an
//! ornament never blocks gnomes moving through the level.

use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};

use crate::error::TreeError;

/// Static shape of one level, as configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelSpec {
    /// Maximum number of gnomes allowed on this level at once.
    pub gnome_cap: u32,
    /// Maximum number of ornaments this level can ever hold.
    pub ornament_cap: u32,
}

/// Ornament counters guarded by the level's work lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct WorkCounters {
    installed: u32,
    pending: u32,
}

/// Proof that a gnome reserved room for one ornament on a level.
///
/// Obtained from [`Level::try_claim_work`] and consumed by
/// [`Level::complete_work`], so every reservation completes at most once.
#[derive(Debug, PartialEq, Eq)]
pub struct WorkClaim {
    level: usize,
    ornament: u32,
}

impl WorkClaim {
    /// The level the ornament is reserved on.
    pub const fn level(&self) -> usize {
        self.level
    }

    /// Per-level ornament number, unique within the level.
    pub const fn ornament(&self) -> u32 {
        self.ornament
    }
}

/// One capacity-bounded level of the tree.
#[derive(Debug)]
pub struct Level {
    index: usize,
    gnome_cap: u32,
    ornament_cap: u32,
    occupancy: Mutex<u32>,
    work: Mutex<WorkCounters>,
}

impl Level {
    /// Create an empty level at the given index.
    pub fn new(index: usize, spec: LevelSpec) -> Self {
        Self {
            index,
            gnome_cap: spec.gnome_cap,
            ornament_cap: spec.ornament_cap,
            occupancy: Mutex::new(0),
            work: Mutex::new(WorkCounters {
                installed: 0,
                pending: 0,
            }),
        }
    }

    /// Index of this level (0 is the lowest).
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Maximum number of gnomes allowed at once.
    pub const fn gnome_cap(&self) -> u32 {
        self.gnome_cap
    }

    /// Maximum number of ornaments the level can hold.
    pub const fn ornament_cap(&self) -> u32 {
        self.ornament_cap
    }

    /// Current number of gnomes on the level.
    pub fn gnomes(&self) -> u32 {
        *self.occupancy.lock()
    }

    /// Ornaments hung so far and ornaments being hung, in that order.
    pub fn ornaments(&self) -> (u32, u32) {
        let work = self.work.lock();
        (work.installed, work.pending)
    }

    // -----------------------------------------------------------------------
    // Occupancy
    // -----------------------------------------------------------------------

    /// Admit one gnome if there is room. Never blocks on capacity.
    pub fn try_enter(&self) -> bool {
        self.lock_occupancy().admit().is_ok()
    }

    /// Remove one gnome. The caller must have entered before.
    pub fn leave(&self) -> Result<(), TreeError> {
        self.lock_occupancy().release()
    }

    pub(crate) fn lock_occupancy(&self) -> Occupancy<'_> {
        Occupancy {
            level: self.index,
            cap: self.gnome_cap,
            current: self.occupancy.lock(),
        }
    }

    // -----------------------------------------------------------------------
    // Ornaments
    // -----------------------------------------------------------------------

    /// Reserve room for one ornament, or `None` if the level is fully booked.
    pub fn try_claim_work(&self) -> Option<WorkClaim> {
        let mut work = self.work.lock();
        let booked = work.installed.checked_add(work.pending)?;
        if booked >= self.ornament_cap {
            return None;
        }
        work.pending = work.pending.checked_add(1)?;
        Some(WorkClaim {
            level: self.index,
            ornament: booked,
        })
    }

    /// Turn a reservation into a hung ornament.
    pub fn complete_work(&self, claim: WorkClaim) -> Result<(), TreeError> {
        if claim.level != self.index {
            return Err(TreeError::NothingPending { level: self.index });
        }
        let mut work = self.work.lock();
        let pending = work
            .pending
            .checked_sub(1)
            .ok_or(TreeError::NothingPending { level: self.index })?;
        let installed = work
            .installed
            .checked_add(1)
            .ok_or(TreeError::ArithmeticOverflow)?;
        work.pending = pending;
        work.installed = installed;
        Ok(())
    }
}

/// A held occupancy lock for one level.
pub(crate) struct Occupancy<'a> {
    level: usize,
    cap: u32,
    current: MutexGuard<'a, u32>,
}

impl Occupancy<'_> {
    pub(crate) fn has_room(&self) -> bool {
        *self.current < self.cap
    }

    pub(crate) fn count(&self) -> u32 {
        *self.current
    }

    pub(crate) fn admit(&mut self) -> Result<(), TreeError> {
        if !self.has_room() {
            return Err(TreeError::LevelFull {
                level: self.level,
                cap: self.cap,
            });
        }
        *self.current = self
            .current
            .checked_add(1)
            .ok_or(TreeError::ArithmeticOverflow)?;
        Ok(())
    }

    pub(crate) fn release(&mut self) -> Result<(), TreeError> {
        *self.current = self
            .current
            .checked_sub(1)
            .ok_or(TreeError::OccupancyUnderflow { level: self.level })?;
        Ok(())
    }

    /// Move one gnome from `self` into `dest` if `dest` has room.
    ///
    /// Returns `Ok(false)` without touching either counter when `dest` is
    /// full.
    pub(crate) fn shift_into(&mut self, dest: &mut Self) -> Result<bool, TreeError> {
        if !dest.has_room() {
            return Ok(false);
        }
        let src_after = self
            .current
            .checked_sub(1)
            .ok_or(TreeError::OccupancyUnderflow { level: self.level })?;
        let dest_after = dest
            .current
            .checked_add(1)
            .ok_or(TreeError::ArithmeticOverflow)?;
        *self.current = src_after;
        *dest.current = dest_after;
        Ok(true)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn level(gnome_cap: u32, ornament_cap: u32) -> Level {
        Level::new(
            0,
            LevelSpec {
                gnome_cap,
                ornament_cap,
            },
        )
    }

    #[test]
    fn enter_respects_gnome_cap() {
        let level = level(2, 0);
        assert!(level.try_enter());
        assert!(level.try_enter());
        assert!(!level.try_enter());
        assert_eq!(level.gnomes(), 2);

        level.leave().unwrap();
        assert!(level.try_enter());
    }

    #[test]
    fn leave_from_empty_level_errors() {
        let level = level(1, 0);
        assert_eq!(
            level.leave(),
            Err(TreeError::OccupancyUnderflow { level: 0 })
        );
        assert_eq!(level.gnomes(), 0);
    }

    #[test]
    fn claims_count_pending_against_capacity() {
        let level = level(1, 2);
        let first = level.try_claim_work().unwrap();
        let second = level.try_claim_work().unwrap();
        assert!(level.try_claim_work().is_none());
        assert_eq!(level.ornaments(), (0, 2));

        assert_eq!(first.ornament(), 0);
        assert_eq!(second.ornament(), 1);

        level.complete_work(first).unwrap();
        assert_eq!(level.ornaments(), (1, 1));
        // Completing does not free room: the ornament is now hung.
        assert!(level.try_claim_work().is_none());

        level.complete_work(second).unwrap();
        assert_eq!(level.ornaments(), (2, 0));
    }

    #[test]
    fn ornament_numbers_stay_unique_across_completions() {
        let level = level(1, 4);
        let a = level.try_claim_work().unwrap();
        let b = level.try_claim_work().unwrap();
        level.complete_work(a).unwrap();
        let c = level.try_claim_work().unwrap();
        assert_eq!(b.ornament(), 1);
        assert_eq!(c.ornament(), 2);
    }

    #[test]
    fn zero_ornament_cap_never_claims() {
        let level = level(3, 0);
        assert!(level.try_claim_work().is_none());
    }

    #[test]
    fn claim_from_another_level_is_rejected() {
        let lower = level(2, 1);
        let upper = Level::new(
            1,
            LevelSpec {
                gnome_cap: 1,
                ornament_cap: 1,
            },
        );
        let claim = upper.try_claim_work().unwrap();
        assert_eq!(
            lower.complete_work(claim),
            Err(TreeError::NothingPending { level: 0 })
        );
    }

    #[test]
    fn shift_moves_one_gnome_only_when_room() {
        let lower = level(2, 0);
        let upper = Level::new(
            1,
            LevelSpec {
                gnome_cap: 1,
                ornament_cap: 0,
            },
        );
        assert!(lower.try_enter());
        assert!(lower.try_enter());
        {
            let mut src = lower.lock_occupancy();
            let mut dest = upper.lock_occupancy();
            assert!(src.shift_into(&mut dest).unwrap());
            assert!(!src.shift_into(&mut dest).unwrap());
            assert_eq!(src.count(), 1);
            assert_eq!(dest.count(), 1);
        }
        assert_eq!(lower.gnomes(), 1);
        assert_eq!(upper.gnomes(), 1);
    }
}
