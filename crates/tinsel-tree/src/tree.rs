//! The tree: an ordered stack of levels and the crossing protocol.
//!
//! [`Tree::move_up`] and [`Tree::move_down`] are the only operations that
//! change where gnomes stand. Each moves a gnome across exactly one
//! boundary and blocks until the crossing is possible:
//!
//! 1. If a partner already exchanged places with this gnome, the crossing
//!    is done.
//! 2. If the destination has room, move across (plain crossing).
//! 3. If a gnome is announced in the opposite direction, exchange places
//!    with it (swap). Neither level's occupancy changes.
//! 4. Otherwise announce this gnome in its slot if the slot is free and
//!    sleep on the boundary until something changes, then start again.
//!
//! Every decision is made under the boundary's lock, so the slot state and
//! the occupancy read that drives it are consistent. Waiters are not served
//! in arrival order; whichever waiter re-checks first after a change wins.

use tinsel_types::{Direction, GnomeId, MoveKind, Position, Transition};
use tracing::{debug, trace};

use crate::audit::{LevelSnapshot, TreeSnapshot};
use crate::boundary::{Boundary, Rendezvous};
use crate::completion::{Completion, Progress};
use crate::error::TreeError;
use crate::level::{Level, LevelSpec, WorkClaim};

/// Check a tree shape before building anything.
///
/// Requires at least one level, at least one gnome, a non-zero gnome cap on
/// every level, and gnome caps that strictly shrink going up.
pub fn validate(gnome_count: u32, specs: &[LevelSpec]) -> Result<(), TreeError> {
    if specs.is_empty() {
        return Err(TreeError::NoLevels);
    }
    if gnome_count == 0 {
        return Err(TreeError::NoGnomes);
    }
    if let Some(level) = specs.iter().position(|spec| spec.gnome_cap == 0) {
        return Err(TreeError::ZeroGnomeCap { level });
    }
    for (below, pair) in specs.windows(2).enumerate() {
        let [lower, upper] = pair else {
            continue;
        };
        if upper.gnome_cap >= lower.gnome_cap {
            return Err(TreeError::CapsNotDecreasing {
                level: below.saturating_add(1),
                cap: upper.gnome_cap,
                below,
                below_cap: lower.gnome_cap,
            });
        }
    }
    Ok(())
}

/// A vertical stack of levels above an unbounded ground.
#[derive(Debug)]
pub struct Tree {
    levels: Vec<Level>,
    /// `boundaries[k]` sits directly below `levels[k]`.
    boundaries: Vec<Boundary>,
    completion: Completion,
    gnome_count: u32,
}

impl Tree {
    /// Build an empty tree for `gnome_count` gnomes.
    ///
    /// # Errors
    ///
    /// Returns the first problem found by [`validate`]. Nothing is built
    /// when validation fails.
    pub fn new(gnome_count: u32, specs: &[LevelSpec]) -> Result<Self, TreeError> {
        validate(gnome_count, specs)?;

        let target = specs
            .iter()
            .try_fold(0_u64, |acc, spec| acc.checked_add(u64::from(spec.ornament_cap)))
            .ok_or(TreeError::ArithmeticOverflow)?;

        let levels: Vec<Level> = specs
            .iter()
            .enumerate()
            .map(|(index, spec)| Level::new(index, *spec))
            .collect();
        let boundaries = specs.iter().map(|_| Boundary::default()).collect();

        Ok(Self {
            levels,
            boundaries,
            completion: Completion::new(target),
            gnome_count,
        })
    }

    /// Number of levels.
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Index of the top level.
    pub fn top_level(&self) -> usize {
        self.levels.len().saturating_sub(1)
    }

    /// Whether `level` is the top level.
    pub fn is_top(&self, level: usize) -> bool {
        level == self.top_level()
    }

    /// Number of gnomes the tree was built for.
    pub const fn gnome_count(&self) -> u32 {
        self.gnome_count
    }

    /// All levels, bottom first.
    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    /// The level with the given index.
    pub fn level(&self, index: usize) -> Result<&Level, TreeError> {
        self.levels.get(index).ok_or(TreeError::NoSuchPosition {
            position: Position::Level(index),
            levels: self.levels.len(),
        })
    }

    fn boundary(&self, index: usize) -> Result<&Boundary, TreeError> {
        self.boundaries.get(index).ok_or(TreeError::NoSuchBoundary {
            boundary: index,
            levels: self.levels.len(),
        })
    }

    /// Copy of a boundary's slots. Boundary `k` sits directly below level `k`.
    pub fn rendezvous(&self, boundary: usize) -> Result<Rendezvous, TreeError> {
        Ok(self.boundary(boundary)?.snapshot())
    }

    // -----------------------------------------------------------------------
    // Crossings
    // -----------------------------------------------------------------------

    /// Move `gnome` from `from` to the position directly above it.
    ///
    /// Blocks until the crossing completes. Ascending from the top level
    /// returns immediately with [`MoveKind::Stayed`].
    pub fn move_up(&self, gnome: GnomeId, from: Position) -> Result<Transition, TreeError> {
        let boundary = match from {
            Position::Ground => 0,
            Position::Level(index) => {
                self.level(index)?;
                if self.is_top(index) {
                    debug!(gnome = %gnome, level = index, "Already on the top level");
                    return Ok(Transition {
                        gnome,
                        from,
                        to: from,
                        kind: MoveKind::Stayed,
                    });
                }
                index.checked_add(1).ok_or(TreeError::ArithmeticOverflow)?
            }
        };
        let kind = self.cross(gnome, boundary, Direction::Up)?;
        Ok(Transition {
            gnome,
            from,
            to: Position::Level(boundary),
            kind,
        })
    }

    /// Move `gnome` from `from` to the position directly below it.
    ///
    /// Blocks until the crossing completes. Descending onto the ground never
    /// waits. Descending from the ground returns [`MoveKind::Stayed`].
    pub fn move_down(&self, gnome: GnomeId, from: Position) -> Result<Transition, TreeError> {
        let Position::Level(index) = from else {
            return Ok(Transition {
                gnome,
                from,
                to: from,
                kind: MoveKind::Stayed,
            });
        };
        self.level(index)?;
        let to = from.below().ok_or(TreeError::ArithmeticOverflow)?;
        let kind = self.cross(gnome, index, Direction::Down)?;
        Ok(Transition {
            gnome,
            from,
            to,
            kind,
        })
    }

    fn cross(
        &self,
        gnome: GnomeId,
        index: usize,
        direction: Direction,
    ) -> Result<MoveKind, TreeError> {
        let boundary = self.boundary(index)?;
        let mut slots = boundary.lock();

        loop {
            if let Some(partner) = slots.take_swapped(direction, gnome) {
                drop(slots);
                trace!(gnome = %gnome, partner = %partner, boundary = index, %direction, "Swapped by partner");
                self.wake_around(index);
                return Ok(MoveKind::Swap { partner });
            }

            let shifted = match self.try_shift(index, direction) {
                Ok(shifted) => shifted,
                Err(err) => {
                    slots.withdraw(direction, gnome);
                    return Err(err);
                }
            };
            if shifted {
                slots.withdraw(direction, gnome);
                drop(slots);
                trace!(gnome = %gnome, boundary = index, %direction, "Plain crossing");
                self.wake_around(index);
                return Ok(MoveKind::Plain);
            }

            if let Some(partner) = self.try_swap(&mut slots, index, direction, gnome)? {
                drop(slots);
                trace!(gnome = %gnome, partner = %partner, boundary = index, %direction, "Swap committed");
                self.wake_around(index);
                return Ok(MoveKind::Swap { partner });
            }

            if slots.announce(direction, gnome) {
                trace!(gnome = %gnome, boundary = index, %direction, "Announced in slot");
                boundary.notify_locked();
            }
            trace!(gnome = %gnome, boundary = index, %direction, "Waiting at boundary");
            boundary.wait(&mut slots);
        }
    }

    /// Move one gnome across boundary `index` if the destination has room.
    fn try_shift(&self, index: usize, direction: Direction) -> Result<bool, TreeError> {
        match index.checked_sub(1) {
            None => {
                let mut entrance = self.level(0)?.lock_occupancy();
                match direction {
                    Direction::Up => {
                        if !entrance.has_room() {
                            return Ok(false);
                        }
                        entrance.admit()?;
                    }
                    Direction::Down => entrance.release()?,
                }
                Ok(true)
            }
            Some(lower) => {
                let mut below = self.level(lower)?.lock_occupancy();
                let mut above = self.level(index)?.lock_occupancy();
                match direction {
                    Direction::Up => below.shift_into(&mut above),
                    Direction::Down => above.shift_into(&mut below),
                }
            }
        }
    }

    /// Exchange places with a gnome announced in the opposite direction.
    ///
    /// Both levels' occupancy locks are held, lower first, while the slots
    /// change so the exchange is atomic with respect to every other crossing
    /// touching either level.
    fn try_swap(
        &self,
        slots: &mut Rendezvous,
        index: usize,
        direction: Direction,
        gnome: GnomeId,
    ) -> Result<Option<GnomeId>, TreeError> {
        if slots.waiting(direction.opposite()).is_none() {
            return Ok(None);
        }
        let below = match index.checked_sub(1) {
            Some(lower) => Some(self.level(lower)?.lock_occupancy()),
            None => None,
        };
        let above = self.level(index)?.lock_occupancy();
        let partner = slots.swap_with_opposite(direction, gnome);
        drop(above);
        drop(below);
        Ok(partner)
    }

    /// Wake the boundaries whose waiters can observe a crossing at `index`.
    fn wake_around(&self, index: usize) {
        let neighbours = [index.checked_sub(1), Some(index), index.checked_add(1)];
        for boundary in neighbours.into_iter().flatten() {
            if let Some(boundary) = self.boundaries.get(boundary) {
                boundary.wake_all();
            }
        }
    }

    // -----------------------------------------------------------------------
    // Ornaments
    // -----------------------------------------------------------------------

    /// Reserve room for one ornament on `level`.
    pub fn try_claim_work(&self, level: usize) -> Result<Option<WorkClaim>, TreeError> {
        Ok(self.level(level)?.try_claim_work())
    }

    /// Finish a reserved ornament and count it towards the tree's target.
    pub fn complete_work(&self, claim: WorkClaim) -> Result<Progress, TreeError> {
        self.level(claim.level())?.complete_work(claim)?;
        self.completion.record()
    }

    /// Hung and target ornament counts.
    pub fn progress(&self) -> Progress {
        self.completion.progress()
    }

    /// Whether every ornament the tree can hold has been hung.
    pub fn is_complete(&self) -> bool {
        self.completion.progress().is_complete()
    }

    /// Sum of every level's ornament capacity.
    pub const fn target(&self) -> u64 {
        self.completion.target()
    }

    // -----------------------------------------------------------------------
    // Observation
    // -----------------------------------------------------------------------

    /// Copy every level's counters.
    ///
    /// Each level is read consistently; different levels may be read at
    /// slightly different instants while gnomes are moving.
    pub fn snapshot(&self) -> TreeSnapshot {
        let levels = self
            .levels
            .iter()
            .map(|level| {
                let (installed, pending) = level.ornaments();
                LevelSnapshot {
                    index: level.index(),
                    gnomes: level.gnomes(),
                    gnome_cap: level.gnome_cap(),
                    installed,
                    pending,
                    ornament_cap: level.ornament_cap(),
                }
            })
            .collect();
        let progress = self.completion.progress();
        TreeSnapshot {
            levels,
            completed: progress.completed,
            target: progress.target,
        }
    }
}
