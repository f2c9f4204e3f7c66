//! Tree-wide count of hung ornaments.
//!
//! The target is the sum of every level's ornament capacity and is fixed at
//! construction. The counter has its own lock, separate from every level, so
//! gnomes on the ground can poll it without touching the tree.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::TreeError;

/// Completed and target ornament counts at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Ornaments hung so far.
    pub completed: u64,
    /// Total ornament capacity of the tree.
    pub target: u64,
}

impl Progress {
    /// Whether every ornament the tree can hold has been hung.
    pub const fn is_complete(&self) -> bool {
        self.completed >= self.target
    }
}

/// Monotonic counter of hung ornaments.
#[derive(Debug)]
pub(crate) struct Completion {
    completed: Mutex<u64>,
    target: u64,
}

impl Completion {
    pub(crate) fn new(target: u64) -> Self {
        Self {
            completed: Mutex::new(0),
            target,
        }
    }

    pub(crate) const fn target(&self) -> u64 {
        self.target
    }

    pub(crate) fn progress(&self) -> Progress {
        Progress {
            completed: *self.completed.lock(),
            target: self.target,
        }
    }

    /// Count one more hung ornament.
    pub(crate) fn record(&self) -> Result<Progress, TreeError> {
        let mut completed = self.completed.lock();
        let next = completed
            .checked_add(1)
            .ok_or(TreeError::ArithmeticOverflow)?;
        if next > self.target {
            return Err(TreeError::CompletionOverflow {
                target: self.target,
            });
        }
        *completed = next;
        Ok(Progress {
            completed: next,
            target: self.target,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn counts_up_to_target() {
        let completion = Completion::new(2);
        assert!(!completion.progress().is_complete());
        assert_eq!(completion.record().unwrap().completed, 1);
        let progress = completion.record().unwrap();
        assert_eq!(progress, Progress { completed: 2, target: 2 });
        assert!(progress.is_complete());
    }

    #[test]
    fn refuses_to_pass_target() {
        let completion = Completion::new(1);
        completion.record().unwrap();
        assert_eq!(
            completion.record(),
            Err(TreeError::CompletionOverflow { target: 1 })
        );
        assert_eq!(completion.progress().completed, 1);
    }

    #[test]
    fn zero_target_is_complete_from_the_start() {
        let completion = Completion::new(0);
        assert!(completion.progress().is_complete());
        assert_eq!(completion.target(), 0);
    }
}
