//! Concurrent tests for the crossing protocol.
//!
//! Every blocking call runs on its own thread and is collected through a
//! channel with a timeout, so a deadlock fails the test instead of hanging
//! the test binary.

#![allow(
    clippy::arithmetic_side_effects,
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::missing_panics_doc
)]

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tinsel_tree::audit::{audit, audit_quiescent};
use tinsel_tree::{LevelSpec, Rendezvous, Slot, Tree};
use tinsel_types::{GnomeId, MoveKind, Position};

const HANG_LIMIT: Duration = Duration::from_secs(20);

fn spec(gnome_cap: u32, ornament_cap: u32) -> LevelSpec {
    LevelSpec {
        gnome_cap,
        ornament_cap,
    }
}

/// Run `work` on a fresh thread and fail if it does not finish in time.
fn within<T, F>(limit: Duration, work: F) -> T
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(work());
    });
    rx.recv_timeout(limit).expect("operation did not finish; likely deadlock")
}

fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + HANG_LIMIT;
    while !condition() {
        assert!(Instant::now() < deadline, "condition never became true");
        thread::sleep(Duration::from_millis(1));
    }
}

/// Walk `gnome` from `from` down to the ground.
fn descend_to_ground(tree: &Tree, gnome: GnomeId, mut from: Position) {
    while !from.is_ground() {
        from = tree.move_down(gnome, from).unwrap().to;
    }
}

/// Fill a `[2, 1]` tree: gnome 0 on level 1, gnomes 1 and 2 on level 0.
fn full_two_level_tree() -> Arc<Tree> {
    let tree = Tree::new(3, &[spec(2, 0), spec(1, 0)]).unwrap();
    let top = tree.move_up(GnomeId(0), Position::Ground).unwrap().to;
    tree.move_up(GnomeId(0), top).unwrap();
    tree.move_up(GnomeId(1), Position::Ground).unwrap();
    tree.move_up(GnomeId(2), Position::Ground).unwrap();
    assert_eq!(tree.snapshot().occupancy(), vec![2, 1]);
    Arc::new(tree)
}

// =============================================================================
// Swaps
// =============================================================================

#[test]
fn full_levels_exchange_through_swap() {
    let tree = full_two_level_tree();
    let (descender, climber) = (GnomeId(0), GnomeId(1));

    let (tx, rx) = mpsc::channel();
    {
        let tree = Arc::clone(&tree);
        thread::spawn(move || {
            let _ = tx.send(tree.move_down(descender, Position::Level(1)));
        });
    }

    wait_until(|| tree.rendezvous(1).unwrap().down == Slot::Waiting(descender));
    // The descender is blocked: level 0 is still full.
    assert_eq!(tree.snapshot().occupancy(), vec![2, 1]);

    let up = {
        let tree = Arc::clone(&tree);
        within(HANG_LIMIT, move || tree.move_up(climber, Position::Level(0)))
    }
    .unwrap();
    assert_eq!(up.kind, MoveKind::Swap { partner: descender });
    assert_eq!(up.to, Position::Level(1));

    let down = rx.recv_timeout(HANG_LIMIT).unwrap().unwrap();
    assert_eq!(down.kind, MoveKind::Swap { partner: climber });
    assert_eq!(down.to, Position::Level(0));

    assert_eq!(tree.snapshot().occupancy(), vec![2, 1]);
    assert_eq!(tree.rendezvous(1).unwrap(), Rendezvous::default());
}

#[test]
fn descender_completes_swap_with_waiting_climber() {
    let tree = full_two_level_tree();
    let (descender, climber) = (GnomeId(0), GnomeId(1));

    let (tx, rx) = mpsc::channel();
    {
        let tree = Arc::clone(&tree);
        thread::spawn(move || {
            let _ = tx.send(tree.move_up(climber, Position::Level(0)));
        });
    }

    wait_until(|| tree.rendezvous(1).unwrap().up == Slot::Waiting(climber));
    // The climber is blocked: level 1 is still full.
    assert_eq!(tree.snapshot().occupancy(), vec![2, 1]);

    let down = {
        let tree = Arc::clone(&tree);
        within(HANG_LIMIT, move || {
            tree.move_down(descender, Position::Level(1))
        })
    }
    .unwrap();
    assert_eq!(down.kind, MoveKind::Swap { partner: climber });
    assert_eq!(down.to, Position::Level(0));

    let up = rx.recv_timeout(HANG_LIMIT).unwrap().unwrap();
    assert_eq!(up.kind, MoveKind::Swap { partner: descender });
    assert_eq!(up.to, Position::Level(1));

    assert_eq!(tree.snapshot().occupancy(), vec![2, 1]);
    assert_eq!(tree.rendezvous(1).unwrap(), Rendezvous::default());
}

#[test]
fn simultaneous_crossings_on_full_levels_drain() {
    let tree = full_two_level_tree();
    let start = Arc::new(Barrier::new(3));

    let handles: Vec<_> = [
        (GnomeId(0), Position::Level(1), false),
        (GnomeId(1), Position::Level(0), true),
        (GnomeId(2), Position::Level(0), true),
    ]
    .into_iter()
    .map(|(gnome, from, climb)| {
        let tree = Arc::clone(&tree);
        let start = Arc::clone(&start);
        move || {
            start.wait();
            let reached = if climb {
                tree.move_up(gnome, from).unwrap().to
            } else {
                tree.move_down(gnome, from).unwrap().to
            };
            descend_to_ground(&tree, gnome, reached);
        }
    })
    .collect();

    within(HANG_LIMIT, move || {
        let threads: Vec<_> = handles.into_iter().map(thread::spawn).collect();
        for thread in threads {
            thread.join().unwrap();
        }
    });

    let snapshot = tree.snapshot();
    assert_eq!(snapshot.occupancy(), vec![0, 0]);
    assert!(audit_quiescent(&snapshot).is_sound());
}

#[test]
fn single_level_entrance_admits_one_at_a_time() {
    let tree = Arc::new(Tree::new(6, &[spec(1, 0)]).unwrap());
    let inside = Arc::new(AtomicU32::new(0));

    let workers: Vec<_> = (0..6)
        .map(|id| {
            let tree = Arc::clone(&tree);
            let inside = Arc::clone(&inside);
            move || {
                for _ in 0..50 {
                    let on_level = tree.move_up(GnomeId(id), Position::Ground).unwrap();
                    assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                    assert!(tree.level(0).unwrap().gnomes() <= 1);
                    inside.fetch_sub(1, Ordering::SeqCst);
                    tree.move_down(GnomeId(id), on_level.to).unwrap();
                }
            }
        })
        .collect();

    within(HANG_LIMIT, move || {
        let threads: Vec<_> = workers.into_iter().map(thread::spawn).collect();
        for thread in threads {
            thread.join().unwrap();
        }
    });

    assert_eq!(tree.snapshot().occupancy(), vec![0]);
}

// =============================================================================
// Random stacks
// =============================================================================

fn random_specs(rng: &mut StdRng) -> Vec<LevelSpec> {
    let levels = rng.random_range(1..=4_usize);
    let mut cap = rng.random_range(1..=2_u32);
    let mut specs = Vec::with_capacity(levels);
    for _ in 0..levels {
        specs.push(spec(cap, rng.random_range(0..=3)));
        cap += rng.random_range(1..=2);
    }
    specs.reverse();
    specs
}

#[test]
fn random_walks_never_break_capacity() {
    for seed in 0..12_u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let specs = random_specs(&mut rng);
        let gnomes = rng.random_range(1..=8_u32);
        let tree = Arc::new(Tree::new(gnomes, &specs).unwrap());
        let finished = Arc::new(AtomicU32::new(0));

        let walkers: Vec<_> = (0..gnomes)
            .map(|id| {
                let tree = Arc::clone(&tree);
                let finished = Arc::clone(&finished);
                move || {
                    let gnome = GnomeId(id);
                    let mut rng = StdRng::seed_from_u64(seed * 100 + u64::from(id));
                    let mut at = Position::Ground;
                    for _ in 0..150 {
                        let step = if at.is_ground() || rng.random_bool(0.5) {
                            tree.move_up(gnome, at).unwrap()
                        } else {
                            tree.move_down(gnome, at).unwrap()
                        };
                        assert_eq!(step.from, at);
                        at = step.to;
                    }
                    descend_to_ground(&tree, gnome, at);
                    finished.fetch_add(1, Ordering::SeqCst);
                }
            })
            .collect();

        let observed = Arc::clone(&tree);
        within(HANG_LIMIT, move || {
            let threads: Vec<_> = walkers.into_iter().map(thread::spawn).collect();
            while finished.load(Ordering::SeqCst) < gnomes {
                let snapshot = observed.snapshot();
                assert!(audit(&snapshot).is_sound(), "seed {seed}: {snapshot:?}");
                thread::yield_now();
            }
            for thread in threads {
                thread.join().unwrap();
            }
        });

        let snapshot = tree.snapshot();
        assert!(snapshot.occupancy().iter().all(|&gnomes| gnomes == 0));
        assert!(audit_quiescent(&snapshot).is_sound(), "seed {seed}");
    }
}

// =============================================================================
// Ornaments
// =============================================================================

#[test]
fn concurrent_claims_never_overbook() {
    let tree = Arc::new(Tree::new(1, &[spec(1, 5)]).unwrap());

    let claimers: Vec<_> = (0..16)
        .map(|_| {
            let tree = Arc::clone(&tree);
            thread::spawn(move || {
                let claim = tree.try_claim_work(0).unwrap()?;
                let ornament = claim.ornament();
                tree.complete_work(claim).unwrap();
                Some(ornament)
            })
        })
        .collect();

    let hung: BTreeSet<u32> = claimers
        .into_iter()
        .filter_map(|claimer| claimer.join().unwrap())
        .collect();

    assert_eq!(hung, (0..5).collect());
    assert!(tree.is_complete());
    assert!(audit_quiescent(&tree.snapshot()).is_sound());
}
