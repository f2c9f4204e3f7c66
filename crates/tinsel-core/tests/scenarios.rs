//! End-to-end workshop runs.
//!
//! Each run is wrapped in a timeout so a stuck gnome fails the test
//! instead of hanging it.

#![allow(
    clippy::arithmetic_side_effects,
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::missing_panics_doc
)]

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tinsel_core::config::{DeliveryConfig, GnomesConfig, RunConfig, TreeConfig};
use tinsel_core::{
    EndReason, RecordingSink, RunSummary, StopReason, WorkshopConfig, run_workshop,
};
use tinsel_tree::{AuditResult, LevelSpec};
use tinsel_types::{GnomeId, MoveKind, Position, Transition, TreeEvent};

const RUN_LIMIT: Duration = Duration::from_secs(60);

fn workshop(
    gnomes: u32,
    installation_time_us: u64,
    levels: &[(u32, u32)],
    interval_us: u64,
) -> WorkshopConfig {
    WorkshopConfig {
        gnomes: GnomesConfig {
            count: gnomes,
            installation_time_us,
        },
        delivery: DeliveryConfig {
            ornaments_per_delivery: 1,
            interval_us,
        },
        tree: TreeConfig {
            levels: levels
                .iter()
                .map(|&(gnome_cap, ornament_cap)| LevelSpec {
                    gnome_cap,
                    ornament_cap,
                })
                .collect(),
        },
        ..WorkshopConfig::default()
    }
}

async fn run(config: &WorkshopConfig, sink: &Arc<RecordingSink>) -> RunSummary {
    tokio::time::timeout(RUN_LIMIT, run_workshop(config, sink.clone()))
        .await
        .expect("workshop did not finish; likely deadlock")
        .unwrap()
}

fn moved(gnome: GnomeId, from: Position, to: Position) -> TreeEvent {
    TreeEvent::Moved(Transition {
        gnome,
        from,
        to,
        kind: MoveKind::Plain,
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn single_gnome_hangs_both_ornaments_in_order() {
    let config = workshop(1, 1_000, &[(1, 2)], 2_000);
    let sink = Arc::new(RecordingSink::new());

    let summary = run(&config, &sink).await;

    assert_eq!(summary.end_reason, EndReason::Completed);
    assert_eq!(summary.tree.completed, 2);
    assert_eq!(summary.tree.target, 2);
    assert_eq!(summary.discarded(), 0);
    assert_eq!(summary.audit, AuditResult::Sound);

    let gnome = GnomeId(0);
    let ground = Position::Ground;
    let level = Position::Level(0);
    let trace: Vec<TreeEvent> = sink
        .for_gnome(gnome)
        .into_iter()
        .filter(|event| !matches!(event, TreeEvent::WaitingForOrnament { .. }))
        .collect();

    let expected = vec![
        TreeEvent::GnomeSpawned { gnome },
        TreeEvent::OrnamentPickedUp {
            gnome,
            ticket: tinsel_types::OrnamentTicket { serial: 0 },
        },
        moved(gnome, ground, level),
        TreeEvent::HangingStarted {
            gnome,
            level: 0,
            ornament: 0,
        },
        TreeEvent::HangingFinished {
            gnome,
            level: 0,
            ornament: 0,
            completed: 1,
            target: 2,
        },
        moved(gnome, level, ground),
        TreeEvent::OrnamentPickedUp {
            gnome,
            ticket: tinsel_types::OrnamentTicket { serial: 1 },
        },
        moved(gnome, ground, level),
        TreeEvent::HangingStarted {
            gnome,
            level: 0,
            ornament: 1,
        },
        TreeEvent::HangingFinished {
            gnome,
            level: 0,
            ornament: 1,
            completed: 2,
            target: 2,
        },
        moved(gnome, level, ground),
        TreeEvent::GnomeRested { gnome },
    ];
    assert_eq!(trace, expected);

    let report = summary.gnomes[0];
    assert_eq!(report.hung, 2);
    assert_eq!(report.picked_up, 2);
    assert_eq!(report.moves, 4);
    assert_eq!(report.stopped, Some(StopReason::Rested));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn empty_tree_rests_without_picking_up() {
    let config = workshop(1, 0, &[(1, 0)], 1_000);
    let sink = Arc::new(RecordingSink::new());

    let summary = run(&config, &sink).await;

    assert_eq!(summary.end_reason, EndReason::Completed);
    assert_eq!(summary.tree.target, 0);
    assert_eq!(summary.gnomes[0].picked_up, 0);
    assert_eq!(summary.gnomes[0].discarded, 0);
    assert_eq!(
        sink.for_gnome(GnomeId(0)),
        vec![
            TreeEvent::GnomeSpawned { gnome: GnomeId(0) },
            TreeEvent::GnomeRested { gnome: GnomeId(0) },
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn crowded_tree_completes_and_balances() {
    let config = workshop(6, 200, &[(3, 2), (2, 2), (1, 1)], 300);
    let sink = Arc::new(RecordingSink::new());

    let summary = run(&config, &sink).await;

    assert_eq!(summary.end_reason, EndReason::Completed);
    assert_eq!(summary.tree.completed, 5);
    assert_eq!(summary.hung(), 5);
    assert_eq!(summary.audit, AuditResult::Sound);
    assert_eq!(summary.gnomes.len(), 6);
    assert!(
        summary
            .gnomes
            .iter()
            .all(|report| report.stopped == Some(StopReason::Rested))
    );

    let picked: u64 = summary.gnomes.iter().map(|r| u64::from(r.picked_up)).sum();
    assert_eq!(picked, summary.delivery.claimed);
    assert_eq!(picked, summary.hung() + summary.discarded());
    assert!(summary.delivery.released >= summary.delivery.claimed);

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["end_reason"], "completed");
    assert_eq!(json["audit"]["result"], "sound");
    assert_eq!(json["tree"]["completed"], 5);
    assert_eq!(json["gnomes"].as_array().map(Vec::len), Some(6));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn deadline_closes_delivery_and_gnomes_stop() {
    let mut config = workshop(2, 0, &[(2, 5)], 600_000_000);
    config.run = RunConfig {
        max_real_time_seconds: 1,
    };
    let sink = Arc::new(RecordingSink::new());

    let summary = run(&config, &sink).await;

    assert_eq!(summary.end_reason, EndReason::DeliveryClosed);
    assert_eq!(summary.tree.completed, 1);
    assert_eq!(summary.audit, AuditResult::Sound);
    assert!(
        summary
            .gnomes
            .iter()
            .all(|report| report.stopped == Some(StopReason::DeliveryClosed))
    );
    assert!(
        sink.events()
            .iter()
            .any(|event| matches!(event, TreeEvent::DeliveryClosed { .. }))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn every_gnome_works_at_once_beyond_blocking_pool_size() {
    // More gnomes than tokio's default blocking pool (512 threads).
    const GNOMES: u32 = 600;
    let mut config = workshop(GNOMES, 200_000, &[(GNOMES, GNOMES * 2)], 1_000);
    config.delivery.ornaments_per_delivery = GNOMES;
    let sink = Arc::new(RecordingSink::new());

    let summary = run(&config, &sink).await;

    assert_eq!(summary.end_reason, EndReason::Completed);
    assert_eq!(summary.gnomes.len(), usize::try_from(GNOMES).unwrap());

    let mut live = 0_u32;
    let mut peak = 0_u32;
    let mut rested_before_all_spawned = false;
    let mut spawned = 0_u32;
    for event in sink.events() {
        match event {
            TreeEvent::GnomeSpawned { .. } => {
                live += 1;
                spawned += 1;
                peak = peak.max(live);
            }
            TreeEvent::GnomeRested { .. } => {
                live -= 1;
                rested_before_all_spawned |= spawned < GNOMES;
            }
            _ => {}
        }
    }
    assert_eq!(peak, GNOMES);
    assert!(!rested_before_all_spawned);
    assert!(summary.gnomes.iter().all(|report| report.picked_up > 0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn random_stacks_finish() {
    for seed in 0..6_u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let n_levels = rng.random_range(1..=4_usize);
        let mut cap = rng.random_range(1..=2_u32);
        let mut levels = Vec::with_capacity(n_levels);
        for _ in 0..n_levels {
            levels.push((cap, rng.random_range(0..=3_u32)));
            cap += rng.random_range(1..=2);
        }
        levels.reverse();

        let gnomes = rng.random_range(1..=8_u32);
        let config = workshop(gnomes, rng.random_range(0..=300), &levels, 200);
        let sink = Arc::new(RecordingSink::new());

        let summary = run(&config, &sink).await;

        assert_eq!(summary.end_reason, EndReason::Completed, "seed {seed}");
        assert_eq!(summary.tree.completed, config.target(), "seed {seed}");
        assert_eq!(summary.audit, AuditResult::Sound, "seed {seed}");
        assert!(
            summary.tree.occupancy().iter().all(|&gnomes| gnomes == 0),
            "seed {seed}"
        );
    }
}
