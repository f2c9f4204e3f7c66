//! Workshop run orchestration.
//!
//! [`run_workshop`] is the top-level async entry point. It builds the tree
//! and the delivery queue from a validated [`WorkshopConfig`], then:
//!
//! - spawns one named OS thread per gnome, so every gnome works at once no
//!   matter how many there are,
//! - runs the delivery producer on a tokio interval (first release is
//!   immediate),
//! - optionally closes the delivery once `run.max_real_time_seconds` has
//!   passed, so gnomes stop the next time they reach the ground,
//! - collects each gnome's outcome as it arrives; the first failure closes
//!   the delivery so the remaining gnomes wind down,
//! - stops the producer and audits the final tree.
//!
//! The result is a [`RunSummary`]; [`log_summary`] writes it out.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tinsel_tree::audit::audit_quiescent;
use tinsel_tree::{AuditResult, Tree, TreeError, TreeSnapshot};
use tinsel_types::{GnomeId, RunId, TreeEvent};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigError, WorkshopConfig};
use crate::delivery::{DeliveryError, DeliveryQueue, DeliveryTotals};
use crate::gnome::{Gnome, GnomeError, GnomeReport};
use crate::sink::EventSink;

/// Errors that can occur during a workshop run.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// The configuration is invalid.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// The tree could not be built.
    #[error("tree error: {source}")]
    Tree {
        /// The underlying tree error.
        #[from]
        source: TreeError,
    },

    /// A gnome stopped on an error.
    #[error("gnome error: {source}")]
    Gnome {
        /// The underlying gnome error.
        #[from]
        source: GnomeError,
    },

    /// A gnome's thread could not be started.
    #[error("failed to start {gnome} thread: {source}")]
    Spawn {
        /// The gnome that never started.
        gnome: GnomeId,
        /// The underlying OS error.
        source: std::io::Error,
    },

    /// A gnome's thread unwound before reporting.
    #[error("{gnome} worker did not finish: {message}")]
    Join {
        /// The gnome whose worker failed.
        gnome: GnomeId,
        /// Description of the failure.
        message: String,
    },
}

/// What a gnome thread hands back when it stops.
type GnomeOutcome = (GnomeId, Result<GnomeReport, RunnerError>);

/// Reason why the run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// Every ornament the tree can hold was hung.
    Completed,
    /// The delivery was closed before the tree was complete.
    DeliveryClosed,
}

/// Everything a finished run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Identifier of this run.
    pub run_id: RunId,
    /// Wall-clock time the first gnome was spawned.
    pub started_at: DateTime<Utc>,
    /// Wall-clock time the last gnome stopped.
    pub finished_at: DateTime<Utc>,
    /// Why the run ended.
    pub end_reason: EndReason,
    /// One report per gnome, in gnome order.
    pub gnomes: Vec<GnomeReport>,
    /// Final tree counters.
    pub tree: TreeSnapshot,
    /// Final delivery counters.
    pub delivery: DeliveryTotals,
    /// Result of the quiescent audit of the final tree.
    pub audit: AuditResult,
}

impl RunSummary {
    /// Ornaments hung by all gnomes.
    pub fn hung(&self) -> u64 {
        self.gnomes
            .iter()
            .map(|report| u64::from(report.hung))
            .fold(0, u64::saturating_add)
    }

    /// Ornaments dropped by all gnomes.
    pub fn discarded(&self) -> u64 {
        self.gnomes
            .iter()
            .map(|report| u64::from(report.discarded))
            .fold(0, u64::saturating_add)
    }

    /// Crossings completed by swapping, counted once per gnome involved.
    pub fn swaps(&self) -> u64 {
        self.gnomes
            .iter()
            .map(|report| report.swaps)
            .fold(0, u64::saturating_add)
    }

    /// Wall-clock duration of the run.
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at.signed_duration_since(self.started_at)
    }
}

/// Run the workshop until every gnome has stopped.
///
/// # Errors
///
/// Returns [`RunnerError::Config`] before anything starts if the
/// configuration is invalid. Returns the first gnome failure, or
/// [`RunnerError::Spawn`] if a gnome thread cannot start, after every other
/// gnome has stopped; the delivery is closed as soon as a gnome fails so
/// the others wind down.
pub async fn run_workshop(
    config: &WorkshopConfig,
    sink: Arc<dyn EventSink>,
) -> Result<RunSummary, RunnerError> {
    config.validate()?;
    let tree = Arc::new(Tree::new(config.gnomes.count, &config.tree.levels)?);
    let delivery = Arc::new(DeliveryQueue::new());
    log_banner(config, tree.target());

    let run_id = RunId::new();
    let started_at = Utc::now();
    info!(run_id = %run_id, "Workshop starting");

    let producer = tokio::spawn(deliver_ornaments(
        Arc::clone(&delivery),
        Arc::clone(&sink),
        config.delivery.ornaments_per_delivery,
        config.delivery.interval(),
    ));
    let deadline = config.run.max_run_time().map(|limit| {
        tokio::spawn(close_after(limit, Arc::clone(&delivery), Arc::clone(&sink)))
    });

    let installation_time = config.gnomes.installation_time();
    let (outcome_tx, outcomes) = mpsc::unbounded_channel();
    let mut failure: Option<RunnerError> = None;
    for id in 0..tree.gnome_count() {
        let gnome = GnomeId(id);
        let tree = Arc::clone(&tree);
        let worker_delivery = Arc::clone(&delivery);
        let sink = Arc::clone(&sink);
        let spawned = spawn_gnome(
            gnome,
            Arc::clone(&delivery),
            outcome_tx.clone(),
            move || {
                Gnome::new(
                    gnome,
                    &tree,
                    &worker_delivery,
                    sink.as_ref(),
                    installation_time,
                )
                .run()
            },
        );
        if let Err(err) = spawned {
            error!(gnome = %gnome, error = %err, "Gnome did not start, closing delivery");
            delivery.close();
            failure = Some(err);
            break;
        }
    }
    drop(outcome_tx);

    let (reports, collected) = collect_reports(outcomes, &delivery).await;
    let failure = failure.or(collected);

    producer.abort();
    if let Some(deadline) = deadline {
        deadline.abort();
    }
    if let Some(err) = failure {
        return Err(err);
    }

    let snapshot = tree.snapshot();
    let audit = audit_quiescent(&snapshot);
    let end_reason = if tree.is_complete() {
        EndReason::Completed
    } else {
        EndReason::DeliveryClosed
    };

    Ok(RunSummary {
        run_id,
        started_at,
        finished_at: Utc::now(),
        end_reason,
        gnomes: reports,
        tree: snapshot,
        delivery: delivery.totals(),
        audit,
    })
}

/// Run `work` for `gnome` on its own named OS thread.
///
/// The outcome is sent on `outcomes` exactly once, including when `work`
/// unwinds. A failed gnome closes the delivery before reporting.
fn spawn_gnome<F>(
    gnome: GnomeId,
    delivery: Arc<DeliveryQueue>,
    outcomes: mpsc::UnboundedSender<GnomeOutcome>,
    work: F,
) -> Result<(), RunnerError>
where
    F: FnOnce() -> Result<GnomeReport, GnomeError> + Send + 'static,
{
    thread::Builder::new()
        .name(format!("gnome-{}", gnome.into_inner()))
        .spawn(move || {
            let mut farewell = Farewell {
                gnome,
                delivery,
                outcomes,
                sent: false,
            };
            farewell.send(work().map_err(RunnerError::from));
        })
        .map(drop)
        .map_err(|source| RunnerError::Spawn { gnome, source })
}

/// Reports one gnome's outcome, or a join failure if the thread unwinds
/// before it gets to.
struct Farewell {
    gnome: GnomeId,
    delivery: Arc<DeliveryQueue>,
    outcomes: mpsc::UnboundedSender<GnomeOutcome>,
    sent: bool,
}

impl Farewell {
    fn send(&mut self, outcome: Result<GnomeReport, RunnerError>) {
        if outcome.is_err() {
            self.delivery.close();
        }
        self.sent = true;
        if self.outcomes.send((self.gnome, outcome)).is_err() {
            debug!(gnome = %self.gnome, "Runner gone, gnome outcome dropped");
        }
    }
}

impl Drop for Farewell {
    fn drop(&mut self) {
        if !self.sent {
            self.send(Err(RunnerError::Join {
                gnome: self.gnome,
                message: "gnome thread panicked".to_owned(),
            }));
        }
    }
}

/// Receive every gnome's outcome in the order gnomes stop.
///
/// Returns the reports sorted by gnome and the first failure, if any. The
/// delivery is closed as soon as a failure arrives. Ends once every sender
/// is gone.
async fn collect_reports(
    mut outcomes: mpsc::UnboundedReceiver<GnomeOutcome>,
    delivery: &DeliveryQueue,
) -> (Vec<GnomeReport>, Option<RunnerError>) {
    let mut reports = Vec::new();
    let mut failure: Option<RunnerError> = None;
    while let Some((gnome, outcome)) = outcomes.recv().await {
        match outcome {
            Ok(report) => {
                debug!(gnome = %gnome, hung = report.hung, "Gnome finished");
                reports.push(report);
            }
            Err(err) => {
                error!(gnome = %gnome, error = %err, "Gnome failed, closing delivery");
                delivery.close();
                failure.get_or_insert(err);
            }
        }
    }
    reports.sort_by_key(|report| report.gnome);
    (reports, failure)
}

/// Release `batch` ornaments every `period` until the delivery is closed.
///
/// The first release happens immediately. A late tick delays the following
/// ones instead of bursting to catch up.
pub async fn deliver_ornaments(
    delivery: Arc<DeliveryQueue>,
    sink: Arc<dyn EventSink>,
    batch: u32,
    period: Duration,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match delivery.release(batch) {
            Ok(available) => sink.record(&TreeEvent::DeliveryReleased { batch, available }),
            Err(DeliveryError::Closed) => {
                debug!("Delivery closed, producer stopping");
                return;
            }
            Err(err) => {
                warn!(error = %err, "Delivery producer stopping");
                return;
            }
        }
    }
}

/// Close the delivery once `limit` has passed.
async fn close_after(limit: Duration, delivery: Arc<DeliveryQueue>, sink: Arc<dyn EventSink>) {
    tokio::time::sleep(limit).await;
    let available = delivery.close();
    info!(
        max_seconds = limit.as_secs(),
        left_over = available,
        "Real-time limit reached, closing delivery"
    );
    sink.record(&TreeEvent::DeliveryClosed { available });
}

fn log_banner(config: &WorkshopConfig, target: u64) {
    info!(
        n_gnomes = config.gnomes.count,
        ornaments_max = target,
        installation_time_us = config.gnomes.installation_time_us,
        ornaments_per_delivery = config.delivery.ornaments_per_delivery,
        delivery_interval_us = config.delivery.interval_us,
        n_levels = config.tree.levels.len(),
        "Workshop configuration"
    );
    for (index, spec) in config.tree.levels.iter().enumerate() {
        info!(
            level = index,
            gnome_cap = spec.gnome_cap,
            ornament_cap = spec.ornament_cap,
            "Level configuration"
        );
    }
}

/// Log the end-of-run summary.
pub fn log_summary(summary: &RunSummary) {
    info!(
        run_id = %summary.run_id,
        reason = ?summary.end_reason,
        elapsed_ms = summary.elapsed().num_milliseconds(),
        completed = summary.tree.completed,
        target = summary.tree.target,
        hung = summary.hung(),
        discarded = summary.discarded(),
        swaps = summary.swaps(),
        released = summary.delivery.released,
        claimed = summary.delivery.claimed,
        left_over = summary.delivery.available,
        "Workshop ended"
    );
    for report in &summary.gnomes {
        debug!(
            gnome = %report.gnome,
            picked_up = report.picked_up,
            hung = report.hung,
            discarded = report.discarded,
            moves = report.moves,
            swaps = report.swaps,
            stopped = ?report.stopped,
            "Gnome report"
        );
    }
    match &summary.audit {
        AuditResult::Sound => info!("Tree audit passed"),
        AuditResult::Anomaly(anomaly) => error!(
            violations = anomaly.violations.len(),
            "{anomaly}"
        ),
    }
}
