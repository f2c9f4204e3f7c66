//! Ornament delivery, gnome workers, and run orchestration for the Tinsel
//! simulation.
//!
//! This crate drives a [`tinsel_tree::Tree`]: it loads the workshop
//! configuration, feeds ornaments through a [`DeliveryQueue`], runs one
//! [`Gnome`] state machine per worker, and collects everything into a
//! [`RunSummary`] once every gnome has stopped.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from YAML or positional arguments
//!   into strongly-typed structs.
//! - [`delivery`] -- The producer/consumer ornament counter.
//! - [`gnome`] -- The per-gnome state machine.
//! - [`sink`] -- [`EventSink`] trait and the trace stream implementations.
//! - [`runner`] -- [`run_workshop`], the producer task, and the end-of-run
//!   summary.

pub mod config;
pub mod delivery;
pub mod gnome;
pub mod runner;
pub mod sink;

pub use config::{ConfigError, WorkshopConfig};
pub use delivery::{DeliveryError, DeliveryQueue, DeliveryTotals};
pub use gnome::{Gnome, GnomeError, GnomeReport, StopReason};
pub use runner::{EndReason, RunSummary, RunnerError, log_summary, run_workshop};
pub use sink::{EventSink, NullSink, RecordingSink, TracingSink};
