//! Deterministic tick orchestration for a persistent society simulation.
//!
//! The crate owns everything that happens *around* the economic step of a
//! simulated day:
//!
//! - [`pipeline`]: the fixed-order reconciliation pipeline that commits an
//!   economy result, runs every reconciler and only then advances the day.
//! - [`economy`]: the [`economy::EconomyStep`] trait the orchestrator calls
//!   through, plus a deterministic baseline implementation.
//! - [`effects`]: timed transient modifiers with exponential decay.
//! - [`army`]: the training queue and the army-population reconciler.
//! - [`ledger`]: the per-tick financial audit ledger.
//! - [`unrest`]: stratum organization, uprisings and rebel factions.
//! - [`vassals`]: tribute and independence pressure.
//! - [`investment`]: the batched foreign investment sweep.
//!
//! State lives in [`state::WorldState`] and is mutated only between ticks; the
//! economy step sees an immutable snapshot. All collections iterate in a
//! stable order and [`state::WorldState::checksum`] hashes float bit patterns,
//! so identical seeds replay to identical checksums.

pub mod army;
pub mod config;
pub mod economy;
pub mod effects;
pub mod events;
pub mod investment;
pub mod ledger;
pub mod metrics;
pub mod pipeline;
pub mod state;
pub mod testing;
pub mod unrest;
pub mod vassals;

pub use army::{UnitTypeId, UnitTypeRegistry};
pub use config::{ConfigError, SimConfig};
pub use economy::{BaselineEconomy, EconomyStep, TickResult};
pub use events::SimEvent;
pub use pipeline::{apply_result, run_tick, TickReport};
pub use state::{Stratum, WorldState};
