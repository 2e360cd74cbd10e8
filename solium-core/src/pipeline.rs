//! The reconciliation pipeline that turns an economy result into the next day.
//!
//! Order matters and is fixed: commit the economy output and open the ledger,
//! reconcile the army against the new population, age timed effects, advance
//! unrest, process vassals, run the investment sweep, then audit the ledger
//! and finally advance the day counter. The day only increments at the very
//! end, so a failed or skipped tick leaves the state untouched.

use crate::army::{advance_training, reconcile_army, record_combat_losses, UnitTypeRegistry};
use crate::config::SimConfig;
use crate::economy::{EconomyStep, TickResult};
use crate::effects::{collect_overrides, decay_effects};
use crate::events::SimEvent;
use crate::investment::run_investment_tick;
use crate::ledger::{AuditOutcome, ExpectedFlows, LedgerReason, TickLedger};
use crate::state::WorldState;
use crate::unrest::run_unrest_tick;
use crate::vassals::run_vassal_tick;
use tracing::instrument;

/// Everything a caller may want to know about one completed tick.
#[derive(Debug)]
pub struct TickReport {
    pub day: u64,
    pub events: Vec<SimEvent>,
    pub audit: AuditOutcome,
    pub log: Vec<String>,
    pub checksum: u64,
}

/// Run one full day synchronously: economy step plus reconciliation.
#[instrument(skip_all, fields(day = state.day))]
pub fn run_tick(
    state: &mut WorldState,
    economy: &dyn EconomyStep,
    registry: &UnitTypeRegistry,
    config: &SimConfig,
) -> TickReport {
    let overrides = collect_overrides(&state.effects);
    let result = economy.run(state, &overrides);
    apply_result(state, result, registry, config)
}

/// Apply an already-computed economy result and run all reconcilers.
///
/// Split out from [`run_tick`] so the execution bridge can compute the
/// economy step elsewhere and commit its result here.
#[instrument(skip_all, fields(day = state.day))]
pub fn apply_result(
    state: &mut WorldState,
    result: TickResult,
    registry: &UnitTypeRegistry,
    config: &SimConfig,
) -> TickReport {
    let day = state.day;
    let mut events: Vec<SimEvent> = Vec::new();
    let mut ledger = TickLedger::new();
    let treasury_before = state.treasury;

    // Commit the economy output and record its treasury flows.
    state.resources = result.resources;
    state.market = result.market;
    state.stability = result.stability;
    for (stratum, population) in &result.stratum_population {
        if let Some(s) = state.strata.get_mut(stratum) {
            s.population = *population;
        }
    }
    for (stratum, wealth) in &result.stratum_wealth {
        if let Some(s) = state.strata.get_mut(stratum) {
            s.wealth = *wealth;
        }
    }
    for (stratum, approval) in &result.stratum_approval {
        if let Some(s) = state.strata.get_mut(stratum) {
            s.approval = *approval;
        }
    }
    for (stratum, needs) in &result.stratum_needs {
        if let Some(s) = state.strata.get_mut(stratum) {
            s.needs_satisfaction = *needs;
        }
    }

    state.treasury += result.tax_collected + result.tariff_collected - result.upkeep_paid;
    ledger.record(result.tax_collected, LedgerReason::Taxation, "economy");
    ledger.record(result.tariff_collected, LedgerReason::Tariffs, "economy");
    ledger.record(-result.upkeep_paid, LedgerReason::MilitaryUpkeep, "economy");

    // Army reconciliation against the post-economy population.
    record_combat_losses(state, &result.combat_losses, registry, &mut events);
    advance_training(state, registry, config, &mut events);
    reconcile_army(state, registry, config, &mut events);

    // Timed effects age after they have been consumed by the economy step.
    decay_effects(&mut state.effects);

    run_unrest_tick(state, config, &mut events);
    run_vassal_tick(state, config, &mut ledger, &mut events);
    run_investment_tick(state, config, &mut ledger, &mut events);

    let expected = ExpectedFlows {
        taxation: result.tax_collected,
        military_upkeep: result.upkeep_paid,
    };
    let audit = ledger.reconcile(
        treasury_before,
        state.treasury,
        expected,
        config,
        day,
        &mut events,
    );

    state.day += 1;

    TickReport {
        day,
        events,
        audit,
        log: result.log,
        checksum: state.checksum(),
    }
}
