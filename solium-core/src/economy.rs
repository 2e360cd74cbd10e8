//! The core economic step contract.
//!
//! The orchestrator treats the economic step as an opaque collaborator: it
//! hands over a state snapshot plus the accumulated modifier overrides and
//! gets back a [`TickResult`] with named fields. Nothing beyond those fields
//! may be assumed.
//!
//! [`BaselineEconomy`] is a small deterministic reference implementation so
//! the driver binary and tests have a collaborator to run against.

use crate::army::{CombatLoss, UnitTypeId, UnitTypeRegistry};
use crate::effects::{EffectCategory, EffectTarget, ModifierOverrides};
use crate::state::{MarketState, ResourceId, Stratum, WorldState};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Optional diagnostic breakdown of where the money went.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EconomyBreakdown {
    pub tax_by_stratum: BTreeMap<Stratum, f64>,
    pub upkeep_by_unit: BTreeMap<UnitTypeId, f64>,
    pub production_value: f64,
}

/// Output of one economic step.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TickResult {
    pub resources: BTreeMap<ResourceId, f64>,
    pub market: MarketState,
    pub stratum_population: BTreeMap<Stratum, f64>,
    pub stratum_wealth: BTreeMap<Stratum, f64>,
    pub stratum_approval: BTreeMap<Stratum, f64>,
    pub stratum_needs: BTreeMap<Stratum, f64>,
    pub stability: f64,
    pub tax_collected: f64,
    pub tariff_collected: f64,
    pub upkeep_paid: f64,
    pub combat_losses: Vec<CombatLoss>,
    /// Raw log lines for the presentation layer.
    pub log: Vec<String>,
    pub breakdown: Option<EconomyBreakdown>,
}

/// The opaque core economic step.
///
/// Implementations must be pure with respect to the snapshot: all mutation
/// happens when the orchestrator applies the result.
pub trait EconomyStep: Send + Sync {
    fn run(&self, state: &WorldState, overrides: &ModifierOverrides) -> TickResult;
}

/// What each stratum produces per person per day.
const PRODUCTION: &[(Stratum, ResourceId, f64)] = &[
    (Stratum::Peasants, ResourceId::GRAIN, 0.010),
    (Stratum::Laborers, ResourceId::TIMBER, 0.004),
    (Stratum::Laborers, ResourceId::IRON, 0.002),
    (Stratum::Burghers, ResourceId::CLOTH, 0.003),
    (Stratum::Nobility, ResourceId::WINE, 0.001),
];

/// Grain needed per person per day.
const GRAIN_DEMAND_PER_CAPITA: f64 = 0.008;

/// Daily tax as a fraction of stratum wealth.
const DAILY_TAX_RATE: f64 = 0.0005;

/// Deterministic reference economy.
#[derive(Debug, Clone)]
pub struct BaselineEconomy {
    registry: UnitTypeRegistry,
}

impl BaselineEconomy {
    pub fn new(registry: UnitTypeRegistry) -> Self {
        Self { registry }
    }
}

impl EconomyStep for BaselineEconomy {
    fn run(&self, state: &WorldState, overrides: &ModifierOverrides) -> TickResult {
        // Per-day rng derived from the stored seed, so replays match.
        let mut rng = StdRng::seed_from_u64(
            state.rng_seed ^ state.day.wrapping_mul(0x9E37_79B9_7F4A_7C15),
        );

        let mut result = TickResult::default();
        let mut breakdown = EconomyBreakdown::default();

        // Production bonus from building effects, applied realm-wide here;
        // a richer economy would key it per building.
        let production_bonus: f64 = overrides
            .iter()
            .filter(|((category, _), _)| *category == EffectCategory::BuildingProduction)
            .map(|(_, v)| *v)
            .sum();
        let production_factor = (1.0 + production_bonus).max(0.0);

        // Supply from stratum labor.
        let mut supply: BTreeMap<ResourceId, f64> = BTreeMap::new();
        for &(stratum, resource, per_capita) in PRODUCTION {
            if let Some(s) = state.strata.get(&stratum) {
                *supply.entry(resource).or_insert(0.0) +=
                    s.population * per_capita * production_factor;
            }
        }

        // Demand: grain for everyone, plus demand-side effects.
        let mut demand: BTreeMap<ResourceId, f64> = BTreeMap::new();
        demand.insert(
            ResourceId::GRAIN,
            state.total_population() * GRAIN_DEMAND_PER_CAPITA,
        );
        for ((category, target), value) in overrides.iter() {
            if *category == EffectCategory::ResourceDemand {
                if let EffectTarget::Resource(resource) = target {
                    *demand.entry(*resource).or_insert(0.0) += value.max(0.0);
                }
            }
        }

        // Market: prices drift with the demand/supply imbalance, with a small
        // deterministic jitter.
        let mut market = state.market.clone();
        for (&resource, &s) in &supply {
            let d = demand.get(&resource).copied().unwrap_or(0.0);
            let price = market.prices.entry(resource).or_insert(1.0);
            let imbalance = (d - s) / s.max(1.0);
            let jitter = 1.0 + rng.gen_range(-0.01..0.01);
            *price = (*price * (1.0 + 0.05 * imbalance) * jitter).max(0.1);
            market.supply.insert(resource, s);
            market.demand.insert(resource, d);
        }
        market.push_history();
        result.market = market;

        // Stockpiles absorb surplus and cover shortfall.
        let mut resources = state.resources.clone();
        for (&resource, &s) in &supply {
            let d = demand.get(&resource).copied().unwrap_or(0.0);
            let stock = resources.entry(resource).or_insert(0.0);
            *stock = (*stock + s - d).max(0.0);
        }
        result.resources = resources;

        // Needs, approval, wealth and taxes per stratum.
        let grain_supply = supply.get(&ResourceId::GRAIN).copied().unwrap_or(0.0);
        let grain_demand = demand.get(&ResourceId::GRAIN).copied().unwrap_or(0.0);
        let base_needs = if grain_demand > 0.0 {
            (grain_supply / grain_demand).clamp(0.0, 1.0)
        } else {
            1.0
        };

        for (&stratum, s) in &state.strata {
            let stratum_demand_shift = overrides
                .get(EffectCategory::StratumDemand, EffectTarget::Stratum(stratum));
            let needs = (base_needs - stratum_demand_shift * 0.01).clamp(0.0, 1.0);
            result.stratum_needs.insert(stratum, needs);

            // Approval drifts toward a target shifted by approval effects.
            let approval_shift = overrides
                .get(EffectCategory::Approval, EffectTarget::Stratum(stratum))
                + overrides.get(EffectCategory::Approval, EffectTarget::Realm);
            let target = (50.0 + approval_shift).clamp(0.0, 100.0);
            let approval = s.approval + (target - s.approval) * 0.02;
            result.stratum_approval.insert(stratum, approval);

            // Slow population growth scaled by how well needs are met.
            let growth = s.population * 0.00005 * (needs - 0.5) * 2.0;
            result
                .stratum_population
                .insert(stratum, (s.population + growth).max(0.0));

            let tax = s.wealth * DAILY_TAX_RATE;
            let earnings = s.population * 0.0002 * needs;
            result
                .stratum_wealth
                .insert(stratum, (s.wealth + earnings - tax).max(0.0));
            result.tax_collected += tax;
            breakdown.tax_by_stratum.insert(stratum, tax);
            breakdown.production_value += earnings;
        }

        // Military upkeep from the standing army.
        for (&unit, &count) in &state.army {
            if let Some(def) = self.registry.get(unit) {
                let upkeep = def.upkeep * count as f64;
                result.upkeep_paid += upkeep;
                breakdown.upkeep_by_unit.insert(unit, upkeep);
            }
        }

        // Stability drifts toward a target shifted by stability effects.
        let stability_shift =
            overrides.get(EffectCategory::Stability, EffectTarget::Realm);
        let stability_target = (50.0 + stability_shift).clamp(0.0, 100.0);
        result.stability = state.stability + (stability_target - state.stability) * 0.01;

        result.log.push(format!(
            "day {}: tax {:.2}, upkeep {:.2}, grain balance {:+.1}",
            state.day,
            result.tax_collected,
            result.upkeep_paid,
            grain_supply - grain_demand
        ));
        result.breakdown = Some(breakdown);
        result
    }
}
