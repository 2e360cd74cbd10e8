//! Unit types, the training queue, and the army–population reconciler.
//!
//! The reconciler keeps standing units and the training queue consistent with
//! the population actually able to serve. Eviction is deterministic: training
//! items with the longest remaining time cancel first, then standing units by
//! highest population cost (oldest era breaks ties). Units evicted for a
//! population shortfall are never re-queued; only combat losses flagged for
//! replenishment are, which is what prevents a recruit/disband oscillation.

use crate::config::SimConfig;
use crate::events::SimEvent;
use crate::state::WorldState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Type-safe unit type identifier.
#[derive(
    Hash, Eq, PartialEq, Clone, Copy, Debug, Default, Serialize, Deserialize, PartialOrd, Ord,
)]
pub struct UnitTypeId(pub u8);

impl UnitTypeId {
    pub const UNKNOWN: UnitTypeId = UnitTypeId(u8::MAX);
}

/// Static unit type definition.
#[derive(Debug, Clone)]
pub struct UnitTypeDef {
    pub id: UnitTypeId,
    pub name: String,
    /// People removed from the labor pool per unit raised.
    pub population_cost: f64,
    /// Daily treasury upkeep per unit.
    pub upkeep: f64,
    /// Technology era the unit belongs to; older eras disband first on ties.
    pub era: u8,
    pub training_days: u32,
}

/// Registry of unit types with name lookup.
#[derive(Debug, Clone, Default)]
pub struct UnitTypeRegistry {
    types: Vec<UnitTypeDef>,
    by_name: HashMap<String, UnitTypeId>,
}

impl UnitTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the standard roster used by the driver and tests.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for (name, population_cost, upkeep, era, training_days) in [
            ("militia", 800.0, 0.10, 0, 15),
            ("pikemen", 1_000.0, 0.15, 1, 30),
            ("crossbowmen", 1_000.0, 0.20, 1, 40),
            ("cavalry", 1_500.0, 0.50, 1, 45),
            ("musketeers", 1_000.0, 0.30, 2, 60),
            ("cannon", 400.0, 0.60, 2, 90),
        ] {
            registry.add(UnitTypeDef {
                id: UnitTypeId::UNKNOWN,
                name: name.to_string(),
                population_cost,
                upkeep,
                era,
                training_days,
            });
        }
        registry
    }

    /// Add a definition, assigning the next sequential id.
    pub fn add(&mut self, mut def: UnitTypeDef) -> UnitTypeId {
        let id = UnitTypeId(self.types.len() as u8);
        def.id = id;
        self.by_name.insert(def.name.clone(), id);
        self.types.push(def);
        id
    }

    pub fn get(&self, id: UnitTypeId) -> Option<&UnitTypeDef> {
        self.types.get(id.0 as usize)
    }

    pub fn id_by_name(&self, name: &str) -> Option<UnitTypeId> {
        self.by_name.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UnitTypeDef> {
        self.types.iter()
    }

    fn population_cost(&self, id: UnitTypeId) -> f64 {
        self.get(id).map(|d| d.population_cost).unwrap_or(0.0)
    }
}

/// Where a queued recruitment order stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingStatus {
    /// Ordered but not yet drawing population.
    Waiting,
    /// Drawing population, counting down to graduation.
    Training,
}

/// One entry of the recruitment queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingItem {
    pub unit: UnitTypeId,
    pub status: TrainingStatus,
    pub total_days: u32,
    pub remaining_days: u32,
    /// Set only on queue entries created to replace combat losses.
    pub auto_replenish: bool,
}

impl TrainingItem {
    pub fn waiting(unit: UnitTypeId, training_days: u32) -> Self {
        Self {
            unit,
            status: TrainingStatus::Waiting,
            total_days: training_days,
            remaining_days: training_days,
            auto_replenish: false,
        }
    }
}

/// A standing unit destroyed in combat this tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatLoss {
    pub unit: UnitTypeId,
    pub count: u32,
    /// Whether replacements should be queued automatically.
    pub replenish: bool,
}

/// Population nominally eligible to serve.
pub fn eligible_population(state: &WorldState, config: &SimConfig) -> f64 {
    state
        .strata
        .iter()
        .filter(|(stratum, _)| stratum.serves())
        .map(|(_, s)| s.population)
        .sum::<f64>()
        * config.service_fraction
}

/// Population held by items currently training (waiting items hold none).
pub fn training_population(state: &WorldState, registry: &UnitTypeRegistry) -> f64 {
    state
        .training_queue
        .iter()
        .filter(|item| item.status == TrainingStatus::Training)
        .map(|item| registry.population_cost(item.unit))
        .sum()
}

/// Population bound up in the standing army.
pub fn army_population(state: &WorldState, registry: &UnitTypeRegistry) -> f64 {
    state
        .army
        .iter()
        .map(|(&unit, &count)| registry.population_cost(unit) * count as f64)
        .sum()
}

/// Promote waiting orders when capacity allows, tick down training items and
/// graduate finished ones into the standing army.
pub fn advance_training(
    state: &mut WorldState,
    registry: &UnitTypeRegistry,
    config: &SimConfig,
    events: &mut Vec<SimEvent>,
) {
    let available = eligible_population(state, config);
    let army_pop = army_population(state, registry);
    let mut training_pop = training_population(state, registry);
    let day = state.day;

    // Promotion in queue order: earlier orders get capacity first.
    for item in state.training_queue.iter_mut() {
        if item.status != TrainingStatus::Waiting {
            continue;
        }
        let cost = registry.population_cost(item.unit);
        if army_pop + training_pop + cost <= available + config.graduation_tolerance {
            item.status = TrainingStatus::Training;
            training_pop += cost;
        }
    }

    // Count down and graduate.
    let mut graduated: Vec<UnitTypeId> = Vec::new();
    for item in state.training_queue.iter_mut() {
        if item.status == TrainingStatus::Training {
            item.remaining_days = item.remaining_days.saturating_sub(1);
            if item.remaining_days == 0 {
                graduated.push(item.unit);
            }
        }
    }
    state
        .training_queue
        .retain(|item| !(item.status == TrainingStatus::Training && item.remaining_days == 0));

    for unit in graduated {
        *state.army.entry(unit).or_insert(0) += 1;
        events.push(SimEvent::UnitTrained { day, unit });
    }
}

/// Reconcile army and training queue against the serving population.
///
/// Runs after the economy step's population changes are known. The graduation
/// tolerance exists so a unit finishing training this tick is not evicted by
/// the very population it is about to occupy.
pub fn reconcile_army(
    state: &mut WorldState,
    registry: &UnitTypeRegistry,
    config: &SimConfig,
    events: &mut Vec<SimEvent>,
) {
    let available = eligible_population(state, config);
    let tolerance = config.graduation_tolerance;
    let day = state.day;

    // 1. Shed training load, longest remaining time first.
    let mut training_pop = training_population(state, registry);
    if training_pop > available + tolerance {
        let mut order: Vec<usize> = state
            .training_queue
            .iter()
            .enumerate()
            .filter(|(_, item)| item.status == TrainingStatus::Training)
            .map(|(i, _)| i)
            .collect();
        order.sort_by(|&a, &b| {
            let ra = state.training_queue[a].remaining_days;
            let rb = state.training_queue[b].remaining_days;
            rb.cmp(&ra)
        });

        for idx in order {
            if training_pop <= available + tolerance {
                break;
            }
            let item = &mut state.training_queue[idx];
            item.status = TrainingStatus::Waiting;
            item.remaining_days = item.total_days;
            training_pop -= registry.population_cost(item.unit);
            log::info!(
                "Training of {} halted: not enough able-bodied population",
                registry.get(item.unit).map(|d| d.name.as_str()).unwrap_or("?")
            );
            events.push(SimEvent::TrainingCancelled {
                day,
                unit: item.unit,
            });
        }
    }

    // 2. Disband standing units: highest population cost first, oldest era on ties.
    let budget = (available - training_pop) + tolerance;
    let mut army_pop = army_population(state, registry);
    if army_pop > budget {
        let mut order: Vec<UnitTypeId> = state.army.keys().copied().collect();
        order.sort_by(|&a, &b| {
            let da = registry.get(a);
            let db = registry.get(b);
            let cost_a = da.map(|d| d.population_cost).unwrap_or(0.0);
            let cost_b = db.map(|d| d.population_cost).unwrap_or(0.0);
            cost_b
                .partial_cmp(&cost_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    let era_a = da.map(|d| d.era).unwrap_or(u8::MAX);
                    let era_b = db.map(|d| d.era).unwrap_or(u8::MAX);
                    era_a.cmp(&era_b)
                })
        });

        for unit in order {
            if army_pop <= budget {
                break;
            }
            let cost = registry.population_cost(unit);
            let count = state.army.get(&unit).copied().unwrap_or(0);
            if count == 0 || cost <= 0.0 {
                continue;
            }
            let excess = army_pop - budget;
            let needed = (excess / cost).ceil() as u32;
            let disbanded = needed.min(count);

            if disbanded == count {
                state.army.remove(&unit);
            } else {
                state.army.insert(unit, count - disbanded);
            }
            army_pop -= cost * disbanded as f64;

            log::info!(
                "Disbanded {} {} for lack of serving population",
                disbanded,
                registry.get(unit).map(|d| d.name.as_str()).unwrap_or("?")
            );
            // Shortfall disbands are deliberate non-replenishing losses.
            events.push(SimEvent::UnitsDisbanded {
                day,
                unit,
                count: disbanded,
            });
        }
    }
}

/// Apply combat losses reported by the economy step.
///
/// Losses flagged `replenish` re-enter the queue as waiting auto-replenish
/// orders; anything else is simply gone.
pub fn record_combat_losses(
    state: &mut WorldState,
    losses: &[CombatLoss],
    registry: &UnitTypeRegistry,
    events: &mut Vec<SimEvent>,
) {
    let day = state.day;
    for loss in losses {
        let held = state.army.get(&loss.unit).copied().unwrap_or(0);
        let removed = loss.count.min(held);
        if removed == 0 {
            continue;
        }
        if removed == held {
            state.army.remove(&loss.unit);
        } else {
            state.army.insert(loss.unit, held - removed);
        }
        events.push(SimEvent::UnitsLost {
            day,
            unit: loss.unit,
            count: removed,
        });

        if loss.replenish {
            if let Some(def) = registry.get(loss.unit) {
                for _ in 0..removed {
                    let mut item = TrainingItem::waiting(loss.unit, def.training_days);
                    item.auto_replenish = true;
                    state.training_queue.push(item);
                }
            }
        }
    }
}
