use crate::army::TrainingItem;
use crate::effects::TimedEffect;
use crate::investment::{ForeignNation, InvestmentSweep};
use crate::unrest::{OrganizationState, RebelFaction};
use crate::vassals::VassalState;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Type-safe resource identifier.
///
/// Prevents mixing up resource ids with building or unit ids.
#[derive(
    Hash, Eq, PartialEq, Clone, Copy, Debug, Default, Serialize, Deserialize, PartialOrd, Ord,
)]
pub struct ResourceId(pub u16);

impl ResourceId {
    pub const GRAIN: ResourceId = ResourceId(0);
    pub const TIMBER: ResourceId = ResourceId(1);
    pub const IRON: ResourceId = ResourceId(2);
    pub const CLOTH: ResourceId = ResourceId(3);
    pub const WINE: ResourceId = ResourceId(4);
}

/// Type-safe building identifier, used by production effects.
#[derive(
    Hash, Eq, PartialEq, Clone, Copy, Debug, Default, Serialize, Deserialize, PartialOrd, Ord,
)]
pub struct BuildingId(pub u8);

/// Social strata of the realm.
///
/// A closed set: every decay/escalation site matches exhaustively so a new
/// stratum cannot be added without revisiting them.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Stratum {
    Nobility,
    Clergy,
    Burghers,
    Peasants,
    Laborers,
}

impl Stratum {
    pub const ALL: [Stratum; 5] = [
        Stratum::Nobility,
        Stratum::Clergy,
        Stratum::Burghers,
        Stratum::Peasants,
        Stratum::Laborers,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stratum::Nobility => "nobility",
            Stratum::Clergy => "clergy",
            Stratum::Burghers => "burghers",
            Stratum::Peasants => "peasants",
            Stratum::Laborers => "laborers",
        }
    }

    /// Whether members of this stratum can be conscripted.
    pub fn serves(self) -> bool {
        matches!(self, Stratum::Peasants | Stratum::Laborers)
    }
}

impl std::fmt::Display for Stratum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-resource market figures plus a bounded price history.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MarketState {
    pub prices: BTreeMap<ResourceId, f64>,
    pub supply: BTreeMap<ResourceId, f64>,
    pub demand: BTreeMap<ResourceId, f64>,
    /// Rolling price history, newest at the back, capped at `HISTORY_DAYS`.
    pub price_history: BTreeMap<ResourceId, VecDeque<f64>>,
}

impl MarketState {
    pub const HISTORY_DAYS: usize = 30;

    /// Append today's prices to the history, evicting the oldest entries.
    pub fn push_history(&mut self) {
        for (&resource, &price) in &self.prices {
            let history = self.price_history.entry(resource).or_default();
            history.push_back(price);
            while history.len() > Self::HISTORY_DAYS {
                history.pop_front();
            }
        }
    }
}

/// Runtime state of a single social stratum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StratumState {
    /// Head count (people, not households).
    pub population: f64,
    /// Aggregate wealth held by the stratum.
    pub wealth: f64,
    /// Approval of the government (0-100).
    pub approval: f64,
    /// Share-determining political weight (arbitrary positive units).
    pub influence: f64,
    /// Fraction of daily needs met last tick (0-1).
    pub needs_satisfaction: f64,
    /// Escalating unrest state.
    pub unrest: OrganizationState,
}

impl StratumState {
    pub fn new(population: f64, wealth: f64, influence: f64) -> Self {
        Self {
            population,
            wealth,
            approval: 50.0,
            influence,
            needs_satisfaction: 1.0,
            unrest: OrganizationState::default(),
        }
    }

    /// Per-capita wealth, zero for an empty stratum.
    pub fn wealth_per_capita(&self) -> f64 {
        if self.population > 0.0 {
            self.wealth / self.population
        } else {
            0.0
        }
    }
}

/// Complete simulation state.
///
/// Owned exclusively by the orchestrator and mutated only between ticks;
/// the economy step receives a snapshot clone.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorldState {
    /// Days since simulation start. One tick advances exactly one day.
    pub day: u64,
    pub rng_seed: u64,
    pub treasury: f64,
    /// Realm-wide stability (0-100).
    pub stability: f64,
    pub resources: BTreeMap<ResourceId, f64>,
    pub market: MarketState,
    pub strata: BTreeMap<Stratum, StratumState>,
    /// Standing army: unit type -> count.
    pub army: BTreeMap<crate::army::UnitTypeId, u32>,
    /// Ordered recruitment queue.
    pub training_queue: Vec<TrainingItem>,
    /// Transient modifiers created by event resolution.
    pub effects: Vec<TimedEffect>,
    pub vassals: Vec<VassalState>,
    pub rebels: Vec<RebelFaction>,
    /// Candidate pool for the autonomous investment sweep.
    pub foreign_nations: Vec<ForeignNation>,
    pub investment_sweep: InvestmentSweep,
    pub next_rebel_id: u32,
}

impl WorldState {
    /// Total population across all strata.
    pub fn total_population(&self) -> f64 {
        self.strata.values().map(|s| s.population).sum()
    }

    /// Total political influence across all strata.
    pub fn total_influence(&self) -> f64 {
        self.strata.values().map(|s| s.influence).sum()
    }

    /// A stratum's share of total influence, zero when there is none at all.
    pub fn influence_share(&self, stratum: Stratum) -> f64 {
        let total = self.total_influence();
        if total <= 0.0 {
            return 0.0;
        }
        self.strata
            .get(&stratum)
            .map(|s| s.influence / total)
            .unwrap_or(0.0)
    }

    /// Compute a deterministic checksum of the world state.
    ///
    /// Used for replay validation and divergence debugging. Floats are hashed
    /// by bit pattern; all maps are `BTreeMap` so iteration order is stable.
    pub fn checksum(&self) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();

        self.day.hash(&mut hasher);
        self.rng_seed.hash(&mut hasher);
        self.treasury.to_bits().hash(&mut hasher);
        self.stability.to_bits().hash(&mut hasher);

        for (&id, &qty) in &self.resources {
            id.hash(&mut hasher);
            qty.to_bits().hash(&mut hasher);
        }

        for (&id, &price) in &self.market.prices {
            id.hash(&mut hasher);
            price.to_bits().hash(&mut hasher);
        }

        for (&stratum, s) in &self.strata {
            stratum.hash(&mut hasher);
            s.population.to_bits().hash(&mut hasher);
            s.wealth.to_bits().hash(&mut hasher);
            s.approval.to_bits().hash(&mut hasher);
            s.influence.to_bits().hash(&mut hasher);
            s.unrest.organization.to_bits().hash(&mut hasher);
        }

        for (&unit, &count) in &self.army {
            unit.hash(&mut hasher);
            count.hash(&mut hasher);
        }

        for item in &self.training_queue {
            item.unit.hash(&mut hasher);
            item.remaining_days.hash(&mut hasher);
        }

        self.rebels.len().hash(&mut hasher);
        self.vassals.len().hash(&mut hasher);

        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::WorldStateBuilder;

    #[test]
    fn test_influence_share() {
        let state = WorldStateBuilder::new()
            .with_stratum(Stratum::Nobility, 1_000.0, 500.0, 30.0)
            .with_stratum(Stratum::Peasants, 50_000.0, 100.0, 10.0)
            .build();

        let share = state.influence_share(Stratum::Nobility);
        assert!((share - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_influence_share_empty_world() {
        let state = WorldState::default();
        assert_eq!(state.influence_share(Stratum::Peasants), 0.0);
    }

    #[test]
    fn test_market_history_bounded() {
        let mut market = MarketState::default();
        market.prices.insert(ResourceId::GRAIN, 2.0);

        for _ in 0..100 {
            market.push_history();
        }

        let history = market.price_history.get(&ResourceId::GRAIN).unwrap();
        assert_eq!(history.len(), MarketState::HISTORY_DAYS);
    }

    #[test]
    fn test_checksum_determinism() {
        let state = WorldStateBuilder::new()
            .with_stratum(Stratum::Peasants, 50_000.0, 100.0, 10.0)
            .treasury(1_000.0)
            .build();

        assert_eq!(state.checksum(), state.checksum());
    }

    #[test]
    fn test_checksum_sensitivity() {
        let state1 = WorldStateBuilder::new().treasury(1_000.0).build();
        let state2 = WorldStateBuilder::new().treasury(1_000.5).build();

        assert_ne!(state1.checksum(), state2.checksum());
    }
}
