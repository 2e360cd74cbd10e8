//! Test helpers for constructing world states.
//!
//! Only compiled into tests and the dev-dependencies of downstream crates;
//! nothing here is part of the simulation itself.

use crate::investment::ForeignNation;
use crate::state::{Stratum, StratumState, WorldState};
use crate::vassals::VassalState;

/// Fluent builder for [`WorldState`] fixtures.
#[derive(Debug, Default)]
pub struct WorldStateBuilder {
    state: WorldState,
}

impl WorldStateBuilder {
    pub fn new() -> Self {
        let mut state = WorldState::default();
        state.stability = 50.0;
        Self { state }
    }

    pub fn treasury(mut self, treasury: f64) -> Self {
        self.state.treasury = treasury;
        self
    }

    pub fn stability(mut self, stability: f64) -> Self {
        self.state.stability = stability;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.state.rng_seed = seed;
        self
    }

    /// Add a stratum with the given population, wealth and influence and
    /// default approval/needs.
    pub fn with_stratum(
        mut self,
        stratum: Stratum,
        population: f64,
        wealth: f64,
        influence: f64,
    ) -> Self {
        self.state
            .strata
            .insert(stratum, StratumState::new(population, wealth, influence));
        self
    }

    /// Add a fully specified stratum state.
    pub fn with_stratum_state(mut self, stratum: Stratum, state: StratumState) -> Self {
        self.state.strata.insert(stratum, state);
        self
    }

    pub fn with_vassal(mut self, vassal: VassalState) -> Self {
        self.state.vassals.push(vassal);
        self
    }

    pub fn with_foreign_nation(mut self, nation: ForeignNation) -> Self {
        self.state.foreign_nations.push(nation);
        self
    }

    pub fn build(self) -> WorldState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let state = WorldStateBuilder::new().build();
        assert_eq!(state.day, 0);
        assert_eq!(state.stability, 50.0);
        assert!(state.strata.is_empty());
    }

    #[test]
    fn test_builder_composes() {
        let state = WorldStateBuilder::new()
            .treasury(500.0)
            .stability(72.0)
            .with_stratum(Stratum::Peasants, 10_000.0, 1_000.0, 10.0)
            .build();

        assert_eq!(state.treasury, 500.0);
        assert_eq!(state.stability, 72.0);
        assert_eq!(state.strata[&Stratum::Peasants].approval, 50.0);
    }
}
