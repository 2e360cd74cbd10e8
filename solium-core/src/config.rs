use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Simulation tunables.
///
/// Everything with a threshold or an epsilon lives here so tests can tighten
/// or relax individual rules without touching the algorithms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Treasury audit tolerance; discrepancies below this are ignored.
    pub audit_epsilon: f64,
    /// Fraction of serving-strata population eligible for the army.
    pub service_fraction: f64,
    /// Population slack reserved for units graduating this tick.
    pub graduation_tolerance: f64,

    // === Unrest stage thresholds (organization, 0-100) ===
    pub grumbling_threshold: f64,
    pub brewing_threshold: f64,
    pub plotting_threshold: f64,
    pub uprising_threshold: f64,
    /// A stage only de-escalates once organization drops this far below its
    /// entry threshold.
    pub stage_hysteresis: f64,

    // === Uprising resolution ===
    /// Minimum influence share for an uprising to actually form a faction.
    pub min_influence_share: f64,
    /// Population fraction that defects when an uprising is suppressed.
    pub defection_fraction: f64,
    /// Organization value after a suppressed uprising (high but non-triggering).
    pub suppressed_organization: f64,
    /// Organization value of the parent stratum after a successful uprising.
    pub post_uprising_organization: f64,
    /// Other strata within this many points of the uprising threshold join a
    /// coalition rebellion.
    pub coalition_window: f64,
    /// Strength multiplier for coalition factions.
    pub coalition_bonus: f64,
    /// Population fraction seized by a new rebel faction.
    pub uprising_population_fraction: f64,
    /// Wealth fraction looted by a new rebel faction.
    pub uprising_wealth_fraction: f64,
    /// Stockpile fraction looted by a new rebel faction.
    pub uprising_resource_fraction: f64,

    // === Rebel faction lifecycle ===
    /// Days at war before a faction may dissolve from exhaustion.
    pub rebel_min_war_days: u64,
    /// Faction organization floor below which it collapses.
    pub rebel_collapse_floor: f64,
    /// War score at or below this counts as catastrophic (no quiet collapse).
    pub catastrophic_war_score: f64,
    /// Fraction of a collapsed faction's population that returns home.
    pub rebel_return_fraction: f64,
    /// Daily organization decay of an at-war rebel faction.
    pub rebel_organization_decay: f64,

    // === Organization growth ===
    /// Daily organization decay while a stratum's needs are met.
    pub organization_decay: f64,
    /// Growth multiplier applied to accumulated pressure.
    pub organization_growth: f64,
    /// Stability below this contributes to unrest pressure.
    pub stability_floor: f64,

    // === Vassals ===
    /// Independence pressure that triggers an advisory warning.
    pub vassal_warning_threshold: f64,
    /// Daily pressure decay while the overlord looks strong.
    pub vassal_pressure_decay: f64,
    /// Daily pressure gain while overlord stability sits below the floor.
    pub vassal_instability_pressure: f64,
    /// Daily pressure gain while the overlord fields no army at all.
    pub vassal_hollow_army_pressure: f64,

    // === Investment sweep ===
    pub investment_cycle_days: u64,
    pub investment_batch_size: usize,
    /// Fraction of the treasury risked per outbound investment.
    pub investment_stake_fraction: f64,
}

impl SimConfig {
    /// Load tunables from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            audit_epsilon: 0.01,
            service_fraction: 0.25,
            graduation_tolerance: 50.0,

            grumbling_threshold: 30.0,
            brewing_threshold: 50.0,
            plotting_threshold: 70.0,
            uprising_threshold: 100.0,
            stage_hysteresis: 5.0,

            min_influence_share: 0.10,
            defection_fraction: 0.05,
            suppressed_organization: 85.0,
            post_uprising_organization: 20.0,
            coalition_window: 10.0,
            coalition_bonus: 1.25,
            uprising_population_fraction: 0.25,
            uprising_wealth_fraction: 0.40,
            uprising_resource_fraction: 0.10,

            rebel_min_war_days: 180,
            rebel_collapse_floor: 20.0,
            catastrophic_war_score: -50.0,
            rebel_return_fraction: 0.5,
            rebel_organization_decay: 0.4,

            organization_decay: 0.5,
            organization_growth: 1.0,
            stability_floor: 50.0,

            vassal_warning_threshold: 75.0,
            vassal_pressure_decay: 0.05,
            vassal_instability_pressure: 0.10,
            vassal_hollow_army_pressure: 0.15,

            investment_cycle_days: 10,
            investment_batch_size: 2,
            investment_stake_fraction: 0.01,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds_ordered() {
        let config = SimConfig::default();
        assert!(config.grumbling_threshold < config.brewing_threshold);
        assert!(config.brewing_threshold < config.plotting_threshold);
        assert!(config.plotting_threshold < config.uprising_threshold);
        assert!(config.suppressed_organization < config.uprising_threshold);
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = SimConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: SimConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.audit_epsilon, config.audit_epsilon);
        assert_eq!(parsed.investment_batch_size, config.investment_batch_size);
    }
}
