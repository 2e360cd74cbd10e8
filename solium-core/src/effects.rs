//! Timed transient modifiers with per-category exponential decay.
//!
//! Event resolution creates [`TimedEffect`]s; each tick they contribute their
//! current value to a summed override map handed to the economy step, then age
//! and shrink. Decay is multiplicative so effects approach zero asymptotically,
//! but the duration field hard-caps their lifetime independently.

use crate::state::{BuildingId, ResourceId, Stratum};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Smallest effect magnitude still worth carrying.
pub const EFFECT_EPSILON: f64 = 1e-3;

/// Maximum per-day decay rate. Anything above this expires almost instantly
/// and is clamped at construction.
pub const MAX_DECAY_RATE: f64 = 0.95;

/// What a timed effect modifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectCategory {
    Approval,
    Stability,
    ResourceDemand,
    StratumDemand,
    BuildingProduction,
}

/// Which entity the effect applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectTarget {
    /// Realm-wide (stability, aggregate approval).
    Realm,
    Stratum(Stratum),
    Resource(ResourceId),
    Building(BuildingId),
}

/// A transient additive modifier that shrinks each day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimedEffect {
    pub category: EffectCategory,
    pub target: EffectTarget,
    pub value: f64,
    pub remaining_days: u32,
    /// Per-day multiplicative shrink factor, in `[0, MAX_DECAY_RATE]`.
    pub decay_rate: f64,
}

impl TimedEffect {
    /// Create an effect, clamping `decay_rate` into its valid range.
    pub fn new(
        category: EffectCategory,
        target: EffectTarget,
        value: f64,
        duration_days: u32,
        decay_rate: f64,
    ) -> Self {
        Self {
            category,
            target,
            value,
            remaining_days: duration_days,
            decay_rate: decay_rate.clamp(0.0, MAX_DECAY_RATE),
        }
    }

    /// Whether the effect still contributes anything.
    pub fn is_live(&self) -> bool {
        self.remaining_days > 0 && self.value.abs() >= EFFECT_EPSILON
    }
}

/// Accumulated modifier overrides for one tick, keyed by (category, target).
///
/// Effects of the same key sum before the economy step sees them.
#[derive(Debug, Clone, Default)]
pub struct ModifierOverrides {
    values: FxHashMap<(EffectCategory, EffectTarget), f64>,
}

impl ModifierOverrides {
    pub fn add(&mut self, category: EffectCategory, target: EffectTarget, value: f64) {
        *self.values.entry((category, target)).or_insert(0.0) += value;
    }

    pub fn get(&self, category: EffectCategory, target: EffectTarget) -> f64 {
        self.values.get(&(category, target)).copied().unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&(EffectCategory, EffectTarget), &f64)> {
        self.values.iter()
    }
}

/// Sum the current values of all live effects into an override map.
pub fn collect_overrides(effects: &[TimedEffect]) -> ModifierOverrides {
    let mut overrides = ModifierOverrides::default();
    for effect in effects {
        if effect.is_live() {
            overrides.add(effect.category, effect.target, effect.value);
        }
    }
    overrides
}

/// Age every effect by one day and drop the expired ones.
///
/// Both expiry conditions stand on their own: a zero-decay effect still dies
/// when its duration runs out, and a fast-decaying effect dies once its value
/// dips below [`EFFECT_EPSILON`] regardless of days left.
pub fn decay_effects(effects: &mut Vec<TimedEffect>) {
    for effect in effects.iter_mut() {
        effect.remaining_days = effect.remaining_days.saturating_sub(1);
        effect.value *= 1.0 - effect.decay_rate;
    }
    effects.retain(|e| e.remaining_days > 0 && e.value.abs() >= EFFECT_EPSILON);
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn approval_effect(value: f64, days: u32, decay: f64) -> TimedEffect {
        TimedEffect::new(
            EffectCategory::Approval,
            EffectTarget::Stratum(Stratum::Peasants),
            value,
            days,
            decay,
        )
    }

    #[test]
    fn test_decay_shrinks_value() {
        let mut effects = vec![approval_effect(10.0, 30, 0.1)];
        decay_effects(&mut effects);

        assert_eq!(effects.len(), 1);
        assert!((effects[0].value - 9.0).abs() < 1e-9);
        assert_eq!(effects[0].remaining_days, 29);
    }

    #[test]
    fn test_duration_expiry_without_decay() {
        // decay_rate 0: value never shrinks, duration must still kill it
        let mut effects = vec![approval_effect(10.0, 2, 0.0)];

        decay_effects(&mut effects);
        assert_eq!(effects.len(), 1);
        decay_effects(&mut effects);
        assert!(effects.is_empty());
    }

    #[test]
    fn test_epsilon_expiry_before_duration() {
        let mut effects = vec![approval_effect(0.01, 1_000, 0.9)];

        decay_effects(&mut effects);
        decay_effects(&mut effects);
        assert!(effects.is_empty(), "value fell below epsilon long before day 1000");
    }

    #[test]
    fn test_decay_rate_clamped() {
        let effect = approval_effect(5.0, 10, 2.0);
        assert_eq!(effect.decay_rate, MAX_DECAY_RATE);

        let effect = approval_effect(5.0, 10, -0.5);
        assert_eq!(effect.decay_rate, 0.0);
    }

    #[test]
    fn test_overrides_sum_same_key() {
        let effects = vec![
            approval_effect(3.0, 10, 0.1),
            approval_effect(-1.0, 10, 0.1),
            TimedEffect::new(
                EffectCategory::ResourceDemand,
                EffectTarget::Resource(ResourceId::GRAIN),
                2.5,
                5,
                0.2,
            ),
        ];

        let overrides = collect_overrides(&effects);
        assert_eq!(overrides.len(), 2);
        assert!(
            (overrides.get(
                EffectCategory::Approval,
                EffectTarget::Stratum(Stratum::Peasants)
            ) - 2.0)
                .abs()
                < 1e-9
        );
        assert!(
            (overrides.get(
                EffectCategory::ResourceDemand,
                EffectTarget::Resource(ResourceId::GRAIN)
            ) - 2.5)
                .abs()
                < 1e-9
        );
    }

    #[test]
    fn test_dead_effects_do_not_contribute() {
        let mut effect = approval_effect(3.0, 10, 0.1);
        effect.value = 1e-5;

        let overrides = collect_overrides(&[effect]);
        assert!(overrides.is_empty());
    }

    proptest! {
        /// Repeated decay drives every effect out of the set in finite steps.
        #[test]
        fn prop_decay_terminates(
            value in -1_000.0..1_000.0f64,
            days in 0u32..5_000,
            decay in 0.0..1.5f64,
        ) {
            let mut effects = vec![approval_effect(value, days, decay)];

            // An effect with decay 0 survives exactly `days` steps; everything
            // else dies sooner. 5001 steps is always enough.
            let mut steps = 0u32;
            while !effects.is_empty() {
                decay_effects(&mut effects);
                steps += 1;
                prop_assert!(steps <= 5_001, "effect never expired");
            }
        }
    }
}
