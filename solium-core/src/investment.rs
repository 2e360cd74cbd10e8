//! Batched autonomous investment sweep.
//!
//! Evaluating every candidate nation every tick is the expensive part, so a
//! cycle opens every `investment_cycle_days` and each tick inside it handles a
//! fixed-size batch from the cursor offset. Per-tick cost is bounded by the
//! batch size regardless of how many nations exist, and every candidate is
//! looked at exactly once per cycle.

use crate::config::SimConfig;
use crate::events::{InvestmentDirection, SimEvent};
use crate::ledger::{LedgerReason, TickLedger};
use crate::state::WorldState;
use serde::{Deserialize, Serialize};

/// A foreign polity considered for capital flows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignNation {
    pub tag: String,
    /// Diplomatic relations, -100..100.
    pub relations: f64,
    /// How open the nation's market is to outside capital, 0-1.
    pub market_openness: f64,
    /// Expected yearly return on capital placed there, as a fraction.
    pub expected_return: f64,
    /// How eager their investors are to place capital here, 0-1.
    pub inbound_interest: f64,
}

/// Cursor through a multi-tick sweep over the candidate list.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InvestmentSweep {
    pub offset: usize,
    pub last_cycle_start: Option<u64>,
    pub active: bool,
}

/// Run one tick of the investment sweep.
///
/// A cycle starts exactly when `day % investment_cycle_days == 0` — no
/// first-trigger special case. Outside an active cycle this is a no-op.
pub fn run_investment_tick(
    state: &mut WorldState,
    config: &SimConfig,
    ledger: &mut TickLedger,
    events: &mut Vec<SimEvent>,
) {
    let day = state.day;

    if config.investment_cycle_days > 0 && day % config.investment_cycle_days == 0 {
        state.investment_sweep.offset = 0;
        state.investment_sweep.last_cycle_start = Some(day);
        state.investment_sweep.active = !state.foreign_nations.is_empty();
    }

    if !state.investment_sweep.active {
        return;
    }

    let start = state.investment_sweep.offset;
    let end = (start + config.investment_batch_size).min(state.foreign_nations.len());

    let mut outflow = 0.0;
    let mut inflow = 0.0;

    for idx in start..end {
        let nation = &state.foreign_nations[idx];

        // Outbound: place capital where relations and returns justify it.
        let outbound_score =
            nation.expected_return * nation.market_openness * (nation.relations / 100.0);
        if outbound_score > 0.0 && state.treasury > 0.0 {
            let amount = state.treasury * config.investment_stake_fraction;
            outflow += amount;
            ledger.record(-amount, LedgerReason::InvestmentOutflow, &nation.tag);
            log::debug!("Outbound investment of {:.2} in {}", amount, nation.tag);
            events.push(SimEvent::InvestmentPlaced {
                day,
                nation: nation.tag.clone(),
                amount,
                direction: InvestmentDirection::Outbound,
            });
        }

        // Inbound: foreign capital arrives when their investors are keen and
        // relations are not hostile.
        if nation.inbound_interest > 0.5 && nation.relations > 0.0 {
            let amount = nation.inbound_interest * nation.relations;
            inflow += amount;
            ledger.record(amount, LedgerReason::InvestmentReturn, &nation.tag);
            log::debug!("Inbound investment of {:.2} from {}", amount, nation.tag);
            events.push(SimEvent::InvestmentPlaced {
                day,
                nation: nation.tag.clone(),
                amount,
                direction: InvestmentDirection::Inbound,
            });
        }
    }

    state.treasury = state.treasury - outflow + inflow;

    state.investment_sweep.offset = end;
    if end >= state.foreign_nations.len() {
        // Every candidate seen; idle until the next cycle boundary.
        state.investment_sweep.active = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::WorldStateBuilder;

    fn candidate(tag: &str) -> ForeignNation {
        ForeignNation {
            tag: tag.to_string(),
            relations: 50.0,
            market_openness: 0.8,
            expected_return: 0.06,
            inbound_interest: 0.2,
        }
    }

    fn sweep_state(n: usize) -> WorldState {
        let mut builder = WorldStateBuilder::new().treasury(10_000.0);
        for i in 0..n {
            builder = builder.with_foreign_nation(candidate(&format!("N{i:02}")));
        }
        builder.build()
    }

    #[test]
    fn test_seven_candidates_batch_two_take_four_ticks() {
        let config = SimConfig::default();
        let mut state = sweep_state(7);
        state.day = 10; // cycle boundary

        let mut processed_per_tick = Vec::new();
        for _ in 0..6 {
            let before = state.investment_sweep.offset;
            let was_active = state.investment_sweep.active || state.day % 10 == 0;
            let mut ledger = TickLedger::new();
            let mut events = Vec::new();
            run_investment_tick(&mut state, &config, &mut ledger, &mut events);
            let after = state.investment_sweep.offset;
            processed_per_tick.push(if was_active { after.saturating_sub(before) } else { 0 });
            state.day += 1;
        }

        // 2 + 2 + 2 + 1 across the first four ticks, nothing afterwards.
        assert_eq!(processed_per_tick[..4], [2, 2, 2, 1]);
        assert_eq!(processed_per_tick[4], 0);
        assert_eq!(processed_per_tick[5], 0);
        assert!(!state.investment_sweep.active);
    }

    #[test]
    fn test_sweep_idles_until_next_boundary_then_restarts() {
        let config = SimConfig::default();
        let mut state = sweep_state(3);
        state.day = 10;

        for _ in 0..10 {
            let mut ledger = TickLedger::new();
            let mut events = Vec::new();
            run_investment_tick(&mut state, &config, &mut ledger, &mut events);
            state.day += 1;
        }

        // Day is now 20: the boundary re-arms the sweep on the next tick.
        assert_eq!(state.day, 20);
        let mut ledger = TickLedger::new();
        let mut events = Vec::new();
        run_investment_tick(&mut state, &config, &mut ledger, &mut events);
        assert_eq!(state.investment_sweep.last_cycle_start, Some(20));
        assert_eq!(state.investment_sweep.offset, 2);
    }

    #[test]
    fn test_ledger_matches_treasury_mutation() {
        let config = SimConfig::default();
        let mut state = sweep_state(2);
        state.day = 0;

        let before = state.treasury;
        let mut ledger = TickLedger::new();
        let mut events = Vec::new();
        run_investment_tick(&mut state, &config, &mut ledger, &mut events);

        let observed = state.treasury - before;
        assert!((ledger.total() - observed).abs() < 1e-9);
    }

    #[test]
    fn test_no_candidates_no_cycle() {
        let config = SimConfig::default();
        let mut state = WorldStateBuilder::new().treasury(1_000.0).build();
        state.day = 0;

        let mut ledger = TickLedger::new();
        let mut events = Vec::new();
        run_investment_tick(&mut state, &config, &mut ledger, &mut events);

        assert!(!state.investment_sweep.active);
        assert!(events.is_empty());
    }

    #[test]
    fn test_hostile_nation_attracts_nothing() {
        let config = SimConfig::default();
        let mut nation = candidate("FOE");
        nation.relations = -80.0;
        nation.inbound_interest = 0.9;
        let mut state = WorldStateBuilder::new()
            .treasury(1_000.0)
            .with_foreign_nation(nation)
            .build();
        state.day = 0;

        let before = state.treasury;
        let mut ledger = TickLedger::new();
        let mut events = Vec::new();
        run_investment_tick(&mut state, &config, &mut ledger, &mut events);

        assert_eq!(state.treasury, before);
        assert!(events.is_empty());
    }
}
