//! Dependent polities: tribute collection and independence pressure.
//!
//! Tribute is folded into the same tick's ledger as everything else. Pressure
//! toward independence rises while the overlord looks weak and relaxes while
//! it looks strong; at 100 the vassal walks.

use crate::config::SimConfig;
use crate::events::SimEvent;
use crate::ledger::{LedgerReason, TickLedger};
use crate::state::WorldState;
use serde::{Deserialize, Serialize};

/// Days per accounting month for tribute proration.
const DAYS_PER_MONTH: f64 = 30.0;

/// State of one dependent polity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VassalState {
    pub name: String,
    /// Fraction of the vassal's income owed as tribute.
    pub tribute_rate: f64,
    /// The vassal's estimated monthly income.
    pub monthly_income: f64,
    /// 0-100; at 100 the vassal declares independence.
    pub independence_pressure: f64,
    /// Set while above the warning threshold so the notice fires once.
    #[serde(default)]
    pub warned: bool,
}

impl VassalState {
    pub fn new(name: &str, tribute_rate: f64, monthly_income: f64) -> Self {
        Self {
            name: name.to_string(),
            tribute_rate,
            monthly_income,
            independence_pressure: 0.0,
            warned: false,
        }
    }

    /// Tribute owed per day.
    pub fn daily_tribute(&self) -> f64 {
        self.monthly_income * self.tribute_rate / DAYS_PER_MONTH
    }
}

/// Collect tribute and advance independence pressure for every vassal.
pub fn run_vassal_tick(
    state: &mut WorldState,
    config: &SimConfig,
    ledger: &mut TickLedger,
    events: &mut Vec<SimEvent>,
) {
    let day = state.day;
    // Pressure rises while the overlord is unstable or the army is hollow.
    let weak_overlord = state.stability < config.stability_floor;
    let hollow_army = state.army.values().sum::<u32>() == 0;

    let mut tribute_total = 0.0;
    let mut departed: Vec<String> = Vec::new();

    for vassal in state.vassals.iter_mut() {
        let tribute = vassal.daily_tribute();
        if tribute > 0.0 {
            tribute_total += tribute;
            ledger.record(tribute, LedgerReason::Tribute, &vassal.name);
            events.push(SimEvent::TributeReceived {
                day,
                vassal: vassal.name.clone(),
                amount: tribute,
            });
        }

        let mut delta = 0.0;
        if weak_overlord {
            delta += config.vassal_instability_pressure;
        }
        if hollow_army {
            delta += config.vassal_hollow_army_pressure;
        }
        if delta > 0.0 {
            vassal.independence_pressure = (vassal.independence_pressure + delta).min(100.0);
        } else {
            vassal.independence_pressure =
                (vassal.independence_pressure - config.vassal_pressure_decay).max(0.0);
        }

        if vassal.independence_pressure >= config.vassal_warning_threshold && !vassal.warned {
            vassal.warned = true;
            log::info!(
                "Vassal {} grows restless (pressure {:.0})",
                vassal.name,
                vassal.independence_pressure
            );
            events.push(SimEvent::VassalRestless {
                day,
                vassal: vassal.name.clone(),
                pressure: vassal.independence_pressure,
            });
        } else if vassal.independence_pressure < config.vassal_warning_threshold - 10.0 {
            vassal.warned = false;
        }

        if vassal.independence_pressure >= 100.0 {
            departed.push(vassal.name.clone());
        }
    }

    state.treasury += tribute_total;

    for name in departed {
        log::warn!("Vassal {} has declared independence", name);
        events.push(SimEvent::VassalIndependent {
            day,
            vassal: name.clone(),
        });
        state.vassals.retain(|v| v.name != name);
    }
}
