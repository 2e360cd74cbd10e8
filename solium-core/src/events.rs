//! Structured event records emitted by the tick pipeline.
//!
//! Subsystems push events into a per-tick buffer; a presentation layer renders
//! them (the driver writes JSONL). The core never waits for acknowledgement.
//!
//! Uses serde's tag format for clean JSONL output:
//! ```json
//! {"type":"rebellion_started","day":412,"faction":3,...}
//! ```

use crate::army::UnitTypeId;
use crate::state::Stratum;
use crate::unrest::UnrestStage;
use serde::{Deserialize, Serialize};

/// How an investment flowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvestmentDirection {
    /// Domestic capital placed abroad.
    Outbound,
    /// Foreign capital arriving here.
    Inbound,
}

/// One notable occurrence during a tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimEvent {
    /// A stratum's unrest crossed into a new stage (advisory only).
    UnrestStage {
        day: u64,
        stratum: Stratum,
        stage: UnrestStage,
    },

    /// An uprising without enough influence was redirected into defection.
    UprisingSuppressed {
        day: u64,
        stratum: Stratum,
        defectors: f64,
        wealth_lost: f64,
    },

    /// A rebel faction formed from one or more strata.
    RebellionStarted {
        day: u64,
        faction: u32,
        strata: Vec<Stratum>,
        population: f64,
        coalition: bool,
    },

    /// An uprising merged into an already-warring faction.
    RebellionReinforced {
        day: u64,
        faction: u32,
        strata: Vec<Stratum>,
        population: f64,
    },

    /// A rebel faction dissolved from exhaustion.
    RebellionCollapsed {
        day: u64,
        faction: u32,
        returned_population: f64,
    },

    /// A recruitment order reverted to waiting for lack of population.
    TrainingCancelled { day: u64, unit: UnitTypeId },

    /// A unit finished training and joined the standing army.
    UnitTrained { day: u64, unit: UnitTypeId },

    /// Standing units disbanded by the population reconciler.
    UnitsDisbanded {
        day: u64,
        unit: UnitTypeId,
        count: u32,
    },

    /// Standing units destroyed in combat.
    UnitsLost {
        day: u64,
        unit: UnitTypeId,
        count: u32,
    },

    /// The audit ledger synthesized a corrective entry.
    AuditCorrected {
        day: u64,
        expected: f64,
        observed: f64,
        correction: f64,
    },

    /// Daily tribute arrived from a vassal.
    TributeReceived {
        day: u64,
        vassal: String,
        amount: f64,
    },

    /// A vassal's independence pressure crossed the warning threshold.
    VassalRestless {
        day: u64,
        vassal: String,
        pressure: f64,
    },

    /// A vassal broke free of the realm.
    VassalIndependent { day: u64, vassal: String },

    /// The investment sweep placed or received capital.
    InvestmentPlaced {
        day: u64,
        nation: String,
        amount: f64,
        direction: InvestmentDirection,
    },
}
