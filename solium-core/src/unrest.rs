//! Per-stratum organization and the rebellion state machine.
//!
//! Organization is an escalating unrest scalar (0-100) driven by unmet needs,
//! low approval and a stability shortfall. It climbs through advisory stages
//! and, at the uprising threshold, either spawns a rebel faction, merges into
//! one already at war, or — when the stratum lacks influence — bleeds off as
//! emigration instead.

use crate::config::SimConfig;
use crate::events::SimEvent;
use crate::state::{ResourceId, Stratum, WorldState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Escalation stage of a stratum's unrest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum UnrestStage {
    #[default]
    Calm,
    Grumbling,
    Brewing,
    Plotting,
    Uprising,
}

impl UnrestStage {
    fn entry_threshold(self, config: &SimConfig) -> f64 {
        match self {
            UnrestStage::Calm => 0.0,
            UnrestStage::Grumbling => config.grumbling_threshold,
            UnrestStage::Brewing => config.brewing_threshold,
            UnrestStage::Plotting => config.plotting_threshold,
            UnrestStage::Uprising => config.uprising_threshold,
        }
    }

    fn step_down(self) -> UnrestStage {
        match self {
            UnrestStage::Calm | UnrestStage::Grumbling => UnrestStage::Calm,
            UnrestStage::Brewing => UnrestStage::Grumbling,
            UnrestStage::Plotting => UnrestStage::Brewing,
            UnrestStage::Uprising => UnrestStage::Plotting,
        }
    }
}

/// Stage for an organization value, with hysteresis against flapping.
///
/// Escalation is immediate once a threshold is reached; de-escalation only
/// happens once organization falls `stage_hysteresis` below the current
/// stage's entry threshold, so a single-point relief action cannot bounce a
/// stratum back and forth across a boundary.
pub fn stage_for(organization: f64, current: UnrestStage, config: &SimConfig) -> UnrestStage {
    let target = if organization >= config.uprising_threshold {
        UnrestStage::Uprising
    } else if organization >= config.plotting_threshold {
        UnrestStage::Plotting
    } else if organization >= config.brewing_threshold {
        UnrestStage::Brewing
    } else if organization >= config.grumbling_threshold {
        UnrestStage::Grumbling
    } else {
        UnrestStage::Calm
    };

    if target >= current {
        return target;
    }

    let mut stage = current;
    while stage != UnrestStage::Calm
        && organization < stage.entry_threshold(config) - config.stage_hysteresis
    {
        stage = stage.step_down();
    }
    stage
}

/// Unrest state carried by each stratum.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OrganizationState {
    /// Escalating unrest scalar, 0-100.
    pub organization: f64,
    pub stage: UnrestStage,
    /// Consecutive days the stratum has been under pressure.
    pub dissatisfaction_days: u32,
}

/// An independent rebel faction at (or after) war with the realm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebelFaction {
    pub id: u32,
    pub name: String,
    /// Strata that joined; a coalition holds more than one.
    pub strata: Vec<Stratum>,
    pub population: f64,
    pub wealth: f64,
    pub resources: BTreeMap<ResourceId, f64>,
    /// The faction's own organization; decays while at war.
    pub organization: f64,
    /// Fighting strength, including any coalition bonus.
    pub strength: f64,
    pub at_war: bool,
    pub war_started_day: u64,
    /// Positive favors the rebels.
    pub war_score: f64,
}

impl RebelFaction {
    pub fn is_coalition(&self) -> bool {
        self.strata.len() > 1
    }
}

/// Advance unrest for every stratum, resolve uprisings, age rebel factions.
pub fn run_unrest_tick(state: &mut WorldState, config: &SimConfig, events: &mut Vec<SimEvent>) {
    grow_organization(state, config, events);
    resolve_uprisings(state, config, events);
    update_rebels(state, config, events);
}

/// Raise or relax organization from this tick's pressure inputs.
fn grow_organization(state: &mut WorldState, config: &SimConfig, events: &mut Vec<SimEvent>) {
    let day = state.day;
    let stability = state.stability;

    for stratum in Stratum::ALL {
        let Some(s) = state.strata.get_mut(&stratum) else {
            continue;
        };

        let approval_gap = ((50.0 - s.approval) / 50.0).max(0.0);
        let needs_gap = (1.0 - s.needs_satisfaction).max(0.0);
        let stability_gap = ((config.stability_floor - stability) / config.stability_floor).max(0.0);
        let pressure = approval_gap + needs_gap + stability_gap;

        let unrest = &mut s.unrest;
        if pressure > 0.0 {
            unrest.organization = (unrest.organization + config.organization_growth * pressure)
                .min(config.uprising_threshold);
            unrest.dissatisfaction_days += 1;
        } else {
            unrest.organization = (unrest.organization - config.organization_decay).max(0.0);
            unrest.dissatisfaction_days = 0;
        }

        let stage = stage_for(unrest.organization, unrest.stage, config);
        if stage != unrest.stage {
            let escalated = stage > unrest.stage;
            unrest.stage = stage;
            // Grumbling and Plotting raise advisory notices; nothing is forced.
            if escalated
                && matches!(stage, UnrestStage::Grumbling | UnrestStage::Plotting)
            {
                log::info!("{} unrest escalated to {:?}", stratum, stage);
                events.push(SimEvent::UnrestStage { day, stratum, stage });
            }
        }
    }
}

/// Resolve every stratum that reached the uprising threshold this tick.
fn resolve_uprisings(state: &mut WorldState, config: &SimConfig, events: &mut Vec<SimEvent>) {
    let triggered: Vec<Stratum> = Stratum::ALL
        .into_iter()
        .filter(|stratum| {
            state
                .strata
                .get(stratum)
                .map(|s| s.unrest.organization >= config.uprising_threshold)
                .unwrap_or(false)
        })
        .collect();

    if triggered.is_empty() {
        return;
    }

    // Influence gate: a stratum without enough weight cannot carry an
    // uprising; its radicals emigrate instead.
    let mut members: Vec<Stratum> = Vec::new();
    for stratum in triggered {
        if state.influence_share(stratum) < config.min_influence_share {
            suppress_uprising(state, stratum, config, events);
        } else {
            members.push(stratum);
        }
    }
    if members.is_empty() {
        return;
    }

    // Coalition recruits: strata near the threshold with qualifying influence
    // join rather than rising separately next tick.
    for stratum in Stratum::ALL {
        if members.contains(&stratum) {
            continue;
        }
        let Some(s) = state.strata.get(&stratum) else {
            continue;
        };
        let near = s.unrest.organization >= config.uprising_threshold - config.coalition_window;
        if near && state.influence_share(stratum) >= config.min_influence_share {
            members.push(stratum);
        }
    }

    spawn_or_merge_rebellion(state, &members, config, events);
}

/// Redirect an influence-starved uprising into defection.
fn suppress_uprising(
    state: &mut WorldState,
    stratum: Stratum,
    config: &SimConfig,
    events: &mut Vec<SimEvent>,
) {
    let day = state.day;
    let Some(s) = state.strata.get_mut(&stratum) else {
        return;
    };

    let defectors = s.population * config.defection_fraction;
    let wealth_lost = defectors * s.wealth_per_capita();
    s.population -= defectors;
    s.wealth = (s.wealth - wealth_lost).max(0.0);

    // High but non-triggering: the grievance is not forgotten.
    s.unrest.organization = config.suppressed_organization;
    s.unrest.stage = stage_for(s.unrest.organization, s.unrest.stage, config);

    log::warn!(
        "{} uprising suppressed for lack of influence; {:.0} people defected",
        stratum,
        defectors
    );
    events.push(SimEvent::UprisingSuppressed {
        day,
        stratum,
        defectors,
        wealth_lost,
    });
}

/// Form one faction for the whole member set, or fold into an existing war.
fn spawn_or_merge_rebellion(
    state: &mut WorldState,
    members: &[Stratum],
    config: &SimConfig,
    events: &mut Vec<SimEvent>,
) {
    let day = state.day;

    // Seize population and wealth from every member stratum.
    let mut population = 0.0;
    let mut wealth = 0.0;
    for &stratum in members {
        let Some(s) = state.strata.get_mut(&stratum) else {
            continue;
        };
        let seized = s.population * config.uprising_population_fraction;
        let looted = s.wealth * config.uprising_wealth_fraction;
        s.population -= seized;
        s.wealth -= looted;
        population += seized;
        wealth += looted;

        s.unrest.organization = config.post_uprising_organization;
        s.unrest.stage = stage_for(s.unrest.organization, UnrestStage::Calm, config);
        s.unrest.dissatisfaction_days = 0;
    }

    // Loot a slice of the realm's stockpiles.
    let mut resources: BTreeMap<ResourceId, f64> = BTreeMap::new();
    for (&id, qty) in state.resources.iter_mut() {
        let taken = *qty * config.uprising_resource_fraction;
        *qty -= taken;
        if taken > 0.0 {
            resources.insert(id, taken);
        }
    }

    // A still-warring faction of any member stratum absorbs the rising
    // instead of a duplicate forming.
    if let Some(faction) = state
        .rebels
        .iter_mut()
        .find(|f| f.at_war && f.strata.iter().any(|s| members.contains(s)))
    {
        faction.population += population;
        faction.wealth += wealth;
        for (id, qty) in resources {
            *faction.resources.entry(id).or_insert(0.0) += qty;
        }
        faction.organization = config.uprising_threshold;
        faction.strength += population;
        for &stratum in members {
            if !faction.strata.contains(&stratum) {
                faction.strata.push(stratum);
            }
        }

        log::warn!("Rebellion reinforced: {} (+{:.0} people)", faction.name, population);
        events.push(SimEvent::RebellionReinforced {
            day,
            faction: faction.id,
            strata: members.to_vec(),
            population,
        });
        return;
    }

    let coalition = members.len() > 1;
    let strength = if coalition {
        population * config.coalition_bonus
    } else {
        population
    };

    let id = state.next_rebel_id;
    state.next_rebel_id += 1;

    let name = if coalition {
        "united uprising".to_string()
    } else {
        format!("{} uprising", members[0])
    };

    log::warn!(
        "Rebellion started: {} ({:.0} people, coalition: {})",
        name,
        population,
        coalition
    );
    state.rebels.push(RebelFaction {
        id,
        name,
        strata: members.to_vec(),
        population,
        wealth,
        resources,
        organization: config.uprising_threshold,
        strength,
        at_war: true,
        war_started_day: day,
        war_score: 0.0,
    });
    events.push(SimEvent::RebellionStarted {
        day,
        faction: id,
        strata: members.to_vec(),
        population,
        coalition,
    });
}

/// Age at-war factions and dissolve the exhausted ones.
fn update_rebels(state: &mut WorldState, config: &SimConfig, events: &mut Vec<SimEvent>) {
    let day = state.day;
    let mut collapsed: Vec<(u32, f64, Vec<Stratum>)> = Vec::new();

    for faction in state.rebels.iter_mut() {
        if !faction.at_war {
            continue;
        }
        faction.organization = (faction.organization - config.rebel_organization_decay).max(0.0);

        let war_days = day.saturating_sub(faction.war_started_day);
        let exhausted = war_days >= config.rebel_min_war_days
            && faction.organization < config.rebel_collapse_floor
            && faction.war_score > config.catastrophic_war_score;
        if exhausted {
            let returned = faction.population * config.rebel_return_fraction;
            collapsed.push((faction.id, returned, faction.strata.clone()));
        }
    }

    for (id, returned, strata) in &collapsed {
        // Returnees split evenly across the member strata that still exist.
        let shares: Vec<Stratum> = strata
            .iter()
            .copied()
            .filter(|s| state.strata.contains_key(s))
            .collect();
        if !shares.is_empty() {
            let each = returned / shares.len() as f64;
            for stratum in shares {
                if let Some(s) = state.strata.get_mut(&stratum) {
                    s.population += each;
                }
            }
        }
        log::info!("Rebel faction {} dissolved; {:.0} people returned", id, returned);
        events.push(SimEvent::RebellionCollapsed {
            day,
            faction: *id,
            returned_population: *returned,
        });
    }

    let dead: Vec<u32> = collapsed.iter().map(|(id, _, _)| *id).collect();
    state.rebels.retain(|f| !dead.contains(&f.id));
}
