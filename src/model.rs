use crate::agent::{Action, Agent, Concept, Counters};
use crate::entity::Point;
use crate::world::{Supply, Weather, World};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Agent state at a saved step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub pos: Point,
    pub energy: f64,
    pub fatigue: f64,
    pub carrying: usize,
    pub sheltered: bool,
    pub shelter_confidence: Option<f64>,
    pub concepts: BTreeMap<Concept, f64>,
    pub action_values: BTreeMap<Action, f64>,
    pub counters: Counters,
}

/// Record of the simulation at a single saved step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Number of steps performed so far.
    pub step: usize,

    pub weather: Weather,
    pub supply: Supply,
    pub storm_intensity: f64,

    /// Food lying in the world.
    pub food_in_world: usize,
    /// Food stored in the shelter bin.
    pub food_stored: usize,

    /// Action chosen in the last step.
    pub action: Option<Action>,

    pub agent: AgentSnapshot,
}

impl Record {
    pub fn capture(step: usize, world: &World, agent: &Agent, action: Option<Action>) -> Self {
        Self {
            step,
            weather: world.weather(),
            supply: world.supply(),
            storm_intensity: world.storm_intensity(),
            food_in_world: world.food_count(),
            food_stored: world.bin().count(),
            action,
            agent: AgentSnapshot {
                pos: agent.pos(),
                energy: agent.energy(),
                fatigue: agent.fatigue(),
                carrying: agent.carrying(),
                sheltered: agent.in_shelter(),
                shelter_confidence: agent.shelter_memory().map(|memory| memory.confidence),
                concepts: agent.concepts(),
                action_values: agent.action_values(),
                counters: agent.counters().clone(),
            },
        }
    }
}
