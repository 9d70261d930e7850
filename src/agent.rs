use crate::config::AgentConfig;
use crate::entity::{Food, FoodStatus, Point};
use crate::learning::{Associator, Signal, Trace, clamp_unit, reinforce};
use crate::world::World;
use anyhow::{Context, Result};
use rand::prelude::*;
use rand_distr::Uniform;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, f64::consts::TAU};

/// Range within which the shelter can be sensed.
const SHELTER_SENSE_RANGE: f64 = 50.0;
/// Range within which food can be sensed.
const FOOD_SENSE_RANGE: f64 = 30.0;
/// Confidence gained per sensing contact with the shelter.
const CONFIDENCE_GAIN: f64 = 0.15;

const BASE_DECAY: f64 = 0.001;
const EXPOSURE_DECAY: f64 = 0.004;
const SCARCITY_DECAY: f64 = 0.001;
const FATIGUE_GAIN: f64 = 0.0005;

const REST_FATIGUE_RELIEF: f64 = 0.01;
const REST_ENERGY_GAIN: f64 = 0.002;
const WANDER_TURN: f64 = 0.5;

/// Learned associations about weather and shelter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Concept {
    StormIsBad,
    ShelterProtects,
    SeekWhenStorm,
    RestRecovers,
}

impl Concept {
    pub const ALL: [Concept; 4] = [
        Concept::StormIsBad,
        Concept::ShelterProtects,
        Concept::SeekWhenStorm,
        Concept::RestRecovers,
    ];
}

/// Everything the agent can do in a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Rest,
    StaySheltered,
    SeekShelter,
    Deposit,
    Retrieve,
    EatCarried,
    Pick,
    Eat,
    Wander,
}

impl Action {
    /// Actions that carry a learned value.
    pub const VALUED: [Action; 6] = [
        Action::Eat,
        Action::Pick,
        Action::Deposit,
        Action::Retrieve,
        Action::SeekShelter,
        Action::Rest,
    ];
}

/// A sensed food item.
#[derive(Debug, Clone, PartialEq)]
pub struct FoodSighting {
    pub id: u64,
    pub dist: f64,
    pub nutrition: f64,
}

/// The sensed shelter.
#[derive(Debug, Clone, PartialEq)]
pub struct ShelterSighting {
    pub pos: Point,
    pub dist: f64,
    pub inside: bool,
    pub stored: usize,
}

/// Full sensory input of one step.
#[derive(Debug, Clone, PartialEq)]
pub struct Sensing {
    pub nearby_food: Vec<FoodSighting>,
    pub shelter: Option<ShelterSighting>,
    pub scarcity: bool,
    pub carrying: usize,
    pub storm_active: bool,
    pub storm_intensity: f64,
    pub sheltered: bool,
    pub exposure: f64,
}

impl Sensing {
    fn nearest_food(&self) -> Option<&FoodSighting> {
        // Nearest first, richer first among equally near items.
        self.nearby_food.iter().min_by(|a, b| {
            a.dist
                .total_cmp(&b.dist)
                .then(b.nutrition.total_cmp(&a.nutrition))
        })
    }
}

/// Running behavior counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Counters {
    pub food_eaten: usize,
    pub food_picked: usize,
    pub times_sheltered: usize,
    pub times_exposed: usize,
    pub rest_sessions: usize,
    pub storms_survived: usize,
}

/// Per-storm bookkeeping, present while a storm is being tracked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StormTrack {
    energy_before: f64,
    exposure_total: f64,
}

/// Remembered shelter location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShelterMemory {
    pub pos: Point,
    /// Grows on every sensing contact and is never decayed.
    pub confidence: f64,
}

/// Shelter-seeking foraging agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pos: Point,
    heading: f64,
    speed: f64,

    energy: f64,
    fatigue: f64,
    resting: bool,

    carried: Vec<Food>,
    max_carry: usize,

    shelter_memory: Option<ShelterMemory>,
    in_shelter: bool,

    concepts: BTreeMap<Concept, Trace>,
    action_values: BTreeMap<Action, Trace>,

    storm: Option<StormTrack>,
    counters: Counters,
}

impl Agent {
    pub fn new<R: Rng + ?Sized>(cfg: &AgentConfig, rng: &mut R) -> Result<Self> {
        cfg.validate().context("invalid agent parameters")?;

        let heading_dist = Uniform::new(0.0, TAU)?;
        let [x, y] = cfg.start;
        Ok(Self {
            pos: Point::new(x, y),
            heading: heading_dist.sample(rng),
            speed: cfg.speed,
            energy: clamp_unit(cfg.initial_energy),
            fatigue: 0.0,
            resting: false,
            carried: Vec::with_capacity(cfg.max_carry),
            max_carry: cfg.max_carry,
            shelter_memory: None,
            in_shelter: false,
            concepts: Concept::ALL.iter().map(|&c| (c, Trace::new(0.0))).collect(),
            action_values: Action::VALUED
                .iter()
                .map(|&a| (a, Trace::new(0.0)))
                .collect(),
            storm: None,
            counters: Counters::default(),
        })
    }

    /// One simulation step: metabolism, weather learning, then
    /// sense, decide and execute.
    pub fn step<R: Rng + ?Sized>(&mut self, world: &mut World, rng: &mut R) -> Result<Action> {
        let exposure = world.exposure(self.pos);
        self.metabolize(exposure, world.scarcity_active());

        if world.storm_active() {
            if let Some(track) = &mut self.storm {
                track.exposure_total += exposure;
            }
            if exposure > 0.1 {
                self.counters.times_exposed += 1;
                self.reinforce_concept(Concept::StormIsBad, Signal::new(exposure, 0.05));
            }
            if self.in_shelter {
                self.counters.times_sheltered += 1;
                self.reinforce_concept(Concept::ShelterProtects, Signal::new(0.6, 0.05));
            }
        }

        let sensing = self.sense(world);
        let action = self.decide(&sensing, rng);
        log::trace!(
            "exposure {:.2}, shelter at {:?}, chose {action:?}",
            sensing.exposure,
            sensing.shelter.as_ref().map(|shelter| shelter.dist)
        );
        self.execute(action, &sensing, world, rng)
            .with_context(|| format!("failed to execute {action:?}"))?;

        Ok(action)
    }

    fn metabolize(&mut self, exposure: f64, scarcity: bool) {
        let scarcity_decay = if scarcity { SCARCITY_DECAY } else { 0.0 };
        let decay = BASE_DECAY + exposure * EXPOSURE_DECAY + scarcity_decay;
        self.energy = clamp_unit(self.energy - decay);
        self.fatigue = clamp_unit(self.fatigue + FATIGUE_GAIN);
    }

    /// Sense the shelter, refreshing the shelter memory on contact.
    pub fn sense_shelter(&mut self, world: &World) -> Option<ShelterSighting> {
        let bin = world.bin();
        let dist = bin.pos().dist(self.pos);
        if dist >= SHELTER_SENSE_RANGE {
            self.in_shelter = false;
            return None;
        }

        let confidence = self
            .shelter_memory
            .as_ref()
            .map_or(0.0, |memory| memory.confidence);
        self.shelter_memory = Some(ShelterMemory {
            pos: bin.pos(),
            confidence: clamp_unit(confidence + CONFIDENCE_GAIN),
        });
        self.in_shelter = bin.is_inside(self.pos);

        Some(ShelterSighting {
            pos: bin.pos(),
            dist,
            inside: self.in_shelter,
            stored: bin.count(),
        })
    }

    /// Full sensory input.
    pub fn sense(&mut self, world: &World) -> Sensing {
        let nearby_food = world
            .nearby_food(self.pos, FOOD_SENSE_RANGE)
            .into_iter()
            .map(|food| FoodSighting {
                id: food.id,
                dist: food.pos.dist(self.pos),
                nutrition: food.nutrition,
            })
            .collect();
        let shelter = self.sense_shelter(world);

        Sensing {
            nearby_food,
            shelter,
            scarcity: world.scarcity_active(),
            carrying: self.carried.len(),
            storm_active: world.storm_active(),
            storm_intensity: world.storm_intensity(),
            sheltered: self.in_shelter,
            exposure: world.exposure(self.pos),
        }
    }

    /// Pick an action by the first matching rule of a fixed priority chain.
    pub fn decide<R: Rng + ?Sized>(&mut self, sensing: &Sensing, rng: &mut R) -> Action {
        // Storm response.
        if sensing.storm_active {
            let urgency = self.concept(Concept::StormIsBad)
                + self.concept(Concept::ShelterProtects)
                + sensing.storm_intensity;
            if urgency > 0.3 || rng.random::<f64>() < 0.3 {
                if !sensing.sheltered {
                    return Action::SeekShelter;
                }
                if self.fatigue > 0.3 || self.energy < 0.5 {
                    return Action::Rest;
                }
                return Action::StaySheltered;
            }
        }

        // Keep resting until recovered.
        if self.resting {
            if self.fatigue < 0.1 && self.energy > 0.7 {
                self.resting = false;
            } else {
                return Action::Rest;
            }
        }

        if self.fatigue > 0.6 && sensing.sheltered {
            return Action::Rest;
        }

        // Storage.
        if let Some(shelter) = sensing.shelter.as_ref().filter(|shelter| shelter.inside) {
            if sensing.carrying > 0 && !sensing.scarcity {
                return Action::Deposit;
            }
            if sensing.scarcity && shelter.stored > 0 {
                return Action::Retrieve;
            }
        }

        if self.energy < 0.35 && sensing.carrying > 0 {
            return Action::EatCarried;
        }

        if !sensing.nearby_food.is_empty() {
            if sensing.carrying < self.max_carry
                && !sensing.scarcity
                && rng.random::<f64>() < 0.35
            {
                return Action::Pick;
            }
            if self.energy < 0.6 {
                return Action::Eat;
            }
        }

        Action::Wander
    }

    fn execute<R: Rng + ?Sized>(
        &mut self,
        action: Action,
        sensing: &Sensing,
        world: &mut World,
        rng: &mut R,
    ) -> Result<()> {
        if action != Action::Rest {
            self.resting = false;
        }

        match action {
            Action::Rest => {
                if !self.resting {
                    self.resting = true;
                    self.counters.rest_sessions += 1;
                }
                self.fatigue = clamp_unit(self.fatigue - REST_FATIGUE_RELIEF);
                self.energy = clamp_unit(self.energy + REST_ENERGY_GAIN);
            }
            Action::StaySheltered => {}
            Action::SeekShelter => {
                let target = sensing
                    .shelter
                    .as_ref()
                    .map(|shelter| shelter.pos)
                    .or(self.shelter_memory.as_ref().map(|memory| memory.pos));
                match target {
                    Some(target) => self.move_toward(target, world),
                    None => self.wander(world, rng)?,
                }
            }
            Action::Wander => self.wander(world, rng)?,
            Action::Pick => {
                if let Some(sighting) = sensing.nearest_food()
                    && let Some(mut food) = world.take_food(sighting.id)
                {
                    food.status = FoodStatus::Picked;
                    self.carried.push(food);
                    self.counters.food_picked += 1;
                }
            }
            Action::Eat => {
                if let Some(sighting) = sensing.nearest_food()
                    && let Some(food) = world.take_food(sighting.id)
                {
                    self.consume(food);
                }
            }
            Action::EatCarried => {
                if !self.carried.is_empty() {
                    let food = self.carried.remove(0);
                    self.consume(food);
                }
            }
            Action::Deposit => {
                if !self.carried.is_empty() {
                    let food = self.carried.remove(0);
                    world.bin_mut().deposit(food);
                }
            }
            Action::Retrieve => {
                if let Some(food) = world.bin_mut().retrieve() {
                    if self.carried.len() < self.max_carry {
                        self.carried.push(food);
                    } else {
                        self.consume(food);
                    }
                }
            }
        }

        Ok(())
    }

    fn consume(&mut self, mut food: Food) {
        food.status = FoodStatus::Eaten;
        self.energy = clamp_unit(self.energy + food.nutrition);
        self.counters.food_eaten += 1;
    }

    fn wander<R: Rng + ?Sized>(&mut self, world: &World, rng: &mut R) -> Result<()> {
        let turn_dist = Uniform::new_inclusive(-WANDER_TURN, WANDER_TURN)?;
        self.heading = (self.heading + turn_dist.sample(rng)).rem_euclid(TAU);
        let next = Point::new(
            self.pos.x + self.speed * self.heading.cos(),
            self.pos.y + self.speed * self.heading.sin(),
        );
        self.pos = world.confine(next);
        Ok(())
    }

    fn move_toward(&mut self, target: Point, world: &World) {
        let dist = self.pos.dist(target);
        if dist <= self.speed {
            self.pos = world.confine(target);
            return;
        }
        self.heading = (target.y - self.pos.y).atan2(target.x - self.pos.x);
        let next = Point::new(
            self.pos.x + self.speed * self.heading.cos(),
            self.pos.y + self.speed * self.heading.sin(),
        );
        self.pos = world.confine(next);
    }

    /// Called when a storm begins.
    pub fn observe_storm_start(&mut self) {
        self.storm = Some(StormTrack {
            energy_before: self.energy,
            exposure_total: 0.0,
        });
    }

    /// Called when a storm ends; consolidates the storm experience.
    pub fn observe_storm_end(&mut self) {
        let Some(track) = self.storm.take() else {
            return;
        };

        let energy_lost = track.energy_before - self.energy;
        log::debug!(
            "storm ended: exposure {:.2}, energy lost {energy_lost:.3}",
            track.exposure_total
        );

        if track.exposure_total > 10.0 {
            let target = (energy_lost * 3.0).min(1.0);
            self.reinforce_concept(Concept::StormIsBad, Signal::new(target, 0.2));
            self.reinforce_concept(Concept::SeekWhenStorm, Signal::new(0.7, 0.15));
        }

        if track.exposure_total < 5.0 && energy_lost < 0.1 {
            self.reinforce_concept(Concept::ShelterProtects, Signal::new(0.9, 0.2));
            if let Some(value) = self.action_values.get_mut(&Action::SeekShelter) {
                reinforce(value, Signal::new(0.8, 0.15));
            }
        }

        self.counters.storms_survived += 1;
    }

    fn reinforce_concept(&mut self, concept: Concept, signal: Signal) {
        let trace = self.concepts.entry(concept).or_default();
        log::trace!(
            "{concept:?}: tension {:.3} toward {:.3}",
            trace.tension(signal.target),
            signal.target
        );
        reinforce(trace, signal);
    }

    pub fn concept(&self, concept: Concept) -> f64 {
        self.concepts.get(&concept).map_or(0.0, Trace::recall)
    }

    pub fn concepts(&self) -> BTreeMap<Concept, f64> {
        self.concepts.iter().map(|(&c, t)| (c, t.recall())).collect()
    }

    pub fn action_values(&self) -> BTreeMap<Action, f64> {
        self.action_values
            .iter()
            .map(|(&a, t)| (a, t.recall()))
            .collect()
    }

    pub fn pos(&self) -> Point {
        self.pos
    }

    pub fn energy(&self) -> f64 {
        self.energy
    }

    pub fn fatigue(&self) -> f64 {
        self.fatigue
    }

    pub fn carrying(&self) -> usize {
        self.carried.len()
    }

    pub fn in_shelter(&self) -> bool {
        self.in_shelter
    }

    pub fn shelter_memory(&self) -> Option<&ShelterMemory> {
        self.shelter_memory.as_ref()
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }
}
