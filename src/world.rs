use crate::config::{SPAWN_INSET, WorldConfig};
use crate::entity::{Food, Point, ShelterBin};
use anyhow::{Context, Result};
use rand::prelude::*;
use rand_distr::Uniform;
use serde::{Deserialize, Serialize};

/// Storm intensity right after a storm starts.
const STORM_ONSET_INTENSITY: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Weather {
    Calm,
    Storm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Supply {
    Abundance,
    Scarcity,
}

/// Report of a single world advance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldEvents {
    pub storm_started: bool,
    pub storm_ended: bool,
    /// Weather after the advance.
    pub weather: Weather,
    /// Food supply after the advance.
    pub supply: Supply,
}

/// World with weather cycles, a scarcity cycle and a single shelter.
#[derive(Serialize, Deserialize)]
pub struct World {
    cfg: WorldConfig,

    food: Vec<Food>,
    bin: ShelterBin,
    next_id: u64,

    weather: Weather,
    weather_timer: i64,
    storm_intensity: f64,

    supply: Supply,
    supply_timer: i64,
}

impl World {
    /// Create a world in calm weather and abundance, with the shelter placed
    /// at `cfg.shelter_pos` or drawn from `cfg.shelter_region`.
    pub fn new<R: Rng + ?Sized>(cfg: WorldConfig, rng: &mut R) -> Result<Self> {
        cfg.validate().context("invalid world parameters")?;

        let bin_pos = match cfg.shelter_pos {
            Some([x, y]) => Point::new(x, y),
            None => {
                let [lo, hi] = cfg.shelter_region;
                let coord_dist = Uniform::new(lo, hi)?;
                Point::new(coord_dist.sample(rng), coord_dist.sample(rng))
            }
        };
        let bin = ShelterBin::new(bin_pos, cfg.shelter_radius);

        Ok(Self {
            food: Vec::new(),
            bin,
            next_id: 0,
            weather: Weather::Calm,
            weather_timer: cfg.calm_duration as i64,
            storm_intensity: 0.0,
            supply: Supply::Abundance,
            supply_timer: cfg.abundance_duration as i64,
            cfg,
        })
    }

    /// Advance both cycles by one step.
    pub fn advance<R: Rng + ?Sized>(&mut self, rng: &mut R) -> WorldEvents {
        let mut storm_started = false;
        let mut storm_ended = false;

        self.weather_timer -= 1;
        match self.weather {
            Weather::Calm => {
                if self.weather_timer <= 0 {
                    self.weather = Weather::Storm;
                    self.weather_timer =
                        jittered(self.cfg.storm_duration, self.cfg.storm_jitter, rng);
                    self.storm_intensity = STORM_ONSET_INTENSITY;
                    storm_started = true;
                }
            }
            Weather::Storm => {
                self.storm_intensity = 0.5 + 0.5 * (self.weather_timer as f64 * 0.1).sin();
                if self.weather_timer <= 0 {
                    self.weather = Weather::Calm;
                    self.weather_timer =
                        jittered(self.cfg.calm_duration, self.cfg.calm_jitter, rng);
                    self.storm_intensity = 0.0;
                    storm_ended = true;
                }
            }
        }

        self.supply_timer -= 1;
        if self.supply_timer <= 0 {
            (self.supply, self.supply_timer) = match self.supply {
                Supply::Abundance => (Supply::Scarcity, self.cfg.scarcity_duration as i64),
                Supply::Scarcity => (Supply::Abundance, self.cfg.abundance_duration as i64),
            };
        }

        WorldEvents {
            storm_started,
            storm_ended,
            weather: self.weather,
            supply: self.supply,
        }
    }

    /// Spawn a food item at a random interior position.
    ///
    /// Returns `Ok(None)` while scarcity is active.
    pub fn spawn_food<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<Option<&Food>> {
        if self.scarcity_active() {
            return Ok(None);
        }

        let x_dist = Uniform::new(SPAWN_INSET, self.cfg.width - SPAWN_INSET)?;
        let y_dist = Uniform::new(SPAWN_INSET, self.cfg.height - SPAWN_INSET)?;
        let nutrition_dist = Uniform::new_inclusive(0.4, 0.6)?;

        let pos = Point::new(x_dist.sample(rng), y_dist.sample(rng));
        let food = Food::new(pos, self.next_id, nutrition_dist.sample(rng));
        self.next_id += 1;
        self.food.push(food);

        Ok(self.food.last())
    }

    /// All available food strictly within `radius` of `pos`, unordered.
    pub fn nearby_food(&self, pos: Point, radius: f64) -> Vec<&Food> {
        self.food
            .iter()
            .filter(|food| food.is_available() && food.pos.dist(pos) < radius)
            .collect()
    }

    /// Remove the available food with the given id from the world.
    pub fn take_food(&mut self, id: u64) -> Option<Food> {
        let idx = self
            .food
            .iter()
            .position(|food| food.id == id && food.is_available())?;
        Some(self.food.swap_remove(idx))
    }

    /// Number of food items lying in the world.
    pub fn food_count(&self) -> usize {
        self.food.iter().filter(|food| food.is_available()).count()
    }

    pub fn is_sheltered(&self, pos: Point) -> bool {
        self.bin.is_inside(pos)
    }

    /// Weather exposure at `pos`: 0 when sheltered, the storm intensity otherwise.
    pub fn exposure(&self, pos: Point) -> f64 {
        if self.is_sheltered(pos) {
            return 0.0;
        }
        self.storm_intensity
    }

    /// Clamp `pos` into the world rectangle.
    pub fn confine(&self, pos: Point) -> Point {
        Point::new(pos.x.clamp(0.0, self.cfg.width), pos.y.clamp(0.0, self.cfg.height))
    }

    pub fn bin(&self) -> &ShelterBin {
        &self.bin
    }

    pub fn bin_mut(&mut self) -> &mut ShelterBin {
        &mut self.bin
    }

    pub fn weather(&self) -> Weather {
        self.weather
    }

    pub fn storm_active(&self) -> bool {
        self.weather == Weather::Storm
    }

    pub fn storm_intensity(&self) -> f64 {
        self.storm_intensity
    }

    pub fn supply(&self) -> Supply {
        self.supply
    }

    pub fn scarcity_active(&self) -> bool {
        self.supply == Supply::Scarcity
    }
}

fn jittered<R: Rng + ?Sized>(base: u32, jitter: u32, rng: &mut R) -> i64 {
    let jitter = jitter as i64;
    base as i64 + rng.random_range(-jitter..=jitter)
}
