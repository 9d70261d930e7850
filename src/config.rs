use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Distance kept between spawned food and every world border.
pub const SPAWN_INSET: f64 = 10.0;

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Seed of the random number generator (drawn from the OS if absent).
    #[serde(default)]
    pub seed: Option<u64>,

    pub world: WorldConfig,
    pub agent: AgentConfig,
    pub output: OutputConfig,
}

/// World parameters: dimensions, cycles, shelter and food supply.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub width: f64,
    pub height: f64,

    /// Base number of calm steps between storms.
    pub calm_duration: u32,
    /// Base number of storm steps.
    pub storm_duration: u32,
    /// Maximum jitter (both signs) added to every drawn calm duration.
    pub calm_jitter: u32,
    /// Maximum jitter (both signs) added to every drawn storm duration.
    pub storm_jitter: u32,

    pub abundance_duration: u32,
    pub scarcity_duration: u32,

    /// Containment radius of the shelter bin.
    pub shelter_radius: f64,
    /// Range both shelter coordinates are drawn from.
    pub shelter_region: [f64; 2],
    /// Fixed shelter position, overriding `shelter_region`.
    pub shelter_pos: Option<[f64; 2]>,

    /// Food spawned when the world is created.
    pub initial_food: usize,
    /// Respawn only while less food than this is in play.
    pub food_floor: usize,
    /// Number of steps between respawn attempts.
    pub respawn_interval: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: 100.0,
            height: 100.0,
            calm_duration: 400,
            storm_duration: 200,
            calm_jitter: 50,
            storm_jitter: 30,
            abundance_duration: 600,
            scarcity_duration: 300,
            shelter_radius: 10.0,
            shelter_region: [15.0, 30.0],
            shelter_pos: None,
            initial_food: 10,
            food_floor: 8,
            respawn_interval: 30,
        }
    }
}

/// Agent parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub start: [f64; 2],
    pub max_carry: usize,
    pub speed: f64,
    pub initial_energy: f64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            start: [60.0, 60.0],
            max_carry: 3,
            speed: 1.5,
            initial_energy: 0.5,
        }
    }
}

/// Output parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Number of steps between simulation saves.
    pub steps_per_save: usize,
    /// Number of saves written per file.
    pub saves_per_file: usize,
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be TOML-encoded and contain a serialized [`Config`].
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: Config = toml::from_str(&contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.world.validate().context("invalid world parameters")?;
        self.agent
            .validate_within(&self.world)
            .context("invalid agent parameters")?;

        check_num(self.output.steps_per_save, 1..100_000)
            .context("invalid number of steps per save")?;
        check_num(self.output.saves_per_file, 1..100_000)
            .context("invalid number of saves per file")?;

        Ok(())
    }

    /// Total number of steps advanced by one simulation invocation.
    pub fn steps_per_file(&self) -> usize {
        self.output.steps_per_save * self.output.saves_per_file
    }
}

impl WorldConfig {
    pub fn validate(&self) -> Result<()> {
        // Food spawns inset from every border, so the interior must be non-empty.
        let min_side = 2.0 * SPAWN_INSET;
        check_side(self.width).context("invalid width")?;
        check_side(self.height).context("invalid height")?;
        if self.width <= min_side || self.height <= min_side {
            bail!("world dimensions must exceed {min_side} on both sides");
        }

        check_num(self.calm_duration, 1..1_000_000).context("invalid calm duration")?;
        check_num(self.storm_duration, 1..1_000_000).context("invalid storm duration")?;
        check_num(self.calm_jitter, 0..self.calm_duration).context("invalid calm jitter")?;
        check_num(self.storm_jitter, 0..self.storm_duration).context("invalid storm jitter")?;
        check_num(self.abundance_duration, 1..1_000_000)
            .context("invalid abundance duration")?;
        check_num(self.scarcity_duration, 1..1_000_000).context("invalid scarcity duration")?;

        check_num(self.shelter_radius, f64::MIN_POSITIVE..=self.width.min(self.height))
            .context("invalid shelter radius")?;
        match self.shelter_pos {
            Some([x, y]) => {
                check_num(x, 0.0..=self.width).context("invalid shelter x coordinate")?;
                check_num(y, 0.0..=self.height).context("invalid shelter y coordinate")?;
            }
            None => {
                let [lo, hi] = self.shelter_region;
                if !(lo < hi) {
                    bail!("shelter region must be non-empty, but is {lo}..{hi}");
                }
                check_num(lo, 0.0..=self.width.min(self.height))
                    .context("invalid shelter region")?;
                check_num(hi, 0.0..=self.width.min(self.height))
                    .context("invalid shelter region")?;
            }
        }

        check_num(self.initial_food, 0..10_000).context("invalid initial food")?;
        check_num(self.food_floor, 0..10_000).context("invalid food floor")?;
        check_num(self.respawn_interval, 1..1_000_000).context("invalid respawn interval")?;

        Ok(())
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        check_num(self.max_carry, 1..1_000).context("invalid maximum carried food")?;
        check_num(self.speed, f64::MIN_POSITIVE..=f64::MAX).context("invalid speed")?;
        check_num(self.initial_energy, 0.0..=1.0).context("invalid initial energy")?;
        Ok(())
    }

    /// Checks that also depend on the world the agent lives in.
    pub fn validate_within(&self, world: &WorldConfig) -> Result<()> {
        self.validate()?;
        let [x, y] = self.start;
        check_num(x, 0.0..=world.width).context("invalid start x coordinate")?;
        check_num(y, 0.0..=world.height).context("invalid start y coordinate")?;
        check_num(self.speed, 0.0..=world.width.max(world.height)).context("invalid speed")?;
        Ok(())
    }
}

fn check_side(side: f64) -> Result<()> {
    if !side.is_finite() || side <= 0.0 {
        bail!("dimension must be positive and finite, but is {side:?}");
    }
    Ok(())
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            seed: Some(7),
            world: WorldConfig::default(),
            agent: AgentConfig::default(),
            output: OutputConfig {
                steps_per_save: 10,
                saves_per_file: 10,
            },
        }
    }

    #[test]
    fn default_config_is_valid() {
        config().validate().unwrap();
    }

    #[test]
    fn non_positive_dimensions_are_rejected() {
        let mut cfg = config();
        cfg.world.width = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = config();
        cfg.world.height = -80.0;
        assert!(cfg.validate().is_err());

        let mut cfg = config();
        cfg.world.width = f64::NAN;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_max_carry_is_rejected() {
        let mut cfg = config();
        cfg.agent.max_carry = 0;
        let err = cfg.validate().unwrap_err();
        assert!(format!("{err:#}").contains("maximum carried food"));
    }

    #[test]
    fn start_outside_world_is_rejected() {
        let mut cfg = config();
        cfg.agent.start = [150.0, 60.0];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn parses_sectioned_toml() {
        let contents = r#"
seed = 12

[world]
width = 80.0
height = 80.0
calm_jitter = 0
storm_jitter = 0

[agent]
start = [60.0, 60.0]

[output]
steps_per_save = 100
saves_per_file = 4
"#;
        let cfg: Config = toml::from_str(contents).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.seed, Some(12));
        assert_eq!(cfg.world.calm_duration, 400);
        assert_eq!(cfg.world.calm_jitter, 0);
        assert_eq!(cfg.agent.max_carry, 3);
        assert_eq!(cfg.steps_per_file(), 400);
    }
}
