use crate::agent::{Action, Agent};
use crate::config::Config;
use crate::model::Record;
use crate::world::World;
use anyhow::{Context, Result};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Simulation engine.
///
/// Holds the configuration, world, agent and random number generator,
/// and provides methods to initialize, run, save, and load simulations.
/// Every random draw of a run comes from the single owned generator.
#[derive(Serialize, Deserialize)]
pub struct Engine {
    cfg: Config,
    world: World,
    agent: Agent,
    rng: ChaCha12Rng,
    i_step: usize,
    last_action: Option<Action>,
}

impl Engine {
    /// Create a new `Engine` with the given configuration: a fresh world with
    /// its initial food and an agent at the configured start position.
    pub fn generate_initial_condition(cfg: Config) -> Result<Self> {
        cfg.validate().context("invalid config")?;

        let seed = match cfg.seed {
            Some(seed) => seed,
            None => ChaCha12Rng::try_from_os_rng()?.random(),
        };
        log::info!("seeding generator with {seed}");
        let mut rng = ChaCha12Rng::seed_from_u64(seed);

        let mut world =
            World::new(cfg.world.clone(), &mut rng).context("failed to create world")?;
        for _ in 0..cfg.world.initial_food {
            world
                .spawn_food(&mut rng)
                .context("failed to spawn initial food")?;
        }

        let agent = Agent::new(&cfg.agent, &mut rng).context("failed to create agent")?;

        Ok(Self {
            cfg,
            world,
            agent,
            rng,
            i_step: 0,
            last_action: None,
        })
    }

    /// Perform the simulation and save the resulting records to a binary file.
    pub fn perform_simulation<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);

        log::info!(
            "running steps {}..{}",
            self.i_step,
            self.i_step + self.cfg.steps_per_file()
        );

        for i_save in 0..self.cfg.output.saves_per_file {
            for _ in 0..self.cfg.output.steps_per_save {
                self.perform_step().context("failed to perform step")?;
            }

            let record = self.record();
            encode::write(&mut writer, &record).context("failed to serialize record")?;

            let progress = 100.0 * (i_save + 1) as f64 / self.cfg.output.saves_per_file as f64;
            log::info!("completed {progress:06.2}%");
        }

        writer.flush().context("failed to flush writer stream")?;

        self.log_summary();

        Ok(())
    }

    /// Save a checkpoint of the entire engine state.
    ///
    /// Can be used to resume the simulation later.
    pub fn save_checkpoint<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write(&mut writer, &self).context("failed to serialize engine")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }

    /// Load a previously saved engine checkpoint.
    pub fn load_checkpoint<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);
        let engine = decode::from_read(&mut reader).context("failed to deserialize engine")?;
        Ok(engine)
    }

    pub fn cfg(&self) -> &Config {
        &self.cfg
    }

    pub fn record(&self) -> Record {
        Record::capture(self.i_step, &self.world, &self.agent, self.last_action)
    }

    fn perform_step(&mut self) -> Result<()> {
        // Advance the weather and scarcity cycles.
        let events = self.world.advance(&mut self.rng);
        log::trace!("step {}: {:?}, {:?}", self.i_step, events.weather, events.supply);

        // Dispatch weather transitions to the agent.
        if events.storm_started {
            log::info!("storm started at step {}", self.i_step);
            self.agent.observe_storm_start();
        }
        if events.storm_ended {
            log::info!("storm ended at step {}", self.i_step);
            self.agent.observe_storm_end();
        }

        // Let the agent sense, decide and act.
        let action = self
            .agent
            .step(&mut self.world, &mut self.rng)
            .context("failed to step agent")?;
        self.last_action = Some(action);

        // Top up food during abundance.
        if self.i_step % self.cfg.world.respawn_interval == 0 && !self.world.scarcity_active() {
            let in_play = self.world.food_count() + self.agent.carrying();
            if in_play < self.cfg.world.food_floor {
                self.world
                    .spawn_food(&mut self.rng)
                    .context("failed to respawn food")?;
            }
        }

        self.i_step += 1;

        Ok(())
    }

    fn log_summary(&self) {
        let counters = self.agent.counters();
        log::info!(
            "step {}: storms survived {}, times sheltered {}, times exposed {}, final energy {:.2}",
            self.i_step,
            counters.storms_survived,
            counters.times_sheltered,
            counters.times_exposed,
            self.agent.energy()
        );
        for (concept, val) in self.agent.concepts() {
            log::info!("{concept:?}: {val:.2}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AgentConfig, OutputConfig, WorldConfig};

    fn config(seed: u64) -> Config {
        Config {
            seed: Some(seed),
            world: WorldConfig {
                width: 80.0,
                height: 80.0,
                ..WorldConfig::default()
            },
            agent: AgentConfig::default(),
            output: OutputConfig {
                steps_per_save: 100,
                saves_per_file: 20,
            },
        }
    }

    fn run(engine: &mut Engine, n_steps: usize) -> Vec<Record> {
        (0..n_steps)
            .map(|_| {
                engine.perform_step().unwrap();
                engine.record()
            })
            .collect()
    }

    #[test]
    fn initial_condition_matches_config() {
        let engine = Engine::generate_initial_condition(config(1)).unwrap();
        let record = engine.record();
        assert_eq!(record.step, 0);
        assert_eq!(record.food_in_world, 10);
        assert_eq!(record.agent.pos.x, 60.0);
        assert_eq!(record.agent.energy, 0.5);
        assert!(record.action.is_none());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut cfg = config(1);
        cfg.agent.max_carry = 0;
        assert!(Engine::generate_initial_condition(cfg).is_err());
    }

    #[test]
    fn same_seed_reproduces_run() {
        let mut a = Engine::generate_initial_condition(config(42)).unwrap();
        let mut b = Engine::generate_initial_condition(config(42)).unwrap();
        assert_eq!(run(&mut a, 1_500), run(&mut b, 1_500));
    }

    #[test]
    fn run_keeps_invariants_and_survives_storms() {
        let mut engine = Engine::generate_initial_condition(config(7)).unwrap();
        let records = run(&mut engine, 3_000);

        let unit = 0.0..=1.0;
        for record in &records {
            assert!(unit.contains(&record.agent.energy));
            assert!(unit.contains(&record.agent.fatigue));
            assert!(record.agent.concepts.values().all(|val| unit.contains(val)));
            assert!(record.agent.action_values.values().all(|val| unit.contains(val)));
            assert!(record.agent.carrying <= 3);
            if record.weather == crate::world::Weather::Calm {
                assert_eq!(record.storm_intensity, 0.0);
            }
        }
        let last = records.last().unwrap();
        assert_eq!(last.step, 3_000);
        assert!(last.agent.counters.storms_survived >= 3);
    }

    #[test]
    fn checkpoint_resumes_same_trajectory() {
        let dir = std::env::temp_dir().join(format!("shelter-engine-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let checkpoint = dir.join("checkpoint.msgpack");

        let mut engine = Engine::generate_initial_condition(config(9)).unwrap();
        run(&mut engine, 500);
        engine.save_checkpoint(&checkpoint).unwrap();
        let expected = run(&mut engine, 500);

        let mut resumed = Engine::load_checkpoint(&checkpoint).unwrap();
        assert_eq!(resumed.cfg(), engine.cfg());
        assert_eq!(run(&mut resumed, 500), expected);

        std::fs::remove_dir_all(&dir).ok();
    }
}
