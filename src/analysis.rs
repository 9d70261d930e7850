use crate::agent::{Concept, Counters};
use crate::config::Config;
use crate::model::Record;
use crate::stats::Accumulator;
use crate::world::Weather;
use anyhow::{Context, Result};
use rmp_serde::decode;
use serde::Serialize;
use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

/// Observable computed over the records of a run.
pub trait Obs {
    fn update(&mut self, record: &Record) -> Result<()>;
    fn report(&self) -> serde_json::Value;
}

pub struct Energy {
    acc: Accumulator,
}

impl Energy {
    pub fn new() -> Self {
        Self {
            acc: Accumulator::new(),
        }
    }
}

impl Obs for Energy {
    fn update(&mut self, record: &Record) -> Result<()> {
        self.acc.add(record.agent.energy);
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({ "energy": self.acc.report() })
    }
}

/// Fraction of storm samples the agent spent inside the shelter.
pub struct StormShelter {
    acc: Accumulator,
}

impl StormShelter {
    pub fn new() -> Self {
        Self {
            acc: Accumulator::new(),
        }
    }
}

impl Obs for StormShelter {
    fn update(&mut self, record: &Record) -> Result<()> {
        if record.weather == Weather::Storm {
            self.acc.add(if record.agent.sheltered { 1.0 } else { 0.0 });
        }
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({ "storm_sheltered": self.acc.report() })
    }
}

pub struct StoredFood {
    acc: Accumulator,
}

impl StoredFood {
    pub fn new() -> Self {
        Self {
            acc: Accumulator::new(),
        }
    }
}

impl Obs for StoredFood {
    fn update(&mut self, record: &Record) -> Result<()> {
        self.acc.add(record.food_stored as f64);
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({ "food_stored": self.acc.report() })
    }
}

/// End-of-run summary: counters, final energy and learned concepts.
#[derive(Debug, Default, Serialize)]
pub struct Summary {
    step: usize,
    counters: Counters,
    final_energy: f64,
    concepts: BTreeMap<Concept, f64>,
}

impl Obs for Summary {
    fn update(&mut self, record: &Record) -> Result<()> {
        self.step = record.step;
        self.counters = record.agent.counters.clone();
        self.final_energy = record.agent.energy;
        self.concepts = record.agent.concepts.clone();
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({ "summary": self })
    }
}

pub struct Analyzer {
    cfg: Config,
    obs_ptr_vec: Vec<Box<dyn Obs>>,
}

impl Analyzer {
    pub fn new(cfg: Config) -> Self {
        let obs_ptr_vec: Vec<Box<dyn Obs>> = vec![
            Box::new(Energy::new()),
            Box::new(StormShelter::new()),
            Box::new(StoredFood::new()),
            Box::new(Summary::default()),
        ];
        Self { cfg, obs_ptr_vec }
    }

    pub fn add_file<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);

        for _ in 0..self.cfg.output.saves_per_file {
            let record = decode::from_read(&mut reader).context("failed to read record")?;
            self.add_record(&record)?;
        }
        Ok(())
    }

    pub fn add_record(&mut self, record: &Record) -> Result<()> {
        for obs in &mut self.obs_ptr_vec {
            obs.update(record).context("failed to update observable")?;
        }
        Ok(())
    }

    pub fn reports(&self) -> Vec<serde_json::Value> {
        self.obs_ptr_vec.iter().map(|obs| obs.report()).collect()
    }

    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let writer = BufWriter::new(file);

        serde_json::to_writer_pretty(writer, &self.reports())
            .context("failed to serialize results")?;
        Ok(())
    }
}
