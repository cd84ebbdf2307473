use crate::config::Config;
use crate::engine::{Ensemble, Trajectory};
use crate::stats::{Accumulator, Histogram};
use anyhow::{Context, Result, bail};
use rmp_serde::decode;
use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

/// Observable computed over the trajectories of an ensemble.
pub trait Obs {
    fn update(&mut self, trajectory: &Trajectory) -> Result<()>;
    fn report(&self) -> serde_json::Value;
}

/// Mean and standard deviation of the total population at every step.
pub struct TotalPop {
    acc_vec: Vec<Accumulator>,
}

impl TotalPop {
    pub fn new(cfg: &Config) -> Self {
        let mut acc_vec = Vec::new();
        acc_vec.resize_with(cfg.run.n_steps + 1, Accumulator::new);
        Self { acc_vec }
    }
}

impl Obs for TotalPop {
    fn update(&mut self, trajectory: &Trajectory) -> Result<()> {
        for (acc, record) in self.acc_vec.iter_mut().zip(&trajectory.records) {
            acc.add(record.total_pop as f64);
        }
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        let reports: Vec<_> = self.acc_vec.iter().map(|acc| acc.report()).collect();
        serde_json::json!({ "total_pop": reports })
    }
}

/// Mean and standard deviation of every tracked resistant population at every step.
pub struct ResistPop {
    tracked: Vec<Vec<String>>,
    acc_mat: Vec<Vec<Accumulator>>,
}

impl ResistPop {
    pub fn new(cfg: &Config) -> Self {
        let tracked = cfg.run.tracked.clone();
        let acc_mat = tracked
            .iter()
            .map(|_| {
                let mut acc_vec = Vec::new();
                acc_vec.resize_with(cfg.run.n_steps + 1, Accumulator::new);
                acc_vec
            })
            .collect();
        Self { tracked, acc_mat }
    }
}

impl Obs for ResistPop {
    fn update(&mut self, trajectory: &Trajectory) -> Result<()> {
        for (i_step, record) in trajectory.records.iter().enumerate() {
            if record.resist_pop.len() != self.tracked.len() {
                bail!(
                    "record must have {} resistant populations, but has {}",
                    self.tracked.len(),
                    record.resist_pop.len()
                );
            }
            for (acc_vec, &pop) in self.acc_mat.iter_mut().zip(&record.resist_pop) {
                acc_vec[i_step].add(pop as f64);
            }
        }
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        let reports: Vec<_> = self
            .tracked
            .iter()
            .zip(&self.acc_mat)
            .map(|(cocktail, acc_vec)| {
                let series: Vec<_> = acc_vec.iter().map(|acc| acc.report()).collect();
                serde_json::json!({ "drugs": cocktail, "resist_pop": series })
            })
            .collect();
        serde_json::json!({ "resist_pop": reports })
    }
}

/// Distribution of the total population at the end of the run.
pub struct FinalPop {
    acc: Accumulator,
    hist: Histogram,
    n_cleared: usize,
}

impl FinalPop {
    pub fn new(cfg: &Config) -> Self {
        Self {
            acc: Accumulator::new(),
            hist: Histogram::new(cfg.output.hist_bins, 0.0, cfg.patient.max_pop as f64),
            n_cleared: 0,
        }
    }
}

impl Obs for FinalPop {
    fn update(&mut self, trajectory: &Trajectory) -> Result<()> {
        let record = trajectory
            .final_record()
            .context("trajectory has no records")?;
        let total_pop = record.total_pop as f64;
        self.acc.add(total_pop);
        self.hist.add(total_pop);
        if record.total_pop == 0 {
            self.n_cleared += 1;
        }
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        let n_patients = self.acc.n_vals();
        let frac_cleared = if n_patients > 0 {
            self.n_cleared as f64 / n_patients as f64
        } else {
            f64::NAN
        };
        serde_json::json!({
            "final_pop": {
                "stats": self.acc.report(),
                "hist": self.hist.report(),
                "frac_cleared": frac_cleared,
            }
        })
    }
}

pub struct Analyzer {
    cfg: Config,
    obs_ptr_vec: Vec<Box<dyn Obs>>,
}

impl Analyzer {
    pub fn new(cfg: Config) -> Self {
        let mut obs_ptr_vec: Vec<Box<dyn Obs>> = Vec::new();
        obs_ptr_vec.push(Box::new(TotalPop::new(&cfg)));
        obs_ptr_vec.push(Box::new(ResistPop::new(&cfg)));
        obs_ptr_vec.push(Box::new(FinalPop::new(&cfg)));
        Self { cfg, obs_ptr_vec }
    }

    pub fn add_file<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);

        let ensemble: Ensemble =
            decode::from_read(&mut reader).context("failed to deserialize ensemble")?;
        self.add_ensemble(&ensemble)
    }

    pub fn add_ensemble(&mut self, ensemble: &Ensemble) -> Result<()> {
        if ensemble.tracked != self.cfg.run.tracked {
            bail!("ensemble tracked cocktails differ from the current config");
        }

        let n_records = self.cfg.run.n_steps + 1;
        for trajectory in &ensemble.trajectories {
            if trajectory.records.len() != n_records {
                bail!(
                    "trajectory of patient {} must have {n_records} records, but has {}",
                    trajectory.i_patient,
                    trajectory.records.len()
                );
            }
            for obs in &mut self.obs_ptr_vec {
                obs.update(trajectory)
                    .context("failed to update observable")?;
            }
        }
        Ok(())
    }

    pub fn report(&self) -> serde_json::Value {
        let reports: Vec<_> = self.obs_ptr_vec.iter().map(|obs| obs.report()).collect();
        serde_json::Value::Array(reports)
    }

    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let writer = BufWriter::new(file);

        serde_json::to_writer_pretty(writer, &self.report())
            .context("failed to serialize results")?;
        Ok(())
    }
}
