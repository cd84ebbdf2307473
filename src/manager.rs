use crate::analysis::Analyzer;
use crate::config::Config;
use crate::engine::simulate_patients;
use anyhow::{Context, Result};
use rand::Rng;
use rmp_serde::encode;
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

pub struct Manager {
    sim_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(sim_dir: P) -> Result<Self> {
        let sim_dir = sim_dir.as_ref().to_path_buf();

        let cfg =
            Config::from_file(sim_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { sim_dir, cfg })
    }

    pub fn run_simulation(&self) -> Result<()> {
        let seed = match self.cfg.run.seed {
            Some(seed) => seed,
            None => rand::rng().random(),
        };
        log::info!(
            "simulating {} patients with seed {seed}",
            self.cfg.run.n_patients
        );

        let ensemble = simulate_patients(&self.cfg, seed).context("failed to simulate patients")?;

        let file = self.trajectories_file();
        let file = File::create(&file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write(&mut writer, &ensemble).context("failed to serialize ensemble")?;
        writer.flush().context("failed to flush writer stream")?;
        log::info!("wrote {:?}", self.trajectories_file());

        Ok(())
    }

    pub fn run_analysis(&self) -> Result<()> {
        let mut analyzer = Analyzer::new(self.cfg.clone());

        analyzer
            .add_file(self.trajectories_file())
            .context("failed to add file")?;

        analyzer
            .save_results(self.results_file())
            .context("failed to save results")?;
        log::info!("wrote {:?}", self.results_file());

        Ok(())
    }

    pub fn clean_sim(&self) -> Result<()> {
        for file in [self.trajectories_file(), self.results_file()] {
            if file.exists() {
                fs::remove_file(&file).with_context(|| format!("failed to remove {file:?}"))?;
                log::info!("removed {file:?}");
            }
        }

        Ok(())
    }

    fn trajectories_file(&self) -> PathBuf {
        self.sim_dir.join("trajectories.msgpack")
    }

    fn results_file(&self) -> PathBuf {
        self.sim_dir.join("results.json")
    }
}
