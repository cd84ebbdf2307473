use crate::config::Config;
use crate::patient::{DrugPatient, Host, Patient};
use crate::virus::{ResistantVirus, SimpleVirus};
use anyhow::{Context, Result};
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Populations of a patient after a given number of updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Number of updates performed.
    pub step: usize,
    /// Total number of viruses.
    pub total_pop: usize,
    /// Resistant population for every tracked cocktail, in config order.
    pub resist_pop: Vec<usize>,
}

/// Time series of a single patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub i_patient: usize,
    pub records: Vec<Record>,
}

impl Trajectory {
    pub fn final_record(&self) -> Option<&Record> {
        self.records.last()
    }
}

/// Trajectories of every patient of an experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ensemble {
    pub seed: u64,
    pub tracked: Vec<Vec<String>>,
    pub trajectories: Vec<Trajectory>,
}

/// Random number generator of patient `i_patient`.
///
/// All patients share `seed` but draw from distinct streams, so results do
/// not depend on how patients are scheduled.
pub fn patient_rng(seed: u64, i_patient: usize) -> ChaCha12Rng {
    let mut rng = ChaCha12Rng::seed_from_u64(seed);
    rng.set_stream(i_patient as u64);
    rng
}

/// Simulation engine driving a single patient.
pub struct Engine<'a> {
    cfg: &'a Config,
    host: Box<dyn Host>,
}

impl<'a> Engine<'a> {
    /// Create a new `Engine` with a freshly infected patient.
    pub fn generate_initial_condition(cfg: &'a Config, rng: ChaCha12Rng) -> Result<Self> {
        let vir_cfg = &cfg.virus;
        let n_viruses = cfg.patient.n_viruses;
        let max_pop = cfg.patient.max_pop;

        let host: Box<dyn Host> = match (vir_cfg.prob_mut, &vir_cfg.resistances) {
            (Some(prob_mut), Some(resistances)) => {
                // Every virus owns its own copy of the profile.
                let virus = ResistantVirus::new(
                    vir_cfg.max_birth_prob,
                    vir_cfg.clear_prob,
                    resistances.clone(),
                    prob_mut,
                )
                .context("failed to construct resistant virus")?;
                Box::new(DrugPatient::new(vec![virus; n_viruses], max_pop, rng)?)
            }
            _ => {
                let virus = SimpleVirus::new(vir_cfg.max_birth_prob, vir_cfg.clear_prob)
                    .context("failed to construct virus")?;
                Box::new(Patient::new(vec![virus; n_viruses], max_pop, rng)?)
            }
        };

        Ok(Self { cfg, host })
    }

    /// Perform every step of the run, prescribing drugs on schedule.
    pub fn perform_simulation(&mut self, i_patient: usize) -> Result<Trajectory> {
        let n_steps = self.cfg.run.n_steps;

        let mut records = Vec::with_capacity(n_steps + 1);
        records.push(self.record(0));

        for i_step in 0..n_steps {
            self.prescribe_scheduled(i_step)
                .with_context(|| format!("failed to prescribe drugs at step {i_step}"))?;
            self.host.update();
            records.push(self.record(i_step + 1));
        }

        log::debug!(
            "patient {i_patient} finished with {} viruses",
            self.host.total_pop()
        );

        Ok(Trajectory { i_patient, records })
    }

    fn prescribe_scheduled(&mut self, i_step: usize) -> Result<()> {
        for treatment in &self.cfg.treatment {
            if treatment.step == i_step {
                self.host.add_prescription(&treatment.drug)?;
                log::trace!("prescribed {:?} at step {i_step}", treatment.drug);
            }
        }
        Ok(())
    }

    fn record(&self, step: usize) -> Record {
        let resist_pop = self
            .cfg
            .run
            .tracked
            .iter()
            .map(|cocktail| self.host.resist_pop(cocktail))
            .collect();
        Record {
            step,
            total_pop: self.host.total_pop(),
            resist_pop,
        }
    }
}

/// Simulate every patient of the experiment in parallel.
///
/// Trajectories are returned in patient order.
pub fn simulate_patients(cfg: &Config, seed: u64) -> Result<Ensemble> {
    let trajectories = (0..cfg.run.n_patients)
        .into_par_iter()
        .map(|i_patient| {
            let rng = patient_rng(seed, i_patient);
            let mut engine = Engine::generate_initial_condition(cfg, rng)
                .context("failed to generate initial condition")?;
            engine
                .perform_simulation(i_patient)
                .with_context(|| format!("failed to simulate patient {i_patient}"))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Ensemble {
        seed,
        tracked: cfg.run.tracked.clone(),
        trajectories,
    })
}
