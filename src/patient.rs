//! Patients hosting a virus population.
//!
//! Every call to `update` performs one step, always in the same order:
//! clearance of the population present at the start of the step, computation
//! of the population density, and reproduction of the survivors. Offspring
//! born during a step take no part in it.

use crate::utils::{check_drug, check_num};
use crate::virus::{ResistantVirus, SimpleVirus, Virus};
use anyhow::{Context, Result, bail};
use rand_chacha::ChaCha12Rng;

/// Common interface used to drive any kind of patient.
pub trait Host {
    /// Perform one step and return the total population after it.
    fn update(&mut self) -> usize;

    /// Current number of viruses.
    fn total_pop(&self) -> usize;

    /// Number of viruses resistant to every drug in `drugs`.
    fn resist_pop(&self, drugs: &[String]) -> usize;

    /// Add `drug` to the prescriptions of this patient.
    fn add_prescription(&mut self, drug: &str) -> Result<()>;
}

/// Virus population with a maximum sustainable size.
pub struct Patient<V> {
    viruses: Vec<V>,
    max_pop: usize,
    rng: ChaCha12Rng,
}

impl<V: Virus> Patient<V> {
    /// Create a new patient owning `viruses` and drawing from `rng`.
    pub fn new(viruses: Vec<V>, max_pop: usize, rng: ChaCha12Rng) -> Result<Self> {
        check_num(max_pop, 1..).context("invalid maximum population")?;
        Ok(Self {
            viruses,
            max_pop,
            rng,
        })
    }

    pub fn total_pop(&self) -> usize {
        self.viruses.len()
    }

    pub fn max_pop(&self) -> usize {
        self.max_pop
    }

    pub fn viruses(&self) -> &[V] {
        &self.viruses
    }

    /// Number of viruses resistant to every drug in `drugs`.
    ///
    /// An empty list matches every virus.
    pub fn resist_pop(&self, drugs: &[String]) -> usize {
        self.viruses
            .iter()
            .filter(|virus| virus.is_resistant_to_all(drugs))
            .count()
    }

    fn step(&mut self, active_drugs: &[String]) -> usize {
        // Clear viruses.
        self.viruses.retain(|virus| !virus.should_clear(&mut self.rng));

        // Compute density once for the whole reproduction pass.
        let n_surv = self.viruses.len();
        let pop_density = n_surv as f64 / self.max_pop as f64;

        // Reproduce survivors only, offspring are appended after them.
        for i_vir in 0..n_surv {
            if let Some(child) =
                self.viruses[i_vir].try_reproduce(pop_density, active_drugs, &mut self.rng)
            {
                self.viruses.push(child);
            }
        }

        self.viruses.len()
    }
}

impl Patient<SimpleVirus> {
    pub fn update(&mut self) -> usize {
        self.step(&[])
    }
}

impl Host for Patient<SimpleVirus> {
    fn update(&mut self) -> usize {
        Patient::update(self)
    }

    fn total_pop(&self) -> usize {
        Patient::total_pop(self)
    }

    fn resist_pop(&self, drugs: &[String]) -> usize {
        Patient::resist_pop(self, drugs)
    }

    fn add_prescription(&mut self, drug: &str) -> Result<()> {
        bail!("patient without resistant viruses cannot be prescribed {drug:?}");
    }
}

/// Patient whose viruses react to a cumulative set of prescribed drugs.
pub struct DrugPatient {
    patient: Patient<ResistantVirus>,
    prescriptions: Vec<String>,
}

impl DrugPatient {
    pub fn new(viruses: Vec<ResistantVirus>, max_pop: usize, rng: ChaCha12Rng) -> Result<Self> {
        let patient = Patient::new(viruses, max_pop, rng)?;
        Ok(Self {
            patient,
            prescriptions: Vec::new(),
        })
    }

    /// Prescribe `drug`, doing nothing if it was already prescribed.
    ///
    /// Drugs are never removed once prescribed.
    pub fn add_prescription(&mut self, drug: &str) -> Result<()> {
        check_drug(drug).context("invalid prescription")?;
        if !self.prescriptions.iter().any(|given| given == drug) {
            self.prescriptions.push(drug.to_string());
        }
        Ok(())
    }

    /// Prescribed drugs in order of first prescription.
    pub fn prescriptions(&self) -> &[String] {
        &self.prescriptions
    }

    pub fn total_pop(&self) -> usize {
        self.patient.total_pop()
    }

    pub fn max_pop(&self) -> usize {
        self.patient.max_pop()
    }

    pub fn viruses(&self) -> &[ResistantVirus] {
        self.patient.viruses()
    }

    pub fn resist_pop(&self, drugs: &[String]) -> usize {
        self.patient.resist_pop(drugs)
    }

    /// Perform one step with every prescribed drug active.
    pub fn update(&mut self) -> usize {
        self.patient.step(&self.prescriptions)
    }
}

impl Host for DrugPatient {
    fn update(&mut self) -> usize {
        DrugPatient::update(self)
    }

    fn total_pop(&self) -> usize {
        DrugPatient::total_pop(self)
    }

    fn resist_pop(&self, drugs: &[String]) -> usize {
        DrugPatient::resist_pop(self, drugs)
    }

    fn add_prescription(&mut self, drug: &str) -> Result<()> {
        DrugPatient::add_prescription(self, drug)
    }
}
