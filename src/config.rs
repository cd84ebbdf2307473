use crate::utils::{check_drug, check_num, check_prob};
use crate::virus::Resistances;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Virus parameters.
///
/// Either both or none of `prob_mut` and `resistances` must be given.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VirusConfig {
    /// Maximum birth probability per step.
    pub max_birth_prob: f64,
    /// Clearance probability per step.
    pub clear_prob: f64,

    /// Probability of flipping each resistance flag in an offspring.
    pub prob_mut: Option<f64>,
    /// Initial resistance profile.
    pub resistances: Option<Resistances>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatientConfig {
    /// Initial number of viruses.
    pub n_viruses: usize,
    /// Maximum sustainable number of viruses.
    pub max_pop: usize,
}

/// Drug prescribed once `step` updates have been performed.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Treatment {
    pub drug: String,
    pub step: usize,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Number of updates per patient.
    pub n_steps: usize,
    /// Number of independent patients.
    pub n_patients: usize,
    /// Base seed, drawn from the OS if absent.
    pub seed: Option<u64>,
    /// Drug cocktails whose resistant population is recorded.
    #[serde(default)]
    pub tracked: Vec<Vec<String>>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Number of bins of the final population histogram.
    pub hist_bins: usize,
}

/// Experiment configuration.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub virus: VirusConfig,
    pub patient: PatientConfig,
    #[serde(default)]
    pub treatment: Vec<Treatment>,
    pub run: RunConfig,
    pub output: OutputConfig,
}

impl Config {
    /// Load a [`Config`] from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    /// Whether the viruses carry a resistance profile.
    pub fn is_resistant(&self) -> bool {
        self.virus.resistances.is_some()
    }

    fn validate(&self) -> Result<()> {
        let virus = &self.virus;
        check_prob(virus.max_birth_prob, true).context("invalid maximum birth probability")?;
        check_prob(virus.clear_prob, false).context("invalid clearance probability")?;
        match (virus.prob_mut, &virus.resistances) {
            (Some(prob_mut), Some(resistances)) => {
                check_prob(prob_mut, true).context("invalid mutation probability")?;
                for drug in resistances.keys() {
                    check_drug(drug).context("invalid resistance profile")?;
                }
            }
            (None, None) => {}
            _ => bail!("mutation probability and resistances must be given together"),
        }

        check_num(self.patient.n_viruses, 0..10_000_000)
            .context("invalid initial number of viruses")?;
        check_num(self.patient.max_pop, 1..10_000_000)
            .context("invalid maximum population")?;

        check_num(self.run.n_steps, 1..1_000_000).context("invalid number of steps")?;
        check_num(self.run.n_patients, 1..1_000_000).context("invalid number of patients")?;

        if !self.treatment.is_empty() && !self.is_resistant() {
            bail!("treatments require viruses with a resistance profile");
        }
        for (i_trt, treatment) in self.treatment.iter().enumerate() {
            self.check_known_drug(&treatment.drug)
                .with_context(|| format!("invalid treatment {i_trt}"))?;
            check_num(treatment.step, 0..self.run.n_steps)
                .with_context(|| format!("invalid step of treatment {i_trt}"))?;
        }
        for (i_ckt, cocktail) in self.run.tracked.iter().enumerate() {
            for drug in cocktail {
                self.check_known_drug(drug)
                    .with_context(|| format!("invalid tracked cocktail {i_ckt}"))?;
            }
        }

        check_num(self.output.hist_bins, 1..10_000).context("invalid number of histogram bins")?;

        Ok(())
    }

    fn check_known_drug(&self, drug: &str) -> Result<()> {
        check_drug(drug)?;
        let known = self
            .virus
            .resistances
            .as_ref()
            .is_some_and(|resistances| resistances.contains_key(drug));
        if !known {
            bail!("drug {drug:?} is missing from the resistance profile");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESISTANT: &str = r#"
[virus]
max_birth_prob = 0.1
clear_prob = 0.05
prob_mut = 0.005
resistances = { guttagonol = false, grimpex = false }

[patient]
n_viruses = 100
max_pop = 1000

[[treatment]]
drug = "guttagonol"
step = 150

[[treatment]]
drug = "grimpex"
step = 225

[run]
n_steps = 300
n_patients = 4
seed = 7
tracked = [["guttagonol"], ["guttagonol", "grimpex"]]

[output]
hist_bins = 10
"#;

    #[test]
    fn parses_resistant_config() {
        let cfg = Config::from_toml(RESISTANT).unwrap();
        assert!(cfg.is_resistant());
        assert_eq!(cfg.treatment.len(), 2);
        assert_eq!(cfg.treatment[1].drug, "grimpex");
        assert_eq!(cfg.run.seed, Some(7));
        assert_eq!(cfg.run.tracked[1].len(), 2);
        assert_eq!(cfg.virus.resistances.unwrap().get("grimpex"), Some(&false));
    }

    #[test]
    fn parses_simple_config() {
        let contents = r#"
[virus]
max_birth_prob = 0.1
clear_prob = 0.05

[patient]
n_viruses = 100
max_pop = 1000

[run]
n_steps = 300
n_patients = 1

[output]
hist_bins = 4
"#;
        let cfg = Config::from_toml(contents).unwrap();
        assert!(!cfg.is_resistant());
        assert!(cfg.treatment.is_empty());
        assert!(cfg.run.tracked.is_empty());
        assert_eq!(cfg.run.seed, None);
    }

    #[test]
    fn rejects_invalid_values() {
        let cases = [
            ("clear_prob = 0.05", "clear_prob = 0.0"),
            ("max_birth_prob = 0.1", "max_birth_prob = 1.5"),
            ("prob_mut = 0.005\n", ""),
            ("guttagonol = false", "guttagonol = 1"),
            ("max_pop = 1000", "max_pop = 0"),
            ("step = 225", "step = 300"),
            ("drug = \"grimpex\"", "drug = \"ganciclovir\""),
            ("[\"guttagonol\"]", "[\"\"]"),
            ("hist_bins = 10", "hist_bins = 0"),
            ("n_patients = 4", "n_patients = 4\nextra = 1"),
        ];
        for (from, to) in cases {
            let contents = RESISTANT.replacen(from, to, 1);
            assert!(
                Config::from_toml(&contents).is_err(),
                "accepted config with {to:?}"
            );
        }
    }

    #[test]
    fn rejects_treatment_of_simple_viruses() {
        let contents = RESISTANT
            .replacen("prob_mut = 0.005\n", "", 1)
            .replacen("resistances = { guttagonol = false, grimpex = false }\n", "", 1);
        assert!(Config::from_toml(&contents).is_err());
    }
}
