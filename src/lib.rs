//! Stochastic simulation of a virus population inside a patient.
//!
//! The core lives in [`virus`] and [`patient`]: viruses are cleared or
//! reproduce at random once per step, resistant viruses only reproduce when
//! they resist every prescribed drug, and a patient applies these rules to
//! its whole population. The remaining modules drive batches of independent
//! patients from a configuration file and summarize their trajectories.

pub mod analysis;
pub mod config;
pub mod engine;
pub mod manager;
pub mod patient;
pub mod stats;
pub mod virus;

mod utils;
