use serde::{Deserialize, Serialize};

/// Running mean and variance of a stream of values (Welford's algorithm).
#[derive(Default)]
pub struct Accumulator {
    n_vals: usize,
    mean: f64,
    diff_2_sum: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccumulatorReport {
    pub mean: f64,
    pub std_dev: f64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, val: f64) {
        self.n_vals += 1;

        let diff_a = val - self.mean;
        self.mean += diff_a / self.n_vals as f64;

        let diff_b = val - self.mean;
        self.diff_2_sum += diff_a * diff_b;
    }

    pub fn n_vals(&self) -> usize {
        self.n_vals
    }

    pub fn report(&self) -> AccumulatorReport {
        AccumulatorReport {
            mean: if self.n_vals > 0 { self.mean } else { f64::NAN },
            std_dev: if self.n_vals > 1 {
                (self.diff_2_sum / (self.n_vals as f64 - 1.0)).sqrt()
            } else {
                f64::NAN
            },
        }
    }
}

/// Equal-width histogram over `[lower, upper]`.
///
/// Values outside the range are counted in the nearest edge bin.
pub struct Histogram {
    lower: f64,
    width: f64,
    counts: Vec<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistogramReport {
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

impl Histogram {
    pub fn new(n_bins: usize, lower: f64, upper: f64) -> Self {
        let n_bins = n_bins.max(1);
        Self {
            lower,
            width: (upper - lower) / n_bins as f64,
            counts: vec![0; n_bins],
        }
    }

    pub fn add(&mut self, val: f64) {
        let n_bins = self.counts.len();
        let i_bin = if self.width > 0.0 {
            ((val - self.lower) / self.width).floor().max(0.0) as usize
        } else {
            0
        };
        self.counts[i_bin.min(n_bins - 1)] += 1;
    }

    pub fn report(&self) -> HistogramReport {
        let edges = (0..=self.counts.len())
            .map(|i_edge| self.lower + i_edge as f64 * self.width)
            .collect();
        HistogramReport {
            edges,
            counts: self.counts.clone(),
        }
    }
}
