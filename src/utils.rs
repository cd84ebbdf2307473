use anyhow::{Result, bail};
use std::{fmt::Debug, ops::RangeBounds};

pub fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }

    Ok(())
}

/// Check that `prob` lies in `(0, 1]`, or in `[0, 1]` if `allow_zero` is set.
pub fn check_prob(prob: f64, allow_zero: bool) -> Result<()> {
    if prob.is_nan() {
        bail!("probability must be a number, but is NaN");
    }
    if !allow_zero && prob == 0.0 {
        bail!("probability must be in the range (0, 1], but is 0");
    }
    check_num(prob, 0.0..=1.0)
}

pub fn check_drug(drug: &str) -> Result<()> {
    if drug.trim().is_empty() {
        bail!("drug name must not be empty");
    }

    Ok(())
}
