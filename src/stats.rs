//! Missing-aware statistics primitives.
//!
//! Missing samples are represented by `NaN` and are skipped by every function here.
//! A sequence with no usable value yields `NaN`.

/// Factor converting a raw MAD into a Gaussian-equivalent standard deviation.
pub const MAD_SCALE: f64 = 1.4826;

pub struct Accumulator {
    n_vals: usize,
    mean: f64,
    diff_2_sum: f64,
}

#[derive(Debug)]
pub struct AccumulatorReport {
    pub mean: f64,
    pub std_dev: f64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self {
            n_vals: 0,
            mean: 0.0,
            diff_2_sum: 0.0,
        }
    }

    pub fn add(&mut self, val: f64) {
        self.n_vals += 1;

        let diff_a = val - self.mean;
        self.mean += diff_a / self.n_vals as f64;

        let diff_b = val - self.mean;
        self.diff_2_sum += diff_a * diff_b;
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

fn accumulate(vals: &[f64]) -> AccumulatorReport {
    let mut acc = Accumulator::new();
    vals.iter()
        .filter(|val| !val.is_nan())
        .for_each(|&val| acc.add(val));
    acc.report()
}

pub fn mean(vals: &[f64]) -> f64 {
    accumulate(vals).mean
}

/// Sample standard deviation (`n - 1` denominator).
pub fn std_dev(vals: &[f64]) -> f64 {
    accumulate(vals).std_dev
}

pub fn median(vals: &[f64]) -> f64 {
    let mut sorted: Vec<f64> = vals.iter().copied().filter(|val| !val.is_nan()).collect();
    if sorted.is_empty() {
        return f64::NAN;
    }
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Median absolute deviation from the median, without any scale correction.
pub fn mad(vals: &[f64]) -> f64 {
    let med = median(vals);
    if med.is_nan() {
        return f64::NAN;
    }
    let abs_dev: Vec<f64> = vals
        .iter()
        .filter(|val| !val.is_nan())
        .map(|val| (val - med).abs())
        .collect();
    median(&abs_dev)
}

/// Linearly interpolate every missing sample between its nearest non-missing neighbors.
///
/// Samples before the first or after the last non-missing value are not extrapolated
/// and stay missing.
pub fn interpolate(vals: &[f64]) -> Vec<f64> {
    let mut out = vals.to_vec();
    let mut prev: Option<usize> = None;
    for (idx, &val) in vals.iter().enumerate() {
        if val.is_nan() {
            continue;
        }
        if let Some(i_prev) = prev {
            let gap = idx - i_prev;
            if gap > 1 {
                let slope = (val - vals[i_prev]) / gap as f64;
                for (step, ele) in out[i_prev + 1..idx].iter_mut().enumerate() {
                    *ele = vals[i_prev] + slope * (step + 1) as f64;
                }
            }
        }
        prev = Some(idx);
    }
    out
}
