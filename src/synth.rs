use crate::table::Table;
use anyhow::{Context, Result};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rand_distr::{Bernoulli, Normal, Uniform};

/// Probability of a sample being a spike.
const PROB_SPIKE: f64 = 0.01;
/// Probability of a sample being missing.
const PROB_NA: f64 = 0.005;
/// Spike amplitude range in noise standard deviations.
const SPIKE_AMP: (f64, f64) = (8.0, 15.0);

/// Synthetic measurement channels with known artifacts.
pub struct Generator {
    n_rows: usize,
    n_chan: usize,
    rng: ChaCha12Rng,
}

impl Generator {
    /// Create a generator, seeded for reproducibility or from the OS.
    pub fn new(n_rows: usize, n_chan: usize, seed: Option<u64>) -> Result<Self> {
        let rng = match seed {
            Some(seed) => ChaCha12Rng::seed_from_u64(seed),
            None => ChaCha12Rng::try_from_os_rng()?,
        };
        Ok(Self {
            n_rows,
            n_chan,
            rng,
        })
    }

    /// Generate a table of `n_chan` channels named `chan-NN`.
    ///
    /// Every channel is an offset plus slow drift and Gaussian noise, with a persistent
    /// level step at mid-series, isolated spikes and scattered missing samples.
    pub fn generate(&mut self) -> Result<Table> {
        let mut names = Vec::with_capacity(self.n_chan);
        let mut columns = Vec::with_capacity(self.n_chan);
        for i_chan in 0..self.n_chan {
            names.push(format!("chan-{i_chan:02}"));
            columns.push(
                self.generate_channel()
                    .with_context(|| format!("failed to generate channel {i_chan}"))?,
            );
        }
        Table::new(names, columns)
    }

    fn generate_channel(&mut self) -> Result<Vec<f64>> {
        let offset = Uniform::new(-100.0, 100.0)?.sample(&mut self.rng);
        let std_dev = Uniform::new(0.1, 2.0)?.sample(&mut self.rng);
        let drift_amp = 5.0 * std_dev;
        let step = Uniform::new(-20.0, 20.0)?.sample(&mut self.rng) * std_dev;

        let noise_dist = Normal::new(0.0, std_dev)?;
        let spike_dist = Bernoulli::new(PROB_SPIKE)?;
        let na_dist = Bernoulli::new(PROB_NA)?;
        let amp_dist = Uniform::new(SPIKE_AMP.0, SPIKE_AMP.1)?;

        let n_rows = self.n_rows.max(1) as f64;
        let mut column = Vec::with_capacity(self.n_rows);
        for i_row in 0..self.n_rows {
            let phase = 2.0 * std::f64::consts::PI * i_row as f64 / n_rows;
            let mut val = offset + drift_amp * phase.sin() + noise_dist.sample(&mut self.rng);
            if 2 * i_row >= self.n_rows {
                val += step;
            }
            if spike_dist.sample(&mut self.rng) {
                let sign = if self.rng.random::<bool>() { 1.0 } else { -1.0 };
                val += sign * amp_dist.sample(&mut self.rng) * std_dev;
            }
            if na_dist.sample(&mut self.rng) {
                val = f64::NAN;
            }
            column.push(val);
        }

        Ok(column)
    }
}
