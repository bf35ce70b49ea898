//! Centered rolling location, scale and missing-fraction statistics.

use crate::config::AlgClss;
use crate::stats::{self, MAD_SCALE};

/// Location/scale pair evaluated over one window.
pub trait Estimator {
    /// Central value of the non-missing samples of a window.
    fn location(&self, window: &[f64]) -> f64;

    /// Spread of the non-missing samples of a window, in standard deviation units.
    fn scale(&self, window: &[f64]) -> f64;
}

/// Sample mean and standard deviation.
pub struct MeanStd;

impl Estimator for MeanStd {
    fn location(&self, window: &[f64]) -> f64 {
        stats::mean(window)
    }

    fn scale(&self, window: &[f64]) -> f64 {
        stats::std_dev(window)
    }
}

/// Median and small-sample corrected MAD scaled to a Gaussian sigma.
pub struct MedianMad;

impl Estimator for MedianMad {
    fn location(&self, window: &[f64]) -> f64 {
        stats::median(window)
    }

    fn scale(&self, window: &[f64]) -> f64 {
        let w = window.len() as f64;
        MAD_SCALE * stats::mad(window) * w / (w - 0.8)
    }
}

impl AlgClss {
    pub fn estimator(self) -> Box<dyn Estimator> {
        match self {
            AlgClss::Mean => Box::new(MeanStd),
            AlgClss::Median => Box::new(MedianMad),
        }
    }
}

/// Window statistics aligned with the series, `NaN` where undefined.
#[derive(Debug, Clone)]
pub struct WindowStats {
    pub location: Vec<f64>,
    pub scale: Vec<f64>,
    pub na_frac: Vec<f64>,
}

impl WindowStats {
    fn undefined(len: usize) -> Self {
        Self {
            location: vec![f64::NAN; len],
            scale: vec![f64::NAN; len],
            na_frac: vec![f64::NAN; len],
        }
    }

    fn copy_from(&mut self, dst: usize, src: usize) {
        self.location[dst] = self.location[src];
        self.scale[dst] = self.scale[src];
        self.na_frac[dst] = self.na_frac[src];
    }
}

/// Rolling window of a fixed width evaluated every `slide` samples.
///
/// The window around position `i` spans `[i - width / 2, i + (width + 1) / 2 - 1]`.
pub struct Window {
    width: usize,
    slide: usize,
}

impl Window {
    pub fn new(width: usize, slide: usize) -> Self {
        Self { width, slide }
    }

    /// Range of positions that have a full window, if any.
    fn centers(&self, len: usize) -> Option<(usize, usize)> {
        if self.width == 0 || self.width > len {
            return None;
        }
        let half_lo = self.width / 2;
        let half_hi = self.width - half_lo - 1;
        Some((half_lo, len - 1 - half_hi))
    }

    /// Compute window statistics over `series`.
    ///
    /// Missing fractions count the samples still missing in `series`, so in `interpolate` mode
    /// only the unfilled edges of the gap-filled series lower reliability.
    /// Returns one assignment when `slide == 1`. Otherwise statistics exist only at every
    /// `slide`-th center and two assignments are returned: the computed values forward filled,
    /// then backward filled, over the positions that have a full window.
    pub fn stats(&self, series: &[f64], est: &dyn Estimator) -> Vec<WindowStats> {
        let len = series.len();
        let mut sparse = WindowStats::undefined(len);

        let Some((first, last)) = self.centers(len) else {
            return vec![sparse];
        };
        let half_lo = self.width / 2;
        let computed: Vec<usize> = (first..=last).step_by(self.slide).collect();

        for &center in &computed {
            let start = center - half_lo;
            let window = &series[start..start + self.width];
            let n_na = window.iter().filter(|val| val.is_nan()).count();
            sparse.na_frac[center] = n_na as f64 / self.width as f64;

            if n_na == self.width {
                continue;
            }
            sparse.location[center] = est.location(window);
            sparse.scale[center] = est.scale(window);
        }

        if self.slide == 1 {
            return vec![sparse];
        }

        let mut forward = sparse.clone();
        for pair in computed.windows(2) {
            for pos in pair[0] + 1..pair[1] {
                forward.copy_from(pos, pair[0]);
            }
        }
        if let Some(&tail) = computed.last() {
            for pos in tail + 1..=last {
                forward.copy_from(pos, tail);
            }
        }

        let mut backward = sparse;
        for pair in computed.windows(2) {
            for pos in pair[0] + 1..pair[1] {
                backward.copy_from(pos, pair[1]);
            }
        }

        vec![forward, backward]
    }
}
