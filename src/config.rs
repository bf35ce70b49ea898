use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{
    fmt::Debug,
    fs,
    ops::{Bound, RangeBounds},
    path::Path,
};

/// Despiking configuration.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Detection treatment.
    pub trt: Trt,
    /// Run control.
    pub cntl: Cntl,
}

/// Location/scale statistic pair used over each window.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlgClss {
    /// Mean and standard deviation.
    Mean,
    /// Median and scaled median absolute deviation.
    Median,
}

/// Handling of missing samples between detection iterations.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NaTrt {
    /// Linearly interpolate missing samples before computing window statistics.
    Interpolate,
    /// Leave missing samples in place.
    LeaveAsMissing,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Trt {
    /// Algorithm class.
    pub alg_clss: AlgClss,
    /// Window widths, applied as successive passes.
    pub n_pts_wndw: Vec<usize>,
    /// Slide increment between computed window centers.
    pub n_pts_slid: usize,
    /// Detection threshold in sigma units.
    pub thsh_std: f64,
    /// Maximum fraction of missing samples for a window to be reliable.
    pub na_frac_max: f64,
    /// Threshold inflation per iteration.
    pub infl: f64,
    /// Maximum number of iterations per pass (unbounded if `None`).
    pub iter_max: Option<usize>,
    /// Minimum length of a run of flagged samples kept as signal (disabled if `None`).
    pub n_pts_grp: Option<usize>,
    /// Missing-value treatment.
    pub na_trt: NaTrt,
}

impl Default for Trt {
    fn default() -> Self {
        Self {
            alg_clss: AlgClss::Median,
            n_pts_wndw: vec![9],
            n_pts_slid: 1,
            thsh_std: 3.5,
            na_frac_max: 0.1,
            infl: 0.0,
            iter_max: None,
            n_pts_grp: None,
            na_trt: NaTrt::Interpolate,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Cntl {
    /// Trim leading and trailing rows where any channel is missing.
    pub na_omit: bool,
    /// Report per-channel progress.
    pub prnt: bool,
}

impl Default for Cntl {
    fn default() -> Self {
        Self {
            na_omit: true,
            prnt: true,
        }
    }
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be TOML-encoded. Missing fields take their default values.
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

    /// Parse and validate a [`Config`] from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let trt = &self.trt;

        if trt.n_pts_wndw.is_empty() {
            bail!("at least one window width is required");
        }
        for &width in &trt.n_pts_wndw {
            check_num(width, 1..).context("invalid window width")?;
            if trt.alg_clss == AlgClss::Median && width % 2 == 0 {
                bail!("window width must be odd for the median class, but is {width}");
            }
        }
        check_num(trt.n_pts_slid, 1..).context("invalid slide increment")?;

        check_num(trt.thsh_std, (Bound::Excluded(0.0), Bound::Unbounded))
            .context("invalid detection threshold")?;
        check_num(trt.na_frac_max, 0.0..=1.0).context("invalid maximum missing fraction")?;
        check_num(trt.infl, 0.0..).context("invalid inflation factor")?;

        if let Some(iter_max) = trt.iter_max {
            check_num(iter_max, 1..).context("invalid maximum number of iterations")?;
        }
        if let Some(n_pts_grp) = trt.n_pts_grp {
            check_num(n_pts_grp, 1..).context("invalid group length")?;
        }

        Ok(())
    }

    /// Check the parts of the configuration that depend on the series length.
    pub fn validate_for_len(&self, n_rows: usize) -> Result<()> {
        if let Some(n_pts_grp) = self.trt.n_pts_grp {
            check_num(n_pts_grp, 1..n_rows)
                .context("group length must be smaller than the series length")?;
        }
        Ok(())
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}
