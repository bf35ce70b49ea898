use crate::config::Config;
use crate::detector::{ChannelOutcome, despike_channel};
use crate::table::Table;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Flag value of a position that could not be evaluated.
pub const FLAG_NA: i8 = -1;
/// Flag value of a valid position.
pub const FLAG_OK: i8 = 0;
/// Flag value of a detected spike.
pub const FLAG_SPIKE: i8 = 1;

/// Per-channel summary row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSummary {
    pub name: String,
    pub n_iter: usize,
    pub n_spike: usize,
    pub n_na: usize,
}

/// Spike and unreliable positions of one channel (0-based input rows).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelFlags {
    pub name: String,
    pub fail: Vec<usize>,
    pub na: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Flags {
    /// Position lists per channel.
    Positions(Vec<ChannelFlags>),
    /// Column-major matrix of `FLAG_*` values, shaped like the despiked table.
    Matrix(Vec<Vec<i8>>),
}

/// Outcome of despiking a whole table.
#[derive(Debug)]
pub struct Report {
    /// Despiked table, restricted to `rows`.
    pub data: Table,
    /// Input rows covered by `data` and by a flag matrix.
    pub rows: Range<usize>,
    pub summary: Vec<ChannelSummary>,
    pub flags: Flags,
}

/// Serializable part of a [`Report`].
#[derive(Debug, Serialize)]
pub struct ReportRecord<'a> {
    pub rows: Range<usize>,
    pub summary: &'a [ChannelSummary],
    pub flags: &'a Flags,
}

impl Report {
    pub fn record(&self) -> ReportRecord<'_> {
        ReportRecord {
            rows: self.rows.clone(),
            summary: &self.summary,
            flags: &self.flags,
        }
    }
}

/// Despike every channel of a table independently and assemble the results.
///
/// `verbose` selects the flag matrix over the position lists.
pub fn despike(table: &Table, cfg: &Config, verbose: bool) -> Result<Report> {
    cfg.validate().context("invalid config")?;
    cfg.validate_for_len(table.n_rows())
        .context("invalid config for this table")?;
    if table.columns.is_empty() {
        bail!("table has no channels");
    }

    let est = cfg.trt.alg_clss.estimator();
    let n_rows = table.n_rows();

    let mut outcomes = Vec::with_capacity(table.columns.len());
    let mut summary = Vec::with_capacity(table.columns.len());
    for (name, column) in table.names.iter().zip(&table.columns) {
        let outcome = despike_channel(column, &cfg.trt, est.as_ref());
        if outcome.n_iter == 0 {
            log::warn!("channel {name:?} has no valid samples, nothing to evaluate");
        }

        let row = ChannelSummary {
            name: name.clone(),
            n_iter: outcome.n_iter,
            n_spike: outcome.record.fail.len(),
            n_na: outcome.n_na(),
        };
        if cfg.cntl.prnt {
            log::info!("{row:?}");
        } else {
            log::debug!("{row:?}");
        }

        summary.push(row);
        outcomes.push(outcome);
    }

    let columns: Vec<Vec<f64>> = outcomes
        .iter()
        .map(|outcome| outcome.despiked.clone())
        .collect();

    let rows = if cfg.cntl.na_omit {
        complete_rows(&columns).context("failed to trim incomplete rows")?
    } else {
        0..n_rows
    };

    let flags = if verbose {
        Flags::Matrix(
            outcomes
                .iter()
                .map(|outcome| flag_column(outcome, n_rows)[rows.clone()].to_vec())
                .collect(),
        )
    } else {
        Flags::Positions(
            table
                .names
                .iter()
                .zip(&outcomes)
                .map(|(name, outcome)| ChannelFlags {
                    name: name.clone(),
                    fail: outcome.record.fail.iter().copied().collect(),
                    na: outcome.record.na.iter().copied().collect(),
                })
                .collect(),
        )
    };

    let data = Table::new(table.names.clone(), columns)?.slice_rows(rows.clone());

    Ok(Report {
        data,
        rows,
        summary,
        flags,
    })
}

fn flag_column(outcome: &ChannelOutcome, n_rows: usize) -> Vec<i8> {
    let mut flags = vec![FLAG_OK; n_rows];
    for &pos in &outcome.record.na {
        flags[pos] = FLAG_NA;
    }
    for &pos in &outcome.record.fail {
        flags[pos] = FLAG_SPIKE;
    }
    flags
}

/// First to last row (inclusive) at which every channel has a value.
fn complete_rows(columns: &[Vec<f64>]) -> Result<Range<usize>> {
    let n_rows = columns.first().map_or(0, Vec::len);
    let is_complete = |i_row: usize| columns.iter().all(|column| !column[i_row].is_nan());

    let Some(first) = (0..n_rows).find(|&i_row| is_complete(i_row)) else {
        bail!("no row has a value in every channel");
    };
    let last = (0..n_rows)
        .rev()
        .find(|&i_row| is_complete(i_row))
        .unwrap_or(first);

    Ok(first..last + 1)
}
