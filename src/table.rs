//! Column-major table of named channels and its CSV representation.

use anyhow::{Context, Result, bail};
use std::{fmt::Display, ops::Range, path::Path};

const NA_TOKENS: [&str; 4] = ["", "NA", "NaN", "nan"];

/// Named channels of equal length; missing samples are `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub names: Vec<String>,
    pub columns: Vec<Vec<f64>>,
}

impl Table {
    pub fn new(names: Vec<String>, columns: Vec<Vec<f64>>) -> Result<Self> {
        if names.len() != columns.len() {
            bail!("table has {} names but {} columns", names.len(), columns.len());
        }
        if let Some(first) = columns.first() {
            let n_rows = first.len();
            for (name, column) in names.iter().zip(&columns) {
                if column.len() != n_rows {
                    bail!("column {name:?} must have {n_rows} rows, but has {}", column.len());
                }
            }
        }
        Ok(Self { names, columns })
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    /// Restrict every column to a range of rows.
    pub fn slice_rows(&self, rows: Range<usize>) -> Self {
        Self {
            names: self.names.clone(),
            columns: self
                .columns
                .iter()
                .map(|column| column[rows.clone()].to_vec())
                .collect(),
        }
    }

    /// Read a table from a CSV file with a header row of channel names.
    pub fn read_csv<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(file)
            .with_context(|| format!("failed to open {file:?}"))?;

        let names: Vec<String> = reader
            .headers()
            .context("failed to read header row")?
            .iter()
            .map(str::to_string)
            .collect();

        let mut columns = vec![Vec::new(); names.len()];
        for (i_row, record) in reader.records().enumerate() {
            let record = record.with_context(|| format!("failed to read row {i_row}"))?;
            for (column, field) in columns.iter_mut().zip(record.iter()) {
                column.push(parse_field(field).with_context(|| format!("invalid row {i_row}"))?);
            }
        }

        Self::new(names, columns)
    }

    /// Write the table as CSV, with `NA` for missing samples.
    pub fn write_csv<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        write_columns(file, &self.names, &self.columns)
    }
}

fn parse_field(field: &str) -> Result<f64> {
    if NA_TOKENS.contains(&field) {
        return Ok(f64::NAN);
    }
    field
        .parse()
        .with_context(|| format!("failed to parse {field:?} as a number"))
}

/// Write equally long columns of values as CSV under a header row.
pub fn write_columns<P, T>(file: P, names: &[String], columns: &[Vec<T>]) -> Result<()>
where
    P: AsRef<Path>,
    T: Display + Copy + Into<f64>,
{
    let file = file.as_ref();
    let mut writer =
        csv::Writer::from_path(file).with_context(|| format!("failed to create {file:?}"))?;

    writer
        .write_record(names)
        .context("failed to write header row")?;

    let n_rows = columns.first().map_or(0, Vec::len);
    for i_row in 0..n_rows {
        let row = columns.iter().map(|column| {
            let val = column[i_row];
            if Into::<f64>::into(val).is_nan() {
                "NA".to_string()
            } else {
                val.to_string()
            }
        });
        writer
            .write_record(row)
            .with_context(|| format!("failed to write row {i_row}"))?;
    }

    writer.flush().context("failed to flush writer stream")?;

    Ok(())
}
