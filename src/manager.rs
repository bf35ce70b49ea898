use crate::config::Config;
use crate::report::{Flags, despike};
use crate::synth::Generator;
use crate::table::{Table, write_columns};
use anyhow::{Context, Result};
use glob::glob;
use rmp_serde::encode;
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

pub struct Manager {
    work_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(work_dir: P) -> Result<Self> {
        let work_dir = work_dir.as_ref().to_path_buf();

        let cfg =
            Config::from_file(work_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { work_dir, cfg })
    }

    pub fn generate_input(&self, n_rows: usize, n_chan: usize, seed: Option<u64>) -> Result<()> {
        let input_dir = self.input_dir();
        fs::create_dir_all(&input_dir)
            .with_context(|| format!("failed to create {input_dir:?}"))?;

        let file_idx = self.input_files()?.len();
        let file = input_dir.join(format!("synth-{file_idx:04}.csv"));

        let table = Generator::new(n_rows, n_chan, seed)
            .context("failed to construct generator")?
            .generate()
            .context("failed to generate table")?;
        table
            .write_csv(&file)
            .with_context(|| format!("failed to write {file:?}"))?;
        log::info!("created {file:?}");

        Ok(())
    }

    pub fn despike_inputs(&self, verbose: bool) -> Result<()> {
        let files = self.input_files()?;
        if files.is_empty() {
            log::warn!("no input files in {:?}", self.input_dir());
        }

        for file in files {
            self.despike_file(&file, verbose)
                .with_context(|| format!("failed to despike {file:?}"))?;
        }

        Ok(())
    }

    fn despike_file(&self, file: &Path, verbose: bool) -> Result<()> {
        let table = Table::read_csv(file).context("failed to read table")?;
        log::info!(
            "read {file:?}: {} channels, {} rows",
            table.names.len(),
            table.n_rows()
        );

        let report = despike(&table, &self.cfg, verbose)?;

        let stem = file
            .file_stem()
            .and_then(|stem| stem.to_str())
            .context("file name is not valid UTF-8")?;
        let out_dir = self.output_dir().join(stem);
        fs::create_dir_all(&out_dir).with_context(|| format!("failed to create {out_dir:?}"))?;

        report
            .data
            .write_csv(out_dir.join("despiked.csv"))
            .context("failed to write despiked table")?;

        if let Flags::Matrix(matrix) = &report.flags {
            write_columns(out_dir.join("flags.csv"), &report.data.names, matrix)
                .context("failed to write flag matrix")?;
        }

        let report_file = out_dir.join("report.msgpack");
        let writer = File::create(&report_file)
            .with_context(|| format!("failed to create {report_file:?}"))?;
        let mut writer = BufWriter::new(writer);
        encode::write_named(&mut writer, &report.record()).context("failed to serialize report")?;
        writer.flush().context("failed to flush writer stream")?;

        log::info!("wrote {out_dir:?}");

        Ok(())
    }

    pub fn clean_outputs(&self) -> Result<()> {
        let output_dir = self.output_dir();
        if output_dir.exists() {
            fs::remove_dir_all(&output_dir)
                .with_context(|| format!("failed to remove {output_dir:?}"))?;
            log::info!("removed {output_dir:?}");
        }
        Ok(())
    }

    fn input_files(&self) -> Result<Vec<PathBuf>> {
        let pattern = self.input_dir().join("*.csv");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let mut files: Vec<PathBuf> = glob(pattern)
            .context("failed to glob input files")?
            .filter_map(Result::ok)
            .filter(|p| p.is_file())
            .collect();
        files.sort();
        Ok(files)
    }

    fn input_dir(&self) -> PathBuf {
        self.work_dir.join("input")
    }

    fn output_dir(&self) -> PathBuf {
        self.work_dir.join("output")
    }
}
