use serde::Deserialize;
use std::{env, fs, ops::Range, path::PathBuf, process::Command};

#[derive(Deserialize)]
struct ChannelSummary {
    name: String,
    n_iter: usize,
    n_spike: usize,
}

#[derive(Deserialize)]
struct ReportRecord {
    rows: Range<usize>,
    summary: Vec<ChannelSummary>,
}

#[test]
fn basic_workflow() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("basic_workflow");

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");

    let config_path = test_dir.join("config.toml");
    let config_contents = String::new()
        + "[trt]\n"
        + "alg_clss = \"median\"\n"
        + "n_pts_wndw = [9, 21]\n"
        + "n_pts_slid = 1\n"
        + "thsh_std = 4.0\n"
        + "na_frac_max = 0.1\n"
        + "infl = 0.1\n"
        + "iter_max = 10\n"
        + "n_pts_grp = 3\n"
        + "na_trt = \"interpolate\"\n"
        + "\n"
        + "[cntl]\n"
        + "na_omit = true\n"
        + "prnt = true\n";

    fs::write(&config_path, config_contents).expect("failed to write config file");

    fn run_bin(args: &[&str]) {
        let bin = PathBuf::from(env!("CARGO_BIN_EXE_despike"));

        let output = Command::new(bin)
            .args(args)
            .output()
            .expect("failed to execute command");

        let stdout_str =
            std::str::from_utf8(&output.stdout).expect("failed to convert stdout to string");
        let stderr_str =
            std::str::from_utf8(&output.stderr).expect("failed to convert stderr to string");

        assert!(
            output.status.success(),
            "failed to run binary with {args:?}\nstdout:\n{stdout_str}\nstderr:\n{stderr_str}\n"
        );
    }

    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    run_bin(&["--work-dir", test_dir_str, "generate", "--seed", "11"]);
    run_bin(&[
        "--work-dir",
        test_dir_str,
        "generate",
        "--n-rows",
        "1000",
        "--n-chan",
        "2",
        "--seed",
        "12",
    ]);

    run_bin(&["--work-dir", test_dir_str, "run"]);

    for stem in ["synth-0000", "synth-0001"] {
        let out_dir = test_dir.join("output").join(stem);
        assert!(out_dir.join("despiked.csv").is_file());
        assert!(!out_dir.join("flags.csv").exists());

        let input = fs::read_to_string(test_dir.join("input").join(format!("{stem}.csv")))
            .expect("failed to read input table");
        let output =
            fs::read_to_string(out_dir.join("despiked.csv")).expect("failed to read output table");
        assert_eq!(input.lines().next(), output.lines().next());

        let bytes = fs::read(out_dir.join("report.msgpack")).expect("failed to read report");
        let record: ReportRecord =
            rmp_serde::from_slice(&bytes).expect("failed to deserialize report");
        assert_eq!(record.rows.len(), output.lines().count() - 1);
        assert!(record.summary.iter().all(|row| row.name.starts_with("chan-")));
        assert!(record.summary.iter().all(|row| row.n_iter >= 2));
        assert!(record.summary.iter().any(|row| row.n_spike > 0));
    }

    run_bin(&["--work-dir", test_dir_str, "run", "--verbose"]);

    let flags_path = test_dir.join("output").join("synth-0001").join("flags.csv");
    let flags = fs::read_to_string(flags_path).expect("failed to read flag matrix");
    assert_eq!(flags.lines().next(), Some("chan-00,chan-01"));
    assert!(flags.lines().skip(1).any(|line| line.contains('1')));

    run_bin(&["--work-dir", test_dir_str, "clean"]);
    assert!(!test_dir.join("output").exists());

    fs::remove_dir_all(&test_dir).ok();
}
