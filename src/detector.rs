use crate::config::{NaTrt, Trt};
use crate::group::filter_groups;
use crate::stats::interpolate;
use crate::window::{Estimator, Window, WindowStats};
use std::collections::BTreeSet;

/// Classified positions of one channel.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SpikeRecord {
    /// Detected spikes.
    pub fail: BTreeSet<usize>,
    /// Positions that could not be evaluated reliably.
    pub na: BTreeSet<usize>,
}

/// Result of despiking one channel.
#[derive(Debug)]
pub struct ChannelOutcome {
    /// Input series with retained spikes set missing.
    pub despiked: Vec<f64>,
    pub record: SpikeRecord,
    /// Number of detection iterations run over all passes.
    pub n_iter: usize,
}

impl ChannelOutcome {
    pub fn n_na(&self) -> usize {
        self.despiked.iter().filter(|val| val.is_nan()).count()
    }
}

/// Candidates of one iteration.
#[derive(Default)]
struct Candidates {
    fail: BTreeSet<usize>,
    na: BTreeSet<usize>,
}

impl Candidates {
    fn collect(&mut self, series: &[f64], stats: &WindowStats, thsh: f64, na_frac_max: f64) {
        for (pos, &val) in series.iter().enumerate() {
            let crit = (val - stats.location[pos]).abs() / stats.scale[pos];
            if crit.is_nan() || crit <= thsh {
                continue;
            }
            if stats.na_frac[pos] > na_frac_max {
                self.na.insert(pos);
            } else {
                self.fail.insert(pos);
            }
        }
    }
}

/// Detect spikes in a single channel.
///
/// Each configured window width runs its own loop: compute the window statistics, flag
/// positions whose normalized deviation exceeds the (inflating) threshold, set them missing
/// and repeat until nothing new is found or the iteration cap is hit.
pub fn despike_channel(series: &[f64], trt: &Trt, est: &dyn Estimator) -> ChannelOutcome {
    let len = series.len();
    let na_orig: BTreeSet<usize> = (0..len).filter(|&pos| series[pos].is_nan()).collect();

    if na_orig.len() == len {
        return ChannelOutcome {
            despiked: series.to_vec(),
            record: SpikeRecord {
                fail: BTreeSet::new(),
                na: na_orig,
            },
            n_iter: 0,
        };
    }

    let mut work = series.to_vec();
    let mut fail = BTreeSet::new();
    let mut unrel = BTreeSet::new();
    let mut n_iter = 0;

    for &width in &trt.n_pts_wndw {
        let window = Window::new(width, trt.n_pts_slid);
        let mut i_iter = 0;
        loop {
            i_iter += 1;
            n_iter += 1;

            let filled = match trt.na_trt {
                NaTrt::Interpolate => interpolate(&work),
                NaTrt::LeaveAsMissing => work.clone(),
            };
            let thsh = trt.thsh_std * (1.0 + (i_iter - 1) as f64 * trt.infl);

            let mut cand = Candidates::default();
            for stats in window.stats(&filled, est) {
                cand.collect(&filled, &stats, thsh, trt.na_frac_max);
            }

            let new: Vec<usize> = cand
                .fail
                .into_iter()
                .filter(|pos| !fail.contains(pos) && !na_orig.contains(pos))
                .collect();
            log::debug!(
                "width {width}, iteration {i_iter}: threshold {thsh:.3}, {} new spikes",
                new.len()
            );

            for &pos in &new {
                work[pos] = f64::NAN;
            }
            fail.extend(new.iter().copied());
            unrel.extend(cand.na);

            if new.is_empty() || trt.iter_max.is_some_and(|iter_max| i_iter >= iter_max) {
                break;
            }
        }
    }

    let fail = match trt.n_pts_grp {
        Some(n_pts_grp) => filter_groups(&fail, n_pts_grp, len),
        None => fail,
    };

    let mut despiked = series.to_vec();
    for &pos in &fail {
        despiked[pos] = f64::NAN;
    }

    let na = na_orig
        .union(&unrel)
        .copied()
        .filter(|pos| !fail.contains(pos))
        .collect();

    ChannelOutcome {
        despiked,
        record: SpikeRecord { fail, na },
        n_iter,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AlgClss;
    use crate::window::MeanStd;

    const NA: f64 = f64::NAN;

    fn trt(alg_clss: AlgClss, width: usize) -> Trt {
        Trt {
            alg_clss,
            n_pts_wndw: vec![width],
            n_pts_slid: 1,
            thsh_std: 3.0,
            na_frac_max: 0.1,
            infl: 0.0,
            iter_max: None,
            n_pts_grp: None,
            na_trt: NaTrt::Interpolate,
        }
    }

    fn run(series: &[f64], trt: &Trt) -> ChannelOutcome {
        despike_channel(series, trt, trt.alg_clss.estimator().as_ref())
    }

    fn set(positions: &[usize]) -> BTreeSet<usize> {
        positions.iter().copied().collect()
    }

    /// Unit-amplitude oscillation standing in for measurement noise.
    fn wave(len: usize) -> Vec<f64> {
        (0..len).map(|i| (i as f64 * 0.9).sin()).collect()
    }

    #[test]
    fn single_spike_median() {
        let series = [0.0, 0.0, 0.0, 0.0, 100.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let out = run(&series, &trt(AlgClss::Median, 5));
        assert_eq!(out.record.fail, set(&[4]));
        assert!(out.record.na.is_empty());
        assert!(out.despiked[4].is_nan());
        assert_eq!(out.n_na(), 1);
        assert_eq!(out.n_iter, 2);

        let mut trt = trt(AlgClss::Median, 5);
        trt.iter_max = Some(1);
        let out = run(&series, &trt);
        assert_eq!(out.record.fail, set(&[4]));
        assert_eq!(out.n_iter, 1);
    }

    #[test]
    fn single_spike_mean() {
        // With 5 samples the largest possible sample z-score is 4 / sqrt(5).
        let series = [0.0, 0.0, 0.0, 0.0, 100.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let mut trt = trt(AlgClss::Mean, 5);
        trt.thsh_std = 1.5;
        let out = run(&series, &trt);
        assert_eq!(out.record.fail, set(&[4]));
        assert!(out.record.na.is_empty());
        assert_eq!(out.despiked.iter().filter(|val| val.is_nan()).count(), 1);
    }

    #[test]
    fn flat_segments_after_large_level_step() {
        let mut series = vec![1e8 + 0.1; 50];
        series.extend([0.3; 50]);
        let mut trt = trt(AlgClss::Mean, 5);
        trt.iter_max = Some(1);
        let out = run(&series, &trt);
        assert!(out.record.fail.is_empty());
        assert!(out.record.na.is_empty());
    }

    #[test]
    fn all_missing_channel() {
        let series = [NA; 20];
        let out = run(&series, &trt(AlgClss::Median, 5));
        assert_eq!(out.n_iter, 0);
        assert!(out.record.fail.is_empty());
        assert_eq!(out.record.na, (0..20).collect());
    }

    #[test]
    fn window_wider_than_series() {
        let series = [1.0, 2.0, 50.0, 3.0];
        let out = run(&series, &trt(AlgClss::Median, 9));
        assert_eq!(out.n_iter, 1);
        assert!(out.record.fail.is_empty());
        assert!(out.record.na.is_empty());
    }

    #[test]
    fn original_missing_never_spike() {
        let mut series = vec![0.0; 30];
        series[10] = NA;
        series[20] = 80.0;
        let out = run(&series, &trt(AlgClss::Median, 7));
        assert_eq!(out.record.fail, set(&[20]));
        assert!(out.record.na.contains(&10));
        assert!(out.record.fail.is_disjoint(&out.record.na));
    }

    #[test]
    fn dense_missing_window_is_unreliable() {
        let mut series = vec![0.0; 30];
        for pos in [12, 13, 16, 17] {
            series[pos] = NA;
        }
        series[15] = 50.0;
        let mut trt = trt(AlgClss::Median, 7);
        trt.na_trt = NaTrt::LeaveAsMissing;
        let out = run(&series, &trt);
        assert!(out.record.fail.is_empty());
        assert_eq!(out.record.na, set(&[12, 13, 15, 16, 17]));
        assert_eq!(out.despiked[15], 50.0);
    }

    #[test]
    fn masked_spike_found_after_removal_depends_on_gap_treatment() {
        // The spike at 53 only stands out once the one at 50 is gone.
        let mut series = vec![0.0; 100];
        series[50] = 100.0;
        series[53] = 20.0;
        let mut trt = trt(AlgClss::Mean, 9);
        trt.thsh_std = 2.2;

        let out = run(&series, &trt);
        assert_eq!(out.record.fail, set(&[50, 53]));
        assert!(out.record.na.is_empty());
        assert!(out.despiked[53].is_nan());

        // Left missing, the removed spike raises the missing fraction around it.
        trt.na_trt = NaTrt::LeaveAsMissing;
        let out = run(&series, &trt);
        assert_eq!(out.record.fail, set(&[50]));
        assert_eq!(out.record.na, set(&[53]));
        assert_eq!(out.despiked[53], 20.0);
    }

    #[test]
    fn step_protected_by_group_filter() {
        let mut series = vec![0.0; 40];
        for val in &mut series[20..23] {
            *val = 100.0;
        }
        let mut trt = trt(AlgClss::Median, 9);

        let out = run(&series, &trt);
        assert_eq!(out.record.fail, set(&[20, 21, 22]));

        trt.n_pts_grp = Some(3);
        let out = run(&series, &trt);
        assert!(out.record.fail.is_empty());
        assert_eq!(&out.despiked[20..23], &[100.0, 100.0, 100.0]);
    }

    #[test]
    fn sparse_slide_detects_spikes() {
        let mut series: Vec<f64> = wave(200);
        for pos in [37, 101, 150] {
            series[pos] = 40.0;
        }
        let mut trt = trt(AlgClss::Median, 11);
        trt.thsh_std = 6.0;
        trt.n_pts_slid = 4;
        let out = run(&series, &trt);
        assert_eq!(out.record.fail, set(&[37, 101, 150]));
    }

    /// Two level segments seen through windows of width 3 computed at centers 1, 4 and 7.
    fn two_levels() -> Vec<f64> {
        vec![10.0, 11.0, 9.0, 0.0, 1.0, -1.0, 0.0, 1.0, -1.0]
    }

    #[test]
    fn sparse_assignments_are_united() {
        let series = two_levels();
        let mut trt = trt(AlgClss::Mean, 3);
        trt.n_pts_slid = 3;
        trt.iter_max = Some(1);

        let out = Window::new(3, 3).stats(&series, &MeanStd);
        let (forward, backward) = (&out[0], &out[1]);
        assert_eq!((forward.location[2], backward.location[2]), (10.0, 0.0));
        assert_eq!((forward.location[3], backward.location[3]), (10.0, 0.0));

        // 2 deviates only from the backward statistics, 3 only from the forward ones
        let out = run(&series, &trt);
        assert_eq!(out.record.fail, set(&[2, 3]));
        assert!(out.record.na.is_empty());
    }

    #[test]
    fn sparse_unreliable_positions_are_united() {
        let mut series = two_levels();
        series[5] = NA;
        let mut trt = trt(AlgClss::Mean, 3);
        trt.n_pts_slid = 3;
        trt.iter_max = Some(1);
        trt.na_trt = NaTrt::LeaveAsMissing;

        // 2 is a candidate only under the backward window, which misses a third of its samples
        let out = run(&series, &trt);
        assert_eq!(out.record.fail, set(&[3]));
        assert_eq!(out.record.na, set(&[2, 5]));
        assert_eq!(out.despiked[2], 9.0);
    }

    #[test]
    fn detection_is_a_fixed_point() {
        let mut series: Vec<f64> = wave(300);
        for pos in [15, 90, 91, 170, 260] {
            series[pos] += 30.0;
        }
        let trt = trt(AlgClss::Median, 9);
        let first = run(&series, &trt);
        assert!(!first.record.fail.is_empty());

        let second = run(&first.despiked, &trt);
        assert!(second.record.fail.is_empty());
    }

    #[test]
    fn spike_sets_grow_with_iterations() {
        let mut series: Vec<f64> = wave(300);
        for pos in (10..290).step_by(23) {
            series[pos] += 12.0 + pos as f64 / 10.0;
        }
        let mut trt = trt(AlgClss::Mean, 7);
        trt.thsh_std = 2.0;
        trt.infl = 0.2;

        let mut prev = BTreeSet::new();
        for iter_max in 1..6 {
            trt.iter_max = Some(iter_max);
            let out = run(&series, &trt);
            assert!(out.n_iter <= iter_max);
            assert!(prev.is_subset(&out.record.fail));
            prev = out.record.fail;
        }
    }

    #[test]
    fn successive_widths_run_in_order() {
        let mut series = vec![0.0; 60];
        series[30] = 100.0;
        let mut trt = trt(AlgClss::Median, 5);
        trt.n_pts_wndw = vec![5, 11];
        let out = run(&series, &trt);
        assert_eq!(out.record.fail, set(&[30]));
        // two iterations for the first width, one for the second
        assert_eq!(out.n_iter, 3);
    }
}
