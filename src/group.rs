use std::collections::BTreeSet;

/// Remove runs of at least `n_pts_grp` consecutive flagged positions from `fail`.
///
/// Real spikes are isolated, so such runs are treated as genuine transitions.
/// Every position belonging to an adjacent flagged pair is marked as neighbored, and every
/// window of `n_pts_grp` positions that are all neighbored is un-flagged.
pub fn filter_groups(fail: &BTreeSet<usize>, n_pts_grp: usize, len: usize) -> BTreeSet<usize> {
    if n_pts_grp == 0 || n_pts_grp > len {
        return fail.clone();
    }

    let mut nbrd = vec![false; len];
    let flagged: Vec<usize> = fail.iter().copied().filter(|&pos| pos < len).collect();
    for pair in flagged.windows(2) {
        if pair[1] - pair[0] == 1 {
            nbrd[pair[0]] = true;
            nbrd[pair[1]] = true;
        }
    }

    let mut grouped = vec![false; len];
    for (start, window) in nbrd.windows(n_pts_grp).enumerate() {
        if window.iter().all(|&is_nbrd| is_nbrd) {
            grouped[start..start + n_pts_grp]
                .iter_mut()
                .for_each(|ele| *ele = true);
        }
    }

    fail.iter().copied().filter(|&pos| !grouped[pos]).collect()
}
