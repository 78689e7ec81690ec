/// Locates `x` on the strictly increasing grid `xp`.
///
/// Returns `(i, w)` with `x = (1 - w)·xp[i] + w·xp[i + 1]`, or `None` outside `[xp[0], xp[n-1]]`.
/// A point exactly on the last sample maps to `(n - 1, 0.0)`.
pub(crate) fn bracket(xp: &[f64], x: f64) -> Option<(usize, f64)> {
    let (first, last) = (*xp.first()?, *xp.last()?);
    if x.is_nan() || x < first || x > last {
        return None;
    }
    let n = xp.len();
    // Index of the first sample strictly greater than x.
    let upper = xp.partition_point(|&t| t <= x);
    if upper == 0 {
        return None;
    }
    let i = upper - 1;
    if i == n - 1 || xp[i] == x {
        return Some((i, 0.0));
    }
    Some((i, (x - xp[i]) / (xp[i + 1] - xp[i])))
}

/// Linear interpolation of `(xp, fp)` at a single point.
///
/// `left` and `right` are returned outside the sampled domain. Values at exact sample times are
/// returned as-is even when a neighbouring sample is NaN.
pub fn interpolate_at(x: f64, xp: &[f64], fp: &[f64], left: f64, right: f64) -> f64 {
    match (xp.first(), xp.last()) {
        (Some(&first), _) if x < first => return left,
        (_, Some(&last)) if x > last => return right,
        (None, _) => return f64::NAN,
        _ => {}
    }
    match bracket(xp, x) {
        Some((i, w)) if w == 0.0 => fp[i],
        Some((i, w)) => fp[i] + w * (fp[i + 1] - fp[i]),
        None => f64::NAN,
    }
}

/// Resamples `(xp, fp)` onto `x`. See [`interpolate_at`].
pub fn interpolate(x: &[f64], xp: &[f64], fp: &[f64], left: f64, right: f64) -> Vec<f64> {
    x.iter()
        .map(|&t| interpolate_at(t, xp, fp, left, right))
        .collect()
}
