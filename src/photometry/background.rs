//! Robust image statistics.
//!
//! The flux uncertainty needs a per-pixel noise level that is not inflated by
//! the stars themselves. [`sigma_clipped_stats`] iteratively rejects pixels
//! further than `sigma × std` from the median, then reports the statistics
//! of the surviving pixels.

/// Statistics of the pixels surviving sigma clipping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClippedStats {
    pub mean: f64,
    pub median: f64,
    /// Population standard deviation of the survivors
    pub std: f64,
    /// Number of surviving pixels
    pub count: usize,
}

fn median_in_place(values: &mut [f64]) -> f64 {
    let n = values.len();
    let mid = n / 2;
    let (_, upper, _) = values.select_nth_unstable_by(mid, f64::total_cmp);
    let upper = *upper;
    if n % 2 == 1 {
        upper
    } else {
        // the lower half now holds every value below `upper`
        let lower = values[..mid]
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        0.5 * (lower + upper)
    }
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// Sigma-clipped statistics of a set of pixel values.
///
/// Arguments
/// -----------------
/// * `values`: pixel values; non-finite values are ignored.
/// * `sigma`: clipping threshold in units of the current standard deviation.
/// * `max_iters`: maximum number of clipping passes (stops earlier once a pass rejects nothing).
///
/// Return
/// ----------
/// * `None` when no finite value is available.
pub fn sigma_clipped_stats<I>(values: I, sigma: f64, max_iters: usize) -> Option<ClippedStats>
where
    I: IntoIterator<Item = f64>,
{
    let mut kept: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
    if kept.is_empty() {
        return None;
    }

    for _ in 0..max_iters {
        let median = median_in_place(&mut kept);
        let (_, std) = mean_std(&kept);
        let before = kept.len();
        kept.retain(|v| (v - median).abs() <= sigma * std);
        if kept.len() == before || kept.is_empty() {
            break;
        }
    }
    if kept.is_empty() {
        return None;
    }

    let (mean, std) = mean_std(&kept);
    let median = median_in_place(&mut kept);
    Some(ClippedStats {
        mean,
        median,
        std,
        count: kept.len(),
    })
}
