use log::warn;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::ForecastError;
use crate::windowing::WindowSample;

/// How window samples are assigned to train/validation/test partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitPolicy {
    /// Seeded random assignment by sample index.
    ///
    /// This is the compatibility policy: overlapping windows that share raw
    /// timestamps may land in different partitions, so evaluation metrics
    /// can be optimistic. The limitation is logged on every split.
    Random { seed: u64 },
    /// Earliest samples train, middle validates, latest tests. No window
    /// from a later period ever leaks into an earlier partition.
    Temporal,
}

/// Three disjoint groups of window samples.
#[derive(Debug, Clone)]
pub struct SplitSets {
    pub train: Vec<WindowSample>,
    pub validation: Vec<WindowSample>,
    pub test: Vec<WindowSample>,
}

/// Partition `samples` into train/validation/test.
///
/// `fraction` of the full set is carved out for testing, then the same
/// fraction of the remainder for validation. Every partition must end up
/// non-empty or the data is insufficient for the requested configuration.
pub fn split(
    samples: Vec<WindowSample>,
    fraction: f64,
    policy: SplitPolicy,
) -> Result<SplitSets, ForecastError> {
    debug_assert!(fraction > 0.0 && fraction < 1.0);

    let total = samples.len();
    let test_len = ((total as f64) * fraction).round() as usize;
    let remaining = total.saturating_sub(test_len);
    let val_len = ((remaining as f64) * fraction).round() as usize;
    let train_len = remaining.saturating_sub(val_len);

    if test_len == 0 || val_len == 0 || train_len == 0 {
        let sequence_length = samples.first().map_or(0, |s| s.input.nrows());
        return Err(ForecastError::InsufficientData {
            rows: total,
            sequence_length,
        });
    }

    let mut ordered = samples;
    match policy {
        SplitPolicy::Random { seed } => {
            warn!(
                "random sample split: overlapping windows may share raw timestamps \
                 across partitions; use SplitPolicy::Temporal for leak-free evaluation"
            );
            let mut rng = StdRng::seed_from_u64(seed);
            ordered.shuffle(&mut rng);
        }
        SplitPolicy::Temporal => {
            // Samples arrive in time order from the windower; keep them.
        }
    }

    // Order within `ordered`: train, then validation, then test. Under the
    // temporal policy this puts the latest windows in the test partition.
    let test = ordered.split_off(train_len + val_len);
    let validation = ordered.split_off(train_len);
    let train = ordered;

    Ok(SplitSets {
        train,
        validation,
        test,
    })
}
