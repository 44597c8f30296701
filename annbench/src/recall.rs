//! Set-overlap recall.
//!
//! Rank is ignored: a returned id either is one of the expected neighbors or it is
//! not. The transmitter already bounds `returned` to the requested top-k.

use std::collections::HashSet;

use crate::query::ResultId;

/// `|returned ∩ expected| / |expected|`, or `None` when there is no ground truth.
///
/// Duplicates on either side count once.
pub fn score(returned: &[ResultId], expected: &[ResultId]) -> Option<f64> {
    let expected: HashSet<ResultId> = expected.iter().copied().collect();
    if expected.is_empty() {
        return None;
    }
    let returned: HashSet<ResultId> = returned.iter().copied().collect();
    let hits = returned.intersection(&expected).count();
    Some(hits as f64 / expected.len() as f64)
}
