//! Repetition: "N copies of die D", either summed or keep-selected.

use tracing::{debug, warn};

use crate::core::config::EvalConfig;
use crate::core::distribution::{Accumulator, Distribution, DistributionError};
use crate::schema::face::Face;
use crate::schema::keep::KeepSpec;

/// Sum of `count` independent copies of `die`, by binary doubling.
///
/// Zero copies sum to a certain 0.
pub fn sum_of_copies(count: u32, die: &Distribution) -> Distribution {
    match count {
        0 => Distribution::scalar(0),
        1 => die.without_annotation(),
        _ => {
            let half = sum_of_copies(count / 2, die);
            let doubled = half.add(&half);
            if count % 2 == 1 {
                doubled.add(die)
            } else {
                doubled
            }
        }
    }
}

/// Keep the best `keep.count` of `count` independent copies of `die`, summed.
///
/// Walks the full product of the die's numeric faces, so cost is
/// `faces^count`; anything above `max_combinations` is refused up front.
pub fn keep_of_copies(
    count: u32,
    die: &Distribution,
    keep: KeepSpec,
    max_combinations: u64,
) -> Result<Distribution, DistributionError> {
    let mut faces: Vec<(i64, f64)> = die
        .iter()
        .filter_map(|(face, weight)| face.value().map(|v| (v, weight)))
        .collect();
    faces.sort_by_key(|(v, _)| *v);

    let combinations = (faces.len() as u64).checked_pow(count);
    if combinations.map_or(true, |c| c > max_combinations) {
        return Err(DistributionError::LimitExceeded {
            what: "keep combinations",
            limit: max_combinations,
        });
    }

    let mut acc = Accumulator::new();
    enumerate_kept(&faces, count, keep, &[], 1.0, &mut acc);
    Ok(acc.finish())
}

fn enumerate_kept(
    faces: &[(i64, f64)],
    remaining: u32,
    keep: KeepSpec,
    kept: &[i64],
    weight: f64,
    acc: &mut Accumulator,
) {
    if remaining == 0 {
        acc.add(Face::Value(kept.iter().sum()), weight);
        return;
    }
    for &(value, face_weight) in faces {
        let next = select(kept, value, keep);
        enumerate_kept(faces, remaining - 1, keep, &next, weight * face_weight, acc);
    }
}

/// A new selection with `value` inserted in keep order, trimmed to `keep.count`.
fn select(kept: &[i64], value: i64, keep: KeepSpec) -> Vec<i64> {
    let at = kept
        .iter()
        .position(|&incumbent| keep.prefers(value, incumbent))
        .unwrap_or(kept.len());
    let mut next = Vec::with_capacity(kept.len() + 1);
    next.extend_from_slice(&kept[..at]);
    next.push(value);
    next.extend_from_slice(&kept[at..]);
    next.truncate(keep.count as usize);
    next
}

/// "`counts` copies of `die`", where the count is itself a distribution.
///
/// Each numeric count `v` (weight `w`) is resolved on its own, with the keep
/// selector if `die` carries one. Branch `v` is merged at scale
/// `w * P / total_v`, where `P` is the product of all branch totals. A fixed
/// count therefore yields exactly the weights of the direct evaluation.
pub fn repeat(
    counts: &Distribution,
    die: &Distribution,
    config: &EvalConfig,
) -> Result<Distribution, DistributionError> {
    let mut entries: Vec<(i64, f64)> = counts
        .iter()
        .filter_map(|(face, weight)| face.value().map(|v| (v, weight)))
        .collect();
    entries.sort_by_key(|(v, _)| *v);

    let keep = die.keep();
    let mut branches = Vec::with_capacity(entries.len());
    let mut factor = 1.0_f64;

    for (count, weight) in entries {
        if count < 0 {
            return Err(DistributionError::NegativeRepeat(count));
        }
        let count = u32::try_from(count)
            .ok()
            .filter(|c| *c <= config.max_repeat)
            .ok_or(DistributionError::LimitExceeded {
                what: "dice count",
                limit: u64::from(config.max_repeat),
            })?;

        debug!(count, faces = die.len(), keep = ?keep, "resolving repeated dice");
        let branch = match keep {
            Some(spec) => keep_of_copies(count, die, spec, config.max_keep_combinations)?,
            None => sum_of_copies(count, die),
        };

        let total = branch.total();
        if total > 0.0 {
            factor *= total;
        }
        branches.push((weight, total, branch));
    }

    if !factor.is_finite() {
        warn!("repeat normalization factor overflowed; merging branches unscaled");
        factor = 1.0;
    }

    let mut acc = Accumulator::new();
    for (weight, total, branch) in &branches {
        if *total > 0.0 {
            acc.absorb(branch, weight * (factor / total));
        }
    }
    Ok(acc.finish())
}
