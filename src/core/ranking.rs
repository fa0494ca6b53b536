use super::error::{SimError, SimResult};
use super::types::{Allocation, AllocationStats, DominanceMatrix};

/// Upper bound on `crop_count^field_count`. The dominance matrix holds the
/// square of this many cells.
pub const MAX_ALLOCATIONS: usize = 4096;

/// `crop_count^field_count`, rejected when it exceeds [`MAX_ALLOCATIONS`].
pub fn allocation_count(crop_count: usize, field_count: usize) -> SimResult<usize> {
    u32::try_from(field_count)
        .ok()
        .and_then(|exp| crop_count.checked_pow(exp))
        .filter(|&total| total <= MAX_ALLOCATIONS)
        .ok_or_else(|| {
            SimError::InvalidParameter(format!(
                "{crop_count}^{field_count} allocations exceed the limit of {MAX_ALLOCATIONS}"
            ))
        })
}

/// Every ordered assignment of `crop_count` crop types to `field_count`
/// fields, `crop_count^field_count` in total. The last field varies fastest.
pub fn enumerate_allocations(crop_count: usize, field_count: usize) -> SimResult<Vec<Allocation>> {
    if field_count == 0 {
        return Err(SimError::EmptyConfiguration(
            "cannot enumerate allocations over zero fields".to_string(),
        ));
    }
    if crop_count == 0 {
        return Err(SimError::EmptyConfiguration(
            "cannot enumerate allocations over zero crop types".to_string(),
        ));
    }

    let total = allocation_count(crop_count, field_count)?;

    let mut allocations = Vec::with_capacity(total);
    let mut digits = vec![0_usize; field_count];
    loop {
        allocations.push(Allocation(digits.clone()));

        let mut pos = field_count;
        loop {
            if pos == 0 {
                return Ok(allocations);
            }
            pos -= 1;
            digits[pos] += 1;
            if digits[pos] < crop_count {
                break;
            }
            digits[pos] = 0;
        }
    }
}

/// Sorts by mean income, highest first. Ties keep their original order.
pub fn rank_by_mean(stats: &mut [AllocationStats]) {
    stats.sort_by(|a, b| b.mean.total_cmp(&a.mean));
}

/// `a` dominates `b` when their intervals are disjoint and `a` has the
/// higher mean.
pub fn dominates(a: &AllocationStats, b: &AllocationStats) -> bool {
    let disjoint = a.ci_right < b.ci_left || a.ci_left > b.ci_right;
    disjoint && a.mean > b.mean
}

pub fn build_dominance_matrix(ranked: &[AllocationStats]) -> DominanceMatrix {
    let cells: Vec<Vec<u8>> = ranked
        .iter()
        .enumerate()
        .map(|(i, row)| {
            ranked
                .iter()
                .enumerate()
                .map(|(j, col)| u8::from(i != j && dominates(row, col)))
                .collect()
        })
        .collect();
    let row_counts = cells
        .iter()
        .map(|row| row.iter().map(|&c| c as usize).sum())
        .collect();

    DominanceMatrix { cells, row_counts }
}
