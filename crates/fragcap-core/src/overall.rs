// Combining aggregation results of several runs (days, stages, tournaments)
// into one overall result.
//
// Merge works on series, not on summaries: units are concatenated and
// counters summed, and summaries are recomputed afterwards. Team is
// last-value-wins, so later operands take precedence.

use std::collections::BTreeMap;

use crate::aggregate::{PlayerSeries, RoleBuckets};

/// Merge `right` into `left`.
///
/// A player appearing under two roles (a role change between tournaments)
/// keeps a separate series in each bucket.
pub fn merge_overalls(mut left: RoleBuckets, right: RoleBuckets) -> RoleBuckets {
    for (role, bucket) in right {
        let target = left.entry(role).or_default();
        for (name, series) in bucket {
            let merged = match target.remove(&name) {
                Some(existing) => existing.combine(series),
                None => series,
            };
            target.insert(name, merged);
        }
    }
    left
}

/// Fold any number of results in order.
pub fn merge_all(results: impl IntoIterator<Item = RoleBuckets>) -> RoleBuckets {
    results.into_iter().fold(BTreeMap::new(), merge_overalls)
}

/// Total unit count per player across all roles.
pub fn unit_counts(buckets: &RoleBuckets) -> BTreeMap<&str, usize> {
    let mut counts = BTreeMap::new();
    for bucket in buckets.values() {
        for (name, series) in bucket {
            *counts.entry(name.as_str()).or_insert(0) += series.unit_count();
        }
    }
    counts
}

/// A series is carried over only if it has units.
pub fn retain_played(buckets: &mut RoleBuckets) {
    for bucket in buckets.values_mut() {
        bucket.retain(|_, s: &mut PlayerSeries| !s.is_empty());
    }
}
