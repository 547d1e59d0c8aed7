//! Density checks over raw rank values.

use crate::model::member::{ContainerId, Rank};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Result of checking one container against `ranks == 0..n`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DensityReport {
    pub container_id: ContainerId,
    pub member_count: u32,
    /// Ranks in `0..n` that no member holds.
    pub missing: Vec<Rank>,
    /// Ranks held by more than one member.
    pub duplicated: Vec<i64>,
    /// Ranks outside `0..n` (negative or too large).
    pub out_of_range: Vec<i64>,
}

impl DensityReport {
    pub fn is_dense(&self) -> bool {
        self.missing.is_empty() && self.duplicated.is_empty() && self.out_of_range.is_empty()
    }
}

/// Builds a report from the raw persisted (or cached) ranks of one container.
pub fn density_report(container_id: ContainerId, ranks: &[i64]) -> DensityReport {
    let member_count = ranks.len() as u32;
    let mut seen: BTreeMap<i64, u32> = BTreeMap::new();
    for rank in ranks {
        *seen.entry(*rank).or_default() += 1;
    }

    let missing = (0..member_count)
        .filter(|rank| !seen.contains_key(&i64::from(*rank)))
        .collect();
    let duplicated = seen
        .iter()
        .filter(|(_, count)| **count > 1)
        .map(|(rank, _)| *rank)
        .collect();
    let out_of_range = seen
        .keys()
        .copied()
        .filter(|rank| *rank < 0 || *rank >= i64::from(member_count))
        .collect();

    DensityReport {
        container_id,
        member_count,
        missing,
        duplicated,
        out_of_range,
    }
}

#[cfg(test)]
mod tests {
    use super::density_report;
    use uuid::Uuid;

    #[test]
    fn dense_ranks_pass_in_any_order() {
        let report = density_report(Uuid::new_v4(), &[2, 0, 1]);
        assert!(report.is_dense());
        assert_eq!(report.member_count, 3);
    }

    #[test]
    fn empty_container_is_dense() {
        assert!(density_report(Uuid::new_v4(), &[]).is_dense());
    }

    #[test]
    fn gaps_and_duplicates_are_reported() {
        let report = density_report(Uuid::new_v4(), &[0, 0, 3, -1]);
        assert!(!report.is_dense());
        assert_eq!(report.missing, vec![1, 2]);
        assert_eq!(report.duplicated, vec![0]);
        assert_eq!(report.out_of_range, vec![-1]);
    }
}
