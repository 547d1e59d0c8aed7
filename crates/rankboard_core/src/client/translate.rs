//! Edge-to-rank translation.
//!
//! Computes the final resting rank the rank store expects for a drop. The
//! store performs the neighbour shifts itself, so the same-container rules
//! account for the source slot being vacated first.

use crate::client::edge::Edge;
use crate::model::member::{ContainerId, Rank};

/// Drop target as seen by the translator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslateTarget {
    pub container_id: ContainerId,
    pub edge: Edge,
    /// Rank of the member dropped on; `None` when dropping on the container.
    pub target_member_rank: Option<Rank>,
    /// Current member count of `container_id`, including the dragged member
    /// when it already lives there.
    pub member_count: u32,
}

/// Returns the destination rank for moving the member at
/// `(source_container_id, source_rank)` onto `target`.
pub fn translate(source_rank: Rank, source_container_id: ContainerId, target: &TranslateTarget) -> Rank {
    let same_container = source_container_id == target.container_id;

    let Some(target_rank) = target.target_member_rank else {
        return match target.edge {
            Edge::Before => 0,
            // Within its own container the member already fills one slot.
            Edge::After if same_container => target.member_count.saturating_sub(1),
            Edge::After => target.member_count,
        };
    };

    if !same_container {
        return match target.edge {
            Edge::Before => target_rank,
            Edge::After => target_rank + 1,
        };
    }

    if target_rank == source_rank {
        // Dropped on itself.
        return source_rank;
    }
    let source_precedes = source_rank < target_rank;
    match (target.edge, source_precedes) {
        (Edge::Before, true) => target_rank - 1,
        (Edge::Before, false) => target_rank,
        (Edge::After, true) => target_rank,
        (Edge::After, false) => target_rank + 1,
    }
}
