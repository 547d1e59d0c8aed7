//! Move plans: shift ranges plus a final placement.

use crate::model::member::{ContainerId, MemberId, Placement, Rank};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Direction of a one-step rank shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftDelta {
    /// `order += 1`, opens a slot.
    Increment,
    /// `order -= 1`, closes a slot.
    Decrement,
}

impl ShiftDelta {
    pub fn as_i64(self) -> i64 {
        match self {
            Self::Increment => 1,
            Self::Decrement => -1,
        }
    }

    /// Applies the delta to one rank.
    ///
    /// Returns `None` when decrementing rank 0, which a valid plan never does.
    pub fn apply(self, rank: Rank) -> Option<Rank> {
        match self {
            Self::Increment => rank.checked_add(1),
            Self::Decrement => rank.checked_sub(1),
        }
    }
}

/// Half-open rank interval `[start, end)`; `end = None` is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankRange {
    pub start: Rank,
    pub end: Option<Rank>,
}

impl RankRange {
    pub fn from(start: Rank) -> Self {
        Self { start, end: None }
    }

    pub fn between(start: Rank, end: Rank) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    pub fn contains(&self, rank: Rank) -> bool {
        rank >= self.start && self.end.map_or(true, |end| rank < end)
    }

    pub fn is_empty(&self) -> bool {
        self.end.is_some_and(|end| end <= self.start)
    }
}

/// One shift step: every rank of `container_id` in `range` moves by `delta`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankShift {
    pub container_id: ContainerId,
    pub range: RankRange,
    pub delta: ShiftDelta,
}

impl RankShift {
    /// Returns the rank `rank` ends up at, if this shift touches it.
    pub fn shifted(&self, container_id: ContainerId, rank: Rank) -> Option<Rank> {
        if container_id != self.container_id || !self.range.contains(rank) {
            return None;
        }
        self.delta.apply(rank)
    }
}

/// Writes required to move one member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovePlan {
    /// Destination equals the current placement; nothing is written.
    Noop { member_id: MemberId, placement: Placement },
    /// Shift the listed ranges, then write the member at `to`.
    Reindex {
        member_id: MemberId,
        from: Placement,
        to: Placement,
        shifts: Vec<RankShift>,
    },
}

impl MovePlan {
    pub fn member_id(&self) -> MemberId {
        match self {
            Self::Noop { member_id, .. } | Self::Reindex { member_id, .. } => *member_id,
        }
    }

    /// Final placement of the moved member.
    pub fn destination(&self) -> Placement {
        match self {
            Self::Noop { placement, .. } => *placement,
            Self::Reindex { to, .. } => *to,
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, Self::Noop { .. })
    }

    pub fn shifts(&self) -> &[RankShift] {
        match self {
            Self::Noop { .. } => &[],
            Self::Reindex { shifts, .. } => shifts,
        }
    }
}

/// Destination rank outside the valid bound for its container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("destination rank {rank} is outside 0..={max}")]
pub struct RankBoundError {
    pub rank: Rank,
    pub max: Rank,
}

/// Checks `to.rank` against the destination size.
///
/// `destination_count` is the member count of `to.container_id` before the
/// move. Appending (`rank == count`) is valid across containers; within the
/// source container the member already occupies a slot, so the bound is
/// `count - 1`.
pub fn validate_destination(
    from: Placement,
    to: Placement,
    destination_count: u32,
) -> Result<(), RankBoundError> {
    let max = if from.container_id == to.container_id {
        destination_count.saturating_sub(1)
    } else {
        destination_count
    };
    if to.rank > max {
        return Err(RankBoundError { rank: to.rank, max });
    }
    Ok(())
}

/// Computes the shifts for moving `member_id` from `from` to `to`.
///
/// Callers validate `to` with [`validate_destination`] first.
pub fn plan_move(member_id: MemberId, from: Placement, to: Placement) -> MovePlan {
    if from.container_id != to.container_id {
        return MovePlan::Reindex {
            member_id,
            from,
            to,
            shifts: vec![
                RankShift {
                    container_id: to.container_id,
                    range: RankRange::from(to.rank),
                    delta: ShiftDelta::Increment,
                },
                plan_removal(from),
            ],
        };
    }

    let shift = if to.rank > from.rank {
        // (from, to] slides up one slot.
        RankShift {
            container_id: from.container_id,
            range: RankRange::between(from.rank + 1, to.rank + 1),
            delta: ShiftDelta::Decrement,
        }
    } else if to.rank < from.rank {
        // [to, from) slides down one slot.
        RankShift {
            container_id: from.container_id,
            range: RankRange::between(to.rank, from.rank),
            delta: ShiftDelta::Increment,
        }
    } else {
        return MovePlan::Noop {
            member_id,
            placement: from,
        };
    };

    MovePlan::Reindex {
        member_id,
        from,
        to,
        shifts: vec![shift],
    }
}

/// Shift that closes the slot left behind at `vacated`.
///
/// Used for the source side of cross-container moves and for deletes.
pub fn plan_removal(vacated: Placement) -> RankShift {
    RankShift {
        container_id: vacated.container_id,
        range: RankRange::from(vacated.rank + 1),
        delta: ShiftDelta::Decrement,
    }
}

#[cfg(test)]
mod tests {
    use super::{
        plan_move, plan_removal, validate_destination, MovePlan, RankRange, ShiftDelta,
    };
    use crate::model::member::Placement;
    use uuid::Uuid;

    #[test]
    fn forward_move_decrements_passed_over_ranks() {
        let column = Uuid::new_v4();
        let member = Uuid::new_v4();
        let plan = plan_move(member, Placement::new(column, 0), Placement::new(column, 2));

        let shifts = plan.shifts();
        assert_eq!(shifts.len(), 1);
        assert_eq!(shifts[0].range, RankRange::between(1, 3));
        assert_eq!(shifts[0].delta, ShiftDelta::Decrement);
        assert_eq!(shifts[0].shifted(column, 1), Some(0));
        assert_eq!(shifts[0].shifted(column, 2), Some(1));
        assert_eq!(shifts[0].shifted(column, 3), None);
    }

    #[test]
    fn backward_move_increments_skipped_ranks() {
        let column = Uuid::new_v4();
        let plan = plan_move(
            Uuid::new_v4(),
            Placement::new(column, 3),
            Placement::new(column, 1),
        );

        let shifts = plan.shifts();
        assert_eq!(shifts[0].range, RankRange::between(1, 3));
        assert_eq!(shifts[0].delta, ShiftDelta::Increment);
        assert_eq!(shifts[0].shifted(column, 0), None);
        assert_eq!(shifts[0].shifted(column, 2), Some(3));
    }

    #[test]
    fn cross_container_move_opens_destination_and_closes_source() {
        let source = Uuid::new_v4();
        let destination = Uuid::new_v4();
        let plan = plan_move(
            Uuid::new_v4(),
            Placement::new(source, 1),
            Placement::new(destination, 0),
        );

        let shifts = plan.shifts();
        assert_eq!(shifts.len(), 2);
        assert_eq!(shifts[0].container_id, destination);
        assert_eq!(shifts[0].range, RankRange::from(0));
        assert_eq!(shifts[0].delta, ShiftDelta::Increment);
        assert_eq!(shifts[1], plan_removal(Placement::new(source, 1)));
        assert_eq!(shifts[1].range, RankRange::from(2));
    }

    #[test]
    fn same_placement_is_noop() {
        let column = Uuid::new_v4();
        let plan = plan_move(
            Uuid::new_v4(),
            Placement::new(column, 0),
            Placement::new(column, 0),
        );
        assert!(plan.is_noop());
        assert!(plan.shifts().is_empty());
        assert_eq!(plan.destination(), Placement::new(column, 0));
        assert!(matches!(plan, MovePlan::Noop { .. }));
    }

    #[test]
    fn destination_bound_depends_on_topology() {
        let source = Uuid::new_v4();
        let other = Uuid::new_v4();
        let from = Placement::new(source, 0);

        validate_destination(from, Placement::new(source, 2), 3).unwrap();
        let err = validate_destination(from, Placement::new(source, 3), 3).unwrap_err();
        assert_eq!(err.max, 2);

        validate_destination(from, Placement::new(other, 3), 3).unwrap();
        validate_destination(from, Placement::new(other, 0), 0).unwrap();
        let err = validate_destination(from, Placement::new(other, 1), 0).unwrap_err();
        assert_eq!((err.rank, err.max), (1, 0));
    }

    #[test]
    fn decrement_of_zero_is_rejected() {
        assert_eq!(ShiftDelta::Decrement.apply(0), None);
        assert_eq!(ShiftDelta::Increment.apply(4), Some(5));
        assert!(RankRange::between(2, 2).is_empty());
        assert!(!RankRange::from(2).is_empty());
    }
}
