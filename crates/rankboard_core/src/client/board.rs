//! Client-side cached snapshot of member placements.
//!
//! # Responsibility
//! - Hold the last known ranks for the containers a client renders.
//! - Apply move plans locally with the same shift rules as the rank store.
//!
//! # Invariants
//! - Containers in the snapshot stay dense after every applied plan.
//! - A rejected move leaves the snapshot untouched.

use crate::engine::{
    density_report, plan_move, plan_removal, validate_destination, DensityReport, MovePlan,
    RankBoundError, RankShift,
};
use crate::model::member::{ContainerId, Member, MemberId, MoveRequest, Placement, Rank};
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

/// Local move rejected before touching the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocalMoveError {
    #[error("member not in local snapshot: {0}")]
    UnknownMember(MemberId),
    #[error("container not in local snapshot: {0}")]
    UnknownContainer(ContainerId),
    #[error("member {member_id} is cached in container {actual}, request expected {expected}")]
    StaleSource {
        member_id: MemberId,
        expected: ContainerId,
        actual: ContainerId,
    },
    #[error(transparent)]
    OutOfRange(#[from] RankBoundError),
}

/// Placements of every cached member, grouped by container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalBoard {
    containers: BTreeSet<ContainerId>,
    placements: HashMap<MemberId, Placement>,
}

impl LocalBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a snapshot from server listings.
    pub fn from_listing<I>(containers: I, members: &[Member]) -> Self
    where
        I: IntoIterator<Item = ContainerId>,
    {
        let mut board = Self::new();
        for container_id in containers {
            board.insert_container(container_id);
        }
        for member in members {
            board.insert_container(member.container_id);
            board.placements.insert(member.id, member.placement());
        }
        board
    }

    pub fn insert_container(&mut self, container_id: ContainerId) {
        self.containers.insert(container_id);
    }

    pub fn has_container(&self, container_id: ContainerId) -> bool {
        self.containers.contains(&container_id)
    }

    /// Replaces one container's members with a fresh server listing.
    pub fn replace_container(&mut self, container_id: ContainerId, members: &[Member]) {
        self.placements
            .retain(|_, placement| placement.container_id != container_id);
        self.insert_container(container_id);
        for member in members {
            self.placements.insert(member.id, member.placement());
        }
    }

    /// Appends a member the way the store's create does.
    pub fn append_member(
        &mut self,
        member_id: MemberId,
        container_id: ContainerId,
    ) -> Result<Placement, LocalMoveError> {
        if !self.has_container(container_id) {
            return Err(LocalMoveError::UnknownContainer(container_id));
        }
        let placement = Placement::new(container_id, self.member_count(container_id));
        self.placements.insert(member_id, placement);
        Ok(placement)
    }

    /// Removes a member and closes the gap it leaves.
    pub fn remove_member(&mut self, member_id: MemberId) -> Result<Placement, LocalMoveError> {
        let placement = self
            .placements
            .remove(&member_id)
            .ok_or(LocalMoveError::UnknownMember(member_id))?;
        self.apply_shift(&plan_removal(placement), None);
        Ok(placement)
    }

    pub fn placement(&self, member_id: MemberId) -> Option<Placement> {
        self.placements.get(&member_id).copied()
    }

    pub fn member_count(&self, container_id: ContainerId) -> u32 {
        self.placements
            .values()
            .filter(|placement| placement.container_id == container_id)
            .count() as u32
    }

    /// Member ids of one container in rank order.
    pub fn members_in(&self, container_id: ContainerId) -> Vec<MemberId> {
        let mut members = self
            .placements
            .iter()
            .filter(|(_, placement)| placement.container_id == container_id)
            .map(|(id, placement)| (placement.rank, *id))
            .collect::<Vec<_>>();
        members.sort();
        members.into_iter().map(|(_, id)| id).collect()
    }

    pub fn member_at(&self, container_id: ContainerId, rank: Rank) -> Option<MemberId> {
        self.placements
            .iter()
            .find(|(_, placement)| **placement == Placement::new(container_id, rank))
            .map(|(id, _)| *id)
    }

    pub fn containers(&self) -> impl Iterator<Item = ContainerId> + '_ {
        self.containers.iter().copied()
    }

    pub fn density(&self, container_id: ContainerId) -> DensityReport {
        let ranks = self
            .placements
            .values()
            .filter(|placement| placement.container_id == container_id)
            .map(|placement| i64::from(placement.rank))
            .collect::<Vec<_>>();
        density_report(container_id, &ranks)
    }

    /// Validates and plans a move against the snapshot without applying it.
    pub fn plan(&self, request: &MoveRequest) -> Result<MovePlan, LocalMoveError> {
        let from = self
            .placement(request.member_id)
            .ok_or(LocalMoveError::UnknownMember(request.member_id))?;
        if !self.has_container(request.destination_container_id) {
            return Err(LocalMoveError::UnknownContainer(
                request.destination_container_id,
            ));
        }
        if from.container_id != request.source_container_id {
            return Err(LocalMoveError::StaleSource {
                member_id: request.member_id,
                expected: request.source_container_id,
                actual: from.container_id,
            });
        }

        let to = request.destination();
        validate_destination(from, to, self.member_count(to.container_id))?;
        Ok(plan_move(request.member_id, from, to))
    }

    /// Plans and applies a move.
    pub fn apply_move(&mut self, request: &MoveRequest) -> Result<MovePlan, LocalMoveError> {
        let plan = self.plan(request)?;
        self.apply_plan(&plan);
        Ok(plan)
    }

    /// Moves a member to `to`, clamping the rank into the valid bound.
    ///
    /// Used to converge on server-confirmed or restored placements when the
    /// snapshot has drifted since the rank was computed.
    pub fn relocate(&mut self, member_id: MemberId, to: Placement) -> Result<MovePlan, LocalMoveError> {
        let from = self
            .placement(member_id)
            .ok_or(LocalMoveError::UnknownMember(member_id))?;
        self.insert_container(to.container_id);
        let count = self.member_count(to.container_id);
        let max = if from.container_id == to.container_id {
            count.saturating_sub(1)
        } else {
            count
        };
        let to = Placement::new(to.container_id, to.rank.min(max));
        let plan = plan_move(member_id, from, to);
        self.apply_plan(&plan);
        Ok(plan)
    }

    fn apply_plan(&mut self, plan: &MovePlan) {
        let MovePlan::Reindex {
            member_id,
            to,
            shifts,
            ..
        } = plan
        else {
            return;
        };
        for shift in shifts {
            self.apply_shift(shift, Some(*member_id));
        }
        self.placements.insert(*member_id, *to);
    }

    fn apply_shift(&mut self, shift: &RankShift, moving: Option<MemberId>) {
        for (id, placement) in self.placements.iter_mut() {
            if Some(*id) == moving {
                continue;
            }
            if let Some(rank) = shift.shifted(placement.container_id, placement.rank) {
                placement.rank = rank;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{LocalBoard, LocalMoveError};
    use crate::model::member::{MoveRequest, Placement};
    use uuid::Uuid;

    fn board_with(counts: &[usize]) -> (LocalBoard, Vec<Uuid>, Vec<Vec<Uuid>>) {
        let mut board = LocalBoard::new();
        let mut containers = Vec::new();
        let mut members = Vec::new();
        for count in counts {
            let container_id = Uuid::new_v4();
            board.insert_container(container_id);
            let ids = (0..*count)
                .map(|_| {
                    let id = Uuid::new_v4();
                    board.append_member(id, container_id).unwrap();
                    id
                })
                .collect::<Vec<_>>();
            containers.push(container_id);
            members.push(ids);
        }
        (board, containers, members)
    }

    #[test]
    fn forward_move_matches_store_semantics() {
        let (mut board, containers, members) = board_with(&[3]);
        let (x, y, z) = (members[0][0], members[0][1], members[0][2]);
        board
            .apply_move(&MoveRequest {
                member_id: x,
                source_container_id: containers[0],
                destination_container_id: containers[0],
                destination_rank: 2,
            })
            .unwrap();
        assert_eq!(board.members_in(containers[0]), vec![y, z, x]);
        assert!(board.density(containers[0]).is_dense());
    }

    #[test]
    fn remove_closes_gap() {
        let (mut board, containers, members) = board_with(&[3]);
        board.remove_member(members[0][0]).unwrap();
        assert_eq!(board.placement(members[0][2]), Some(Placement::new(containers[0], 1)));
        assert!(board.density(containers[0]).is_dense());
    }

    #[test]
    fn rejected_move_leaves_snapshot_untouched() {
        let (mut board, containers, members) = board_with(&[2, 1]);
        let before = board.clone();
        let err = board
            .apply_move(&MoveRequest {
                member_id: members[0][0],
                source_container_id: containers[0],
                destination_container_id: containers[1],
                destination_rank: 5,
            })
            .unwrap_err();
        assert!(matches!(err, LocalMoveError::OutOfRange(_)));
        assert_eq!(board, before);
    }

    #[test]
    fn relocate_clamps_to_valid_bound() {
        let (mut board, containers, members) = board_with(&[2, 1]);
        board
            .relocate(members[0][0], Placement::new(containers[1], 9))
            .unwrap();
        assert_eq!(board.placement(members[0][0]), Some(Placement::new(containers[1], 1)));
        assert!(board.density(containers[0]).is_dense());
        assert!(board.density(containers[1]).is_dense());
    }
}
