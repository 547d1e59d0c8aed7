//! Member, container and move request records.
//!
//! # Responsibility
//! - Define the minimal "container + member + rank" shape the engine works on.
//! - Provide the serialized move request exchanged with the surrounding
//!   CRUD layer.
//!
//! # Invariants
//! - `order` is non-negative and unique within `container_id`.
//! - `id` is stable for the member lifetime, across container changes.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of an orderable entity (a card or a column).
pub type MemberId = Uuid;

/// Stable identifier of an ordering scope (a column or a board).
pub type ContainerId = Uuid;

/// Dense position of a member inside its container.
pub type Rank = u32;

/// Ordering scope holding zero or more members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub id: ContainerId,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms update timestamp.
    pub updated_at: i64,
}

/// Orderable entity as seen by the rank store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: MemberId,
    pub container_id: ContainerId,
    pub order: Rank,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms update timestamp; bumped by every rank write.
    pub updated_at: i64,
}

impl Member {
    /// Returns where this member currently sits.
    pub fn placement(&self) -> Placement {
        Placement::new(self.container_id, self.order)
    }
}

/// A `(container, rank)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub container_id: ContainerId,
    pub rank: Rank,
}

impl Placement {
    pub fn new(container_id: ContainerId, rank: Rank) -> Self {
        Self { container_id, rank }
    }
}

/// The one logical operation the move engine accepts.
///
/// `source_container_id` is the container the caller believes the member is
/// in; the store rejects the request as stale when it disagrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    pub member_id: MemberId,
    pub source_container_id: ContainerId,
    pub destination_container_id: ContainerId,
    pub destination_rank: Rank,
}

impl MoveRequest {
    pub fn destination(&self) -> Placement {
        Placement::new(self.destination_container_id, self.destination_rank)
    }

    pub fn is_cross_container(&self) -> bool {
        self.source_container_id != self.destination_container_id
    }
}

#[cfg(test)]
mod tests {
    use super::{Member, MoveRequest, Placement};
    use uuid::Uuid;

    #[test]
    fn member_placement_mirrors_fields() {
        let container_id = Uuid::new_v4();
        let member = Member {
            id: Uuid::new_v4(),
            container_id,
            order: 3,
            created_at: 0,
            updated_at: 0,
        };
        assert_eq!(member.placement(), Placement::new(container_id, 3));
    }

    #[test]
    fn move_request_detects_cross_container() {
        let column = Uuid::new_v4();
        let same = MoveRequest {
            member_id: Uuid::new_v4(),
            source_container_id: column,
            destination_container_id: column,
            destination_rank: 0,
        };
        assert!(!same.is_cross_container());

        let cross = MoveRequest {
            destination_container_id: Uuid::new_v4(),
            ..same
        };
        assert!(cross.is_cross_container());
        assert_eq!(cross.destination().rank, 0);
    }
}
