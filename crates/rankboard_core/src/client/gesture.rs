//! Drag gesture lifecycle.
//!
//! ```text
//! begin -> update* -> release (yields at most one MoveRequest)
//!                  \-> cancel  (yields nothing)
//! ```
//!
//! The session only reads the board. Nothing is mutated until a dropped
//! request is handed to the optimistic reconciler, so a cancelled or
//! target-less gesture leaves client state exactly as it was.

use crate::client::board::LocalBoard;
use crate::client::edge::{EdgeHit, Point, Resolution, TargetRef};
use crate::client::registry::DropTargetRegistry;
use crate::client::translate::{translate, TranslateTarget};
use crate::model::member::{MemberId, MoveRequest, Placement};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GestureError {
    #[error("dragged member not in local snapshot: {0}")]
    UnknownMember(MemberId),
}

/// One in-progress drag of one member.
#[derive(Debug, Clone, PartialEq)]
pub struct DragSession {
    member_id: MemberId,
    origin: Placement,
    hover: Option<EdgeHit>,
}

impl DragSession {
    /// Starts dragging `member_id` from its cached placement.
    pub fn begin(board: &LocalBoard, member_id: MemberId) -> Result<Self, GestureError> {
        let origin = board
            .placement(member_id)
            .ok_or(GestureError::UnknownMember(member_id))?;
        Ok(Self {
            member_id,
            origin,
            hover: None,
        })
    }

    pub fn member_id(&self) -> MemberId {
        self.member_id
    }

    pub fn origin(&self) -> Placement {
        self.origin
    }

    /// Current drop indicator, if any.
    pub fn hover(&self) -> Option<EdgeHit> {
        self.hover
    }

    /// Re-evaluates the drop position for one drag-over sample.
    ///
    /// A pointer in a target's dead-zone keeps the previous indicator;
    /// a pointer over no target clears it.
    pub fn update(&mut self, registry: &DropTargetRegistry, pointer: Point) -> Option<EdgeHit> {
        match registry.resolve(pointer) {
            Resolution::Hit(hit) => self.hover = Some(hit),
            Resolution::DeadZone => {}
            Resolution::Outside => self.hover = None,
        }
        self.hover
    }

    /// Ends the gesture on the current indicator.
    ///
    /// Returns `None` when there is no valid target, when the target vanished
    /// from the snapshot, or when the drop would not change the placement.
    pub fn release(self, board: &LocalBoard) -> Option<MoveRequest> {
        let hit = self.hover?;
        let container_id = hit.target.container_id();
        if !board.has_container(container_id) {
            return None;
        }

        let target_member_rank = match hit.target {
            TargetRef::Member { member_id, .. } => {
                let placement = board.placement(member_id)?;
                if placement.container_id != container_id {
                    return None;
                }
                Some(placement.rank)
            }
            TargetRef::Container { .. } => None,
        };

        let destination_rank = translate(
            self.origin.rank,
            self.origin.container_id,
            &TranslateTarget {
                container_id,
                edge: hit.edge,
                target_member_rank,
                member_count: board.member_count(container_id),
            },
        );
        if Placement::new(container_id, destination_rank) == self.origin {
            return None;
        }

        Some(MoveRequest {
            member_id: self.member_id,
            source_container_id: self.origin.container_id,
            destination_container_id: container_id,
            destination_rank,
        })
    }

    /// Abandons the gesture.
    pub fn cancel(self) {}
}
