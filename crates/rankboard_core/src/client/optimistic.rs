//! Optimistic move application and server reconciliation.
//!
//! # Responsibility
//! - Apply a dropped move to the local snapshot before the server answers.
//! - Replace optimistic placement with the confirmed one on commit.
//! - Restore the pre-move placement on rollback.
//!
//! # Invariants
//! - At most one move per member is in flight; a newer request for the same
//!   member waits in a one-slot queue and a later one supersedes it.
//! - Per member: `Idle -> Optimistic -> (Committed | RolledBack) -> Idle`.
//! - Every error kind reverts identically; only messaging differs.

use crate::client::board::{LocalBoard, LocalMoveError};
use crate::engine::MovePlan;
use crate::model::member::{ContainerId, Member, MemberId, MoveRequest, Placement};
use crate::service::move_service::MoveFailure;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Handle for one in-flight move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MoveTicket(u64);

impl Display for MoveTicket {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Move lifecycle state of one member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveState {
    Idle,
    Optimistic { ticket: MoveTicket },
}

/// A move applied locally that must now be sent to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatch {
    pub ticket: MoveTicket,
    pub request: MoveRequest,
}

/// Result of offering a move to the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Applied locally; send `request` and settle with `ticket`.
    Applied(Dispatch),
    /// The member already has a move in flight; this request runs after it
    /// settles. `superseded` is the queued request it replaced.
    Queued { superseded: Option<MoveRequest> },
    /// The request does not change the placement; nothing to send.
    Noop,
}

/// How an in-flight move ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettleOutcome {
    Committed,
    RolledBack(MoveFailure),
}

/// Result of settling one move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub member_id: MemberId,
    pub outcome: SettleOutcome,
    /// The confirmed placement differed from the optimistic one.
    pub corrected: bool,
    /// Queued move released by this settlement, already applied locally.
    pub next: Option<Dispatch>,
    /// Queued move dropped because it no longer applies.
    pub discarded: Option<MoveRequest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Rejected(#[from] LocalMoveError),
    #[error("no move in flight for ticket {0}")]
    UnknownTicket(MoveTicket),
    #[error("ticket {ticket} belongs to member {expected}, confirmation is for {actual}")]
    MemberMismatch {
        ticket: MoveTicket,
        expected: MemberId,
        actual: MemberId,
    },
}

#[derive(Debug, Clone, Copy)]
struct PendingMove {
    ticket: MoveTicket,
    request: MoveRequest,
    origin: Placement,
}

/// Client cache plus per-member in-flight move tracking.
#[derive(Debug, Default)]
pub struct OptimisticReconciler {
    board: LocalBoard,
    pending: HashMap<MemberId, PendingMove>,
    queued: HashMap<MemberId, MoveRequest>,
    next_ticket: u64,
}

impl OptimisticReconciler {
    pub fn new(board: LocalBoard) -> Self {
        Self {
            board,
            ..Self::default()
        }
    }

    /// Snapshot as currently rendered, optimistic moves included.
    pub fn board(&self) -> &LocalBoard {
        &self.board
    }

    pub fn state(&self, member_id: MemberId) -> MoveState {
        match self.pending.get(&member_id) {
            Some(pending) => MoveState::Optimistic {
                ticket: pending.ticket,
            },
            None => MoveState::Idle,
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn queued(&self, member_id: MemberId) -> Option<MoveRequest> {
        self.queued.get(&member_id).copied()
    }

    /// Applies `request` to the local snapshot, or queues it behind the
    /// member's in-flight move.
    pub fn apply_optimistic(&mut self, request: MoveRequest) -> Result<ApplyOutcome, ReconcileError> {
        if self.pending.contains_key(&request.member_id) {
            let superseded = self.queued.insert(request.member_id, request);
            debug!(
                "event=move_queue module=client status=ok member_id={} superseded={}",
                request.member_id,
                superseded.is_some()
            );
            return Ok(ApplyOutcome::Queued { superseded });
        }

        let plan = self.board.apply_move(&request)?;
        let origin = match plan {
            MovePlan::Noop { .. } => return Ok(ApplyOutcome::Noop),
            MovePlan::Reindex { from, .. } => from,
        };

        let ticket = self.issue_ticket();
        self.pending.insert(
            request.member_id,
            PendingMove {
                ticket,
                request,
                origin,
            },
        );
        debug!(
            "event=move_optimistic module=client status=ok ticket={} member_id={} to_container={} to_rank={}",
            ticket, request.member_id, request.destination_container_id, request.destination_rank
        );
        Ok(ApplyOutcome::Applied(Dispatch { ticket, request }))
    }

    /// Settles `ticket` with the server-confirmed member.
    pub fn commit(&mut self, ticket: MoveTicket, confirmed: &Member) -> Result<Settlement, ReconcileError> {
        let pending = self.take_pending(ticket, Some(confirmed.id))?;
        let member_id = pending.request.member_id;

        // Other in-flight moves in the same containers have already shifted
        // the cached rank but not the server's; converge once they settle.
        let settled = !self.container_busy(confirmed.container_id)
            && !self.container_busy(pending.origin.container_id);
        let corrected = settled && self.board.placement(member_id) != Some(confirmed.placement());
        if corrected {
            warn!(
                "event=move_commit module=client status=corrected ticket={} member_id={} optimistic_container={} optimistic_rank={} confirmed_container={} confirmed_rank={}",
                ticket,
                member_id,
                pending.request.destination_container_id,
                pending.request.destination_rank,
                confirmed.container_id,
                confirmed.order
            );
            self.board.relocate(member_id, confirmed.placement())?;
        } else {
            debug!(
                "event=move_commit module=client status=ok ticket={} member_id={}",
                ticket, member_id
            );
        }

        let (next, discarded) = self.release_queued(member_id);
        Ok(Settlement {
            member_id,
            outcome: SettleOutcome::Committed,
            corrected,
            next,
            discarded,
        })
    }

    /// Reverts `ticket` to the placement the member had before it.
    ///
    /// A request queued behind the reverted move was computed against state
    /// that no longer exists and is discarded.
    pub fn rollback(&mut self, ticket: MoveTicket, failure: MoveFailure) -> Result<Settlement, ReconcileError> {
        let pending = self.take_pending(ticket, None)?;
        let member_id = pending.request.member_id;
        info!(
            "event=move_rollback module=client status=ok ticket={} member_id={} error_kind={}",
            ticket,
            member_id,
            failure.kind.as_str()
        );

        let discarded = self.queued.remove(&member_id);
        self.board.relocate(member_id, pending.origin)?;
        Ok(Settlement {
            member_id,
            outcome: SettleOutcome::RolledBack(failure),
            corrected: false,
            next: None,
            discarded,
        })
    }

    /// Replaces one container with a server listing.
    ///
    /// Refused while a move touching the container is in flight, since the
    /// listing may predate it; returns whether the listing was applied.
    pub fn refresh_container(&mut self, container_id: ContainerId, members: &[Member]) -> bool {
        if self.container_busy(container_id) {
            return false;
        }
        self.board.replace_container(container_id, members);
        true
    }

    /// Whether any in-flight move leaves or enters `container_id`.
    fn container_busy(&self, container_id: ContainerId) -> bool {
        self.pending.values().any(|pending| {
            pending.origin.container_id == container_id
                || pending.request.destination_container_id == container_id
        })
    }

    fn issue_ticket(&mut self) -> MoveTicket {
        self.next_ticket += 1;
        MoveTicket(self.next_ticket)
    }

    fn take_pending(
        &mut self,
        ticket: MoveTicket,
        confirmed_member: Option<MemberId>,
    ) -> Result<PendingMove, ReconcileError> {
        let member_id = self
            .pending
            .values()
            .find(|pending| pending.ticket == ticket)
            .map(|pending| pending.request.member_id)
            .ok_or(ReconcileError::UnknownTicket(ticket))?;
        if let Some(actual) = confirmed_member {
            if actual != member_id {
                return Err(ReconcileError::MemberMismatch {
                    ticket,
                    expected: member_id,
                    actual,
                });
            }
        }
        self.pending
            .remove(&member_id)
            .ok_or(ReconcileError::UnknownTicket(ticket))
    }

    fn release_queued(&mut self, member_id: MemberId) -> (Option<Dispatch>, Option<MoveRequest>) {
        let Some(request) = self.queued.remove(&member_id) else {
            return (None, None);
        };
        match self.apply_optimistic(request) {
            Ok(ApplyOutcome::Applied(dispatch)) => (Some(dispatch), None),
            Ok(ApplyOutcome::Noop) => (None, None),
            Ok(ApplyOutcome::Queued { .. }) => (None, None),
            Err(err) => {
                warn!(
                    "event=move_queue module=client status=error member_id={} error={}",
                    member_id, err
                );
                (None, Some(request))
            }
        }
    }
}
