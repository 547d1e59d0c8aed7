//! Move use-case service.
//!
//! # Responsibility
//! - Expose `move(member, destination container, destination rank)` and the
//!   read queries the client needs to compute ranks.
//! - Map rank store failures onto `NotFound | InvalidArgument | Conflict |
//!   Internal`.
//! - Emit one metadata-only log event per mutation.
//!
//! # Invariants
//! - Every call is a single store transaction; the service never retries.
//! - Failed calls leave persisted ranks exactly as they were.

use crate::db::DbError;
use crate::engine::DensityReport;
use crate::model::member::{Container, ContainerId, Member, MemberId, MoveRequest, Rank};
use crate::repo::rank_repo::{RankStore, RankStoreError};
use log::{error, info, warn};
use rusqlite::ErrorCode;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::time::Instant;
use thiserror::Error;

/// Result type used by move service operations.
pub type MoveResult<T> = Result<T, MoveError>;

/// Entity a `NotFound` failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entity", content = "id", rename_all = "snake_case")]
pub enum MissingEntity {
    Member(MemberId),
    Container(ContainerId),
}

impl Display for MissingEntity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Member(id) => write!(f, "member {id}"),
            Self::Container(id) => write!(f, "container {id}"),
        }
    }
}

/// Caller-facing error taxonomy for move engine operations.
#[derive(Debug, Error)]
pub enum MoveError {
    /// Referenced member or container does not exist. Not retried.
    #[error("not found: {0}")]
    NotFound(MissingEntity),
    /// Destination rank outside the valid bound. Indicates a client/server
    /// rank computation mismatch.
    #[error("invalid destination rank {rank}; valid range is 0..={max}")]
    InvalidArgument { rank: Rank, max: Rank },
    /// Concurrent modification or stale caller view. Caller may refresh
    /// ranks and retry.
    #[error("conflicting modification: {0}")]
    Conflict(#[source] RankStoreError),
    /// Storage failure.
    #[error("internal storage error: {0}")]
    Internal(#[source] RankStoreError),
}

/// Discriminant of [`MoveError`], cheap to copy across the client boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveErrorKind {
    NotFound,
    InvalidArgument,
    Conflict,
    Internal,
}

impl MoveErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::InvalidArgument => "invalid_argument",
            Self::Conflict => "conflict",
            Self::Internal => "internal",
        }
    }

    /// Whether re-issuing the move with refreshed ranks can succeed.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Conflict)
    }

    /// Short message for the user after an optimistic move is reverted.
    pub fn user_message(self) -> &'static str {
        match self {
            Self::NotFound => "This item no longer exists.",
            Self::InvalidArgument => "The board changed while you were dragging. Please try again.",
            Self::Conflict => "Someone else moved items here at the same time. Please try again.",
            Self::Internal => "The move could not be saved.",
        }
    }
}

/// Serializable failure as delivered to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveFailure {
    pub kind: MoveErrorKind,
    pub message: String,
}

impl MoveError {
    pub fn kind(&self) -> MoveErrorKind {
        match self {
            Self::NotFound(_) => MoveErrorKind::NotFound,
            Self::InvalidArgument { .. } => MoveErrorKind::InvalidArgument,
            Self::Conflict(_) => MoveErrorKind::Conflict,
            Self::Internal(_) => MoveErrorKind::Internal,
        }
    }

    pub fn to_failure(&self) -> MoveFailure {
        MoveFailure {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

impl From<RankStoreError> for MoveError {
    fn from(value: RankStoreError) -> Self {
        match value {
            RankStoreError::MemberNotFound(id) => Self::NotFound(MissingEntity::Member(id)),
            RankStoreError::ContainerNotFound(id) => Self::NotFound(MissingEntity::Container(id)),
            RankStoreError::RankOutOfRange { rank, max } => Self::InvalidArgument { rank, max },
            stale @ RankStoreError::StaleSource { .. } => Self::Conflict(stale),
            other if is_contention(&other) => Self::Conflict(other),
            other => Self::Internal(other),
        }
    }
}

fn is_contention(err: &RankStoreError) -> bool {
    let RankStoreError::Db(DbError::Sqlite(err)) = err else {
        return false;
    };
    matches!(
        err.sqlite_error_code(),
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked | ErrorCode::ConstraintViolation)
    )
}

/// Move engine facade over a rank store.
pub struct MoveService<S: RankStore> {
    store: S,
}

impl<S: RankStore> MoveService<S> {
    /// Creates service from store implementation.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Moves one member and returns it as persisted.
    ///
    /// # Errors
    /// - `NotFound` when the member or destination container is missing.
    /// - `InvalidArgument` when `destination_rank` is out of bounds; never
    ///   clamped.
    /// - `Conflict` when the store is contended or the request's source
    ///   container is stale.
    /// - `Internal` for any other storage failure.
    pub fn move_member(&self, request: &MoveRequest) -> MoveResult<Member> {
        let started_at = Instant::now();
        match self.store.move_member(request) {
            Ok(outcome) => {
                info!(
                    "event=member_move module=service status=ok member_id={} from_container={} from_rank={} to_container={} to_rank={} rows_written={} duration_ms={}",
                    request.member_id,
                    outcome.previous.container_id,
                    outcome.previous.rank,
                    outcome.member.container_id,
                    outcome.member.order,
                    outcome.rows_written,
                    started_at.elapsed().as_millis()
                );
                Ok(outcome.member)
            }
            Err(err) => {
                let err = MoveError::from(err);
                log_move_failure(request, &err, started_at);
                Err(err)
            }
        }
    }

    /// Creates one empty container.
    pub fn create_container(&self) -> MoveResult<Container> {
        let container = self.store.create_container()?;
        info!(
            "event=container_create module=service status=ok container_id={}",
            container.id
        );
        Ok(container)
    }

    /// Deletes one container and every member in it.
    pub fn delete_container(&self, container_id: ContainerId) -> MoveResult<()> {
        self.store.delete_container(container_id)?;
        info!(
            "event=container_delete module=service status=ok container_id={}",
            container_id
        );
        Ok(())
    }

    /// Appends one member to the end of a container.
    pub fn create_member(&self, container_id: ContainerId) -> MoveResult<Member> {
        let member = self.store.create_member(container_id)?;
        info!(
            "event=member_create module=service status=ok member_id={} container_id={} rank={}",
            member.id, member.container_id, member.order
        );
        Ok(member)
    }

    /// Deletes one member and closes its gap.
    pub fn delete_member(&self, member_id: MemberId) -> MoveResult<Member> {
        let member = self.store.delete_member(member_id)?;
        info!(
            "event=member_delete module=service status=ok member_id={} container_id={} rank={}",
            member.id, member.container_id, member.order
        );
        Ok(member)
    }

    pub fn list_containers(&self) -> MoveResult<Vec<Container>> {
        self.store.list_containers().map_err(Into::into)
    }

    pub fn get_member(&self, member_id: MemberId) -> MoveResult<Member> {
        self.store
            .get_member(member_id)?
            .ok_or(MoveError::NotFound(MissingEntity::Member(member_id)))
    }

    pub fn member_count(&self, container_id: ContainerId) -> MoveResult<u32> {
        self.store.member_count(container_id).map_err(Into::into)
    }

    pub fn list_members(&self, container_id: ContainerId) -> MoveResult<Vec<Member>> {
        self.store.list_members(container_id).map_err(Into::into)
    }

    /// Checks one container for gaps and duplicates.
    pub fn audit_density(&self, container_id: ContainerId) -> MoveResult<DensityReport> {
        let report = self.store.audit_density(container_id)?;
        if !report.is_dense() {
            warn!(
                "event=density_audit module=service status=error container_id={} member_count={} missing={} duplicated={} out_of_range={}",
                container_id,
                report.member_count,
                report.missing.len(),
                report.duplicated.len(),
                report.out_of_range.len()
            );
        }
        Ok(report)
    }

    /// Rewrites a container's ranks densely, keeping current order.
    pub fn renumber_container(&self, container_id: ContainerId) -> MoveResult<usize> {
        let changed = self.store.renumber_container(container_id)?;
        if changed > 0 {
            warn!(
                "event=container_renumber module=service status=ok container_id={} rows_changed={}",
                container_id, changed
            );
        }
        Ok(changed)
    }
}

fn log_move_failure(request: &MoveRequest, err: &MoveError, started_at: Instant) {
    let duration_ms = started_at.elapsed().as_millis();
    match err.kind() {
        MoveErrorKind::NotFound => info!(
            "event=member_move module=service status=error error_code=not_found member_id={} to_container={} to_rank={} duration_ms={}",
            request.member_id, request.destination_container_id, request.destination_rank, duration_ms
        ),
        MoveErrorKind::InvalidArgument => warn!(
            "event=member_move module=service status=error error_code=rank_mismatch member_id={} to_container={} to_rank={} duration_ms={} error={}",
            request.member_id, request.destination_container_id, request.destination_rank, duration_ms, err
        ),
        MoveErrorKind::Conflict => warn!(
            "event=member_move module=service status=error error_code=conflict member_id={} to_container={} to_rank={} duration_ms={} error={}",
            request.member_id, request.destination_container_id, request.destination_rank, duration_ms, err
        ),
        MoveErrorKind::Internal => error!(
            "event=member_move module=service status=error error_code=internal member_id={} to_container={} to_rank={} duration_ms={} error={}",
            request.member_id, request.destination_container_id, request.destination_rank, duration_ms, err
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::{MissingEntity, MoveError, MoveErrorKind};
    use crate::repo::rank_repo::RankStoreError;
    use uuid::Uuid;

    #[test]
    fn store_errors_classify_into_taxonomy() {
        let id = Uuid::new_v4();
        assert!(matches!(
            MoveError::from(RankStoreError::MemberNotFound(id)),
            MoveError::NotFound(MissingEntity::Member(found)) if found == id
        ));
        assert_eq!(
            MoveError::from(RankStoreError::RankOutOfRange { rank: 9, max: 2 }).kind(),
            MoveErrorKind::InvalidArgument
        );
        assert_eq!(
            MoveError::from(RankStoreError::StaleSource {
                member_id: id,
                expected: Uuid::new_v4(),
                actual: Uuid::new_v4(),
            })
            .kind(),
            MoveErrorKind::Conflict
        );
        assert_eq!(
            MoveError::from(RankStoreError::InvalidData("bad".to_string())).kind(),
            MoveErrorKind::Internal
        );
    }

    #[test]
    fn only_conflicts_are_retryable() {
        assert!(MoveErrorKind::Conflict.is_retryable());
        assert!(!MoveErrorKind::NotFound.is_retryable());
        assert!(!MoveErrorKind::InvalidArgument.is_retryable());
        assert!(!MoveErrorKind::Internal.is_retryable());
    }

    #[test]
    fn failure_carries_kind_and_message() {
        let failure = MoveError::InvalidArgument { rank: 4, max: 1 }.to_failure();
        assert_eq!(failure.kind, MoveErrorKind::InvalidArgument);
        assert!(failure.message.contains("0..=1"));
    }
}
