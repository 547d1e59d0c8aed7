//! Core of rankboard: dense per-container ranks for kanban-style boards.
//!
//! The rank store (`repo`, `service`) is the single writer of ranks. The
//! `client` module mirrors its shift rules through `engine` so optimistic
//! state converges on what the store commits.

pub mod client;
pub mod db;
pub mod engine;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use db::{open_db, open_db_in_memory, open_db_with_options, DbError, DbOptions};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::member::{
    Container, ContainerId, Member, MemberId, MoveRequest, Placement, Rank,
};
pub use repo::rank_repo::{
    MoveOutcome, RankStore, RankStoreError, RankStoreResult, SqliteRankStore,
};
pub use service::move_service::{
    MoveError, MoveErrorKind, MoveFailure, MoveResult, MoveService,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
