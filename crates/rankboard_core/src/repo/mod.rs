//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for ranked members.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Rank writes only happen through `RankStore` operations.
//! - Repository APIs return semantic errors (`MemberNotFound`,
//!   `ContainerNotFound`) in addition to DB transport errors.

pub mod rank_repo;
