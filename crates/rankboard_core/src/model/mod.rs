//! Domain model shared by the server reindexer and the client move path.
//!
//! # Responsibility
//! - Define identity, placement and request shapes for orderable members.
//! - Keep payload concerns (titles, metadata) outside the engine.
//!
//! # Invariants
//! - Every member is identified by a stable `MemberId`.
//! - Within one container the set of member ranks is exactly `0..n`.

pub mod member;
