//! Storage-agnostic rank reindexing rules.
//!
//! # Responsibility
//! - Decide which ranks shift, in which direction, for a move or removal.
//! - Validate destination ranks against container sizes.
//!
//! # Invariants
//! - Every plan, applied to a dense container set, yields a dense set.
//! - Plans never touch the moved member through a shift; its final
//!   placement is written separately.
//!
//! Both the SQLite rank store and the client-side cache execute these plans,
//! so server and optimistic state follow one algorithm.

pub mod audit;
pub mod plan;

pub use audit::{density_report, DensityReport};
pub use plan::{
    plan_move, plan_removal, validate_destination, MovePlan, RankBoundError, RankRange,
    RankShift, ShiftDelta,
};
