//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate rank store calls into the public move contract.
//! - Classify storage failures into caller-facing error kinds.

pub mod move_service;
