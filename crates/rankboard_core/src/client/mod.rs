//! Client-side drag and drop.
//!
//! `edge` and `registry` turn pointer samples into drop indicators,
//! `translate` turns an indicator into a destination rank, `gesture` ties the
//! two into one drag, and `optimistic` applies the result to the cached
//! `board` until the rank store confirms or rejects it.

pub mod board;
pub mod edge;
pub mod gesture;
pub mod optimistic;
pub mod registry;
pub mod translate;

pub use board::{LocalBoard, LocalMoveError};
pub use edge::{
    Axis, Edge, EdgeHit, EdgeResolver, EdgeResolverConfig, Point, Rect, Resolution, TargetRef,
    DEFAULT_DEAD_ZONE,
};
pub use gesture::{DragSession, GestureError};
pub use optimistic::{
    ApplyOutcome, Dispatch, MoveState, MoveTicket, OptimisticReconciler, ReconcileError,
    SettleOutcome, Settlement,
};
pub use registry::{DropTargetRegistry, RegisteredTarget};
pub use translate::{translate, TranslateTarget};
