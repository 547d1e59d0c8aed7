//! Pointer-to-edge resolution for drag gestures.
//!
//! # Responsibility
//! - Map a pointer position over one candidate target to `before`/`after`.
//!
//! # Invariants
//! - Resolution is a pure function of `(pointer, target geometry, config)`.
//! - A dead-zone at both ends of the target along the layout axis yields no
//!   decision, so the pointer resting on the seam between two stacked
//!   targets does not flip between them.

use crate::model::member::{ContainerId, MemberId};
use serde::{Deserialize, Serialize};

/// Default dead-zone width in pixels.
pub const DEFAULT_DEAD_ZONE: f64 = 4.0;

/// Layout axis of a list of drop targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    /// Cards stacked top to bottom in a column.
    Vertical,
    /// Columns laid out left to right on a board.
    Horizontal,
}

/// Pointer position in client coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn along(&self, axis: Axis) -> f64 {
        match axis {
            Axis::Vertical => self.y,
            Axis::Horizontal => self.x,
        }
    }
}

/// Bounding box of a rendered drop target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Inclusive on all four sides.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.left
            && point.x <= self.right()
            && point.y >= self.top
            && point.y <= self.bottom()
    }

    fn span(&self, axis: Axis) -> (f64, f64) {
        match axis {
            Axis::Vertical => (self.top, self.bottom()),
            Axis::Horizontal => (self.left, self.right()),
        }
    }
}

/// Side of the target the dragged member is inserted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edge {
    Before,
    After,
}

/// What the pointer is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TargetRef {
    /// A member rendered inside `container_id`.
    Member {
        member_id: MemberId,
        container_id: ContainerId,
    },
    /// The container itself (empty area, header, or an empty list).
    Container { container_id: ContainerId },
}

impl TargetRef {
    pub fn container_id(&self) -> ContainerId {
        match self {
            Self::Member { container_id, .. } | Self::Container { container_id } => *container_id,
        }
    }

    pub fn member_id(&self) -> Option<MemberId> {
        match self {
            Self::Member { member_id, .. } => Some(*member_id),
            Self::Container { .. } => None,
        }
    }
}

/// A resolved drop position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeHit {
    pub target: TargetRef,
    pub edge: Edge,
}

/// Outcome of resolving one pointer sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Hit(EdgeHit),
    /// Pointer is on the target but within the dead-zone at one end.
    DeadZone,
    /// Pointer is not over the target.
    Outside,
}

impl Resolution {
    pub fn hit(self) -> Option<EdgeHit> {
        match self {
            Self::Hit(hit) => Some(hit),
            Self::DeadZone | Self::Outside => None,
        }
    }
}

/// Resolver tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeResolverConfig {
    /// Width in pixels of the no-decision band at each end of a target.
    pub dead_zone: f64,
}

impl Default for EdgeResolverConfig {
    fn default() -> Self {
        Self {
            dead_zone: DEFAULT_DEAD_ZONE,
        }
    }
}

/// Midpoint resolver for one layout axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeResolver {
    axis: Axis,
    config: EdgeResolverConfig,
}

impl EdgeResolver {
    pub fn new(axis: Axis) -> Self {
        Self::with_config(axis, EdgeResolverConfig::default())
    }

    pub fn with_config(axis: Axis, config: EdgeResolverConfig) -> Self {
        Self { axis, config }
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    /// Resolves `pointer` against `target` rendered at `rect`.
    ///
    /// Before the midpoint is `Before`; at or after it is `After`.
    pub fn resolve(&self, pointer: Point, target: TargetRef, rect: Rect) -> Resolution {
        if !rect.contains(pointer) {
            return Resolution::Outside;
        }

        let (start, end) = rect.span(self.axis);
        let position = pointer.along(self.axis);
        // Keep a decision band on small targets.
        let dead_zone = self.config.dead_zone.max(0.0).min((end - start) / 4.0);
        if position < start + dead_zone || position > end - dead_zone {
            return Resolution::DeadZone;
        }

        let midpoint = start + (end - start) / 2.0;
        let edge = if position < midpoint {
            Edge::Before
        } else {
            Edge::After
        };
        Resolution::Hit(EdgeHit { target, edge })
    }
}

#[cfg(test)]
mod tests {
    use super::{Axis, Edge, EdgeResolver, EdgeResolverConfig, Point, Rect, Resolution, TargetRef};
    use uuid::Uuid;

    fn card() -> TargetRef {
        TargetRef::Member {
            member_id: Uuid::new_v4(),
            container_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn vertical_axis_splits_on_midpoint() {
        let resolver = EdgeResolver::new(Axis::Vertical);
        let target = card();
        let rect = Rect::new(0.0, 100.0, 200.0, 40.0);

        let above = resolver.resolve(Point::new(50.0, 110.0), target, rect);
        assert_eq!(above.hit().map(|hit| hit.edge), Some(Edge::Before));

        let at_mid = resolver.resolve(Point::new(50.0, 120.0), target, rect);
        assert_eq!(at_mid.hit().map(|hit| hit.edge), Some(Edge::After));

        let below = resolver.resolve(Point::new(50.0, 130.0), target, rect);
        assert_eq!(below.hit().map(|hit| hit.target), Some(target));
    }

    #[test]
    fn horizontal_axis_uses_x() {
        let resolver = EdgeResolver::new(Axis::Horizontal);
        let rect = Rect::new(300.0, 0.0, 280.0, 600.0);
        let hit = resolver
            .resolve(Point::new(320.0, 590.0), card(), rect)
            .hit()
            .unwrap();
        assert_eq!(hit.edge, Edge::Before);
        let hit = resolver
            .resolve(Point::new(560.0, 10.0), card(), rect)
            .hit()
            .unwrap();
        assert_eq!(hit.edge, Edge::After);
    }

    #[test]
    fn seam_between_stacked_targets_is_dead() {
        let resolver = EdgeResolver::new(Axis::Vertical);
        let upper = Rect::new(0.0, 0.0, 100.0, 40.0);
        let lower = Rect::new(0.0, 40.0, 100.0, 40.0);
        let seam = Point::new(10.0, 40.0);

        assert_eq!(resolver.resolve(seam, card(), upper), Resolution::DeadZone);
        assert_eq!(resolver.resolve(seam, card(), lower), Resolution::DeadZone);
    }

    #[test]
    fn outside_pointer_is_not_a_target() {
        let resolver = EdgeResolver::new(Axis::Vertical);
        let rect = Rect::new(0.0, 0.0, 100.0, 40.0);
        assert_eq!(
            resolver.resolve(Point::new(101.0, 20.0), card(), rect),
            Resolution::Outside
        );
    }

    #[test]
    fn dead_zone_shrinks_on_small_targets() {
        let resolver =
            EdgeResolver::with_config(Axis::Vertical, EdgeResolverConfig { dead_zone: 50.0 });
        let rect = Rect::new(0.0, 0.0, 100.0, 20.0);
        let hit = resolver.resolve(Point::new(5.0, 6.0), card(), rect);
        assert_eq!(hit.hit().map(|hit| hit.edge), Some(Edge::Before));
    }

    #[test]
    fn repeated_resolution_is_stable() {
        let resolver = EdgeResolver::new(Axis::Vertical);
        let target = card();
        let rect = Rect::new(0.0, 0.0, 100.0, 40.0);
        let pointer = Point::new(10.0, 25.0);
        let first = resolver.resolve(pointer, target, rect);
        for _ in 0..10 {
            assert_eq!(resolver.resolve(pointer, target, rect), first);
        }
    }
}
