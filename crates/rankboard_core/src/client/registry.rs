//! Scoped registry of rendered drop targets.
//!
//! One registry exists per drag layer (cards within columns, columns within
//! a board) and is handed to the gesture explicitly; there is no global
//! element table.

use crate::client::edge::{
    Axis, EdgeResolver, EdgeResolverConfig, Point, Rect, Resolution, TargetRef,
};
use std::collections::HashMap;
use uuid::Uuid;

/// Geometry of one registered target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegisteredTarget {
    pub target: TargetRef,
    pub rect: Rect,
}

/// Drop targets of one drag layer, keyed by member or container id.
///
/// The layer's resolver is built from its layout axis, so targets are always
/// split along the axis they are stacked on.
#[derive(Debug, Clone, PartialEq)]
pub struct DropTargetRegistry {
    resolver: EdgeResolver,
    targets: HashMap<Uuid, RegisteredTarget>,
}

impl DropTargetRegistry {
    pub fn new(axis: Axis) -> Self {
        Self::with_config(axis, EdgeResolverConfig::default())
    }

    pub fn with_config(axis: Axis, config: EdgeResolverConfig) -> Self {
        Self {
            resolver: EdgeResolver::with_config(axis, config),
            targets: HashMap::new(),
        }
    }

    /// Layout axis of the members in this layer.
    pub fn axis(&self) -> Axis {
        self.resolver.axis()
    }

    pub fn resolver(&self) -> &EdgeResolver {
        &self.resolver
    }

    /// Registers or re-measures a target.
    pub fn register(&mut self, target: TargetRef, rect: Rect) {
        self.targets
            .insert(target_key(&target), RegisteredTarget { target, rect });
    }

    /// Removes a target, returning its last geometry.
    pub fn unregister(&mut self, id: Uuid) -> Option<RegisteredTarget> {
        self.targets.remove(&id)
    }

    pub fn get(&self, id: Uuid) -> Option<&RegisteredTarget> {
        self.targets.get(&id)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn clear(&mut self) {
        self.targets.clear();
    }

    /// Resolves `point` against the innermost target under it.
    pub fn resolve(&self, point: Point) -> Resolution {
        self.hit_test(point)
            .map(|entry| self.resolver.resolve(point, entry.target, entry.rect))
            .unwrap_or(Resolution::Outside)
    }

    /// Returns the innermost target under `point`.
    ///
    /// Members win over the container they are rendered in; among equals the
    /// smallest box wins, then the lowest id so the answer is deterministic.
    pub fn hit_test(&self, point: Point) -> Option<&RegisteredTarget> {
        self.targets
            .values()
            .filter(|entry| entry.rect.contains(point))
            .min_by(|left, right| {
                let left_key = (matches!(left.target, TargetRef::Container { .. }), left.rect.area());
                let right_key = (
                    matches!(right.target, TargetRef::Container { .. }),
                    right.rect.area(),
                );
                left_key
                    .0
                    .cmp(&right_key.0)
                    .then(left_key.1.total_cmp(&right_key.1))
                    .then_with(|| target_key(&left.target).cmp(&target_key(&right.target)))
            })
    }
}

fn target_key(target: &TargetRef) -> Uuid {
    match target {
        TargetRef::Member { member_id, .. } => *member_id,
        TargetRef::Container { container_id } => *container_id,
    }
}

#[cfg(test)]
mod tests {
    use super::DropTargetRegistry;
    use crate::client::edge::{
    Axis, Edge, EdgeResolver, EdgeResolverConfig, Point, Rect, Resolution, TargetRef,
};
    use uuid::Uuid;

    #[test]
    fn member_wins_over_enclosing_container() {
        let column = Uuid::new_v4();
        let card = Uuid::new_v4();
        let mut registry = DropTargetRegistry::new(Axis::Vertical);
        registry.register(
            TargetRef::Container {
                container_id: column,
            },
            Rect::new(0.0, 0.0, 300.0, 800.0),
        );
        registry.register(
            TargetRef::Member {
                member_id: card,
                container_id: column,
            },
            Rect::new(10.0, 50.0, 280.0, 60.0),
        );

        let hit = registry.hit_test(Point::new(20.0, 70.0)).unwrap();
        assert_eq!(hit.target.member_id(), Some(card));

        let hit = registry.hit_test(Point::new(20.0, 500.0)).unwrap();
        assert_eq!(hit.target.member_id(), None);
        assert_eq!(hit.target.container_id(), column);

        assert!(registry.hit_test(Point::new(400.0, 10.0)).is_none());
    }

    #[test]
    fn register_replaces_geometry_and_unregister_removes() {
        let column = Uuid::new_v4();
        let target = TargetRef::Container {
            container_id: column,
        };
        let mut registry = DropTargetRegistry::new(Axis::Horizontal);
        registry.register(target, Rect::new(0.0, 0.0, 10.0, 10.0));
        registry.register(target, Rect::new(100.0, 0.0, 10.0, 10.0));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(column).unwrap().rect.left, 100.0);

        assert!(registry.unregister(column).is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn horizontal_layer_splits_columns_left_and_right() {
        let board = Uuid::new_v4();
        let column = Uuid::new_v4();
        let mut registry = DropTargetRegistry::new(Axis::Horizontal);
        registry.register(
            TargetRef::Member {
                member_id: column,
                container_id: board,
            },
            Rect::new(0.0, 0.0, 300.0, 40.0),
        );

        // Lower half vertically, but left of the horizontal midpoint.
        let left = registry.resolve(Point::new(100.0, 35.0)).hit().unwrap();
        assert_eq!(left.edge, Edge::Before);
        let right = registry.resolve(Point::new(200.0, 5.0)).hit().unwrap();
        assert_eq!(right.edge, Edge::After);
        assert_eq!(registry.resolver().axis(), registry.axis());
        assert_eq!(registry.resolve(Point::new(500.0, 5.0)), Resolution::Outside);
    }
}
