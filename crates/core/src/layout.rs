#![forbid(unsafe_code)]

//! Deterministic radial placement for spawned children.
//!
//! The root fans out in three fixed directions starting straight up. Every
//! later generation opens a ±30° wedge around the bearing from grandparent to
//! parent, so subtrees keep radiating away from their ancestor line.

use crate::node::Position;
use std::f64::consts::PI;

/// Distance between a parent and each of its children, for every generation.
pub const LAYOUT_RADIUS: f64 = 150.0;

const ROOT_FAN_OUT: usize = 3;
const ROOT_START_ANGLE: f64 = -PI / 2.0;
const BRANCH_HALF_WEDGE: f64 = PI / 6.0;

pub fn polar_offset(center: Position, radius: f64, angle: f64) -> Position {
    Position {
        x: center.x + radius * angle.cos(),
        y: center.y + radius * angle.sin(),
    }
}

pub fn branch_angles(parent: Position, grandparent: Option<Position>, is_root: bool) -> Vec<f64> {
    if is_root {
        return (0..ROOT_FAN_OUT)
            .map(|i| ROOT_START_ANGLE + (i as f64) * 2.0 * PI / (ROOT_FAN_OUT as f64))
            .collect();
    }
    let direction = match grandparent {
        Some(gp) => (parent.y - gp.y).atan2(parent.x - gp.x),
        None => 0.0,
    };
    vec![direction - BRANCH_HALF_WEDGE, direction + BRANCH_HALF_WEDGE]
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChildSlot {
    pub order: u32,
    pub angle: f64,
    pub position: Position,
}

/// One slot per branch angle, with the order index the child will carry.
pub fn child_slots(parent: Position, grandparent: Option<Position>, is_root: bool) -> Vec<ChildSlot> {
    branch_angles(parent, grandparent, is_root)
        .into_iter()
        .enumerate()
        .map(|(i, angle)| ChildSlot {
            order: i as u32,
            angle,
            position: polar_offset(parent, LAYOUT_RADIUS, angle),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EPS: f64 = 1e-9;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < EPS
    }

    #[test]
    fn polar_offset_on_axes() {
        let origin = Position::new(0.0, 0.0);
        let east = polar_offset(origin, 150.0, 0.0);
        assert!(close(east.x, 150.0) && close(east.y, 0.0));

        let south = polar_offset(origin, 150.0, PI / 2.0);
        assert!(close(south.x, 0.0) && close(south.y, 150.0));
    }

    #[test]
    fn root_fans_out_in_three_directions() {
        let angles = branch_angles(Position::new(300.0, 300.0), None, true);
        assert_eq!(angles.len(), 3);
        assert!(close(angles[0].to_degrees(), -90.0));
        assert!(close(angles[1].to_degrees(), 30.0));
        assert!(close(angles[2].to_degrees(), 150.0));
    }

    #[test]
    fn non_root_wedges_around_grandparent_bearing() {
        let gp = Position::new(0.0, 0.0);
        let parent = Position::new(100.0, 0.0);
        let angles = branch_angles(parent, Some(gp), false);
        assert_eq!(angles.len(), 2);
        assert!(close(angles[0].to_degrees(), -30.0));
        assert!(close(angles[1].to_degrees(), 30.0));
    }

    #[test]
    fn missing_grandparent_defaults_to_zero_bearing() {
        let angles = branch_angles(Position::new(5.0, 5.0), None, false);
        assert!(close(angles[0], -PI / 6.0));
        assert!(close(angles[1], PI / 6.0));
    }

    #[test]
    fn child_slots_carry_order_and_radius() {
        let parent = Position::new(300.0, 300.0);
        let slots = child_slots(parent, None, true);
        assert_eq!(
            slots.iter().map(|s| s.order).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        let top = slots[0].position;
        assert!(close(top.x, 300.0));
        assert!(close(top.y, 150.0));
    }

    proptest! {
        #[test]
        fn children_sit_on_layout_radius(
            px in -1e4f64..1e4,
            py in -1e4f64..1e4,
            gx in -1e4f64..1e4,
            gy in -1e4f64..1e4,
            is_root in any::<bool>(),
        ) {
            let parent = Position::new(px, py);
            let slots = child_slots(parent, Some(Position::new(gx, gy)), is_root);
            prop_assert_eq!(slots.len(), if is_root { 3 } else { 2 });
            for slot in slots {
                let d = (slot.position.x - px).hypot(slot.position.y - py);
                prop_assert!((d - LAYOUT_RADIUS).abs() < 1e-6);
            }
        }

        #[test]
        fn branch_wedge_is_sixty_degrees(
            px in -1e4f64..1e4,
            py in -1e4f64..1e4,
            gx in -1e4f64..1e4,
            gy in -1e4f64..1e4,
        ) {
            let angles = branch_angles(Position::new(px, py), Some(Position::new(gx, gy)), false);
            prop_assert!((angles[1] - angles[0] - PI / 3.0).abs() < 1e-9);
        }
    }
}
