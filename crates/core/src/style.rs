#![forbid(unsafe_code)]

use crate::node::NodeState;

pub const ACTIVE_OPACITY: f32 = 1.0;
pub const GHOST_OPACITY: f32 = 0.3;

const ACTIVE_COLOR: &str = "#0074D9";
const GHOST_COLOR: &str = "#7FB9EC";

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeStyle {
    pub color: &'static str,
    pub opacity: f32,
}

/// Visual policy for a node state. Adapters evaluate this; nothing else
/// decides colors or opacity.
pub fn style_for(state: NodeState) -> NodeStyle {
    match state {
        NodeState::Active => NodeStyle {
            color: ACTIVE_COLOR,
            opacity: ACTIVE_OPACITY,
        },
        NodeState::Ghost => NodeStyle {
            color: GHOST_COLOR,
            opacity: GHOST_OPACITY,
        },
    }
}
