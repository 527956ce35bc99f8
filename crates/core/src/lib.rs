#![forbid(unsafe_code)]

pub mod ids;
pub mod layout;
pub mod node;
pub mod store;
pub mod style;
pub mod tag;

pub use ids::{IdError, NodeId, ProjectId, TagId};
pub use node::{Node, NodeContent, NodePatch, NodeState, Position, UNFILLED_SENTINEL};
pub use store::{NodeStore, StoreChange, SubscriptionId, TreeIssue};
pub use style::{NodeStyle, style_for};
pub use tag::{Tag, TagDraft, TagNameError, normalize_tag_name};
