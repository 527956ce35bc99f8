#![forbid(unsafe_code)]

//! JSON records exchanged with the persistence service.
//!
//! Deployed servers disagree on field names (`state` vs `status`, `pos_x` vs
//! `x`, `order_index` vs `order`) and on whether ids are integers or strings.
//! Decoding accepts all of them; encoding always uses the canonical names.

use crate::error::{SyncError, SyncResult};
use serde::{Deserialize, Deserializer, Serialize};
use sp_core::{Node, NodeContent, NodeId, NodeState, Position, Tag, TagId};
use std::collections::BTreeSet;

#[derive(Deserialize)]
#[serde(untagged)]
enum WireId {
    Int(i64),
    Str(String),
}

impl WireId {
    fn into_string(self) -> String {
        match self {
            WireId::Int(value) => value.to_string(),
            WireId::Str(value) => value,
        }
    }
}

fn de_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    WireId::deserialize(deserializer).map(WireId::into_string)
}

fn de_opt_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<WireId>::deserialize(deserializer)?.map(WireId::into_string))
}

fn de_ids<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(Option::<Vec<WireId>>::deserialize(deserializer)?
        .unwrap_or_default()
        .into_iter()
        .map(WireId::into_string)
        .collect())
}

#[derive(Clone, Debug, Deserialize)]
pub struct NodeRecord {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, alias = "status")]
    pub state: Option<String>,
    #[serde(default, alias = "x")]
    pub pos_x: Option<f64>,
    #[serde(default, alias = "y")]
    pub pos_y: Option<f64>,
    #[serde(default)]
    pub depth: Option<u32>,
    #[serde(default, alias = "order")]
    pub order_index: Option<u32>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub parent_id: Option<String>,
    #[serde(default, deserialize_with = "de_ids")]
    pub tags: Vec<String>,
}

impl NodeRecord {
    /// Client-only flags (`generated`, `frozen`) start cleared; the engine
    /// carries them over from its local copy when merging.
    pub fn into_node(self) -> SyncResult<Node> {
        let state = match self.state.as_deref() {
            None => NodeState::Active,
            Some(raw) => NodeState::parse(raw)
                .ok_or_else(|| SyncError::Decode(format!("unknown node state {raw:?}")))?,
        };
        let parent_id = self.parent_id.map(NodeId::try_new).transpose()?;
        let tags = self
            .tags
            .into_iter()
            .map(TagId::try_new)
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(Node {
            id: NodeId::try_new(self.id)?,
            content: NodeContent::from_wire(self.content.as_deref().unwrap_or_default()),
            position: Position::new(self.pos_x.unwrap_or(0.0), self.pos_y.unwrap_or(0.0)),
            depth: self.depth.unwrap_or(0),
            order_index: self.order_index.unwrap_or(0),
            parent_id,
            state,
            generated: false,
            frozen: false,
            tags,
        })
    }
}

/// Suggestion endpoints answer with either one record or a list.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub(crate) fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct CreateNodeBody {
    pub content: String,
    pub pos_x: f64,
    pub pos_y: f64,
    pub depth: u32,
    pub order: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct SuggestBody {
    pub ai_prompt: String,
    pub pos_x: f64,
    pub pos_y: f64,
    pub depth: u32,
    pub order: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub count: u32,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct UpdateNodeBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pos_x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pos_y: Option<f64>,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct TagBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TagRecord {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub node_count: Option<u32>,
    #[serde(default)]
    pub summary: Option<String>,
}

impl TagRecord {
    pub fn into_tag(self) -> SyncResult<Tag> {
        Ok(Tag {
            id: TagId::try_new(self.id)?,
            name: self.name,
            description: self.description,
            color: self.color,
            node_count: self.node_count.unwrap_or(0),
            summary: self.summary.filter(|s| !s.is_empty()),
        })
    }
}

/// Error bodies are `{"detail": "..."}` on the reference server; anything else
/// is passed through as text.
pub(crate) fn error_detail(body: &str) -> String {
    #[derive(Deserialize)]
    struct Detail {
        detail: serde_json::Value,
    }
    match serde_json::from_str::<Detail>(body) {
        Ok(Detail {
            detail: serde_json::Value::String(text),
        }) => text,
        Ok(Detail { detail }) => detail.to_string(),
        Err(_) => body.trim().to_string(),
    }
}
