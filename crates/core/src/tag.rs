#![forbid(unsafe_code)]

use crate::ids::TagId;

const MAX_TAG_NAME_LEN: usize = 64;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub node_count: u32,
    pub summary: Option<String>,
}

/// Optional fields for tag creation and update.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TagDraft {
    pub name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
}

pub fn normalize_tag_name(name: &str) -> Result<String, TagNameError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(TagNameError::Empty);
    }
    if trimmed.chars().any(|c| c.is_control()) {
        return Err(TagNameError::ContainsControl);
    }
    if trimmed.chars().count() > MAX_TAG_NAME_LEN {
        return Err(TagNameError::TooLong);
    }
    Ok(trimmed.split_whitespace().collect::<Vec<_>>().join(" "))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TagNameError {
    Empty,
    TooLong,
    ContainsControl,
}

impl TagNameError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Empty => "tag name must not be empty",
            Self::TooLong => "tag name is too long",
            Self::ContainsControl => "tag name contains control characters",
        }
    }
}

impl std::fmt::Display for TagNameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for TagNameError {}
