//! Group model

use serde::{Deserialize, Serialize};

/// Topical community posts can be filed under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    pub title: String,
    /// URL segment, unique
    pub slug: String,
    pub description: String,
}

/// Input for creating a group
#[derive(Debug, Clone, Deserialize)]
pub struct CreateGroupInput {
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
}
