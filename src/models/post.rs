//! Post model
//!
//! - `Post` entity
//! - `PostView`, a post joined with its author and group for rendering
//! - `PostFilter`, the row selections feeds are built from

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Post entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Unique identifier
    pub id: i64,
    /// Body text
    pub text: String,
    /// Stored image path relative to the media root
    pub image: Option<String>,
    /// Group the post is filed under
    pub group_id: Option<i64>,
    /// Author user ID, fixed at creation
    pub author_id: i64,
    /// Publication timestamp
    pub created_at: DateTime<Utc>,
}

impl Post {
    /// Build an unsaved post dated now
    pub fn new(author_id: i64, text: String, group_id: Option<i64>, image: Option<String>) -> Self {
        Self {
            id: 0, // Will be set by database
            text,
            image,
            group_id,
            author_id,
            created_at: Utc::now(),
        }
    }
}

/// Post plus the author and group fields every listing shows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub author_username: String,
    pub group_title: Option<String>,
    pub group_slug: Option<String>,
}

/// Editable fields of a post. The author never changes.
#[derive(Debug, Clone)]
pub struct UpdatePostInput {
    pub text: String,
    pub group_id: Option<i64>,
    /// Replacement image; `None` keeps the current one
    pub image: Option<String>,
}

/// Which posts a listing selects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostFilter {
    /// Every post
    All,
    /// Posts filed under a group
    Group(i64),
    /// Posts written by a user
    Author(i64),
    /// Posts written by anyone the given user follows
    FollowedBy(i64),
}

impl PostFilter {
    /// SQL condition on the `p` alias and the id bound to its single placeholder.
    pub(crate) fn where_clause(&self) -> (&'static str, Option<i64>) {
        match *self {
            PostFilter::All => ("", None),
            PostFilter::Group(id) => ("WHERE p.group_id = ?", Some(id)),
            PostFilter::Author(id) => ("WHERE p.author_id = ?", Some(id)),
            PostFilter::FollowedBy(id) => (
                "WHERE p.author_id IN (SELECT f.author_id FROM follows f WHERE f.user_id = ?)",
                Some(id),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_has_no_condition() {
        assert_eq!(PostFilter::All.where_clause(), ("", None));
    }

    #[test]
    fn test_filters_bind_their_id() {
        assert_eq!(PostFilter::Group(3).where_clause().1, Some(3));
        assert_eq!(PostFilter::Author(4).where_clause().1, Some(4));
        let (sql, id) = PostFilter::FollowedBy(5).where_clause();
        assert!(sql.contains("follows"));
        assert_eq!(id, Some(5));
    }

    #[test]
    fn test_view_serializes_flat() {
        let view = PostView {
            post: Post::new(1, "hello".to_string(), None, None),
            author_username: "leo".to_string(),
            group_title: None,
            group_slug: None,
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["text"], "hello");
        assert_eq!(json["author_username"], "leo");
    }
}
