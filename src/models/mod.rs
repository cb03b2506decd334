//! Data models
//!
//! Database entities (User, Session, Group, Post, Comment), the
//! joined read models handed to templates, and pagination types.

mod comment;
mod group;
mod pagination;
mod post;
mod session;
mod user;

pub use comment::{Comment, CommentWithAuthor, CreateCommentInput};
pub use group::{CreateGroupInput, Group};
pub use pagination::{num_pages, offset, parse_page_number, resolve_page, PagedResult};
pub use post::{Post, PostFilter, PostView, UpdatePostInput};
pub use session::Session;
pub use user::User;
