//! Services layer - Business logic
//!
//! Services enforce the application's rules on top of the repositories:
//! feed assembly, the follow graph, the page cache, posting and accounts.

pub mod comment;
pub mod feed;
pub mod follow;
pub mod forms;
pub mod group;
pub mod page_cache;
pub mod password;
pub mod post;
pub mod user;

pub use comment::{CommentService, CommentServiceError};
pub use feed::{Feed, FeedContext, FeedError, FeedService, FeedSubject};
pub use follow::{FollowError, FollowService};
pub use forms::{CommentForm, FormErrors, LoginForm, PostForm, SignupForm};
pub use group::{GroupService, GroupServiceError};
pub use page_cache::PageCache;
pub use password::{hash_password, verify_password};
pub use post::{ImageUpload, PostDetail, PostService, PostServiceError};
pub use user::{UserService, UserServiceError};
