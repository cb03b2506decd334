//! Post service
//!
//! Writing, editing and deleting posts, post detail pages, and storage of
//! uploaded images under `upload.path`.

use crate::config::UploadConfig;
use crate::db::repositories::{CommentRepository, GroupRepository, PostRepository};
use crate::models::{CommentWithAuthor, Post, PostView, UpdatePostInput, User};
use crate::services::forms::{FormErrors, PostForm, ValidPost};
use anyhow::Context;
use std::sync::Arc;

/// Subdirectory of the media root holding post images
const POST_IMAGE_DIR: &str = "posts";

/// Error types for post operations
#[derive(Debug, thiserror::Error)]
pub enum PostServiceError {
    /// No post has the requested ID
    #[error("Post not found: {0}")]
    NotFound(i64),

    /// The user is not the post's author
    #[error("User {user_id} is not the author of post {post_id}")]
    NotAuthor { post_id: i64, user_id: i64 },

    /// Form input rejected
    #[error("Validation error: {0}")]
    Validation(FormErrors),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// An uploaded image as received from a multipart form
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: Option<String>,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// A post with its comments, oldest first
#[derive(Debug, Clone, serde::Serialize)]
pub struct PostDetail {
    pub post: PostView,
    pub comments: Vec<CommentWithAuthor>,
}

/// Post service
pub struct PostService {
    posts: Arc<dyn PostRepository>,
    groups: Arc<dyn GroupRepository>,
    comments: Arc<dyn CommentRepository>,
    upload: UploadConfig,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        groups: Arc<dyn GroupRepository>,
        comments: Arc<dyn CommentRepository>,
        upload: UploadConfig,
    ) -> Self {
        Self {
            posts,
            groups,
            comments,
            upload,
        }
    }

    /// Publish a new post by `author`.
    pub async fn create(
        &self,
        author: &User,
        form: &PostForm,
        image: Option<ImageUpload>,
    ) -> Result<Post, PostServiceError> {
        let valid = self.clean(form, image.as_ref()).await?;
        let image_path = match image {
            Some(image) => Some(self.store_image(&image).await?),
            None => None,
        };

        let post = Post::new(author.id, valid.text, valid.group_id, image_path);
        let created = self.posts.create(&post).await.context("Failed to create post")?;
        tracing::info!("Post {} created by {}", created.id, author.username);
        Ok(created)
    }

    /// Post joined with author, group and comments
    pub async fn get_detail(&self, id: i64) -> Result<PostDetail, PostServiceError> {
        let post = self
            .posts
            .get_view(id)
            .await
            .context("Failed to get post")?
            .ok_or(PostServiceError::NotFound(id))?;
        let comments = self
            .comments
            .list_by_post(id)
            .await
            .context("Failed to list comments")?;
        Ok(PostDetail { post, comments })
    }

    /// Load a post for editing by `editor`.
    ///
    /// # Errors
    /// - `NotFound` if the post does not exist
    /// - `NotAuthor` if `editor` did not write it
    pub async fn get_for_edit(&self, editor: &User, id: i64) -> Result<Post, PostServiceError> {
        let post = self
            .posts
            .get_by_id(id)
            .await
            .context("Failed to get post")?
            .ok_or(PostServiceError::NotFound(id))?;
        if post.author_id != editor.id {
            return Err(PostServiceError::NotAuthor {
                post_id: id,
                user_id: editor.id,
            });
        }
        Ok(post)
    }

    /// Replace text, group and optionally the image of a post. The author stays.
    pub async fn update(
        &self,
        editor: &User,
        id: i64,
        form: &PostForm,
        image: Option<ImageUpload>,
    ) -> Result<Post, PostServiceError> {
        self.get_for_edit(editor, id).await?;
        let valid = self.clean(form, image.as_ref()).await?;
        let image_path = match image {
            Some(image) => Some(self.store_image(&image).await?),
            None => None,
        };

        let input = UpdatePostInput {
            text: valid.text,
            group_id: valid.group_id,
            image: image_path,
        };
        let updated = self
            .posts
            .update(id, &input)
            .await
            .context("Failed to update post")?
            .ok_or(PostServiceError::NotFound(id))?;
        tracing::info!("Post {} edited by {}", id, editor.username);
        Ok(updated)
    }

    /// Delete a post written by `user`. Cached pages are left alone.
    pub async fn delete(&self, user: &User, id: i64) -> Result<(), PostServiceError> {
        self.get_for_edit(user, id).await?;
        self.posts.delete(id).await.context("Failed to delete post")?;
        tracing::info!("Post {} deleted by {}", id, user.username);
        Ok(())
    }

    /// Run form validation plus the checks that need the database.
    async fn clean(&self, form: &PostForm, image: Option<&ImageUpload>) -> Result<ValidPost, PostServiceError> {
        let mut errors = FormErrors::new();
        let valid = match form.validate() {
            Ok(valid) => Some(valid),
            Err(form_errors) => {
                errors = form_errors;
                None
            }
        };

        if let Some(group_id) = valid.as_ref().and_then(|v| v.group_id) {
            let exists = self
                .groups
                .get_by_id(group_id)
                .await
                .context("Failed to get group")?
                .is_some();
            if !exists {
                errors.add("group", "Select a valid choice.");
            }
        }

        if let Some(image) = image {
            if !self.upload.is_type_allowed(&image.content_type) {
                errors.add("image", format!("Unsupported image type: {}", image.content_type));
            }
            if image.data.len() as u64 > self.upload.max_file_size {
                errors.add(
                    "image",
                    format!("Image is larger than {} bytes.", self.upload.max_file_size),
                );
            }
        }

        match valid {
            Some(valid) if errors.is_empty() => Ok(valid),
            _ => Err(PostServiceError::Validation(errors)),
        }
    }

    /// Write an image below the media root, returning its relative path.
    async fn store_image(&self, image: &ImageUpload) -> anyhow::Result<String> {
        let extension = self.upload.get_extension(&image.content_type);
        let file_name = format!("{}.{}", uuid::Uuid::new_v4(), extension);
        let dir = self.upload.path.join(POST_IMAGE_DIR);

        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create upload directory: {:?}", dir))?;
        let path = dir.join(&file_name);
        tokio::fs::write(&path, &image.data)
            .await
            .with_context(|| format!("Failed to write upload: {:?}", path))?;

        tracing::debug!(
            "Stored image {:?} ({} bytes) as {:?}",
            image.file_name,
            image.data.len(),
            path
        );
        Ok(format!("{}/{}", POST_IMAGE_DIR, file_name))
    }
}
