//! Port describing where posts come from.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::posts::{Post, PostsPage};

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("content request failed: {0}")]
    Transport(String),
    #[error("content API answered with status {status}")]
    Status { status: u16 },
    #[error("content response could not be decoded: {0}")]
    Decode(String),
}

impl ContentError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    pub fn decode(err: impl std::fmt::Display) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Read access to published posts.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Fetch one listing page. `page` is 1-based.
    async fn list_posts(&self, page: u32, per_page: u32) -> Result<PostsPage, ContentError>;

    /// Fetch the post with `slug`, or `None` when nothing matches.
    async fn find_post_by_slug(&self, slug: &str) -> Result<Option<Post>, ContentError>;
}
