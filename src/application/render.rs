//! Rendering capability injected into request handlers.

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::application::error::HttpError;
use crate::domain::posts::{Post, PostsPage};

/// Pages the site knows how to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageTemplate {
    Home,
    GoCheatSheet,
    GitCheatSheet,
    LifeTradeoff,
    About,
    DistributedUniverse,
    WritingList,
    PostDetail,
}

impl PageTemplate {
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Home => "home.html",
            Self::GoCheatSheet => "gocheatsheet.html",
            Self::GitCheatSheet => "gitcheatsheet.html",
            Self::LifeTradeoff => "age.html",
            Self::About => "about.html",
            Self::DistributedUniverse => "distributed-universe.html",
            Self::WritingList => "writing_list.html",
            Self::PostDetail => "post.html",
        }
    }
}

/// Data handed to a template alongside its title.
#[derive(Debug, Clone)]
pub enum PagePayload {
    Empty,
    Writings(Arc<PostsPage>),
    Post(Post),
}

impl PagePayload {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Writings(_) => "writings",
            Self::Post(_) => "post",
        }
    }
}

/// Turns a template, a page title and a payload into a complete response.
pub trait Renderer: Send + Sync {
    fn render(&self, template: PageTemplate, title: &str, payload: PagePayload) -> Response;

    /// Response for a route or resource that does not exist.
    fn render_not_found(&self) -> Response {
        HttpError::new(
            "application::render::render_not_found",
            StatusCode::NOT_FOUND,
            "Not Found",
            "Resource not found",
        )
        .into_response()
    }
}
