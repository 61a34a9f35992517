//! Posts as served by the content API, flattened for presentation.

use serde::Serialize;
use time::{
    PrimitiveDateTime, format_description::FormatItem, macros::format_description,
};

pub const HUMAN_DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[month repr:long] [day padding:none], [year]");
const API_DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");

/// A single published post. `title_html` and `content_html` are already rendered
/// by the content API and are emitted verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Post {
    pub title_html: String,
    pub slug: String,
    pub date: String,
    pub content_html: String,
}

impl Post {
    /// Publication date as "March 4, 2024", or the raw API value when it does not
    /// parse as a local timestamp.
    pub fn published(&self) -> String {
        PrimitiveDateTime::parse(&self.date, API_DATE_FORMAT)
            .ok()
            .and_then(|stamp| stamp.date().format(HUMAN_DATE_FORMAT).ok())
            .unwrap_or_else(|| self.date.clone())
    }

    /// Publication date truncated to `YYYY-MM-DD` for `<time datetime>`.
    pub fn iso_date(&self) -> &str {
        self.date.get(..10).unwrap_or(&self.date)
    }
}

/// One page of posts with the totals reported by the content API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostsPage {
    pub posts: Vec<Post>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub total_pages: u32,
}

impl PostsPage {
    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn previous_page(&self) -> u32 {
        self.page.saturating_sub(1).max(1)
    }

    pub fn next_page(&self) -> u32 {
        self.page.saturating_add(1)
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}
