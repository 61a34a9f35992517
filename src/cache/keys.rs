//! Cache key definitions.

use std::fmt;

/// Key of one cached listing page: the page number and the page size it was
/// fetched with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PostsPageKey {
    pub page: u32,
    pub per_page: u32,
}

impl PostsPageKey {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self { page, per_page }
    }
}

impl fmt::Display for PostsPageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "posts:{}:{}", self.page, self.per_page)
    }
}
