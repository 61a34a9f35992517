//! WordPress REST API client backing [`ContentSource`].

use std::{str::FromStr, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, Response, header::HeaderMap};
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use crate::{
    application::content::{ContentError, ContentSource},
    config::ContentSettings,
    domain::posts::{Post, PostsPage},
    infra::error::InfraError,
};

const POSTS_PATH: &str = "wp-json/wp/v2/posts";
const TOTAL_HEADER: &str = "x-wp-total";
const TOTAL_PAGES_HEADER: &str = "x-wp-totalpages";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WpPost {
    title: WpRendered,
    slug: String,
    date: String,
    content: WpRendered,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WpRendered {
    rendered: String,
}

impl From<WpPost> for Post {
    fn from(post: WpPost) -> Self {
        Self {
            title_html: post.title.rendered,
            slug: post.slug,
            date: post.date,
            content_html: post.content.rendered,
        }
    }
}

#[derive(Clone, Debug)]
pub struct WordPressClient {
    client: Client,
    posts_url: Url,
}

impl WordPressClient {
    /// Build a client for the site rooted at `base_url` (which should end with `/`).
    pub fn new(base_url: &Url, request_timeout: Option<Duration>) -> Result<Self, InfraError> {
        let posts_url = base_url.join(POSTS_PATH).map_err(|err| {
            InfraError::http_client(format!("invalid posts endpoint under `{base_url}`: {err}"))
        })?;

        let mut builder = Client::builder().user_agent(Self::user_agent());
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;

        Ok(Self { client, posts_url })
    }

    pub fn from_settings(settings: &ContentSettings) -> Result<Self, InfraError> {
        Self::new(&settings.base_url, settings.request_timeout)
    }

    pub fn user_agent() -> &'static str {
        concat!("vicky-web/", env!("CARGO_PKG_VERSION"))
    }

    pub fn posts_url(&self) -> &Url {
        &self.posts_url
    }

    fn posts_query(&self, pairs: &[(&str, &str)]) -> Url {
        let mut url = self.posts_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.clear();
            for (name, value) in pairs {
                query.append_pair(name, value);
            }
        }
        url
    }

    async fn get_posts(&self, url: Url) -> Result<(HeaderMap, Vec<WpPost>), ContentError> {
        debug!(url = %url, "requesting posts");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(ContentError::transport)?;
        Self::decode(response).await
    }

    async fn decode(response: Response) -> Result<(HeaderMap, Vec<WpPost>), ContentError> {
        let status = response.status();
        if !status.is_success() {
            return Err(ContentError::Status {
                status: status.as_u16(),
            });
        }

        let headers = response.headers().clone();
        let bytes = response.bytes().await.map_err(ContentError::transport)?;
        let posts = serde_json::from_slice(&bytes).map_err(ContentError::decode)?;
        Ok((headers, posts))
    }
}

#[async_trait]
impl ContentSource for WordPressClient {
    #[instrument(skip(self), level = "debug")]
    async fn list_posts(&self, page: u32, per_page: u32) -> Result<PostsPage, ContentError> {
        let url = self.posts_query(&[
            ("page", &page.to_string()),
            ("per_page", &per_page.to_string()),
        ]);
        let (headers, posts) = self.get_posts(url).await?;

        Ok(PostsPage {
            posts: posts.into_iter().map(Post::from).collect(),
            page,
            per_page,
            total: header_number(&headers, TOTAL_HEADER),
            total_pages: header_number(&headers, TOTAL_PAGES_HEADER),
        })
    }

    #[instrument(skip(self), level = "debug")]
    async fn find_post_by_slug(&self, slug: &str) -> Result<Option<Post>, ContentError> {
        let url = self.posts_query(&[("slug", slug)]);
        let (_, posts) = self.get_posts(url).await?;
        Ok(posts.into_iter().next().map(Post::from))
    }
}

/// Parse a numeric header, treating absence or garbage as zero.
fn header_number<T>(headers: &HeaderMap, name: &str) -> T
where
    T: FromStr + Default,
{
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or_default()
}
