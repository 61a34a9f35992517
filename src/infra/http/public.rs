use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, RawQuery, State},
    http::{HeaderValue, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{MethodFilter, MethodRouter, get, on},
};
use tracing::debug;

use crate::{
    application::{
        error::HttpError,
        render::{PagePayload, PageTemplate, Renderer},
        writings::WritingsService,
    },
    config::SiteProfile,
    infra::assets,
};

use super::middleware::{log_responses, set_request_context};

const WRITING_TITLE: &str = "Writing";

#[derive(Clone)]
pub struct HttpState {
    pub writings: Arc<WritingsService>,
    pub renderer: Arc<dyn Renderer>,
}

impl HttpState {
    pub fn new(writings: Arc<WritingsService>, renderer: Arc<dyn Renderer>) -> Self {
        Self { writings, renderer }
    }
}

/// Public site routes for the given profile, wrapped in the request logging layers.
pub fn build_router(state: HttpState, profile: SiteProfile) -> Router {
    let router = Router::new()
        .route("/", static_page(PageTemplate::Home, "Home"))
        .route(
            "/go-cheat-sheet/",
            static_page(PageTemplate::GoCheatSheet, "Go Cheat Sheet"),
        )
        .route(
            "/git-cheat-sheet/",
            static_page(PageTemplate::GitCheatSheet, "Git Cheat Sheet"),
        )
        .route(
            "/life-tradeoff/",
            static_page(PageTemplate::LifeTradeoff, "Life Trade Off"),
        )
        .route("/go-cheat-sheet", redirect_to("/go-cheat-sheet/"))
        .route("/git-cheat-sheet", redirect_to("/git-cheat-sheet/"))
        .route("/life-tradeoff", redirect_to("/life-tradeoff/"))
        .route("/writings", get(writings_list))
        .route("/writings/", get(writings_list))
        .route("/writing", detail_route(on(MethodFilter::GET, not_found)))
        .route("/writing/", detail_route(on(MethodFilter::GET, not_found)))
        .route("/writing/{*slug}", detail_route(on(MethodFilter::GET, post_detail)))
        .route("/static/{*path}", get(assets::serve_static));

    let router = match profile {
        SiteProfile::Universe => router
            .route(
                "/distributed-universe/",
                static_page(
                    PageTemplate::DistributedUniverse,
                    "Distributed System Universe",
                ),
            )
            .route("/distributed-universe", redirect_to("/distributed-universe/")),
        SiteProfile::About => router
            .route("/about/", static_page(PageTemplate::About, "About"))
            .route("/about", redirect_to("/about/")),
    };

    router
        .fallback(not_found)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

fn static_page(template: PageTemplate, title: &'static str) -> MethodRouter<HttpState> {
    get(move |State(state): State<HttpState>| async move {
        state.renderer.render(template, title, PagePayload::Empty)
    })
}

fn redirect_to(location: &'static str) -> MethodRouter<HttpState> {
    get(move || async move {
        (
            StatusCode::MOVED_PERMANENTLY,
            [(header::LOCATION, location)],
        )
    })
}

/// Anything but GET under `/writing` is answered before any lookup happens.
/// HEAD needs its own endpoint, otherwise axum routes it to the GET handler.
fn detail_route(route: MethodRouter<HttpState>) -> MethodRouter<HttpState> {
    route
        .head(method_not_allowed)
        .fallback(method_not_allowed)
}

async fn method_not_allowed() -> Response {
    let mut response = HttpError::new(
        "infra::http::public::method_not_allowed",
        StatusCode::METHOD_NOT_ALLOWED,
        "Method Not Allowed",
        "only GET is accepted on post routes",
    )
    .into_response();
    response
        .headers_mut()
        .insert(header::ALLOW, HeaderValue::from_static("GET"));
    response
}

async fn not_found(State(state): State<HttpState>) -> Response {
    state.renderer.render_not_found()
}

async fn writings_list(State(state): State<HttpState>, RawQuery(query): RawQuery) -> Response {
    let page = parse_page(query.as_deref());

    match state.writings.list(page).await {
        Ok(posts) => state
            .renderer
            .render(PageTemplate::WritingList, WRITING_TITLE, PagePayload::Writings(posts)),
        Err(err) => HttpError::from_error(
            "infra::http::public::writings_list",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to fetch posts",
            &err,
        )
        .into_response(),
    }
}

async fn post_detail(State(state): State<HttpState>, Path(slug): Path<String>) -> Response {
    let slug = slug.trim_end_matches('/');
    if slug.is_empty() {
        return state.renderer.render_not_found();
    }

    match state.writings.post(slug).await {
        Ok(Some(post)) => {
            let title = post.title_html.clone();
            state
                .renderer
                .render(PageTemplate::PostDetail, &title, PagePayload::Post(post))
        }
        Ok(None) => {
            debug!(slug, "post not found");
            state.renderer.render_not_found()
        }
        Err(err) => HttpError::from_error(
            "infra::http::public::post_detail",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to load post",
            &err,
        )
        .into_response(),
    }
}

/// Page number from the first `page` query parameter; anything but a positive integer is 1.
pub fn parse_page(query: Option<&str>) -> u32 {
    query
        .and_then(|raw| {
            url::form_urlencoded::parse(raw.as_bytes())
                .find(|(name, _)| name == "page")
                .map(|(_, value)| value.into_owned())
        })
        .and_then(|value| value.parse::<u32>().ok())
        .filter(|page| *page > 0)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::parse_page;

    #[test]
    fn missing_page_defaults_to_first() {
        assert_eq!(parse_page(None), 1);
        assert_eq!(parse_page(Some("")), 1);
        assert_eq!(parse_page(Some("sort=asc")), 1);
    }

    #[test]
    fn invalid_pages_fall_back_to_first() {
        for raw in ["page=abc", "page=0", "page=-3", "page=", "page=1.5"] {
            assert_eq!(parse_page(Some(raw)), 1, "query {raw}");
        }
    }

    #[test]
    fn first_occurrence_wins() {
        assert_eq!(parse_page(Some("page=3&page=7")), 3);
        assert_eq!(parse_page(Some("x=1&page=4")), 4);
    }

    #[test]
    fn out_of_range_is_first_page() {
        assert_eq!(parse_page(Some("page=99999999999")), 1);
    }
}
