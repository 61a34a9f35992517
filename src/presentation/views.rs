use std::sync::Arc;

use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::OffsetDateTime;

use crate::{
    application::{
        error::{ErrorReport, HttpError},
        render::{PagePayload, PageTemplate, Renderer},
    },
    domain::posts::{Post, PostsPage},
};

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Values every page shares: the `<title>`, the footer year and the page body.
#[derive(Clone, Debug)]
pub struct LayoutContext<T> {
    pub title: String,
    pub year: i32,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(title: impl Into<String>, content: T) -> Self {
        Self {
            title: title.into(),
            year: OffsetDateTime::now_utc().year(),
            content,
        }
    }
}

#[derive(Template)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub view: LayoutContext<()>,
}

#[derive(Template)]
#[template(path = "gocheatsheet.html")]
pub struct GoCheatSheetTemplate {
    pub view: LayoutContext<()>,
}

#[derive(Template)]
#[template(path = "gitcheatsheet.html")]
pub struct GitCheatSheetTemplate {
    pub view: LayoutContext<()>,
}

#[derive(Template)]
#[template(path = "age.html")]
pub struct LifeTradeoffTemplate {
    pub view: LayoutContext<()>,
}

#[derive(Template)]
#[template(path = "about.html")]
pub struct AboutTemplate {
    pub view: LayoutContext<()>,
}

/// Rendered inside the full-screen `layout.html` shell rather than `base.html`.
#[derive(Template)]
#[template(path = "distributed-universe.html")]
pub struct DistributedUniverseTemplate {
    pub view: LayoutContext<()>,
}

#[derive(Template)]
#[template(path = "writing_list.html")]
pub struct WritingListTemplate {
    pub view: LayoutContext<Arc<PostsPage>>,
}

#[derive(Template)]
#[template(path = "post.html")]
pub struct PostTemplate {
    pub view: LayoutContext<Post>,
}

pub struct ErrorPageView {
    pub title: &'static str,
    pub message: &'static str,
    pub action_href: &'static str,
    pub action_label: &'static str,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            title: "Page Not Found",
            message: "The page you requested does not exist. Try returning to the homepage to continue exploring.",
            action_href: "/",
            action_label: "Back to home",
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}

pub fn render_not_found_response() -> Response {
    let content = ErrorPageView::not_found();
    let view = LayoutContext::new(content.title, content);
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

/// [`Renderer`] backed by the compiled askama templates.
#[derive(Clone, Copy, Debug, Default)]
pub struct AskamaRenderer;

impl Renderer for AskamaRenderer {
    fn render(&self, template: PageTemplate, title: &str, payload: PagePayload) -> Response {
        let ok = StatusCode::OK;
        match (template, payload) {
            (PageTemplate::Home, PagePayload::Empty) => {
                render_template_response(HomeTemplate { view: LayoutContext::new(title, ()) }, ok)
            }
            (PageTemplate::GoCheatSheet, PagePayload::Empty) => render_template_response(
                GoCheatSheetTemplate {
                    view: LayoutContext::new(title, ()),
                },
                ok,
            ),
            (PageTemplate::GitCheatSheet, PagePayload::Empty) => render_template_response(
                GitCheatSheetTemplate {
                    view: LayoutContext::new(title, ()),
                },
                ok,
            ),
            (PageTemplate::LifeTradeoff, PagePayload::Empty) => render_template_response(
                LifeTradeoffTemplate {
                    view: LayoutContext::new(title, ()),
                },
                ok,
            ),
            (PageTemplate::About, PagePayload::Empty) => {
                render_template_response(AboutTemplate { view: LayoutContext::new(title, ()) }, ok)
            }
            (PageTemplate::DistributedUniverse, PagePayload::Empty) => render_template_response(
                DistributedUniverseTemplate {
                    view: LayoutContext::new(title, ()),
                },
                ok,
            ),
            (PageTemplate::WritingList, PagePayload::Writings(page)) => render_template_response(
                WritingListTemplate {
                    view: LayoutContext::new(title, page),
                },
                ok,
            ),
            (PageTemplate::PostDetail, PagePayload::Post(post)) => render_template_response(
                PostTemplate {
                    view: LayoutContext::new(title, post),
                },
                ok,
            ),
            (template, payload) => HttpError::new(
                "presentation::views::AskamaRenderer::render",
                StatusCode::INTERNAL_SERVER_ERROR,
                "Render error",
                format!(
                    "template `{}` cannot render a `{}` payload",
                    template.file_name(),
                    payload.kind()
                ),
            )
            .into_response(),
        }
    }

    fn render_not_found(&self) -> Response {
        render_not_found_response()
    }
}
