use std::time::Instant;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode, Uri},
    middleware::Next,
    response::Response,
};
use tracing::Level;
use uuid::Uuid;

use crate::application::error::ErrorReport;

const RESPONSE_TARGET: &str = "vicky::http::response";

#[derive(Clone, Debug)]
pub struct RequestContext {
    pub request_id: String,
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let ctx = RequestContext {
        request_id: Uuid::new_v4().to_string(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    if let Some(failure) = FailedResponse::take(&mut response) {
        failure.log(&method, &uri, start.elapsed().as_millis(), &request_id);
    }
    response
}

/// 4xx/5xx status plus the diagnostic the handler attached, if any.
#[derive(Debug)]
struct FailedResponse {
    status: StatusCode,
    source: &'static str,
    chain: Vec<String>,
}

impl FailedResponse {
    /// Strips the [`ErrorReport`] off failed responses; successes yield `None`.
    fn take(response: &mut Response) -> Option<Self> {
        let status = response.status();
        if !(status.is_client_error() || status.is_server_error()) {
            return None;
        }

        let (source, chain) = match response.extensions_mut().remove::<ErrorReport>() {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        Some(Self {
            status,
            source,
            chain,
        })
    }

    fn detail(&self) -> &str {
        self.chain
            .first()
            .map(String::as_str)
            .unwrap_or("no diagnostic available")
    }

    fn log(&self, method: &Method, uri: &Uri, elapsed_ms: u128, request_id: &str) {
        let status = self.status.as_u16();
        let source = self.source;
        let detail = self.detail();
        let chain = &self.chain;

        macro_rules! emit {
            ($level:expr, $message:literal) => {
                tracing::event!(
                    target: RESPONSE_TARGET,
                    $level,
                    status,
                    method = %method,
                    path = %uri.path(),
                    query = uri.query().unwrap_or(""),
                    elapsed_ms,
                    source,
                    detail = %detail,
                    chain = ?chain,
                    request_id,
                    $message
                )
            };
        }

        if self.status.is_server_error() {
            emit!(Level::ERROR, "request failed");
        } else {
            emit!(Level::WARN, "client request error");
        }
    }
}
