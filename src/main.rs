use std::{process, sync::Arc};

use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;
use vicky_web::{
    application::{error::AppError, render::Renderer, writings::WritingsService},
    cache::CacheConfig,
    config::{self, Settings},
    infra::{
        error::InfraError,
        http::{self, HttpState},
        telemetry,
        wordpress::WordPressClient,
    },
    presentation::views::AskamaRenderer,
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
    }
}

async fn run_serve(settings: Settings) -> Result<(), AppError> {
    let state = build_http_state(&settings)?;
    let router = http::build_router(state, settings.site.profile);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::from)?;

    info!(
        target = "vicky::serve",
        addr = %settings.server.addr,
        content = %settings.content.base_url,
        per_page = settings.content.per_page.get(),
        cache_ttl_secs = settings.cache.ttl.as_secs(),
        single_flight = settings.cache.single_flight,
        profile = %settings.site.profile,
        "listening"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    info!(target = "vicky::serve", "server stopped");
    Ok(())
}

fn build_http_state(settings: &Settings) -> Result<HttpState, AppError> {
    let source = Arc::new(WordPressClient::from_settings(&settings.content)?);
    let writings = Arc::new(WritingsService::new(
        source,
        &CacheConfig::from(&settings.cache),
        settings.content.per_page,
    ));
    let renderer: Arc<dyn Renderer> = Arc::new(AskamaRenderer);

    Ok(HttpState::new(writings, renderer))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!(target = "vicky::serve", "shutdown requested");
}
