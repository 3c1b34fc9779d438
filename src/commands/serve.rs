use std::net::SocketAddr;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::controllers::paste;
use crate::error::ApiError;
use crate::models::Paste;
use crate::sweeper::Sweeper;
use crate::types::api::CreatePaste;
use crate::App;

pub async fn run(app: App) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([127, 0, 0, 1], app.config.port));

    let sweeper = Sweeper::new(app.store.clone())
        .with_interval(app.config.sweep.interval())
        .start();

    info!("listening on http://{addr}");
    axum::Server::bind(&addr)
        .serve(router(app).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    Ok(())
}

pub fn router(app: App) -> Router {
    let max_upload_size = app.config.limits.max_upload_size;

    Router::new()
        .route("/health", get(health))
        .route("/api/pastes", post(create_paste))
        .route("/api/pastes/:id", get(get_paste))
        // enforced by the `Json` extractor so the rejection reaches `create_paste`
        .layer(DefaultBodyLimit::max(max_upload_size))
        .layer(TraceLayer::new_for_http())
        .with_state(app)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

async fn health() -> &'static str {
    "OK"
}

async fn create_paste(
    State(app): State<App>,
    payload: Result<Json<CreatePaste>, JsonRejection>,
) -> crate::ApiResult<impl IntoResponse> {
    let Json(request) = payload.map_err(|rejection| match rejection.status() {
        StatusCode::PAYLOAD_TOO_LARGE => ApiError::PayloadTooLarge,
        _ => ApiError::Validation(rejection.body_text()),
    })?;
    let paste = paste::create(&app, request).await?;
    let location = format!("/api/pastes/{}", paste.id);

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(paste),
    ))
}

async fn get_paste(
    State(app): State<App>,
    Path(id): Path<String>,
) -> crate::ApiResult<Json<Paste>> {
    let paste = paste::fetch(&app, &id).await?;
    Ok(Json(paste))
}
