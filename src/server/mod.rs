//! 웹 UI 서버
//!
//! HTML 페이지 하나와 세션 단위 JSON API를 제공합니다.

mod handlers;
mod state;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::error::Result;

pub use handlers::{AskRequest, PageResponse, PreviewResponse, TextResponse};
pub use state::AppState;

/// 전체 라우터
pub fn router(state: AppState) -> Router {
    let max_upload = state.config().server.max_upload_bytes;

    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/api/sessions", post(handlers::create_session))
        .route(
            "/api/sessions/:id",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .route(
            "/api/sessions/:id/document",
            post(handlers::upload_document).layer(DefaultBodyLimit::max(max_upload)),
        )
        .route("/api/sessions/:id/pages/:page", get(handlers::get_page))
        .route("/api/sessions/:id/text", get(handlers::full_text))
        .route("/api/sessions/:id/preview", get(handlers::pdf_preview))
        .route("/api/sessions/:id/download/pdf", get(handlers::download_pdf))
        .route("/api/sessions/:id/download/text", get(handlers::download_text))
        .route("/api/sessions/:id/ask", post(handlers::ask))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 서버 실행 (Ctrl+C로 종료)
pub async fn serve(config: AppConfig) -> Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config)?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
