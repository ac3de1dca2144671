use crate::{
    config::Config,
    semantic::{ProductSearchService, SearchError, SearchResponse},
};
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::json;
use std::{any::Any, sync::Arc};
use tokio::signal;
use tower_http::{catch_panic::CatchPanicLayer, set_header::SetResponseHeaderLayer};

const ALLOW_HEADERS: &str = "authorization, x-client-info, apikey, content-type";

/// Largest request body accepted; larger payloads are answered with a JSON error.
pub const MAX_BODY_SIZE: usize = 1024 * 1024;

#[derive(Clone)]
struct SharedState {
    service: Arc<ProductSearchService>,
}

pub fn router(service: Arc<ProductSearchService>) -> Router {
    let shared_state = Arc::new(SharedState { service });

    Router::new()
        .route("/", post(search).options(preflight).fallback(unsupported_method))
        .route(
            "/busca-produtos-vetor",
            post(search).options(preflight).fallback(unsupported_method),
        )
        .fallback(unknown_route)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        ))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(shared_state)
}

async fn start_app(config: Config) -> anyhow::Result<()> {
    let service = Arc::new(ProductSearchService::from_config(&config));
    let app = router(service);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    log::info!("listening on {}", config.listen_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                log::error!("failed to install signal handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::warn!("shutting down");
}

pub fn start_daemon(config: Config) -> anyhow::Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(start_app(config))
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

#[derive(Debug)]
pub struct HttpError(pub SearchError);

impl HttpError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            SearchError::MissingQuery | SearchError::InvalidParameter(_) => {
                StatusCode::BAD_REQUEST
            }
            SearchError::EmbeddingAbsent
            | SearchError::Embedding(_)
            | SearchError::Store(_)
            | SearchError::Payload(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("{:?}", self.0);
        } else {
            log::debug!("rejected: {}", self.0);
        }
        error_response(status, self.0.to_string())
    }
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(message) = err.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = err.downcast_ref::<&str>() {
        message.to_string()
    } else {
        "unexpected error".to_string()
    };

    log::error!("request handler panicked: {message}");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, message)
}

async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn unsupported_method(method: Method) -> Response {
    log::debug!("rejected method {method}");
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("método {method} não suportado"),
    )
}

async fn unknown_route() -> Response {
    error_response(StatusCode::NOT_FOUND, "rota não encontrada".to_string())
}

async fn search(
    State(state): State<Arc<SharedState>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<SearchResponse>, Response> {
    // Oversized or unreadable bodies answer 500 like any other failure.
    let body = body.map_err(|rejection| {
        log::error!("could not read payload: {rejection}");
        error_response(StatusCode::INTERNAL_SERVER_ERROR, rejection.body_text())
    })?;
    log::debug!("payload: {} bytes", body.len());

    let response = state
        .service
        .handle(&body)
        .await
        .map_err(|err| HttpError(err).into_response())?;
    Ok(Json(response))
}
