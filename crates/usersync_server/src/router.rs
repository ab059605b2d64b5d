//! axum adapter.

use crate::error::ServerError;
use crate::request::InboundRequest;
use crate::server::SyncServer;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use usersync_core::AccountStore;
use usersync_protocol::{API_NAMESPACE, HEALTH_ROUTE, USER_ROUTE};

/// Builds the HTTP router for a server.
///
/// Serves the user and health routes under both `/wp-json` and
/// `/index.php/wp-json`, and answers `HEAD /wp-json/` (through its GET route)
/// so peers probing the URL shape pick the bare form. Requests are handed to
/// [`SyncServer::handle`] on the blocking pool.
pub fn router<S: AccountStore + 'static>(server: Arc<SyncServer<S>>) -> Router {
    let mut router = Router::new()
        .route("/wp-json", get(handle::<S>))
        .route("/wp-json/", get(handle::<S>));
    for prefix in ["/wp-json", "/index.php/wp-json"] {
        router = router
            .route(
                &format!("{prefix}/{API_NAMESPACE}/{USER_ROUTE}"),
                post(handle::<S>),
            )
            .route(
                &format!("{prefix}/{API_NAMESPACE}/{HEALTH_ROUTE}"),
                get(handle::<S>),
            );
    }
    router.fallback(not_found).with_state(server)
}

async fn handle<S: AccountStore + 'static>(
    State(server): State<Arc<SyncServer<S>>>,
    request: Request,
) -> Response {
    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());
    let (parts, body) = request.into_parts();

    let limit = server.config().max_body_bytes;
    let body = match axum::body::to_bytes(body, limit).await {
        Ok(bytes) => bytes,
        Err(e) => return ServerError::InvalidData(e.to_string()).into_response(),
    };

    let mut inbound = InboundRequest::new(parts.method, parts.uri.path()).body(body.to_vec());
    for (name, value) in &parts.headers {
        if let Ok(value) = value.to_str() {
            inbound = inbound.header(name.as_str(), value);
        }
    }
    if let Some(addr) = remote_addr {
        inbound = inbound.remote_addr(addr);
    }

    let response = tokio::task::spawn_blocking(move || server.handle(&inbound)).await;
    match response {
        Ok(response) => {
            let status =
                StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(response.body)).into_response()
        }
        Err(e) => ServerError::Internal(e.to_string()).into_response(),
    }
}

async fn not_found() -> Response {
    ServerError::NoRoute.into_response()
}
