use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as AnyhowContext;
use async_trait::async_trait;
use axum::{
    extract::{ws::WebSocketUpgrade, Extension, FromRequest, RequestParts},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use http::{header, HeaderName, HeaderValue, Method, Request};
use hyper::Body;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{
    error,
    field::{self, Empty},
    info, Span,
};

use super::{
    context::{AppContext, GlobalContext},
    endpoint,
    error::{Error, ErrorExt, ErrorKind},
    session,
};
use crate::protocol::User;

////////////////////////////////////////////////////////////////////////////////

pub(crate) fn build_router(context: Arc<AppContext>) -> anyhow::Result<Router> {
    let origins = context
        .config()
        .allowed_origins
        .iter()
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .with_context(|| format!("invalid CORS origin '{}'", origin))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static("x-user")]);

    let api = Router::new()
        .route(
            "/rooms",
            get(endpoint::room::list).post(endpoint::room::create),
        )
        .route(
            "/rooms/:id",
            get(endpoint::room::read).delete(endpoint::room::delete),
        )
        .route(
            "/lectures",
            get(endpoint::lecture::list).post(endpoint::lecture::create),
        )
        .route(
            "/lectures/:id",
            get(endpoint::lecture::read).patch(endpoint::lecture::update),
        )
        .route("/lectures/:id/status", axum::routing::post(endpoint::lecture::set_status))
        .route("/lectures/:id/cancel", axum::routing::post(endpoint::lecture::cancel));

    let router = Router::new()
        .route("/ws", get(ws_upgrade))
        .nest("/api/v1", api)
        .route("/healthz", get(healthz))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(|request: &Request<Body>| {
                            tracing::error_span!(
                                "http-api-request",
                                status_code = Empty,
                                path = request.uri().path(),
                                method = %request.method(),
                            )
                        })
                        .on_response(
                            |response: &http::Response<_>, latency: Duration, span: &Span| {
                                span.record("status_code", &field::debug(response.status()));

                                if response.status().is_server_error() {
                                    error!("response generated in {:?}", latency)
                                } else {
                                    info!("response generated in {:?}", latency)
                                }
                            },
                        ),
                )
                .layer(cors)
                .layer(Extension(context)),
        );

    Ok(router)
}

async fn healthz() -> &'static str {
    "pong"
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    Extension(context): Extension<Arc<AppContext>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| session::handle_socket(context, socket))
}

////////////////////////////////////////////////////////////////////////////////

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "type": self.kind().kind(),
            "title": self.title(),
            "detail": self.detail(),
        }));

        (self.status(), body).into_response()
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Identity extractor for the HTTP API: the caller (or a fronting proxy
/// that did the actual authentication) passes the user object in the
/// `X-User` header as JSON.
pub(crate) struct UserExtractor(pub(crate) User);

#[async_trait]
impl<B: Send> FromRequest<B> for UserExtractor {
    type Rejection = Error;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let raw = req
            .headers()
            .get("x-user")
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| anyhow::anyhow!("missing X-User header"))
            .error(ErrorKind::Unauthorized)?;

        let user = serde_json::from_str::<User>(raw)
            .context("malformed X-User header")
            .error(ErrorKind::Unauthorized)?;

        Ok(UserExtractor(user))
    }
}
