use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arena_auth::OidcAuthenticator;
use arena_contracts::ErrorResponse;
use arena_store::MemoryStore;
use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::Serialize;
use tracing::Instrument;
use ulid::Ulid;

use crate::config::{AuthMode, GatewayConfig, StartupError, WireFormat};
use crate::dispatch::Dispatcher;
use crate::endpoints::{RequestContext, Services};
use crate::error::ApiError;
use crate::rate_limit::RateLimiter;
use crate::wire::{self, RequestBody};

mod caller;

pub const REQUEST_ID_HEADER: &str = "x-arena-request-id";

/// Upper bound on distinct API keys the validate limiter remembers.
const VALIDATE_LIMITER_MAX_KEYS: usize = 16_384;

#[derive(Clone)]
pub struct AppState {
    pub config: GatewayConfig,
    oidc: Option<OidcAuthenticator>,
    dispatcher: Arc<Dispatcher>,
    services: Arc<Services>,
}

pub async fn router(config: GatewayConfig) -> Result<Router, StartupError> {
    let store = MemoryStore::load(&config.snapshot_path).map_err(|err| StartupError {
        code: "ERR_SNAPSHOT_INVALID",
        message: err.to_string(),
    })?;
    router_with_store(config, Arc::new(store)).await
}

/// Builds the application around an already loaded store.
pub async fn router_with_store(
    config: GatewayConfig,
    store: Arc<MemoryStore>,
) -> Result<Router, StartupError> {
    let oidc = if config.auth_mode == AuthMode::Oidc {
        let oidc_config = config.oidc.clone().ok_or_else(|| StartupError {
            code: "ERR_INVALID_CONFIG",
            message: "oidc auth mode requires oidc config".to_string(),
        })?;

        Some(
            OidcAuthenticator::new(oidc_config)
                .await
                .map_err(|err| StartupError {
                    code: err.code,
                    message: err.message,
                })?,
        )
    } else {
        None
    };

    let dispatcher = Dispatcher::new().map_err(|err| StartupError {
        code: "ERR_INVALID_ROUTES",
        message: err.to_string(),
    })?;

    let services = Services {
        store: store.clone(),
        oracle: store.clone(),
        graph: store,
        organization_id: config.organization_id,
        public_base_url: config.public_base_url.clone(),
        validate_limiter: RateLimiter::new(
            Duration::from_secs(config.rate_limit_window_secs.max(1)),
            VALIDATE_LIMITER_MAX_KEYS,
        ),
        validate_limit_per_window: config.rate_limit_client_validate_per_window,
    };

    let max_body_bytes = config.max_body_bytes;
    let state = AppState {
        config,
        oidc,
        dispatcher: Arc::new(dispatcher),
        services: Arc::new(services),
    };

    Ok(Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .fallback(dispatch)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state))
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
struct ReadyzResponse {
    status: &'static str,
    checks: BTreeMap<&'static str, bool>,
}

async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let mut checks = BTreeMap::new();
    checks.insert("store", state.services.store.ping().is_ok());
    checks.insert("routes", state.dispatcher.routes().next().is_some());

    let all_ready = checks.values().all(|ok| *ok);
    let status = if all_ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        axum::Json(ReadyzResponse {
            status: if all_ready { "ready" } else { "not_ready" },
            checks,
        }),
    )
}

async fn metrics(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if state.config.metrics_require_auth
        && let Err(err) = caller::extract_principal(&state, &headers).await
    {
        return error_response(&err, WireFormat::Json, None);
    }

    match crate::metrics::render() {
        Ok((body, content_type)) => {
            let mut headers = HeaderMap::new();
            if let Ok(value) = HeaderValue::from_str(content_type.as_str()) {
                headers.insert(header::CONTENT_TYPE, value);
            }
            (headers, body).into_response()
        }
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

/// Everything outside the host routes goes through the route table:
/// resolve, authenticate, bind, invoke, render.
async fn dispatch(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let started = Instant::now();
    let request_id = extract_request_id(&headers);

    let query = match Query::<Vec<(String, String)>>::try_from_uri(&uri) {
        Ok(Query(pairs)) => pairs,
        Err(rejection) => {
            tracing::debug!(reason = %rejection, "gateway.query_rejected");
            let err = ApiError::invalid_params("query string could not be read");
            return error_response(&err, state.config.default_format, Some(&request_id));
        }
    };
    let format = wire::negotiate(
        query
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("format"))
            .map(|(_, v)| v.as_str()),
        headers.get(header::ACCEPT).and_then(|v| v.to_str().ok()),
        state.config.default_format,
    );

    let Some(route) = state.dispatcher.resolve(&method, uri.path()) else {
        tracing::debug!(method = %method, path = uri.path(), "gateway.no_route");
        let response = error_response(&ApiError::no_route(), format, Some(&request_id));
        crate::metrics::observe_http_request(
            "unmatched",
            method.as_str(),
            response.status().as_u16(),
            started.elapsed(),
        );
        return response;
    };

    let span = tracing::info_span!(
        "arena.dispatch",
        request_id = %request_id,
        method = %method,
        route = route.route,
        person_id = tracing::field::Empty,
        status = tracing::field::Empty,
        latency_ms = tracing::field::Empty,
    );

    let result = async {
        let principal = caller::extract_principal(&state, &headers).await?;
        let caller = caller::resolve_caller(&state, principal)?;
        tracing::Span::current().record("person_id", caller.subject.person_id);

        let body = match body {
            Ok(bytes) if !bytes.is_empty() => Some(RequestBody {
                bytes: bytes.to_vec(),
                format: wire::body_format(
                    headers
                        .get(header::CONTENT_TYPE)
                        .and_then(|v| v.to_str().ok()),
                ),
            }),
            Ok(_) => None,
            Err(rejection) => {
                tracing::debug!(reason = %rejection, "gateway.body_rejected");
                return Err(ApiError::new(
                    rejection.status(),
                    "ERR_INVALID_PARAMS",
                    "request body could not be read",
                ));
            }
        };

        let ctx = RequestContext {
            services: &state.services,
            caller: &caller,
        };
        let reply = state.dispatcher.invoke(&route, &ctx, &query, body)?;
        reply.into_body(format)
    }
    .instrument(span.clone())
    .await;

    let response = match result {
        Ok((content_type, bytes)) => {
            let mut response = Response::new(Body::from(bytes));
            if let Ok(value) = HeaderValue::from_str(&content_type) {
                response.headers_mut().insert(header::CONTENT_TYPE, value);
            }
            set_request_id(&mut response, &request_id);
            response
        }
        Err(err) => {
            span.in_scope(|| {
                if err.status == StatusCode::FORBIDDEN {
                    tracing::warn!(code = err.code, "gateway.access_denied");
                } else if err.status.is_server_error() {
                    tracing::error!(code = err.code, "gateway.request_failed");
                }
            });
            error_response(&err, format, Some(&request_id))
        }
    };

    let status = response.status().as_u16();
    let elapsed = started.elapsed();
    span.record("status", status);
    span.record("latency_ms", elapsed.as_millis() as u64);
    span.in_scope(|| tracing::info!("gateway.request_completed"));
    crate::metrics::observe_http_request(route.route, method.as_str(), status, elapsed);
    response
}

/// Renders an `Error` contract in the negotiated format, falling back to
/// JSON if XML rendering fails.
fn error_response(err: &ApiError, format: WireFormat, request_id: Option<&str>) -> Response {
    let payload = ErrorResponse {
        code: err.code.to_string(),
        message: err.message.clone(),
    };
    let (format, bytes) = match wire::render(&payload, format) {
        Ok(bytes) => (format, bytes),
        Err(_) => (
            WireFormat::Json,
            serde_json::to_vec(&payload).unwrap_or_default(),
        ),
    };

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = err.status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(format.content_type()),
    );
    if let Some(request_id) = request_id {
        set_request_id(&mut response, request_id);
    }
    response
}

fn set_request_id(response: &mut Response, request_id: &str) {
    if let Ok(value) = HeaderValue::from_str(request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
}

fn extract_request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .and_then(sanitize_request_id)
        .unwrap_or_else(|| Ulid::new().to_string())
}

fn sanitize_request_id(raw: &str) -> Option<String> {
    const MAX_LEN: usize = 64;
    let out = raw
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'))
        .take(MAX_LEN)
        .collect::<String>();

    (!out.is_empty()).then_some(out)
}
