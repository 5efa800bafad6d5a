//! The HTTP/JSON surface.
//!
//! Routes map one-to-one onto the handler layer. Private routes sit behind
//! the bearer middleware, which resolves the principal and injects it into
//! request extensions; handlers read it from there only. Liveness, readiness
//! and Prometheus metrics also live on this listener.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, Query, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

use lockbox_proto as proto;

use crate::error::ServiceError;
use crate::handlers;
use crate::metrics;
use crate::server::{AuthPrincipal, LockboxServer};

#[derive(Clone)]
pub struct HttpState {
    pub server: Arc<LockboxServer>,
    pub metrics: PrometheusHandle,
    pub ready: watch::Receiver<bool>,
}

pub fn router(state: HttpState) -> Router {
    let private = Router::new()
        .route("/data", get(list_entries).post(create_entry))
        .route(
            "/data/{id}",
            get(get_entry).put(update_entry).delete(delete_entry),
        )
        .route("/sync", post(sync_changes))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh_token))
        .route("/otp/secret", post(otp_enroll))
        .route("/otp/generate", post(otp_generate))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(render_metrics))
        .merge(private)
        .with_state(state)
}

// ──────────────────────────────────── Plumbing ──────────────────────────────────

async fn require_auth(State(state): State<HttpState>, mut req: Request, next: Next) -> Response {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    match state.server.authenticate_bearer(header.as_deref()) {
        Ok(principal) => {
            req.extensions_mut().insert(principal);
            next.run(req).await
        }
        Err(err) => error_response("auth_gate", err),
    }
}

fn respond<T: Serialize>(
    operation: &'static str,
    started: Instant,
    result: Result<T, ServiceError>,
) -> Response {
    metrics::record_request("http", operation, started);
    match result {
        Ok(body) => Json(body).into_response(),
        Err(err) => error_response(operation, err),
    }
}

fn error_response(operation: &'static str, err: ServiceError) -> Response {
    metrics::record_error("http", operation, err.tag());
    let status = err.http_status();
    let body = proto::ErrorBody {
        error: err.tag().to_string(),
        code: status.as_u16(),
        message: err.to_string(),
    };
    (status, Json(body)).into_response()
}

fn parse_entry_id(raw: &str) -> Result<Uuid, ServiceError> {
    Uuid::parse_str(raw).map_err(|_| ServiceError::invalid("invalid entry ID"))
}

// ───────────────────────────────────── Auth ─────────────────────────────────────

async fn register(
    State(state): State<HttpState>,
    Json(req): Json<proto::RegisterRequest>,
) -> Response {
    let started = Instant::now();
    respond(
        "register",
        started,
        handlers::auth::register(&state.server, req).await,
    )
}

async fn login(State(state): State<HttpState>, Json(req): Json<proto::LoginRequest>) -> Response {
    let started = Instant::now();
    respond(
        "login",
        started,
        handlers::auth::login(&state.server, req).await,
    )
}

async fn refresh_token(
    State(state): State<HttpState>,
    Json(req): Json<proto::RefreshTokenRequest>,
) -> Response {
    let started = Instant::now();
    respond(
        "refresh_token",
        started,
        handlers::auth::refresh_token(&state.server, req).await,
    )
}

// ──────────────────────────────────── Entries ───────────────────────────────────

async fn create_entry(
    State(state): State<HttpState>,
    Extension(principal): Extension<AuthPrincipal>,
    Json(req): Json<proto::CreateEntryRequest>,
) -> Response {
    let started = Instant::now();
    respond(
        "create_entry",
        started,
        handlers::entries::create_entry(&state.server, &principal, req).await,
    )
}

async fn get_entry(
    State(state): State<HttpState>,
    Extension(principal): Extension<AuthPrincipal>,
    Path(id): Path<String>,
) -> Response {
    let started = Instant::now();
    let result = match parse_entry_id(&id) {
        Ok(id) => {
            handlers::entries::get_entry(&state.server, &principal, proto::GetEntryRequest { id })
                .await
        }
        Err(err) => Err(err),
    };
    respond("get_entry", started, result)
}

/// Query parameters for `GET /data`. Kind arrives as its wire string and is
/// validated here before the handler runs.
#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    kind: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
}

fn parse_kind(raw: &str) -> Result<proto::EntryKind, ServiceError> {
    match raw {
        "credentials" => Ok(proto::EntryKind::Credentials),
        "text" => Ok(proto::EntryKind::Text),
        "binary" => Ok(proto::EntryKind::Binary),
        "card" => Ok(proto::EntryKind::Card),
        _ => Err(ServiceError::invalid("unknown entry kind")),
    }
}

async fn list_entries(
    State(state): State<HttpState>,
    Extension(principal): Extension<AuthPrincipal>,
    Query(query): Query<ListQuery>,
) -> Response {
    let started = Instant::now();
    let result = match query.kind.as_deref().map(parse_kind).transpose() {
        Ok(kind) => {
            let req = proto::ListEntriesRequest {
                kind,
                limit: query.limit,
                offset: query.offset,
            };
            handlers::entries::list_entries(&state.server, &principal, req).await
        }
        Err(err) => Err(err),
    };
    respond("list_entries", started, result)
}

async fn update_entry(
    State(state): State<HttpState>,
    Extension(principal): Extension<AuthPrincipal>,
    Path(id): Path<String>,
    Json(body): Json<proto::UpdateEntryBody>,
) -> Response {
    let started = Instant::now();
    let result = match parse_entry_id(&id) {
        Ok(id) => {
            let req = proto::UpdateEntryRequest {
                id,
                name: body.name,
                description: body.description,
                ciphertext: body.ciphertext,
                metadata: body.metadata,
                version: body.version,
            };
            handlers::entries::update_entry(&state.server, &principal, req).await
        }
        Err(err) => Err(err),
    };
    respond("update_entry", started, result)
}

async fn delete_entry(
    State(state): State<HttpState>,
    Extension(principal): Extension<AuthPrincipal>,
    Path(id): Path<String>,
) -> Response {
    let started = Instant::now();
    let result = match parse_entry_id(&id) {
        Ok(id) => {
            handlers::entries::delete_entry(
                &state.server,
                &principal,
                proto::DeleteEntryRequest { id },
            )
            .await
        }
        Err(err) => Err(err),
    };
    respond("delete_entry", started, result)
}

// ───────────────────────────────────── Sync ─────────────────────────────────────

async fn sync_changes(
    State(state): State<HttpState>,
    Extension(principal): Extension<AuthPrincipal>,
    Json(req): Json<proto::SyncRequest>,
) -> Response {
    let started = Instant::now();
    respond(
        "sync_changes",
        started,
        handlers::sync::sync_changes(&state.server, &principal, req).await,
    )
}

// ───────────────────────────────────── TOTP ─────────────────────────────────────

async fn otp_enroll(
    State(_state): State<HttpState>,
    Json(req): Json<proto::OtpEnrollRequest>,
) -> Response {
    let started = Instant::now();
    respond("otp_enroll", started, handlers::otp::enroll(req))
}

async fn otp_generate(
    State(_state): State<HttpState>,
    Json(req): Json<proto::OtpGenerateRequest>,
) -> Response {
    let started = Instant::now();
    respond("otp_generate", started, handlers::otp::generate(req))
}

// ──────────────────────────────────── Health ────────────────────────────────────

async fn healthz() -> &'static str {
    "ok"
}

async fn readyz(State(state): State<HttpState>) -> Result<&'static str, StatusCode> {
    if *state.ready.borrow() {
        Ok("ok")
    } else {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}

async fn render_metrics(State(state): State<HttpState>) -> String {
    state.metrics.render()
}
