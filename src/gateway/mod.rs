//! Axum-based HTTP gateway for the fingerprint consent API.
//!
//! Routes:
//! - `POST /auth/token` — credential check + bearer token issuance
//! - `POST /biometria/fingerprint` — record a consent decision (owner only)
//! - `GET /biometria/fingerprint/{user_id}` — query a decision (owner only)
//! - `GET /health` — liveness probe
//!
//! Cross-cutting middleware: permissive CORS, request body size limit (64KB),
//! request timeout (30s), and per-IP sliding-window rate limiting
//! (100 requests / 15 minutes).

use crate::auth::{CredentialStore, TokenService};
use crate::config::Config;
use crate::consent::ConsentStore;
use crate::error::ApiError;
use anyhow::Result;
use axum::{
    extract::{Path, Request, State},
    http::{header, HeaderMap, StatusCode, Uri},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Maximum request body size (64KB) — prevents memory exhaustion
pub const MAX_BODY_SIZE: usize = 65_536;
/// Request timeout (30s)
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// How often the rate limiter sweeps stale IP entries from its map.
const RATE_LIMITER_SWEEP_INTERVAL_SECS: u64 = 300; // 5 minutes

#[derive(Debug)]
pub struct SlidingWindowRateLimiter {
    limit_per_window: u32,
    window: Duration,
    requests: Mutex<(HashMap<String, Vec<Instant>>, Instant)>,
}

impl SlidingWindowRateLimiter {
    fn new(limit_per_window: u32, window: Duration) -> Self {
        Self {
            limit_per_window,
            window,
            requests: Mutex::new((HashMap::new(), Instant::now())),
        }
    }

    fn allow(&self, key: &str) -> bool {
        if self.limit_per_window == 0 {
            return true;
        }

        let now = Instant::now();
        let cutoff = now.checked_sub(self.window).unwrap_or_else(Instant::now);

        let mut guard = self.requests.lock();
        let (requests, last_sweep) = &mut *guard;

        // Periodic sweep: remove IPs with no recent requests
        if last_sweep.elapsed() >= Duration::from_secs(RATE_LIMITER_SWEEP_INTERVAL_SECS) {
            requests.retain(|_, timestamps| {
                timestamps.retain(|t| *t > cutoff);
                !timestamps.is_empty()
            });
            *last_sweep = now;
        }

        let entry = requests.entry(key.to_owned()).or_default();
        entry.retain(|instant| *instant > cutoff);

        if entry.len() >= self.limit_per_window as usize {
            return false;
        }

        entry.push(now);
        true
    }
}

fn client_key_from_headers(headers: &HeaderMap) -> String {
    for header_name in ["X-Forwarded-For", "X-Real-IP"] {
        if let Some(value) = headers.get(header_name).and_then(|v| v.to_str().ok()) {
            let first = value.split(',').next().unwrap_or("").trim();
            if !first.is_empty() {
                return first.to_owned();
            }
        }
    }
    "unknown".into()
}

/// Shared state for all axum handlers
#[derive(Clone)]
pub struct AppState {
    pub credentials: Arc<CredentialStore>,
    pub tokens: Arc<TokenService>,
    pub consents: Arc<ConsentStore>,
    rate_limiter: Arc<SlidingWindowRateLimiter>,
}

impl AppState {
    /// Construct all stores from configuration. Called once at startup;
    /// tests build isolated instances the same way.
    pub fn from_config(config: &Config) -> Self {
        Self {
            credentials: Arc::new(CredentialStore::with_demo_users()),
            tokens: Arc::new(TokenService::new(&config.jwt_secret, config.token_ttl)),
            consents: Arc::new(ConsentStore::new()),
            rate_limiter: Arc::new(SlidingWindowRateLimiter::new(
                config.rate_limit_max_requests,
                config.rate_limit_window,
            )),
        }
    }
}

/// Build the router with all routes and middleware layers.
pub fn router(state: AppState) -> Router {
    // ── CORS — allow browser clients to connect from any origin ──
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/auth/token", post(handle_issue_token))
        .route("/biometria/fingerprint", post(handle_record_fingerprint))
        .route(
            "/biometria/fingerprint/{user_id}",
            get(handle_query_fingerprint),
        )
        .route("/health", get(handle_health))
        .fallback(handle_not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            enforce_rate_limit,
        ))
        .with_state(state)
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::new(Duration::from_secs(REQUEST_TIMEOUT_SECS)))
}

/// Bind and serve until the process is stopped.
pub async fn run(config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("API Fingerprint listening on http://{}", listener.local_addr()?);

    let state = AppState::from_config(&config);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown signal received"),
        Err(e) => {
            // Without a signal handler the server simply runs until killed.
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    }
}

/// Reject requests from clients that exhausted their sliding window.
async fn enforce_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_key_from_headers(request.headers());
    if !state.rate_limiter.allow(&key) {
        tracing::warn!(client = %key, "rate limit exceeded");
        return ApiError::RateLimited.into_response();
    }
    next.run(request).await
}

// ══════════════════════════════════════════════════════════════════════════════
// REQUEST SCHEMAS
// ══════════════════════════════════════════════════════════════════════════════

/// Concrete return type for API handlers (avoids `impl IntoResponse`
/// inference issues).
type ApiResponse = Result<(StatusCode, Json<serde_json::Value>), ApiError>;

/// Raw body for `POST /auth/token`. Fields land as loose JSON so the
/// boundary can tell missing fields from wrong-typed ones.
#[derive(Debug, Default, Deserialize)]
struct TokenRequestBody {
    #[serde(default)]
    user_id: Option<serde_json::Value>,
    #[serde(default)]
    senha: Option<serde_json::Value>,
}

/// Validated form of [`TokenRequestBody`].
#[derive(Debug)]
struct TokenRequest {
    user_id: String,
    senha: String,
}

impl TokenRequestBody {
    fn validate(self) -> Result<TokenRequest, ApiError> {
        let (Some(user_id), Some(senha)) = (self.user_id, self.senha) else {
            return Err(ApiError::Validation(
                "user_id e senha são obrigatórios".into(),
            ));
        };
        let user_id = require_non_empty_string(&user_id)
            .ok_or_else(|| ApiError::Validation("user_id deve ser uma string não vazia".into()))?;
        let senha = require_non_empty_string(&senha)
            .ok_or_else(|| ApiError::Validation("senha deve ser uma string não vazia".into()))?;
        Ok(TokenRequest { user_id, senha })
    }
}

/// Raw body for `POST /biometria/fingerprint`.
#[derive(Debug, Default, Deserialize)]
struct FingerprintRequestBody {
    #[serde(default)]
    user_id: Option<serde_json::Value>,
    #[serde(default)]
    compartilhou_fingerprint: Option<serde_json::Value>,
}

/// Validated form of [`FingerprintRequestBody`].
#[derive(Debug)]
struct FingerprintRequest {
    user_id: String,
    shared: bool,
}

impl FingerprintRequestBody {
    fn validate(self) -> Result<FingerprintRequest, ApiError> {
        let (Some(user_id), Some(shared)) = (self.user_id, self.compartilhou_fingerprint) else {
            return Err(ApiError::Validation(
                "user_id e compartilhou_fingerprint são obrigatórios".into(),
            ));
        };
        let user_id = require_non_empty_string(&user_id)
            .ok_or_else(|| ApiError::Validation("user_id deve ser uma string não vazia".into()))?;
        let shared = shared.as_bool().ok_or_else(|| {
            ApiError::Validation(
                "compartilhou_fingerprint deve ser um valor booleano (true ou false)".into(),
            )
        })?;
        Ok(FingerprintRequest { user_id, shared })
    }
}

fn require_non_empty_string(value: &serde_json::Value) -> Option<String> {
    match value.as_str() {
        Some(s) if !s.trim().is_empty() => Some(s.to_owned()),
        _ => None,
    }
}

/// Unwrap an extracted JSON body; a rejected body (absent, wrong content
/// type, bad syntax) behaves like an empty one so the field validation
/// produces the stable messages.
fn extract_body<T: Default>(
    body: Result<Json<T>, axum::extract::rejection::JsonRejection>,
) -> T {
    body.map(|Json(inner)| inner).unwrap_or_default()
}

// ══════════════════════════════════════════════════════════════════════════════
// AXUM HANDLERS
// ══════════════════════════════════════════════════════════════════════════════

/// Extract bearer token from Authorization header.
fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Verify the request's bearer token and return its subject.
fn require_subject(state: &AppState, headers: &HeaderMap) -> Result<String, ApiError> {
    let token = extract_bearer_token(headers).ok_or(ApiError::MissingToken)?;
    state.tokens.verify(token).map_err(|_| ApiError::InvalidToken)
}

/// POST /auth/token — verify credentials and issue a bearer token.
async fn handle_issue_token(
    State(state): State<AppState>,
    body: Result<Json<TokenRequestBody>, axum::extract::rejection::JsonRejection>,
) -> ApiResponse {
    // Validation happens before any credential lookup.
    let request = extract_body(body).validate()?;

    let Some(credential) = state.credentials.verify(&request.user_id, &request.senha) else {
        return Err(ApiError::Credentials);
    };

    let token = state.tokens.issue(&credential.user_id).map_err(|e| {
        tracing::error!(error = %e, "token issuance failed");
        ApiError::Internal("Não foi possível gerar o token de autenticação".into())
    })?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "token": token,
            "message": "Token gerado com sucesso",
        })),
    ))
}

/// POST /biometria/fingerprint — record the caller's consent decision.
async fn handle_record_fingerprint(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<FingerprintRequestBody>, axum::extract::rejection::JsonRejection>,
) -> ApiResponse {
    let subject = require_subject(&state, &headers)?;
    let request = extract_body(body).validate()?;

    if subject != request.user_id {
        return Err(ApiError::Ownership(
            "Você só pode cadastrar biometria para seu próprio usuário".into(),
        ));
    }

    let record = state.consents.upsert(&request.user_id, request.shared);

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "Decisão de compartilhamento cadastrada com sucesso",
            "data": record,
        })),
    ))
}

/// GET /biometria/fingerprint/{user_id} — query a consent decision.
async fn handle_query_fingerprint(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> ApiResponse {
    let subject = require_subject(&state, &headers)?;

    if subject != user_id {
        return Err(ApiError::Ownership(
            "Você só pode consultar biometria do seu próprio usuário".into(),
        ));
    }

    let record = state.consents.get(&user_id).ok_or(ApiError::RecordNotFound)?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "message": "Decisão consultada com sucesso",
            "data": record,
        })),
    ))
}

/// GET /health — always public (no secrets leaked)
async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "OK",
        "message": "API Fingerprint funcionando corretamente",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}

/// Fallback for unmatched routes.
async fn handle_not_found(uri: Uri) -> ApiError {
    ApiError::RouteNotFound(uri.path().to_owned())
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn security_body_limit_is_64kb() {
        assert_eq!(MAX_BODY_SIZE, 65_536);
    }

    #[test]
    fn rate_limiter_blocks_after_limit() {
        let limiter = SlidingWindowRateLimiter::new(2, Duration::from_secs(60));
        assert!(limiter.allow("1.2.3.4"));
        assert!(limiter.allow("1.2.3.4"));
        assert!(!limiter.allow("1.2.3.4"));
        // Other clients are unaffected.
        assert!(limiter.allow("5.6.7.8"));
    }

    #[test]
    fn rate_limiter_zero_limit_always_allows() {
        let limiter = SlidingWindowRateLimiter::new(0, Duration::from_secs(60));
        for _ in 0..100 {
            assert!(limiter.allow("1.2.3.4"));
        }
    }

    #[test]
    fn client_key_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Forwarded-For", "10.0.0.1, 10.0.0.2".parse().unwrap());
        headers.insert("X-Real-IP", "10.9.9.9".parse().unwrap());
        assert_eq!(client_key_from_headers(&headers), "10.0.0.1");
    }

    #[test]
    fn client_key_defaults_to_unknown() {
        assert_eq!(client_key_from_headers(&HeaderMap::new()), "unknown");
    }

    #[test]
    fn bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer abc.def.ghi".parse().unwrap());
        assert_eq!(extract_bearer_token(&headers), Some("abc.def.ghi"));

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Basic abc".parse().unwrap());
        assert_eq!(extract_bearer_token(&headers), None);

        assert_eq!(extract_bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn token_body_missing_fields() {
        let body = TokenRequestBody::default();
        let err = body.validate().unwrap_err();
        assert_eq!(err.to_string(), "user_id e senha são obrigatórios");
    }

    #[test]
    fn token_body_wrong_typed_user_id() {
        let body = TokenRequestBody {
            user_id: Some(serde_json::json!(42)),
            senha: Some(serde_json::json!("x")),
        };
        let err = body.validate().unwrap_err();
        assert_eq!(err.to_string(), "user_id deve ser uma string não vazia");
    }

    #[test]
    fn token_body_blank_senha() {
        let body = TokenRequestBody {
            user_id: Some(serde_json::json!("abc123")),
            senha: Some(serde_json::json!("   ")),
        };
        let err = body.validate().unwrap_err();
        assert_eq!(err.to_string(), "senha deve ser uma string não vazia");
    }

    #[test]
    fn fingerprint_body_wrong_typed_flag() {
        let body = FingerprintRequestBody {
            user_id: Some(serde_json::json!("abc123")),
            compartilhou_fingerprint: Some(serde_json::json!("sim")),
        };
        let err = body.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "compartilhou_fingerprint deve ser um valor booleano (true ou false)"
        );
    }

    #[test]
    fn fingerprint_body_false_is_valid() {
        let body = FingerprintRequestBody {
            user_id: Some(serde_json::json!("abc123")),
            compartilhou_fingerprint: Some(serde_json::json!(false)),
        };
        let request = body.validate().unwrap();
        assert_eq!(request.user_id, "abc123");
        assert!(!request.shared);
    }

    #[test]
    fn app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }
}
