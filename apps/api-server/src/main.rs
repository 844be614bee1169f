//! api-server: HTTP API for username suggestions and checks.
//!
//! Exposes the slug normalizer and the username validator to the sign-up and
//! profile forms:
//! - Slugs: turn a display name or pasted profile URL into a username.
//! - Usernames: availability lookups (cached) and full rule validation.
//! - Registration: form checks, username derivation, and claiming the name.
//!
//! Run:
//! ```bash
//! # pretty logs (default); PORT optional
//! cargo run -p api-server
//!
//! # JSON logs with a few names held back
//! LOG_FORMAT=json RESERVED_USERNAMES=admin,support cargo run -p api-server
//! ```
//!
//! Configuration: See `config.rs` for all environment variables.
//!

mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderValue;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use domain::adapters::memory_cache::InMemoryAvailabilityCache;
use domain::adapters::memory_registry::InMemoryUsernameRegistry;
use domain::registration::{PasswordChange, RegistrationForm};
use domain::service::{UsernameValidator, ValidationError};
use domain::slug::{get_slug_with, SlugOptions};
use domain::validate::RuleKind;
use domain::{AvailabilityCache, Clock, CoreError, SystemClock};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

type Validator =
    UsernameValidator<Arc<InMemoryUsernameRegistry>, Arc<InMemoryAvailabilityCache>>;

#[derive(Clone)]
struct AppState {
    validator: Arc<Validator>,
    registry: Arc<InMemoryUsernameRegistry>,
    cache: Arc<InMemoryAvailabilityCache>,
    slug_options: SlugOptions,
    clock: SystemClock,
}

impl AppState {
    fn new(cfg: &config::Config) -> Self {
        let registry = Arc::new(InMemoryUsernameRegistry::with_taken(
            cfg.reserved_usernames.iter().cloned(),
        ));
        let cache = Arc::new(InMemoryAvailabilityCache::new());
        let validator = UsernameValidator::new(registry.clone(), cache.clone())
            .with_policy(cfg.username_policy);
        Self {
            validator: Arc::new(validator),
            registry,
            cache,
            slug_options: SlugOptions::new(
                cfg.username_policy.min_length,
                cfg.username_policy.max_length,
            ),
            clock: SystemClock,
        }
    }
}

#[tokio::main]
async fn main() {
    // Load and validate config first (fail fast on misconfiguration)
    let cfg = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&cfg);
    cfg.warn_if_permissive();

    let state = AppState::new(&cfg);

    // Request ID header name
    let x_request_id = axum::http::HeaderName::from_static("x-request-id");

    let mut app = router(state)
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid));

    // CORS - already validated in Config::from_env()
    let cors = if cfg.cors_allow_origin == HeaderValue::from_static("*") {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list([cfg.cors_allow_origin.clone()]))
            .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
            .allow_headers([axum::http::header::CONTENT_TYPE])
    };
    app = app.layer(cors);

    let addr: SocketAddr = ([0, 0, 0, 0], cfg.port).into();
    info!(%addr, "api-server listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("bind port");
    axum::serve(listener, app).await.expect("server error");
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/slug", get(get_slug))
        .route("/api/usernames/validate", post(validate_username))
        .route("/api/usernames/:username", get(get_availability))
        .route("/api/register", post(register))
        .route("/api/password/check", post(check_password_change))
        .with_state(state)
}

fn init_tracing(cfg: &config::Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);
    match cfg.log_format {
        config::LogFormat::Json => {
            registry
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_timer(fmt::time::SystemTime)
                        .with_writer(std::io::stdout),
                )
                .init();
        }
        config::LogFormat::Pretty => {
            registry
                .with(
                    fmt::layer()
                        .pretty()
                        .with_target(true)
                        .with_writer(std::io::stdout),
                )
                .init();
        }
    }
}

#[derive(Deserialize)]
struct SlugQuery {
    name: String,
    #[serde(default)]
    min_length: Option<usize>,
    #[serde(default)]
    max_length: Option<usize>,
}

#[derive(Serialize)]
struct SlugOut {
    slug: String,
}

#[derive(Deserialize)]
struct ValidateReq {
    username: String,
}

#[derive(Serialize)]
struct ValidateOut {
    username: String,
    valid: bool,
}

#[derive(Serialize)]
struct AvailabilityOut {
    username: String,
    available: bool,
}

#[derive(Serialize)]
struct RegisteredOut {
    username: String,
    email: String,
    registered_at: String,
}

async fn get_slug(State(state): State<AppState>, Query(q): Query<SlugQuery>) -> impl IntoResponse {
    let opts = SlugOptions::new(
        q.min_length.unwrap_or(state.slug_options.min_length),
        q.max_length.unwrap_or(state.slug_options.max_length),
    );
    let slug = get_slug_with(&q.name, opts);
    info!(slug = %slug, "slug ok");
    Json(SlugOut { slug })
}

async fn get_availability(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> impl IntoResponse {
    match state.validator.check_availability(&username).await {
        Ok(available) => {
            info!(username = %username, available, "availability ok");
            (
                StatusCode::OK,
                Json(AvailabilityOut {
                    username,
                    available,
                }),
            )
                .into_response()
        }
        Err(e) => {
            error!(username = %username, err = ?e, "availability error");
            unavailable()
        }
    }
}

async fn validate_username(
    State(state): State<AppState>,
    Json(body): Json<ValidateReq>,
) -> impl IntoResponse {
    match state.validator.validate(&body.username).await {
        Ok(name) => (
            StatusCode::OK,
            Json(ValidateOut {
                username: name.into_inner(),
                valid: true,
            }),
        )
            .into_response(),
        Err(ValidationError::Rejected { kind, message }) => {
            info!(username = %body.username, rule = kind.code(), "validate rejected");
            rejected(kind, &message)
        }
        Err(ValidationError::Indeterminate(e)) => {
            error!(username = %body.username, err = ?e, "validate error");
            unavailable()
        }
    }
}

async fn register(
    State(state): State<AppState>,
    Json(form): Json<RegistrationForm>,
) -> impl IntoResponse {
    if let Err(fields) = form.validate() {
        warn!(count = fields.len(), "register invalid form");
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(http_common::json_field_errors(&fields)),
        )
            .into_response();
    }

    let candidate = form.suggested_username(state.slug_options);
    let username = match state.validator.validate(&candidate).await {
        Ok(u) => u,
        Err(ValidationError::Rejected { kind, message }) => {
            info!(username = %candidate, rule = kind.code(), "register rejected");
            return rejected(kind, &message);
        }
        Err(ValidationError::Indeterminate(e)) => {
            error!(username = %candidate, err = ?e, "register lookup error");
            return unavailable();
        }
    };

    match state.registry.claim(username.as_str()) {
        Ok(()) => {}
        Err(CoreError::AlreadyExists) => {
            // Lost a race, or the cache still had the name as free.
            warn!(username = %username, "register conflict");
            return (
                StatusCode::CONFLICT,
                Json(http_common::json_error_with_message(
                    "conflict",
                    &RuleKind::AlreadyTaken.message(state.validator.policy()),
                )),
            )
                .into_response();
        }
        Err(e) => {
            error!(err = ?e, "register claim error");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(http_common::json_err("internal")),
            )
                .into_response();
        }
    }
    if let Err(e) = state.cache.insert(username.as_str(), false) {
        warn!(username = %username, err = ?e, "cache update failed");
    }

    info!(username = %username, "register ok");
    (
        StatusCode::CREATED,
        Json(RegisteredOut {
            username: username.into_inner(),
            email: form.email,
            registered_at: http_common::system_time_to_rfc3339(state.clock.now()),
        }),
    )
        .into_response()
}

async fn check_password_change(Json(body): Json<PasswordChange>) -> impl IntoResponse {
    match body.validate() {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(fields) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(http_common::json_field_errors(&fields)),
        )
            .into_response(),
    }
}

fn rejected(kind: RuleKind, message: &str) -> axum::response::Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(http_common::json_rule_rejection(kind, message)),
    )
        .into_response()
}

fn unavailable() -> axum::response::Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(http_common::json_err("unavailable")),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::util::ServiceExt;

    fn app() -> (Router, AppState) {
        let cfg = config::Config::from_lookup(|k| match k {
            "RESERVED_USERNAMES" => Some("admin,salsa.queen".to_string()),
            _ => None,
        })
        .unwrap();
        let state = AppState::new(&cfg);
        (router(state.clone()), state)
    }

    async fn send(router: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn registration(username: Option<&str>) -> serde_json::Value {
        serde_json::json!({
            "first_name": "Maria",
            "last_name": "López",
            "phone": "+34 600 000 000",
            "email": "maria@example.com",
            "password": "bailando123",
            "email_consent": true,
            "username": username,
        })
    }

    #[tokio::test]
    async fn slug_endpoint_normalizes() {
        let (router, _) = app();
        let (status, body) = send(&router, get_req("/api/slug?name=Hello%20World")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["slug"], "hello-world");

        let (_, body) = send(
            &router,
            get_req("/api/slug?name=https%3A%2F%2Fwww.facebook.com%2Fjohn.doe"),
        )
        .await;
        assert_eq!(body["slug"], "john.doe");

        let (_, body) = send(&router, get_req("/api/slug?name=a&min_length=3")).await;
        assert_eq!(body["slug"], "ax");
    }

    #[tokio::test]
    async fn slug_endpoint_requires_name() {
        let (router, _) = app();
        let resp = router.oneshot(get_req("/api/slug")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn availability_is_cached() {
        let (router, state) = app();
        let (status, body) = send(&router, get_req("/api/usernames/admin")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["available"], false);

        let (_, body) = send(&router, get_req("/api/usernames/bachata.bcn")).await;
        assert_eq!(body["available"], true);

        let (_, body) = send(&router, get_req("/api/usernames/admin")).await;
        assert_eq!(body["available"], false);
        assert_eq!(state.registry.lookups(), 2);
    }

    #[tokio::test]
    async fn validate_reports_first_failing_rule() {
        let (router, _) = app();

        let (status, body) = send(
            &router,
            post_json("/api/usernames/validate", serde_json::json!({"username": "ab."})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "trailing_period");
        assert_eq!(body["error"]["message"], "Username cannot end in a period.");

        let (_, body) = send(
            &router,
            post_json("/api/usernames/validate", serde_json::json!({"username": "salsa.queen"})),
        )
        .await;
        assert_eq!(body["error"]["message"], "Username is already taken.");

        let (status, body) = send(
            &router,
            post_json("/api/usernames/validate", serde_json::json!({"username": "tango.fan"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["valid"], true);
        assert_eq!(body["username"], "tango.fan");
    }

    #[tokio::test]
    async fn register_derives_and_claims_username() {
        let (router, _) = app();

        let (status, body) = send(&router, post_json("/api/register", registration(None))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["username"], "maria-lopez");
        assert_eq!(body["email"], "maria@example.com");
        assert!(body["registered_at"].as_str().unwrap().ends_with('Z'));

        // Second sign-up with the same name is refused.
        let (status, body) = send(&router, post_json("/api/register", registration(None))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "already_taken");

        let (_, body) = send(&router, get_req("/api/usernames/maria-lopez")).await;
        assert_eq!(body["available"], false);
    }

    #[tokio::test]
    async fn register_normalizes_typed_username() {
        let (router, state) = app();

        let (status, body) = send(
            &router,
            post_json("/api/register", registration(Some("Bad Name!!"))),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["username"], "bad-name");
        assert!(state.registry.claim("bad-name").is_err());
        assert!(state.registry.claim("Bad Name!!").is_ok());
    }

    #[tokio::test]
    async fn length_messages_use_configured_bounds() {
        let cfg = config::Config::from_lookup(|k| match k {
            "USERNAME_MIN_LENGTH" => Some("4".to_string()),
            "USERNAME_MAX_LENGTH" => Some("12".to_string()),
            _ => None,
        })
        .unwrap();
        let router = router(AppState::new(&cfg));

        let (status, body) = send(
            &router,
            post_json("/api/usernames/validate", serde_json::json!({"username": "abc"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "too_short");
        assert_eq!(
            body["error"]["message"],
            "Username must be at least 4 characters."
        );

        let (_, body) = send(
            &router,
            post_json(
                "/api/usernames/validate",
                serde_json::json!({"username": "abcdefghijklm"}),
            ),
        )
        .await;
        assert_eq!(
            body["error"]["message"],
            "Username must be at most 12 characters."
        );
    }

    #[tokio::test]
    async fn register_conflict_when_cache_is_stale() {
        let (router, state) = app();
        // Cache says free, registry says taken.
        state.cache.insert("stale.name", true).unwrap();
        state.registry.claim("stale.name").unwrap();

        let (status, body) = send(
            &router,
            post_json("/api/register", registration(Some("stale.name"))),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "conflict");
    }

    #[tokio::test]
    async fn register_reports_invalid_fields() {
        let (router, _) = app();
        let mut form = registration(None);
        form["password"] = serde_json::json!("short");
        form["email_consent"] = serde_json::json!(false);

        let (status, body) = send(&router, post_json("/api/register", form)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "invalid_form");
        let fields = body["error"]["fields"].as_array().unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0]["field"], "password");
        assert_eq!(fields[1]["field"], "email_consent");
    }

    #[tokio::test]
    async fn password_check() {
        let (router, _) = app();
        let (status, _) = send(
            &router,
            post_json(
                "/api/password/check",
                serde_json::json!({
                    "current_password": "old password",
                    "new_password": "new password",
                    "confirm_password": "new password"
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send(
            &router,
            post_json(
                "/api/password/check",
                serde_json::json!({
                    "current_password": "old password",
                    "new_password": "new password",
                    "confirm_password": "different one"
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["fields"][0]["message"], "Passwords do not match");
    }
}
