//! SubTrack Web Server
//!
//! Axum-based REST API for the SubTrack subscription tracker.
//!
//! Security features:
//! - Bearer-token (JWT) authentication on every route except health, register and login
//! - Restrictive CORS policy
//! - Input validation (pagination limits, avatar size and type limits)
//! - Sanitized error responses

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, patch, post, put},
    Json, Router,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer, services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};
use tracing::{debug, error, info, warn};

use subtrack_core::ai::{AIBackend, AIClient};
use subtrack_core::db::Database;

pub mod auth;
mod handlers;

pub use auth::AuthUser;

/// Maximum avatar upload size (5 MB)
pub const MAX_AVATAR_SIZE: usize = 5 * 1024 * 1024;

/// Maximum pagination limit
pub const MAX_PAGE_LIMIT: i64 = 1000;

/// Default bearer token lifetime (one week)
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 168;

/// Secret used when none is configured; only suitable for tests and local dev
const DEV_JWT_SECRET: &str = "subtrack-dev-secret";

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// HMAC secret for signing bearer tokens
    pub jwt_secret: String,
    /// Token lifetime in hours
    pub token_ttl_hours: i64,
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
    /// Root directory for uploaded files (avatars live in `<dir>/avatars`)
    pub uploads_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            token_ttl_hours: DEFAULT_TOKEN_TTL_HOURS,
            allowed_origins: vec![],
            uploads_dir: PathBuf::from("uploads"),
        }
    }
}

impl ServerConfig {
    /// Build a configuration from `SUBTRACK_JWT_SECRET` and `SUBTRACK_TOKEN_TTL_HOURS`
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt_secret = std::env::var("SUBTRACK_JWT_SECRET")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .context("SUBTRACK_JWT_SECRET must be set to sign authentication tokens")?;

        let token_ttl_hours = match std::env::var("SUBTRACK_TOKEN_TTL_HOURS") {
            Ok(value) => value
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|h| *h > 0)
                .with_context(|| format!("Invalid SUBTRACK_TOKEN_TTL_HOURS: {}", value))?,
            Err(_) => DEFAULT_TOKEN_TTL_HOURS,
        };

        Ok(Self {
            jwt_secret,
            token_ttl_hours,
            ..Default::default()
        })
    }

    /// Directory holding avatar images
    pub fn avatars_dir(&self) -> PathBuf {
        self.uploads_dir.join("avatars")
    }
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub config: ServerConfig,
    /// AI backend for insights; `None` means heuristics only
    pub ai: Option<AIClient>,
}

/// Authentication middleware - validates the bearer token and loads the user
///
/// On success the user is attached to the request as an [`AuthUser`]
/// extension. Missing, malformed, expired or forged tokens get 401, as do
/// valid tokens whose user no longer exists.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    let Some(token) = token else {
        debug!(path = %request.uri().path(), "Missing bearer token");
        return AppError::unauthorized("Invalid or expired token").into_response();
    };

    let user_id = match auth::verify_token(token, &state.config.jwt_secret) {
        Ok(id) => id,
        Err(e) => {
            warn!(path = %request.uri().path(), error = %e, "Rejected bearer token");
            return AppError::unauthorized("Invalid or expired token").into_response();
        }
    };

    match state.db.get_user(user_id) {
        Ok(Some(user)) => {
            request.extensions_mut().insert(AuthUser(user));
            next.run(request).await
        }
        Ok(None) => {
            warn!(user_id, "Token for deleted user");
            AppError::unauthorized("User not found").into_response()
        }
        Err(e) => AppError::from_core(e).into_response(),
    }
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Build the router with the AI backend taken from the environment
pub fn create_router(db: Database, static_dir: Option<&str>, config: ServerConfig) -> Router {
    let ai = AIClient::from_env();
    match &ai {
        Some(client) => info!(
            backend = client.backend_name(),
            host = client.host(),
            model = client.model(),
            "AI backend configured"
        ),
        None => info!("AI backend not configured, insights use heuristics only"),
    }
    create_router_with_ai(db, static_dir, config, ai)
}

/// Build the router with an explicit AI backend
pub fn create_router_with_ai(
    db: Database,
    static_dir: Option<&str>,
    config: ServerConfig,
    ai: Option<AIClient>,
) -> Router {
    let uploads_dir = config.uploads_dir.clone();
    let state = Arc::new(AppState {
        db,
        config: config.clone(),
        ai,
    });

    let public_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login));

    let protected_routes = Router::new()
        .route("/auth/me", get(handlers::get_me))
        // Subscriptions
        .route(
            "/subscriptions",
            get(handlers::list_subscriptions).post(handlers::create_subscription),
        )
        .route("/subscriptions/upcoming", get(handlers::upcoming_renewals))
        .route(
            "/subscriptions/:id",
            get(handlers::get_subscription)
                .put(handlers::update_subscription)
                .delete(handlers::delete_subscription),
        )
        .route("/subscriptions/:id/cancel", post(handlers::cancel_subscription))
        .route("/subscriptions/:id/pause", post(handlers::pause_subscription))
        .route("/subscriptions/:id/resume", post(handlers::resume_subscription))
        .route("/subscriptions/:id/pay", post(handlers::pay_subscription))
        .route(
            "/subscriptions/:id/payments",
            get(handlers::list_subscription_payments),
        )
        // Payments
        .route(
            "/payments",
            get(handlers::list_payments).post(handlers::create_payment),
        )
        .route("/payments/:id", get(handlers::get_payment))
        .route("/payments/:id/status", patch(handlers::update_payment_status))
        // Shared plans
        .route(
            "/shared-plans",
            get(handlers::list_shared_plans).post(handlers::create_shared_plan),
        )
        .route(
            "/shared-plans/:id",
            get(handlers::get_shared_plan).delete(handlers::delete_shared_plan),
        )
        .route(
            "/shared-plans/:id/participants",
            post(handlers::add_participant),
        )
        .route(
            "/shared-plans/:id/participants/:participant_id",
            axum::routing::delete(handlers::remove_participant),
        )
        .route("/shared-plans/:id/respond", post(handlers::respond_to_invitation))
        // User
        .route(
            "/user/profile",
            get(handlers::get_profile).put(handlers::update_profile),
        )
        .route("/user/password", put(handlers::change_password))
        .route(
            "/user/avatar",
            // Room for multipart framing around the image itself
            post(handlers::upload_avatar).layer(DefaultBodyLimit::max(MAX_AVATAR_SIZE + 64 * 1024)),
        )
        .route("/user", axum::routing::delete(handlers::delete_account))
        // Notifications
        .route("/notifications", get(handlers::list_notifications))
        .route(
            "/notifications/unread-count",
            get(handlers::unread_notification_count),
        )
        .route("/notifications/read-all", post(handlers::mark_all_notifications_read))
        .route("/notifications/:id/read", post(handlers::mark_notification_read))
        .route(
            "/notifications/:id",
            axum::routing::delete(handlers::delete_notification),
        )
        // Analytics
        .route("/analytics/summary", get(handlers::analytics_summary))
        .route("/analytics/trends", get(handlers::analytics_trends))
        .route("/analytics/categories", get(handlers::analytics_categories))
        // AI insights
        .route("/ai-insights", get(handlers::list_insights))
        .route("/ai-insights/generate", post(handlers::generate_insights))
        .route("/ai-insights/:id/resolve", post(handlers::resolve_insight))
        .route(
            "/ai-insights/:id",
            axum::routing::delete(handlers::delete_insight),
        )
        // Budget
        .route(
            "/budget",
            get(handlers::get_budget).put(handlers::set_budget),
        )
        .route(
            "/budget/reports",
            get(handlers::list_budget_reports).post(handlers::generate_budget_report),
        )
        .route("/budget/reports/:month", get(handlers::get_budget_report))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let api_routes = public_routes.merge(protected_routes);

    // Build CORS layer
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ];
    let cors = if config.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    };

    // User uploads never run as active content on our origin
    let uploads = ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static("default-src 'none'; sandbox"),
        ))
        .service(ServeDir::new(uploads_dir));

    let mut app = Router::new()
        .nest("/api", api_routes)
        .nest_service("/uploads", uploads)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ));

    // Serve a frontend build if provided
    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app
}

/// Start the server with custom configuration
pub async fn serve_with_config(
    db: Database,
    host: &str,
    port: u16,
    static_dir: Option<&str>,
    config: ServerConfig,
) -> anyhow::Result<()> {
    if config.jwt_secret == DEV_JWT_SECRET {
        warn!("Using the development JWT secret - do not expose to network!");
    }

    tokio::fs::create_dir_all(config.avatars_dir())
        .await
        .with_context(|| format!("Failed to create {}", config.avatars_dir().display()))?;

    check_ai_connection().await;

    let app = create_router(db, static_dir, config);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Check and log AI backend connection status
async fn check_ai_connection() {
    match AIClient::from_env() {
        Some(client) => {
            if client.health_check().await {
                info!(host = client.host(), model = client.model(), "AI backend connected");
            } else {
                warn!(
                    host = client.host(),
                    model = client.model(),
                    "AI backend configured but not responding; heuristics will cover"
                );
            }
        }
        None => {
            info!("AI backend not configured (set AI_BACKEND / OLLAMA_HOST to enable AI insights)");
        }
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn unauthorized(msg: &str) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn conflict(msg: &str) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn internal(msg: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.to_string(),
            internal: None,
        }
    }

    /// 400 listing the required fields that were absent
    pub fn missing_fields(fields: &[&str]) -> Self {
        Self::bad_request(&format!("Missing required fields: {}", fields.join(", ")))
    }

    /// Map a core error to its HTTP status
    pub fn from_core(err: subtrack_core::Error) -> Self {
        use subtrack_core::Error;
        match err {
            Error::NotFound(what) => Self::not_found(&format!("{} not found", what)),
            Error::Validation(msg) => Self::bad_request(&msg),
            Error::Auth(msg) => Self::unauthorized(&msg),
            Error::Conflict(msg) => Self::conflict(&msg),
            other => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "An internal error occurred".to_string(),
                internal: Some(other.into()),
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = match &self.internal {
            Some(err) => {
                error!(error = %err, "Internal error");
                serde_json::json!({
                    "error": self.message,
                    "details": err.to_string(),
                })
            }
            None => serde_json::json!({ "error": self.message }),
        };

        (self.status, Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();
        match err.downcast::<subtrack_core::Error>() {
            Ok(core) => Self::from_core(core),
            Err(err) => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "An internal error occurred".to_string(),
                internal: Some(err),
            },
        }
    }
}
