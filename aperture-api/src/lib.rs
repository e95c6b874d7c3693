use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod bookings;
pub mod csrf;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod public;
pub mod state;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    error::set_expose_error_details(!state.production());

    // CORS Middleware: only the configured client origin, with credentials
    let cors = CorsLayer::new()
        .allow_origin(
            state
                .config
                .http
                .allowed_origin
                .parse::<HeaderValue>()
                .expect("invalid http.allowed_origin"),
        )
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static("x-csrf-token"),
        ]);

    // login, health and check-auth stay outside the admin guard
    let admin_open = Router::new()
        .route("/health", get(auth::health))
        .route("/check-auth", get(auth::check_auth))
        .route("/login", post(auth::login));

    let admin_guarded = Router::new()
        .route("/logout", post(auth::logout))
        .route("/bookings", get(bookings::list_bookings))
        .route("/bookings/export", get(bookings::export_bookings))
        .route("/bookings/{id}", get(bookings::get_booking))
        .route("/bookings/{id}/confirm", post(bookings::confirm_booking))
        .route("/messages", get(messages::list_messages))
        .route("/messages/{id}", get(messages::get_message))
        .route("/messages/{id}/mark-read", post(messages::mark_message_read))
        .layer(axum::middleware::from_fn(middleware::auth::require_admin));

    Router::new()
        .merge(csrf::routes())
        .merge(public::routes())
        .nest("/api/admin", admin_open.merge(admin_guarded))
        .fallback(not_found)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit::rate_limit_middleware,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::session::session_middleware,
        ))
        .layer(DefaultBodyLimit::max(state.config.http.body_limit_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static(
                "default-src 'self'; img-src 'self' data:; style-src 'self' 'unsafe-inline'",
            ),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        .with_state(state)
}

async fn not_found(uri: Uri) -> Response {
    if uri.path().starts_with("/api") {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Endpoint not found" })),
        )
            .into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}
