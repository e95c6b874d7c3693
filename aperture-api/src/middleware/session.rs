use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use aperture_core::session::SessionRecord;
use aperture_store::app_config::SessionConfig;

use crate::state::AppState;

/// Session loaded for the current request, injected as a request extension.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub id: String,
    pub record: SessionRecord,
}

/// Handlers that regenerate or destroy the session signal the cookie change
/// back through a response extension; the middleware emits the header.
#[derive(Debug, Clone)]
pub enum SessionCookieAction {
    Set(String),
    Clear,
}

pub fn generate_session_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn signature(secret: &str, session_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(session_id.as_bytes());
    hex::encode(hasher.finalize())
}

/// Cookie value is `sid.sig`; a bad signature reads as no session at all.
pub fn sign_session_id(secret: &str, session_id: &str) -> String {
    format!("{}.{}", session_id, signature(secret, session_id))
}

pub fn verify_cookie_value(secret: &str, value: &str) -> Option<String> {
    let (session_id, sig) = value.split_once('.')?;
    if sig == signature(secret, session_id) {
        Some(session_id.to_string())
    } else {
        None
    }
}

fn extract_cookie(raw: &str, name: &str) -> Option<String> {
    raw.split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

pub fn format_set_cookie(config: &SessionConfig, session_id: &str, production: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        config.cookie_name,
        sign_session_id(&config.secret, session_id),
        config.ttl_seconds,
    );
    if let Some(domain) = &config.cookie_domain {
        cookie.push_str(&format!("; Domain={}", domain));
    }
    if production {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn format_clear_cookie(config: &SessionConfig, production: bool) -> String {
    let mut cookie = format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
        config.cookie_name,
    );
    if let Some(domain) = &config.cookie_domain {
        cookie.push_str(&format!("; Domain={}", domain));
    }
    if production {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Restores the session named by the cookie or establishes a fresh one, then
/// reflects any cookie change on the way out.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let config = &state.config.session;

    let incoming_id = req
        .headers()
        .get(header::COOKIE)
        .and_then(|h| h.to_str().ok())
        .and_then(|raw| extract_cookie(raw, &config.cookie_name))
        .and_then(|value| verify_cookie_value(&config.secret, &value));

    let (record, is_new) = match incoming_id {
        Some(id) => match state.sessions.load(&id).await {
            Ok(Some(record)) => (record, false),
            Ok(None) => (SessionRecord::new(generate_session_id()), true),
            Err(e) => {
                tracing::error!("Session load failed: {}", e);
                (SessionRecord::new(generate_session_id()), true)
            }
        },
        None => (SessionRecord::new(generate_session_id()), true),
    };

    if is_new {
        if let Err(e) = state.sessions.save(&record).await {
            tracing::error!("Failed to persist new session: {}", e);
        }
    }

    let session_id = record.id.clone();
    req.extensions_mut().insert(SessionContext {
        id: session_id.clone(),
        record,
    });

    let mut response = next.run(req).await;

    let action = response.extensions().get::<SessionCookieAction>().cloned();
    let cookie = match action {
        Some(SessionCookieAction::Set(id)) => Some(format_set_cookie(config, &id, state.production())),
        Some(SessionCookieAction::Clear) => Some(format_clear_cookie(config, state.production())),
        None if is_new => Some(format_set_cookie(config, &session_id, state.production())),
        None => None,
    };

    if let Some(cookie) = cookie {
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }

    response
}
