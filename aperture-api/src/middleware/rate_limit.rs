use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::sync::Mutex;

use crate::error::AppError;
use crate::state::AppState;

// Distinct client keys kept before sweeping stale windows.
const SWEEP_THRESHOLD: usize = 1024;

/// Fixed-window request ceiling per client. Requests over the ceiling are
/// rejected immediately, never queued.
pub struct RateLimiter {
    max_requests: u32,
    window_seconds: i64,
    windows: Mutex<HashMap<String, (i64, u32)>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window_seconds: i64) -> Self {
        Self {
            max_requests,
            window_seconds: window_seconds.max(1),
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// `Ok` admits the request; `Err` carries the epoch second at which the
    /// current window resets.
    pub async fn check(&self, key: &str) -> Result<(), i64> {
        let now = Utc::now().timestamp();
        let window_start = now - now.rem_euclid(self.window_seconds);
        let mut windows = self.windows.lock().await;

        if windows.len() > SWEEP_THRESHOLD {
            windows.retain(|_, (start, _)| *start == window_start);
        }

        let entry = windows.entry(key.to_string()).or_insert((window_start, 0));
        if entry.0 != window_start {
            *entry = (window_start, 0);
        }
        entry.1 += 1;

        if entry.1 <= self.max_requests {
            Ok(())
        } else {
            Err(window_start + self.window_seconds)
        }
    }
}

fn client_key(req: &Request) -> String {
    req.headers()
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|raw| raw.split(',').next())
        .map(|ip| ip.trim().to_string())
        .or_else(|| {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|info| info.0.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Health probes poll frequently and must not consume the budget.
    if req.uri().path() == "/api/admin/health" {
        return Ok(next.run(req).await);
    }

    let key = client_key(&req);
    match state.rate_limiter.check(&key).await {
        Ok(()) => Ok(next.run(req).await),
        Err(retry_at) => Err(AppError::RateLimited { retry_at }),
    }
}
