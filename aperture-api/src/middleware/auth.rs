use axum::{extract::Request, middleware::Next, response::Response};
use chrono::Utc;

use crate::error::AppError;
use crate::middleware::session::SessionContext;

/// Guards the admin surface. The only credential is the session's boolean
/// admin flag; there is no role model beyond it.
pub async fn require_admin(req: Request, next: Next) -> Result<Response, AppError> {
    let ctx = req
        .extensions()
        .get::<SessionContext>()
        .ok_or_else(|| AppError::Authentication("Not authenticated".to_string()))?;

    if !ctx.record.admin_active(Utc::now()) {
        return Err(AppError::Authentication("Not authenticated".to_string()));
    }

    Ok(next.run(req).await)
}
