use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type SessionResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Single role today; a field rather than a boolean so the session shape
/// does not assume it stays that way.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
}

/// An authenticated identity attached to a session, with its own expiry
/// independent of the session TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub username: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

/// Server-side state keyed by the session cookie. Carries the authenticated
/// principal (if any) and the current CSRF token; nothing else lives here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub principal: Option<Principal>,
    pub csrf_token: Option<String>,
    pub csrf_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(id: String) -> Self {
        Self {
            id,
            principal: None,
            csrf_token: None,
            csrf_expires_at: None,
            created_at: Utc::now(),
        }
    }

    /// An admin principal counts only while its explicit expiry is in the
    /// future.
    pub fn admin_active(&self, now: DateTime<Utc>) -> bool {
        self.principal
            .as_ref()
            .map_or(false, |p| p.role == Role::Admin && p.expires_at > now)
    }

    pub fn username(&self) -> Option<&str> {
        self.principal.as_ref().map(|p| p.username.as_str())
    }

    /// A session's CSRF state is valid when an unexpired token exists and,
    /// if the caller presented one, it matches.
    pub fn csrf_valid(&self, presented: Option<&str>, now: DateTime<Utc>) -> bool {
        match (&self.csrf_token, self.csrf_expires_at) {
            (Some(token), Some(expires)) if expires > now => {
                presented.map_or(true, |p| p == token)
            }
            _ => false,
        }
    }
}

/// Store trait for session persistence. Implementations apply a fixed TTL on
/// every save.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, id: &str) -> SessionResult<Option<SessionRecord>>;

    async fn save(&self, record: &SessionRecord) -> SessionResult<()>;

    async fn destroy(&self, id: &str) -> SessionResult<()>;

    async fn healthy(&self) -> bool;

    fn backend(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_admin_principal_expires() {
        let now = Utc::now();
        let mut record = SessionRecord::new("s1".to_string());
        assert!(!record.admin_active(now));

        record.principal = Some(Principal {
            username: "admin".to_string(),
            role: Role::Admin,
            expires_at: now + Duration::hours(2),
        });
        assert!(record.admin_active(now));
        assert_eq!(record.username(), Some("admin"));
        assert!(!record.admin_active(now + Duration::hours(3)));
    }

    #[test]
    fn test_csrf_validity_requires_match_and_expiry() {
        let now = Utc::now();
        let mut record = SessionRecord::new("s1".to_string());
        assert!(!record.csrf_valid(None, now));

        record.csrf_token = Some("tok".to_string());
        record.csrf_expires_at = Some(now + Duration::minutes(30));
        assert!(record.csrf_valid(None, now));
        assert!(record.csrf_valid(Some("tok"), now));
        assert!(!record.csrf_valid(Some("other"), now));
        assert!(!record.csrf_valid(Some("tok"), now + Duration::hours(1)));
    }
}
