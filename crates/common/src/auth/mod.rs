//! Acting-user context
//!
//! Authentication happens upstream (reverse proxy / SSO). The proxy forwards
//! the authenticated user in trusted headers:
//! - `X-User-ID`: user UUID (required)
//! - `X-User-Groups`: comma-separated group names
//! - `X-User-Privileged`: `true` for staff and superusers
//! - `X-Request-ID`: optional correlation id

use crate::errors::{AppError, Result};
use crate::records::Scope;
use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const GROUPS_HEADER: &str = "x-user-groups";
pub const PRIVILEGED_HEADER: &str = "x-user-privileged";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Members of this group may list every user's records
pub const GROUP_MANAGER: &str = "manager";

/// The user a request acts on behalf of
#[derive(Debug, Clone)]
pub struct ActorContext {
    pub user_id: Uuid,

    /// May list other users' records
    pub privileged: bool,

    /// Request ID for tracing
    pub request_id: String,
}

impl ActorContext {
    /// Listing scope for this actor
    pub fn scope(&self, requested: Option<&str>) -> Scope {
        Scope::new(self.user_id, self.privileged, requested)
    }
}

/// Whether a set of groups grants privileged listing
pub fn is_privileged<'a>(groups: impl IntoIterator<Item = &'a str>, is_staff: bool) -> bool {
    is_staff || groups.into_iter().any(|g| g == GROUP_MANAGER)
}

/// Axum extractor for ActorContext
impl<S> FromRequestParts<S> for ActorContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        let header = |name: &str| parts.headers.get(name).and_then(|v| v.to_str().ok());

        let request_id = header(REQUEST_ID_HEADER)
            .map(String::from)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let user_id = header(USER_ID_HEADER)
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
            .ok_or_else(|| AppError::Unauthorized {
                message: "Missing or invalid X-User-ID header".to_string(),
            })?;

        let is_staff = header(PRIVILEGED_HEADER)
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let groups = header(GROUPS_HEADER).unwrap_or_default();
        let privileged = is_privileged(groups.split(',').map(str::trim), is_staff);

        Ok(ActorContext {
            user_id,
            privileged,
            request_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> Result<ActorContext> {
        let (mut parts, _) = request.into_parts();
        ActorContext::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_actor_from_headers() {
        let user = Uuid::new_v4();
        let request = Request::builder()
            .header("X-User-ID", user.to_string())
            .header("X-User-Privileged", "TRUE")
            .body(())
            .unwrap();

        let actor = extract(request).await.unwrap();
        assert_eq!(actor.user_id, user);
        assert!(actor.privileged);
        assert_eq!(actor.scope(Some("all_users")).owner_filter(), None);
    }

    #[tokio::test]
    async fn test_manager_group_header_grants_privilege() {
        let request = Request::builder()
            .header("X-User-ID", Uuid::new_v4().to_string())
            .header("X-User-Groups", "operator_ingress, manager")
            .body(())
            .unwrap();

        assert!(extract(request).await.unwrap().privileged);
    }

    #[tokio::test]
    async fn test_missing_user_is_unauthorized() {
        let request = Request::builder().body(()).unwrap();
        let err = extract(request).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized { .. }));
    }

    #[test]
    fn test_manager_group_is_privileged() {
        assert!(is_privileged(["operator_ingress", "manager"], false));
        assert!(is_privileged([], true));
        assert!(!is_privileged(["quality_analyst"], false));
    }
}
