use std::collections::HashMap;

use axum::{
    extract::{Request, State},
    http::{header, Method},
    middleware::Next,
    response::Response,
};

use crate::config::ApiToken;

use super::error::ApiError;
use super::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    ContentManager,
    Viewer,
}

impl Role {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Role::Admin),
            "content_manager" => Some(Role::ContentManager),
            "viewer" => Some(Role::Viewer),
            _ => None,
        }
    }

    /// Viewers are read-only; writes need content_manager or admin.
    pub fn can_write(self) -> bool {
        matches!(self, Role::Admin | Role::ContentManager)
    }
}

/// Token-to-role table from the server config. Empty means auth is
/// disabled and every request acts as admin.
pub struct AuthConfig {
    tokens: HashMap<String, Role>,
}

impl AuthConfig {
    pub fn from_tokens(tokens: &[ApiToken]) -> Self {
        let tokens = tokens
            .iter()
            .filter_map(|t| Role::parse(&t.role).map(|r| (t.token.clone(), r)))
            .collect();
        AuthConfig { tokens }
    }

    pub fn disabled(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn role_for(&self, bearer: &str) -> Option<Role> {
        self.tokens.get(bearer).copied()
    }
}

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Middleware guarding every /api route. GET requests need any valid
/// token; mutating methods need a writer role.
pub async fn require_auth(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if state.auth.disabled() {
        return Ok(next.run(req).await);
    }

    let role = bearer_token(&req)
        .and_then(|t| state.auth.role_for(t))
        .ok_or(ApiError::Unauthorized)?;

    let read_only = req.method() == Method::GET || req.method() == Method::HEAD;
    if !read_only && !role.can_write() {
        return Err(ApiError::Forbidden);
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(entries: &[(&str, &str)]) -> AuthConfig {
        let tokens: Vec<ApiToken> = entries
            .iter()
            .map(|(t, r)| ApiToken {
                token: t.to_string(),
                role: r.to_string(),
            })
            .collect();
        AuthConfig::from_tokens(&tokens)
    }

    #[test]
    fn empty_token_list_disables_auth() {
        assert!(cfg(&[]).disabled());
    }

    #[test]
    fn roles_resolve_and_gate_writes() {
        let c = cfg(&[("tok-a", "admin"), ("tok-v", "viewer")]);
        assert!(!c.disabled());
        assert_eq!(c.role_for("tok-a"), Some(Role::Admin));
        assert_eq!(c.role_for("tok-v"), Some(Role::Viewer));
        assert_eq!(c.role_for("nope"), None);
        assert!(Role::Admin.can_write());
        assert!(Role::ContentManager.can_write());
        assert!(!Role::Viewer.can_write());
    }

    #[test]
    fn unknown_roles_are_ignored() {
        let c = cfg(&[("tok-x", "superuser")]);
        assert_eq!(c.role_for("tok-x"), None);
    }
}
