use axum::{
    body::Body,
    extract::Query,
    http::{Request, Uri},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::api::ApiError;
use crate::AppState;

/// Resolves a bearer token to the user it was issued to.
pub trait IdentityProvider: Send + Sync {
    fn identify(&self, token: &str) -> Option<String>;
}

/// Fixed token table, read from `[auth.tokens]`.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityProvider {
    tokens: HashMap<String, String>,
}

impl StaticIdentityProvider {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self { tokens }
    }

    pub fn with_token(mut self, token: impl Into<String>, user_id: impl Into<String>) -> Self {
        self.tokens.insert(token.into(), user_id.into());
        self
    }
}

impl IdentityProvider for StaticIdentityProvider {
    fn identify(&self, token: &str) -> Option<String> {
        self.tokens.get(token).cloned()
    }
}

/// The caller, as resolved by [`auth_middleware`]. Stored in request extensions.
#[derive(Clone, Debug)]
pub struct AuthenticatedUser(pub String);

/// Authenticates requests via `Authorization: Bearer <token>`.
///
/// Browsers cannot set headers on a WebSocket handshake, so a `token` query
/// parameter is accepted as well. Requests without a known token are answered
/// with 401 before any handler runs.
pub async fn auth_middleware(mut req: Request<Body>, next: Next) -> Result<Response, ApiError> {
    let token = match req.headers().get("Authorization") {
        Some(value) => {
            let value = value.to_str().map_err(|_| ApiError::Unauthorized)?;
            value
                .strip_prefix("Bearer ")
                .ok_or(ApiError::Unauthorized)?
                .trim()
                .to_string()
        }
        None => token_from_query(req.uri()).ok_or(ApiError::Unauthorized)?,
    };

    let state = req
        .extensions()
        .get::<Arc<AppState>>()
        .ok_or_else(|| ApiError::Internal("application state missing".to_string()))?
        .clone();

    let user_id = state.identity.identify(&token).ok_or_else(|| {
        tracing::debug!(path = %req.uri().path(), "rejected unknown bearer token");
        ApiError::Unauthorized
    })?;

    req.extensions_mut().insert(AuthenticatedUser(user_id));
    Ok(next.run(req).await)
}

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// The percent-decoded `token` query parameter, if present and non-empty.
fn token_from_query(uri: &Uri) -> Option<String> {
    let Query(query) = Query::<TokenQuery>::try_from_uri(uri).ok()?;
    query.token.filter(|token| !token.is_empty())
}
