//! Bearer-token authentication for mutating endpoints.
//!
//! Identity is resolved by an [`Authenticator`]. Handlers that mutate the
//! tree take an [`Editor`] argument, which rejects the request with 401
//! before the handler runs.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use folio_config::EditorToken;
use folio_tree::User;

use crate::error::ServerError;
use crate::state::AppState;

/// Resolves a bearer token to a user.
pub trait Authenticator: Send + Sync {
    /// `None` if the token is not accepted.
    fn authenticate(&self, token: &str) -> Option<User>;
}

/// Fixed token table, usually from `[[auth.editors]]`.
#[derive(Debug, Default)]
pub struct StaticTokens {
    tokens: HashMap<String, User>,
}

impl StaticTokens {
    #[must_use]
    pub fn new(editors: &[EditorToken]) -> Self {
        let tokens = editors
            .iter()
            .map(|e| {
                (
                    e.token.clone(),
                    User {
                        id: e.user_id,
                        username: e.username.clone(),
                    },
                )
            })
            .collect();
        Self { tokens }
    }
}

impl Authenticator for StaticTokens {
    fn authenticate(&self, token: &str) -> Option<User> {
        self.tokens.get(token).cloned()
    }
}

/// Authenticated caller of a mutating endpoint.
#[derive(Debug)]
pub(crate) struct Editor(pub(crate) User);

impl FromRequestParts<Arc<AppState>> for Editor {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or(ServerError::Unauthorized)?;
        let token = value
            .to_str()
            .ok()
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(ServerError::InvalidToken)?;

        let user = state
            .auth
            .authenticate(token)
            .ok_or(ServerError::InvalidToken)?;
        tracing::debug!(user_id = user.id, "Authenticated editor");
        Ok(Self(user))
    }
}
