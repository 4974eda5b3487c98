//! Authentication gate.
//!
//! Resolves the caller to a stored user before the handler runs. Which
//! header is read depends on the configured `AuthMode`.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use domain::DomainError;
use store::{Store, User};

use crate::config::AuthMode;
use crate::error::ApiError;
use crate::state::AppState;

pub const ACCESS_TOKEN_HEADER: &str = "x-access-token";
pub const USER_ID_HEADER: &str = "x-user-id";

/// Extractor that requires an authenticated caller.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(CurrentUser(user): CurrentUser) -> String {
///     format!("Hello, {}!", user.username)
/// }
/// ```
pub struct CurrentUser(pub User);

impl<S> FromRequestParts<Arc<AppState<S>>> for CurrentUser
where
    S: Store + Clone + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        let user = match state.auth_mode {
            AuthMode::Bearer => {
                let token = bearer_token(parts)
                    .ok_or_else(|| DomainError::unauthenticated("Token is missing"))?;
                state.accounts.authenticate_token(&token).await?
            }
            AuthMode::UserIdHeader => {
                let raw = header_str(parts, USER_ID_HEADER)
                    .ok_or_else(|| DomainError::unauthenticated("User ID is missing"))?;
                state.accounts.authenticate_user_id(&raw).await?
            }
        };

        Ok(Self(user))
    }
}

fn header_str(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Reads `Authorization: Bearer <token>`, falling back to `x-access-token`.
fn bearer_token(parts: &Parts) -> Option<String> {
    if let Some(value) = header_str(parts, AUTHORIZATION.as_str()) {
        let token = match value.split_once(' ') {
            Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
            None if value.eq_ignore_ascii_case("bearer") => "",
            _ => value.as_str(),
        };
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }
    header_str(parts, ACCESS_TOKEN_HEADER)
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn reads_bearer_authorization() {
        let parts = parts(&[("authorization", "Bearer abc.def")]);
        assert_eq!(bearer_token(&parts).as_deref(), Some("abc.def"));
    }

    #[test]
    fn falls_back_to_access_token_header() {
        let parts = parts(&[("x-access-token", "abc.def")]);
        assert_eq!(bearer_token(&parts).as_deref(), Some("abc.def"));
    }

    #[test]
    fn missing_or_blank_token() {
        assert!(bearer_token(&parts(&[])).is_none());
        assert!(bearer_token(&parts(&[("authorization", "Bearer  ")])).is_none());
    }
}
