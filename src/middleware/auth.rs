use std::convert::Infallible;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};

/// Identity-provider access token taken from `Authorization: Bearer <token>`.
///
/// Extraction never fails: a missing or malformed header yields `BearerToken(None)`,
/// which the identity resolver turns into an auth-required outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BearerToken(pub Option<String>);

impl BearerToken {
    pub fn from_header(value: &str) -> Self {
        let token = value
            .strip_prefix("Bearer ")
            .or_else(|| value.strip_prefix("bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string);
        BearerToken(token)
    }

    pub fn into_inner(self) -> Option<String> {
        self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        Ok(parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(BearerToken::from_header)
            .unwrap_or_default())
    }
}
