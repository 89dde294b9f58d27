//! Bearer-token authentication for the HTTP transport.
//!
//! When at least one token is configured (`--auth-token` / `MCP_AUTH_TOKENS`),
//! every HTTP request must carry `Authorization: Bearer <token>`. Tokens are
//! compared in constant time.

use crate::error::{DbError, DbResult};
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

const BEARER_PREFIX: &str = "Bearer ";

/// Accepted bearer tokens. Empty means authentication is off.
#[derive(Clone, Default)]
pub struct BearerAuth {
    tokens: Vec<String>,
}

impl std::fmt::Debug for BearerAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerAuth")
            .field("tokens", &self.tokens.len())
            .finish()
    }
}

impl BearerAuth {
    /// Build from configured tokens; blank entries are a configuration error.
    pub fn from_tokens<I>(tokens: I) -> DbResult<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut accepted: Vec<String> = Vec::new();
        for token in tokens {
            let token = token.as_ref().trim();
            if token.is_empty() {
                return Err(DbError::invalid_input("Empty value in MCP_AUTH_TOKENS"));
            }
            if !accepted.iter().any(|t| t == token) {
                accepted.push(token.to_string());
            }
        }
        Ok(Self { tokens: accepted })
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        !self.tokens.is_empty()
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    /// Check a presented token against every configured one.
    pub fn accepts(&self, provided: &str) -> bool {
        // no early return, so timing does not reveal which token matched
        self.tokens.iter().fold(false, |found, expected| {
            let same = expected.len() == provided.len()
                && bool::from(expected.as_bytes().ct_eq(provided.as_bytes()));
            found | same
        })
    }
}

/// Axum middleware rejecting requests without a valid bearer token.
pub async fn require_bearer(
    State(auth): State<Arc<BearerAuth>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    match bearer_token(&request) {
        Ok(token) if auth.accepts(token) => {
            debug!("Request authenticated");
            next.run(request).await
        }
        Ok(token) => {
            warn!(token = %mask_token(token), "Rejected request with unknown token");
            unauthorized("Invalid bearer token")
        }
        Err(reason) => {
            warn!(reason, "Rejected unauthenticated request");
            unauthorized(reason)
        }
    }
}

fn bearer_token(request: &Request<Body>) -> Result<&str, &'static str> {
    let value = request
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or("Missing Authorization header")?
        .to_str()
        .map_err(|_| "Authorization header contains invalid characters")?;
    let token = value
        .strip_prefix(BEARER_PREFIX)
        .ok_or("Authorization header must use the Bearer scheme")?
        .trim();
    if token.is_empty() {
        return Err("Bearer token is empty");
    }
    Ok(token)
}

fn mask_token(token: &str) -> String {
    let prefix: String = token.chars().take(3).collect();
    if token.chars().count() <= 3 {
        "***".to_string()
    } else {
        format!("{prefix}***")
    }
}

#[derive(Serialize)]
struct Unauthorized<'a> {
    error: &'a str,
    message: &'a str,
    suggestion: &'a str,
}

fn unauthorized(message: &str) -> Response {
    let body = Unauthorized {
        error: "unauthorized",
        message,
        suggestion: "Send 'Authorization: Bearer <token>' with a token configured on the server",
    };
    let json = serde_json::to_string(&body)
        .unwrap_or_else(|_| r#"{"error":"unauthorized"}"#.to_string());
    (
        StatusCode::UNAUTHORIZED,
        [(header::CONTENT_TYPE, "application/json")],
        json,
    )
        .into_response()
}
