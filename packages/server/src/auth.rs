//! Admin capability checks.
//!
//! Admin routes ask an injected [`AdminAuthorizer`] whether the caller may
//! proceed. The default [`TokenAuthorizer`] accepts bearer tokens listed in
//! `SEPTIC_ADMIN_TOKENS`; deployments with a real identity provider plug
//! in their own implementation.

use std::collections::BTreeSet;

use actix_web::{HttpRequest, http::header};

/// Decides whether a request carries the admin capability.
pub trait AdminAuthorizer: Send + Sync {
    /// Returns `true` when `request` may call admin routes.
    fn is_admin(&self, request: &HttpRequest) -> bool;
}

/// Accepts `Authorization: Bearer <token>` for a fixed token set.
pub struct TokenAuthorizer {
    tokens: BTreeSet<String>,
}

impl TokenAuthorizer {
    #[must_use]
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens
                .into_iter()
                .map(Into::into)
                .filter(|t: &String| !t.trim().is_empty())
                .collect(),
        }
    }

    /// Reads comma-separated tokens from `SEPTIC_ADMIN_TOKENS`.
    #[must_use]
    pub fn from_env() -> Self {
        let authorizer = Self::new(
            std::env::var("SEPTIC_ADMIN_TOKENS")
                .unwrap_or_default()
                .split(',')
                .map(|t| t.trim().to_string()),
        );
        if authorizer.tokens.is_empty() {
            log::warn!("SEPTIC_ADMIN_TOKENS is empty; admin routes are disabled");
        }
        authorizer
    }
}

impl AdminAuthorizer for TokenAuthorizer {
    fn is_admin(&self, request: &HttpRequest) -> bool {
        request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| self.tokens.contains(token.trim()))
    }
}

#[cfg(test)]
mod tests {
    use actix_web::test::TestRequest;

    use super::*;

    #[test]
    fn accepts_listed_bearer_token() {
        let auth = TokenAuthorizer::new(["s3cret", " "]);
        let ok = TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Bearer s3cret"))
            .to_http_request();
        let wrong = TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Bearer nope"))
            .to_http_request();
        let missing = TestRequest::default().to_http_request();

        assert!(auth.is_admin(&ok));
        assert!(!auth.is_admin(&wrong));
        assert!(!auth.is_admin(&missing));
    }

    #[test]
    fn blank_tokens_never_match() {
        let auth = TokenAuthorizer::new([""]);
        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Bearer "))
            .to_http_request();
        assert!(!auth.is_admin(&req));
    }
}
