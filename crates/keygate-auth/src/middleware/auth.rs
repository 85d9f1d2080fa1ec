// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Access token authentication middleware.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::{
    body::Body,
    http::{header, Request},
    response::{IntoResponse, Response},
};
use tower::{Layer, Service};
use uuid::Uuid;

use crate::auth::{AuthContext, JwtManager};
use crate::error::ApiError;

/// Cookie carrying the access token for browser clients.
pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";

// =============================================================================
// AuthLayer
// =============================================================================

/// Layer that verifies access tokens.
///
/// The token is read from `Authorization: Bearer` or, failing that, from the
/// `accessToken` cookie. On success an [`AuthContext`] is inserted into the
/// request extensions.
#[derive(Clone)]
pub struct AuthLayer {
    jwt: JwtManager,
}

impl AuthLayer {
    /// Creates a new auth layer.
    pub fn new(jwt: JwtManager) -> Self {
        Self { jwt }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthMiddleware {
            inner,
            jwt: self.jwt.clone(),
        }
    }
}

// =============================================================================
// AuthMiddleware
// =============================================================================

/// Middleware for access token authentication.
#[derive(Clone)]
pub struct AuthMiddleware<S> {
    inner: S,
    jwt: JwtManager,
}

impl<S> Service<Request<Body>> for AuthMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let jwt = self.jwt.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let Some(token) = extract_token(&req) else {
                tracing::debug!("No access token provided");
                return Ok(ApiError::unauthorized("Login required").into_response());
            };

            let claims = match jwt.verify_access(&token) {
                Ok(claims) => claims,
                Err(e) => {
                    tracing::debug!(error = %e, "Access token rejected");
                    return Ok(ApiError::from(e).into_response());
                }
            };

            let ctx = AuthContext::from_claims(&claims).with_request_id(Uuid::now_v7());
            tracing::trace!(user_id = %ctx.user_id, role = %ctx.role, "Request authenticated");
            req.extensions_mut().insert(ctx);

            inner.call(req).await
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Reads the access token from the bearer header or the access cookie.
pub fn extract_token<B>(req: &Request<B>) -> Option<String> {
    extract_bearer_token(req).or_else(|| extract_cookie(req, ACCESS_TOKEN_COOKIE))
}

fn extract_bearer_token<B>(req: &Request<B>) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

fn extract_cookie<B>(req: &Request<B>, name: &str) -> Option<String> {
    req.headers()
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

// =============================================================================
// Tests
// =============================================================================
