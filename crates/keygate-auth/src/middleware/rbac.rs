// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Permission and role guard middleware.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    body::Body,
    http::Request,
    response::{IntoResponse, Response},
};
use tower::{Layer, Service};

use crate::auth::{AuthContext, Authorizer, Requirement};
use crate::error::ApiError;

// =============================================================================
// RequireLayer
// =============================================================================

/// Layer that evaluates a [`Requirement`] through the [`Authorizer`].
///
/// Must sit inside an [`AuthLayer`](super::AuthLayer).
#[derive(Clone)]
pub struct RequireLayer {
    authorizer: Authorizer,
    requirement: Arc<Requirement>,
}

impl RequireLayer {
    /// Creates a layer for an arbitrary requirement.
    pub fn new(authorizer: Authorizer, requirement: Requirement) -> Self {
        Self {
            authorizer,
            requirement: Arc::new(requirement),
        }
    }

    /// Requires a single permission.
    pub fn permission(authorizer: Authorizer, code: &str) -> Self {
        Self::new(authorizer, Requirement::permission(code))
    }
}

impl<S> Layer<S> for RequireLayer {
    type Service = RequireMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequireMiddleware {
            inner,
            authorizer: self.authorizer.clone(),
            requirement: self.requirement.clone(),
        }
    }
}

// =============================================================================
// RequireMiddleware
// =============================================================================

/// Middleware enforcing a [`Requirement`].
#[derive(Clone)]
pub struct RequireMiddleware<S> {
    inner: S,
    authorizer: Authorizer,
    requirement: Arc<Requirement>,
}

impl<S> Service<Request<Body>> for RequireMiddleware<S>
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

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let authorizer = self.authorizer.clone();
        let requirement = self.requirement.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let Some(ctx) = req.extensions().get::<AuthContext>().cloned() else {
                tracing::warn!("No auth context found, denying access");
                return Ok(ApiError::unauthorized("Login required").into_response());
            };

            match authorizer.authorize(&ctx, &requirement).await {
                Ok(()) => inner.call(req).await,
                Err(e) => Ok(e.into_response()),
            }
        })
    }
}

/// Builds a [`RequireLayer`] from permission codes.
#[macro_export]
macro_rules! require_permission {
    ($authorizer:expr, $($code:expr),+ $(,)?) => {
        $crate::middleware::RequireLayer::new(
            $authorizer,
            $crate::auth::Requirement::all([$($code),+]),
        )
    };
}

// =============================================================================
// Tests
// =============================================================================
