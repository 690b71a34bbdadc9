use crate::api::ApiError;
use crate::AppState;
use axum::{
    body::Body,
    http::{header::AUTHORIZATION, Request},
    middleware::Next,
    response::Response,
};
use parley_identity::CallerIdentity;
use std::sync::Arc;

/// Wrapper for the verified caller identity stored in request extensions.
#[derive(Clone, Debug)]
pub struct CallerContext(pub CallerIdentity);

/// Middleware authenticating requests via `Authorization: Bearer`.
///
/// The credential is verified against the external identity service before
/// any other work happens. Every verifier failure (rejection, timeout,
/// unreachable endpoint) maps to `401` so the check fails closed.
pub async fn auth_middleware(mut req: Request<Body>, next: Next) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::Unauthorized("missing bearer credential".to_string()))?
        .to_string();

    let state = req
        .extensions()
        .get::<Arc<AppState>>()
        .ok_or_else(|| ApiError::Internal("app state missing from request".to_string()))?
        .clone();

    let identity = state
        .verifier
        .verify(&token)
        .await
        .map_err(|e| ApiError::Unauthorized(e.to_string()))?;

    req.extensions_mut().insert(CallerContext(identity));

    Ok(next.run(req).await)
}
