// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared-secret authorization for the job endpoints.
//!
//! Callers (an external cron) send the secret in the `x-cron-secret` header.
//! When no secret is configured every job request is rejected (fail-closed).

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

pub const SECRET_HEADER: &str = "x-cron-secret";

#[derive(Clone)]
pub struct JobAuth {
    /// Expected header value. `None` disables the job endpoints.
    pub secret: Option<String>,
}

impl std::fmt::Debug for JobAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobAuth")
            .field("secret", &self.secret.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

/// Compare without exiting early on the first differing byte.
fn secrets_match(given: &[u8], expected: &[u8]) -> bool {
    if given.len() != expected.len() {
        return false;
    }
    given
        .iter()
        .zip(expected)
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}

pub async fn job_auth_middleware(
    State(auth): State<JobAuth>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = auth.secret.as_deref() else {
        tracing::error!("gateway has no job_secret configured -- rejecting job request");
        return Err(StatusCode::UNAUTHORIZED);
    };

    let given = request
        .headers()
        .get(SECRET_HEADER)
        .map(|v| v.as_bytes())
        .unwrap_or_default();

    if secrets_match(given, expected.as_bytes()) {
        Ok(next.run(request).await)
    } else {
        tracing::warn!(path = %request.uri().path(), "job request with missing or wrong secret");
        Err(StatusCode::UNAUTHORIZED)
    }
}
