// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-channel delivery seam and shared HTTP plumbing.

use std::time::Duration;

use async_trait::async_trait;
use cadence_core::types::Channel;
use cadence_core::{CadenceError, PluginAdapter};

/// Default whole-request timeout for transport HTTP calls.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Delivers a rendered body to a phone number over one channel.
#[async_trait]
pub trait Transport: PluginAdapter {
    fn channel(&self) -> Channel;

    async fn deliver(&self, phone: &str, body: &str) -> Result<(), CadenceError>;
}

pub(crate) fn build_client(channel: Channel, timeout: Duration) -> Result<reqwest::Client, CadenceError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| CadenceError::Delivery {
            channel,
            message: format!("failed to build HTTP client: {e}"),
            source: Some(Box::new(e)),
        })
}

pub(crate) fn request_failed(channel: Channel, e: reqwest::Error) -> CadenceError {
    CadenceError::Delivery {
        channel,
        message: format!("HTTP request failed: {e}"),
        source: Some(Box::new(e)),
    }
}

/// Trim a trailing slash so paths can be appended with `/`.
pub(crate) fn normalize_base(api_base: &str) -> String {
    api_base.trim_end_matches('/').to_string()
}
