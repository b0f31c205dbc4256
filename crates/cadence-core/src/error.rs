// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Cadence reminder pipeline.

use thiserror::Error;

use crate::types::{Channel, QueueStatus, TemplateSlug};

/// The primary error type used across all Cadence collaborator traits and core operations.
#[derive(Debug, Error)]
pub enum CadenceError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// An active queue item already exists for the key.
    #[error("queue item already scheduled for {org_id}/{assignment_id}/{template_slug}")]
    DuplicateKey {
        org_id: String,
        assignment_id: String,
        template_slug: TemplateSlug,
    },

    /// A status patch was applied to a queue item that is no longer in flight.
    #[error("invalid transition for queue item {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: QueueStatus,
        to: QueueStatus,
    },

    /// The claim on a queue item expired and another dispatch run took it over.
    #[error("claim on queue item {id} was lost to another dispatch run")]
    LeaseLost { id: String },

    /// Requested entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Outbound delivery failed (transport rejected, recipient unknown, network failure).
    #[error("delivery via {channel} failed: {message}")]
    Delivery {
        channel: Channel,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CadenceError {
    /// Convenience constructor for delivery failures without an underlying source.
    pub fn delivery(channel: Channel, message: impl Into<String>) -> Self {
        CadenceError::Delivery {
            channel,
            message: message.into(),
            source: None,
        }
    }

    /// Whether this error means another dispatch run now owns the item.
    pub fn is_lease_lost(&self) -> bool {
        matches!(self, CadenceError::LeaseLost { .. })
    }

    /// Whether this error is the "already scheduled" race outcome.
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, CadenceError::DuplicateKey { .. })
    }
}
