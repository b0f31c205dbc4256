// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound delivery.

use async_trait::async_trait;

use crate::error::CadenceError;
use crate::types::{Channel, Recipient};

/// Sends a rendered reminder over a channel.
///
/// Any error is treated as a transient delivery failure by the dispatcher.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, channel: Channel, to: &Recipient, body: &str) -> Result<(), CadenceError>;
}

/// Resolves where a recipient can be reached.
#[async_trait]
pub trait ContactDirectory: Send + Sync {
    /// E.164 phone number of the patient, if known.
    async fn phone_for(&self, org_id: &str, patient_id: &str) -> Result<Option<String>, CadenceError>;
}
