// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reminder delivery for Cadence.
//!
//! [`ChannelRouter`] implements the core [`Notifier`](cadence_core::Notifier)
//! trait: it looks up the patient's phone number through a
//! [`ContactDirectory`](cadence_core::ContactDirectory) and forwards the
//! rendered body to the [`Transport`] registered for the channel
//! ([`WhatsAppTransport`] or [`SmsTransport`]).

pub mod router;
pub mod sms;
pub mod transport;
pub mod whatsapp;

pub use router::ChannelRouter;
pub use sms::SmsTransport;
pub use transport::{DEFAULT_HTTP_TIMEOUT, Transport};
pub use whatsapp::WhatsAppTransport;
