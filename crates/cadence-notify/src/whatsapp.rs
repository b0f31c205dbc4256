// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp delivery through the Cloud API `messages` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use cadence_config::model::WhatsAppConfig;
use cadence_core::types::Channel;
use cadence_core::{AdapterType, CadenceError, HealthStatus, PluginAdapter};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::transport::{Transport, build_client, normalize_base, request_failed};

#[derive(Debug, Serialize)]
struct TextMessage<'a> {
    messaging_product: &'static str,
    recipient_type: &'static str,
    to: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    text: TextBody<'a>,
}

#[derive(Debug, Serialize)]
struct TextBody<'a> {
    preview_url: bool,
    body: &'a str,
}

#[derive(Debug, Deserialize)]
struct GraphErrorResponse {
    error: GraphError,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    message: String,
    #[serde(default)]
    code: Option<i64>,
}

/// Sends free-form text messages via `POST /{phone_number_id}/messages`.
pub struct WhatsAppTransport {
    client: reqwest::Client,
    access_token: String,
    phone_number_id: String,
    api_base: String,
}

impl std::fmt::Debug for WhatsAppTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhatsAppTransport")
            .field("access_token", &"[REDACTED]")
            .field("phone_number_id", &self.phone_number_id)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl WhatsAppTransport {
    pub fn from_config(config: &WhatsAppConfig, timeout: Duration) -> Result<Self, CadenceError> {
        let (Some(access_token), Some(phone_number_id)) =
            (config.access_token.clone(), config.phone_number_id.clone())
        else {
            return Err(CadenceError::Config(
                "whatsapp transport requires access_token and phone_number_id".to_string(),
            ));
        };

        Ok(Self {
            client: build_client(Channel::Whatsapp, timeout)?,
            access_token,
            phone_number_id,
            api_base: normalize_base(&config.api_base),
        })
    }

    fn messages_url(&self) -> String {
        format!("{}/{}/messages", self.api_base, self.phone_number_id)
    }
}

/// The Cloud API wants digits only, without the leading `+` of E.164.
fn wa_id(phone: &str) -> &str {
    phone.trim().trim_start_matches('+')
}

#[async_trait]
impl PluginAdapter for WhatsAppTransport {
    fn name(&self) -> &str {
        "whatsapp-cloud"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, CadenceError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CadenceError> {
        Ok(())
    }
}

#[async_trait]
impl Transport for WhatsAppTransport {
    fn channel(&self) -> Channel {
        Channel::Whatsapp
    }

    async fn deliver(&self, phone: &str, body: &str) -> Result<(), CadenceError> {
        let message = TextMessage {
            messaging_product: "whatsapp",
            recipient_type: "individual",
            to: wa_id(phone),
            kind: "text",
            text: TextBody {
                preview_url: false,
                body,
            },
        };

        let response = self
            .client
            .post(self.messages_url())
            .bearer_auth(&self.access_token)
            .json(&message)
            .send()
            .await
            .map_err(|e| request_failed(Channel::Whatsapp, e))?;

        let status = response.status();
        if status.is_success() {
            debug!(status = %status, "whatsapp accepted message");
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<GraphErrorResponse>(&text) {
            Ok(GraphErrorResponse {
                error: GraphError {
                    message,
                    code: Some(code),
                },
            }) => format!("whatsapp returned {status} (code {code}): {message}"),
            Ok(GraphErrorResponse { error }) => {
                format!("whatsapp returned {status}: {}", error.message)
            }
            Err(_) => format!("whatsapp returned {status}: {text}"),
        };
        Err(CadenceError::delivery(Channel::Whatsapp, message))
    }
}
