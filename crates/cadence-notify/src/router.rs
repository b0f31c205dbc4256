// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! [`Notifier`] that resolves the patient's phone and hands the body to the
//! transport registered for the requested channel.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cadence_config::model::{SmsConfig, WhatsAppConfig};
use cadence_core::types::{Channel, Recipient};
use cadence_core::{
    AdapterType, CadenceError, ContactDirectory, HealthStatus, Notifier, PluginAdapter,
};
use tracing::{debug, info};

use crate::sms::SmsTransport;
use crate::transport::Transport;
use crate::whatsapp::WhatsAppTransport;

pub struct ChannelRouter {
    contacts: Arc<dyn ContactDirectory>,
    transports: HashMap<Channel, Arc<dyn Transport>>,
}

impl ChannelRouter {
    pub fn new(contacts: Arc<dyn ContactDirectory>) -> Self {
        Self {
            contacts,
            transports: HashMap::new(),
        }
    }

    /// Register a transport, replacing any earlier one for the same channel.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transports.insert(transport.channel(), transport);
        self
    }

    /// Router with a transport for every channel whose credentials are configured.
    pub fn from_config(
        contacts: Arc<dyn ContactDirectory>,
        sms: &SmsConfig,
        whatsapp: &WhatsAppConfig,
        timeout: Duration,
    ) -> Result<Self, CadenceError> {
        let mut router = Self::new(contacts);
        if sms.is_configured() {
            router = router.with_transport(Arc::new(SmsTransport::from_config(sms, timeout)?));
        }
        if whatsapp.is_configured() {
            router =
                router.with_transport(Arc::new(WhatsAppTransport::from_config(whatsapp, timeout)?));
        }
        info!(channels = ?router.channels(), "channel router ready");
        Ok(router)
    }

    /// Channels with a registered transport, in a stable order.
    pub fn channels(&self) -> Vec<Channel> {
        let mut channels: Vec<Channel> = self.transports.keys().copied().collect();
        channels.sort();
        channels
    }
}

#[async_trait]
impl PluginAdapter for ChannelRouter {
    fn name(&self) -> &str {
        "channel-router"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Notifier
    }

    async fn health_check(&self) -> Result<HealthStatus, CadenceError> {
        if self.transports.is_empty() {
            return Ok(HealthStatus::Degraded(
                "no delivery transports configured".to_string(),
            ));
        }
        for transport in self.transports.values() {
            match transport.health_check().await? {
                HealthStatus::Healthy => {}
                other => return Ok(other),
            }
        }
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CadenceError> {
        for transport in self.transports.values() {
            transport.shutdown().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for ChannelRouter {
    async fn send(&self, channel: Channel, to: &Recipient, body: &str) -> Result<(), CadenceError> {
        let transport = self.transports.get(&channel).ok_or_else(|| {
            CadenceError::delivery(channel, format!("no transport configured for {channel}"))
        })?;

        let phone = self
            .contacts
            .phone_for(&to.org_id, &to.patient_id)
            .await?
            .filter(|phone| !phone.trim().is_empty())
            .ok_or_else(|| {
                CadenceError::delivery(
                    channel,
                    format!("no phone on file for patient {}", to.patient_id),
                )
            })?;

        debug!(
            org_id = %to.org_id,
            patient_id = %to.patient_id,
            channel = %channel,
            transport = transport.name(),
            "delivering reminder"
        );
        transport.deliver(&phone, body).await
    }
}
