// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scriptable notifier for deterministic testing.
//!
//! `MockNotifier` records every delivered message. Calls can be scripted to
//! fail, hang forever (to exercise send timeouts), or take a fixed delay.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use cadence_core::types::{AdapterType, Channel, HealthStatus, Recipient};
use cadence_core::{CadenceError, Notifier, PluginAdapter};

/// A message accepted by the mock.
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub channel: Channel,
    pub recipient: Recipient,
    pub body: String,
}

#[derive(Debug, Clone)]
enum Behavior {
    Succeed,
    Fail(String),
    Hang,
}

/// A notifier whose outcome is controlled by the test.
///
/// Resolution order for each call: per-patient override, then the next
/// scripted outcome, then the default (succeed unless changed).
pub struct MockNotifier {
    sent: Mutex<Vec<SentMessage>>,
    calls: AtomicUsize,
    default: Mutex<Behavior>,
    scripted: Mutex<VecDeque<Behavior>>,
    per_patient: Mutex<HashMap<String, Behavior>>,
    delay: Mutex<Option<Duration>>,
}

impl MockNotifier {
    /// Create a notifier that accepts every message.
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            default: Mutex::new(Behavior::Succeed),
            scripted: Mutex::new(VecDeque::new()),
            per_patient: Mutex::new(HashMap::new()),
            delay: Mutex::new(None),
        }
    }

    /// Fail every call not otherwise scripted.
    pub async fn fail_always(&self, error: &str) {
        *self.default.lock().await = Behavior::Fail(error.to_string());
    }

    /// Never resolve calls not otherwise scripted.
    pub async fn hang_always(&self) {
        *self.default.lock().await = Behavior::Hang;
    }

    /// Fail the next call only.
    pub async fn fail_next(&self, error: &str) {
        self.scripted
            .lock()
            .await
            .push_back(Behavior::Fail(error.to_string()));
    }

    /// Fail every call addressed to `patient_id`.
    pub async fn fail_for_patient(&self, patient_id: &str, error: &str) {
        self.per_patient
            .lock()
            .await
            .insert(patient_id.to_string(), Behavior::Fail(error.to_string()));
    }

    /// Sleep for `delay` before resolving each call.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.lock().await = Some(delay);
    }

    /// Messages that were delivered successfully.
    pub async fn sent_messages(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Number of `send` calls, successful or not.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn behavior_for(&self, to: &Recipient) -> Behavior {
        if let Some(behavior) = self.per_patient.lock().await.get(&to.patient_id) {
            return behavior.clone();
        }
        if let Some(behavior) = self.scripted.lock().await.pop_front() {
            return behavior;
        }
        self.default.lock().await.clone()
    }
}

impl Default for MockNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockNotifier {
    fn name(&self) -> &str {
        "mock-notifier"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Notifier
    }

    async fn health_check(&self) -> Result<HealthStatus, CadenceError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CadenceError> {
        Ok(())
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send(&self, channel: Channel, to: &Recipient, body: &str) -> Result<(), CadenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self.behavior_for(to).await;

        let delay = *self.delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match behavior {
            Behavior::Succeed => {
                self.sent.lock().await.push(SentMessage {
                    channel,
                    recipient: to.clone(),
                    body: body.to_string(),
                });
                Ok(())
            }
            Behavior::Fail(message) => Err(CadenceError::delivery(channel, message)),
            Behavior::Hang => {
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }
}
