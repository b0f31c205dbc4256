// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across collaborator traits and the Cadence pipeline.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::warn;

use crate::error::CadenceError;

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a [`PluginAdapter`](crate::PluginAdapter).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Storage,
    Notifier,
    Transport,
}

// --- Assignments ---

/// Lifecycle state of an assignment. Only `Active` assignments produce reminders.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Active,
    Paused,
    Completed,
    Canceled,
}

/// The clinical module an assignment belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AssignmentModule {
    Appointment,
    Exercise,
    Medication,
    Form,
    Custom,
}

/// A unit of recurring or one-off work owed to a patient by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: String,
    pub org_id: String,
    pub patient_id: String,
    pub provider_id: String,
    pub module: AssignmentModule,
    pub title: String,
    pub due_at: Option<DateTime<Utc>>,
    pub status: AssignmentStatus,
    pub last_done_at: Option<DateTime<Utc>>,
}

impl Assignment {
    pub fn is_active(&self) -> bool {
        self.status == AssignmentStatus::Active
    }
}

// --- Channels and templates ---

/// Outbound delivery channel.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Whatsapp,
    Sms,
}

/// Selects the phrasing of a reminder.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TemplateSlug {
    Due,
    Overdue,
}

impl TemplateSlug {
    /// `Overdue` when the due instant has already passed, `Due` otherwise.
    pub fn classify(due_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        if due_at < now {
            TemplateSlug::Overdue
        } else {
            TemplateSlug::Due
        }
    }
}

/// Who a reminder is addressed to. Contact details are resolved by the notifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Recipient {
    pub org_id: String,
    pub patient_id: String,
}

/// A scalar carried in a queue item payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PayloadValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<&str> for PayloadValue {
    fn from(value: &str) -> Self {
        PayloadValue::Text(value.to_string())
    }
}

impl From<String> for PayloadValue {
    fn from(value: String) -> Self {
        PayloadValue::Text(value)
    }
}

impl From<i64> for PayloadValue {
    fn from(value: i64) -> Self {
        PayloadValue::Int(value)
    }
}

impl From<bool> for PayloadValue {
    fn from(value: bool) -> Self {
        PayloadValue::Bool(value)
    }
}

/// Opaque map of scalars passed through to the renderer untouched.
pub type Payload = BTreeMap<String, PayloadValue>;

// --- Preferences ---

pub const DEFAULT_TIMEZONE: &str = "UTC";
pub const DEFAULT_WINDOW_START: &str = "09:00";
pub const DEFAULT_WINDOW_END: &str = "20:00";
/// Monday through Friday, with 0 = Sunday.
pub const DEFAULT_DAYS_OF_WEEK: [u8; 5] = [1, 2, 3, 4, 5];
pub const DEFAULT_CHANNELS: [Channel; 2] = [Channel::Whatsapp, Channel::Sms];
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_BACKOFF_MINUTES: u32 = 30;

/// Per (org, provider) delivery policy as stored by the settings UI.
///
/// Whatever the provider saved is carried here verbatim and [`ReminderPreference::resolve`] turns it into a
/// [`DeliveryPolicy`], substituting defaults for anything unusable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderPreference {
    pub timezone: String,
    /// Wall-clock `HH:MM`.
    pub window_start: String,
    /// Wall-clock `HH:MM`, exclusive.
    pub window_end: String,
    /// 0 = Sunday ... 6 = Saturday.
    pub days_of_week: Vec<i64>,
    pub channels_priority: Vec<String>,
    pub max_retries: i64,
    pub retry_backoff_minutes: i64,
}

impl Default for ReminderPreference {
    fn default() -> Self {
        Self {
            timezone: DEFAULT_TIMEZONE.to_string(),
            window_start: DEFAULT_WINDOW_START.to_string(),
            window_end: DEFAULT_WINDOW_END.to_string(),
            days_of_week: DEFAULT_DAYS_OF_WEEK.iter().map(|d| i64::from(*d)).collect(),
            channels_priority: DEFAULT_CHANNELS.iter().map(|c| c.to_string()).collect(),
            max_retries: i64::from(DEFAULT_MAX_RETRIES),
            retry_backoff_minutes: i64::from(DEFAULT_RETRY_BACKOFF_MINUTES),
        }
    }
}

impl ReminderPreference {
    /// Resolve into a usable policy, falling back field by field to defaults.
    pub fn resolve(&self) -> DeliveryPolicy {
        let timezone = match self.timezone.trim().parse::<Tz>() {
            Ok(tz) => tz,
            Err(_) => {
                warn!(timezone = %self.timezone, "unknown timezone in reminder preference, using UTC");
                chrono_tz::UTC
            }
        };

        let window = match (parse_hhmm(&self.window_start), parse_hhmm(&self.window_end)) {
            (Some(start), Some(end)) if start < end => (start, end),
            _ => {
                warn!(
                    window_start = %self.window_start,
                    window_end = %self.window_end,
                    "unusable delivery window in reminder preference, using {DEFAULT_WINDOW_START}-{DEFAULT_WINDOW_END}"
                );
                default_window_bounds()
            }
        };

        let mut days: BTreeSet<u8> = self
            .days_of_week
            .iter()
            .filter_map(|d| u8::try_from(*d).ok())
            .filter(|d| *d <= 6)
            .collect();
        if days.is_empty() {
            warn!(days_of_week = ?self.days_of_week, "no usable sending days in reminder preference, using Monday-Friday");
            days = DEFAULT_DAYS_OF_WEEK.iter().copied().collect();
        }

        let mut channels = Vec::new();
        for raw in &self.channels_priority {
            if let Ok(channel) = raw.trim().parse::<Channel>()
                && !channels.contains(&channel)
            {
                channels.push(channel);
            }
        }
        if channels.is_empty() {
            warn!(channels = ?self.channels_priority, "no known channels in reminder preference, using defaults");
            channels = DEFAULT_CHANNELS.to_vec();
        }

        let max_retries = u32::try_from(self.max_retries).unwrap_or(DEFAULT_MAX_RETRIES);
        let retry_backoff_minutes = u32::try_from(self.retry_backoff_minutes)
            .ok()
            .filter(|m| *m > 0)
            .unwrap_or(DEFAULT_RETRY_BACKOFF_MINUTES);

        DeliveryPolicy {
            window: DeliveryWindow {
                timezone,
                start: window.0,
                end: window.1,
                days_of_week: days,
            },
            channels,
            max_retries,
            retry_backoff_minutes,
        }
    }
}

fn default_window_bounds() -> (NaiveTime, NaiveTime) {
    (
        NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
        NaiveTime::from_hms_opt(20, 0, 0).unwrap_or_default(),
    )
}

/// Parse a wall-clock `HH:MM` (seconds, if present, are ignored).
pub fn parse_hhmm(raw: &str) -> Option<NaiveTime> {
    let mut parts = raw.trim().split(':');
    let hour: u32 = parts.next()?.trim().parse().ok()?;
    let minute: u32 = parts.next()?.trim().parse().ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// The allowed sending window in a provider's local time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryWindow {
    pub timezone: Tz,
    /// Inclusive start of the daily window.
    pub start: NaiveTime,
    /// Exclusive end of the daily window.
    pub end: NaiveTime,
    /// 0 = Sunday ... 6 = Saturday. Never empty when built by [`ReminderPreference::resolve`].
    pub days_of_week: BTreeSet<u8>,
}

impl Default for DeliveryWindow {
    fn default() -> Self {
        ReminderPreference::default().resolve().window
    }
}

/// A sanitized [`ReminderPreference`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryPolicy {
    pub window: DeliveryWindow,
    /// Never empty.
    pub channels: Vec<Channel>,
    pub max_retries: u32,
    /// Always positive.
    pub retry_backoff_minutes: u32,
}

impl DeliveryPolicy {
    pub fn primary_channel(&self) -> Channel {
        self.channels.first().copied().unwrap_or(Channel::Whatsapp)
    }
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        ReminderPreference::default().resolve()
    }
}

// --- Queue ---

/// Status of a queue item. `Scheduled` and `Retrying` are in flight; the rest are terminal.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Scheduled,
    Retrying,
    Sent,
    Failed,
    Canceled,
}

impl QueueStatus {
    pub fn is_active(self) -> bool {
        matches!(self, QueueStatus::Scheduled | QueueStatus::Retrying)
    }

    /// The single transition table for queue items.
    ///
    /// In-flight items may move to any state except back to `Scheduled`;
    /// terminal items never move.
    pub fn can_transition_to(self, next: QueueStatus) -> bool {
        self.is_active() && next != QueueStatus::Scheduled
    }
}

/// Uniqueness key for outstanding queue items.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueueKey {
    pub org_id: String,
    pub assignment_id: String,
    pub template_slug: TemplateSlug,
}

/// A scheduled notification attempt chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: String,
    pub org_id: String,
    pub patient_id: String,
    pub provider_id: String,
    pub assignment_id: String,
    pub channel: Channel,
    pub template_slug: TemplateSlug,
    pub payload: Payload,
    pub status: QueueStatus,
    pub attempt_count: u32,
    pub next_attempt_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QueueItem {
    /// A fresh `Scheduled` item for an assignment.
    pub fn scheduled(
        assignment: &Assignment,
        channel: Channel,
        template_slug: TemplateSlug,
        payload: Payload,
        next_attempt_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            org_id: assignment.org_id.clone(),
            patient_id: assignment.patient_id.clone(),
            provider_id: assignment.provider_id.clone(),
            assignment_id: assignment.id.clone(),
            channel,
            template_slug,
            payload,
            status: QueueStatus::Scheduled,
            attempt_count: 0,
            next_attempt_at,
            sent_at: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn key(&self) -> QueueKey {
        QueueKey {
            org_id: self.org_id.clone(),
            assignment_id: self.assignment_id.clone(),
            template_slug: self.template_slug,
        }
    }

    pub fn recipient(&self) -> Recipient {
        Recipient {
            org_id: self.org_id.clone(),
            patient_id: self.patient_id.clone(),
        }
    }

    /// Apply a patch in place, enforcing the transition table.
    pub fn apply(&mut self, patch: &StatusPatch, now: DateTime<Utc>) -> Result<(), CadenceError> {
        if !self.status.can_transition_to(patch.status) {
            return Err(CadenceError::InvalidTransition {
                id: self.id.clone(),
                from: self.status,
                to: patch.status,
            });
        }
        self.status = patch.status;
        self.attempt_count = patch.attempt_count;
        if let Some(next) = patch.next_attempt_at {
            self.next_attempt_at = next;
        }
        if patch.sent_at.is_some() {
            self.sent_at = patch.sent_at;
        }
        self.last_error = patch.last_error.clone();
        self.updated_at = now;
        Ok(())
    }
}

/// A queue item held by exactly one dispatch run.
///
/// Can only be built from an in-flight item, and is the only source of
/// [`StatusPatch`] values, so terminal items cannot be patched. Each claim
/// carries a fresh token; stores accept renewals and patches only while
/// that token is still the one on record.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimedItem {
    item: QueueItem,
    claim_token: String,
}

impl ClaimedItem {
    /// Take a new claim on an in-flight item.
    pub fn claim(item: QueueItem) -> Result<Self, CadenceError> {
        if !item.status.is_active() {
            return Err(CadenceError::InvalidTransition {
                id: item.id,
                from: item.status,
                to: QueueStatus::Retrying,
            });
        }
        Ok(ClaimedItem {
            item,
            claim_token: uuid::Uuid::new_v4().to_string(),
        })
    }

    pub fn claim_token(&self) -> &str {
        &self.claim_token
    }

    /// Delivery succeeded.
    pub fn mark_sent(&self, now: DateTime<Utc>) -> StatusPatch {
        self.patch(QueueStatus::Sent, self.item.attempt_count.saturating_add(1), None, Some(now), None)
    }

    /// Delivery failed and another attempt is scheduled.
    pub fn mark_retrying(&self, next_attempt_at: DateTime<Utc>, error: impl Into<String>) -> StatusPatch {
        self.patch(
            QueueStatus::Retrying,
            self.item.attempt_count.saturating_add(1),
            Some(next_attempt_at),
            None,
            Some(error.into()),
        )
    }

    /// Delivery failed and retries are exhausted.
    pub fn mark_failed(&self, error: impl Into<String>) -> StatusPatch {
        self.patch(
            QueueStatus::Failed,
            self.item.attempt_count.saturating_add(1),
            None,
            None,
            Some(error.into()),
        )
    }

    /// The backing assignment is gone or no longer active.
    pub fn mark_canceled(&self) -> StatusPatch {
        self.patch(
            QueueStatus::Canceled,
            self.item.attempt_count,
            None,
            None,
            self.item.last_error.clone(),
        )
    }

    fn patch(
        &self,
        status: QueueStatus,
        attempt_count: u32,
        next_attempt_at: Option<DateTime<Utc>>,
        sent_at: Option<DateTime<Utc>>,
        last_error: Option<String>,
    ) -> StatusPatch {
        StatusPatch {
            claim_token: self.claim_token.clone(),
            status,
            attempt_count,
            next_attempt_at,
            sent_at,
            last_error,
        }
    }
}

impl std::ops::Deref for ClaimedItem {
    type Target = QueueItem;

    fn deref(&self) -> &QueueItem {
        &self.item
    }
}

/// A status change for an in-flight queue item, produced by [`ClaimedItem`].
#[derive(Debug, Clone, PartialEq)]
pub struct StatusPatch {
    claim_token: String,
    status: QueueStatus,
    attempt_count: u32,
    next_attempt_at: Option<DateTime<Utc>>,
    sent_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

impl StatusPatch {
    /// Token of the claim that produced this patch.
    pub fn claim_token(&self) -> &str {
        &self.claim_token
    }

    pub fn status(&self) -> QueueStatus {
        self.status
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// `None` leaves the stored value unchanged.
    pub fn next_attempt_at(&self) -> Option<DateTime<Utc>> {
        self.next_attempt_at
    }

    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        self.sent_at
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

/// Number of queue items per status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatusCounts {
    pub scheduled: u64,
    pub retrying: u64,
    pub sent: u64,
    pub failed: u64,
    pub canceled: u64,
}

impl QueueStatusCounts {
    pub fn add(&mut self, status: QueueStatus, count: u64) {
        match status {
            QueueStatus::Scheduled => self.scheduled += count,
            QueueStatus::Retrying => self.retrying += count,
            QueueStatus::Sent => self.sent += count,
            QueueStatus::Failed => self.failed += count,
            QueueStatus::Canceled => self.canceled += count,
        }
    }

    pub fn total(&self) -> u64 {
        self.scheduled + self.retrying + self.sent + self.failed + self.canceled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn assignment() -> Assignment {
        Assignment {
            id: "asg-1".into(),
            org_id: "org-1".into(),
            patient_id: "pat-1".into(),
            provider_id: "prov-1".into(),
            module: AssignmentModule::Exercise,
            title: "Knee stretches".into(),
            due_at: Some(Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap()),
            status: AssignmentStatus::Active,
            last_done_at: None,
        }
    }

    #[test]
    fn default_preference_resolves_to_documented_defaults() {
        let policy = ReminderPreference::default().resolve();
        assert_eq!(policy.window.timezone, chrono_tz::UTC);
        assert_eq!(policy.window.start, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(policy.window.end, NaiveTime::from_hms_opt(20, 0, 0).unwrap());
        assert_eq!(
            policy.window.days_of_week,
            [1, 2, 3, 4, 5].into_iter().collect::<BTreeSet<u8>>()
        );
        assert_eq!(policy.channels, vec![Channel::Whatsapp, Channel::Sms]);
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.retry_backoff_minutes, 30);
    }

    #[test]
    fn misconfigured_fields_fall_back_individually() {
        let pref = ReminderPreference {
            timezone: "Mars/Olympus".into(),
            window_start: "21:00".into(),
            window_end: "08:00".into(),
            days_of_week: vec![9, -1],
            channels_priority: vec!["pigeon".into(), "sms".into(), "sms".into()],
            max_retries: -2,
            retry_backoff_minutes: 0,
        };
        let policy = pref.resolve();
        assert_eq!(policy.window.timezone, chrono_tz::UTC);
        assert_eq!(policy.window.start, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(policy.window.days_of_week.len(), 5);
        assert_eq!(policy.channels, vec![Channel::Sms]);
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.retry_backoff_minutes, 30);
    }

    #[test]
    fn valid_custom_preference_is_kept() {
        let pref = ReminderPreference {
            timezone: "America/Sao_Paulo".into(),
            window_start: "07:30".into(),
            window_end: "12:15".into(),
            days_of_week: vec![0, 6],
            channels_priority: vec!["sms".into(), "whatsapp".into()],
            max_retries: 0,
            retry_backoff_minutes: 5,
        };
        let policy = pref.resolve();
        assert_eq!(policy.window.timezone, chrono_tz::America::Sao_Paulo);
        assert_eq!(policy.window.start, NaiveTime::from_hms_opt(7, 30, 0).unwrap());
        assert_eq!(policy.window.end, NaiveTime::from_hms_opt(12, 15, 0).unwrap());
        assert_eq!(policy.primary_channel(), Channel::Sms);
        assert_eq!(policy.max_retries, 0);
        assert_eq!(policy.retry_backoff_minutes, 5);
    }

    #[test]
    fn explicitly_empty_days_fall_back_to_weekdays() {
        let pref = ReminderPreference {
            days_of_week: vec![],
            ..ReminderPreference::default()
        };
        assert_eq!(
            pref.resolve().window.days_of_week,
            DEFAULT_DAYS_OF_WEEK.into_iter().collect::<BTreeSet<u8>>()
        );
    }

    #[test]
    fn parse_hhmm_accepts_seconds_and_rejects_garbage() {
        assert_eq!(parse_hhmm("08:05"), NaiveTime::from_hms_opt(8, 5, 0));
        assert_eq!(parse_hhmm("08:05:59"), NaiveTime::from_hms_opt(8, 5, 0));
        assert_eq!(parse_hhmm("24:00"), None);
        assert_eq!(parse_hhmm("noon"), None);
        assert_eq!(parse_hhmm(""), None);
    }

    #[test]
    fn template_slug_classification() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();
        assert_eq!(
            TemplateSlug::classify(now - chrono::Duration::hours(2), now),
            TemplateSlug::Overdue
        );
        assert_eq!(TemplateSlug::classify(now, now), TemplateSlug::Due);
        assert_eq!(
            TemplateSlug::classify(now + chrono::Duration::hours(3), now),
            TemplateSlug::Due
        );
    }

    #[test]
    fn transition_table() {
        use QueueStatus::*;
        for from in [Scheduled, Retrying] {
            for to in [Retrying, Sent, Failed, Canceled] {
                assert!(from.can_transition_to(to), "{from} -> {to}");
            }
            assert!(!from.can_transition_to(Scheduled));
        }
        for from in [Sent, Failed, Canceled] {
            for to in [Scheduled, Retrying, Sent, Failed, Canceled] {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn terminal_items_cannot_be_claimed() {
        let now = Utc::now();
        let mut item = QueueItem::scheduled(
            &assignment(),
            Channel::Whatsapp,
            TemplateSlug::Due,
            Payload::new(),
            now,
            now,
        );
        item.status = QueueStatus::Sent;
        let err = ClaimedItem::claim(item).unwrap_err();
        assert!(matches!(err, CadenceError::InvalidTransition { from: QueueStatus::Sent, .. }));
    }

    #[test]
    fn claimed_patches_increment_attempts() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();
        let item = QueueItem::scheduled(
            &assignment(),
            Channel::Sms,
            TemplateSlug::Due,
            Payload::new(),
            now,
            now,
        );
        let claimed = ClaimedItem::claim(item).unwrap();

        let sent = claimed.mark_sent(now);
        assert_eq!(sent.status(), QueueStatus::Sent);
        assert_eq!(sent.attempt_count(), 1);
        assert_eq!(sent.sent_at(), Some(now));
        assert_eq!(sent.last_error(), None);

        let later = now + chrono::Duration::minutes(30);
        let retry = claimed.mark_retrying(later, "gateway 503");
        assert_eq!(retry.status(), QueueStatus::Retrying);
        assert_eq!(retry.attempt_count(), 1);
        assert_eq!(retry.next_attempt_at(), Some(later));
        assert_eq!(retry.last_error(), Some("gateway 503"));

        let failed = claimed.mark_failed("gave up");
        assert_eq!(failed.next_attempt_at(), None);

        let canceled = claimed.mark_canceled();
        assert_eq!(canceled.attempt_count(), 0);

        for patch in [&sent, &retry, &failed, &canceled] {
            assert_eq!(patch.claim_token(), claimed.claim_token());
        }
    }

    #[test]
    fn every_claim_gets_its_own_token() {
        let now = Utc::now();
        let item = QueueItem::scheduled(
            &assignment(),
            Channel::Sms,
            TemplateSlug::Due,
            Payload::new(),
            now,
            now,
        );
        let first = ClaimedItem::claim(item.clone()).unwrap();
        let second = ClaimedItem::claim(item).unwrap();
        assert_ne!(first.claim_token(), second.claim_token());
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn apply_rejects_patches_on_terminal_items() {
        let now = Utc::now();
        let item = QueueItem::scheduled(
            &assignment(),
            Channel::Sms,
            TemplateSlug::Overdue,
            Payload::new(),
            now,
            now,
        );
        let claimed = ClaimedItem::claim(item.clone()).unwrap();
        let mut stored = item;
        stored.apply(&claimed.mark_sent(now), now).unwrap();
        assert_eq!(stored.status, QueueStatus::Sent);

        let err = stored
            .apply(&claimed.mark_retrying(now, "late failure"), now)
            .unwrap_err();
        assert!(matches!(
            err,
            CadenceError::InvalidTransition {
                from: QueueStatus::Sent,
                to: QueueStatus::Retrying,
                ..
            }
        ));
        assert_eq!(stored.status, QueueStatus::Sent);
    }

    #[test]
    fn payload_serializes_as_plain_json_scalars() {
        let mut payload = Payload::new();
        payload.insert("title".into(), "Knee stretches".into());
        payload.insert("reps".into(), PayloadValue::Int(12));
        payload.insert("urgent".into(), true.into());
        let json = serde_json::to_string(&payload).unwrap();
        assert_eq!(json, r#"{"reps":12,"title":"Knee stretches","urgent":true}"#);
        let back: Payload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn enums_use_snake_case_wire_names() {
        assert_eq!(Channel::Whatsapp.to_string(), "whatsapp");
        assert_eq!("sms".parse::<Channel>().unwrap(), Channel::Sms);
        assert_eq!(QueueStatus::Retrying.to_string(), "retrying");
        assert_eq!(TemplateSlug::Overdue.to_string(), "overdue");
        assert_eq!(
            "completed".parse::<AssignmentStatus>().unwrap(),
            AssignmentStatus::Completed
        );
    }
}
