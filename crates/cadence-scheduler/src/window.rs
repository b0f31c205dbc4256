// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery window policy.
//!
//! Pure functions: every call takes `now` explicitly and never reads the clock.
//! Comparisons happen on `HH:MM` wall-clock minutes in the window's timezone.

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use tracing::warn;

use cadence_core::types::DeliveryWindow;

/// Longest spring-forward gap we step over when a window start does not exist locally.
const MAX_GAP_MINUTES: i64 = 180;

/// The earliest instant `>= now` at which a reminder may be sent.
///
/// - Inside today's window on an allowed day: `now` itself.
/// - Before today's window on an allowed day: today's window start.
/// - Otherwise: the window start of the next allowed day, at most 7 days out.
///
/// An empty `days_of_week` is a misconfiguration and resolves to tomorrow's
/// window start.
pub fn next_eligible(now: DateTime<Utc>, window: &DeliveryWindow) -> DateTime<Utc> {
    let tz = window.timezone;
    let local = now.with_timezone(&tz);
    let today = local.date_naive();

    if window.days_of_week.is_empty() {
        warn!(timezone = %tz, "delivery window has no allowed weekdays, using tomorrow");
        return today
            .checked_add_days(Days::new(1))
            .map(|day| local_instant(tz, day, window.start))
            .unwrap_or(now);
    }

    if is_allowed_day(window, today) {
        let minute = minute_of_day(local.time());
        if minute < minute_of_day(window.start) {
            return local_instant(tz, today, window.start);
        }
        if minute < minute_of_day(window.end) {
            return now;
        }
    }

    for offset in 1..=7 {
        let Some(day) = today.checked_add_days(Days::new(offset)) else {
            break;
        };
        if is_allowed_day(window, day) {
            return local_instant(tz, day, window.start);
        }
    }

    // Unreachable with a non-empty day set; keep the result deterministic.
    now
}

/// Whether `instant` may be used for delivery as-is.
pub fn is_within_window(instant: DateTime<Utc>, window: &DeliveryWindow) -> bool {
    let local = instant.with_timezone(&window.timezone);
    let minute = minute_of_day(local.time());
    is_allowed_day(window, local.date_naive())
        && minute >= minute_of_day(window.start)
        && minute < minute_of_day(window.end)
}

/// 0 = Sunday ... 6 = Saturday.
pub fn weekday_index(day: NaiveDate) -> u8 {
    // num_days_from_sunday is always in 0..=6
    day.weekday().num_days_from_sunday() as u8
}

fn is_allowed_day(window: &DeliveryWindow, day: NaiveDate) -> bool {
    window.days_of_week.contains(&weekday_index(day))
}

fn minute_of_day(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

/// Resolve a local wall-clock time to UTC.
///
/// Ambiguous times (fall-back) resolve to the earlier instant; times inside a
/// spring-forward gap resolve to the first valid minute after the gap.
fn local_instant(tz: Tz, day: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    let naive = day.and_time(time);
    if let Some(resolved) = tz.from_local_datetime(&naive).earliest() {
        return resolved.with_timezone(&Utc);
    }
    for step in 1..=MAX_GAP_MINUTES {
        let shifted = naive + chrono::Duration::minutes(step);
        if let Some(resolved) = tz.from_local_datetime(&shifted).earliest() {
            return resolved.with_timezone(&Utc);
        }
    }
    Utc.from_utc_datetime(&naive)
}
