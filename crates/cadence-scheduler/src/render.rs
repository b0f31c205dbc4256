// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Default plain-text reminder renderer.

use cadence_core::traits::render::{MessageRenderer, RenderContext};
use cadence_core::types::{AssignmentModule, TemplateSlug};

const DATE_FORMAT: &str = "%a %d %b, %H:%M";

/// Renders short SMS/WhatsApp-friendly reminders.
///
/// `due` and `overdue` read the same assignment fields and differ only in tone.
#[derive(Debug, Clone, Default)]
pub struct PlainTextRenderer;

impl PlainTextRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl MessageRenderer for PlainTextRenderer {
    fn render(&self, ctx: &RenderContext<'_>) -> String {
        let assignment = ctx.assignment;
        let subject = match assignment.module {
            AssignmentModule::Appointment => format!("your appointment \"{}\"", assignment.title),
            _ => format!("\"{}\"", assignment.title),
        };
        let when = assignment
            .due_at
            .map(|due| due.with_timezone(&ctx.timezone).format(DATE_FORMAT).to_string());

        match (ctx.template_slug, when) {
            (TemplateSlug::Due, Some(when)) => {
                format!("Reminder: {subject} is due on {when}.")
            }
            (TemplateSlug::Due, None) => format!("Reminder: {subject} is coming up soon."),
            (TemplateSlug::Overdue, Some(when)) => format!(
                "Action needed: {subject} was due on {when} and is now overdue. Please take care of it as soon as possible."
            ),
            (TemplateSlug::Overdue, None) => format!(
                "Action needed: {subject} is overdue. Please take care of it as soon as possible."
            ),
        }
    }
}
