// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message rendering.

use chrono_tz::Tz;

use crate::types::{Assignment, Payload, TemplateSlug};

/// Everything a renderer may read. The assignment is the fresh copy
/// fetched at dispatch time, not the snapshot taken at enqueue time.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub template_slug: TemplateSlug,
    pub assignment: &'a Assignment,
    pub payload: &'a Payload,
    pub timezone: Tz,
}

pub trait MessageRenderer: Send + Sync {
    fn render(&self, ctx: &RenderContext<'_>) -> String;
}
