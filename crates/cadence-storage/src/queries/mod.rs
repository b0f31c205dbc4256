// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for each stored entity.

pub mod assignments;
pub mod contacts;
pub mod preferences;
pub mod queue;
