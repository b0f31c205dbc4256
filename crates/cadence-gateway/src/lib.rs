// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP surface for the Cadence reminder service.
//!
//! An external scheduler triggers the two jobs over HTTP:
//! `POST /v1/jobs/build` and `POST /v1/jobs/dispatch`, both guarded by the
//! `x-cron-secret` header. `GET /health` is public.

pub mod auth;
pub mod handlers;
pub mod server;

pub use auth::{JobAuth, SECRET_HEADER};
pub use server::{Clock, GatewayState, ServerConfig, router, start_server};
