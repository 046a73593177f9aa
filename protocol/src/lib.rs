// Copyright (c) 2026 Tessera Labs. MIT License.
// See LICENSE for details.

//! # Tessera Protocol — Runtime Library
//!
//! The host-runtime half of the Tessera onboarding network. The authority
//! rules themselves live in `tessera-contracts`; this crate supplies the
//! environment those contracts assume exists:
//!
//! - **ledger** — the serialized transaction boundary. Operations enter one
//!   at a time, run against an in-memory state image, and are written
//!   through to durable storage before the next operation is admitted.
//!   This is also where authenticated-caller capabilities are minted.
//! - **storage** — sled-backed persistence for ork assignments, user
//!   lifecycle records, and per-oracle fragment namespaces.
//! - **config** — protocol constants and operational defaults.
//!
//! ## Design Philosophy
//!
//! 1. The contracts decide, the runtime carries. No authorization rule is
//!    duplicated here; the runtime only enforces boundary concerns the
//!    contracts deliberately ignore (payload size caps, durability).
//! 2. One writer, whole operations. Every operation commits or rejects as
//!    a unit — a reader can never observe half an operation.
//! 3. Storage failures are loud. A write-through error leaves the durable
//!    image behind the live one, and the documented remedy is a restart,
//!    which rebuilds the live image from the last durable commit.

pub mod config;
pub mod ledger;
pub mod storage;

pub use ledger::{Ledger, LedgerError};
