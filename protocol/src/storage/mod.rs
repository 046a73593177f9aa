//! # Persistent Storage
//!
//! Durable record storage for the onboarding ledger, built on sled. See
//! [`db::OnboardDb`] for the tree layout and atomicity rules.

pub mod db;

pub use db::{DbError, DbResult, OnboardDb};
