//! # Tessera Onboarding Contracts
//!
//! Ledger-side logic for the Tessera identity-onboarding network. A user's
//! private key never exists in one place: it is split into encrypted
//! fragments custodied by independent oracle nodes ("orks"), with a vendor
//! sponsoring the user through onboarding. These contracts implement the
//! authority rules that make that custody trustworthy:
//!
//! - **Ork Registry** — which oracle-node account is assigned to serve a
//!   given username, with owner-gated reassignment.
//! - **User Registry** — the onboarding lifecycle of each username, from
//!   pending-with-expiry through vendor confirmation.
//! - **Fragment Store** — per-oracle custody of encrypted key-fragment
//!   payloads, writable only by the currently assigned oracle account.
//!
//! ## Design Principles
//!
//! 1. Authorization is explicit: every operation takes an
//!    [`auth::AuthenticatedCaller`] produced by the host runtime. The
//!    contracts never authenticate anyone — they only compare the proven
//!    caller against stored ownership.
//! 2. State transitions are check-then-write: every precondition is
//!    evaluated before the first mutation, so a rejected operation leaves
//!    all records untouched.
//! 3. Payloads are opaque. Public keys, URLs, fragments, and password
//!    hashes are carried as strings and never inspected.
//! 4. Every persisted type is serializable (serde) for wire transport and
//!    durable storage.

pub mod auth;
pub mod error;
pub mod fragment_store;
pub mod ork_registry;
pub mod store;
pub mod user_registry;

pub use auth::{AccountId, AuthenticatedCaller, Username, VendorId};
pub use error::{OnboardError, RecordKind};
pub use fragment_store::{
    FragmentOutcome, FragmentPayload, FragmentReceipt, FragmentRecord, FragmentStore,
};
pub use ork_registry::{OrkRecord, OrkRegistry};
pub use store::{MemoryTable, Table};
pub use user_registry::{UserRecord, UserRegistry};
