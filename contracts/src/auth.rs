//! # Accounts and Caller Authorization
//!
//! Identity primitives shared by every contract. Usernames and vendor
//! identifiers are opaque 64-bit handles assigned off-ledger; accounts are
//! opaque ledger-level identities (in practice a bech32 or hex-encoded
//! address, but nothing here depends on the encoding).
//!
//! ## The Capability Model
//!
//! The host runtime — the ledger that sequences and finalizes operations —
//! is the only party that can authenticate a caller (signature checks,
//! session validation, whatever the deployment uses). It expresses the
//! result of that check as an [`AuthenticatedCaller`] value and passes it
//! into every contract operation. The contracts then perform *authorization*
//! only: comparing the proven caller against the ownership stored in a
//! record. Nothing in this crate can mint a caller out of thin air except
//! via [`AuthenticatedCaller::attest`], which is the runtime's job to gate.

use serde::{Deserialize, Serialize};

/// Opaque 64-bit username handle. Usernames are allocated off-ledger
/// (typically a hash or registry index) and key every record in the system.
pub type Username = u64;

/// Opaque 64-bit vendor handle carried inside fragment submissions.
///
/// Distinct from the vendor's ledger *account*: the handle identifies the
/// vendor in payload metadata, the account identifies it for authorization.
pub type VendorId = u64;

/// An opaque ledger account identity.
///
/// Ordered and hashable so it can key per-account storage namespaces.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Wraps a raw account string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw account string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AccountId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Proof that the host runtime authenticated a specific account.
///
/// Contract operations accept this by reference and compare it against
/// stored ownership via [`authorizes`](Self::authorizes). The inner account
/// is deliberately private: holding an `AuthenticatedCaller` *is* the
/// capability, and the only constructor is [`attest`](Self::attest), which
/// must be called only after the runtime's authentication check succeeded.
#[derive(Debug, Clone)]
pub struct AuthenticatedCaller {
    account: AccountId,
}

impl AuthenticatedCaller {
    /// Attests that `account` passed the runtime's authentication check.
    ///
    /// Runtime-boundary constructor. Calling this for an account that was
    /// not actually authenticated defeats every authorization rule in the
    /// contracts, so production code must route all construction through
    /// the ledger's ingress path.
    pub fn attest(account: AccountId) -> Self {
        Self { account }
    }

    /// The account this capability proves.
    pub fn account(&self) -> &AccountId {
        &self.account
    }

    /// Whether this caller is authorized to act as `owner`.
    pub fn authorizes(&self, owner: &AccountId) -> bool {
        &self.account == owner
    }
}
