//! # Protocol Configuration & Constants
//!
//! Every tunable the runtime and node agree on lives here. Deployments
//! override ports and directories on the command line; the rest are
//! protocol-level values that peers must share.

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// Protocol generation string, reported by `/status` and the CLI.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Operational Defaults
// ---------------------------------------------------------------------------

/// Default port for the REST API.
pub const DEFAULT_API_PORT: u16 = 9630;

/// Default port for the Prometheus metrics endpoint.
pub const DEFAULT_METRICS_PORT: u16 = 9631;

// ---------------------------------------------------------------------------
// Onboarding Parameters
// ---------------------------------------------------------------------------

/// Suggested pending-registration window, in seconds (24 hours).
///
/// Vendors choose their own expiry when initializing a user; this is the
/// value client tooling offers by default. A pending user whose window has
/// lapsed is reported as expired on the read side but keeps its record —
/// reclaiming a lapsed username is a vendor-side policy, not a ledger rule.
pub const DEFAULT_PENDING_TTL_SECS: u64 = 86_400;

/// Upper bound on each opaque payload field (public keys, URLs, encrypted
/// fragments, password hashes), in bytes.
///
/// The contracts never look inside these strings, so the size cap is the
/// runtime's only defense against oversized submissions. 8 KiB comfortably
/// fits an encrypted Ed25519 fragment with armor and headroom.
pub const MAX_OPAQUE_FIELD_BYTES: usize = 8 * 1024;
