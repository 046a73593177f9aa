//! # Ledger Runtime
//!
//! The serialized transaction boundary around the onboarding contracts.
//! The contracts assume an external runtime that (a) authenticates
//! callers, (b) feeds it one operation at a time against a consistent
//! state snapshot, and (c) makes each accepted operation durable. This
//! module is that runtime for a single-process deployment.
//!
//! ## Execution Model
//!
//! The live state — ork registry, user registry, fragment store — is held
//! in memory behind a single writer lock and hydrated from [`OnboardDb`]
//! at startup. An operation:
//!
//! 1. passes the runtime's boundary checks (payload size caps);
//! 2. takes the writer lock and runs the contract operation, which
//!    validates every precondition before its first write;
//! 3. writes the mutated records through to sled while still holding the
//!    lock, so durable order matches live order.
//!
//! A rejected operation mutates nothing in memory or on disk. A storage
//! failure *after* the in-memory commit is surfaced as
//! [`LedgerError::Storage`]; the durable image is then behind the live
//! one, and the remedy is a restart, which rebuilds the live image from
//! the last durable commit.

use std::collections::BTreeMap;
use std::path::Path;

use parking_lot::Mutex;
use thiserror::Error;

use tessera_contracts::{
    AccountId, AuthenticatedCaller, FragmentOutcome, FragmentPayload, FragmentReceipt,
    FragmentRecord, FragmentStore, MemoryTable, OnboardError, OrkRecord, OrkRegistry, Table,
    UserRecord, UserRegistry, Username,
};

use crate::config;
use crate::storage::db::{DbError, OnboardDb};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced by ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A contract precondition rejected the operation.
    #[error(transparent)]
    Contract(#[from] OnboardError),

    /// Durable storage failed.
    #[error("storage error: {0}")]
    Storage(#[from] DbError),

    /// An opaque payload field exceeds the runtime's size cap.
    #[error("payload too large: {field} is {len} bytes, limit {limit}")]
    PayloadTooLarge {
        /// Which field was oversized.
        field: &'static str,
        /// Its submitted length in bytes.
        len: usize,
        /// The configured limit.
        limit: usize,
    },
}

fn check_opaque(field: &'static str, value: &str) -> Result<(), LedgerError> {
    if value.len() > config::MAX_OPAQUE_FIELD_BYTES {
        return Err(LedgerError::PayloadTooLarge {
            field,
            len: value.len(),
            limit: config::MAX_OPAQUE_FIELD_BYTES,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Live onboarding state, hydrated from durable storage.
struct OnboardState {
    orks: OrkRegistry<MemoryTable<OrkRecord>>,
    users: UserRegistry<MemoryTable<UserRecord>>,
    fragments: FragmentStore<MemoryTable<FragmentRecord>>,
}

/// Single-process onboarding ledger: serialized contract execution with
/// write-through sled persistence.
pub struct Ledger {
    state: Mutex<OnboardState>,
    db: OnboardDb,
}

impl Ledger {
    /// Opens (or creates) a ledger rooted at `path` and hydrates the live
    /// state from it.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LedgerError> {
        let db = OnboardDb::open(path)?;
        let state = Self::hydrate(&db)?;
        Ok(Self {
            state: Mutex::new(state),
            db,
        })
    }

    /// Opens a ledger over a temporary database. Used by tests.
    pub fn open_temporary() -> Result<Self, LedgerError> {
        let db = OnboardDb::open_temporary()?;
        let state = Self::hydrate(&db)?;
        Ok(Self {
            state: Mutex::new(state),
            db,
        })
    }

    fn hydrate(db: &OnboardDb) -> Result<OnboardState, LedgerError> {
        let mut orks = MemoryTable::new();
        for (username, record) in db.load_orks()? {
            orks.insert(username, record);
        }

        let mut users = MemoryTable::new();
        for (username, record) in db.load_users()? {
            users.insert(username, record);
        }

        let mut scopes: BTreeMap<AccountId, MemoryTable<FragmentRecord>> = BTreeMap::new();
        for (owner, username, record) in db.load_fragments()? {
            scopes.entry(owner).or_default().insert(username, record);
        }

        let state = OnboardState {
            orks: OrkRegistry::with_table(orks),
            users: UserRegistry::with_table(users),
            fragments: FragmentStore::with_scopes(scopes),
        };

        tracing::info!(
            orks = state.orks.len(),
            users = state.users.len(),
            fragments = state.fragments.len(),
            "ledger state hydrated"
        );
        Ok(state)
    }

    /// Mints the caller capability for an account the host has
    /// authenticated.
    ///
    /// This is the trust boundary: whatever fronts this ledger (a chain
    /// runtime validating transaction signatures, an API gateway checking
    /// request auth) must have proven control of `account` before calling
    /// this. The ledger itself performs authorization only.
    pub fn authenticate(&self, account: impl Into<AccountId>) -> AuthenticatedCaller {
        AuthenticatedCaller::attest(account.into())
    }

    // -- Operations ---------------------------------------------------------

    /// Registers or updates the oracle-node assignment for `username`.
    pub fn register_ork(
        &self,
        caller: &AuthenticatedCaller,
        username: Username,
        public_key: String,
        url: String,
    ) -> Result<OrkRecord, LedgerError> {
        check_opaque("public_key", &public_key)?;
        check_opaque("url", &url)?;

        let mut state = self.state.lock();
        let record = state
            .orks
            .register_or_update(caller, username, public_key, url)?;
        self.db.put_ork(username, &record)?;

        tracing::info!(username, account = %record.account, "ork assignment committed");
        Ok(record)
    }

    /// Initializes (or re-initializes) a pending user registration.
    pub fn initialize_user(
        &self,
        caller: &AuthenticatedCaller,
        username: Username,
        timeout: u64,
    ) -> Result<UserRecord, LedgerError> {
        let mut state = self.state.lock();
        let record = state.users.initialize(caller, username, timeout)?;
        self.db.put_user(username, &record)?;

        tracing::info!(username, timeout, vendor = %caller.account(), "user initialization committed");
        Ok(record)
    }

    /// Confirms a pending user, clearing its expiry.
    pub fn confirm_user(
        &self,
        caller: &AuthenticatedCaller,
        username: Username,
    ) -> Result<UserRecord, LedgerError> {
        let mut state = self.state.lock();
        let record = state.users.confirm(caller, username)?;
        self.db.put_user(username, &record)?;

        tracing::info!(username, confirmed_by = %caller.account(), "user confirmation committed");
        Ok(record)
    }

    /// Posts a key fragment into the assigned oracle's namespace.
    ///
    /// On a first post the fragment and the appended user record are
    /// committed through one multi-tree storage transaction.
    pub fn post_fragment(
        &self,
        caller: &AuthenticatedCaller,
        ork_username: Username,
        username: Username,
        payload: FragmentPayload,
    ) -> Result<FragmentReceipt, LedgerError> {
        check_opaque("public_key", &payload.public_key)?;
        check_opaque("private_key_frag", &payload.private_key_frag)?;
        check_opaque("pass_hash", &payload.pass_hash)?;

        let mut guard = self.state.lock();
        let OnboardState {
            orks,
            users,
            fragments,
        } = &mut *guard;

        let receipt =
            fragments.post_fragment(caller, users, orks, ork_username, username, payload)?;

        match receipt.outcome {
            FragmentOutcome::Created => {
                self.db
                    .commit_first_post(&receipt.scope, username, &receipt.fragment, &receipt.user)?
            }
            FragmentOutcome::Overwritten => {
                self.db
                    .put_fragment(&receipt.scope, username, &receipt.fragment)?
            }
        }

        tracing::info!(
            username,
            scope = %receipt.scope,
            outcome = %receipt.outcome,
            "fragment post committed"
        );
        Ok(receipt)
    }

    // -- Read surface -------------------------------------------------------

    /// The oracle assignment for `username`, if any.
    pub fn ork(&self, username: Username) -> Option<OrkRecord> {
        self.state.lock().orks.get(username)
    }

    /// All oracle assignments in ascending username order.
    pub fn orks(&self) -> Vec<(Username, OrkRecord)> {
        self.state.lock().orks.iter().collect()
    }

    /// The user record for `username`, if any.
    pub fn user(&self, username: Username) -> Option<UserRecord> {
        self.state.lock().users.get(username)
    }

    /// All user records in ascending username order.
    pub fn users(&self) -> Vec<(Username, UserRecord)> {
        self.state.lock().users.iter().collect()
    }

    /// The fragment held by `owner` for `username`, if any.
    pub fn fragment(&self, owner: &AccountId, username: Username) -> Option<FragmentRecord> {
        self.state.lock().fragments.get(owner, username)
    }

    /// All fragments in `owner`'s namespace, in ascending username order.
    pub fn fragments_of(&self, owner: &AccountId) -> Vec<(Username, FragmentRecord)> {
        self.state.lock().fragments.iter_scope(owner).collect()
    }

    /// Number of assigned usernames.
    pub fn ork_count(&self) -> usize {
        self.state.lock().orks.len()
    }

    /// Number of registered users.
    pub fn user_count(&self) -> usize {
        self.state.lock().users.len()
    }

    /// Number of users still awaiting confirmation.
    pub fn pending_user_count(&self) -> usize {
        self.state
            .lock()
            .users
            .iter()
            .filter(|(_, record)| record.is_pending())
            .count()
    }

    /// Total number of stored fragments across all namespaces.
    pub fn fragment_count(&self) -> usize {
        self.state.lock().fragments.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(tag: &str) -> FragmentPayload {
        FragmentPayload {
            vendor: 7,
            public_key: format!("pub-{tag}"),
            private_key_frag: format!("enc-{tag}"),
            pass_hash: format!("hash-{tag}"),
        }
    }

    #[test]
    fn operations_write_through_to_storage() {
        let ledger = Ledger::open_temporary().unwrap();
        let vendor = ledger.authenticate("vendor-1");
        let ork = ledger.authenticate("ork-alpha");

        ledger.initialize_user(&vendor, 100, 99_999).unwrap();
        ledger
            .register_ork(&ork, 100, "pk".into(), "url".into())
            .unwrap();
        ledger.post_fragment(&ork, 100, 100, payload("a")).unwrap();

        assert_eq!(ledger.db.get_user(100).unwrap().unwrap().orks, vec![100]);
        assert!(ledger.db.get_ork(100).unwrap().is_some());
        assert!(ledger
            .db
            .get_fragment(&AccountId::from("ork-alpha"), 100)
            .unwrap()
            .is_some());
    }

    #[test]
    fn contract_rejections_pass_through() {
        let ledger = Ledger::open_temporary().unwrap();
        let vendor = ledger.authenticate("vendor-1");

        let err = ledger.initialize_user(&vendor, 100, 0).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Contract(OnboardError::InvalidArgument { .. })
        ));

        let err = ledger.confirm_user(&vendor, 100).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Contract(OnboardError::NotFound { .. })
        ));
    }

    #[test]
    fn oversized_payloads_are_rejected_at_the_boundary() {
        let ledger = Ledger::open_temporary().unwrap();
        let ork = ledger.authenticate("ork-alpha");

        let oversized = "x".repeat(config::MAX_OPAQUE_FIELD_BYTES + 1);
        let err = ledger
            .register_ork(&ork, 100, oversized, "url".into())
            .unwrap_err();
        assert!(matches!(err, LedgerError::PayloadTooLarge { .. }));
        assert!(ledger.ork(100).is_none());
    }

    #[test]
    fn pending_count_tracks_confirmations() {
        let ledger = Ledger::open_temporary().unwrap();
        let vendor = ledger.authenticate("vendor-1");

        ledger.initialize_user(&vendor, 1, 10).unwrap();
        ledger.initialize_user(&vendor, 2, 10).unwrap();
        assert_eq!(ledger.pending_user_count(), 2);

        ledger.confirm_user(&vendor, 1).unwrap();
        assert_eq!(ledger.pending_user_count(), 1);
        assert_eq!(ledger.user_count(), 2);
    }
}
