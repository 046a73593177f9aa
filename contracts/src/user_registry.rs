//! # User Registry
//!
//! The onboarding lifecycle of each username. A vendor initializes a user
//! as *pending* with an expiry timestamp; fragments may then be posted by
//! the assigned oracle node; the vendor eventually *confirms* the user,
//! which is a one-way transition.
//!
//! The two phases share a single field: `timeout == 0` means confirmed,
//! anything else is a pending expiry. Because 0 is the confirmed sentinel,
//! initialization rejects a zero timeout outright — the only path to 0 is
//! an explicit [`confirm`](UserRegistry::confirm).

use serde::{Deserialize, Serialize};

use crate::auth::{AccountId, AuthenticatedCaller, Username};
use crate::error::{OnboardError, RecordKind};
use crate::store::{MemoryTable, Table};

/// The onboarding state of one username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Unix expiry timestamp of a pending registration; 0 once confirmed.
    pub timeout: u64,
    /// The vendor account that first initialized this user.
    pub onboard_vendor: AccountId,
    /// Entries appended on each first fragment post for this user.
    ///
    /// Historical wire behavior: the value appended is the *username*, once
    /// per oracle namespace that stores a fragment, so the list length says
    /// how many oracle nodes hold a fragment while every element repeats
    /// the username. Preserved as-is for compatibility with deployed
    /// readers.
    pub orks: Vec<Username>,
}

impl UserRecord {
    /// Whether the user has been confirmed by a vendor.
    pub fn is_confirmed(&self) -> bool {
        self.timeout == 0
    }

    /// Whether the registration is still pending confirmation.
    pub fn is_pending(&self) -> bool {
        !self.is_confirmed()
    }

    /// Whether a pending registration's expiry has passed at `now`.
    ///
    /// Always false for confirmed users. The contracts never act on
    /// expiry; this is a read-side helper for runtimes and vendors that
    /// reclaim lapsed registrations.
    pub fn is_expired(&self, now: u64) -> bool {
        self.is_pending() && self.timeout < now
    }
}

/// Username-keyed registry of onboarding lifecycle records.
#[derive(Debug, Default)]
pub struct UserRegistry<T: Table<UserRecord>> {
    records: T,
}

impl UserRegistry<MemoryTable<UserRecord>> {
    /// Creates an empty in-memory registry.
    pub fn new() -> Self {
        Self {
            records: MemoryTable::new(),
        }
    }
}

impl<T: Table<UserRecord>> UserRegistry<T> {
    /// Wraps an existing table, typically hydrated from durable storage.
    pub fn with_table(records: T) -> Self {
        Self { records }
    }

    /// Initializes (or re-initializes) a pending registration for
    /// `username`, sponsored by the calling vendor.
    ///
    /// On first initialization the record is created with the caller as
    /// `onboard_vendor` and an empty fragment list. Re-initializing an
    /// existing record refreshes `timeout` only — the original vendor and
    /// the fragment list are untouched, and no ownership check is made
    /// against the previous vendor.
    ///
    /// # Errors
    ///
    /// Returns [`OnboardError::InvalidArgument`] when `timeout` is 0,
    /// which is reserved as the confirmed sentinel.
    pub fn initialize(
        &mut self,
        caller: &AuthenticatedCaller,
        username: Username,
        timeout: u64,
    ) -> Result<UserRecord, OnboardError> {
        if timeout == 0 {
            return Err(OnboardError::InvalidArgument {
                reason: "timeout must be nonzero; 0 is reserved for confirmed users".into(),
            });
        }

        let record = match self.records.find(username) {
            None => {
                let record = UserRecord {
                    timeout,
                    onboard_vendor: caller.account().clone(),
                    orks: Vec::new(),
                };
                self.records.insert(username, record.clone());
                tracing::debug!(username, vendor = %record.onboard_vendor, timeout, "user initialized");
                record
            }
            Some(mut record) => {
                record.timeout = timeout;
                self.records.update(username, record.clone());
                tracing::debug!(username, timeout, "user registration refreshed");
                record
            }
        };

        Ok(record)
    }

    /// Confirms a pending registration, clearing its expiry.
    ///
    /// Any authenticated vendor-class caller may confirm any user; the
    /// operation does not check the caller against `onboard_vendor`. The
    /// transition is one-way — there is no way back to pending.
    ///
    /// # Errors
    ///
    /// Returns [`OnboardError::NotFound`] if the username was never
    /// initialized, and [`OnboardError::InvalidState`] if the user is
    /// already confirmed.
    pub fn confirm(
        &mut self,
        caller: &AuthenticatedCaller,
        username: Username,
    ) -> Result<UserRecord, OnboardError> {
        let mut record = self.records.find(username).ok_or(OnboardError::NotFound {
            kind: RecordKind::User,
            username,
        })?;

        if record.is_confirmed() {
            return Err(OnboardError::InvalidState {
                reason: format!("user {username} has already been confirmed"),
            });
        }

        record.timeout = 0;
        self.records.update(username, record.clone());
        tracing::debug!(username, confirmed_by = %caller.account(), "user confirmed");

        Ok(record)
    }

    /// Replaces a record the fragment store has already validated.
    ///
    /// Used only for the first-post list append, which runs after all
    /// `post_fragment` preconditions have passed.
    pub(crate) fn replace(&mut self, username: Username, record: UserRecord) {
        self.records.update(username, record);
    }

    /// The record for `username`, if any.
    pub fn get(&self, username: Username) -> Option<UserRecord> {
        self.records.find(username)
    }

    /// All records in ascending username order.
    pub fn iter(&self) -> Box<dyn Iterator<Item = (Username, UserRecord)> + '_> {
        self.records.iter()
    }

    /// Number of registered users.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no user is registered.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
