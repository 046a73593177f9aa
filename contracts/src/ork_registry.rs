//! # Ork Registry
//!
//! Tracks which oracle-node account is currently assigned to serve each
//! username. The registry is keyed by *username*, not by oracle identity:
//! it answers "who custodies fragments for user N right now", not "which
//! oracle nodes exist".
//!
//! Claiming an unassigned username is unrestricted — any authenticated
//! account may register itself. Once claimed, only the account on file can
//! touch the record, so an assignment can never be stolen by a third
//! party; it can only be refreshed (or re-pointed) by its current owner.

use serde::{Deserialize, Serialize};

use crate::auth::{AccountId, AuthenticatedCaller, Username};
use crate::error::{OnboardError, RecordKind};
use crate::store::{MemoryTable, Table};

/// The oracle-node assignment for one username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrkRecord {
    /// The oracle-node account that owns this assignment.
    pub account: AccountId,
    /// The node's advertised public key. Opaque to the contracts.
    pub public_key: String,
    /// The node's service endpoint. Opaque to the contracts.
    pub url: String,
}

/// Username-keyed registry of oracle-node assignments.
#[derive(Debug, Default)]
pub struct OrkRegistry<T: Table<OrkRecord>> {
    records: T,
}

impl OrkRegistry<MemoryTable<OrkRecord>> {
    /// Creates an empty in-memory registry.
    pub fn new() -> Self {
        Self {
            records: MemoryTable::new(),
        }
    }
}

impl<T: Table<OrkRecord>> OrkRegistry<T> {
    /// Wraps an existing table, typically hydrated from durable storage.
    pub fn with_table(records: T) -> Self {
        Self { records }
    }

    /// Registers the caller as the oracle node for `username`, or updates
    /// an assignment the caller already owns.
    ///
    /// Creation is unrestricted: the first authenticated account to claim
    /// an unassigned username becomes its oracle node. An existing record
    /// can only be overwritten by the account on file.
    ///
    /// # Errors
    ///
    /// Returns [`OnboardError::Unauthorized`] if the username is already
    /// assigned to a different account.
    pub fn register_or_update(
        &mut self,
        caller: &AuthenticatedCaller,
        username: Username,
        public_key: String,
        url: String,
    ) -> Result<OrkRecord, OnboardError> {
        let record = OrkRecord {
            account: caller.account().clone(),
            public_key,
            url,
        };

        match self.records.find(username) {
            None => {
                self.records.insert(username, record.clone());
                tracing::debug!(username, account = %record.account, "ork assignment created");
            }
            Some(existing) => {
                if !caller.authorizes(&existing.account) {
                    return Err(OnboardError::Unauthorized {
                        account: caller.account().clone(),
                        kind: RecordKind::Ork,
                        username,
                    });
                }
                self.records.update(username, record.clone());
                tracing::debug!(username, account = %record.account, "ork assignment updated");
            }
        }

        Ok(record)
    }

    /// The assignment for `username`, if any.
    pub fn get(&self, username: Username) -> Option<OrkRecord> {
        self.records.find(username)
    }

    /// All assignments in ascending username order.
    pub fn iter(&self) -> Box<dyn Iterator<Item = (Username, OrkRecord)> + '_> {
        self.records.iter()
    }

    /// Number of assigned usernames.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no username is assigned.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
