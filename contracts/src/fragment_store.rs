//! # Fragment Store
//!
//! Per-oracle custody of encrypted key fragments. Every oracle-node
//! account owns a private namespace keyed by username; inside it there is
//! exactly one fragment record per username, and repeated posts overwrite
//! the payload in place.
//!
//! Posting is the most heavily guarded operation in the system: the user
//! must exist, the username must have a current oracle assignment, and the
//! caller must be that assigned account. Only then does the store upsert —
//! and on the *first* post for a namespace it also appends to the user's
//! serviced-by list, so the user record and the fragment record move as
//! one atomic unit.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::auth::{AccountId, AuthenticatedCaller, Username, VendorId};
use crate::error::{OnboardError, RecordKind};
use crate::ork_registry::{OrkRecord, OrkRegistry};
use crate::store::{MemoryTable, Table};
use crate::user_registry::{UserRecord, UserRegistry};

/// One encrypted key fragment held by an oracle node for a username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentRecord {
    /// Vendor handle recorded with the first submission.
    pub vendor: VendorId,
    /// Public half of the fragment keypair. Opaque to the contracts.
    pub public_key: String,
    /// The encrypted private-key fragment. Opaque to the contracts.
    pub private_key_frag: String,
    /// Hash of the user's passphrase material. Opaque to the contracts.
    pub pass_hash: String,
}

/// The payload of a fragment submission.
///
/// Distinct from [`FragmentRecord`] because an overwrite replaces only the
/// three opaque payload strings — the `vendor` handle recorded at creation
/// survives later posts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentPayload {
    /// Vendor handle associated with this submission.
    pub vendor: VendorId,
    /// Public half of the fragment keypair.
    pub public_key: String,
    /// The encrypted private-key fragment.
    pub private_key_frag: String,
    /// Hash of the user's passphrase material.
    pub pass_hash: String,
}

/// Whether a post created a fragment or overwrote an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FragmentOutcome {
    /// First post for this (oracle namespace, username) pair. The user's
    /// serviced-by list grew by one entry.
    Created,
    /// A fragment already existed; its payload fields were replaced.
    Overwritten,
}

impl std::fmt::Display for FragmentOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FragmentOutcome::Created => write!(f, "created"),
            FragmentOutcome::Overwritten => write!(f, "overwritten"),
        }
    }
}

/// Everything a runtime needs to persist after a successful post.
#[derive(Debug, Clone)]
pub struct FragmentReceipt {
    /// Created or overwritten.
    pub outcome: FragmentOutcome,
    /// The oracle-node account whose namespace was written.
    pub scope: AccountId,
    /// The fragment record as now stored.
    pub fragment: FragmentRecord,
    /// The user record as now stored (list appended on first post).
    pub user: UserRecord,
}

/// Oracle-scoped store of encrypted key fragments.
///
/// Namespaces are created lazily on first post; an oracle that has never
/// stored a fragment owns no namespace.
#[derive(Debug, Default)]
pub struct FragmentStore<T: Table<FragmentRecord>> {
    scopes: BTreeMap<AccountId, T>,
}

impl FragmentStore<MemoryTable<FragmentRecord>> {
    /// Creates an empty in-memory store.
    pub fn new() -> Self {
        Self {
            scopes: BTreeMap::new(),
        }
    }
}

impl<T: Table<FragmentRecord> + Default> FragmentStore<T> {
    /// Wraps existing namespaces, typically hydrated from durable storage.
    pub fn with_scopes(scopes: BTreeMap<AccountId, T>) -> Self {
        Self { scopes }
    }

    /// Posts (or re-posts) a key fragment for `username` into the
    /// namespace of its currently assigned oracle node.
    ///
    /// Preconditions, checked in order before any write:
    ///
    /// 1. the user record exists;
    /// 2. an oracle assignment exists for `username`;
    /// 3. the caller is the assigned oracle account.
    ///
    /// The first successful post creates the fragment and appends to the
    /// user's serviced-by list as one unit; later posts overwrite the
    /// payload strings in place and leave the user record alone.
    ///
    /// `ork_username` travels with the submission for audit purposes; the
    /// assignment lookup is keyed by `username`.
    ///
    /// # Errors
    ///
    /// [`OnboardError::NotFound`] when the user or the assignment is
    /// missing, [`OnboardError::Unauthorized`] when the caller is not the
    /// assigned account.
    pub fn post_fragment<U, O>(
        &mut self,
        caller: &AuthenticatedCaller,
        users: &mut UserRegistry<U>,
        orks: &OrkRegistry<O>,
        ork_username: Username,
        username: Username,
        payload: FragmentPayload,
    ) -> Result<FragmentReceipt, OnboardError>
    where
        U: Table<UserRecord>,
        O: Table<OrkRecord>,
    {
        let mut user = users.get(username).ok_or(OnboardError::NotFound {
            kind: RecordKind::User,
            username,
        })?;

        let ork = orks.get(username).ok_or(OnboardError::NotFound {
            kind: RecordKind::Ork,
            username,
        })?;

        if !caller.authorizes(&ork.account) {
            return Err(OnboardError::Unauthorized {
                account: caller.account().clone(),
                kind: RecordKind::Fragment,
                username,
            });
        }

        let scope = self.scopes.entry(ork.account.clone()).or_default();

        let (outcome, fragment) = match scope.find(username) {
            None => {
                let fragment = FragmentRecord {
                    vendor: payload.vendor,
                    public_key: payload.public_key,
                    private_key_frag: payload.private_key_frag,
                    pass_hash: payload.pass_hash,
                };
                scope.insert(username, fragment.clone());
                user.orks.push(username);
                users.replace(username, user.clone());
                (FragmentOutcome::Created, fragment)
            }
            Some(mut fragment) => {
                fragment.public_key = payload.public_key;
                fragment.private_key_frag = payload.private_key_frag;
                fragment.pass_hash = payload.pass_hash;
                scope.update(username, fragment.clone());
                (FragmentOutcome::Overwritten, fragment)
            }
        };

        tracing::debug!(
            username,
            ork_username,
            scope = %ork.account,
            %outcome,
            "fragment posted"
        );

        Ok(FragmentReceipt {
            outcome,
            scope: ork.account,
            fragment,
            user,
        })
    }

    /// The fragment stored for `username` in `owner`'s namespace, if any.
    pub fn get(&self, owner: &AccountId, username: Username) -> Option<FragmentRecord> {
        self.scopes.get(owner)?.find(username)
    }

    /// All fragments in `owner`'s namespace, in ascending username order.
    pub fn iter_scope(
        &self,
        owner: &AccountId,
    ) -> Box<dyn Iterator<Item = (Username, FragmentRecord)> + '_> {
        match self.scopes.get(owner) {
            Some(table) => table.iter(),
            None => Box::new(std::iter::empty()),
        }
    }

    /// The oracle accounts that own at least one fragment, in order.
    pub fn owners(&self) -> impl Iterator<Item = &AccountId> {
        self.scopes.keys()
    }

    /// Total number of fragments across all namespaces.
    pub fn len(&self) -> usize {
        self.scopes.values().map(|t| t.len()).sum()
    }

    /// Whether no fragment is stored anywhere.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
