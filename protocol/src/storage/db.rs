//! # OnboardDb — Persistent Record Storage
//!
//! The durable layer for the onboarding ledger, built on sled's embedded
//! key-value store. All on-disk data flows through this module.
//!
//! ## Tree Layout
//!
//! sled organizes data into named "trees", each an independent B+ tree
//! with its own keyspace:
//!
//! | Tree        | Key                                   | Value                      |
//! |-------------|---------------------------------------|----------------------------|
//! | `orks`      | `username` (8B BE)                    | `bincode(OrkRecord)`       |
//! | `users`     | `username` (8B BE)                    | `bincode(UserRecord)`      |
//! | `fragments` | `owner_len (2B BE) ++ owner ++ username (8B BE)` | `bincode(FragmentRecord)` |
//!
//! Usernames are stored big-endian so sled's lexicographic ordering matches
//! numeric ordering. Fragment keys prefix the owning oracle account
//! (length-delimited) so each oracle's namespace occupies a contiguous key
//! range and usernames sort numerically within it.
//!
//! ## Atomicity
//!
//! The first fragment post for a namespace mutates two records: the new
//! fragment and the user's serviced-by list. [`OnboardDb::commit_first_post`]
//! applies both through a single multi-tree sled transaction, so a crash
//! can never leave a fragment visible without its list entry or vice versa.

use sled::transaction::TransactionError;
use sled::{Db, Transactional, Tree};
use std::path::Path;

use tessera_contracts::{AccountId, FragmentRecord, OrkRecord, UserRecord, Username};

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("transaction error: {0}")]
    Transaction(String),
}

pub type DbResult<T> = Result<T, DbError>;

// ---------------------------------------------------------------------------
// Key Encoding
// ---------------------------------------------------------------------------

/// Composite key for a fragment: length-prefixed owner account, then the
/// big-endian username.
fn fragment_key(owner: &AccountId, username: Username) -> Vec<u8> {
    let owner_bytes = owner.as_str().as_bytes();
    let mut key = Vec::with_capacity(2 + owner_bytes.len() + 8);
    key.extend_from_slice(&(owner_bytes.len() as u16).to_be_bytes());
    key.extend_from_slice(owner_bytes);
    key.extend_from_slice(&username.to_be_bytes());
    key
}

/// Inverse of [`fragment_key`].
fn decode_fragment_key(key: &[u8]) -> DbResult<(AccountId, Username)> {
    if key.len() < 10 {
        return Err(DbError::Serialization("fragment key too short".into()));
    }
    let owner_len = u16::from_be_bytes([key[0], key[1]]) as usize;
    if key.len() != 2 + owner_len + 8 {
        return Err(DbError::Serialization("fragment key length mismatch".into()));
    }
    let owner = std::str::from_utf8(&key[2..2 + owner_len])
        .map_err(|_| DbError::Serialization("fragment key owner is not utf-8".into()))?;
    let username_bytes: [u8; 8] = key[2 + owner_len..]
        .try_into()
        .map_err(|_| DbError::Serialization("invalid username bytes in fragment key".into()))?;
    Ok((AccountId::from(owner), u64::from_be_bytes(username_bytes)))
}

fn decode_username_key(key: &[u8]) -> DbResult<Username> {
    let bytes: [u8; 8] = key
        .try_into()
        .map_err(|_| DbError::Serialization("invalid username key".into()))?;
    Ok(u64::from_be_bytes(bytes))
}

// ---------------------------------------------------------------------------
// OnboardDb
// ---------------------------------------------------------------------------

/// Persistent storage engine for the onboarding ledger.
///
/// Wraps a sled `Db` and exposes typed accessors for the three record
/// kinds. All serialization uses bincode.
///
/// # Thread Safety
///
/// sled trees support lock-free concurrent reads and serialized writes, so
/// `OnboardDb` can be shared via `Clone` (handles are reference-counted)
/// without external synchronization. The ledger layer nonetheless funnels
/// writes through a single writer to keep record-level ordering exact.
#[derive(Debug, Clone)]
pub struct OnboardDb {
    /// The underlying sled database handle.
    db: Db,
    /// Ork assignments keyed by big-endian username.
    orks: Tree,
    /// User lifecycle records keyed by big-endian username.
    users: Tree,
    /// Fragment records keyed by (owner account, username).
    fragments: Tree,
}

impl OnboardDb {
    /// Opens or creates a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Creates a temporary database that lives in memory and is discarded
    /// on drop. Ideal for tests — no filesystem side effects.
    pub fn open_temporary() -> DbResult<Self> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> DbResult<Self> {
        let orks = db.open_tree("orks")?;
        let users = db.open_tree("users")?;
        let fragments = db.open_tree("fragments")?;
        Ok(Self {
            db,
            orks,
            users,
            fragments,
        })
    }

    // -- Ork assignments ----------------------------------------------------

    /// Persists an ork assignment.
    pub fn put_ork(&self, username: Username, record: &OrkRecord) -> DbResult<()> {
        let bytes =
            bincode::serialize(record).map_err(|e| DbError::Serialization(e.to_string()))?;
        self.orks.insert(&username.to_be_bytes()[..], bytes)?;
        self.db.flush()?;
        Ok(())
    }

    /// Retrieves the ork assignment for a username.
    pub fn get_ork(&self, username: Username) -> DbResult<Option<OrkRecord>> {
        match self.orks.get(username.to_be_bytes())? {
            Some(bytes) => {
                let record = bincode::deserialize(&bytes)
                    .map_err(|e| DbError::Serialization(e.to_string()))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Loads every ork assignment in ascending username order.
    pub fn load_orks(&self) -> DbResult<Vec<(Username, OrkRecord)>> {
        let mut records = Vec::with_capacity(self.orks.len());
        for entry in self.orks.iter() {
            let (key, value) = entry?;
            let username = decode_username_key(&key)?;
            let record = bincode::deserialize(&value)
                .map_err(|e| DbError::Serialization(e.to_string()))?;
            records.push((username, record));
        }
        Ok(records)
    }

    // -- User lifecycle records ---------------------------------------------

    /// Persists a user record.
    pub fn put_user(&self, username: Username, record: &UserRecord) -> DbResult<()> {
        let bytes =
            bincode::serialize(record).map_err(|e| DbError::Serialization(e.to_string()))?;
        self.users.insert(&username.to_be_bytes()[..], bytes)?;
        self.db.flush()?;
        Ok(())
    }

    /// Retrieves the user record for a username.
    pub fn get_user(&self, username: Username) -> DbResult<Option<UserRecord>> {
        match self.users.get(username.to_be_bytes())? {
            Some(bytes) => {
                let record = bincode::deserialize(&bytes)
                    .map_err(|e| DbError::Serialization(e.to_string()))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Loads every user record in ascending username order.
    pub fn load_users(&self) -> DbResult<Vec<(Username, UserRecord)>> {
        let mut records = Vec::with_capacity(self.users.len());
        for entry in self.users.iter() {
            let (key, value) = entry?;
            let username = decode_username_key(&key)?;
            let record = bincode::deserialize(&value)
                .map_err(|e| DbError::Serialization(e.to_string()))?;
            records.push((username, record));
        }
        Ok(records)
    }

    // -- Fragment records ---------------------------------------------------

    /// Persists a fragment overwrite in an oracle's namespace.
    pub fn put_fragment(
        &self,
        owner: &AccountId,
        username: Username,
        record: &FragmentRecord,
    ) -> DbResult<()> {
        let bytes =
            bincode::serialize(record).map_err(|e| DbError::Serialization(e.to_string()))?;
        self.fragments
            .insert(fragment_key(owner, username), bytes)?;
        self.db.flush()?;
        Ok(())
    }

    /// Retrieves a fragment from an oracle's namespace.
    pub fn get_fragment(
        &self,
        owner: &AccountId,
        username: Username,
    ) -> DbResult<Option<FragmentRecord>> {
        match self.fragments.get(fragment_key(owner, username))? {
            Some(bytes) => {
                let record = bincode::deserialize(&bytes)
                    .map_err(|e| DbError::Serialization(e.to_string()))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Loads every fragment with its owning namespace.
    pub fn load_fragments(&self) -> DbResult<Vec<(AccountId, Username, FragmentRecord)>> {
        let mut records = Vec::with_capacity(self.fragments.len());
        for entry in self.fragments.iter() {
            let (key, value) = entry?;
            let (owner, username) = decode_fragment_key(&key)?;
            let record = bincode::deserialize(&value)
                .map_err(|e| DbError::Serialization(e.to_string()))?;
            records.push((owner, username, record));
        }
        Ok(records)
    }

    /// Persists a first fragment post: the new fragment and the appended
    /// user record, committed as one multi-tree transaction.
    pub fn commit_first_post(
        &self,
        owner: &AccountId,
        username: Username,
        fragment: &FragmentRecord,
        user: &UserRecord,
    ) -> DbResult<()> {
        let user_key = username.to_be_bytes();
        let frag_key = fragment_key(owner, username);
        let user_bytes =
            bincode::serialize(user).map_err(|e| DbError::Serialization(e.to_string()))?;
        let frag_bytes =
            bincode::serialize(fragment).map_err(|e| DbError::Serialization(e.to_string()))?;

        (&self.users, &self.fragments)
            .transaction(
                |(users, fragments)| -> sled::transaction::ConflictableTransactionResult<(), ()> {
                    users.insert(&user_key[..], user_bytes.as_slice())?;
                    fragments.insert(frag_key.as_slice(), frag_bytes.as_slice())?;
                    Ok(())
                },
            )
            .map_err(|e| match e {
                TransactionError::Abort(()) => {
                    DbError::Transaction("first-post transaction aborted".into())
                }
                TransactionError::Storage(e) => DbError::Sled(e),
            })?;

        self.db.flush()?;
        Ok(())
    }

    // -- Utility ------------------------------------------------------------

    /// Blocks until all pending writes are durable.
    pub fn flush(&self) -> DbResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ork(account: &str) -> OrkRecord {
        OrkRecord {
            account: AccountId::from(account),
            public_key: "pk".into(),
            url: "https://ork".into(),
        }
    }

    fn user(timeout: u64, orks: Vec<Username>) -> UserRecord {
        UserRecord {
            timeout,
            onboard_vendor: AccountId::from("vendor-1"),
            orks,
        }
    }

    fn fragment(tag: &str) -> FragmentRecord {
        FragmentRecord {
            vendor: 7,
            public_key: format!("pub-{tag}"),
            private_key_frag: format!("enc-{tag}"),
            pass_hash: format!("hash-{tag}"),
        }
    }

    #[test]
    fn ork_records_roundtrip() {
        let db = OnboardDb::open_temporary().unwrap();
        assert!(db.get_ork(100).unwrap().is_none());

        db.put_ork(100, &ork("ork-alpha")).unwrap();
        let stored = db.get_ork(100).unwrap().unwrap();
        assert_eq!(stored.account, AccountId::from("ork-alpha"));
    }

    #[test]
    fn user_records_roundtrip() {
        let db = OnboardDb::open_temporary().unwrap();
        db.put_user(100, &user(99_999, vec![])).unwrap();

        let stored = db.get_user(100).unwrap().unwrap();
        assert_eq!(stored.timeout, 99_999);
        assert!(stored.orks.is_empty());

        // Overwrite with a confirmed record.
        db.put_user(100, &user(0, vec![100])).unwrap();
        let stored = db.get_user(100).unwrap().unwrap();
        assert_eq!(stored.timeout, 0);
        assert_eq!(stored.orks, vec![100]);
    }

    #[test]
    fn fragment_namespaces_do_not_collide() {
        let db = OnboardDb::open_temporary().unwrap();
        let alpha = AccountId::from("ork-alpha");
        let beta = AccountId::from("ork-beta");

        db.put_fragment(&alpha, 100, &fragment("a")).unwrap();
        db.put_fragment(&beta, 100, &fragment("b")).unwrap();

        assert_eq!(
            db.get_fragment(&alpha, 100).unwrap().unwrap().public_key,
            "pub-a"
        );
        assert_eq!(
            db.get_fragment(&beta, 100).unwrap().unwrap().public_key,
            "pub-b"
        );
        assert!(db.get_fragment(&alpha, 200).unwrap().is_none());
    }

    #[test]
    fn load_orders_by_username() {
        let db = OnboardDb::open_temporary().unwrap();
        for username in [500u64, 3, 90_000, 42] {
            db.put_user(username, &user(1, vec![])).unwrap();
            db.put_ork(username, &ork("ork-alpha")).unwrap();
        }

        let users: Vec<Username> = db.load_users().unwrap().into_iter().map(|(u, _)| u).collect();
        assert_eq!(users, vec![3, 42, 500, 90_000]);

        let orks: Vec<Username> = db.load_orks().unwrap().into_iter().map(|(u, _)| u).collect();
        assert_eq!(orks, vec![3, 42, 500, 90_000]);
    }

    #[test]
    fn commit_first_post_writes_both_records() {
        let db = OnboardDb::open_temporary().unwrap();
        let owner = AccountId::from("ork-alpha");
        db.put_user(100, &user(99_999, vec![])).unwrap();

        db.commit_first_post(&owner, 100, &fragment("a"), &user(99_999, vec![100]))
            .unwrap();

        assert!(db.get_fragment(&owner, 100).unwrap().is_some());
        assert_eq!(db.get_user(100).unwrap().unwrap().orks, vec![100]);
    }

    #[test]
    fn load_fragments_reports_owners() {
        let db = OnboardDb::open_temporary().unwrap();
        let alpha = AccountId::from("ork-alpha");
        let beta = AccountId::from("ork-beta");

        db.put_fragment(&alpha, 100, &fragment("a")).unwrap();
        db.put_fragment(&alpha, 200, &fragment("b")).unwrap();
        db.put_fragment(&beta, 100, &fragment("c")).unwrap();

        let loaded = db.load_fragments().unwrap();
        assert_eq!(loaded.len(), 3);
        assert!(loaded
            .iter()
            .any(|(o, u, f)| o == &alpha && *u == 200 && f.public_key == "pub-b"));
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let db = OnboardDb::open(dir.path()).unwrap();
            db.put_ork(100, &ork("ork-alpha")).unwrap();
            db.put_user(100, &user(99_999, vec![])).unwrap();
            db.put_fragment(&AccountId::from("ork-alpha"), 100, &fragment("a"))
                .unwrap();
        }

        let db = OnboardDb::open(dir.path()).unwrap();
        assert!(db.get_ork(100).unwrap().is_some());
        assert!(db.get_user(100).unwrap().is_some());
        assert!(db
            .get_fragment(&AccountId::from("ork-alpha"), 100)
            .unwrap()
            .is_some());
    }
}
