//! Integration tests for the onboarding contracts.
//!
//! These tests exercise the full vendor/oracle workflow across module
//! boundaries: initialization, oracle assignment, fragment custody, and
//! confirmation — including the authorization failures that keep each step
//! honest.

use tessera_contracts::{
    AccountId, AuthenticatedCaller, FragmentOutcome, FragmentPayload, FragmentStore,
    MemoryTable, OnboardError, OrkRegistry, RecordKind, UserRegistry,
};

fn account(name: &str) -> AuthenticatedCaller {
    AuthenticatedCaller::attest(AccountId::from(name))
}

fn payload(vendor: u64, tag: &str) -> FragmentPayload {
    FragmentPayload {
        vendor,
        public_key: format!("pub-{tag}"),
        private_key_frag: format!("enc-{tag}"),
        pass_hash: format!("argon-{tag}"),
    }
}

/// Fresh, empty state for one scenario.
struct World {
    orks: OrkRegistry<MemoryTable<tessera_contracts::OrkRecord>>,
    users: UserRegistry<MemoryTable<tessera_contracts::UserRecord>>,
    fragments: FragmentStore<MemoryTable<tessera_contracts::FragmentRecord>>,
}

impl World {
    fn new() -> Self {
        Self {
            orks: OrkRegistry::new(),
            users: UserRegistry::new(),
            fragments: FragmentStore::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Happy Path
// ---------------------------------------------------------------------------

#[test]
fn full_onboarding_lifecycle() {
    let mut w = World::new();
    let vendor = account("vendor-1");
    let ork = account("ork-alpha");

    // 1. Vendor initializes the user as pending.
    let user = w.users.initialize(&vendor, 100, 99_999).unwrap();
    assert!(user.is_pending());
    assert_eq!(user.timeout, 99_999);

    // 2. Oracle registers itself for the username.
    let assignment = w
        .orks
        .register_or_update(&ork, 100, "ork-pk".into(), "https://ork-alpha".into())
        .unwrap();
    assert_eq!(assignment.account, AccountId::from("ork-alpha"));

    // 3. The assigned oracle posts the user's fragment.
    let receipt = w
        .fragments
        .post_fragment(&ork, &mut w.users, &w.orks, 100, 100, payload(7, "v1"))
        .unwrap();
    assert_eq!(receipt.outcome, FragmentOutcome::Created);
    assert_eq!(w.users.get(100).unwrap().orks, vec![100]);
    assert!(w
        .fragments
        .get(&AccountId::from("ork-alpha"), 100)
        .is_some());

    // 4. Vendor confirms; the pending expiry is cleared.
    let user = w.users.confirm(&vendor, 100).unwrap();
    assert!(user.is_confirmed());
    assert_eq!(user.timeout, 0);

    // 5. A second confirm is rejected as already confirmed.
    let err = w.users.confirm(&vendor, 100).unwrap_err();
    assert!(matches!(err, OnboardError::InvalidState { .. }));
}

#[test]
fn fragments_may_be_posted_after_confirmation() {
    let mut w = World::new();
    let vendor = account("vendor-1");
    let ork = account("ork-alpha");

    w.users.initialize(&vendor, 100, 99_999).unwrap();
    w.orks
        .register_or_update(&ork, 100, "pk".into(), "url".into())
        .unwrap();
    w.fragments
        .post_fragment(&ork, &mut w.users, &w.orks, 100, 100, payload(7, "v1"))
        .unwrap();
    w.users.confirm(&vendor, 100).unwrap();

    // Custody updates are independent of the lifecycle phase.
    let receipt = w
        .fragments
        .post_fragment(&ork, &mut w.users, &w.orks, 100, 100, payload(7, "v2"))
        .unwrap();
    assert_eq!(receipt.outcome, FragmentOutcome::Overwritten);
    assert_eq!(
        w.fragments
            .get(&AccountId::from("ork-alpha"), 100)
            .unwrap()
            .private_key_frag,
        "enc-v2"
    );
    // The serviced-by list did not grow.
    assert_eq!(w.users.get(100).unwrap().orks, vec![100]);
}

// ---------------------------------------------------------------------------
// Authorization Boundaries
// ---------------------------------------------------------------------------

#[test]
fn rival_oracle_cannot_take_over_an_assignment() {
    let mut w = World::new();
    w.orks
        .register_or_update(&account("ork-alpha"), 100, "pk-a".into(), "url-a".into())
        .unwrap();

    let err = w
        .orks
        .register_or_update(&account("ork-beta"), 100, "pk-b".into(), "url-b".into())
        .unwrap_err();
    assert!(matches!(
        err,
        OnboardError::Unauthorized {
            kind: RecordKind::Ork,
            username: 100,
            ..
        }
    ));

    // The original assignment survives untouched.
    let record = w.orks.get(100).unwrap();
    assert_eq!(record.account, AccountId::from("ork-alpha"));
    assert_eq!(record.public_key, "pk-a");
}

#[test]
fn displaced_oracle_cannot_post_fragments() {
    let mut w = World::new();
    let vendor = account("vendor-1");
    let alpha = account("ork-alpha");

    w.users.initialize(&vendor, 100, 99_999).unwrap();
    w.orks
        .register_or_update(&alpha, 100, "pk".into(), "url".into())
        .unwrap();

    // ork-beta never held the assignment, so its post is rejected even
    // though the user exists and an assignment exists.
    let err = w
        .fragments
        .post_fragment(
            &account("ork-beta"),
            &mut w.users,
            &w.orks,
            100,
            100,
            payload(7, "v1"),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        OnboardError::Unauthorized {
            kind: RecordKind::Fragment,
            ..
        }
    ));
    assert!(w.fragments.is_empty());
}

// ---------------------------------------------------------------------------
// Precondition Ordering
// ---------------------------------------------------------------------------

#[test]
fn post_without_initialize_fails_before_any_mutation() {
    let mut w = World::new();
    let ork = account("ork-alpha");
    w.orks
        .register_or_update(&ork, 100, "pk".into(), "url".into())
        .unwrap();

    let err = w
        .fragments
        .post_fragment(&ork, &mut w.users, &w.orks, 100, 100, payload(7, "v1"))
        .unwrap_err();

    assert!(matches!(
        err,
        OnboardError::NotFound {
            kind: RecordKind::User,
            username: 100
        }
    ));
    assert!(w.fragments.is_empty());
    assert!(w.users.is_empty());
}

#[test]
fn missing_assignment_is_reported_after_user_check() {
    let mut w = World::new();
    w.users
        .initialize(&account("vendor-1"), 100, 99_999)
        .unwrap();

    let err = w
        .fragments
        .post_fragment(
            &account("ork-alpha"),
            &mut w.users,
            &w.orks,
            100,
            100,
            payload(7, "v1"),
        )
        .unwrap_err();

    assert!(matches!(
        err,
        OnboardError::NotFound {
            kind: RecordKind::Ork,
            username: 100
        }
    ));
}

// ---------------------------------------------------------------------------
// Lifecycle Invariants
// ---------------------------------------------------------------------------

#[test]
fn timeout_zero_never_enters_through_initialize() {
    let mut w = World::new();
    let vendor = account("vendor-1");

    assert!(w.users.initialize(&vendor, 100, 0).is_err());
    assert!(w.users.get(100).is_none());

    // Also rejected as a refresh of an existing record.
    w.users.initialize(&vendor, 100, 50).unwrap();
    assert!(w.users.initialize(&vendor, 100, 0).is_err());
    assert_eq!(w.users.get(100).unwrap().timeout, 50);
}

#[test]
fn reinitialize_preserves_sponsor_and_custody_history() {
    let mut w = World::new();
    let vendor1 = account("vendor-1");
    let ork = account("ork-alpha");

    w.users.initialize(&vendor1, 100, 500).unwrap();
    w.orks
        .register_or_update(&ork, 100, "pk".into(), "url".into())
        .unwrap();
    w.fragments
        .post_fragment(&ork, &mut w.users, &w.orks, 100, 100, payload(7, "v1"))
        .unwrap();

    // Another vendor extends the pending window; nothing else changes.
    let user = w.users.initialize(&account("vendor-2"), 100, 9_000).unwrap();
    assert_eq!(user.timeout, 9_000);
    assert_eq!(user.onboard_vendor, AccountId::from("vendor-1"));
    assert_eq!(user.orks, vec![100]);
}

#[test]
fn serviced_by_list_counts_namespaces_not_posts() {
    let mut w = World::new();
    let vendor = account("vendor-1");
    let ork = account("ork-alpha");

    w.users.initialize(&vendor, 100, 99_999).unwrap();
    w.orks
        .register_or_update(&ork, 100, "pk".into(), "url".into())
        .unwrap();

    for round in 0..3 {
        w.fragments
            .post_fragment(
                &ork,
                &mut w.users,
                &w.orks,
                100,
                100,
                payload(7, &format!("v{round}")),
            )
            .unwrap();
    }

    // Three posts, one namespace: exactly one list entry.
    assert_eq!(w.users.get(100).unwrap().orks, vec![100]);
    assert_eq!(w.fragments.len(), 1);
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

#[test]
fn records_roundtrip_through_json() {
    let mut w = World::new();
    let vendor = account("vendor-1");
    let ork = account("ork-alpha");

    w.users.initialize(&vendor, 100, 99_999).unwrap();
    w.orks
        .register_or_update(&ork, 100, "pk".into(), "https://ork".into())
        .unwrap();
    w.fragments
        .post_fragment(&ork, &mut w.users, &w.orks, 100, 100, payload(7, "v1"))
        .unwrap();

    let user = w.users.get(100).unwrap();
    let json = serde_json::to_string(&user).unwrap();
    let back: tessera_contracts::UserRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(back, user);

    let frag = w.fragments.get(&AccountId::from("ork-alpha"), 100).unwrap();
    let json = serde_json::to_string(&frag).unwrap();
    let back: tessera_contracts::FragmentRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(back, frag);
}
