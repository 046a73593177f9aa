//! End-to-end tests for the ledger runtime.
//!
//! These drive full onboarding workflows through [`Ledger`] — the same
//! surface the node binary uses — including durability across a close and
//! reopen of the data directory.

use tessera_contracts::{AccountId, FragmentOutcome, FragmentPayload, OnboardError};
use tessera_protocol::{config, Ledger, LedgerError};

fn payload(vendor: u64, tag: &str) -> FragmentPayload {
    FragmentPayload {
        vendor,
        public_key: format!("pub-{tag}"),
        private_key_frag: format!("enc-{tag}"),
        pass_hash: format!("hash-{tag}"),
    }
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn vendor_and_oracle_complete_an_onboarding() {
    let ledger = Ledger::open_temporary().unwrap();
    let vendor = ledger.authenticate("vendor-1");
    let ork = ledger.authenticate("ork-alpha");

    // Vendor sponsors the user with the standard pending window.
    let expiry = 1_700_000_000 + config::DEFAULT_PENDING_TTL_SECS;
    let user = ledger.initialize_user(&vendor, 100, expiry).unwrap();
    assert!(user.is_pending());

    // Oracle claims the username and stores the fragment.
    ledger
        .register_ork(&ork, 100, "ork-pk".into(), "https://ork-alpha".into())
        .unwrap();
    let receipt = ledger
        .post_fragment(&ork, 100, 100, payload(7, "v1"))
        .unwrap();
    assert_eq!(receipt.outcome, FragmentOutcome::Created);
    assert_eq!(receipt.user.orks, vec![100]);

    // Vendor confirms; a second confirm is rejected.
    let user = ledger.confirm_user(&vendor, 100).unwrap();
    assert!(user.is_confirmed());

    let err = ledger.confirm_user(&vendor, 100).unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Contract(OnboardError::InvalidState { .. })
    ));
}

#[test]
fn rival_oracle_is_locked_out_end_to_end() {
    let ledger = Ledger::open_temporary().unwrap();
    let vendor = ledger.authenticate("vendor-1");
    let alpha = ledger.authenticate("ork-alpha");
    let beta = ledger.authenticate("ork-beta");

    ledger.initialize_user(&vendor, 100, 99_999).unwrap();
    ledger
        .register_ork(&alpha, 100, "pk-a".into(), "url-a".into())
        .unwrap();

    // The assignment cannot be stolen...
    let err = ledger
        .register_ork(&beta, 100, "pk-b".into(), "url-b".into())
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Contract(OnboardError::Unauthorized { .. })
    ));

    // ...and the rival cannot post into alpha's namespace either.
    let err = ledger
        .post_fragment(&beta, 100, 100, payload(7, "x"))
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Contract(OnboardError::Unauthorized { .. })
    ));
    assert_eq!(ledger.fragment_count(), 0);
}

#[test]
fn post_before_initialize_is_rejected_cleanly() {
    let ledger = Ledger::open_temporary().unwrap();
    let ork = ledger.authenticate("ork-alpha");

    ledger
        .register_ork(&ork, 100, "pk".into(), "url".into())
        .unwrap();

    let err = ledger
        .post_fragment(&ork, 100, 100, payload(7, "x"))
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Contract(OnboardError::NotFound { .. })
    ));
    assert_eq!(ledger.fragment_count(), 0);
    assert_eq!(ledger.user_count(), 0);
}

#[test]
fn reposting_updates_custody_without_double_counting() {
    let ledger = Ledger::open_temporary().unwrap();
    let vendor = ledger.authenticate("vendor-1");
    let ork = ledger.authenticate("ork-alpha");

    ledger.initialize_user(&vendor, 100, 99_999).unwrap();
    ledger
        .register_ork(&ork, 100, "pk".into(), "url".into())
        .unwrap();

    ledger
        .post_fragment(&ork, 100, 100, payload(7, "v1"))
        .unwrap();
    let receipt = ledger
        .post_fragment(&ork, 100, 100, payload(7, "v2"))
        .unwrap();

    assert_eq!(receipt.outcome, FragmentOutcome::Overwritten);
    assert_eq!(ledger.fragment_count(), 1);
    assert_eq!(ledger.user(100).unwrap().orks, vec![100]);
    assert_eq!(
        ledger
            .fragment(&AccountId::from("ork-alpha"), 100)
            .unwrap()
            .private_key_frag,
        "enc-v2"
    );
}

// ---------------------------------------------------------------------------
// Durability
// ---------------------------------------------------------------------------

#[test]
fn state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();

    {
        let ledger = Ledger::open(dir.path()).unwrap();
        let vendor = ledger.authenticate("vendor-1");
        let ork = ledger.authenticate("ork-alpha");

        ledger.initialize_user(&vendor, 100, 99_999).unwrap();
        ledger
            .register_ork(&ork, 100, "pk".into(), "https://ork".into())
            .unwrap();
        ledger
            .post_fragment(&ork, 100, 100, payload(7, "v1"))
            .unwrap();
        ledger.confirm_user(&vendor, 100).unwrap();
    }

    // Reopen: the hydrated state must match what was committed.
    let ledger = Ledger::open(dir.path()).unwrap();
    let user = ledger.user(100).unwrap();
    assert!(user.is_confirmed());
    assert_eq!(user.onboard_vendor, AccountId::from("vendor-1"));
    assert_eq!(user.orks, vec![100]);

    let assignment = ledger.ork(100).unwrap();
    assert_eq!(assignment.account, AccountId::from("ork-alpha"));

    let fragment = ledger.fragment(&AccountId::from("ork-alpha"), 100).unwrap();
    assert_eq!(fragment.private_key_frag, "enc-v1");
    assert_eq!(fragment.vendor, 7);

    // And the contracts still enforce their rules on hydrated state.
    let vendor = ledger.authenticate("vendor-2");
    let err = ledger.confirm_user(&vendor, 100).unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Contract(OnboardError::InvalidState { .. })
    ));
}

#[test]
fn restart_preserves_ordering_of_listings() {
    let dir = tempfile::tempdir().unwrap();

    {
        let ledger = Ledger::open(dir.path()).unwrap();
        let vendor = ledger.authenticate("vendor-1");
        for username in [300u64, 5, 90] {
            ledger.initialize_user(&vendor, username, 10).unwrap();
        }
    }

    let ledger = Ledger::open(dir.path()).unwrap();
    let usernames: Vec<u64> = ledger.users().into_iter().map(|(u, _)| u).collect();
    assert_eq!(usernames, vec![5, 90, 300]);
}
