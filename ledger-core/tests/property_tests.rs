//! Property-based tests for ledger invariants
//!
//! These tests use proptest to verify critical invariants:
//! - Projection consistency: balance == Σ(transaction.amount)
//! - Non-negativity: no operation sequence drives a balance below zero
//! - Idempotency: a replayed key has at-most-once effect

use ledger_core::{Config, Error, Ledger, NewUser, TxKind, UserId};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use rust_decimal::Decimal;
use std::collections::HashSet;

/// A single ledger operation against one user
#[derive(Debug, Clone)]
enum Op {
    Credit(u64),
    Debit(u64),
    KeyedCredit(u64, u8),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1u64..500_00).prop_map(Op::Credit),
        (1u64..500_00).prop_map(Op::Debit),
        ((1u64..500_00), any::<u8>()).prop_map(|(c, k)| Op::KeyedCredit(c, k)),
    ]
}

fn cents(c: u64) -> Decimal {
    Decimal::new(c as i64, 2)
}

fn open_ledger() -> (Ledger, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Ledger::open(Config::with_data_dir(dir.path())).unwrap();
    (ledger, dir)
}

fn seed_user(ledger: &Ledger, id: i64) -> UserId {
    let user_id = UserId::new(id);
    ledger
        .create_user(NewUser {
            user_id,
            username: None,
            first_name: "Prop".to_string(),
            referrer_id: None,
        })
        .unwrap();
    user_id
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: after any operation sequence the cached balance equals the
    /// sum of the transaction log and never went negative along the way.
    #[test]
    fn prop_projection_equals_log(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let (ledger, _dir) = open_ledger();
        let user_id = seed_user(&ledger, 1);

        let mut seen_keys = HashSet::new();
        let mut expected = Decimal::ZERO;

        for op in &ops {
            match op {
                Op::Credit(c) => {
                    ledger
                        .apply_transaction(user_id, TxKind::Deposit, cents(*c), "credit", None)
                        .unwrap();
                    expected += cents(*c);
                }
                Op::Debit(c) => {
                    let amount = -cents(*c);
                    match ledger.apply_transaction(
                        user_id,
                        TxKind::Withdrawal,
                        amount,
                        "debit",
                        None,
                    ) {
                        Ok(_) => expected += amount,
                        Err(Error::InsufficientFunds { .. }) => {
                            // Rejected exactly when it would have overdrawn
                            prop_assert!(expected + amount < Decimal::ZERO);
                        }
                        Err(e) => {
                            return Err(TestCaseError::fail(format!("unexpected error: {}", e)))
                        }
                    }
                }
                Op::KeyedCredit(c, k) => {
                    let key = format!("key:{}", k);
                    ledger
                        .apply_transaction(user_id, TxKind::Bonus, cents(*c), "keyed", Some(&key))
                        .unwrap();
                    // Only the first use of a key has an effect
                    if seen_keys.insert(*k) {
                        expected += cents(*c);
                    }
                }
            }
            prop_assert!(ledger.balance(user_id).unwrap() >= Decimal::ZERO);
        }

        prop_assert_eq!(ledger.balance(user_id).unwrap(), expected);
        prop_assert!(ledger.verify_balance(user_id).unwrap());
    }

    /// Property: a replayed idempotency key produces exactly one transaction
    /// and one balance delta, however many times it is submitted.
    #[test]
    fn prop_idempotent_replay(amount in 1u64..1_000_00, replays in 1usize..5) {
        let (ledger, _dir) = open_ledger();
        let user_id = seed_user(&ledger, 2);

        let mut results = Vec::new();
        for _ in 0..=replays {
            results.push(
                ledger
                    .apply_transaction(
                        user_id,
                        TxKind::Deposit,
                        cents(amount),
                        "invoice",
                        Some("invoice:1"),
                    )
                    .unwrap(),
            );
        }

        prop_assert!(results.windows(2).all(|w| w[0] == w[1]));
        prop_assert_eq!(ledger.balance(user_id).unwrap(), cents(amount));
        prop_assert_eq!(ledger.transactions_for_user(user_id).unwrap().len(), 1);
    }

    /// Property: a debit larger than the balance always fails and leaves
    /// balance and log unchanged.
    #[test]
    fn prop_overdraft_always_rejected(balance in 0u64..100_00, extra in 1u64..100_00) {
        let (ledger, _dir) = open_ledger();
        let user_id = seed_user(&ledger, 3);

        if balance > 0 {
            ledger
                .apply_transaction(user_id, TxKind::Deposit, cents(balance), "seed", None)
                .unwrap();
        }
        let log_len = ledger.transactions_for_user(user_id).unwrap().len();

        let overdraft = -(cents(balance) + cents(extra));
        let err = ledger
            .apply_transaction(user_id, TxKind::Withdrawal, overdraft, "hold", None)
            .unwrap_err();
        prop_assert!(matches!(err, Error::InsufficientFunds { .. }));

        prop_assert_eq!(ledger.balance(user_id).unwrap(), cents(balance));
        prop_assert_eq!(ledger.transactions_for_user(user_id).unwrap().len(), log_len);
        prop_assert!(ledger.verify_balance(user_id).unwrap());
    }
}
