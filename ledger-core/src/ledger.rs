//! Main ledger orchestration layer
//!
//! This module ties together storage and per-user locking into the single
//! legal mutation path for balances: [`Ledger::apply_transaction`].
//!
//! # Example
//!
//! ```no_run
//! use ledger_core::{Config, Ledger, NewUser, TxKind, UserId};
//! use rust_decimal::Decimal;
//!
//! fn main() -> ledger_core::Result<()> {
//!     let ledger = Ledger::open(Config::default())?;
//!
//!     let user = ledger.create_user(NewUser {
//!         user_id: UserId::new(1),
//!         username: None,
//!         first_name: "Alice".to_string(),
//!         referrer_id: None,
//!     })?;
//!
//!     let applied = ledger.apply_transaction(
//!         user.user_id,
//!         TxKind::Bonus,
//!         Decimal::TEN,
//!         "Welcome bonus",
//!         Some("welcome:1"),
//!     )?;
//!     assert_eq!(applied.balance, Decimal::TEN);
//!     Ok(())
//! }
//! ```

use crate::{
    error::{Error, Result},
    storage::Storage,
    types::{
        Applied, Deposit, DepositStatus, IdempotencyRecord, NewUser, Transaction, TxKind, User,
        UserId, Withdrawal, WithdrawalStatus,
    },
    Config,
};
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// The ledger store.
///
/// Owns user balances, the append-only transaction log, and the
/// deposit/withdrawal rows. Mutations for a single user are serializable
/// with respect to each other: a per-user mutex guards every
/// read-modify-write. Storage calls are synchronous and brief; no external
/// call is ever made while a lock is held.
pub struct Ledger {
    storage: Storage,
    locks: DashMap<UserId, Arc<Mutex<()>>>,
}

impl Ledger {
    /// Open ledger with configuration
    pub fn open(config: Config) -> Result<Self> {
        let storage = Storage::open(&config)?;
        Ok(Self {
            storage,
            locks: DashMap::new(),
        })
    }

    fn user_lock(&self, user_id: UserId) -> Arc<Mutex<()>> {
        self.locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    // User operations

    /// Create a user with a zero balance.
    ///
    /// Fails with [`Error::Conflict`] when the id already exists, which is
    /// how concurrent duplicate registrations are deduplicated: the loser of
    /// the race re-reads the existing row.
    pub fn create_user(&self, new: NewUser) -> Result<User> {
        let lock = self.user_lock(new.user_id);
        let _guard = lock.lock();

        if self.storage.get_user(new.user_id)?.is_some() {
            return Err(Error::Conflict(format!(
                "user {} already exists",
                new.user_id
            )));
        }

        let user = User {
            user_id: new.user_id,
            username: new.username,
            first_name: new.first_name,
            balance: Decimal::ZERO,
            referrer_id: new.referrer_id,
            total_earned: Decimal::ZERO,
            total_referred: 0,
            registration_date: Utc::now(),
        };
        self.storage.put_user(&user)?;

        tracing::info!("Created user {}", user.user_id);
        Ok(user)
    }

    /// Get user by id
    pub fn get_user(&self, user_id: UserId) -> Result<User> {
        self.storage
            .get_user(user_id)?
            .ok_or(Error::UserNotFound(user_id))
    }

    /// Get user by id, `None` when unknown
    pub fn lookup_user(&self, user_id: UserId) -> Result<Option<User>> {
        self.storage.get_user(user_id)
    }

    /// Current balance
    pub fn balance(&self, user_id: UserId) -> Result<Decimal> {
        Ok(self.get_user(user_id)?.balance)
    }

    // The mutation contract

    /// Atomically append a transaction and update the cached balance.
    ///
    /// When `idempotency_key` is supplied and a transaction with that key was
    /// already applied, the original result is returned without re-applying.
    /// This is what makes provider-webhook replays and double-submitted
    /// requests safe.
    ///
    /// Exactly one transaction row and one balance update per logical call,
    /// or none on failure. A debit that would make the balance negative fails
    /// with [`Error::InsufficientFunds`].
    pub fn apply_transaction(
        &self,
        user_id: UserId,
        kind: TxKind,
        amount: Decimal,
        description: &str,
        idempotency_key: Option<&str>,
    ) -> Result<Applied> {
        if amount.is_zero() {
            return Err(Error::InvalidAmount("amount must be non-zero".to_string()));
        }

        let lock = self.user_lock(user_id);
        let _guard = lock.lock();

        if let Some(key) = idempotency_key {
            if let Some(record) = self.storage.get_idempotency(key)? {
                tracing::debug!("Replayed idempotency key {} (tx {})", key, record.transaction_id);
                return Ok(Applied {
                    transaction_id: record.transaction_id,
                    balance: record.balance_after,
                });
            }
        }

        let mut user = self
            .storage
            .get_user(user_id)?
            .ok_or(Error::UserNotFound(user_id))?;

        let new_balance = user.balance + amount;
        if new_balance < Decimal::ZERO {
            return Err(Error::InsufficientFunds {
                required: -amount,
                available: user.balance,
            });
        }

        let tx = Transaction {
            id: Uuid::now_v7(),
            user_id,
            kind,
            amount,
            description: description.to_string(),
            created_at: Utc::now(),
        };

        user.balance = new_balance;
        if amount > Decimal::ZERO && matches!(kind, TxKind::Bonus | TxKind::Referral) {
            user.total_earned += amount;
        }
        if amount > Decimal::ZERO && kind == TxKind::Referral {
            user.total_referred += 1;
        }

        let record = IdempotencyRecord {
            transaction_id: tx.id,
            balance_after: user.balance,
        };
        self.storage
            .commit_transaction(&user, &tx, idempotency_key.map(|k| (k, &record)))?;

        tracing::info!(
            "Applied {} {} to user {} (tx {}, balance {})",
            kind,
            amount,
            user_id,
            tx.id,
            user.balance
        );

        Ok(Applied {
            transaction_id: tx.id,
            balance: user.balance,
        })
    }

    /// All transactions for a user, oldest first
    pub fn transactions_for_user(&self, user_id: UserId) -> Result<Vec<Transaction>> {
        self.storage.transactions_for_user(user_id)
    }

    /// Check the projection invariant: the cached balance must equal the sum
    /// of the user's transaction log.
    pub fn verify_balance(&self, user_id: UserId) -> Result<bool> {
        let user = self.get_user(user_id)?;
        let sum: Decimal = self
            .storage
            .transactions_for_user(user_id)?
            .iter()
            .map(|tx| tx.amount)
            .sum();
        Ok(sum == user.balance)
    }

    // Deposit rows

    /// Record a pending deposit for a freshly created provider invoice
    pub fn record_deposit(
        &self,
        user_id: UserId,
        amount: Decimal,
        currency: &str,
        invoice_id: i64,
    ) -> Result<Deposit> {
        if self.storage.get_deposit(invoice_id)?.is_some() {
            return Err(Error::Conflict(format!(
                "invoice {} already recorded",
                invoice_id
            )));
        }

        let deposit = Deposit {
            id: Uuid::new_v4(),
            user_id,
            amount,
            currency: currency.to_string(),
            invoice_id,
            status: DepositStatus::Pending,
            created_at: Utc::now(),
        };
        self.storage.put_deposit(&deposit)?;
        Ok(deposit)
    }

    /// Get deposit by provider invoice id
    pub fn deposit_by_invoice(&self, invoice_id: i64) -> Result<Deposit> {
        self.storage
            .get_deposit(invoice_id)?
            .ok_or(Error::DepositNotFound(invoice_id))
    }

    /// Transition a deposit's status.
    ///
    /// Writing the current status again is an idempotent no-op; any other
    /// transition away from a terminal status is a conflict.
    pub fn update_deposit_status(
        &self,
        invoice_id: i64,
        status: DepositStatus,
    ) -> Result<Deposit> {
        let mut deposit = self.deposit_by_invoice(invoice_id)?;
        if deposit.status == status {
            return Ok(deposit);
        }
        if deposit.status.is_terminal() {
            return Err(Error::Conflict(format!(
                "deposit for invoice {} already {}",
                invoice_id, deposit.status
            )));
        }
        deposit.status = status;
        self.storage.put_deposit(&deposit)?;
        Ok(deposit)
    }

    // Withdrawal rows

    /// Record a pending withdrawal referencing its hold debit
    pub fn record_withdrawal(
        &self,
        user_id: UserId,
        amount: Decimal,
        currency: &str,
        wallet_address: &str,
        transaction_id: Uuid,
    ) -> Result<Withdrawal> {
        let withdrawal = Withdrawal {
            id: Uuid::now_v7(),
            user_id,
            amount,
            currency: currency.to_string(),
            wallet_address: wallet_address.to_string(),
            status: WithdrawalStatus::Pending,
            transaction_id,
            created_at: Utc::now(),
        };
        self.storage.insert_withdrawal(&withdrawal)?;
        Ok(withdrawal)
    }

    /// Get withdrawal by id
    pub fn get_withdrawal(&self, id: &Uuid) -> Result<Withdrawal> {
        self.storage
            .get_withdrawal(id)?
            .ok_or(Error::WithdrawalNotFound(*id))
    }

    /// Most-recent withdrawals for a user, newest first
    pub fn withdrawals_for_user(&self, user_id: UserId, limit: usize) -> Result<Vec<Withdrawal>> {
        self.storage.withdrawals_for_user(user_id, limit)
    }

    /// Transition a withdrawal out of `pending` under the owner's lock.
    ///
    /// Re-resolving an already resolved request is a conflict and leaves the
    /// row unchanged; returning to `pending` is never legal.
    pub fn update_withdrawal_status(
        &self,
        id: &Uuid,
        status: WithdrawalStatus,
    ) -> Result<Withdrawal> {
        if status == WithdrawalStatus::Pending {
            return Err(Error::Conflict(
                "withdrawal cannot return to pending".to_string(),
            ));
        }

        let wd = self.get_withdrawal(id)?;
        let lock = self.user_lock(wd.user_id);
        let _guard = lock.lock();

        // Re-read under the lock: a concurrent resolve may have won
        let mut wd = self.get_withdrawal(id)?;
        if wd.status.is_resolved() {
            return Err(Error::Conflict(format!(
                "withdrawal {} already {}",
                id, wd.status
            )));
        }
        wd.status = status;
        self.storage.put_withdrawal(&wd)?;

        tracing::info!("Withdrawal {} -> {}", id, status);
        Ok(wd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn test_ledger() -> (Ledger, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(Config::with_data_dir(dir.path())).unwrap();
        (ledger, dir)
    }

    fn seed_user(ledger: &Ledger, id: i64) -> User {
        ledger
            .create_user(NewUser {
                user_id: UserId::new(id),
                username: None,
                first_name: "Test".to_string(),
                referrer_id: None,
            })
            .unwrap()
    }

    #[test]
    fn test_create_user_conflict() {
        let (ledger, _dir) = test_ledger();
        seed_user(&ledger, 1);

        let dup = ledger.create_user(NewUser {
            user_id: UserId::new(1),
            username: Some("dup".to_string()),
            first_name: "Dup".to_string(),
            referrer_id: None,
        });
        assert!(matches!(dup, Err(Error::Conflict(_))));
        // Original row untouched
        assert_eq!(ledger.get_user(UserId::new(1)).unwrap().first_name, "Test");
    }

    #[test]
    fn test_credit_updates_projection() {
        let (ledger, _dir) = test_ledger();
        let user = seed_user(&ledger, 2);

        let applied = ledger
            .apply_transaction(user.user_id, TxKind::Deposit, dec!(100), "Deposit", None)
            .unwrap();
        assert_eq!(applied.balance, dec!(100));
        assert_eq!(ledger.balance(user.user_id).unwrap(), dec!(100));
        assert!(ledger.verify_balance(user.user_id).unwrap());
    }

    #[test]
    fn test_idempotent_replay_applies_once() {
        let (ledger, _dir) = test_ledger();
        let user = seed_user(&ledger, 3);

        let first = ledger
            .apply_transaction(
                user.user_id,
                TxKind::Deposit,
                dec!(50),
                "Invoice 42",
                Some("invoice:42"),
            )
            .unwrap();
        let second = ledger
            .apply_transaction(
                user.user_id,
                TxKind::Deposit,
                dec!(50),
                "Invoice 42",
                Some("invoice:42"),
            )
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(ledger.balance(user.user_id).unwrap(), dec!(50));
        assert_eq!(ledger.transactions_for_user(user.user_id).unwrap().len(), 1);
    }

    #[test]
    fn test_insufficient_funds_leaves_state_unchanged() {
        let (ledger, _dir) = test_ledger();
        let user = seed_user(&ledger, 4);
        ledger
            .apply_transaction(user.user_id, TxKind::Deposit, dec!(50), "Deposit", None)
            .unwrap();

        let err = ledger
            .apply_transaction(user.user_id, TxKind::Withdrawal, dec!(-80), "Hold", None)
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientFunds { .. }));

        assert_eq!(ledger.balance(user.user_id).unwrap(), dec!(50));
        assert_eq!(ledger.transactions_for_user(user.user_id).unwrap().len(), 1);
        assert!(ledger.verify_balance(user.user_id).unwrap());
    }

    #[test]
    fn test_zero_amount_rejected() {
        let (ledger, _dir) = test_ledger();
        let user = seed_user(&ledger, 5);

        let err = ledger
            .apply_transaction(user.user_id, TxKind::Adjustment, dec!(0), "", None)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidAmount(_)));
    }

    #[test]
    fn test_unknown_user() {
        let (ledger, _dir) = test_ledger();
        let err = ledger
            .apply_transaction(UserId::new(404), TxKind::Bonus, dec!(10), "", None)
            .unwrap_err();
        assert!(matches!(err, Error::UserNotFound(_)));
        assert!(matches!(
            ledger.balance(UserId::new(404)).unwrap_err(),
            Error::UserNotFound(_)
        ));
    }

    #[test]
    fn test_referral_credit_updates_counters() {
        let (ledger, _dir) = test_ledger();
        let referrer = seed_user(&ledger, 6);

        ledger
            .apply_transaction(
                referrer.user_id,
                TxKind::Referral,
                dec!(25),
                "Referral bonus",
                Some("referral:7"),
            )
            .unwrap();

        let updated = ledger.get_user(referrer.user_id).unwrap();
        assert_eq!(updated.balance, dec!(25));
        assert_eq!(updated.total_earned, dec!(25));
        assert_eq!(updated.total_referred, 1);

        // Replay must not double-count the referral
        ledger
            .apply_transaction(
                referrer.user_id,
                TxKind::Referral,
                dec!(25),
                "Referral bonus",
                Some("referral:7"),
            )
            .unwrap();
        let updated = ledger.get_user(referrer.user_id).unwrap();
        assert_eq!(updated.total_referred, 1);
        assert_eq!(updated.balance, dec!(25));
    }

    #[test]
    fn test_deposit_status_transitions() {
        let (ledger, _dir) = test_ledger();
        let user = seed_user(&ledger, 8);

        ledger
            .record_deposit(user.user_id, dec!(100), "USDT", 9001)
            .unwrap();
        assert!(matches!(
            ledger.record_deposit(user.user_id, dec!(100), "USDT", 9001),
            Err(Error::Conflict(_))
        ));

        let paid = ledger
            .update_deposit_status(9001, DepositStatus::Paid)
            .unwrap();
        assert_eq!(paid.status, DepositStatus::Paid);

        // Same status again is a no-op
        let again = ledger
            .update_deposit_status(9001, DepositStatus::Paid)
            .unwrap();
        assert_eq!(again.status, DepositStatus::Paid);

        // Terminal status never transitions elsewhere
        assert!(matches!(
            ledger.update_deposit_status(9001, DepositStatus::Failed),
            Err(Error::Conflict(_))
        ));

        assert!(matches!(
            ledger.deposit_by_invoice(9002),
            Err(Error::DepositNotFound(9002))
        ));
    }

    #[test]
    fn test_withdrawal_resolution_guard() {
        let (ledger, _dir) = test_ledger();
        let user = seed_user(&ledger, 9);
        ledger
            .apply_transaction(user.user_id, TxKind::Deposit, dec!(100), "Deposit", None)
            .unwrap();
        let hold = ledger
            .apply_transaction(user.user_id, TxKind::Withdrawal, dec!(-20), "Hold", None)
            .unwrap();
        let wd = ledger
            .record_withdrawal(user.user_id, dec!(20), "USDT", "TWallet", hold.transaction_id)
            .unwrap();

        let done = ledger
            .update_withdrawal_status(&wd.id, WithdrawalStatus::Completed)
            .unwrap();
        assert_eq!(done.status, WithdrawalStatus::Completed);

        assert!(matches!(
            ledger.update_withdrawal_status(&wd.id, WithdrawalStatus::Rejected),
            Err(Error::Conflict(_))
        ));
        assert!(matches!(
            ledger.update_withdrawal_status(&wd.id, WithdrawalStatus::Pending),
            Err(Error::Conflict(_))
        ));
    }

    #[test]
    fn test_concurrent_debits_never_overspend() {
        let (ledger, _dir) = test_ledger();
        let user = seed_user(&ledger, 10);
        ledger
            .apply_transaction(user.user_id, TxKind::Deposit, dec!(100), "Deposit", None)
            .unwrap();

        let successes = std::sync::atomic::AtomicUsize::new(0);
        std::thread::scope(|scope| {
            for _ in 0..10 {
                scope.spawn(|| {
                    if ledger
                        .apply_transaction(
                            user.user_id,
                            TxKind::Withdrawal,
                            dec!(-30),
                            "Hold",
                            None,
                        )
                        .is_ok()
                    {
                        successes.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    }
                });
            }
        });

        // 100 covers exactly three 30-unit holds
        assert_eq!(successes.load(std::sync::atomic::Ordering::SeqCst), 3);
        assert_eq!(ledger.balance(user.user_id).unwrap(), dec!(10));
        assert!(ledger.verify_balance(user.user_id).unwrap());
    }
}
