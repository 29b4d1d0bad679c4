//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `users` - User records keyed by user id (big-endian i64)
//! - `transactions` - Append-only transaction log (key: transaction id)
//! - `deposits` - Deposit rows keyed by provider invoice id
//! - `withdrawals` - Withdrawal rows (key: withdrawal id)
//! - `indices` - Secondary indices for per-user lookups
//! - `idempotency` - Idempotency-key records for replay-safe mutations
//!
//! All multi-key mutations go through a single `WriteBatch`, so one logical
//! ledger call is one atomic storage commit.

use crate::{
    error::{Error, Result},
    types::{Deposit, IdempotencyRecord, Transaction, User, UserId, Withdrawal},
    Config,
};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch, DB,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Column family names
const CF_USERS: &str = "users";
const CF_TRANSACTIONS: &str = "transactions";
const CF_DEPOSITS: &str = "deposits";
const CF_WITHDRAWALS: &str = "withdrawals";
const CF_INDICES: &str = "indices";
const CF_IDEMPOTENCY: &str = "idempotency";

/// Index key prefixes inside `indices`
const IDX_TX: &[u8] = b"tx:";
const IDX_WD: &[u8] = b"wd:";

/// Storage wrapper for RocksDB
pub struct Storage {
    db: DB,
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        // Tuning from config
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_target_file_size_base(config.rocksdb.target_file_size_mb * 1024 * 1024);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_USERS, Self::cf_options_records()),
            ColumnFamilyDescriptor::new(CF_TRANSACTIONS, Self::cf_options_log()),
            ColumnFamilyDescriptor::new(CF_DEPOSITS, Self::cf_options_records()),
            ColumnFamilyDescriptor::new(CF_WITHDRAWALS, Self::cf_options_records()),
            ColumnFamilyDescriptor::new(CF_INDICES, Self::cf_options_indices()),
            ColumnFamilyDescriptor::new(CF_IDEMPOTENCY, Self::cf_options_indices()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!("Opened RocksDB at {:?}", path);

        Ok(Self { db })
    }

    // Column family options

    fn cf_options_log() -> Options {
        let mut opts = Options::default();
        // Append-only log, written once and scanned, compress hard
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts.set_bottommost_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_records() -> Options {
        let mut opts = Options::default();
        // Frequently read records, use LZ4 for speed
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_indices() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        // Point lookups benefit from bloom filters
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    // Helper: get column family handle

    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    // Key encoding

    fn user_key(user_id: UserId) -> [u8; 8] {
        user_id.as_i64().to_be_bytes()
    }

    fn index_key(prefix: &[u8], user_id: UserId, id: &Uuid) -> Vec<u8> {
        let mut key = Vec::with_capacity(prefix.len() + 8 + 16);
        key.extend_from_slice(prefix);
        key.extend_from_slice(&Self::user_key(user_id));
        key.extend_from_slice(id.as_bytes());
        key
    }

    fn index_prefix(prefix: &[u8], user_id: UserId) -> Vec<u8> {
        let mut key = Vec::with_capacity(prefix.len() + 8);
        key.extend_from_slice(prefix);
        key.extend_from_slice(&Self::user_key(user_id));
        key
    }

    /// Strict upper bound over every `prefix ++ uuid` key
    fn index_upper_bound(prefix: &[u8]) -> Vec<u8> {
        let mut key = prefix.to_vec();
        key.extend_from_slice(&[0xff; 17]);
        key
    }

    // Value encoding

    fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(bincode::serialize(value)?)
    }

    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(bincode::deserialize(bytes)?)
    }

    // User operations

    /// Get user by id
    pub(crate) fn get_user(&self, user_id: UserId) -> Result<Option<User>> {
        let cf = self.cf(CF_USERS)?;
        match self.db.get_cf(&cf, Self::user_key(user_id))? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Insert or overwrite a user record
    pub(crate) fn put_user(&self, user: &User) -> Result<()> {
        let cf = self.cf(CF_USERS)?;
        self.db
            .put_cf(&cf, Self::user_key(user.user_id), Self::encode(user)?)?;
        Ok(())
    }

    // Transaction log operations

    /// Get transaction by id
    pub(crate) fn get_transaction(&self, id: &Uuid) -> Result<Option<Transaction>> {
        let cf = self.cf(CF_TRANSACTIONS)?;
        match self.db.get_cf(&cf, id.as_bytes())? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// All transactions for a user, oldest first
    pub(crate) fn transactions_for_user(&self, user_id: UserId) -> Result<Vec<Transaction>> {
        let idx_cf = self.cf(CF_INDICES)?;
        let prefix = Self::index_prefix(IDX_TX, user_id);

        let mut transactions = Vec::new();
        let iter = self
            .db
            .iterator_cf(&idx_cf, IteratorMode::From(&prefix, Direction::Forward));
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            let tx_id = Uuid::from_slice(&value)
                .map_err(|e| Error::Storage(format!("Corrupt transaction index: {}", e)))?;
            let tx = self.get_transaction(&tx_id)?.ok_or_else(|| {
                Error::Storage(format!("Index references missing transaction {}", tx_id))
            })?;
            transactions.push(tx);
        }

        Ok(transactions)
    }

    // Idempotency operations

    /// Look up a previously applied idempotency key
    pub(crate) fn get_idempotency(&self, key: &str) -> Result<Option<IdempotencyRecord>> {
        let cf = self.cf(CF_IDEMPOTENCY)?;
        match self.db.get_cf(&cf, key.as_bytes())? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Commit one logical ledger mutation atomically: the transaction row,
    /// its per-user index entry, the updated user record, and (when present)
    /// the idempotency record.
    pub(crate) fn commit_transaction(
        &self,
        user: &User,
        tx: &Transaction,
        idempotency: Option<(&str, &IdempotencyRecord)>,
    ) -> Result<()> {
        let tx_cf = self.cf(CF_TRANSACTIONS)?;
        let idx_cf = self.cf(CF_INDICES)?;
        let users_cf = self.cf(CF_USERS)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&tx_cf, tx.id.as_bytes(), Self::encode(tx)?);
        batch.put_cf(
            &idx_cf,
            Self::index_key(IDX_TX, tx.user_id, &tx.id),
            tx.id.as_bytes(),
        );
        batch.put_cf(&users_cf, Self::user_key(user.user_id), Self::encode(user)?);

        if let Some((key, record)) = idempotency {
            let idem_cf = self.cf(CF_IDEMPOTENCY)?;
            batch.put_cf(&idem_cf, key.as_bytes(), Self::encode(record)?);
        }

        self.db.write(batch)?;
        Ok(())
    }

    // Deposit operations

    /// Get deposit by provider invoice id
    pub(crate) fn get_deposit(&self, invoice_id: i64) -> Result<Option<Deposit>> {
        let cf = self.cf(CF_DEPOSITS)?;
        match self.db.get_cf(&cf, invoice_id.to_be_bytes())? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Insert or overwrite a deposit row
    pub(crate) fn put_deposit(&self, deposit: &Deposit) -> Result<()> {
        let cf = self.cf(CF_DEPOSITS)?;
        self.db
            .put_cf(&cf, deposit.invoice_id.to_be_bytes(), Self::encode(deposit)?)?;
        Ok(())
    }

    // Withdrawal operations

    /// Get withdrawal by id
    pub(crate) fn get_withdrawal(&self, id: &Uuid) -> Result<Option<Withdrawal>> {
        let cf = self.cf(CF_WITHDRAWALS)?;
        match self.db.get_cf(&cf, id.as_bytes())? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Insert a new withdrawal row together with its per-user index entry
    pub(crate) fn insert_withdrawal(&self, withdrawal: &Withdrawal) -> Result<()> {
        let wd_cf = self.cf(CF_WITHDRAWALS)?;
        let idx_cf = self.cf(CF_INDICES)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&wd_cf, withdrawal.id.as_bytes(), Self::encode(withdrawal)?);
        batch.put_cf(
            &idx_cf,
            Self::index_key(IDX_WD, withdrawal.user_id, &withdrawal.id),
            withdrawal.id.as_bytes(),
        );
        self.db.write(batch)?;
        Ok(())
    }

    /// Overwrite an existing withdrawal row (status transitions)
    pub(crate) fn put_withdrawal(&self, withdrawal: &Withdrawal) -> Result<()> {
        let cf = self.cf(CF_WITHDRAWALS)?;
        self.db
            .put_cf(&cf, withdrawal.id.as_bytes(), Self::encode(withdrawal)?)?;
        Ok(())
    }

    /// Most-recent withdrawals for a user, newest first, up to `limit`
    pub(crate) fn withdrawals_for_user(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<Withdrawal>> {
        let idx_cf = self.cf(CF_INDICES)?;
        let prefix = Self::index_prefix(IDX_WD, user_id);
        let upper = Self::index_upper_bound(&prefix);

        let mut withdrawals = Vec::new();
        let iter = self
            .db
            .iterator_cf(&idx_cf, IteratorMode::From(&upper, Direction::Reverse));
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            let wd_id = Uuid::from_slice(&value)
                .map_err(|e| Error::Storage(format!("Corrupt withdrawal index: {}", e)))?;
            let wd = self.get_withdrawal(&wd_id)?.ok_or_else(|| {
                Error::Storage(format!("Index references missing withdrawal {}", wd_id))
            })?;
            withdrawals.push(wd);
            if withdrawals.len() >= limit {
                break;
            }
        }

        Ok(withdrawals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DepositStatus, TxKind, WithdrawalStatus};
    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn open_temp() -> (Storage, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::with_data_dir(dir.path());
        (Storage::open(&config).unwrap(), dir)
    }

    fn sample_user(id: i64) -> User {
        User {
            user_id: UserId::new(id),
            username: Some("alice".to_string()),
            first_name: "Alice".to_string(),
            balance: dec!(0),
            referrer_id: None,
            total_earned: dec!(0),
            total_referred: 0,
            registration_date: Utc::now(),
        }
    }

    #[test]
    fn test_user_roundtrip() {
        let (storage, _dir) = open_temp();
        let user = sample_user(1001);

        assert!(storage.get_user(user.user_id).unwrap().is_none());
        storage.put_user(&user).unwrap();

        let loaded = storage.get_user(user.user_id).unwrap().unwrap();
        assert_eq!(loaded.first_name, "Alice");
        assert_eq!(loaded.balance, dec!(0));
    }

    #[test]
    fn test_commit_transaction_is_atomic_unit() {
        let (storage, _dir) = open_temp();
        let mut user = sample_user(1002);
        storage.put_user(&user).unwrap();

        let tx = Transaction {
            id: Uuid::now_v7(),
            user_id: user.user_id,
            kind: TxKind::Bonus,
            amount: dec!(10),
            description: "Welcome bonus".to_string(),
            created_at: Utc::now(),
        };
        user.balance = dec!(10);

        let record = IdempotencyRecord {
            transaction_id: tx.id,
            balance_after: user.balance,
        };
        storage
            .commit_transaction(&user, &tx, Some(("welcome:1002", &record)))
            .unwrap();

        assert_eq!(
            storage.get_user(user.user_id).unwrap().unwrap().balance,
            dec!(10)
        );
        assert_eq!(
            storage.get_transaction(&tx.id).unwrap().unwrap().amount,
            dec!(10)
        );
        assert_eq!(storage.transactions_for_user(user.user_id).unwrap().len(), 1);
        assert_eq!(
            storage
                .get_idempotency("welcome:1002")
                .unwrap()
                .unwrap()
                .transaction_id,
            tx.id
        );
    }

    #[test]
    fn test_transaction_index_isolated_per_user() {
        let (storage, _dir) = open_temp();
        for id in [1003i64, 1004] {
            let mut user = sample_user(id);
            storage.put_user(&user).unwrap();
            let tx = Transaction {
                id: Uuid::now_v7(),
                user_id: user.user_id,
                kind: TxKind::Adjustment,
                amount: dec!(5),
                description: String::new(),
                created_at: Utc::now(),
            };
            user.balance = dec!(5);
            storage.commit_transaction(&user, &tx, None).unwrap();
        }

        assert_eq!(
            storage
                .transactions_for_user(UserId::new(1003))
                .unwrap()
                .len(),
            1
        );
        assert_eq!(
            storage
                .transactions_for_user(UserId::new(1004))
                .unwrap()
                .len(),
            1
        );
        assert!(storage
            .transactions_for_user(UserId::new(9999))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_deposit_roundtrip() {
        let (storage, _dir) = open_temp();
        let deposit = Deposit {
            id: Uuid::new_v4(),
            user_id: UserId::new(1005),
            amount: dec!(100),
            currency: "USDT".to_string(),
            invoice_id: 555_001,
            status: DepositStatus::Pending,
            created_at: Utc::now(),
        };

        storage.put_deposit(&deposit).unwrap();
        let loaded = storage.get_deposit(555_001).unwrap().unwrap();
        assert_eq!(loaded.status, DepositStatus::Pending);
        assert_eq!(loaded.amount, dec!(100));
        assert!(storage.get_deposit(555_002).unwrap().is_none());
    }

    #[test]
    fn test_withdrawals_listed_newest_first_with_limit() {
        let (storage, _dir) = open_temp();
        let user_id = UserId::new(1006);

        let mut ids = Vec::new();
        for i in 0..5 {
            let wd = Withdrawal {
                id: Uuid::now_v7(),
                user_id,
                amount: dec!(20) + Decimal::from(i),
                currency: "USDT".to_string(),
                wallet_address: "TWalletAddr".to_string(),
                status: WithdrawalStatus::Pending,
                transaction_id: Uuid::now_v7(),
                created_at: Utc::now(),
            };
            storage.insert_withdrawal(&wd).unwrap();
            ids.push(wd.id);
            // UUIDv7 ordering is millisecond-granular
            std::thread::sleep(std::time::Duration::from_millis(2));
        }

        let listed = storage.withdrawals_for_user(user_id, 3).unwrap();
        assert_eq!(listed.len(), 3);
        // Newest (last inserted) first
        assert_eq!(listed[0].id, ids[4]);
        assert_eq!(listed[1].id, ids[3]);
        assert_eq!(listed[2].id, ids[2]);
    }
}
