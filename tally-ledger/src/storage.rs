//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `wallets` - One balance row per user (key: user id)
//! - `entries` - Append-only transaction log (key: entry id, big-endian)
//! - `requests` - Money requests (key: request uuid)
//! - `indices` - Secondary indices for per-user lookups
//!
//! All balance-affecting commits go through a single [`WriteBatch`] so the
//! wallet rows and the log entry become durable together or not at all.

use crate::{
    error::{Error, Result},
    types::{LedgerEntry, MoneyRequest, UserId, Wallet},
    Config,
};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch, DB,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Column family names
const CF_WALLETS: &str = "wallets";
const CF_ENTRIES: &str = "entries";
const CF_REQUESTS: &str = "requests";
const CF_INDICES: &str = "indices";

/// Index key separator between a user id and the record id
const SEP: u8 = b'|';

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,

    /// Last allocated entry id, recovered from the log at open
    entry_seq: AtomicU64,
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

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_WALLETS, Options::default()),
            ColumnFamilyDescriptor::new(CF_ENTRIES, Self::cf_options_entries()),
            ColumnFamilyDescriptor::new(CF_REQUESTS, Options::default()),
            ColumnFamilyDescriptor::new(CF_INDICES, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        let storage = Self {
            db: Arc::new(db),
            entry_seq: AtomicU64::new(0),
        };
        let last_id = storage.last_entry_id()?;
        storage.entry_seq.store(last_id, Ordering::SeqCst);

        tracing::info!(path = %path.display(), last_entry_id = last_id, "opened ledger storage");

        Ok(storage)
    }

    fn cf_options_entries() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("column family {name} not found")))
    }

    // Entry id allocation

    /// Allocate the next monotonic entry id
    pub fn next_entry_id(&self) -> u64 {
        self.entry_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Highest entry id in the log (0 when empty)
    fn last_entry_id(&self) -> Result<u64> {
        let cf = self.cf(CF_ENTRIES)?;
        let mut iter = self.db.iterator_cf(&cf, IteratorMode::End);

        if let Some(item) = iter.next() {
            let (key, _) = item?;
            let bytes: [u8; 8] = key
                .as_ref()
                .try_into()
                .map_err(|_| Error::Storage("malformed entry key".to_string()))?;
            return Ok(u64::from_be_bytes(bytes));
        }

        Ok(0)
    }

    // Wallet operations

    /// Get wallet row, None when the user has no wallet
    pub fn get_wallet(&self, user: &UserId) -> Result<Option<Wallet>> {
        let cf = self.cf(CF_WALLETS)?;

        match self.db.get_cf(&cf, user.as_str().as_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// Write a wallet row on its own (creation path)
    pub fn put_wallet(&self, wallet: &Wallet) -> Result<()> {
        let cf = self.cf(CF_WALLETS)?;
        let value = bincode::serialize(wallet)?;
        self.db.put_cf(&cf, wallet.owner.as_str().as_bytes(), value)?;
        Ok(())
    }

    /// Stage a wallet row into a batch
    pub fn stage_wallet(&self, batch: &mut WriteBatch, wallet: &Wallet) -> Result<()> {
        let cf = self.cf(CF_WALLETS)?;
        let value = bincode::serialize(wallet)?;
        batch.put_cf(&cf, wallet.owner.as_str().as_bytes(), value);
        Ok(())
    }

    // Entry operations

    /// Stage a ledger entry and its per-user indices into a batch
    pub fn stage_entry(&self, batch: &mut WriteBatch, entry: &LedgerEntry) -> Result<()> {
        let cf_entries = self.cf(CF_ENTRIES)?;
        let cf_indices = self.cf(CF_INDICES)?;

        let value = bincode::serialize(entry)?;
        batch.put_cf(&cf_entries, entry.id.to_be_bytes(), value);

        for user in [entry.from.as_ref(), entry.to.as_ref()].into_iter().flatten() {
            batch.put_cf(&cf_indices, Self::entry_index_key(user, entry.id), []);
        }

        Ok(())
    }

    /// Commit a staged batch atomically
    pub fn commit(&self, batch: WriteBatch) -> Result<()> {
        self.db.write(batch)?;
        Ok(())
    }

    /// Append a single entry (telemetry path, no wallet rows)
    pub fn append_entry(&self, entry: &LedgerEntry) -> Result<()> {
        let mut batch = WriteBatch::default();
        self.stage_entry(&mut batch, entry)?;
        self.commit(batch)?;

        tracing::debug!(entry_id = entry.id, kind = %entry.kind, status = %entry.status, "entry appended");
        Ok(())
    }

    /// Get entry by id
    pub fn get_entry(&self, id: u64) -> Result<Option<LedgerEntry>> {
        let cf = self.cf(CF_ENTRIES)?;

        match self.db.get_cf(&cf, id.to_be_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// All entries touching `user`, ascending by id
    pub fn entries_for(&self, user: &UserId) -> Result<Vec<LedgerEntry>> {
        let cf_indices = self.cf(CF_INDICES)?;

        let mut prefix = user.as_str().as_bytes().to_vec();
        prefix.push(SEP);

        let iter = self.db.iterator_cf(
            &cf_indices,
            IteratorMode::From(&prefix, Direction::Forward),
        );

        let mut entries = Vec::new();
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(&prefix) {
                break;
            }

            // Only exact matches: another user id sharing the prefix leaves
            // more than 8 trailing bytes.
            let rest = &key[prefix.len()..];
            if rest.len() != 8 {
                continue;
            }

            let id = u64::from_be_bytes(rest.try_into().expect("checked length"));
            if let Some(entry) = self.get_entry(id)? {
                entries.push(entry);
            }
        }

        Ok(entries)
    }

    // Request operations

    /// Write a money request and its incoming-index row
    pub fn put_request(&self, request: &MoneyRequest) -> Result<()> {
        let cf_requests = self.cf(CF_REQUESTS)?;
        let cf_indices = self.cf(CF_INDICES)?;

        let mut batch = WriteBatch::default();
        let value = bincode::serialize(request)?;
        batch.put_cf(&cf_requests, request.id.as_bytes(), value);
        batch.put_cf(
            &cf_indices,
            Self::request_index_key(&request.to_user, request.id),
            [],
        );

        self.commit(batch)
    }

    /// Get request by id
    pub fn get_request(&self, id: Uuid) -> Result<Option<MoneyRequest>> {
        let cf = self.cf(CF_REQUESTS)?;

        match self.db.get_cf(&cf, id.as_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// All requests addressed to `user`
    pub fn requests_for(&self, user: &UserId) -> Result<Vec<MoneyRequest>> {
        let cf_indices = self.cf(CF_INDICES)?;

        let mut prefix = user.as_str().as_bytes().to_vec();
        prefix.push(SEP);

        let iter = self.db.iterator_cf(
            &cf_indices,
            IteratorMode::From(&prefix, Direction::Forward),
        );

        let mut requests = Vec::new();
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(&prefix) {
                break;
            }

            let rest = &key[prefix.len()..];
            if rest.len() != 16 {
                continue;
            }

            let id = Uuid::from_bytes(rest.try_into().expect("checked length"));
            if let Some(request) = self.get_request(id)? {
                requests.push(request);
            }
        }

        Ok(requests)
    }

    // Index key helpers

    fn entry_index_key(user: &UserId, entry_id: u64) -> Vec<u8> {
        let mut key = user.as_str().as_bytes().to_vec();
        key.push(SEP);
        key.extend_from_slice(&entry_id.to_be_bytes());
        key
    }

    fn request_index_key(user: &UserId, request_id: Uuid) -> Vec<u8> {
        let mut key = user.as_str().as_bytes().to_vec();
        key.push(SEP);
        key.extend_from_slice(request_id.as_bytes());
        key
    }
}
