// Copyright 2015-2019 Parity Technologies (UK) Ltd.
// This file is part of Parity.

// Parity is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// Parity is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with Parity.  If not, see <http://www.gnu.org/licenses/>.

//! The raw storage engine underneath the asset store's session manager.
//!
//! This is a column-family key-value database in the shape of `kvdb-rocksdb`:
//! a single `rocksdb::DB` behind an `RwLock<Option<..>>` so the handle can be
//! dropped and reopened in place (used by [`Database::restore`] to implement
//! an atomic directory swap), corruption-triggered repair on open, and a
//! `DatabaseConfig`/`CompactionProfile` pair mirroring the tuning knobs
//! `kvdb-rocksdb` exposes. Unlike `kvdb-rocksdb` there is no buffered-write
//! overlay: every [`Database::write`] commits synchronously, because the
//! session manager above this layer already serializes writers and needs a
//! transaction to either be fully visible or fully absent, not partially
//! flushed.

mod iter;

use std::{cmp, fs, io, path::Path, sync::Arc};

use parking_lot::RwLock;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, Options, WriteBatch, DB};

use assetdb_error::{Error, Result};
use fs_swap::{swap, swap_nonatomic};
use log::{debug, warn};

pub use iter::KeyValuePair;

const KB: usize = 1024;
const MB: usize = 1024 * KB;

/// Compaction profile for the database settings.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct CompactionProfile {
	/// L0-L1 target file size.
	pub initial_file_size: u64,
	/// Block size.
	pub block_size: usize,
}

impl Default for CompactionProfile {
	fn default() -> CompactionProfile {
		CompactionProfile::ssd()
	}
}

impl CompactionProfile {
	/// Default profile suitable for SSD storage; an asset library is a local,
	/// single-user workload and does not try to auto-detect rotational media.
	pub fn ssd() -> CompactionProfile {
		CompactionProfile { initial_file_size: 64 * MB as u64, block_size: 16 * KB }
	}
}

/// Database configuration.
#[derive(Clone)]
pub struct DatabaseConfig {
	/// Max number of open files.
	pub max_open_files: i32,
	/// Per-database memory budget, in MiB.
	pub memory_budget_mb: usize,
	/// Compaction profile.
	pub compaction: CompactionProfile,
	/// Column family names, in a stable order. Index 0 is reserved for
	/// store-internal metadata (schema version and the like).
	pub columns: Vec<String>,
}

impl DatabaseConfig {
	pub fn with_columns(columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
		Self { columns: columns.into_iter().map(Into::into).collect(), ..Default::default() }
	}
}

impl Default for DatabaseConfig {
	fn default() -> DatabaseConfig {
		DatabaseConfig {
			max_open_files: 512,
			memory_budget_mb: 128,
			compaction: CompactionProfile::default(),
			columns: Vec::new(),
		}
	}
}

fn other_io_err<E: Into<Box<dyn std::error::Error + Send + Sync>>>(e: E) -> io::Error {
	io::Error::new(io::ErrorKind::Other, e)
}

fn is_corrupted(err: &rocksdb::Error) -> bool {
	err.as_ref().starts_with("Corruption:")
		|| err.as_ref().starts_with("Invalid argument: You have to open all column families")
}

fn generate_options(config: &DatabaseConfig) -> Options {
	let mut opts = Options::default();
	let budget = config.memory_budget_mb * MB;
	opts.set_db_write_buffer_size(budget / 2);
	opts.set_use_fsync(false);
	opts.create_if_missing(true);
	opts.create_missing_column_families(true);
	opts.set_max_open_files(config.max_open_files);
	opts.set_bytes_per_sync(MB as u64);
	opts.set_keep_log_file_num(1);
	opts.increase_parallelism(cmp::max(1, num_cpus::get() as i32 / 2));
	opts
}

fn column_config(config: &DatabaseConfig) -> Options {
	let mut opts = Options::default();
	opts.set_level_compaction_dynamic_level_bytes(true);
	opts.optimize_level_style_compaction(config.memory_budget_mb * MB);
	opts.set_target_file_size_base(config.compaction.initial_file_size);
	opts
}

struct DbHandle {
	db: DB,
	column_names: Vec<String>,
}

impl DbHandle {
	fn cf(&self, name: &str) -> Result<&ColumnFamily> {
		self.db.cf_handle(name).ok_or_else(|| {
			Error::StorageUnavailable(format!("no such column family: {name}"))
		})
	}
}

/// A write batch, built up with [`Database::transaction`] and applied atomically
/// with [`Database::write`].
#[derive(Default)]
pub struct DBTransaction {
	ops: Vec<DBOp>,
}

/// A single put/delete recorded in a [`DBTransaction`].
pub enum DBOp {
	Put { col: String, key: Vec<u8>, value: Vec<u8> },
	Delete { col: String, key: Vec<u8> },
}

impl DBTransaction {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn put(&mut self, col: &str, key: &[u8], value: &[u8]) {
		self.ops.push(DBOp::Put { col: col.to_owned(), key: key.to_owned(), value: value.to_owned() });
	}

	pub fn delete(&mut self, col: &str, key: &[u8]) {
		self.ops.push(DBOp::Delete { col: col.to_owned(), key: key.to_owned() });
	}

	pub fn is_empty(&self) -> bool {
		self.ops.is_empty()
	}

	/// Consumes the transaction, yielding its recorded operations in order.
	/// Used by alternate `Engine` implementations such as the in-memory one.
	pub fn into_ops(self) -> Vec<DBOp> {
		self.ops
	}
}

/// The storage operations the session manager needs from an engine. `Database`
/// (RocksDB-backed) is the production implementation; `assetdb-engine-memory`
/// provides an in-memory one for fast unit tests.
pub trait Engine: Send + Sync {
	fn transaction(&self) -> DBTransaction {
		DBTransaction::new()
	}
	fn write(&self, tr: DBTransaction) -> Result<()>;
	fn get(&self, col: &str, key: &[u8]) -> Result<Option<Vec<u8>>>;
	fn iter(&self, col: &str) -> Result<Vec<KeyValuePair>>;
	fn restore(&self, new_path: &str) -> Result<()>;
	fn compact(&self) -> Result<()>;
	fn close(&self);
}

impl Engine for Database {
	fn write(&self, tr: DBTransaction) -> Result<()> {
		Database::write(self, tr)
	}
	fn get(&self, col: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
		Database::get(self, col, key)
	}
	fn iter(&self, col: &str) -> Result<Vec<KeyValuePair>> {
		Database::iter(self, col)
	}
	fn restore(&self, new_path: &str) -> Result<()> {
		Database::restore(self, new_path)
	}
	fn compact(&self) -> Result<()> {
		Database::compact(self)
	}
	fn close(&self) {
		Database::close(self)
	}
}

/// The embedded column-family database.
pub struct Database {
	inner: RwLock<Option<DbHandle>>,
	config: DatabaseConfig,
	path: String,
}

const CORRUPTION_MARKER: &str = "CORRUPTED";

impl Database {
	/// Opens (creating if absent) the database at `path` with the given configuration.
	pub fn open(config: &DatabaseConfig, path: &str) -> Result<Database> {
		let opts = generate_options(config);

		let corruption_marker = Path::new(path).join(CORRUPTION_MARKER);
		if corruption_marker.exists() {
			warn!("asset database at {path} was marked corrupted, attempting repair");
			DB::repair(&opts, path).map_err(|e| Error::StorageUnavailable(e.to_string()))?;
			let _ = fs::remove_file(&corruption_marker);
		}

		let cf_opts = column_config(config);
		let cf_descriptors: Vec<_> =
			config.columns.iter().map(|name| ColumnFamilyDescriptor::new(name, cf_opts.clone())).collect();

		let db = match DB::open_cf_descriptors(&opts, path, cf_descriptors) {
			Ok(db) => db,
			Err(ref e) if is_corrupted(e) => {
				warn!("asset database at {path} corrupted: {e}, attempting repair");
				DB::repair(&opts, path).map_err(|e| Error::StorageUnavailable(e.to_string()))?;
				let cf_descriptors: Vec<_> =
					config.columns.iter().map(|name| ColumnFamilyDescriptor::new(name, cf_opts.clone())).collect();
				DB::open_cf_descriptors(&opts, path, cf_descriptors)
					.map_err(|e| Error::StorageUnavailable(e.to_string()))?
			}
			Err(e) => return Err(Error::StorageUnavailable(e.to_string())),
		};

		Ok(Database {
			inner: RwLock::new(Some(DbHandle { db, column_names: config.columns.clone() })),
			config: config.clone(),
			path: path.to_owned(),
		})
	}

	pub fn transaction(&self) -> DBTransaction {
		DBTransaction::new()
	}

	/// Commits a transaction to the database as a single atomic write batch.
	pub fn write(&self, tr: DBTransaction) -> Result<()> {
		let guard = self.inner.read();
		let handle = guard.as_ref().ok_or(Error::Closed)?;
		let mut batch = WriteBatch::default();
		for op in tr.into_ops() {
			match op {
				DBOp::Put { col, key, value } => batch.put_cf(handle.cf(&col)?, key, value),
				DBOp::Delete { col, key } => batch.delete_cf(handle.cf(&col)?, key),
			}
		}
		if let Err(e) = handle.db.write(batch) {
			if is_corrupted(&e) {
				warn!("asset database corrupted while writing: {e}, repair will run on next open");
				let _ = fs::File::create(Path::new(&self.path).join(CORRUPTION_MARKER));
			}
			return Err(Error::StorageUnavailable(e.to_string()));
		}
		Ok(())
	}

	pub fn get(&self, col: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
		let guard = self.inner.read();
		let handle = guard.as_ref().ok_or(Error::Closed)?;
		handle
			.db
			.get_cf(handle.cf(col)?, key)
			.map_err(|e| Error::StorageUnavailable(e.to_string()))
	}

	/// Iterates over every key/value pair in a column family, in key order.
	pub fn iter(&self, col: &str) -> Result<Vec<KeyValuePair>> {
		let guard = self.inner.read();
		let handle = guard.as_ref().ok_or(Error::Closed)?;
		let cf = handle.cf(col)?;
		let items = handle
			.db
			.iterator_cf(cf, rocksdb::IteratorMode::Start)
			.map(|item| item.map_err(|e| Error::StorageUnavailable(e.to_string())))
			.collect::<Result<Vec<_>>>()?;
		Ok(items.into_iter().map(|(k, v)| (k.into_vec().into_boxed_slice(), v.into_vec().into_boxed_slice())).collect())
	}

	/// Closes the underlying handle without dropping the `Database` itself.
	/// Used by the session manager's quiesce gate before a restore/reset.
	pub fn close(&self) {
		*self.inner.write() = None;
	}

	/// Reopens a previously [`close`](Self::close)d database in place.
	pub fn reopen(&self) -> Result<()> {
		let reopened = Database::open(&self.config, &self.path)?;
		*self.inner.write() = reopened.inner.write().take();
		Ok(())
	}

	/// Atomically swaps in the database directory at `new_path`, replacing the
	/// current one. Must only be called while no other session holds a handle
	/// (the session manager enforces this via `block_all_operations`).
	pub fn restore(&self, new_path: &str) -> Result<()> {
		self.close();

		match swap(new_path, &self.path) {
			Ok(_) => {
				let _ = fs::remove_dir_all(new_path);
			}
			Err(err) => {
				debug!("atomic directory swap failed: {err}, falling back to non-atomic swap");
				match swap_nonatomic(new_path, &self.path) {
					Ok(_) => {
						let _ = fs::remove_dir_all(new_path);
					}
					Err(err) => {
						warn!("failed to swap database directories: {err:?}");
						return Err(Error::StorageUnavailable("directory swap failed".into()));
					}
				}
			}
		}

		self.reopen()
	}

	/// Compacts every column family. Only safe to call while quiesced.
	pub fn compact(&self) -> Result<()> {
		let guard = self.inner.read();
		let handle = guard.as_ref().ok_or(Error::Closed)?;
		for name in &handle.column_names {
			let cf = handle.cf(name)?;
			handle.db.compact_range_cf(cf, None::<&[u8]>, None::<&[u8]>);
		}
		Ok(())
	}

	pub fn path(&self) -> &str {
		&self.path
	}
}

impl Drop for Database {
	fn drop(&mut self) {
		self.close();
	}
}

/// Opens an engine in a fresh temporary directory, wrapped so callers don't
/// leak the `Arc` wiring the session manager expects.
pub fn open_default(path: &str, columns: impl IntoIterator<Item = impl Into<String>>) -> Result<Arc<Database>> {
	let config = DatabaseConfig::with_columns(columns);
	Database::open(&config, path).map(Arc::new)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn test_db() -> (tempfile::TempDir, Arc<Database>) {
		let dir = tempfile::tempdir().unwrap();
		let db = open_default(dir.path().to_str().unwrap(), ["col_a", "col_b"]).unwrap();
		(dir, db)
	}

	#[test]
	fn put_get_delete_roundtrip() {
		let (_dir, db) = test_db();
		let mut tr = db.transaction();
		tr.put("col_a", b"k1", b"v1");
		db.write(tr).unwrap();
		assert_eq!(db.get("col_a", b"k1").unwrap().as_deref(), Some(&b"v1"[..]));

		let mut tr = db.transaction();
		tr.delete("col_a", b"k1");
		db.write(tr).unwrap();
		assert_eq!(db.get("col_a", b"k1").unwrap(), None);
	}

	#[test]
	fn columns_are_isolated() {
		let (_dir, db) = test_db();
		let mut tr = db.transaction();
		tr.put("col_a", b"k", b"in-a");
		tr.put("col_b", b"k", b"in-b");
		db.write(tr).unwrap();
		assert_eq!(db.get("col_a", b"k").unwrap().as_deref(), Some(&b"in-a"[..]));
		assert_eq!(db.get("col_b", b"k").unwrap().as_deref(), Some(&b"in-b"[..]));
	}

	#[test]
	fn iter_returns_all_pairs_in_key_order() {
		let (_dir, db) = test_db();
		let mut tr = db.transaction();
		tr.put("col_a", b"b", b"2");
		tr.put("col_a", b"a", b"1");
		db.write(tr).unwrap();
		let items = db.iter("col_a").unwrap();
		assert_eq!(items.len(), 2);
		assert_eq!(&*items[0].0, b"a");
		assert_eq!(&*items[1].0, b"b");
	}

	#[test]
	fn restore_swaps_in_another_directory() {
		let (_dir, db) = test_db();
		let mut tr = db.transaction();
		tr.put("col_a", b"k", b"original");
		db.write(tr).unwrap();

		let replacement_dir = tempfile::tempdir().unwrap();
		let replacement = open_default(replacement_dir.path().to_str().unwrap(), ["col_a", "col_b"]).unwrap();
		let mut tr = replacement.transaction();
		tr.put("col_a", b"k", b"replaced");
		replacement.write(tr).unwrap();
		drop(replacement);

		db.restore(replacement_dir.path().to_str().unwrap()).unwrap();
		assert_eq!(db.get("col_a", b"k").unwrap().as_deref(), Some(&b"replaced"[..]));
	}

	#[test]
	fn get_after_close_fails_with_closed() {
		let (_dir, db) = test_db();
		db.close();
		let err = db.get("col_a", b"k").unwrap_err();
		assert_eq!(err.kind(), assetdb_error::ErrorKind::Closed);
	}
}
