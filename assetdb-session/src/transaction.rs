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

use std::{
	collections::{BTreeMap, HashMap},
	sync::Arc,
	thread::ThreadId,
};

use assetdb_error::{Error, Result};
use assetdb_schema::{PrimaryKey, Record};

use crate::{
	live_handle::LiveHandle,
	manager::{ActiveUsageGuard, SessionManager, WriterGuard},
	snapshot::Snapshot,
};

type PendingOps = HashMap<String, BTreeMap<Vec<u8>, Option<Vec<u8>>>>;

/// A scoped unit of writes. Reads within the transaction see its own
/// uncommitted puts and deletes layered over the session's base view.
/// Consuming [`commit`](Self::commit) applies the writes atomically; dropping
/// a `Transaction` without committing rolls it back (a no-op, since nothing
/// was ever sent to the engine).
pub struct Transaction {
	manager: Arc<SessionManager>,
	base: Snapshot,
	pending: PendingOps,
	_usage: ActiveUsageGuard,
	_writer: WriterGuard,
	origin: Option<ThreadId>,
	committed: bool,
}

impl Transaction {
	pub(crate) fn new(
		manager: Arc<SessionManager>,
		base: Snapshot,
		usage: ActiveUsageGuard,
		writer: WriterGuard,
		origin: Option<ThreadId>,
	) -> Self {
		Transaction { manager, base, pending: HashMap::new(), _usage: usage, _writer: writer, origin, committed: false }
	}

	fn find_raw(&self, table: &str, key: &[u8]) -> Option<Vec<u8>> {
		match self.pending.get(table).and_then(|t| t.get(key)) {
			Some(Some(bytes)) => Some(bytes.clone()),
			Some(None) => None,
			None => self.base.get(table, key),
		}
	}

	pub fn all<T: Record>(&self) -> Result<Vec<T>> {
		let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = self.base.all(T::TABLE).into_iter().collect();
		if let Some(ops) = self.pending.get(T::TABLE) {
			for (key, value) in ops {
				match value {
					Some(bytes) => {
						merged.insert(key.clone(), bytes.clone());
					}
					None => {
						merged.remove(key);
					}
				}
			}
		}
		merged.values().map(|bytes| assetdb_schema::decode_value(bytes)).collect()
	}

	pub fn find<T: Record>(&self, key: &T::Key) -> Result<Option<T>> {
		match self.find_raw(T::TABLE, &key.encode()) {
			Some(bytes) => Ok(Some(assetdb_schema::decode_value(&bytes)?)),
			None => Ok(None),
		}
	}

	/// Inserts or upserts `record` by its primary key. Fails with
	/// `duplicate_primary_key` when `update_existing` is false and the key
	/// is already present (either committed, or pending within this
	/// transaction).
	pub fn add<T: Record>(&mut self, record: T, update_existing: bool) -> Result<()> {
		let key = record.primary_key().encode();
		if !update_existing && self.find_raw(T::TABLE, &key).is_some() {
			return Err(Error::DuplicatePrimaryKey);
		}
		let value = assetdb_schema::encode_value(&record)?;
		self.pending.entry(T::TABLE.to_owned()).or_default().insert(key, Some(value));
		Ok(())
	}

	/// Stages the deletion of the record with the given primary key.
	pub fn remove<T: Record>(&mut self, key: &T::Key) -> Result<()> {
		self.pending.entry(T::TABLE.to_owned()).or_default().insert(key.encode(), None);
		Ok(())
	}

	/// Mints a thread-portable handle for the record with this key.
	pub fn handle<T: Record>(&self, key: T::Key) -> LiveHandle<T> {
		LiveHandle::new(key, &self.manager)
	}

	/// Applies every staged put/delete to the engine as a single atomic
	/// write. The manager's write lock is held until this (or `Drop`)
	/// releases it.
	pub fn commit(mut self) -> Result<()> {
		let mut tr = self.manager.engine.transaction();
		for (table, ops) in &self.pending {
			for (key, value) in ops {
				match value {
					Some(bytes) => tr.put(table, key, bytes),
					None => tr.delete(table, key),
				}
			}
		}
		self.manager.engine.write(tr)?;
		self.manager.fold_into_update_snapshot(self.origin, &self.pending);
		self.committed = true;
		Ok(())
	}

	/// Explicitly discards every staged write. Equivalent to dropping the
	/// transaction, spelled out for callers that want to be explicit about
	/// intent at a call site.
	pub fn rollback(self) {
		drop(self)
	}
}

impl Drop for Transaction {
	fn drop(&mut self) {
		if !self.committed && !self.pending.is_empty() {
			log::debug!("transaction dropped without committing, {} table(s) touched, rolling back", self.pending.len());
		}
	}
}
