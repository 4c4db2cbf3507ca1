// Copyright 2015-2018 Parity Technologies (UK) Ltd.
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

//! An in-memory [`Engine`], analogous to `kvdb-memorydb`. Intended for tests
//! that want to exercise the session manager and schema layer without paying
//! for a real RocksDB directory; not particularly optimized, and `restore`
//! is unsupported since there is no backing directory to swap.

use std::collections::{BTreeMap, HashMap};

use assetdb_engine::{DBOp, DBTransaction, Engine, KeyValuePair};
use assetdb_error::{Error, Result};
use parking_lot::RwLock;

/// An in-memory, column-family-aware key-value store.
#[derive(Default)]
pub struct MemoryEngine {
	columns: RwLock<HashMap<String, BTreeMap<Vec<u8>, Vec<u8>>>>,
}

/// Creates an in-memory engine with the given column families pre-declared.
pub fn create(columns: impl IntoIterator<Item = impl Into<String>>) -> MemoryEngine {
	let mut cols = HashMap::new();
	for name in columns {
		cols.insert(name.into(), BTreeMap::new());
	}
	MemoryEngine { columns: RwLock::new(cols) }
}

impl Engine for MemoryEngine {
	fn write(&self, tr: DBTransaction) -> Result<()> {
		let mut columns = self.columns.write();
		for op in tr.into_ops() {
			match op {
				DBOp::Put { col, key, value } => {
					let table = columns
						.get_mut(&col)
						.ok_or_else(|| Error::StorageUnavailable(format!("no such column family: {col}")))?;
					table.insert(key, value);
				}
				DBOp::Delete { col, key } => {
					let table = columns
						.get_mut(&col)
						.ok_or_else(|| Error::StorageUnavailable(format!("no such column family: {col}")))?;
					table.remove(&key);
				}
			}
		}
		Ok(())
	}

	fn get(&self, col: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
		let columns = self.columns.read();
		match columns.get(col) {
			Some(table) => Ok(table.get(key).cloned()),
			None => Err(Error::StorageUnavailable(format!("no such column family: {col}"))),
		}
	}

	fn iter(&self, col: &str) -> Result<Vec<KeyValuePair>> {
		let columns = self.columns.read();
		match columns.get(col) {
			Some(table) => Ok(table
				.iter()
				.map(|(k, v)| (k.clone().into_boxed_slice(), v.clone().into_boxed_slice()))
				.collect()),
			None => Err(Error::StorageUnavailable(format!("no such column family: {col}"))),
		}
	}

	fn restore(&self, _new_path: &str) -> Result<()> {
		Err(Error::StorageUnavailable("in-memory engine has no directory to restore into".into()))
	}

	fn compact(&self) -> Result<()> {
		Ok(())
	}

	fn close(&self) {
		self.columns.write().clear();
	}
}
