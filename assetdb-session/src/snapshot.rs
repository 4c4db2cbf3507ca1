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

use std::collections::{BTreeMap, HashMap};

use assetdb_engine::Engine;
use assetdb_error::Result;
use assetdb_schema::{PrimaryKey, Record};

/// A point-in-time copy of every record table, keyed by table name and then
/// by the record's encoded primary key. `BTreeMap` rather than `HashMap` for
/// the inner table so that `all::<T>()` iterates in a stable, sorted order
/// regardless of the underlying engine's own iteration order.
#[derive(Default, Clone)]
pub(crate) struct Snapshot {
	tables: HashMap<String, BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl Snapshot {
	pub(crate) fn load(engine: &dyn Engine, tables: &[&'static str]) -> Result<Self> {
		let mut map = HashMap::new();
		for &table in tables {
			let pairs = engine.iter(table)?;
			map.insert(table.to_owned(), pairs.into_iter().map(|(k, v)| (k.into_vec(), v.into_vec())).collect());
		}
		Ok(Snapshot { tables: map })
	}

	pub(crate) fn get(&self, table: &str, key: &[u8]) -> Option<Vec<u8>> {
		self.tables.get(table).and_then(|t| t.get(key)).cloned()
	}

	pub(crate) fn all(&self, table: &str) -> Vec<(Vec<u8>, Vec<u8>)> {
		self.tables.get(table).map(|t| t.iter().map(|(k, v)| (k.clone(), v.clone())).collect()).unwrap_or_default()
	}

	pub(crate) fn decode_all<T: Record>(&self) -> Result<Vec<T>> {
		self.all(T::TABLE).into_iter().map(|(_, v)| assetdb_schema::decode_value(&v)).collect()
	}

	pub(crate) fn decode_one<T: Record>(&self, key: &T::Key) -> Result<Option<T>> {
		match self.get(T::TABLE, &key.encode()) {
			Some(bytes) => Ok(Some(assetdb_schema::decode_value(&bytes)?)),
			None => Ok(None),
		}
	}

	/// Applies a transaction's pending puts/deletes in place, without
	/// round-tripping through the engine. Used to let the update session see
	/// its own commits immediately.
	pub(crate) fn apply(&mut self, pending: &HashMap<String, BTreeMap<Vec<u8>, Option<Vec<u8>>>>) {
		for (table, ops) in pending {
			let entry = self.tables.entry(table.clone()).or_default();
			for (key, value) in ops {
				match value {
					Some(bytes) => {
						entry.insert(key.clone(), bytes.clone());
					}
					None => {
						entry.remove(key);
					}
				}
			}
		}
	}
}
