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

use crate::Record;

/// A single content-addressed blob tracked by the store. The primary key is
/// the lowercase hex SHA-256 hash of the blob's contents, which doubles as
/// the path-sharding key the blob store derives the on-disk location from.
///
/// `usages`/`usage_count` deliberately have no field here: they are a
/// computed view over every `BeatmapSet`'s file references, not state this
/// record carries or that mutates independently of it.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct File {
	pub hash: String,
	pub storage_path: String,
}

impl File {
	pub fn new(hash: impl Into<String>, storage_path: impl Into<String>) -> Self {
		File { hash: hash.into(), storage_path: storage_path.into() }
	}
}

impl Record for File {
	type Key = String;

	const TABLE: &'static str = "files";

	fn primary_key(&self) -> Self::Key {
		self.hash.clone()
	}
}
