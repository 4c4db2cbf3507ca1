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

use serde::{de::DeserializeOwned, Serialize};

/// A key type that can be encoded to bytes for use inside a column family.
/// The encoding must be injective: distinct keys must never collide.
pub trait PrimaryKey: Clone + Eq + std::hash::Hash + Send + Sync {
	fn encode(&self) -> Vec<u8>;
}

impl PrimaryKey for uuid::Uuid {
	fn encode(&self) -> Vec<u8> {
		self.as_bytes().to_vec()
	}
}

impl PrimaryKey for String {
	fn encode(&self) -> Vec<u8> {
		self.as_bytes().to_vec()
	}
}

/// The primary key of a [`crate::Ruleset`]: an optional online id. `None`
/// encodes distinctly from `Some(0)` so the two never collide in the column
/// family.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, serde::Serialize, serde::Deserialize)]
pub struct RulesetId(pub Option<i32>);

impl PrimaryKey for RulesetId {
	fn encode(&self) -> Vec<u8> {
		match self.0 {
			None => vec![0u8],
			Some(id) => {
				let mut buf = Vec::with_capacity(5);
				buf.push(1u8);
				buf.extend_from_slice(&id.to_be_bytes());
				buf
			}
		}
	}
}

/// A typed record stored in one column family, addressed by a [`PrimaryKey`].
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
	/// The record's primary key type.
	type Key: PrimaryKey;

	/// The column family this record type lives in.
	const TABLE: &'static str;

	/// Extracts this record's primary key.
	fn primary_key(&self) -> Self::Key;
}
