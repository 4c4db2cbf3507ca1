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

//! The object schema: typed records, their primary keys, and the column
//! family each record type lives in. This crate has no notion of sessions or
//! transactions — it only describes shapes and how they serialize, the way
//! `kvdb`'s `DBValue`/`DBOp` describe shapes without knowing about RocksDB.

mod beatmap;
mod beatmap_set;
mod file;
mod record;
mod ruleset;

pub use beatmap::{Beatmap, BeatmapDifficulty, BeatmapMetadata, EditorInfo};
pub use beatmap_set::{file_usage_count, BeatmapSet, BeatmapSetStatus, NamedFileUsage};
pub use file::File;
pub use record::{PrimaryKey, Record, RulesetId};
pub use ruleset::Ruleset;

/// Column family names, in the order the engine should open them. Index 0 is
/// reserved for store-internal metadata (schema version) and is not a
/// `Record` table at all.
pub const META_COLUMN: &str = "meta";

/// All record-table column families, handed to `assetdb_engine::DatabaseConfig`.
pub fn all_columns() -> Vec<&'static str> {
	vec![META_COLUMN, File::TABLE, Ruleset::TABLE, BeatmapMetadata::TABLE, BeatmapDifficulty::TABLE, Beatmap::TABLE, BeatmapSet::TABLE]
}

/// Key under [`META_COLUMN`] holding the current schema version, a big-endian `u32`.
pub const SCHEMA_VERSION_KEY: &[u8] = b"schema_version";

/// Serializes a record's value with the encoding shared by every table.
pub fn encode_value<T: serde::Serialize>(value: &T) -> assetdb_error::Result<Vec<u8>> {
	bincode::serialize(value).map_err(|e| assetdb_error::Error::StorageUnavailable(format!("encode failed: {e}")))
}

/// Deserializes a record's value with the encoding shared by every table.
pub fn decode_value<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> assetdb_error::Result<T> {
	bincode::deserialize(bytes).map_err(|e| assetdb_error::Error::StorageUnavailable(format!("decode failed: {e}")))
}
