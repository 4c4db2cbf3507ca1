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

use assetdb_error::Result;
use assetdb_schema::{BeatmapDifficulty, EditorInfo};

/// Everything extractable from one decoded hashable file: metadata,
/// difficulty, online id, and ruleset id. Produced by [`BeatmapDecoder`].
pub struct DecodedBeatmap {
	pub online_id: Option<i64>,
	pub ruleset_online_id: Option<i32>,
	pub difficulty_name: String,
	pub metadata: DecodedMetadata,
	pub difficulty: BeatmapDifficulty,
	pub editor: EditorInfo,
}

/// The metadata fields read out of a single hashable file. A beatmap set
/// whose difficulties share authorship collapses these into one
/// `BeatmapMetadata` row; this core does not attempt that deduplication,
/// each difficulty gets its own metadata row.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedMetadata {
	pub title: String,
	pub title_unicode: Option<String>,
	pub artist: String,
	pub artist_unicode: Option<String>,
	pub author: String,
	pub source: String,
	pub tags: String,
	pub preview_time: i32,
	pub audio_file: Option<String>,
	pub background_file: Option<String>,
}

/// Decodes a hashable file into an in-memory beatmap object. Consumed, not
/// provided: hosts supply one implementation per ruleset/file-format.
pub trait BeatmapDecoder: Send + Sync {
	/// Decodes the full contents of a hashable file.
	fn decode(&self, bytes: &[u8]) -> Result<DecodedBeatmap>;

	/// Extracts the set's online id from a single representative file,
	/// without fully decoding it. Used by stage 1 (`create_model`).
	fn online_set_id(&self, bytes: &[u8]) -> Result<Option<i64>>;
}
