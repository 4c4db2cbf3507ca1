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

use uuid::Uuid;

use crate::Record;

/// Descriptive metadata for a beatmap: title, artist, mapper, and the
/// filenames of the audio/background assets it points at within its parent
/// set's file list. Stored as its own table since several difficulties in a
/// set can in principle share one metadata row.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BeatmapMetadata {
	pub id: Uuid,
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

impl Record for BeatmapMetadata {
	type Key = Uuid;

	const TABLE: &'static str = "beatmap_metadata";

	fn primary_key(&self) -> Self::Key {
		self.id
	}
}

/// The tunable gameplay parameters of one difficulty, independent of the
/// ruleset-specific hit object data that lives in the beatmap's own file.
#[derive(Copy, Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BeatmapDifficulty {
	pub id: Uuid,
	pub drain_rate: f32,
	pub circle_size: f32,
	pub overall_difficulty: f32,
	pub approach_rate: f32,
	pub slider_multiplier: f64,
	pub slider_tick_rate: f64,
}

impl Record for BeatmapDifficulty {
	type Key = Uuid;

	const TABLE: &'static str = "beatmap_difficulty";

	fn primary_key(&self) -> Self::Key {
		self.id
	}
}

/// Editor-only bookkeeping carried alongside a difficulty: bookmarks in the
/// timeline, the distance-spacing multiplier, beat divisor, grid size, and
/// timeline zoom the mapper last had the editor set to. None of this affects
/// gameplay; it is round-tripped purely so re-opening a beatmap in an editor
/// restores the view the mapper left it in.
#[derive(Clone, Debug, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct EditorInfo {
	pub bookmarks: Vec<i32>,
	pub distance_spacing: f64,
	pub beat_divisor: i32,
	pub grid_size: i32,
	pub timeline_zoom: f64,
}

/// One playable difficulty within a `BeatmapSet`. Holds a non-owning
/// back-reference to its parent set rather than being embedded in it, so a
/// beatmap can be looked up directly by id without loading the whole set.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Beatmap {
	pub id: Uuid,
	pub beatmap_set_id: Uuid,
	pub ruleset_id: Option<i32>,
	pub metadata_id: Uuid,
	pub difficulty_id: Uuid,
	pub online_id: Option<i64>,
	pub difficulty_name: String,
	pub file_hash: String,
	pub md5_hash: String,
	pub editor: EditorInfo,
}

impl Record for Beatmap {
	type Key = Uuid;

	const TABLE: &'static str = "beatmaps";

	fn primary_key(&self) -> Self::Key {
		self.id
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn beatmap_primary_key_is_its_own_id_not_the_sets() {
		let set_id = Uuid::new_v4();
		let own_id = Uuid::new_v4();
		let bm = Beatmap {
			id: own_id,
			beatmap_set_id: set_id,
			ruleset_id: Some(0),
			metadata_id: Uuid::new_v4(),
			difficulty_id: Uuid::new_v4(),
			online_id: None,
			difficulty_name: "Hard".into(),
			file_hash: "f".repeat(64),
			md5_hash: "d".repeat(32),
			editor: EditorInfo::default(),
		};
		assert_eq!(bm.primary_key(), own_id);
		assert_ne!(bm.primary_key(), set_id);
	}
}
