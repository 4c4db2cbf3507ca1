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

/// Online ranking status, carried through from the online metadata when
/// present. The store never interprets this beyond storing and returning it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BeatmapSetStatus {
	LocallyModified,
	Graveyard,
	Wip,
	Pending,
	Ranked,
	Approved,
	Qualified,
	Loved,
}

/// A filename-to-blob mapping within a set, e.g. `"bg.jpg" -> <hash>`.
/// Embedded directly in its owning `BeatmapSet` rather than its own table:
/// it has no identity of its own outside that set's file list.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NamedFileUsage {
	pub filename: String,
	pub file_hash: String,
}

impl NamedFileUsage {
	pub fn new(filename: impl Into<String>, file_hash: impl Into<String>) -> Self {
		NamedFileUsage { filename: filename.into(), file_hash: file_hash.into() }
	}
}

/// A downloaded or locally-authored beatmap set: a collection of files plus
/// an ordered list of the difficulties (`Beatmap`s) built from them.
///
/// Beatmaps are referenced by id rather than embedded, so a single beatmap
/// can be loaded, matched, or updated without materializing every difficulty
/// in the set; `assetdb-session` resolves `beatmap_ids` against the
/// `beatmaps` table on demand.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BeatmapSet {
	pub id: Uuid,
	pub online_id: Option<i64>,
	pub hash: String,
	pub beatmap_ids: Vec<Uuid>,
	pub files: Vec<NamedFileUsage>,
	pub status: BeatmapSetStatus,
	pub date_added: chrono::DateTime<chrono::Utc>,
	pub protected: bool,
	pub delete_pending: bool,
}

/// Counts how many `NamedFileUsage`s across `sets` point at `file_hash` —
/// the `usages`/`usage_count` back-reference view §3 describes for `File`,
/// computed rather than stored since it is derived purely from the sets'
/// own file lists.
pub fn file_usage_count(sets: &[BeatmapSet], file_hash: &str) -> usize {
	sets.iter().flat_map(|s| &s.files).filter(|u| u.file_hash == file_hash).count()
}

impl Record for BeatmapSet {
	type Key = Uuid;

	const TABLE: &'static str = "beatmap_sets";

	fn primary_key(&self) -> Self::Key {
		self.id
	}
}
