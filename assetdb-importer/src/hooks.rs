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

use assetdb_error::Result;
use assetdb_filestore::FileStore;
use assetdb_schema::{Beatmap, NamedFileUsage};
use assetdb_session::Transaction;

use crate::archive::ArchiveReader;

/// The subclass-style hooks a single archive type (beatmaps, skins, replays,
/// ...) plugs into the pipeline. Only the beatmap implementation lives in
/// this crate; the trait itself is the extension point for the others, so
/// the pipeline needs no runtime polymorphism chain of its own.
pub trait ImportHooks: Send + Sync {
	/// File extensions (lowercase, with leading dot) whose content
	/// participates in the archive-level hash fingerprint.
	fn hashable_extensions(&self) -> &'static [&'static str];

	/// File extensions that mark an archive as this hook's kind of content
	/// at all. `create_model` fails with no model when none are present.
	fn recognized_extensions(&self) -> &'static [&'static str];

	/// Extracts the set's online id from a single representative entry,
	/// without fully decoding it. Returns `Ok(None)` for a set with no
	/// online presence, not an error.
	fn extract_online_set_id(&self, archive: &dyn ArchiveReader) -> Result<Option<i64>>;

	/// Reads each hashable file back out of `files` (the in-archive bytes
	/// were already consumed writing them to the store), decodes it, and
	/// builds the `Beatmap` records for `set_id`. Also stages the
	/// `BeatmapMetadata`/`BeatmapDifficulty` rows each beatmap references,
	/// directly on `tx`. Usages whose ruleset can't be resolved are skipped;
	/// usages sharing a hash with one already processed are collapsed.
	fn populate(&self, files: &FileStore, tx: &mut Transaction, set_id: Uuid, usages: &[NamedFileUsage]) -> Result<Vec<Beatmap>>;

	/// Stage 3's compatibility check for reusing a hash-matched existing set
	/// without even opening a write transaction. Default: at least one
	/// beatmap already has an online id, i.e. the set has been confirmed
	/// against the online catalogue before.
	fn can_skip_import(&self, existing_beatmaps: &[Beatmap]) -> bool {
		existing_beatmaps.iter().any(|b| b.online_id.is_some())
	}

	/// Stage 5's compatibility check for reusing a hash-matched existing set
	/// found only after populating. Default: the candidate's *hashable* file
	/// hashes, sorted, are identical to the existing set's (a non-hashable
	/// edit must not block reuse, since it never changed the hash that got
	/// them here in the first place), and the full, sorted filename lists
	/// match (so a rename still breaks identity even though it wouldn't
	/// change any hash).
	fn can_reuse_existing(&self, existing_usages: &[NamedFileUsage], new_usages: &[NamedFileUsage]) -> bool {
		let hashable = self.hashable_extensions();
		fn sorted_hashes<'a>(usages: &'a [NamedFileUsage], hashable: &[&str]) -> Vec<&'a str> {
			let mut v: Vec<&str> =
				usages.iter().filter(|u| has_extension(&u.filename, hashable)).map(|u| u.file_hash.as_str()).collect();
			v.sort_unstable();
			v
		}
		fn sorted_names(usages: &[NamedFileUsage]) -> Vec<&str> {
			let mut v: Vec<&str> = usages.iter().map(|u| u.filename.as_str()).collect();
			v.sort_unstable();
			v
		}
		sorted_hashes(existing_usages, hashable) == sorted_hashes(new_usages, hashable)
			&& sorted_names(existing_usages) == sorted_names(new_usages)
	}
}

/// Lowercase-suffix extension match, shared by the pipeline and its hooks.
pub(crate) fn has_extension(name: &str, extensions: &[&str]) -> bool {
	let lower = name.to_lowercase();
	extensions.iter().any(|ext| lower.ends_with(&ext.to_lowercase()))
}
