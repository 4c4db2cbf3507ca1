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

//! End-to-end coverage of the store's seed scenarios: an empty store, a
//! dedup'd import and re-import, blob cleanup with and without a live
//! reference, identity-preserving re-packaging, hashable-content identity
//! breaks, and a rolled-back failed import leaving no trace.

use std::{collections::HashMap, io::Cursor, sync::{Arc, Mutex}};

use assetdb::{AssetStore, StoreConfig};
use assetdb_error::Result;
use assetdb_importer::{
	ArchiveReader, BeatmapDecoder, CancellationToken, DecodedBeatmap, DecodedMetadata, ReadSeek,
};
use assetdb_schema::{Beatmap, BeatmapDifficulty, BeatmapSet, File};

struct FixtureArchive {
	name: String,
	entries: HashMap<String, Vec<u8>>,
}

impl FixtureArchive {
	fn new(name: &str, entries: impl IntoIterator<Item = (String, Vec<u8>)>) -> Self {
		FixtureArchive { name: name.to_owned(), entries: entries.into_iter().collect() }
	}
}

impl ArchiveReader for FixtureArchive {
	fn name(&self) -> &str {
		&self.name
	}

	fn filenames(&self) -> Vec<String> {
		let mut names: Vec<String> = self.entries.keys().cloned().collect();
		names.sort();
		names
	}

	fn get_stream(&self, name: &str) -> std::io::Result<Box<dyn ReadSeek>> {
		let bytes = self
			.entries
			.get(name)
			.cloned()
			.ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, name.to_owned()))?;
		Ok(Box::new(Cursor::new(bytes)))
	}
}

/// Decodes any `.osu`-shaped bytes into a fixed difficulty against ruleset 0
/// (osu!, one of the four built-in seeded rulesets). Bytes containing the
/// literal marker `FAIL` raise a populate error instead, for exercising
/// rollback.
struct FakeDecoder {
	seen: Mutex<HashMap<Vec<u8>, i64>>,
}

impl FakeDecoder {
	fn new() -> Arc<Self> {
		Arc::new(FakeDecoder { seen: Mutex::new(HashMap::new()) })
	}
}

impl BeatmapDecoder for FakeDecoder {
	fn decode(&self, bytes: &[u8]) -> Result<DecodedBeatmap> {
		if bytes.windows(4).any(|w| w == b"FAIL") {
			return Err(assetdb_error::Error::PopulateFailed("decoder refused poisoned content".into()));
		}
		let online_id = self.seen.lock().unwrap().get(bytes).copied();
		Ok(DecodedBeatmap {
			online_id,
			ruleset_online_id: Some(0),
			difficulty_name: "Normal".into(),
			metadata: DecodedMetadata {
				title: "Title".into(),
				title_unicode: None,
				artist: "Artist".into(),
				artist_unicode: None,
				author: "Author".into(),
				source: String::new(),
				tags: String::new(),
				preview_time: -1,
				audio_file: None,
				background_file: None,
			},
			difficulty: BeatmapDifficulty {
				id: uuid::Uuid::nil(),
				drain_rate: 5.0,
				circle_size: 4.0,
				overall_difficulty: 5.0,
				approach_rate: 5.0,
				slider_multiplier: 1.4,
				slider_tick_rate: 1.0,
			},
			editor: Default::default(),
		})
	}

	fn online_set_id(&self, _bytes: &[u8]) -> Result<Option<i64>> {
		Ok(None)
	}
}

fn open_store(dir: &tempfile::TempDir) -> Arc<AssetStore> {
	AssetStore::open(StoreConfig::new(dir.path()), FakeDecoder::new()).unwrap()
}

/// Builds an 18-hashable-file beatmap set, each with distinct content so
/// each yields its own `Beatmap`/`File`.
fn eighteen_file_archive(name: &str) -> FixtureArchive {
	let entries = (0..18).map(|i| (format!("diff-{i:02}.osu"), format!("osu file format v14\ndifficulty {i}").into_bytes()));
	FixtureArchive::new(name, entries)
}

fn usage_counts(files: &[File], sets: &[BeatmapSet]) -> HashMap<String, usize> {
	let mut counts: HashMap<String, usize> = files.iter().map(|f| (f.hash.clone(), 0)).collect();
	for set in sets {
		for usage in &set.files {
			*counts.entry(usage.file_hash.clone()).or_insert(0) += 1;
		}
	}
	counts
}

#[test]
fn s1_construct_empty() {
	let dir = tempfile::tempdir().unwrap();
	let store = open_store(&dir);
	let update = store.update_session().unwrap();
	update.refresh().unwrap();
	assert_eq!(update.all::<BeatmapSet>().unwrap().len(), 0);
}

#[test]
fn s2_import_count_dedup() {
	let dir = tempfile::tempdir().unwrap();
	let store = open_store(&dir);
	let archive = eighteen_file_archive("Set.osz");

	store.import(&archive, &CancellationToken::new()).unwrap().unwrap();

	let update = store.update_session().unwrap();
	update.refresh().unwrap();
	let sets = update.all::<BeatmapSet>().unwrap();
	let files = update.all::<File>().unwrap();
	assert_eq!(sets.len(), 1);
	let counts = usage_counts(&files, &sets);
	assert_eq!(counts.values().filter(|&&c| c == 1).count(), 18);

	store.import(&archive, &CancellationToken::new()).unwrap().unwrap();
	update.refresh().unwrap();
	let sets_again = update.all::<BeatmapSet>().unwrap();
	let files_again = update.all::<File>().unwrap();
	assert_eq!(sets_again.len(), 1);
	let counts_again = usage_counts(&files_again, &sets_again);
	assert_eq!(counts_again.values().filter(|&&c| c == 1).count(), 18);
}

#[test]
fn s3_cleanup_removes_unreferenced_blob() {
	let dir = tempfile::tempdir().unwrap();
	let store = open_store(&dir);

	let file = {
		let mut tx = store.write_session().unwrap();
		let file = store.files().add(&mut Cursor::new(vec![0u8, 1, 2, 3]), &mut tx).unwrap();
		tx.commit().unwrap();
		file
	};
	assert!(store.read_session().unwrap().find::<File>(&file.hash).unwrap().is_some());

	let report = store.cleanup_files().unwrap();
	assert_eq!(report.removed_records, 1);
	assert_eq!(report.removed_blobs, 1);
	assert!(store.read_session().unwrap().find::<File>(&file.hash).unwrap().is_none());
}

#[test]
fn s4_cleanup_preserves_referenced_blob() {
	let dir = tempfile::tempdir().unwrap();
	let store = open_store(&dir);
	let archive = FixtureArchive::new("One.osz", [("a.osu".to_owned(), b"osu file format v14\nkeep".to_vec())]);

	let handle = store.import(&archive, &CancellationToken::new()).unwrap().unwrap();
	let set_id = *handle.primary_key();

	let report = store.cleanup_files().unwrap();
	assert_eq!(report.removed_records, 0);

	let session = store.read_session().unwrap();
	let set = session.find::<BeatmapSet>(&set_id).unwrap().unwrap();
	for usage in &set.files {
		assert!(session.find::<File>(&usage.file_hash).unwrap().is_some());
	}
}

#[test]
fn s5_repackaging_keeps_identity_editing_hashable_breaks_it() {
	let dir = tempfile::tempdir().unwrap();
	let store = open_store(&dir);
	let original = FixtureArchive::new("Song.osz", [("a.osu".to_owned(), b"osu file format v14\nverse one".to_vec())]);
	let repackaged = FixtureArchive::new("Song (1).zip", [("a.osu".to_owned(), b"osu file format v14\nverse one".to_vec())]);
	let edited = FixtureArchive::new("Song.osz", [("a.osu".to_owned(), b"osu file format v14\nverse one changed".to_vec())]);

	let first = store.import(&original, &CancellationToken::new()).unwrap().unwrap();
	let second = store.import(&repackaged, &CancellationToken::new()).unwrap().unwrap();
	assert_eq!(first.primary_key(), second.primary_key());

	let third = store.import(&edited, &CancellationToken::new()).unwrap().unwrap();
	assert_ne!(first.primary_key(), third.primary_key());
}

#[test]
fn s6_rollback_on_populate_failure_leaves_no_trace() {
	let dir = tempfile::tempdir().unwrap();
	let store = open_store(&dir);
	let archive = eighteen_file_archive("Set.osz");
	store.import(&archive, &CancellationToken::new()).unwrap().unwrap();

	// Force the existing set's recorded hash out of alignment so the
	// early-skip and collision-resolution lookups in the next import both
	// miss, forcing it to fully populate before failing.
	{
		let mut tx = store.write_session().unwrap();
		let sets = tx.all::<BeatmapSet>().unwrap();
		let mut set = sets.into_iter().next().unwrap();
		set.hash = "f".repeat(64);
		tx.add(set, true).unwrap();
		tx.commit().unwrap();
	}

	let poisoned = FixtureArchive::new("Poisoned.osz", [("a.osu".to_owned(), b"osu file format v14\nFAIL".to_vec())]);
	let err = store.import(&poisoned, &CancellationToken::new()).unwrap_err();
	assert_eq!(err.kind(), assetdb_error::ErrorKind::PopulateFailed);

	let session = store.read_session().unwrap();
	assert_eq!(session.all::<BeatmapSet>().unwrap().len(), 1);
	assert_eq!(session.all::<Beatmap>().unwrap().len(), 18);
	let files = session.all::<File>().unwrap();
	let sets = session.all::<BeatmapSet>().unwrap();
	let counts = usage_counts(&files, &sets);
	assert_eq!(counts.values().filter(|&&c| c == 1).count(), 18);
}
