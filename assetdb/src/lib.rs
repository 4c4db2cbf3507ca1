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

//! The asset store, assembled: a [`SessionManager`] over the embedded
//! engine, a [`FileStore`] over the blob directory, and an [`ImportService`]
//! wired to both. This is the crate a host actually depends on; the other
//! `assetdb-*` crates are its layers, kept separate the way `kvdb-rocksdb`
//! sits on top of `kvdb` rather than folding it in.

use std::sync::Arc;

use assetdb_blobstore::BlobStore;
use assetdb_engine::DatabaseConfig;
use assetdb_error::{Error, Result};
use assetdb_filestore::{CleanupReport, FileStore};
use assetdb_importer::{
	ArchiveReader, BeatmapDecoder, BeatmapImportHooks, CancellationToken, EventSink, ImportHooks, ImportService,
};
use assetdb_schema::BeatmapSet;
use assetdb_session::{LiveHandle, QuiesceToken, Session, SessionManager, Transaction, UpdateSessionHandle};
use uuid::Uuid;

/// Tuning knobs for [`AssetStore::open`], in the `kvdb_rocksdb::DatabaseConfig`
/// builder shape: a small set of defaults, overridden one at a time with
/// `with_*`.
#[derive(Clone)]
pub struct StoreConfig {
	/// Directory the store owns; holds both the database directory and the
	/// blob tree. Created on first open if absent.
	pub storage_root: std::path::PathBuf,
	pub max_open_files: i32,
	pub memory_budget_mb: usize,
}

impl StoreConfig {
	pub fn new(storage_root: impl Into<std::path::PathBuf>) -> Self {
		let defaults = DatabaseConfig::default();
		StoreConfig {
			storage_root: storage_root.into(),
			max_open_files: defaults.max_open_files,
			memory_budget_mb: defaults.memory_budget_mb,
		}
	}

	pub fn with_max_open_files(mut self, n: i32) -> Self {
		self.max_open_files = n;
		self
	}

	pub fn with_memory_budget_mb(mut self, mb: usize) -> Self {
		self.memory_budget_mb = mb;
		self
	}

	fn db_path(&self) -> std::path::PathBuf {
		self.storage_root.join("db")
	}

	fn files_path(&self) -> std::path::PathBuf {
		self.storage_root.join("files")
	}
}

/// The assembled asset store. Cheap to clone (it's handed out as an `Arc`);
/// every method is safe to call from any thread except where noted (the
/// update session is bound to whichever thread first asks for one).
pub struct AssetStore {
	manager: Arc<SessionManager>,
	files: Arc<FileStore>,
	importer: ImportService,
}

impl AssetStore {
	/// Opens (creating if absent) a store rooted at `config.storage_root`,
	/// using `decoder` to turn hashable archive entries into beatmaps. This
	/// is the common case; for other archive kinds, build the pieces
	/// yourself and call [`AssetStore::with_hooks`] instead.
	pub fn open(config: StoreConfig, decoder: Arc<dyn BeatmapDecoder>) -> Result<Arc<Self>> {
		Self::with_hooks(config, Arc::new(BeatmapImportHooks::new(decoder)))
	}

	/// As [`open`](Self::open), but with a caller-supplied [`ImportHooks`]
	/// rather than the beatmap defaults.
	pub fn with_hooks(config: StoreConfig, hooks: Arc<dyn ImportHooks>) -> Result<Arc<Self>> {
		let db_path = config.db_path();
		std::fs::create_dir_all(&db_path).map_err(|e| Error::io_failure(&db_path, e))?;
		let mut engine_config = DatabaseConfig::with_columns(assetdb_schema::all_columns());
		engine_config.max_open_files = config.max_open_files;
		engine_config.memory_budget_mb = config.memory_budget_mb;
		let path = db_path
			.to_str()
			.ok_or_else(|| Error::StorageUnavailable(format!("non-utf8 path: {}", db_path.display())))?;
		let engine: Arc<dyn assetdb_engine::Engine> = Arc::new(assetdb_engine::Database::open(&engine_config, path)?);
		let manager = SessionManager::open(engine)?;

		let blobs = BlobStore::new(config.files_path());
		let files = Arc::new(FileStore::new(blobs));

		let importer = ImportService::new(manager.clone(), files.clone(), hooks);
		Ok(Arc::new(AssetStore { manager, files, importer }))
	}

	/// Attaches an in-process observer for import events, in addition to the
	/// `log::info!` line every successful import already produces.
	pub fn with_event_sink(self: Arc<Self>, sink: Arc<dyn EventSink>) -> Arc<Self> {
		let AssetStore { manager, files, importer } = match Arc::try_unwrap(self) {
			Ok(store) => store,
			Err(shared) => return shared,
		};
		Arc::new(AssetStore { manager, files, importer: importer.with_event_sink(sink) })
	}

	pub fn manager(&self) -> &Arc<SessionManager> {
		&self.manager
	}

	pub fn files(&self) -> &Arc<FileStore> {
		&self.files
	}

	pub fn update_session(&self) -> Result<UpdateSessionHandle> {
		self.manager.update_session()
	}

	pub fn read_session(&self) -> Result<Session> {
		self.manager.read_session()
	}

	pub fn write_session(&self) -> Result<Transaction> {
		self.manager.write_session()
	}

	pub fn block_all_operations(&self) -> Result<QuiesceToken> {
		self.manager.block_all_operations()
	}

	pub fn compact(&self) -> Result<()> {
		self.manager.compact()
	}

	pub fn reset(&self) -> Result<()> {
		self.manager.reset()
	}

	/// Imports `archive` through the normal-priority queue, blocking the
	/// calling thread until it's done. `Ok(None)` means the archive held no
	/// recognized content and was deliberately skipped.
	pub fn import(&self, archive: &dyn ArchiveReader, cancel: &CancellationToken) -> Result<Option<LiveHandle<BeatmapSet>>> {
		self.importer.import(archive, cancel)
	}

	/// As [`import`](Self::import), queued behind the low-priority worker.
	pub fn import_low_priority(
		&self,
		archive: &dyn ArchiveReader,
		cancel: &CancellationToken,
	) -> Result<Option<LiveHandle<BeatmapSet>>> {
		self.importer.import_low_priority(archive, cancel)
	}

	/// Sweeps Files with zero usages. See [`FileStore::cleanup`].
	pub fn cleanup_files(&self) -> Result<CleanupReport> {
		self.files.cleanup(&self.manager)
	}

	/// Actually removes every `BeatmapSet` (and its owned Beatmaps,
	/// metadata, and difficulties) that has been marked `delete_pending`,
	/// finishing the soft-delete the importer and callers only start. This
	/// core exposes the operation but does not schedule it; the host decides
	/// when a purge pass runs.
	pub fn purge_deleted_sets(&self) -> Result<usize> {
		let mut tx = self.manager.write_session()?;
		let stale: Vec<BeatmapSet> = tx.all::<BeatmapSet>()?.into_iter().filter(|s| s.delete_pending).collect();
		let mut purged = 0;
		for set in stale {
			for beatmap in tx.all::<assetdb_schema::Beatmap>()? {
				if beatmap.beatmap_set_id == set.id {
					tx.remove::<assetdb_schema::Beatmap>(&beatmap.id)?;
					tx.remove::<assetdb_schema::BeatmapMetadata>(&beatmap.metadata_id)?;
					tx.remove::<assetdb_schema::BeatmapDifficulty>(&beatmap.difficulty_id)?;
				}
			}
			tx.remove::<BeatmapSet>(&set.id)?;
			purged += 1;
		}
		tx.commit()?;
		Ok(purged)
	}
}

/// Looks up a `BeatmapSet` by its own id. A thin convenience over
/// `session.find`, since resolving "the set I just imported, by its
/// `Uuid`" is a common enough read path to give a name.
pub fn find_beatmap_set(session: &Session, id: Uuid) -> Result<Option<BeatmapSet>> {
	session.find::<BeatmapSet>(&id)
}

#[cfg(test)]
mod tests {
	use std::io::Cursor;

	use assetdb_importer::{DecodedBeatmap, DecodedMetadata};
	use assetdb_schema::BeatmapDifficulty;

	use super::*;

	struct Fixture {
		name: String,
		entries: std::collections::HashMap<String, Vec<u8>>,
	}

	impl ArchiveReader for Fixture {
		fn name(&self) -> &str {
			&self.name
		}

		fn filenames(&self) -> Vec<String> {
			let mut names: Vec<String> = self.entries.keys().cloned().collect();
			names.sort();
			names
		}

		fn get_stream(&self, name: &str) -> std::io::Result<Box<dyn assetdb_importer::ReadSeek>> {
			let bytes = self
				.entries
				.get(name)
				.cloned()
				.ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, name.to_owned()))?;
			Ok(Box::new(Cursor::new(bytes)))
		}
	}

	struct StubDecoder;
	impl BeatmapDecoder for StubDecoder {
		fn decode(&self, _bytes: &[u8]) -> Result<DecodedBeatmap> {
			Ok(DecodedBeatmap {
				online_id: None,
				ruleset_online_id: Some(0),
				difficulty_name: "Normal".into(),
				metadata: DecodedMetadata {
					title: "T".into(),
					title_unicode: None,
					artist: "A".into(),
					artist_unicode: None,
					author: "author".into(),
					source: String::new(),
					tags: String::new(),
					preview_time: -1,
					audio_file: None,
					background_file: None,
				},
				difficulty: BeatmapDifficulty {
					id: Uuid::nil(),
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

	fn store() -> (tempfile::TempDir, Arc<AssetStore>) {
		let dir = tempfile::tempdir().unwrap();
		let store = AssetStore::open(StoreConfig::new(dir.path()), Arc::new(StubDecoder)).unwrap();
		(dir, store)
	}

	#[test]
	fn construct_empty_store_has_no_sets() {
		let (_dir, store) = store();
		let update = store.update_session().unwrap();
		update.refresh().unwrap();
		assert_eq!(update.all::<BeatmapSet>().unwrap().len(), 0);
	}

	#[test]
	fn import_then_purge_deleted_set_removes_its_beatmaps() {
		let (_dir, store) = store();
		let mut entries = std::collections::HashMap::new();
		entries.insert("song.osu".to_owned(), b"osu file format v14\nhello".to_vec());
		let archive = Fixture { name: "song.osz".into(), entries };

		let handle = store.import(&archive, &CancellationToken::new()).unwrap().unwrap();
		let set_id = *handle.primary_key();

		{
			let mut tx = store.write_session().unwrap();
			let mut set = tx.find::<BeatmapSet>(&set_id).unwrap().unwrap();
			set.delete_pending = true;
			tx.add(set, true).unwrap();
			tx.commit().unwrap();
		}

		let purged = store.purge_deleted_sets().unwrap();
		assert_eq!(purged, 1);

		let session = store.read_session().unwrap();
		assert_eq!(session.all::<BeatmapSet>().unwrap().len(), 0);
		assert_eq!(session.all::<assetdb_schema::Beatmap>().unwrap().len(), 0);
	}

	#[test]
	fn cleanup_files_reclaims_orphaned_blob() {
		let (_dir, store) = store();
		let mut tx = store.write_session().unwrap();
		store.files().add(&mut Cursor::new(vec![0u8, 1, 2, 3]), &mut tx).unwrap();
		tx.commit().unwrap();

		let report = store.cleanup_files().unwrap();
		assert_eq!(report.removed_records, 1);
		assert_eq!(report.removed_blobs, 1);
	}
}
