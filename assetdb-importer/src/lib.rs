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

//! The archive importer: ingests archives, hashes their contents, resolves
//! duplicates at both the set and individual blob level, populates the
//! relational records, and rolls back atomically on failure. See
//! [`pipeline::Importer`] for the pipeline itself and [`Scheduler`] for the
//! two-queue concurrency wrapper around it.

mod archive;
mod beatmap_hooks;
mod cancellation;
mod decoder;
mod events;
mod fingerprint;
mod hooks;
mod pipeline;
mod scheduler;

pub use archive::{shorten_filenames, ArchiveReader, ReadSeek};
pub use beatmap_hooks::BeatmapImportHooks;
pub use cancellation::CancellationToken;
pub use decoder::{BeatmapDecoder, DecodedBeatmap, DecodedMetadata};
pub use events::{EventSink, ImportEvent, NullSink};
pub use hooks::ImportHooks;
pub use pipeline::Importer;
pub use scheduler::{Priority, Scheduler};

use std::sync::Arc;

use assetdb_error::Result;
use assetdb_filestore::FileStore;
use assetdb_schema::BeatmapSet;
use assetdb_session::{LiveHandle, SessionManager};

/// The full importer as a host actually uses it: an [`Importer`] (the
/// synchronous pipeline) behind a [`Scheduler`] (the two priority queues).
/// `import`/`import_low_priority` are the entry points §4.6 describes.
pub struct ImportService {
	importer: Importer,
	scheduler: Scheduler,
}

impl ImportService {
	pub fn new(manager: Arc<SessionManager>, files: Arc<FileStore>, hooks: Arc<dyn ImportHooks>) -> Self {
		ImportService { importer: Importer::new(manager, files, hooks), scheduler: Scheduler::new() }
	}

	pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
		self.importer = self.importer.with_event_sink(sink);
		self
	}

	/// Submits `archive` to the normal-priority queue and blocks until it's
	/// imported (or skipped, or fails).
	pub fn import(&self, archive: &dyn ArchiveReader, cancel: &CancellationToken) -> Result<Option<LiveHandle<BeatmapSet>>> {
		self.submit(Priority::Normal, archive, cancel)
	}

	/// As [`import`](Self::import), but queued behind the low-priority
	/// worker rather than the normal one (e.g. background bulk imports that
	/// shouldn't starve a user-initiated one).
	pub fn import_low_priority(
		&self,
		archive: &dyn ArchiveReader,
		cancel: &CancellationToken,
	) -> Result<Option<LiveHandle<BeatmapSet>>> {
		self.submit(Priority::Low, archive, cancel)
	}

	fn submit(
		&self,
		priority: Priority,
		archive: &dyn ArchiveReader,
		cancel: &CancellationToken,
	) -> Result<Option<LiveHandle<BeatmapSet>>> {
		let _permit = self.scheduler.acquire(priority, cancel)?;
		self.importer.import(archive, cancel)
	}
}

#[cfg(test)]
mod tests {
	use std::{collections::HashMap, io::Cursor, sync::Arc};

	use assetdb_blobstore::BlobStore;
	use assetdb_filestore::FileStore;
	use assetdb_schema::BeatmapDifficulty;

	use super::*;

	struct Fixture {
		name: String,
		entries: HashMap<String, Vec<u8>>,
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

		fn get_stream(&self, name: &str) -> std::io::Result<Box<dyn ReadSeek>> {
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

	#[test]
	fn import_service_wires_scheduler_and_importer_together() {
		let dir = tempfile::tempdir().unwrap();
		let engine = Arc::new(assetdb_engine_memory::create(assetdb_schema::all_columns()));
		let manager = SessionManager::open(engine).unwrap();
		let files = Arc::new(FileStore::new(BlobStore::new(dir.path().join("files"))));
		let hooks = Arc::new(BeatmapImportHooks::new(Arc::new(StubDecoder)));
		let service = ImportService::new(manager, files, hooks);

		let mut entries = HashMap::new();
		entries.insert("song.osu".to_owned(), b"osu file format v14\nhello".to_vec());
		let archive = Fixture { name: "song.osz".into(), entries };

		let handle = service.import(&archive, &CancellationToken::new()).unwrap().unwrap();
		let count = handle.perform_read(|s| s.beatmap_ids.len()).unwrap();
		assert_eq!(count, 1);
	}
}
