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

//! Content-addressed indirection over the blob store: computes the SHA-256
//! of whatever is added, deduplicates by hash, and reclaims blobs no
//! `BeatmapSet` references any more.

mod hash_locks;

use std::{
	fmt::Write as _,
	io::{self, Read, Seek, SeekFrom},
	sync::Arc,
};

use assetdb_blobstore::{shard_path, BlobStore};
use assetdb_error::{Error, Result};
use assetdb_schema::{BeatmapSet, File};
use assetdb_session::{SessionManager, Transaction};
use sha2::{Digest, Sha256};

pub use hash_locks::HashLocks;

/// Reports what [`FileStore::cleanup`] actually did, so callers can log it.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CleanupReport {
	pub removed_records: usize,
	pub removed_blobs: usize,
	pub delete_failures: usize,
}

/// Computes the lowercase hex SHA-256 of a readable, seekable stream,
/// leaving the stream's position at the start both before and after.
fn hash_stream<S: Read + Seek>(stream: &mut S) -> io::Result<String> {
	stream.seek(SeekFrom::Start(0))?;
	let mut buf = Vec::new();
	stream.read_to_end(&mut buf)?;
	stream.seek(SeekFrom::Start(0))?;

	let mut hasher = Sha256::new();
	hasher.update(&buf);
	let digest = hasher.finalize();
	let mut hex = String::with_capacity(digest.len() * 2);
	for byte in digest {
		let _ = write!(hex, "{byte:02x}");
	}
	Ok(hex)
}

/// The content-addressed file index: a [`BlobStore`] plus the hashing and
/// dedup logic layered on top.
pub struct FileStore {
	blobs: BlobStore,
	locks: HashLocks,
}

impl FileStore {
	pub fn new(blobs: BlobStore) -> Self {
		FileStore { blobs, locks: HashLocks::new() }
	}

	/// Reads back the full content of a blob by its hash. Used by importers
	/// that need to re-decode a file whose in-memory bytes were already
	/// consumed writing it to the store.
	pub fn read(&self, hash: &str) -> Result<Vec<u8>> {
		let mut file = self.blobs.open_read(&shard_path(hash))?;
		let mut buf = Vec::new();
		file.read_to_end(&mut buf).map_err(|e| Error::io_failure(shard_path(hash), e))?;
		Ok(buf)
	}

	/// Adds `stream`'s content to the store within `tx`, returning the
	/// resulting `File`. Idempotent: adding the same bytes twice yields the
	/// same record with no duplication, and a corrupted on-disk copy is
	/// overwritten rather than trusted.
	pub fn add<S: Read + Seek>(&self, stream: &mut S, tx: &mut Transaction) -> Result<File> {
		let hash = hash_stream(stream).map_err(|e| Error::io_failure("<stream>", e))?;
		let storage_path = shard_path(&hash);

		let _stripe = self.locks.lock(&hash);
		let needs_write = if !self.blobs.exists(&storage_path) {
			true
		} else {
			let mut existing = self.blobs.open_read(&storage_path)?;
			hash_stream(&mut existing).map(|on_disk| on_disk != hash).unwrap_or(true)
		};
		if needs_write {
			let mut dest = self.blobs.open_write(&storage_path)?;
			stream.seek(SeekFrom::Start(0)).map_err(|e| Error::io_failure("<stream>", e))?;
			io::copy(stream, &mut dest).map_err(|e| Error::io_failure(&storage_path, e))?;
		}
		drop(_stripe);

		match tx.find::<File>(&hash)? {
			Some(existing) => Ok(existing),
			None => {
				let record = File::new(hash, storage_path);
				tx.add(record.clone(), false)?;
				Ok(record)
			}
		}
	}

	/// Deletes every `File` with zero usages across all `BeatmapSet`s, and
	/// the blob backing it. Per-blob I/O failures are logged and skipped;
	/// they don't abort the rest of the sweep or the enclosing transaction.
	pub fn cleanup(&self, manager: &Arc<SessionManager>) -> Result<CleanupReport> {
		let mut tx = manager.write_session()?;
		let files = tx.all::<File>()?;
		let sets = tx.all::<BeatmapSet>()?;

		let mut report = CleanupReport::default();
		for file in files {
			if assetdb_schema::file_usage_count(&sets, &file.hash) > 0 {
				continue;
			}
			match self.blobs.delete(&file.storage_path) {
				Ok(()) => report.removed_blobs += 1,
				Err(e) => {
					log::warn!("cleanup: failed to delete blob at {}: {e}", file.storage_path);
					report.delete_failures += 1;
				}
			}
			tx.remove::<File>(&file.hash)?;
			report.removed_records += 1;
		}
		tx.commit()?;
		Ok(report)
	}
}

#[cfg(test)]
mod tests {
	use std::io::Cursor;

	use assetdb_schema::NamedFileUsage;
	use uuid::Uuid;

	use super::*;

	fn store() -> (tempfile::TempDir, FileStore, Arc<SessionManager>) {
		let dir = tempfile::tempdir().unwrap();
		let blobs = BlobStore::new(dir.path().join("files"));
		let engine = Arc::new(assetdb_engine_memory::create(assetdb_schema::all_columns()));
		let manager = SessionManager::open(engine).unwrap();
		(dir, FileStore::new(blobs), manager)
	}

	#[test]
	fn add_is_idempotent_for_identical_content() {
		let (_dir, fs, manager) = store();
		let mut tx = manager.write_session().unwrap();
		let a = fs.add(&mut Cursor::new(vec![0u8, 1, 2, 3]), &mut tx).unwrap();
		let b = fs.add(&mut Cursor::new(vec![0u8, 1, 2, 3]), &mut tx).unwrap();
		assert_eq!(a.hash, b.hash);
		tx.commit().unwrap();

		let session = manager.read_session().unwrap();
		assert_eq!(session.all::<File>().unwrap().len(), 1);
	}

	#[test]
	fn cleanup_removes_unreferenced_file_and_blob() {
		let (_dir, fs, manager) = store();
		let mut tx = manager.write_session().unwrap();
		let file = fs.add(&mut Cursor::new(vec![0u8, 1, 2, 3]), &mut tx).unwrap();
		tx.commit().unwrap();
		assert!(fs.blobs.exists(&file.storage_path));

		let report = fs.cleanup(&manager).unwrap();
		assert_eq!(report.removed_records, 1);
		assert_eq!(report.removed_blobs, 1);
		assert!(!fs.blobs.exists(&file.storage_path));
	}

	#[test]
	fn cleanup_preserves_file_referenced_by_a_set() {
		let (_dir, fs, manager) = store();
		let mut tx = manager.write_session().unwrap();
		let file = fs.add(&mut Cursor::new(vec![4u8, 5, 6]), &mut tx).unwrap();
		let set = BeatmapSet {
			id: Uuid::new_v4(),
			online_id: None,
			hash: "a".repeat(64),
			beatmap_ids: vec![],
			files: vec![NamedFileUsage::new("track.osu", file.hash.clone())],
			status: assetdb_schema::BeatmapSetStatus::LocallyModified,
			date_added: chrono::Utc::now(),
			protected: false,
			delete_pending: false,
		};
		tx.add(set, false).unwrap();
		tx.commit().unwrap();

		let report = fs.cleanup(&manager).unwrap();
		assert_eq!(report.removed_records, 0);
		assert!(fs.blobs.exists(&file.storage_path));
	}
}
