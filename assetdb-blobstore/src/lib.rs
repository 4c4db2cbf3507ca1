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

//! A thin abstraction over a local directory of content-addressed blobs.
//! No caching and no locking beyond what the filesystem gives for free; the
//! file store above this layer is the one that knows about hashes and
//! dedup, this crate only knows about relative paths.

use std::{
	fs::{self, File},
	io,
	path::{Path, PathBuf},
};

use assetdb_error::{Error, Result};

/// A local directory of blobs, addressed by caller-supplied relative paths.
pub struct BlobStore {
	root: PathBuf,
}

impl BlobStore {
	/// Opens a blob store rooted at `root`. Does not require `root` to exist
	/// yet; it is created lazily by the first `open_write`.
	pub fn new(root: impl Into<PathBuf>) -> Self {
		BlobStore { root: root.into() }
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	fn absolute(&self, relative: &str) -> PathBuf {
		self.root.join(relative)
	}

	/// Whether a blob exists at `relative`.
	pub fn exists(&self, relative: &str) -> bool {
		self.absolute(relative).is_file()
	}

	/// Opens an existing blob for reading.
	pub fn open_read(&self, relative: &str) -> Result<File> {
		let path = self.absolute(relative);
		File::open(&path).map_err(|e| Error::io_failure(path, e))
	}

	/// Opens a blob for writing, truncating any existing content and creating
	/// parent directories as needed.
	pub fn open_write(&self, relative: &str) -> Result<File> {
		let path = self.absolute(relative);
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent).map_err(|e| Error::io_failure(parent, e))?;
		}
		File::create(&path).map_err(|e| Error::io_failure(path, e))
	}

	/// Removes a single blob. Missing files are not an error.
	pub fn delete(&self, relative: &str) -> Result<()> {
		let path = self.absolute(relative);
		match fs::remove_file(&path) {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(Error::io_failure(path, e)),
		}
	}

	/// Recursively removes everything under `relative` (or the whole store
	/// root when `relative` is empty). Missing paths are not an error.
	pub fn delete_all(&self, relative: &str) -> Result<()> {
		let path = if relative.is_empty() { self.root.clone() } else { self.absolute(relative) };
		match fs::remove_dir_all(&path) {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(Error::io_failure(path, e)),
		}
	}
}

/// Derives the sharded relative path `<h0>/<h0h1>/<hash>` for a lowercase hex
/// SHA-256 hash, so that no single directory accumulates every blob in the
/// store.
pub fn shard_path(hash: &str) -> String {
	let h0 = &hash[0..1];
	let h01 = &hash[0..2];
	format!("{h0}/{h01}/{hash}")
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::{Read, Write};

	fn store() -> (tempfile::TempDir, BlobStore) {
		let dir = tempfile::tempdir().unwrap();
		let store = BlobStore::new(dir.path());
		(dir, store)
	}

	#[test]
	fn shard_path_splits_on_first_two_hex_chars() {
		let hash = "ab".to_owned() + &"c".repeat(62);
		assert_eq!(shard_path(&hash), format!("a/ab/{hash}"));
	}

	#[test]
	fn write_then_read_round_trips() {
		let (_dir, store) = store();
		let path = shard_path(&("d".repeat(64)));
		{
			let mut f = store.open_write(&path).unwrap();
			f.write_all(b"hello").unwrap();
		}
		assert!(store.exists(&path));
		let mut buf = String::new();
		store.open_read(&path).unwrap().read_to_string(&mut buf).unwrap();
		assert_eq!(buf, "hello");
	}

	#[test]
	fn delete_of_missing_file_is_not_an_error() {
		let (_dir, store) = store();
		store.delete("nope/nope").unwrap();
	}

	#[test]
	fn delete_all_removes_the_whole_subtree() {
		let (_dir, store) = store();
		let path = shard_path(&("e".repeat(64)));
		store.open_write(&path).unwrap();
		assert!(store.exists(&path));
		store.delete_all("e").unwrap();
		assert!(!store.exists(&path));
	}
}
