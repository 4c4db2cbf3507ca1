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

use std::io::Read;

use assetdb_error::{Error, Result};
use assetdb_filestore::FileStore;
use assetdb_schema::NamedFileUsage;
use sha2::{Digest, Sha256};

use crate::{archive::ArchiveReader, hooks::has_extension as is_hashable};

fn hex_digest(hasher: Sha256) -> String {
	hasher.finalize().iter().map(|b| format!("{b:02x}")).collect()
}

/// Stage 2: concatenates the content of every hashable archive entry, sorted
/// lexicographically by name, and hashes the result. Falls back to the
/// archive's display name when it contains no hashable files.
pub(crate) fn fingerprint_archive(archive: &dyn ArchiveReader, hashable_extensions: &[&str]) -> Result<String> {
	let mut names: Vec<String> = archive.filenames().into_iter().filter(|n| is_hashable(n, hashable_extensions)).collect();
	names.sort();

	let mut hasher = Sha256::new();
	if names.is_empty() {
		hasher.update(archive.name().as_bytes());
	} else {
		for name in &names {
			let mut stream = archive.get_stream(name).map_err(|e| Error::io_failure(name.clone(), e))?;
			let mut buf = Vec::new();
			stream.read_to_end(&mut buf).map_err(|e| Error::io_failure(name.clone(), e))?;
			hasher.update(&buf);
		}
	}
	Ok(hex_digest(hasher))
}

/// Stage 4b: the same rule, but reading content back from committed `File`
/// records via the file store rather than the archive, so filename
/// collapsing and shortening are reflected in what gets hashed.
pub(crate) fn fingerprint_usages(usages: &[NamedFileUsage], files: &FileStore, hashable_extensions: &[&str]) -> Result<String> {
	let mut hashable: Vec<&NamedFileUsage> = usages.iter().filter(|u| is_hashable(&u.filename, hashable_extensions)).collect();
	hashable.sort_by(|a, b| a.filename.cmp(&b.filename));

	let mut hasher = Sha256::new();
	if hashable.is_empty() {
		return Ok(hex_digest(hasher));
	}
	for usage in hashable {
		let bytes = files.read(&usage.file_hash)?;
		hasher.update(&bytes);
	}
	Ok(hex_digest(hasher))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn is_hashable_matches_case_insensitively() {
		assert!(is_hashable("Track.OSU", &[".osu"]));
		assert!(!is_hashable("bg.jpg", &[".osu"]));
	}
}
