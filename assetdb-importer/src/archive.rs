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

use std::io;

/// A readable, seekable stream, as returned by [`ArchiveReader::get_stream`].
pub trait ReadSeek: io::Read + io::Seek {}
impl<T: io::Read + io::Seek> ReadSeek for T {}

/// An archive (e.g. a ZIP) holding the ordered byte streams of one beatmap
/// set. Consumed, not provided, by this crate: hosts supply their own
/// implementation over whatever archive format they support.
pub trait ArchiveReader: Send + Sync {
	/// A display name for the archive, used as the hash fallback when it
	/// contains no hashable files.
	fn name(&self) -> &str;

	/// Every entry's relative path within the archive.
	fn filenames(&self) -> Vec<String>;

	/// Opens a readable, seekable stream for the entry `name`.
	fn get_stream(&self, name: &str) -> io::Result<Box<dyn ReadSeek>>;
}

/// Strips the longest common path prefix from `names` if that prefix ends
/// in a path separator, and standardizes remaining separators to `/`. Lets
/// an archive that wraps everything in a single top-level folder compare
/// equal, by filename, to one that doesn't.
pub fn shorten_filenames(names: &[String]) -> Vec<String> {
	let normalized: Vec<String> = names.iter().map(|n| n.replace('\\', "/")).collect();
	if normalized.len() < 2 {
		return normalized;
	}

	let mut prefix = normalized[0].clone();
	for name in &normalized[1..] {
		let common_len = prefix.bytes().zip(name.bytes()).take_while(|(a, b)| a == b).count();
		prefix.truncate(common_len);
		if prefix.is_empty() {
			break;
		}
	}

	match prefix.rfind('/') {
		Some(idx) => {
			let cut = idx + 1;
			normalized.into_iter().map(|n| n[cut..].to_owned()).collect()
		}
		None => normalized,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn strips_a_shared_top_level_folder() {
		let names = vec!["Set/a.osu".to_owned(), "Set/bg.jpg".to_owned()];
		assert_eq!(shorten_filenames(&names), vec!["a.osu", "bg.jpg"]);
	}

	#[test]
	fn leaves_names_alone_without_a_shared_folder() {
		let names = vec!["a.osu".to_owned(), "bg.jpg".to_owned()];
		assert_eq!(shorten_filenames(&names), vec!["a.osu", "bg.jpg"]);
	}

	#[test]
	fn normalizes_backslashes_to_forward_slashes() {
		let names = vec!["Set\\a.osu".to_owned(), "Set\\bg.jpg".to_owned()];
		assert_eq!(shorten_filenames(&names), vec!["a.osu", "bg.jpg"]);
	}
}
