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

use std::{collections::HashSet, io::Read, sync::Arc};

use md5::{Digest as Md5Digest, Md5};
use uuid::Uuid;

use assetdb_error::{Error, Result};
use assetdb_filestore::FileStore;
use assetdb_schema::{Beatmap, BeatmapMetadata, NamedFileUsage, Ruleset, RulesetId};
use assetdb_session::Transaction;

use crate::{archive::ArchiveReader, decoder::BeatmapDecoder, hooks::has_extension, ImportHooks};

const HASHABLE_EXTENSIONS: &[&str] = &[".osu"];

fn hex_md5(bytes: &[u8]) -> String {
	let mut hasher = Md5::new();
	hasher.update(bytes);
	hasher.finalize().iter().map(|b| format!("{b:02x}")).collect()
}

/// The beatmap archive type's import hooks: `.osu` files are both the
/// hashable set and the only recognized content. Plugs a caller-supplied
/// [`BeatmapDecoder`] in to turn raw file bytes into playable difficulties.
pub struct BeatmapImportHooks {
	decoder: Arc<dyn BeatmapDecoder>,
}

impl BeatmapImportHooks {
	pub fn new(decoder: Arc<dyn BeatmapDecoder>) -> Self {
		BeatmapImportHooks { decoder }
	}
}

impl ImportHooks for BeatmapImportHooks {
	fn hashable_extensions(&self) -> &'static [&'static str] {
		HASHABLE_EXTENSIONS
	}

	fn recognized_extensions(&self) -> &'static [&'static str] {
		HASHABLE_EXTENSIONS
	}

	fn extract_online_set_id(&self, archive: &dyn ArchiveReader) -> Result<Option<i64>> {
		let representative = archive.filenames().into_iter().find(|n| has_extension(n, HASHABLE_EXTENSIONS));
		let Some(name) = representative else { return Ok(None) };
		let mut stream = archive.get_stream(&name).map_err(|e| Error::io_failure(name.clone(), e))?;
		let mut buf = Vec::new();
		stream.read_to_end(&mut buf).map_err(|e| Error::io_failure(name.clone(), e))?;
		self.decoder.online_set_id(&buf)
	}

	fn populate(&self, files: &FileStore, tx: &mut Transaction, set_id: Uuid, usages: &[NamedFileUsage]) -> Result<Vec<Beatmap>> {
		let mut beatmaps = Vec::new();
		let mut seen_hashes = HashSet::new();

		for usage in usages {
			if !has_extension(&usage.filename, HASHABLE_EXTENSIONS) {
				continue;
			}
			// Duplicate-hash beatmaps within the set are collapsed: two
			// filenames pointing at identical content yield one difficulty.
			if !seen_hashes.insert(usage.file_hash.clone()) {
				continue;
			}

			let bytes = files.read(&usage.file_hash)?;
			let decoded = self.decoder.decode(&bytes)?;

			let ruleset_id = match decoded.ruleset_online_id {
				Some(online_id) => match tx.find::<Ruleset>(&RulesetId(Some(online_id)))? {
					Some(_) => Some(online_id),
					None => continue,
				},
				None => None,
			};

			let metadata_id = Uuid::new_v4();
			let difficulty_id = Uuid::new_v4();
			let metadata = BeatmapMetadata {
				id: metadata_id,
				title: decoded.metadata.title,
				title_unicode: decoded.metadata.title_unicode,
				artist: decoded.metadata.artist,
				artist_unicode: decoded.metadata.artist_unicode,
				author: decoded.metadata.author,
				source: decoded.metadata.source,
				tags: decoded.metadata.tags,
				preview_time: decoded.metadata.preview_time,
				audio_file: decoded.metadata.audio_file,
				background_file: decoded.metadata.background_file,
			};
			let mut difficulty = decoded.difficulty;
			difficulty.id = difficulty_id;

			tx.add(metadata, false)?;
			tx.add(difficulty, false)?;

			beatmaps.push(Beatmap {
				id: Uuid::new_v4(),
				beatmap_set_id: set_id,
				ruleset_id,
				metadata_id,
				difficulty_id,
				online_id: decoded.online_id,
				difficulty_name: decoded.difficulty_name,
				file_hash: usage.file_hash.clone(),
				md5_hash: hex_md5(&bytes),
				editor: decoded.editor,
			});
		}

		Ok(beatmaps)
	}
}
