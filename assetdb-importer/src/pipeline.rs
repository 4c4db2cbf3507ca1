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

//! The importer pipeline proper: stages 1-7 of create -> fingerprint ->
//! early-skip -> populate -> collision resolution -> commit -> dispatch, as
//! one synchronous call. [`crate::Scheduler`] is what gives callers the
//! single-concurrency-per-priority queueing; this module doesn't know about
//! threads at all.

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use assetdb_error::{Error, Result};
use assetdb_filestore::FileStore;
use assetdb_schema::{Beatmap, BeatmapSet, BeatmapSetStatus, NamedFileUsage};
use assetdb_session::{LiveHandle, SessionManager};

use crate::{
	archive::{shorten_filenames, ArchiveReader},
	cancellation::CancellationToken,
	events::{dispatch, EventSink, ImportEvent, NullSink},
	fingerprint::{fingerprint_archive, fingerprint_usages},
	hooks::ImportHooks,
};

struct ImportModel {
	online_id: Option<i64>,
	date_added: DateTime<Utc>,
}

/// Ties a [`SessionManager`], a [`FileStore`], and one archive type's
/// [`ImportHooks`] together into the full import pipeline. One `Importer`
/// per archive type (beatmaps today); `Scheduler` is the thing that
/// serializes calls into it.
pub struct Importer {
	manager: Arc<SessionManager>,
	files: Arc<FileStore>,
	hooks: Arc<dyn ImportHooks>,
	events: Arc<dyn EventSink>,
}

impl Importer {
	pub fn new(manager: Arc<SessionManager>, files: Arc<FileStore>, hooks: Arc<dyn ImportHooks>) -> Self {
		Importer { manager, files, hooks, events: Arc::new(NullSink) }
	}

	pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
		self.events = sink;
		self
	}

	/// Runs the full pipeline against `archive`. `Ok(None)` means the
	/// archive held no recognized content and was deliberately skipped, not
	/// a failure. Any other failure rolls back whatever write transaction
	/// was open and is re-raised after being logged with a five-character
	/// prefix of the archive's fingerprint.
	pub fn import(&self, archive: &dyn ArchiveReader, cancel: &CancellationToken) -> Result<Option<LiveHandle<BeatmapSet>>> {
		cancel.check()?;

		let model = match self.create_model(archive)? {
			Some(model) => model,
			None => return Ok(None),
		};
		cancel.check()?;

		let hash = fingerprint_archive(archive, self.hooks.hashable_extensions())?;
		let tag = &hash[..hash.len().min(5)];
		cancel.check()?;

		if let Some(handle) = self.try_early_skip(archive, &hash)? {
			return Ok(Some(handle));
		}
		cancel.check()?;

		self.pre_import(model.online_id)?;
		cancel.check()?;

		match self.populate_and_commit(archive, &model, cancel) {
			Ok(handle) => Ok(Some(handle)),
			Err(e) => {
				log::error!("import [{tag}] failed: {e}");
				Err(e)
			}
		}
	}

	/// Stage 1: require at least one recognized-extension entry, and pull
	/// the online set id (if any) out of a single representative one.
	fn create_model(&self, archive: &dyn ArchiveReader) -> Result<Option<ImportModel>> {
		let names = archive.filenames();
		let recognized = self.hooks.recognized_extensions();
		if !names.iter().any(|n| crate::hooks::has_extension(n, recognized)) {
			return Ok(None);
		}
		let online_id = self.hooks.extract_online_set_id(archive).map_err(|e| Error::ModelCreationFailed(e.to_string()))?;
		Ok(Some(ImportModel { online_id, date_added: Utc::now() }))
	}

	/// Stage 3: reuse a hash-matched set outright when the hook says it's
	/// already confirmed and the archive's own (shortened) file list matches
	/// what's on record, without ever opening a write transaction.
	fn try_early_skip(&self, archive: &dyn ArchiveReader, hash: &str) -> Result<Option<LiveHandle<BeatmapSet>>> {
		let session = self.manager.read_session()?;
		let Some(existing) = session.all::<BeatmapSet>()?.into_iter().find(|s| s.hash == hash) else {
			return Ok(None);
		};

		let beatmaps: Vec<Beatmap> =
			session.all::<Beatmap>()?.into_iter().filter(|b| b.beatmap_set_id == existing.id).collect();
		if !self.hooks.can_skip_import(&beatmaps) {
			return Ok(None);
		}

		let mut shortened = shorten_filenames(&archive.filenames());
		shortened.sort();
		let mut recorded: Vec<String> = existing.files.iter().map(|u| u.filename.clone()).collect();
		recorded.sort();
		if shortened != recorded {
			return Ok(None);
		}

		let mut tx = self.manager.write_session()?;
		let mut set = tx.find::<BeatmapSet>(&existing.id)?.ok_or(Error::NotFound)?;
		set.delete_pending = false;
		let handle = tx.handle::<BeatmapSet>(set.id);
		tx.add(set, true)?;
		tx.commit()?;
		dispatch(&[ImportEvent::Succeeded { set_id: existing.id }], &*self.events);
		Ok(Some(handle))
	}

	/// The pre-import step: releases a prior set's online id (and its
	/// beatmaps') if the new set is about to claim the same one, regardless
	/// of how the rest of this import turns out. Runs and commits as its own
	/// transaction, independent of stages 4-6.
	fn pre_import(&self, online_id: Option<i64>) -> Result<()> {
		let Some(online_id) = online_id else { return Ok(()) };
		let mut tx = self.manager.write_session()?;
		let Some(mut prior) = tx.all::<BeatmapSet>()?.into_iter().find(|s| s.online_id == Some(online_id)) else {
			return Ok(());
		};
		prior.delete_pending = true;
		prior.online_id = None;
		let beatmap_ids = prior.beatmap_ids.clone();
		tx.add(prior, true)?;
		for id in beatmap_ids {
			if let Some(mut bm) = tx.find::<Beatmap>(&id)? {
				bm.online_id = None;
				tx.add(bm, true)?;
			}
		}
		tx.commit()
	}

	/// Stages 4-6: populate a fresh set from the archive, resolve the
	/// (possibly revised) hash against the database, and commit or roll back
	/// and reuse accordingly.
	fn populate_and_commit(
		&self,
		archive: &dyn ArchiveReader,
		model: &ImportModel,
		cancel: &CancellationToken,
	) -> Result<LiveHandle<BeatmapSet>> {
		let mut tx = self.manager.write_session()?;
		cancel.check()?;
		let mut events = vec![ImportEvent::Began { archive_name: archive.name().to_owned() }];

		let set_id = Uuid::new_v4();

		// Stage 4a.
		let filenames = archive.filenames();
		let shortened = shorten_filenames(&filenames);
		let mut usages = Vec::with_capacity(filenames.len());
		for (original, short) in filenames.iter().zip(shortened.iter()) {
			cancel.check()?;
			let mut stream = archive.get_stream(original).map_err(|e| Error::io_failure(original.clone(), e))?;
			let file = self.files.add(&mut stream, &mut tx)?;
			usages.push(NamedFileUsage::new(short.clone(), file.hash));
		}

		// Stage 4b.
		let revised_hash = fingerprint_usages(&usages, &self.files, self.hooks.hashable_extensions())?;

		cancel.check()?;

		// Stage 4c.
		let mut beatmaps =
			self.hooks.populate(&self.files, &mut tx, set_id, &usages).map_err(|e| Error::PopulateFailed(e.to_string()))?;

		// The hash-matched candidate re-use set, looked up once here so stage
		// 4d can exclude its beatmaps from the shared-online-id check and
		// stage 5 can resolve against the same candidate without refetching.
		let collision = tx.all::<BeatmapSet>()?.into_iter().find(|s| s.hash == revised_hash);

		// Stage 4d: online-id sanitation.
		let existing_beatmaps: Vec<Beatmap> = tx
			.all::<Beatmap>()?
			.into_iter()
			.filter(|b| collision.as_ref().map_or(true, |c| b.beatmap_set_id != c.id))
			.collect();
		let mut online_id = model.online_id;
		if sanitize_online_ids(&mut beatmaps, &existing_beatmaps) {
			online_id = None;
		}

		cancel.check()?;

		// Stage 5: collision resolution on the revised hash.
		if let Some(existing) = collision {
			if self.hooks.can_reuse_existing(&existing.files, &usages) {
				tx.rollback();
				let mut tx2 = self.manager.write_session()?;
				let mut reused = tx2.find::<BeatmapSet>(&existing.id)?.ok_or(Error::NotFound)?;
				reused.delete_pending = false;
				let handle = tx2.handle::<BeatmapSet>(reused.id);
				tx2.add(reused, true)?;
				tx2.commit()?;
				events.push(ImportEvent::Succeeded { set_id: existing.id });
				dispatch(&events, &*self.events);
				return Ok(handle);
			}
			let mut stale = existing;
			stale.delete_pending = true;
			tx.add(stale, true)?;
		}

		// Stage 6: commit.
		let beatmap_ids: Vec<Uuid> = beatmaps.iter().map(|b| b.id).collect();
		for beatmap in beatmaps {
			tx.add(beatmap, false)?;
		}
		let set = BeatmapSet {
			id: set_id,
			online_id,
			hash: revised_hash,
			beatmap_ids,
			files: usages,
			status: BeatmapSetStatus::LocallyModified,
			date_added: model.date_added,
			protected: false,
			delete_pending: false,
		};
		let handle = tx.handle::<BeatmapSet>(set.id);
		tx.add(set.clone(), false)?;
		tx.commit()?;

		events.push(ImportEvent::Succeeded { set_id: set.id });
		dispatch(&events, &*self.events);
		Ok(handle)
	}
}

/// Stage 4d. Returns whether online ids were cleared (and thus whether the
/// set's own online id should be cleared too, by the caller, if it had one).
fn sanitize_online_ids(beatmaps: &mut [Beatmap], existing: &[Beatmap]) -> bool {
	let mut counts: HashMap<i64, usize> = HashMap::new();
	for b in beatmaps.iter().filter_map(|b| b.online_id) {
		*counts.entry(b).or_insert(0) += 1;
	}
	let mut must_clear = counts.values().any(|&count| count > 1);

	if !must_clear {
		must_clear = beatmaps
			.iter()
			.filter_map(|b| b.online_id)
			.any(|id| existing.iter().any(|other| other.online_id == Some(id)));
	}

	if !must_clear {
		return false;
	}

	let had_any = beatmaps.iter().any(|b| b.online_id.is_some());
	for b in beatmaps.iter_mut() {
		b.online_id = None;
	}
	had_any
}
