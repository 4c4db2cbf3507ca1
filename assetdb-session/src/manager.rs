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

use std::{collections::HashMap, sync::Arc, thread::ThreadId};

use assetdb_engine::Engine;
use assetdb_error::{Error, Result};
use assetdb_schema::{Record, Ruleset};
use parking_lot::{Condvar, Mutex};

use crate::{session::Session, snapshot::Snapshot, transaction::Transaction, update::UpdateSessionHandle};

/// A single schema migration, run once while opening the manager if the
/// persisted schema version is below `version`.
pub struct Migration {
	pub version: u32,
	pub apply: fn(&Arc<dyn Engine>) -> Result<()>,
}

const META_SCHEMA_VERSION_COLUMN: &str = assetdb_schema::META_COLUMN;

fn read_schema_version(engine: &dyn Engine) -> Result<u32> {
	match engine.get(META_SCHEMA_VERSION_COLUMN, assetdb_schema::SCHEMA_VERSION_KEY)? {
		Some(bytes) if bytes.len() == 4 => Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
		_ => Ok(0),
	}
}

fn write_schema_version(engine: &dyn Engine, version: u32) -> Result<()> {
	let mut tr = engine.transaction();
	tr.put(META_SCHEMA_VERSION_COLUMN, assetdb_schema::SCHEMA_VERSION_KEY, &version.to_be_bytes());
	engine.write(tr)
}

fn default_rulesets() -> Vec<Ruleset> {
	vec![
		Ruleset {
			online_id: Some(0),
			name: "osu!".into(),
			short_name: "osu".into(),
			instantiation_info: "osu.Rulesets.Osu".into(),
			available: true,
		},
		Ruleset {
			online_id: Some(1),
			name: "osu!taiko".into(),
			short_name: "taiko".into(),
			instantiation_info: "osu.Rulesets.Taiko".into(),
			available: true,
		},
		Ruleset {
			online_id: Some(2),
			name: "osu!catch".into(),
			short_name: "fruits".into(),
			instantiation_info: "osu.Rulesets.Catch".into(),
			available: true,
		},
		Ruleset {
			online_id: Some(3),
			name: "osu!mania".into(),
			short_name: "mania".into(),
			instantiation_info: "osu.Rulesets.Mania".into(),
			available: true,
		},
	]
}

fn seed_default_rulesets(engine: &Arc<dyn Engine>) -> Result<()> {
	let mut tr = engine.transaction();
	for ruleset in default_rulesets() {
		let key = ruleset.primary_key().encode();
		let value = assetdb_schema::encode_value(&ruleset)?;
		tr.put(Ruleset::TABLE, &key, &value);
	}
	engine.write(tr)
}

fn built_in_migrations() -> Vec<Migration> {
	vec![Migration { version: 1, apply: seed_default_rulesets }]
}

pub(crate) struct UpdateState {
	pub(crate) thread: ThreadId,
	pub(crate) snapshot: Snapshot,
}

pub(crate) struct ManagerState {
	pub(crate) closed: bool,
	pub(crate) quiescing: bool,
	pub(crate) writer_active: bool,
	pub(crate) active_usage: usize,
	pub(crate) update: Option<UpdateState>,
}

impl Default for ManagerState {
	fn default() -> Self {
		ManagerState { closed: false, quiescing: false, writer_active: false, active_usage: 0, update: None }
	}
}

/// Guards a single unit of "a session is outstanding" for the manager's
/// active-usage counter. Decrements and wakes quiesce waiters on drop.
pub(crate) struct ActiveUsageGuard {
	pub(crate) manager: Arc<SessionManager>,
}

impl Drop for ActiveUsageGuard {
	fn drop(&mut self) {
		let mut state = self.manager.state.lock();
		state.active_usage -= 1;
		drop(state);
		self.manager.cv.notify_all();
	}
}

/// Guards exclusive possession of the single writer slot.
pub(crate) struct WriterGuard {
	pub(crate) manager: Arc<SessionManager>,
}

impl Drop for WriterGuard {
	fn drop(&mut self) {
		let mut state = self.manager.state.lock();
		state.writer_active = false;
		drop(state);
		self.manager.cv.notify_all();
	}
}

/// A token held while the database is quiesced. Releases the gate on drop.
pub struct QuiesceToken {
	manager: Arc<SessionManager>,
}

impl Drop for QuiesceToken {
	fn drop(&mut self) {
		let mut state = self.manager.state.lock();
		state.quiescing = false;
		drop(state);
		self.manager.cv.notify_all();
	}
}

/// Owns the single embedded database and grants update, read, and write
/// sessions over it. See the crate docs for the access model.
pub struct SessionManager {
	pub(crate) engine: Arc<dyn Engine>,
	pub(crate) record_tables: Vec<&'static str>,
	pub(crate) state: Mutex<ManagerState>,
	pub(crate) cv: Condvar,
}

impl SessionManager {
	/// Opens a manager over `engine`, running the built-in schema migrations
	/// (currently just seeding the default rulesets on a fresh database).
	pub fn open(engine: Arc<dyn Engine>) -> Result<Arc<SessionManager>> {
		Self::open_with_migrations(engine, &built_in_migrations())
	}

	/// As [`open`](Self::open), but with caller-supplied migrations appended
	/// after the built-in ones. Extension point for hosts that add their own
	/// record tables on top of the core schema.
	pub fn open_with_migrations(engine: Arc<dyn Engine>, migrations: &[Migration]) -> Result<Arc<SessionManager>> {
		let mut version = read_schema_version(&*engine)?;
		let starting_version = version;
		for migration in migrations {
			if migration.version > version {
				(migration.apply)(&engine)
					.map_err(|e| Error::SchemaMigrationFailed { to_version: migration.version, reason: e.to_string() })?;
				version = migration.version;
			}
		}
		if version != starting_version {
			write_schema_version(&*engine, version)?;
		}

		let record_tables: Vec<&'static str> = assetdb_schema::all_columns()
			.into_iter()
			.filter(|&c| c != assetdb_schema::META_COLUMN)
			.collect();

		Ok(Arc::new(SessionManager {
			engine,
			record_tables,
			state: Mutex::new(ManagerState::default()),
			cv: Condvar::new(),
		}))
	}

	/// Marks the manager closed; every subsequent session request fails with
	/// `closed`. Safe to call more than once.
	pub fn close(self: &Arc<Self>) {
		let mut state = self.state.lock();
		state.closed = true;
		state.update = None;
		drop(state);
		self.cv.notify_all();
		self.engine.close();
	}

	pub(crate) fn enter(self: &Arc<Self>) -> Result<ActiveUsageGuard> {
		let mut state = self.state.lock();
		loop {
			if state.closed {
				return Err(Error::Closed);
			}
			if !state.quiescing {
				break;
			}
			self.cv.wait(&mut state);
		}
		state.active_usage += 1;
		drop(state);
		Ok(ActiveUsageGuard { manager: self.clone() })
	}

	pub(crate) fn acquire_writer(self: &Arc<Self>) -> WriterGuard {
		let mut state = self.state.lock();
		while state.writer_active {
			self.cv.wait(&mut state);
		}
		state.writer_active = true;
		drop(state);
		WriterGuard { manager: self.clone() }
	}

	/// Applies a committed transaction's writes to the cached update-session
	/// snapshot, if one exists and belongs to `origin`. Lets the update
	/// thread observe its own commits immediately, without a `refresh()`.
	pub(crate) fn fold_into_update_snapshot(
		self: &Arc<Self>,
		origin: Option<ThreadId>,
		pending: &HashMap<String, std::collections::BTreeMap<Vec<u8>, Option<Vec<u8>>>>,
	) {
		let Some(origin) = origin else { return };
		let mut state = self.state.lock();
		if let Some(update) = state.update.as_mut() {
			if update.thread == origin {
				update.snapshot.apply(pending);
			}
		}
	}

	/// Returns the long-lived session bound to the calling thread, creating
	/// it on first access. Later calls from a different thread fail with
	/// `closed` rather than silently rebinding.
	pub fn update_session(self: &Arc<Self>) -> Result<UpdateSessionHandle> {
		let thread = std::thread::current().id();
		{
			let mut state = self.state.lock();
			loop {
				if state.closed {
					return Err(Error::Closed);
				}
				if !state.quiescing {
					break;
				}
				self.cv.wait(&mut state);
			}
			if state.update.is_none() {
				drop(state);
				let snapshot = Snapshot::load(&*self.engine, &self.record_tables)?;
				state = self.state.lock();
				if state.update.is_none() {
					state.update = Some(UpdateState { thread, snapshot });
					state.active_usage += 1;
				}
			}
			match &state.update {
				Some(update) if update.thread == thread => {}
				_ => return Err(Error::Closed),
			}
		}
		Ok(UpdateSessionHandle { manager: self.clone() })
	}

	/// A fresh, transient session usable from any thread.
	pub fn read_session(self: &Arc<Self>) -> Result<Session> {
		let usage = self.enter()?;
		let snapshot = Snapshot::load(&*self.engine, &self.record_tables)?;
		Ok(Session::new(self.clone(), snapshot, usage))
	}

	/// A fresh session with an already-open write transaction. Writers are
	/// fully serialized; this call blocks until any other writer finishes.
	pub fn write_session(self: &Arc<Self>) -> Result<Transaction> {
		self.read_session()?.begin_write()
	}

	/// Acquires an exclusive, manager-wide gate: closes the update session,
	/// waits for every outstanding session to release, and returns a token
	/// that reopens the gate on drop. Used for compaction, reset, and
	/// restore, which need sole ownership of the backing file.
	pub fn block_all_operations(self: &Arc<Self>) -> Result<QuiesceToken> {
		let mut state = self.state.lock();
		if state.closed {
			return Err(Error::Closed);
		}
		while state.quiescing {
			self.cv.wait(&mut state);
		}
		state.quiescing = true;
		if state.update.take().is_some() {
			state.active_usage -= 1;
		}
		while state.active_usage > 0 {
			self.cv.wait(&mut state);
		}
		drop(state);
		Ok(QuiesceToken { manager: self.clone() })
	}

	/// Compacts every column family. Only valid while quiesced, so this
	/// acquires and releases its own quiesce token.
	pub fn compact(self: &Arc<Self>) -> Result<()> {
		let _token = self.block_all_operations()?;
		self.engine.compact()
	}

	/// Discards all data, replacing the database with an empty one at the
	/// same location via the engine's atomic directory swap.
	pub fn reset(self: &Arc<Self>) -> Result<()> {
		let _token = self.block_all_operations()?;
		let temp = tempfile::tempdir().map_err(|e| Error::io_failure(std::env::temp_dir(), e))?;
		let config = assetdb_engine::DatabaseConfig::with_columns(assetdb_schema::all_columns());
		assetdb_engine::Database::open(&config, temp.path().to_str().unwrap())?;
		self.engine.restore(temp.path().to_str().unwrap())
	}
}
