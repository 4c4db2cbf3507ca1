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

use std::sync::Arc;

use assetdb_error::Result;
use assetdb_schema::Record;

use crate::{
	live_handle::LiveHandle,
	manager::{ActiveUsageGuard, SessionManager},
	snapshot::Snapshot,
	transaction::Transaction,
};

/// A fresh, transient session usable from any thread, returned by
/// [`SessionManager::read_session`](crate::SessionManager::read_session). Its
/// view is fixed at creation; call [`refresh`](Self::refresh) to pull in
/// later commits.
pub struct Session {
	manager: Arc<SessionManager>,
	snapshot: Snapshot,
	usage: ActiveUsageGuard,
}

impl Session {
	pub(crate) fn new(manager: Arc<SessionManager>, snapshot: Snapshot, usage: ActiveUsageGuard) -> Self {
		Session { manager, snapshot, usage }
	}

	pub fn all<T: Record>(&self) -> Result<Vec<T>> {
		self.snapshot.decode_all::<T>()
	}

	pub fn find<T: Record>(&self, key: &T::Key) -> Result<Option<T>> {
		self.snapshot.decode_one::<T>(key)
	}

	/// Mints a thread-portable handle for the record with this key.
	pub fn handle<T: Record>(&self, key: T::Key) -> LiveHandle<T> {
		LiveHandle::new(key, &self.manager)
	}

	/// Reloads this session's view from the engine's current state.
	pub fn refresh(&mut self) -> Result<()> {
		self.snapshot = Snapshot::load(&*self.manager.engine, &self.manager.record_tables)?;
		Ok(())
	}

	/// Consumes this session and opens a write transaction on it. Blocks
	/// until any other outstanding writer finishes.
	pub fn begin_write(self) -> Result<Transaction> {
		let writer = self.manager.acquire_writer();
		Ok(Transaction::new(self.manager, self.snapshot, self.usage, writer, None))
	}
}
