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

use assetdb_error::{Error, Result};
use assetdb_schema::Record;

use crate::{
	live_handle::LiveHandle,
	manager::{SessionManager, UpdateState},
	snapshot::Snapshot,
	transaction::Transaction,
};

fn check_thread(update: &UpdateState) -> Result<()> {
	if update.thread == std::thread::current().id() {
		Ok(())
	} else {
		Err(Error::Closed)
	}
}

/// A handle onto the single long-lived session bound to the update thread.
/// Cheap to obtain repeatedly via
/// [`SessionManager::update_session`](crate::SessionManager::update_session);
/// every handle refers to the same underlying cached view.
pub struct UpdateSessionHandle {
	pub(crate) manager: Arc<SessionManager>,
}

impl UpdateSessionHandle {
	pub fn all<T: Record>(&self) -> Result<Vec<T>> {
		let state = self.manager.state.lock();
		let update = state.update.as_ref().ok_or(Error::Closed)?;
		check_thread(update)?;
		update.snapshot.decode_all::<T>()
	}

	pub fn find<T: Record>(&self, key: &T::Key) -> Result<Option<T>> {
		let state = self.manager.state.lock();
		let update = state.update.as_ref().ok_or(Error::Closed)?;
		check_thread(update)?;
		update.snapshot.decode_one::<T>(key)
	}

	/// Pulls in commits made by other sessions since the last refresh (or
	/// since this session was created). The host's update tick is expected
	/// to call this periodically.
	pub fn refresh(&self) -> Result<()> {
		let tables = self.manager.record_tables.clone();
		let fresh = Snapshot::load(&*self.manager.engine, &tables)?;
		let mut state = self.manager.state.lock();
		let update = state.update.as_mut().ok_or(Error::Closed)?;
		check_thread(update)?;
		update.snapshot = fresh;
		Ok(())
	}

	/// Mints a thread-portable handle for the record with this key.
	pub fn handle<T: Record>(&self, key: T::Key) -> LiveHandle<T> {
		LiveHandle::new(key, &self.manager)
	}

	/// Opens a write transaction on this session. Its commits are folded
	/// back into the cached view immediately, without needing a `refresh()`.
	pub fn begin_write(&self) -> Result<Transaction> {
		let base = {
			let state = self.manager.state.lock();
			let update = state.update.as_ref().ok_or(Error::Closed)?;
			check_thread(update)?;
			update.snapshot.clone()
		};
		let usage = self.manager.enter()?;
		let writer = self.manager.acquire_writer();
		Ok(Transaction::new(self.manager.clone(), base, usage, writer, Some(std::thread::current().id())))
	}
}
