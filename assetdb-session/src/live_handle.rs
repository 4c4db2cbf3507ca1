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

use std::{sync::Weak, thread::ThreadId};

use assetdb_error::{Error, Result};
use assetdb_schema::Record;

use crate::manager::SessionManager;

/// Marker for types that are safe to return out of a
/// [`LiveHandle::perform_read`]/[`perform_write`](LiveHandle::perform_write)
/// callback. Record types deliberately do not implement it: the callback
/// must extract a plain value (a clone of a field, a computed summary)
/// rather than let the managed record itself escape its session scope.
pub trait NotManaged {}

impl NotManaged for () {}
impl NotManaged for bool {}
impl NotManaged for String {}
impl NotManaged for i8 {}
impl NotManaged for i16 {}
impl NotManaged for i32 {}
impl NotManaged for i64 {}
impl NotManaged for u8 {}
impl NotManaged for u16 {}
impl NotManaged for u32 {}
impl NotManaged for u64 {}
impl NotManaged for usize {}
impl NotManaged for f32 {}
impl NotManaged for f64 {}
impl NotManaged for uuid::Uuid {}
impl<T: NotManaged> NotManaged for Option<T> {}
impl<T: NotManaged> NotManaged for Vec<T> {}

/// A thread-portable reference to a persisted record, by primary key.
///
/// Fetched on one thread, a record can't simply be handed to another: the
/// session it came from is thread-bound. A `LiveHandle` instead remembers
/// *how* to re-resolve the record — the manager, the key, and the thread it
/// was minted on — and re-resolves on every access.
pub struct LiveHandle<T: Record> {
	key: T::Key,
	origin_thread: ThreadId,
	manager: Weak<SessionManager>,
}

impl<T: Record> LiveHandle<T> {
	pub(crate) fn new(key: T::Key, manager: &std::sync::Arc<SessionManager>) -> Self {
		LiveHandle { key, origin_thread: std::thread::current().id(), manager: std::sync::Arc::downgrade(manager) }
	}

	pub fn primary_key(&self) -> &T::Key {
		&self.key
	}

	/// Reads the record and returns whatever `f` computes from it.
	///
	/// If called from the handle's originating thread while that thread's
	/// update session is still live, this reuses it directly. Otherwise it
	/// opens a transient read session just for this call.
	pub fn perform_read<F, R>(&self, f: F) -> Result<R>
	where
		F: FnOnce(&T) -> R,
		R: NotManaged,
	{
		let manager = self.manager.upgrade().ok_or(Error::Closed)?;
		if std::thread::current().id() == self.origin_thread {
			if let Ok(update) = manager.update_session() {
				if let Some(record) = update.find::<T>(&self.key)? {
					return Ok(f(&record));
				}
				return Err(Error::NotFound);
			}
		}
		let session = manager.read_session()?;
		let record = session.find::<T>(&self.key)?.ok_or(Error::NotFound)?;
		Ok(f(&record))
	}

	/// Mutates the record: opens a fresh write session, resolves the record,
	/// invokes `f`, persists the result, and commits — or rolls back if `f`
	/// returns an error.
	pub fn perform_write<F, R>(&self, f: F) -> Result<R>
	where
		F: FnOnce(&mut T) -> Result<R>,
		R: NotManaged,
	{
		let manager = self.manager.upgrade().ok_or(Error::Closed)?;
		let mut tr = manager.write_session()?;
		let mut record = tr.find::<T>(&self.key)?.ok_or(Error::NotFound)?;
		let result = f(&mut record);
		match result {
			Ok(value) => {
				tr.add(record, true)?;
				tr.commit()?;
				Ok(value)
			}
			Err(e) => {
				tr.rollback();
				Err(e)
			}
		}
	}
}

impl<T: Record> Clone for LiveHandle<T> {
	fn clone(&self) -> Self {
		LiveHandle { key: self.key.clone(), origin_thread: self.origin_thread, manager: self.manager.clone() }
	}
}
