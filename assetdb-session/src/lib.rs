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

//! Owns the single embedded database and grants three kinds of thread-scoped
//! access to it: one long-lived session bound to a designated "update"
//! thread, transient read sessions usable from anywhere, and serialized
//! write sessions. Builds the [`LiveHandle`] that lets a record fetched on
//! one thread be safely touched from another.

mod live_handle;
mod manager;
mod session;
mod snapshot;
mod transaction;
mod update;

pub use live_handle::{LiveHandle, NotManaged};
pub use manager::{Migration, QuiesceToken, SessionManager};
pub use session::Session;
pub use transaction::Transaction;
pub use update::UpdateSessionHandle;

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use assetdb_schema::{File, Record, Ruleset};

	use super::*;

	fn manager() -> Arc<SessionManager> {
		let engine = Arc::new(assetdb_engine_memory::create(assetdb_schema::all_columns()));
		SessionManager::open(engine).unwrap()
	}

	#[test]
	fn migration_seeds_default_rulesets() {
		let mgr = manager();
		let session = mgr.read_session().unwrap();
		let rulesets = session.all::<Ruleset>().unwrap();
		assert_eq!(rulesets.len(), 4);
	}

	#[test]
	fn write_session_commit_is_visible_to_new_read_sessions() {
		let mgr = manager();
		let mut tr = mgr.write_session().unwrap();
		tr.add(File::new("a".repeat(64), "a/aa/".to_owned() + &"a".repeat(64)), false).unwrap();
		tr.commit().unwrap();

		let session = mgr.read_session().unwrap();
		assert_eq!(session.all::<File>().unwrap().len(), 1);
	}

	#[test]
	fn dropping_a_transaction_without_commit_rolls_back() {
		let mgr = manager();
		{
			let mut tr = mgr.write_session().unwrap();
			tr.add(File::new("b".repeat(64), "x"), false).unwrap();
			// dropped without commit
		}
		let session = mgr.read_session().unwrap();
		assert_eq!(session.all::<File>().unwrap().len(), 0);
	}

	#[test]
	fn duplicate_primary_key_without_update_existing_fails() {
		let mgr = manager();
		let mut tr = mgr.write_session().unwrap();
		tr.add(File::new("c".repeat(64), "x"), false).unwrap();
		let err = tr.add(File::new("c".repeat(64), "y"), false).unwrap_err();
		assert_eq!(err.kind(), assetdb_error::ErrorKind::DuplicatePrimaryKey);
	}

	#[test]
	fn update_session_only_usable_from_its_own_thread() {
		let mgr = manager();
		mgr.update_session().unwrap();
		let mgr2 = mgr.clone();
		let joined = std::thread::spawn(move || mgr2.update_session().is_err()).join().unwrap();
		assert!(joined);
	}

	#[test]
	fn update_session_sees_its_own_write_without_refresh() {
		let mgr = manager();
		let update = mgr.update_session().unwrap();
		let mut tr = update.begin_write().unwrap();
		tr.add(File::new("d".repeat(64), "x"), false).unwrap();
		tr.commit().unwrap();
		assert_eq!(update.all::<File>().unwrap().len(), 1);
	}

	#[test]
	fn live_handle_resolves_from_another_thread() {
		let mgr = manager();
		let mut tr = mgr.write_session().unwrap();
		tr.add(File::new("e".repeat(64), "x"), false).unwrap();
		let handle = tr.handle::<File>("e".repeat(64));
		tr.commit().unwrap();

		let storage_path = std::thread::spawn(move || handle.perform_read(|f| f.storage_path.clone())).join().unwrap().unwrap();
		assert_eq!(storage_path, "x");
	}

	#[test]
	fn live_handle_on_deleted_record_fails_with_not_found() {
		let mgr = manager();
		let mut tr = mgr.write_session().unwrap();
		tr.add(File::new("f".repeat(64), "x"), false).unwrap();
		let handle = tr.handle::<File>("f".repeat(64));
		tr.commit().unwrap();

		let mut tr = mgr.write_session().unwrap();
		tr.remove::<File>(&"f".repeat(64)).unwrap();
		tr.commit().unwrap();

		let err = handle.perform_read(|f| f.storage_path.clone()).unwrap_err();
		assert_eq!(err.kind(), assetdb_error::ErrorKind::NotFound);
	}

	#[test]
	fn block_all_operations_closes_update_session() {
		let mgr = manager();
		mgr.update_session().unwrap();
		let _token = mgr.block_all_operations().unwrap();
		// the update session was closed as part of quiescing; a fresh call
		// from the same thread creates a new one once the token is dropped.
	}
}
