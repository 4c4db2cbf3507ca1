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

//! Tagged error kinds for the asset store. Every public operation in the
//! workspace returns `assetdb_error::Result<T>` rather than going through a
//! single untyped `io::Error`, so callers can match on `ErrorKind` instead
//! of sniffing strings.

use std::{fmt, io, path::PathBuf};

/// Result alias used throughout the asset store crates.
pub type Result<T> = std::result::Result<T, Error>;

/// A tagged error kind, paired with an optional source error and context.
#[derive(thiserror::Error, Debug)]
pub enum Error {
	/// An I/O operation against the blob store or the database directory failed.
	#[error("I/O failure at {path}: {source}")]
	IoFailure {
		path: PathBuf,
		#[source]
		source: io::Error,
	},

	/// The session manager has been disposed and no longer grants sessions.
	#[error("database manager is closed")]
	Closed,

	/// The database file could not be acquired (locked, missing directory, corrupt beyond repair).
	#[error("database storage unavailable: {0}")]
	StorageUnavailable(String),

	/// A registered migration failed while upgrading the schema version.
	#[error("schema migration to version {to_version} failed: {reason}")]
	SchemaMigrationFailed { to_version: u32, reason: String },

	/// A mutating call was made on a record that is not attached to an open write transaction.
	#[error("record is not attached to an open write transaction")]
	NotInTransaction,

	/// Resolution of a record by primary key found nothing (deleted, or never existed).
	#[error("no record found for the given key")]
	NotFound,

	/// A live-handle callback attempted to return a managed record out of its session scope.
	#[error("managed record escaped its session scope")]
	LeakedManagedObject,

	/// `add` was asked to insert a record whose primary key already exists, with `update_existing = false`.
	#[error("primary key already exists")]
	DuplicatePrimaryKey,

	/// The operation's cancellation token was set before or during the operation.
	#[error("operation cancelled")]
	Cancelled,

	/// Stage 1 of the importer pipeline could not construct a skeletal model from the archive.
	#[error("could not create an import model: {0}")]
	ModelCreationFailed(String),

	/// The importer's `populate` hook raised while filling in set/beatmap records.
	#[error("populate failed: {0}")]
	PopulateFailed(String),

	/// A transaction was rolled back; carries the reason it was rolled back for, for logging.
	#[error("transaction rolled back: {0}")]
	Rollback(String),
}

impl Error {
	/// Tag for matching without destructuring, used in tests and logging call sites.
	pub fn kind(&self) -> ErrorKind {
		match self {
			Error::IoFailure { .. } => ErrorKind::IoFailure,
			Error::Closed => ErrorKind::Closed,
			Error::StorageUnavailable(_) => ErrorKind::StorageUnavailable,
			Error::SchemaMigrationFailed { .. } => ErrorKind::SchemaMigrationFailed,
			Error::NotInTransaction => ErrorKind::NotInTransaction,
			Error::NotFound => ErrorKind::NotFound,
			Error::LeakedManagedObject => ErrorKind::LeakedManagedObject,
			Error::DuplicatePrimaryKey => ErrorKind::DuplicatePrimaryKey,
			Error::Cancelled => ErrorKind::Cancelled,
			Error::ModelCreationFailed(_) => ErrorKind::ModelCreationFailed,
			Error::PopulateFailed(_) => ErrorKind::PopulateFailed,
			Error::Rollback(_) => ErrorKind::Rollback,
		}
	}

	pub fn io_failure(path: impl Into<PathBuf>, source: io::Error) -> Self {
		Error::IoFailure { path: path.into(), source }
	}
}

/// The bare tag of an [`Error`], for matching without the payload.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ErrorKind {
	IoFailure,
	Closed,
	StorageUnavailable,
	SchemaMigrationFailed,
	NotInTransaction,
	NotFound,
	LeakedManagedObject,
	DuplicatePrimaryKey,
	Cancelled,
	ModelCreationFailed,
	PopulateFailed,
	Rollback,
}

impl fmt::Display for ErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			ErrorKind::IoFailure => "io_failure",
			ErrorKind::Closed => "closed",
			ErrorKind::StorageUnavailable => "storage_unavailable",
			ErrorKind::SchemaMigrationFailed => "schema_migration_failed",
			ErrorKind::NotInTransaction => "not_in_transaction",
			ErrorKind::NotFound => "not_found",
			ErrorKind::LeakedManagedObject => "leaked_managed_object",
			ErrorKind::DuplicatePrimaryKey => "duplicate_primary_key",
			ErrorKind::Cancelled => "cancelled",
			ErrorKind::ModelCreationFailed => "model_creation_failed",
			ErrorKind::PopulateFailed => "populate_failed",
			ErrorKind::Rollback => "rollback",
		};
		f.write_str(s)
	}
}

/// Converts a generic I/O error into an [`Error::IoFailure`] rooted at `path`.
pub fn io_err(path: impl Into<PathBuf>, source: io::Error) -> Error {
	Error::io_failure(path, source)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn kind_matches_variant() {
		let err = Error::NotFound;
		assert_eq!(err.kind(), ErrorKind::NotFound);
	}

	#[test]
	fn io_failure_carries_path_and_source() {
		let source = io::Error::new(io::ErrorKind::NotFound, "missing");
		let err = io_err("files/ab/abcd", source);
		assert_eq!(err.kind(), ErrorKind::IoFailure);
		assert!(err.to_string().contains("files/ab/abcd"));
	}
}
