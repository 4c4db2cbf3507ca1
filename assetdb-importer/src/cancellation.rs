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

use std::sync::{atomic::{AtomicBool, Ordering}, Arc};

use assetdb_error::{Error, Result};

/// A cheap, shareable cancellation flag. Checked at submission, at the start
/// of the write transaction, and before each expensive sub-step of an
/// import; never checked mid-step, so cancellation never leaves a partial
/// write visible (the enclosing transaction is simply rolled back).
#[derive(Clone, Default)]
pub struct CancellationToken {
	cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn cancel(&self) {
		self.cancelled.store(true, Ordering::SeqCst);
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancelled.load(Ordering::SeqCst)
	}

	pub fn check(&self) -> Result<()> {
		if self.is_cancelled() {
			Err(Error::Cancelled)
		} else {
			Ok(())
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn check_fails_once_cancelled() {
		let token = CancellationToken::new();
		token.check().unwrap();
		token.cancel();
		assert!(token.check().is_err());
	}

	#[test]
	fn clones_share_the_same_flag() {
		let token = CancellationToken::new();
		let clone = token.clone();
		clone.cancel();
		assert!(token.is_cancelled());
	}
}
