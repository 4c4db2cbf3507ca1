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

use parking_lot::{Mutex, MutexGuard};

/// Serializes blob writes by the first byte of their hash, so two concurrent
/// `add` calls for identical content never interleave partial writes to the
/// same path. The blob store itself offers no such guarantee.
pub struct HashLocks {
	stripes: Vec<Mutex<()>>,
}

impl Default for HashLocks {
	fn default() -> Self {
		HashLocks { stripes: (0..256).map(|_| Mutex::new(())).collect() }
	}
}

impl HashLocks {
	pub fn new() -> Self {
		Self::default()
	}

	fn stripe_for(hash: &str) -> usize {
		u8::from_str_radix(&hash[0..2], 16).map(|b| b as usize).unwrap_or(0)
	}

	/// Locks the stripe for `hash`, blocking until it's free.
	pub fn lock(&self, hash: &str) -> MutexGuard<'_, ()> {
		self.stripes[Self::stripe_for(hash)].lock()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn same_first_byte_maps_to_the_same_stripe() {
		let locks = HashLocks::new();
		let a = "ab".to_owned() + &"0".repeat(62);
		let b = "ab".to_owned() + &"1".repeat(62);
		assert_eq!(HashLocks::stripe_for(&a), HashLocks::stripe_for(&b));
		let _guard = locks.lock(&a);
	}

	#[test]
	fn different_first_byte_maps_to_different_stripes() {
		assert_ne!(HashLocks::stripe_for(&("00".to_owned() + &"0".repeat(62))), HashLocks::stripe_for(&("ff".to_owned() + &"0".repeat(62))));
	}
}
