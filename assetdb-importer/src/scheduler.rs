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

use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};

use assetdb_error::{Error, Result};

use crate::cancellation::CancellationToken;

/// Which of the two serial queues a job runs on.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Priority {
	Normal,
	Low,
}

/// One queued request for a turn: the worker thread signals `granted` as
/// soon as it is this ticket's turn, then blocks on `release` before taking
/// the next ticket off the channel. This is what makes the *caller's* work
/// (not just the act of queueing) run one at a time per priority, even
/// though that work executes back on the submitting thread rather than on
/// the worker thread itself (an import takes `&dyn ArchiveReader`, which
/// isn't `'static`, so it can't be moved into a worker-thread closure).
struct Ticket {
	granted: Sender<()>,
	release: Receiver<()>,
}

/// Held for the duration of one serialized unit of work. Dropping it — by
/// any path, including an early return via `?` — lets the next queued
/// caller on the same priority proceed.
pub struct Permit {
	release: Sender<()>,
}

impl Drop for Permit {
	fn drop(&mut self) {
		let _ = self.release.send(());
	}
}

/// Two single-concurrency queues, `normal` and `low priority`, each drained
/// by one dedicated worker thread. [`acquire`](Self::acquire) blocks the
/// calling thread until it is granted the head of its queue, and returns a
/// [`Permit`] the caller must hold for as long as the serialized work lasts.
pub struct Scheduler {
	normal: Sender<Ticket>,
	low: Sender<Ticket>,
}

impl Default for Scheduler {
	fn default() -> Self {
		Self::new()
	}
}

fn spawn_turnstile(name: &str, rx: Receiver<Ticket>) {
	thread::Builder::new()
		.name(name.to_owned())
		.spawn(move || {
			for ticket in rx {
				if ticket.granted.send(()).is_err() {
					continue;
				}
				let _ = ticket.release.recv();
			}
		})
		.unwrap_or_else(|e| panic!("failed to spawn {name}: {e}"));
}

impl Scheduler {
	pub fn new() -> Self {
		let (normal_tx, normal_rx) = crossbeam_channel::unbounded::<Ticket>();
		let (low_tx, low_rx) = crossbeam_channel::unbounded::<Ticket>();

		spawn_turnstile("assetdb-import-normal", normal_rx);
		spawn_turnstile("assetdb-import-low", low_rx);

		Scheduler { normal: normal_tx, low: low_tx }
	}

	/// Blocks until it is this caller's turn on `priority`'s queue. Checked
	/// at submission (before the ticket is even queued) and again once
	/// granted (in case `cancel` was set while queued behind another);
	/// either failure leaves the turnstile free for the next ticket.
	pub fn acquire(&self, priority: Priority, cancel: &CancellationToken) -> Result<Permit> {
		cancel.check()?;
		let (granted_tx, granted_rx) = bounded(1);
		let (release_tx, release_rx) = bounded(1);
		let sender = match priority {
			Priority::Normal => &self.normal,
			Priority::Low => &self.low,
		};
		sender.send(Ticket { granted: granted_tx, release: release_rx }).map_err(|_| Error::Closed)?;
		granted_rx.recv().map_err(|_| Error::Closed)?;

		if let Err(e) = cancel.check() {
			let _ = release_tx.send(());
			return Err(e);
		}
		Ok(Permit { release: release_tx })
	}
}

#[cfg(test)]
mod tests {
	use std::{
		sync::{
			atomic::{AtomicBool, AtomicUsize, Ordering},
			Arc,
		},
		time::Duration,
	};

	use super::*;

	#[test]
	fn a_second_acquire_blocks_until_the_first_permit_is_dropped() {
		let scheduler = Arc::new(Scheduler::new());
		let permit = scheduler.acquire(Priority::Normal, &CancellationToken::new()).unwrap();

		let done = Arc::new(AtomicBool::new(false));
		let done_clone = done.clone();
		let scheduler_clone = scheduler.clone();
		let handle = thread::spawn(move || {
			let _second = scheduler_clone.acquire(Priority::Normal, &CancellationToken::new()).unwrap();
			done_clone.store(true, Ordering::SeqCst);
		});

		thread::sleep(Duration::from_millis(50));
		assert!(!done.load(Ordering::SeqCst));

		drop(permit);
		handle.join().unwrap();
		assert!(done.load(Ordering::SeqCst));
	}

	#[test]
	fn tickets_on_the_same_queue_are_granted_in_submission_order() {
		let scheduler = Arc::new(Scheduler::new());
		let order = Arc::new(AtomicUsize::new(0));
		let first = scheduler.acquire(Priority::Normal, &CancellationToken::new()).unwrap();

		let seen = Arc::new(AtomicUsize::new(usize::MAX));
		let order_clone = order.clone();
		let seen_clone = seen.clone();
		let scheduler_clone = scheduler.clone();
		let handle = thread::spawn(move || {
			let _permit = scheduler_clone.acquire(Priority::Normal, &CancellationToken::new()).unwrap();
			seen_clone.store(order_clone.fetch_add(1, Ordering::SeqCst), Ordering::SeqCst);
		});

		thread::sleep(Duration::from_millis(30));
		let mine = order.fetch_add(1, Ordering::SeqCst);
		drop(first);
		handle.join().unwrap();

		assert_eq!(mine, 0);
		assert_eq!(seen.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn low_and_normal_queues_do_not_block_each_other() {
		let scheduler = Scheduler::new();
		let normal = scheduler.acquire(Priority::Normal, &CancellationToken::new()).unwrap();
		let low = scheduler.acquire(Priority::Low, &CancellationToken::new()).unwrap();
		drop((normal, low));
	}

	#[test]
	fn a_pre_cancelled_token_is_refused_without_being_queued() {
		let scheduler = Scheduler::new();
		let token = CancellationToken::new();
		token.cancel();
		let err = scheduler.acquire(Priority::Normal, &token).unwrap_err();
		assert_eq!(err.kind(), assetdb_error::ErrorKind::Cancelled);
	}
}
