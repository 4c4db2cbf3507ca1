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

use uuid::Uuid;

/// A notification about the progress of one import. Buffered during the
/// write transaction and dispatched only on commit; discarded on rollback,
/// so observers never see a set that later turns out not to exist.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImportEvent {
	Began { archive_name: String },
	Succeeded { set_id: Uuid },
	Failed { reason: String },
}

/// An in-process observer of import events, in addition to the
/// `log::info!` line every commit produces unconditionally.
pub trait EventSink: Send + Sync {
	fn on_event(&self, event: &ImportEvent);
}

/// An `EventSink` that does nothing, for callers that only want the log line.
pub struct NullSink;
impl EventSink for NullSink {
	fn on_event(&self, _event: &ImportEvent) {}
}

pub(crate) fn dispatch(events: &[ImportEvent], sink: &dyn EventSink) {
	for event in events {
		log::info!("import event: {event:?}");
		sink.on_event(event);
	}
}
