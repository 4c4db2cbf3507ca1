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

use crate::record::RulesetId;
use crate::Record;

/// A playable ruleset (game mode). Locally-authored rulesets carry no online
/// id; a ruleset imported from the online catalogue keeps the id it was
/// assigned there so re-imports resolve to the same row.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Ruleset {
	pub online_id: Option<i32>,
	pub name: String,
	pub short_name: String,
	pub instantiation_info: String,
	pub available: bool,
}

impl Record for Ruleset {
	type Key = RulesetId;

	const TABLE: &'static str = "rulesets";

	fn primary_key(&self) -> Self::Key {
		RulesetId(self.online_id)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::PrimaryKey;

	#[test]
	fn none_and_some_zero_encode_distinctly() {
		assert_ne!(RulesetId(None).encode(), RulesetId(Some(0)).encode());
	}

	#[test]
	fn primary_key_round_trips_online_id() {
		let r = Ruleset {
			online_id: Some(3),
			name: "osu!".into(),
			short_name: "osu".into(),
			instantiation_info: "osu.Rulesets.Osu".into(),
			available: true,
		};
		assert_eq!(r.primary_key(), RulesetId(Some(3)));
	}
}
