use std::collections::HashMap;

use super::types::{NodeId, Point};

/// Last observed position of every node, keyed by id so it outlives layout
/// rebuilds.
#[derive(Clone, Debug, Default)]
pub struct PositionCache {
	entries: HashMap<NodeId, Point>,
	#[cfg(test)]
	revision: u64,
}

impl PositionCache {
	pub fn get(&self, id: &NodeId) -> Option<Point> {
		self.entries.get(id).copied()
	}

	pub fn record(&mut self, id: &NodeId, at: Point) {
		#[cfg(test)]
		{
			self.revision += 1;
		}
		match self.entries.get_mut(id) {
			Some(slot) => *slot = at,
			None => {
				self.entries.insert(id.clone(), at);
			}
		}
	}

	pub fn forget(&mut self, id: &NodeId) {
		self.entries.remove(id);
	}

	/// Drops every entry whose id fails `keep`.
	pub fn prune(&mut self, mut keep: impl FnMut(&NodeId) -> bool) {
		self.entries.retain(|id, _| keep(id));
	}

	/// Bumped on every write.
	#[cfg(test)]
	pub fn revision(&self) -> u64 {
		self.revision
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}
}
