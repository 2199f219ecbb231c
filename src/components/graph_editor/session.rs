use super::types::{NodeId, Point};

/// In-place rename of a single node.
#[derive(Clone, Debug, PartialEq)]
pub struct EditSession {
	node: NodeId,
	pending: String,
	overlay: Point,
}

/// What closing a session asks for.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEnd {
	Rename { node: NodeId, name: String },
	Discard { node: NodeId },
}

impl EditSession {
	/// `overlay` is where the text field goes, in page coordinates.
	pub fn open(node: NodeId, current_name: impl Into<String>, overlay: Point) -> Self {
		Self {
			node,
			pending: current_name.into(),
			overlay,
		}
	}

	pub fn node(&self) -> &NodeId {
		&self.node
	}

	pub fn pending(&self) -> &str {
		&self.pending
	}

	pub fn overlay(&self) -> Point {
		self.overlay
	}

	pub fn set_pending(&mut self, text: impl Into<String>) {
		self.pending = text.into();
	}

	/// Blank text discards, anything else becomes the trimmed new name.
	pub fn finish(self) -> SessionEnd {
		let name = self.pending.trim();
		if name.is_empty() {
			SessionEnd::Discard { node: self.node }
		} else {
			SessionEnd::Rename {
				name: name.to_string(),
				node: self.node,
			}
		}
	}
}
