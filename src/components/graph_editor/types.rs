use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
	pub x: f64,
	pub y: f64,
}

impl Point {
	pub const fn new(x: f64, y: f64) -> Self {
		Self { x, y }
	}

	pub fn distance(self, other: Point) -> f64 {
		let (dx, dy) = (self.x - other.x, self.y - other.y);
		(dx * dx + dy * dy).sqrt()
	}
}

/// Ids arrive as JSON strings or integers depending on the server.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
	Text(String),
	Number(i64),
}

impl RawId {
	fn into_string(self) -> String {
		match self {
			RawId::Text(s) => s,
			RawId::Number(n) => n.to_string(),
		}
	}
}

/// Opaque node identifier handed out by the store.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "RawId")]
pub struct NodeId(pub String);

impl From<RawId> for NodeId {
	fn from(raw: RawId) -> Self {
		Self(raw.into_string())
	}
}

impl fmt::Display for NodeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for NodeId {
	fn from(s: &str) -> Self {
		Self(s.to_string())
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawId")]
pub struct GraphId(pub String);

impl From<RawId> for GraphId {
	fn from(raw: RawId) -> Self {
		Self(raw.into_string())
	}
}

impl fmt::Display for GraphId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for GraphId {
	fn from(s: &str) -> Self {
		Self(s.to_string())
	}
}

/// Where a node sits. A pinned node ignores the simulation until released.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Placement {
	Simulated(Point),
	Pinned(Point),
}

impl Placement {
	pub fn point(self) -> Point {
		match self {
			Placement::Simulated(p) | Placement::Pinned(p) => p,
		}
	}

	#[cfg(test)]
	pub fn is_pinned(self) -> bool {
		matches!(self, Placement::Pinned(_))
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
	pub id: NodeId,
	pub name: String,
	pub placement: Placement,
}

impl Node {
	pub fn new(id: NodeId, name: impl Into<String>, at: Point) -> Self {
		Self {
			id,
			name: name.into(),
			placement: Placement::Simulated(at),
		}
	}

	pub fn position(&self) -> Point {
		self.placement.point()
	}

	pub fn pin(&mut self, at: Point) {
		self.placement = Placement::Pinned(at);
	}

	pub fn release(&mut self) {
		self.placement = Placement::Simulated(self.position());
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Edge {
	pub source: NodeId,
	pub target: NodeId,
}

impl Edge {
	pub fn new(source: NodeId, target: NodeId) -> Self {
		Self { source, target }
	}

	pub fn touches(&self, id: &NodeId) -> bool {
		&self.source == id || &self.target == id
	}
}

/// The node and edge sets of the graph currently being edited.
#[derive(Clone, Debug, Default)]
pub struct GraphSnapshot {
	pub nodes: Vec<Node>,
	pub edges: Vec<Edge>,
}

impl GraphSnapshot {
	/// Builds a snapshot, dropping edges whose endpoints are unknown and
	/// collapsing repeated ordered pairs.
	pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
		let mut snapshot = Self {
			nodes,
			edges: Vec::with_capacity(edges.len()),
		};
		for edge in edges {
			if snapshot.contains(&edge.source)
				&& snapshot.contains(&edge.target)
				&& !snapshot.has_edge(&edge.source, &edge.target)
			{
				snapshot.edges.push(edge);
			}
		}
		snapshot
	}

	pub fn index_of(&self, id: &NodeId) -> Option<usize> {
		self.nodes.iter().position(|n| &n.id == id)
	}

	pub fn contains(&self, id: &NodeId) -> bool {
		self.index_of(id).is_some()
	}

	pub fn node(&self, id: &NodeId) -> Option<&Node> {
		self.nodes.iter().find(|n| &n.id == id)
	}

	pub fn node_mut(&mut self, id: &NodeId) -> Option<&mut Node> {
		self.nodes.iter_mut().find(|n| &n.id == id)
	}

	pub fn has_edge(&self, source: &NodeId, target: &NodeId) -> bool {
		self.edges
			.iter()
			.any(|e| &e.source == source && &e.target == target)
	}

	/// Returns false when the node id is already present.
	pub fn add_node(&mut self, node: Node) -> bool {
		if self.contains(&node.id) {
			return false;
		}
		self.nodes.push(node);
		true
	}

	/// Removes the node together with every edge touching it.
	pub fn remove_node(&mut self, id: &NodeId) -> Option<Node> {
		let idx = self.index_of(id)?;
		self.edges.retain(|e| !e.touches(id));
		Some(self.nodes.remove(idx))
	}

	/// Adds `source -> target` unless an endpoint is missing or the ordered
	/// pair already exists.
	pub fn add_edge(&mut self, source: NodeId, target: NodeId) -> bool {
		if !self.contains(&source) || !self.contains(&target) || self.has_edge(&source, &target) {
			return false;
		}
		self.edges.push(Edge::new(source, target));
		true
	}

	/// Returns false when the ordered pair was not present.
	pub fn remove_edge(&mut self, source: &NodeId, target: &NodeId) -> bool {
		let before = self.edges.len();
		self.edges.retain(|e| &e.source != source || &e.target != target);
		self.edges.len() != before
	}

	/// Edges as index pairs into `nodes`.
	pub fn edge_indices(&self) -> Vec<(usize, usize)> {
		self.edges
			.iter()
			.filter_map(|e| Some((self.index_of(&e.source)?, self.index_of(&e.target)?)))
			.collect()
	}
}
