use super::types::{GraphSnapshot, Node, NodeId, Point};

/// Drawn radius of a node, also the pick radius for hit tests.
pub const NODE_RADIUS: f64 = 25.0;
const LABEL_MAX: usize = 8;

/// Labels longer than eight characters keep seven and gain an ellipsis.
pub fn truncate_label(name: &str) -> String {
	if name.chars().count() > LABEL_MAX {
		let head: String = name.chars().take(LABEL_MAX - 1).collect();
		format!("{head}...")
	} else {
		name.to_string()
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct NodeGlyph {
	pub id: NodeId,
	pub label: String,
	pub at: Point,
	pub selected: bool,
	pub editing: bool,
	pub drag_source: bool,
	pub drag_target: bool,
}

/// A drawn edge; `source`/`target` index into `Scene::nodes`.
#[derive(Clone, Debug, PartialEq)]
pub struct EdgeLine {
	pub source: usize,
	pub target: usize,
	pub from: Point,
	pub to: Point,
}

/// Everything the editor state implies about the picture.
#[derive(Clone, Copy, Debug, Default)]
pub struct SceneInput<'a> {
	pub graph: Option<&'a GraphSnapshot>,
	pub selected: Option<&'a NodeId>,
	pub editing: Option<&'a NodeId>,
	pub drag_source: Option<&'a NodeId>,
	pub drag_target: Option<&'a NodeId>,
	pub drag_line: Option<(Point, Point)>,
	pub mode_class: Option<&'static str>,
}

/// Drawable picture of the graph, rebuilt on structural change and patched
/// in place on ticks and drags.
#[derive(Clone, Debug, Default)]
pub struct Scene {
	pub nodes: Vec<NodeGlyph>,
	pub edges: Vec<EdgeLine>,
	pub drag_line: Option<(Point, Point)>,
	pub mode_class: Option<&'static str>,
	#[cfg(test)]
	rebuilds: u64,
}

impl Scene {
	pub fn rebuild(&mut self, input: SceneInput<'_>) {
		#[cfg(test)]
		{
			self.rebuilds += 1;
		}
		self.nodes.clear();
		self.edges.clear();
		self.drag_line = input.drag_line;
		self.mode_class = input.mode_class;
		let Some(graph) = input.graph else {
			return;
		};
		let is = |slot: Option<&NodeId>, id: &NodeId| slot == Some(id);
		self.nodes = graph
			.nodes
			.iter()
			.map(|n| NodeGlyph {
				id: n.id.clone(),
				label: truncate_label(&n.name),
				at: n.position(),
				selected: is(input.selected, &n.id),
				editing: is(input.editing, &n.id),
				drag_source: is(input.drag_source, &n.id),
				drag_target: is(input.drag_target, &n.id),
			})
			.collect();
		self.edges = graph
			.edge_indices()
			.into_iter()
			.map(|(source, target)| EdgeLine {
				source,
				target,
				from: self.nodes[source].at,
				to: self.nodes[target].at,
			})
			.collect();
	}

	/// Number of full rebuilds so far.
	#[cfg(test)]
	pub fn rebuilds(&self) -> u64 {
		self.rebuilds
	}

	/// Copies positions from `nodes`, which must be in glyph order.
	pub fn sync_positions(&mut self, nodes: &[Node]) {
		if nodes.len() != self.nodes.len() {
			return;
		}
		for (glyph, node) in self.nodes.iter_mut().zip(nodes) {
			glyph.at = node.position();
		}
		for edge in &mut self.edges {
			edge.from = self.nodes[edge.source].at;
			edge.to = self.nodes[edge.target].at;
		}
	}

	/// Moves one glyph and the ends of its edges.
	pub fn move_node(&mut self, id: &NodeId, at: Point) {
		let Some(idx) = self.nodes.iter().position(|g| &g.id == id) else {
			return;
		};
		self.nodes[idx].at = at;
		for edge in &mut self.edges {
			if edge.source == idx {
				edge.from = at;
			}
			if edge.target == idx {
				edge.to = at;
			}
		}
	}

	pub fn set_drag_line(&mut self, line: Option<(Point, Point)>) {
		self.drag_line = line;
	}

	#[cfg(test)]
	pub fn glyph(&self, id: &NodeId) -> Option<&NodeGlyph> {
		self.nodes.iter().find(|g| &g.id == id)
	}
}
