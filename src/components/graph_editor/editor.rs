use log::{debug, info, warn};

use super::gesture::{Gesture, GestureInterpreter, PointerButton, ViewTransform};
use super::layout::{Layout, initial_placement};
use super::mode::InteractionMode;
use super::positions::PositionCache;
use super::scene::{NODE_RADIUS, Scene, SceneInput};
use super::session::{EditSession, SessionEnd};
use super::types::{Edge, GraphId, GraphSnapshot, Node, NodeId, Point};
use crate::config::LayoutConfig;
use crate::store::{GraphSummary, LoadedGraph, StoreOutcome, StoreRequest};

#[derive(Clone, Debug)]
struct ActiveGraph {
	id: GraphId,
	snapshot: GraphSnapshot,
}

/// Link drag in progress: the pinned source, the pointer, and the node the
/// pointer is over.
#[derive(Clone, Debug)]
struct LinkDrag {
	source: NodeId,
	pointer: Point,
	target: Option<NodeId>,
}

/// Move drag in progress. The node follows the pointer's travel since the
/// press, so it keeps the offset it was grabbed at.
#[derive(Clone, Debug)]
struct MoveDrag {
	node: NodeId,
	start: Point,
	grab: Point,
}

/// Editor core: owns the active graph, the layout, the current mode and
/// every piece of pointer state.
///
/// The host feeds it raw pointer input and animation frames. Persistence is
/// never awaited here; mutations are applied optimistically and queued as
/// [`StoreRequest`]s that the host drains with [`GraphEditor::take_requests`],
/// executes, and hands back through [`GraphEditor::apply_outcome`].
pub struct GraphEditor {
	graphs: Vec<GraphSummary>,
	active: Option<ActiveGraph>,
	loading: bool,
	mode: InteractionMode,
	selected: Option<NodeId>,
	session: Option<EditSession>,
	layout: Layout,
	positions: PositionCache,
	gestures: GestureInterpreter,
	view: ViewTransform,
	link: Option<LinkDrag>,
	moving: Option<MoveDrag>,
	scene: Scene,
	layout_dirty: bool,
	scene_dirty: bool,
	outbox: Vec<StoreRequest>,
	status: String,
	error: Option<String>,
	size: (f64, f64),
	container_offset: Point,
}

impl GraphEditor {
	pub fn new(config: LayoutConfig, width: f64, height: f64) -> Self {
		Self {
			graphs: Vec::new(),
			active: None,
			loading: false,
			mode: InteractionMode::default(),
			selected: None,
			session: None,
			layout: Layout::new(config, Point::new(width / 2.0, height / 2.0)),
			positions: PositionCache::default(),
			gestures: GestureInterpreter::default(),
			view: ViewTransform::default(),
			link: None,
			moving: None,
			scene: Scene::default(),
			layout_dirty: false,
			scene_dirty: true,
			outbox: Vec::new(),
			status: InteractionMode::default().hint().to_string(),
			error: None,
			size: (width, height),
			container_offset: Point::default(),
		}
	}

	pub fn resize(&mut self, width: f64, height: f64) {
		self.size = (width, height);
		self.layout.set_center(Point::new(width / 2.0, height / 2.0));
	}

	/// Page offset of the canvas, added to rename overlay positions.
	pub fn set_container_offset(&mut self, offset: Point) {
		self.container_offset = offset;
	}

	pub fn size(&self) -> (f64, f64) {
		self.size
	}

	pub fn graphs(&self) -> &[GraphSummary] {
		&self.graphs
	}

	pub fn active_graph(&self) -> Option<&GraphId> {
		self.active.as_ref().map(|a| &a.id)
	}

	pub fn graph(&self) -> Option<&GraphSnapshot> {
		self.active.as_ref().map(|a| &a.snapshot)
	}

	pub fn is_loading(&self) -> bool {
		self.loading
	}

	pub fn mode(&self) -> InteractionMode {
		self.mode
	}

	pub fn selected(&self) -> Option<&NodeId> {
		self.selected.as_ref()
	}

	pub fn session(&self) -> Option<&EditSession> {
		self.session.as_ref()
	}

	pub fn view(&self) -> &ViewTransform {
		&self.view
	}

	pub fn scene(&self) -> &Scene {
		&self.scene
	}

	#[cfg(test)]
	pub fn layout(&self) -> &Layout {
		&self.layout
	}

	#[cfg(test)]
	pub fn positions(&self) -> &PositionCache {
		&self.positions
	}

	pub fn status(&self) -> &str {
		&self.status
	}

	pub fn error(&self) -> Option<&str> {
		self.error.as_deref()
	}

	pub fn dismiss_error(&mut self) {
		self.error = None;
	}

	/// `(id, name)` of every node, in drawing order.
	pub fn node_names(&self) -> Vec<(NodeId, String)> {
		self.graph()
			.map(|g| g.nodes.iter().map(|n| (n.id.clone(), n.name.clone())).collect())
			.unwrap_or_default()
	}

	/// `(source, target, "A -> B")` for every edge.
	pub fn edge_labels(&self) -> Vec<(NodeId, NodeId, String)> {
		self.graph()
			.map(|g| {
				g.edges
					.iter()
					.map(|e| {
						let label = self.edge_label(&e.source, &e.target);
						(e.source.clone(), e.target.clone(), label)
					})
					.collect()
			})
			.unwrap_or_default()
	}

	/// Requests queued since the last call.
	pub fn take_requests(&mut self) -> Vec<StoreRequest> {
		std::mem::take(&mut self.outbox)
	}

	fn editable(&self) -> Option<&GraphId> {
		if self.loading {
			return None;
		}
		self.active_graph()
	}

	fn snapshot_mut(&mut self) -> Option<&mut GraphSnapshot> {
		self.active.as_mut().map(|a| &mut a.snapshot)
	}

	fn node_position(&self, id: &NodeId) -> Option<Point> {
		self.graph()?.node(id).map(Node::position)
	}

	fn structure_changed(&mut self) {
		self.layout_dirty = true;
		self.scene_dirty = true;
	}

	pub fn refresh_graphs(&mut self) {
		self.outbox.push(StoreRequest::ListGraphs);
	}

	pub fn create_graph(&mut self, name: &str) {
		let name = name.trim();
		if name.is_empty() {
			return;
		}
		self.outbox.push(StoreRequest::CreateGraph { name: name.to_string() });
	}

	/// Makes `graph` the active graph and asks for its contents. Editing is
	/// blocked until they arrive.
	pub fn select_graph(&mut self, graph: GraphId) {
		info!("selecting graph {graph}");
		self.reset_interaction();
		self.active = Some(ActiveGraph {
			id: graph.clone(),
			snapshot: GraphSnapshot::default(),
		});
		self.loading = true;
		self.status = "Loading graph...".into();
		self.outbox.push(StoreRequest::LoadGraph { graph });
	}

	/// Drops `graph` from the list and asks the store to delete it. Deleting
	/// the open graph closes it.
	pub fn delete_graph(&mut self, graph: &GraphId) {
		self.graphs.retain(|g| &g.id != graph);
		if self.active_graph() == Some(graph) {
			self.reset_interaction();
			self.active = None;
			self.loading = false;
		}
		info!("deleting graph {graph}");
		self.outbox.push(StoreRequest::DeleteGraph {
			graph: graph.clone(),
		});
	}

	fn reset_interaction(&mut self) {
		self.gestures = GestureInterpreter::default();
		if self.layout.is_suspended() {
			self.layout.resume();
		}
		self.selected = None;
		self.session = None;
		self.link = None;
		self.moving = None;
		self.structure_changed();
	}

	/// Switching modes changes how later gestures are read, nothing else.
	pub fn set_mode(&mut self, mode: InteractionMode) {
		if self.mode == mode {
			return;
		}
		debug!("mode {:?} -> {:?}", self.mode, mode);
		self.mode = mode;
		self.status = mode.hint().to_string();
		self.scene_dirty = true;
	}

	/// Selects `node`, or clears the selection when it is already selected.
	pub fn select_node(&mut self, node: &NodeId) {
		if self.graph().is_none_or(|g| !g.contains(node)) {
			return;
		}
		if self.selected.as_ref() == Some(node) {
			self.selected = None;
		} else {
			self.selected = Some(node.clone());
		}
		self.scene_dirty = true;
	}

	/// Adds a node at the layout center without opening a rename.
	pub fn add_node(&mut self, name: &str) {
		let at = self.layout.center();
		self.queue_create(name.trim(), at, false);
	}

	pub fn create_node_at(&mut self, at: Point, edit: bool) {
		self.queue_create("", at, edit);
	}

	fn queue_create(&mut self, name: &str, at: Point, edit: bool) {
		let Some(graph) = self.editable().cloned() else {
			return;
		};
		let name = if name.is_empty() {
			let count = self.graph().map_or(0, |g| g.nodes.len());
			format!("Node {}", count + 1)
		} else {
			name.to_string()
		};
		debug!("creating {name:?} at ({:.0}, {:.0})", at.x, at.y);
		self.outbox.push(StoreRequest::CreateNode {
			graph,
			name,
			at,
			edit,
		});
	}

	pub fn pointer_down(&mut self, button: PointerButton, screen: Point) {
		if self.editable().is_none() {
			return;
		}
		self.layout.suspend();
		let world = self.view.screen_to_world(screen);
		let hit = self.hit_test(world, None);
		let pans = self.mode.behavior().primary_pans_background();
		let gestures = self
			.gestures
			.pointer_down(button, screen, hit, pans, &self.view);
		self.dispatch(gestures);
	}

	pub fn pointer_move(&mut self, screen: Point) {
		if !self.gestures.is_pressed() {
			return;
		}
		let gestures = self.gestures.pointer_move(screen, &self.view);
		self.dispatch(gestures);
	}

	pub fn pointer_up(&mut self, screen: Point) {
		let gestures = self.gestures.pointer_up(screen, &self.view);
		if self.layout.is_suspended() {
			self.layout.resume();
		}
		self.dispatch(gestures);
	}

	/// Pointer left the canvas: ends any drag without a click.
	pub fn pointer_leave(&mut self) {
		let gestures = self.gestures.cancel(&self.view);
		if self.layout.is_suspended() {
			self.layout.resume();
		}
		self.dispatch(gestures);
	}

	pub fn wheel(&mut self, screen: Point, delta_y: f64) {
		self.view.zoom_at(screen, delta_y);
	}

	fn dispatch(&mut self, gestures: Vec<Gesture>) {
		let behavior = self.mode.behavior();
		for gesture in gestures {
			match gesture {
				Gesture::NodeDragStart { node, at } => {
					debug!("drag start on {node} ({:?})", self.mode);
					behavior.on_node_drag_start(self, &node, at);
				}
				Gesture::NodeDrag { node, at } => behavior.on_node_drag(self, &node, at),
				Gesture::NodeDragEnd { node, at } => {
					debug!("drag end on {node} ({:?})", self.mode);
					behavior.on_node_drag_end(self, &node, at);
				}
				Gesture::NodeClick { node } => {
					debug!("click on {node} ({:?})", self.mode);
					behavior.on_node_click(self, &node);
				}
				Gesture::BackgroundClick { at } => {
					debug!("background click at ({:.0}, {:.0})", at.x, at.y);
					behavior.on_background_click(self, at);
				}
				Gesture::Pan { dx, dy } => self.view.pan(dx, dy),
			}
		}
	}

	/// Topmost node within `NODE_RADIUS` of the world point `at`.
	pub fn hit_test(&self, at: Point, exclude: Option<&NodeId>) -> Option<NodeId> {
		self.graph()?
			.nodes
			.iter()
			.rev()
			.filter(|n| Some(&n.id) != exclude)
			.find(|n| n.position().distance(at) <= NODE_RADIUS)
			.map(|n| n.id.clone())
	}

	/// Rebuilds the layout and the scene if anything structural changed.
	pub fn prepare(&mut self) {
		if self.layout_dirty {
			if let Some(active) = self.active.as_mut() {
				self.layout.rebuild(&mut active.snapshot, &self.positions);
			}
			self.layout_dirty = false;
			self.scene_dirty = true;
		}
		if self.scene_dirty {
			self.rebuild_scene();
			self.scene_dirty = false;
		}
	}

	/// One animation frame. Returns true when the layout moved nodes.
	pub fn tick(&mut self) -> bool {
		self.prepare();
		let Some(active) = self.active.as_mut() else {
			return false;
		};
		if !self.layout.step(&mut active.snapshot.nodes) {
			return false;
		}
		for node in &active.snapshot.nodes {
			self.positions.record(&node.id, node.position());
		}
		self.scene.sync_positions(&active.snapshot.nodes);
		true
	}

	/// Stops the layout for good.
	pub fn shutdown(&mut self) {
		self.layout.stop();
	}

	fn rebuild_scene(&mut self) {
		let link = self.link.as_ref();
		let drag_line = link.and_then(|l| Some((self.node_position(&l.source)?, l.pointer)));
		self.scene.rebuild(SceneInput {
			graph: self.active.as_ref().map(|a| &a.snapshot),
			selected: self.selected.as_ref(),
			editing: self.session.as_ref().map(EditSession::node),
			drag_source: link.map(|l| &l.source),
			drag_target: link.and_then(|l| l.target.as_ref()),
			drag_line,
			mode_class: self.mode.behavior().style_class(),
		});
	}

	/// Opens a rename for `node`. Rename mode only; clicking the node already
	/// being renamed does nothing.
	pub fn open_session(&mut self, node: &NodeId) {
		if self.mode != InteractionMode::Rename {
			return;
		}
		if self.session.as_ref().is_some_and(|s| s.node() == node) {
			return;
		}
		self.start_session(node);
	}

	fn start_session(&mut self, node: &NodeId) {
		self.commit_session();
		let Some(found) = self.graph().and_then(|g| g.node(node)) else {
			return;
		};
		let screen = self.view.world_to_screen(found.position());
		let overlay = Point::new(
			screen.x + self.container_offset.x,
			screen.y + self.container_offset.y,
		);
		let session = EditSession::open(node.clone(), found.name.clone(), overlay);
		debug!("renaming {node}");
		self.session = Some(session);
		self.scene_dirty = true;
	}

	pub fn set_pending_text(&mut self, text: &str) {
		if let Some(session) = self.session.as_mut() {
			session.set_pending(text);
		}
	}

	/// Commits `text` as the new name of the node being renamed.
	pub fn commit_rename(&mut self, text: &str) {
		self.set_pending_text(text);
		self.commit_session();
	}

	pub fn cancel_rename(&mut self) {
		if self.session.take().is_some() {
			self.scene_dirty = true;
		}
	}

	fn commit_session(&mut self) {
		let Some(session) = self.session.take() else {
			return;
		};
		self.scene_dirty = true;
		let (node, name) = match session.finish() {
			SessionEnd::Rename { node, name } => (node, name),
			SessionEnd::Discard { node } => {
				debug!("rename of {node} discarded");
				return;
			}
		};
		let Some(graph) = self.editable().cloned() else {
			return;
		};
		let Some(local) = self.snapshot_mut().and_then(|g| g.node_mut(&node)) else {
			return;
		};
		local.name = name.clone();
		info!("renamed {node} to {name:?}");
		self.status = format!("Renamed node to: {name}");
		self.outbox.push(StoreRequest::RenameNode { graph, node, name });
	}

	pub fn begin_link(&mut self, node: &NodeId) {
		let Some(at) = self.node_position(node) else {
			return;
		};
		if let Some(source) = self.snapshot_mut().and_then(|g| g.node_mut(node)) {
			source.pin(at);
		}
		self.link = Some(LinkDrag {
			source: node.clone(),
			pointer: at,
			target: None,
		});
		self.scene_dirty = true;
	}

	pub fn update_link(&mut self, at: Point) {
		let Some(source) = self.link.as_ref().map(|l| l.source.clone()) else {
			return;
		};
		let target = self.hit_test(at, Some(&source));
		let Some(link) = self.link.as_mut() else {
			return;
		};
		link.pointer = at;
		if link.target != target {
			link.target = target;
			self.scene_dirty = true;
		} else if let Some(from) = self.node_position(&source) {
			self.scene.set_drag_line(Some((from, at)));
		}
	}

	/// Drops the link drag at `at`, creating the edge when it lands on
	/// another node and the ordered pair is new.
	pub fn finish_link(&mut self, at: Point) {
		let Some(link) = self.link.take() else {
			return;
		};
		self.scene_dirty = true;
		if let Some(source) = self.snapshot_mut().and_then(|g| g.node_mut(&link.source)) {
			source.release();
		}
		let Some(target) = self.hit_test(at, Some(&link.source)) else {
			debug!("link from {} dropped on nothing", link.source);
			return;
		};
		if self.connect(&link.source, &target) {
			self.status = format!("Created edge: {}", self.edge_label(&link.source, &target));
		}
	}

	/// Adds `source -> target` picked from the sidebar. Self-loops are
	/// allowed here; the ordered pair must still be new.
	pub fn add_edge(&mut self, source: &NodeId, target: &NodeId) {
		if self.connect(source, target) {
			self.status = "Edge added".into();
		}
	}

	/// Adds the edge locally and queues its creation. Returns false when
	/// nothing was added.
	fn connect(&mut self, source: &NodeId, target: &NodeId) -> bool {
		let Some(graph) = self.editable().cloned() else {
			return false;
		};
		let Some(snapshot) = self.snapshot_mut() else {
			return false;
		};
		if snapshot.has_edge(source, target) {
			warn!("edge {source} -> {target} already exists");
			self.status = "Edge already exists".into();
			return false;
		}
		if !snapshot.add_edge(source.clone(), target.clone()) {
			return false;
		}
		info!("linked {source} -> {target}");
		self.structure_changed();
		self.outbox.push(StoreRequest::CreateEdge {
			graph,
			source: source.clone(),
			target: target.clone(),
		});
		true
	}

	pub fn delete_edge(&mut self, source: &NodeId, target: &NodeId) {
		let Some(graph) = self.editable().cloned() else {
			return;
		};
		if !self.snapshot_mut().is_some_and(|g| g.remove_edge(source, target)) {
			return;
		}
		info!("unlinked {source} -> {target}");
		self.status = format!("Deleted edge: {}", self.edge_label(source, target));
		self.structure_changed();
		self.outbox.push(StoreRequest::DeleteEdge {
			graph,
			source: source.clone(),
			target: target.clone(),
		});
	}

	/// `"A -> B"` using node names where known.
	fn edge_label(&self, source: &NodeId, target: &NodeId) -> String {
		let name = |id: &NodeId| {
			self.graph()
				.and_then(|g| g.node(id))
				.map_or_else(|| id.to_string(), |n| n.name.clone())
		};
		format!("{} -> {}", name(source), name(target))
	}

	/// `grab` is the world point the press landed on.
	pub fn begin_move(&mut self, node: &NodeId, grab: Point) {
		let Some(start) = self.node_position(node) else {
			return;
		};
		if let Some(moving) = self.snapshot_mut().and_then(|g| g.node_mut(node)) {
			moving.pin(start);
			self.moving = Some(MoveDrag {
				node: node.clone(),
				start,
				grab,
			});
		}
	}

	/// Pins `node` at its start position plus the pointer's travel and
	/// patches its glyph in place.
	pub fn move_node(&mut self, node: &NodeId, at: Point) {
		let Some(drag) = self.moving.as_ref().filter(|m| &m.node == node) else {
			return;
		};
		let to = Point::new(
			drag.start.x + (at.x - drag.grab.x),
			drag.start.y + (at.y - drag.grab.y),
		);
		if let Some(moving) = self.snapshot_mut().and_then(|g| g.node_mut(node)) {
			moving.pin(to);
			self.scene.move_node(node, to);
		}
	}

	pub fn finish_move(&mut self, node: &NodeId) {
		if self.moving.take().is_none_or(|m| &m.node != node) {
			return;
		}
		let Some(moved) = self.snapshot_mut().and_then(|g| g.node_mut(node)) else {
			return;
		};
		moved.release();
		let at = moved.position();
		self.positions.record(node, at);
	}

	/// Removes `node` and its edges locally, then asks the store to follow.
	pub fn delete_node(&mut self, node: &NodeId) {
		let Some(graph) = self.editable().cloned() else {
			return;
		};
		let Some(removed) = self.snapshot_mut().and_then(|g| g.remove_node(node)) else {
			return;
		};
		self.positions.forget(node);
		if self.selected.as_ref() == Some(node) {
			self.selected = None;
		}
		if self.session.as_ref().is_some_and(|s| s.node() == node) {
			self.session = None;
		}
		info!("deleted node {node} ({})", removed.name);
		self.status = format!("Deleted node: {}", removed.name);
		self.structure_changed();
		self.outbox.push(StoreRequest::DeleteNode {
			graph,
			node: node.clone(),
		});
	}

	/// Applies a finished store request. Results for a graph that is no
	/// longer active are dropped.
	pub fn apply_outcome(&mut self, outcome: StoreOutcome) {
		match outcome {
			StoreOutcome::Graphs(graphs) => {
				debug!("{} graphs available", graphs.len());
				let first = graphs.first().map(|g| g.id.clone());
				self.status = format!("Loaded {} graphs", graphs.len());
				self.graphs = graphs;
				if self.active.is_none() {
					if let Some(first) = first {
						self.select_graph(first);
					}
				}
			}
			StoreOutcome::GraphCreated(summary) => {
				info!("created graph {} ({})", summary.id, summary.name);
				let id = summary.id.clone();
				let status = format!("Created graph: {}", summary.name);
				self.graphs.push(summary);
				self.select_graph(id);
				self.status = status;
			}
			StoreOutcome::GraphDeleted(graph) => {
				self.graphs.retain(|g| g.id != graph);
				self.status = "Graph deleted".into();
			}
			StoreOutcome::GraphLoaded { graph, loaded } => self.graph_loaded(graph, loaded),
			StoreOutcome::NodeCreated {
				graph,
				node,
				at,
				edit,
			} => {
				if !self.is_active(&graph) {
					return;
				}
				let name = node.name.clone();
				let added = self
					.snapshot_mut()
					.is_some_and(|g| g.add_node(Node::new(node.id.clone(), node.name, at)));
				if !added {
					return;
				}
				info!("created node {} ({name})", node.id);
				self.status = format!("Created node: {name}");
				self.structure_changed();
				if edit {
					self.start_session(&node.id);
				}
			}
			StoreOutcome::NodeRenamed { graph, node } => {
				if !self.is_active(&graph) {
					return;
				}
				if let Some(local) = self.snapshot_mut().and_then(|g| g.node_mut(&node.id)) {
					local.name = node.name;
					self.scene_dirty = true;
				}
			}
			StoreOutcome::NodeDeleted { graph, node } => {
				if self.is_active(&graph)
					&& self.snapshot_mut().and_then(|g| g.remove_node(&node)).is_some()
				{
					self.structure_changed();
				}
			}
			StoreOutcome::EdgeCreated {
				graph,
				source,
				target,
			} => {
				if self.is_active(&graph)
					&& self.snapshot_mut().is_some_and(|g| g.add_edge(source, target))
				{
					self.structure_changed();
				}
			}
			StoreOutcome::EdgeDeleted {
				graph,
				source,
				target,
			} => {
				if self.is_active(&graph)
					&& self.snapshot_mut().is_some_and(|g| g.remove_edge(&source, &target))
				{
					self.structure_changed();
				}
			}
			StoreOutcome::Failed {
				action,
				graph,
				error,
			} => {
				if graph.as_ref().is_some_and(|g| self.is_active(g)) {
					self.loading = false;
				}
				self.error = Some(format!("Failed to {action}: {error}"));
			}
		}
	}

	fn is_active(&self, graph: &GraphId) -> bool {
		let active = self.active_graph() == Some(graph);
		if !active {
			debug!("dropping result for inactive graph {graph}");
		}
		active
	}

	fn graph_loaded(&mut self, graph: GraphId, loaded: LoadedGraph) {
		if !self.is_active(&graph) {
			return;
		}
		let center = self.layout.center();
		let nodes = loaded
			.nodes
			.into_iter()
			.enumerate()
			.map(|(i, record)| Node::new(record.id, record.name, initial_placement(i, center)))
			.collect();
		let edges = loaded
			.edges
			.into_iter()
			.map(|(source, target)| Edge::new(source, target))
			.collect();
		let snapshot = GraphSnapshot::new(nodes, edges);
		self.positions.prune(|id| snapshot.contains(id));
		info!(
			"loaded graph {graph}: {} nodes, {} edges, {} remembered positions",
			snapshot.nodes.len(),
			snapshot.edges.len(),
			self.positions.len()
		);
		self.status = format!(
			"Loaded graph with {} nodes and {} edges",
			snapshot.nodes.len(),
			snapshot.edges.len()
		);
		self.active = Some(ActiveGraph {
			id: graph,
			snapshot,
		});
		self.loading = false;
		self.structure_changed();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::components::graph_editor::types::Placement;
	use crate::store::{GraphStore, MemoryStore, execute, load_graph};

	async fn drain(editor: &mut GraphEditor, store: &MemoryStore) {
		loop {
			let requests = editor.take_requests();
			if requests.is_empty() {
				break;
			}
			for request in requests {
				let outcome = execute(store, request).await;
				editor.apply_outcome(outcome);
			}
		}
	}

	async fn open(store: &MemoryStore, graph: &GraphId) -> GraphEditor {
		let mut editor = GraphEditor::new(LayoutConfig::default(), 800.0, 600.0);
		editor.select_graph(graph.clone());
		drain(&mut editor, store).await;
		editor
	}

	/// Opens the graph and lets the layout spread the nodes apart.
	async fn settled(store: &MemoryStore, graph: &GraphId) -> GraphEditor {
		let mut editor = open(store, graph).await;
		for _ in 0..150 {
			editor.tick();
		}
		editor
	}

	async fn empty_graph() -> (MemoryStore, GraphId) {
		let store = MemoryStore::default();
		let graph = store.create_graph("test").await.expect("graph");
		(store, graph.id)
	}

	async fn sample_graph() -> (MemoryStore, GraphId) {
		let store = MemoryStore::with_sample();
		let graphs = store.list_graphs().await.expect("graphs");
		(store, graphs[0].id.clone())
	}

	fn click(editor: &mut GraphEditor, at: Point) {
		editor.pointer_down(PointerButton::Primary, at);
		editor.pointer_up(at);
	}

	fn drag(editor: &mut GraphEditor, from: Point, to: Point) {
		editor.pointer_down(PointerButton::Primary, from);
		editor.pointer_move(Point::new((from.x + to.x) / 2.0, (from.y + to.y) / 2.0));
		editor.pointer_move(to);
		editor.pointer_up(to);
	}

	fn position(editor: &GraphEditor, id: &NodeId) -> Point {
		editor.node_position(id).expect("node present")
	}

	fn id_named(editor: &GraphEditor, name: &str) -> NodeId {
		editor
			.node_names()
			.into_iter()
			.find(|(_, n)| n == name)
			.map(|(id, _)| id)
			.expect("named node")
	}

	fn assert_edges_reference_nodes(editor: &GraphEditor) {
		let graph = editor.graph().expect("graph");
		for edge in &graph.edges {
			assert!(graph.contains(&edge.source), "dangling source {}", edge.source);
			assert!(graph.contains(&edge.target), "dangling target {}", edge.target);
		}
	}

	#[tokio::test]
	async fn create_rename_link_delete_scenario() {
		let (store, graph) = empty_graph().await;
		let mut editor = open(&store, &graph).await;

		click(&mut editor, Point::new(100.0, 100.0));
		drain(&mut editor, &store).await;
		let a = editor.session().map(|s| s.node().clone()).expect("rename open");
		assert_eq!(editor.session().map(EditSession::pending), Some("Node 1"));
		editor.prepare();
		assert!(position(&editor, &a).distance(Point::new(100.0, 100.0)) < 1.0);

		editor.commit_rename("Start");
		drain(&mut editor, &store).await;
		assert!(editor.session().is_none());
		assert_eq!(editor.status(), "Renamed node to: Start");
		assert_eq!(id_named(&editor, "Start"), a);

		click(&mut editor, Point::new(300.0, 100.0));
		drain(&mut editor, &store).await;
		let b = id_named(&editor, "Node 2");
		editor.cancel_rename();

		editor.set_mode(InteractionMode::Link);
		let (pa, pb) = (position(&editor, &a), position(&editor, &b));
		drag(&mut editor, pa, pb);
		drain(&mut editor, &store).await;
		let graph_now = editor.graph().expect("graph");
		assert_eq!(graph_now.edges, vec![Edge::new(a.clone(), b.clone())]);
		assert_eq!(editor.status(), "Created edge: Start -> Node 2");

		drag(&mut editor, pa, pb);
		assert!(editor.take_requests().is_empty());
		assert_eq!(editor.status(), "Edge already exists");
		assert_eq!(editor.graph().map(|g| g.edges.len()), Some(1));

		editor.set_mode(InteractionMode::Delete);
		click(&mut editor, pa);
		drain(&mut editor, &store).await;
		let graph_now = editor.graph().expect("graph");
		assert!(!graph_now.contains(&a));
		assert!(graph_now.contains(&b));
		assert!(graph_now.edges.is_empty());
		assert_eq!(store.list_nodes(&graph).await.expect("nodes").len(), 1);
	}

	#[tokio::test]
	async fn same_click_diverges_between_rename_and_delete() {
		let (store, graph) = empty_graph().await;
		let mut renaming = open(&store, &graph).await;
		renaming.add_node("Target");
		drain(&mut renaming, &store).await;
		let target = id_named(&renaming, "Target");
		let at = position(&renaming, &target);

		let mut deleting = open(&store, &graph).await;
		deleting.set_mode(InteractionMode::Delete);

		click(&mut renaming, at);
		click(&mut deleting, at);

		assert_eq!(renaming.session().map(EditSession::node), Some(&target));
		assert!(renaming.graph().is_some_and(|g| g.contains(&target)));
		assert!(deleting.session().is_none());
		assert!(deleting.graph().is_some_and(|g| !g.contains(&target)));
		assert!(renaming.take_requests().is_empty());
		assert_eq!(
			deleting.take_requests(),
			vec![StoreRequest::DeleteNode {
				graph,
				node: target
			}]
		);
	}

	#[tokio::test]
	async fn clicking_the_node_being_renamed_keeps_the_session() {
		let (store, graph) = sample_graph().await;
		let mut editor = settled(&store, &graph).await;
		let start = id_named(&editor, "Start");
		let at = position(&editor, &start);
		click(&mut editor, at);
		editor.set_pending_text("Begin");
		click(&mut editor, at);
		assert_eq!(editor.session().map(EditSession::pending), Some("Begin"));
	}

	#[tokio::test]
	async fn opening_another_rename_commits_the_first() {
		let (store, graph) = sample_graph().await;
		let mut editor = settled(&store, &graph).await;
		let (start, parse) = (id_named(&editor, "Start"), id_named(&editor, "Parse"));
		let (ps, pp) = (position(&editor, &start), position(&editor, &parse));
		click(&mut editor, ps);
		editor.set_pending_text("  Begin ");
		click(&mut editor, pp);
		assert_eq!(editor.session().map(EditSession::node), Some(&parse));
		assert_eq!(id_named(&editor, "Begin"), start);
		assert_eq!(
			editor.take_requests(),
			vec![StoreRequest::RenameNode {
				graph,
				node: start,
				name: "Begin".into()
			}]
		);
	}

	#[tokio::test]
	async fn blank_rename_sends_nothing() {
		let (store, graph) = sample_graph().await;
		let mut editor = settled(&store, &graph).await;
		let start = id_named(&editor, "Start");
		let at = position(&editor, &start);
		click(&mut editor, at);
		editor.commit_rename("   ");
		assert!(editor.session().is_none());
		assert!(editor.take_requests().is_empty());
		assert_eq!(id_named(&editor, "Start"), start);
	}

	#[tokio::test]
	async fn no_cache_writes_while_pointer_is_held() {
		let (store, graph) = sample_graph().await;
		let mut editor = open(&store, &graph).await;
		for _ in 0..5 {
			assert!(editor.tick());
		}
		let before = editor.positions().revision();

		editor.pointer_down(PointerButton::Primary, Point::new(5.0, 5.0));
		for _ in 0..5 {
			assert!(!editor.tick());
		}
		editor.pointer_move(Point::new(40.0, 40.0));
		assert!(!editor.tick());
		assert_eq!(editor.positions().revision(), before);

		editor.pointer_up(Point::new(40.0, 40.0));
		assert_eq!(editor.positions().revision(), before);
		assert!((editor.layout().alpha() - 0.1).abs() < 1e-12);
		assert!(editor.tick());
		assert!(editor.positions().revision() > before);
	}

	#[tokio::test]
	async fn reload_seeds_nodes_from_remembered_positions() {
		let (store, graph) = sample_graph().await;
		let mut editor = open(&store, &graph).await;
		for _ in 0..30 {
			editor.tick();
		}
		let remembered: Vec<(NodeId, Point)> = editor
			.graph()
			.expect("graph")
			.nodes
			.iter()
			.map(|n| (n.id.clone(), n.position()))
			.collect();

		editor.select_graph(graph.clone());
		drain(&mut editor, &store).await;
		editor.prepare();
		for (id, at) in &remembered {
			assert_eq!(position(&editor, id), *at);
		}
		assert!((editor.layout().alpha() - 0.1).abs() < 1e-12);
		assert!((editor.layout().alpha_decay() - 0.05).abs() < 1e-12);
	}

	#[tokio::test]
	async fn new_edge_keeps_settled_nodes_in_place() {
		let (store, graph) = sample_graph().await;
		let mut editor = settled(&store, &graph).await;
		let (start, emit) = (id_named(&editor, "Start"), id_named(&editor, "Emit"));
		let (ps, pe) = (position(&editor, &start), position(&editor, &emit));
		editor.set_mode(InteractionMode::Link);
		drag(&mut editor, ps, pe);
		editor.prepare();
		assert_eq!(position(&editor, &start), ps);
		assert_eq!(position(&editor, &emit), pe);
		assert!((editor.layout().alpha() - 0.1).abs() < 1e-12);
		assert_eq!(editor.take_requests().len(), 1);
	}

	#[tokio::test]
	async fn link_drag_highlights_target_and_draws_line() {
		let (store, graph) = sample_graph().await;
		let mut editor = settled(&store, &graph).await;
		editor.prepare();
		let (start, check) = (id_named(&editor, "Start"), id_named(&editor, "Check"));
		let (ps, pc) = (position(&editor, &start), position(&editor, &check));
		editor.set_mode(InteractionMode::Link);
		editor.pointer_down(PointerButton::Primary, ps);
		assert!(editor.graph().and_then(|g| g.node(&start)).is_some_and(|n| n.placement.is_pinned()));
		editor.pointer_move(pc);
		editor.prepare();
		let scene = editor.scene();
		assert!(scene.glyph(&start).is_some_and(|g| g.drag_source));
		assert!(scene.glyph(&check).is_some_and(|g| g.drag_target));
		assert_eq!(scene.drag_line, Some((ps, pc)));
		assert_eq!(scene.mode_class, Some("link-mode"));

		editor.pointer_up(pc);
		editor.prepare();
		assert!(editor.scene().drag_line.is_none());
		assert!(editor.graph().and_then(|g| g.node(&start)).is_some_and(|n| !n.placement.is_pinned()));
	}

	#[tokio::test]
	async fn link_dropped_on_background_creates_nothing() {
		let (store, graph) = sample_graph().await;
		let mut editor = settled(&store, &graph).await;
		let start = id_named(&editor, "Start");
		let edges = editor.graph().map(|g| g.edges.len());
		let from = position(&editor, &start);
		editor.set_mode(InteractionMode::Link);
		drag(&mut editor, from, Point::new(-500.0, -500.0));
		assert!(editor.take_requests().is_empty());
		assert_eq!(editor.graph().map(|g| g.edges.len()), edges);
	}

	#[tokio::test]
	async fn move_drag_patches_scene_and_remembers_drop() {
		let (store, graph) = sample_graph().await;
		let mut editor = settled(&store, &graph).await;
		let parse = id_named(&editor, "Parse");
		let from = position(&editor, &parse);
		let pointer = Point::new(600.0, 500.0);
		let to = Point::new(from.x + (pointer.x - from.x), from.y + (pointer.y - from.y));

		editor.set_mode(InteractionMode::Move);
		editor.prepare();
		let rebuilds = editor.scene().rebuilds();
		editor.pointer_down(PointerButton::Primary, from);
		editor.pointer_move(pointer);
		assert!(editor.scene().glyph(&parse).is_some_and(|g| g.at == to));
		let idx = editor.scene().nodes.iter().position(|g| g.id == parse).expect("glyph");
		assert!(editor.scene().edges.iter().any(|e| e.target == idx && e.to == to));
		assert!(editor.scene().edges.iter().any(|e| e.source == idx && e.from == to));
		assert_eq!(editor.scene().rebuilds(), rebuilds);
		assert_eq!(
			editor.graph().and_then(|g| g.node(&parse)).map(|n| n.placement),
			Some(Placement::Pinned(to))
		);

		editor.pointer_up(pointer);
		assert_eq!(
			editor.graph().and_then(|g| g.node(&parse)).map(|n| n.placement),
			Some(Placement::Simulated(to))
		);
		assert_eq!(editor.positions().get(&parse), Some(to));
		assert!(editor.take_requests().is_empty());
	}

	#[tokio::test]
	async fn moved_node_keeps_the_offset_it_was_grabbed_at() {
		let (store, graph) = sample_graph().await;
		let mut editor = settled(&store, &graph).await;
		let parse = id_named(&editor, "Parse");
		let center = position(&editor, &parse);
		let grab = Point::new(center.x + 20.0, center.y);
		let release = Point::new(grab.x + 1.0, grab.y);

		editor.set_mode(InteractionMode::Move);
		editor.pointer_down(PointerButton::Primary, grab);
		editor.pointer_move(release);
		editor.pointer_up(release);

		let expected = Point::new(center.x + 1.0, center.y);
		assert!(position(&editor, &parse).distance(expected) < 1e-9);
		assert!(editor.positions().get(&parse).is_some_and(|p| p.distance(expected) < 1e-9));
	}

	#[tokio::test]
	async fn deleting_a_node_keeps_the_others_where_they_were() {
		let (store, graph) = sample_graph().await;
		let mut editor = settled(&store, &graph).await;
		let check = id_named(&editor, "Check");
		let at = position(&editor, &check);
		let kept: Vec<(NodeId, Point)> = ["Start", "Parse", "Emit"]
			.iter()
			.map(|name| id_named(&editor, name))
			.map(|id| {
				let p = position(&editor, &id);
				(id, p)
			})
			.collect();

		editor.set_mode(InteractionMode::Delete);
		click(&mut editor, at);
		editor.prepare();
		assert!(editor.graph().is_some_and(|g| !g.contains(&check)));
		for (id, p) in &kept {
			assert_eq!(position(&editor, id), *p);
			assert_eq!(editor.positions().get(id), Some(*p));
		}
		assert!((editor.layout().alpha() - 0.1).abs() < 1e-12);
		assert!((editor.layout().alpha_decay() - 0.05).abs() < 1e-12);
	}

	#[tokio::test]
	async fn sidebar_edges_share_the_duplicate_check() {
		let (store, graph) = sample_graph().await;
		let mut editor = open(&store, &graph).await;
		let (start, parse, emit) = (
			id_named(&editor, "Start"),
			id_named(&editor, "Parse"),
			id_named(&editor, "Emit"),
		);

		editor.add_edge(&start, &parse);
		assert!(editor.take_requests().is_empty());
		assert_eq!(editor.status(), "Edge already exists");

		editor.add_edge(&emit, &start);
		assert_eq!(editor.status(), "Edge added");
		editor.add_edge(&start, &start);
		assert_eq!(
			editor.take_requests(),
			vec![
				StoreRequest::CreateEdge {
					graph: graph.clone(),
					source: emit.clone(),
					target: start.clone(),
				},
				StoreRequest::CreateEdge {
					graph,
					source: start.clone(),
					target: start,
				},
			]
		);
		assert_edges_reference_nodes(&editor);
	}

	#[tokio::test]
	async fn deleted_edge_leaves_both_nodes() {
		let (store, graph) = sample_graph().await;
		let mut editor = open(&store, &graph).await;
		let (start, parse) = (id_named(&editor, "Start"), id_named(&editor, "Parse"));
		editor.delete_edge(&start, &parse);
		assert_eq!(editor.status(), "Deleted edge: Start -> Parse");
		let labels: Vec<String> = editor.edge_labels().into_iter().map(|(_, _, l)| l).collect();
		assert_eq!(labels, vec!["Parse -> Check", "Check -> Emit"]);
		drain(&mut editor, &store).await;
		assert!(editor.graph().is_some_and(|g| !g.has_edge(&start, &parse) && g.contains(&start)));
		assert_eq!(load_graph(&store, &graph).await.expect("loaded").edges.len(), 2);

		editor.delete_edge(&start, &parse);
		assert!(editor.take_requests().is_empty());
	}

	#[tokio::test]
	async fn deleting_the_open_graph_closes_it() {
		let store = MemoryStore::with_sample();
		let other = store.create_graph("other").await.expect("graph");
		let mut editor = GraphEditor::new(LayoutConfig::default(), 800.0, 600.0);
		editor.refresh_graphs();
		drain(&mut editor, &store).await;
		let sample = editor.active_graph().cloned().expect("first graph opened");

		editor.delete_graph(&other.id);
		drain(&mut editor, &store).await;
		assert_eq!(editor.active_graph(), Some(&sample));
		assert_eq!(editor.graphs().len(), 1);

		editor.delete_graph(&sample);
		assert!(editor.active_graph().is_none());
		assert!(editor.graph().is_none());
		click(&mut editor, Point::new(10.0, 10.0));
		let requests = editor.take_requests();
		assert_eq!(requests, vec![StoreRequest::DeleteGraph { graph: sample }]);
		for request in requests {
			let outcome = execute(&store, request).await;
			editor.apply_outcome(outcome);
		}
		assert_eq!(editor.status(), "Graph deleted");

		editor.delete_graph(&GraphId::from("gone"));
		drain(&mut editor, &store).await;
		assert!(editor.graphs().is_empty());
		assert!(store.list_graphs().await.expect("graphs").is_empty());
		assert!(editor.error().is_some_and(|e| e.starts_with("Failed to delete graph:")));
	}

	#[tokio::test]
	async fn move_mode_background_drag_pans_without_creating() {
		let (store, graph) = sample_graph().await;
		let mut editor = open(&store, &graph).await;
		editor.set_mode(InteractionMode::Move);
		drag(&mut editor, Point::new(5.0, 5.0), Point::new(55.0, 25.0));
		assert_eq!((editor.view().x, editor.view().y), (50.0, 20.0));
		assert!(editor.take_requests().is_empty());
	}

	#[tokio::test]
	async fn input_without_a_graph_is_ignored() {
		let mut editor = GraphEditor::new(LayoutConfig::default(), 800.0, 600.0);
		click(&mut editor, Point::new(10.0, 10.0));
		editor.add_node("x");
		editor.delete_node(&NodeId::from("n1"));
		assert!(editor.take_requests().is_empty());
		assert!(!editor.tick());
	}

	#[tokio::test]
	async fn input_while_loading_is_ignored() {
		let (_, graph) = empty_graph().await;
		let mut editor = GraphEditor::new(LayoutConfig::default(), 800.0, 600.0);
		editor.select_graph(graph);
		editor.take_requests();
		click(&mut editor, Point::new(10.0, 10.0));
		assert!(editor.take_requests().is_empty());
	}

	#[tokio::test]
	async fn stale_results_are_dropped() {
		let store = MemoryStore::with_sample();
		let other = store.create_graph("other").await.expect("graph");
		let sample = store.list_graphs().await.expect("graphs")[0].id.clone();
		let mut editor = GraphEditor::new(LayoutConfig::default(), 800.0, 600.0);
		editor.select_graph(sample);
		let slow = editor.take_requests();
		editor.select_graph(other.id.clone());
		for request in slow {
			let outcome = execute(&store, request).await;
			editor.apply_outcome(outcome);
		}
		assert!(editor.is_loading());
		assert_eq!(editor.graph().map(|g| g.nodes.len()), Some(0));
		drain(&mut editor, &store).await;
		assert!(!editor.is_loading());
		assert_eq!(editor.active_graph(), Some(&other.id));
	}

	#[tokio::test]
	async fn failures_surface_without_rollback() {
		let (store, graph) = sample_graph().await;
		let mut editor = settled(&store, &graph).await;
		let start = id_named(&editor, "Start");
		let at = position(&editor, &start);
		editor.set_mode(InteractionMode::Delete);
		click(&mut editor, at);
		store.delete_node(&graph, &start).await.expect("deleted elsewhere");
		drain(&mut editor, &store).await;
		assert!(editor.error().is_some_and(|e| e.starts_with("Failed to delete node:")));
		assert!(editor.graph().is_some_and(|g| !g.contains(&start)));
		editor.dismiss_error();
		assert!(editor.error().is_none());
	}

	#[tokio::test]
	async fn created_graph_becomes_active() {
		let store = MemoryStore::default();
		let mut editor = GraphEditor::new(LayoutConfig::default(), 800.0, 600.0);
		editor.create_graph("  Fresh ");
		drain(&mut editor, &store).await;
		assert_eq!(editor.graphs().len(), 1);
		assert_eq!(editor.graphs()[0].name, "Fresh");
		assert_eq!(editor.active_graph(), Some(&editor.graphs()[0].id));
		assert!(!editor.is_loading());
	}

	#[tokio::test]
	async fn selection_toggles() {
		let (store, graph) = sample_graph().await;
		let mut editor = settled(&store, &graph).await;
		let start = id_named(&editor, "Start");
		editor.select_node(&start);
		editor.prepare();
		assert!(editor.scene().glyph(&start).is_some_and(|g| g.selected));
		editor.select_node(&start);
		assert!(editor.selected().is_none());
	}

	#[tokio::test]
	async fn edges_never_dangle_under_random_editing() {
		let (store, graph) = sample_graph().await;
		let mut editor = open(&store, &graph).await;
		let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
		let mut next = move |bound: usize| {
			seed ^= seed << 13;
			seed ^= seed >> 7;
			seed ^= seed << 17;
			(seed % bound as u64) as usize
		};
		for round in 0..200 {
			editor.set_mode(InteractionMode::ALL[next(4)]);
			let nodes: Vec<Point> = editor
				.graph()
				.expect("graph")
				.nodes
				.iter()
				.map(Node::position)
				.collect();
			let pick = |i: usize| nodes.get(i).copied();
			match next(3) {
				0 => click(&mut editor, Point::new(next(800) as f64, next(600) as f64)),
				1 => {
					if let Some(at) = pick(next(nodes.len().max(1))) {
						click(&mut editor, at);
					}
				}
				_ => {
					let (i, j) = (next(nodes.len().max(1)), next(nodes.len().max(1)));
					if let (Some(from), Some(to)) = (pick(i), pick(j)) {
						drag(&mut editor, from, to);
					}
				}
			}
			editor.cancel_rename();
			if round % 3 == 0 {
				drain(&mut editor, &store).await;
			}
			editor.tick();
			assert_edges_reference_nodes(&editor);
		}
	}

	#[tokio::test]
	async fn first_listed_graph_opens_when_none_is_active() {
		let store = MemoryStore::with_sample();
		let mut editor = GraphEditor::new(LayoutConfig::default(), 800.0, 600.0);
		editor.refresh_graphs();
		drain(&mut editor, &store).await;
		assert_eq!(editor.graphs().len(), 1);
		assert_eq!(editor.graph().map(|g| (g.nodes.len(), g.edges.len())), Some((4, 3)));
		assert_eq!(editor.status(), "Loaded graph with 4 nodes and 3 edges");

		let other = store.create_graph("other").await.expect("graph");
		editor.refresh_graphs();
		drain(&mut editor, &store).await;
		assert_eq!(editor.graphs().len(), 2);
		assert_ne!(editor.active_graph(), Some(&other.id));
	}
}
