//! Persistence collaborator: the operations the editor asks for and the
//! backends that carry them out.

mod memory;
mod rest;

use log::{info, warn};
use serde::{Deserialize, Serialize};

pub use memory::MemoryStore;
pub use rest::RestStore;

use crate::components::graph_editor::types::{GraphId, NodeId, Point};
use crate::config::{BackendKind, EditorConfig};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphSummary {
	pub id: GraphId,
	pub name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
	pub id: NodeId,
	pub name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeWithNeighbors {
	pub id: NodeId,
	pub name: String,
	#[serde(default, rename = "toNodes")]
	pub to_nodes: Vec<NodeRecord>,
}

/// Node and edge lists of one graph as read from the store.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoadedGraph {
	pub nodes: Vec<NodeRecord>,
	pub edges: Vec<(NodeId, NodeId)>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
	#[error("request failed: {0}")]
	Http(#[from] reqwest::Error),
	#[error("{url} answered {status}")]
	Status { status: u16, url: String },
	#[error("unexpected response: {0}")]
	Decode(#[from] serde_json::Error),
	#[error("graph {0} not found")]
	GraphMissing(GraphId),
	#[error("node {0} not found")]
	NotFound(NodeId),
}

/// Async access to stored graphs.
#[allow(async_fn_in_trait)]
pub trait GraphStore {
	async fn list_graphs(&self) -> Result<Vec<GraphSummary>, StoreError>;

	async fn create_graph(&self, name: &str) -> Result<GraphSummary, StoreError>;

	async fn delete_graph(&self, graph: &GraphId) -> Result<(), StoreError>;

	async fn list_nodes(&self, graph: &GraphId) -> Result<Vec<NodeRecord>, StoreError>;

	async fn node_with_neighbors(
		&self,
		graph: &GraphId,
		node: &NodeId,
	) -> Result<NodeWithNeighbors, StoreError>;

	async fn create_node(&self, graph: &GraphId, name: &str) -> Result<NodeRecord, StoreError>;

	async fn rename_node(
		&self,
		graph: &GraphId,
		node: &NodeId,
		name: &str,
	) -> Result<NodeRecord, StoreError>;

	async fn delete_node(&self, graph: &GraphId, node: &NodeId) -> Result<(), StoreError>;

	async fn create_edge(
		&self,
		graph: &GraphId,
		source: &NodeId,
		target: &NodeId,
	) -> Result<(), StoreError>;

	async fn delete_edge(
		&self,
		graph: &GraphId,
		source: &NodeId,
		target: &NodeId,
	) -> Result<(), StoreError>;
}

/// Reads a whole graph: the node list, then each node's outgoing neighbours.
/// Not atomic; edits made elsewhere mid-load may show up half applied.
pub async fn load_graph<S: GraphStore>(store: &S, graph: &GraphId) -> Result<LoadedGraph, StoreError> {
	let nodes = store.list_nodes(graph).await?;
	let mut edges = Vec::new();
	for node in &nodes {
		let linked = store.node_with_neighbors(graph, &node.id).await?;
		edges.extend(
			linked
				.to_nodes
				.into_iter()
				.map(|to| (node.id.clone(), to.id)),
		);
	}
	Ok(LoadedGraph { nodes, edges })
}

/// A mutation or read the editor wants performed.
#[derive(Clone, Debug, PartialEq)]
pub enum StoreRequest {
	ListGraphs,
	CreateGraph {
		name: String,
	},
	DeleteGraph {
		graph: GraphId,
	},
	LoadGraph {
		graph: GraphId,
	},
	/// `at` and `edit` ride along so the result can be placed and, when
	/// asked, opened for renaming.
	CreateNode {
		graph: GraphId,
		name: String,
		at: Point,
		edit: bool,
	},
	RenameNode {
		graph: GraphId,
		node: NodeId,
		name: String,
	},
	DeleteNode {
		graph: GraphId,
		node: NodeId,
	},
	CreateEdge {
		graph: GraphId,
		source: NodeId,
		target: NodeId,
	},
	DeleteEdge {
		graph: GraphId,
		source: NodeId,
		target: NodeId,
	},
}

impl StoreRequest {
	/// Short verb phrase for error messages.
	pub fn action(&self) -> &'static str {
		match self {
			StoreRequest::ListGraphs => "load graphs",
			StoreRequest::CreateGraph { .. } => "create graph",
			StoreRequest::DeleteGraph { .. } => "delete graph",
			StoreRequest::LoadGraph { .. } => "load graph data",
			StoreRequest::CreateNode { .. } => "create node",
			StoreRequest::RenameNode { .. } => "rename node",
			StoreRequest::DeleteNode { .. } => "delete node",
			StoreRequest::CreateEdge { .. } => "create edge",
			StoreRequest::DeleteEdge { .. } => "delete edge",
		}
	}
}

/// Result of a `StoreRequest`, fed back into the editor.
#[derive(Debug)]
pub enum StoreOutcome {
	Graphs(Vec<GraphSummary>),
	GraphCreated(GraphSummary),
	GraphDeleted(GraphId),
	GraphLoaded {
		graph: GraphId,
		loaded: LoadedGraph,
	},
	NodeCreated {
		graph: GraphId,
		node: NodeRecord,
		at: Point,
		edit: bool,
	},
	NodeRenamed {
		graph: GraphId,
		node: NodeRecord,
	},
	NodeDeleted {
		graph: GraphId,
		node: NodeId,
	},
	EdgeCreated {
		graph: GraphId,
		source: NodeId,
		target: NodeId,
	},
	EdgeDeleted {
		graph: GraphId,
		source: NodeId,
		target: NodeId,
	},
	Failed {
		action: &'static str,
		graph: Option<GraphId>,
		error: StoreError,
	},
}

fn request_graph(request: &StoreRequest) -> Option<GraphId> {
	match request {
		StoreRequest::ListGraphs | StoreRequest::CreateGraph { .. } => None,
		StoreRequest::DeleteGraph { graph }
		| StoreRequest::LoadGraph { graph }
		| StoreRequest::CreateNode { graph, .. }
		| StoreRequest::RenameNode { graph, .. }
		| StoreRequest::DeleteNode { graph, .. }
		| StoreRequest::CreateEdge { graph, .. }
		| StoreRequest::DeleteEdge { graph, .. } => Some(graph.clone()),
	}
}

/// Performs one request. Failures come back as `StoreOutcome::Failed`.
pub async fn execute<S: GraphStore>(store: &S, request: StoreRequest) -> StoreOutcome {
	let action = request.action();
	let graph = request_graph(&request);
	let result = match request {
		StoreRequest::ListGraphs => store.list_graphs().await.map(StoreOutcome::Graphs),
		StoreRequest::CreateGraph { name } => store
			.create_graph(&name)
			.await
			.map(StoreOutcome::GraphCreated),
		StoreRequest::DeleteGraph { graph } => store
			.delete_graph(&graph)
			.await
			.map(|()| StoreOutcome::GraphDeleted(graph)),
		StoreRequest::LoadGraph { graph } => load_graph(store, &graph)
			.await
			.map(|loaded| StoreOutcome::GraphLoaded { graph, loaded }),
		StoreRequest::CreateNode {
			graph,
			name,
			at,
			edit,
		} => store
			.create_node(&graph, &name)
			.await
			.map(|node| StoreOutcome::NodeCreated {
				graph,
				node,
				at,
				edit,
			}),
		StoreRequest::RenameNode { graph, node, name } => store
			.rename_node(&graph, &node, &name)
			.await
			.map(|node| StoreOutcome::NodeRenamed { graph, node }),
		StoreRequest::DeleteNode { graph, node } => store
			.delete_node(&graph, &node)
			.await
			.map(|()| StoreOutcome::NodeDeleted { graph, node }),
		StoreRequest::CreateEdge {
			graph,
			source,
			target,
		} => store
			.create_edge(&graph, &source, &target)
			.await
			.map(|()| StoreOutcome::EdgeCreated {
				graph,
				source,
				target,
			}),
		StoreRequest::DeleteEdge {
			graph,
			source,
			target,
		} => store
			.delete_edge(&graph, &source, &target)
			.await
			.map(|()| StoreOutcome::EdgeDeleted {
				graph,
				source,
				target,
			}),
	};
	result.unwrap_or_else(|error| {
		warn!("failed to {action}: {error}");
		StoreOutcome::Failed {
			action,
			graph,
			error,
		}
	})
}

/// The backend picked at startup.
pub enum Backend {
	Memory(MemoryStore),
	Rest(RestStore),
}

impl Backend {
	/// `origin` is the page origin, used when no API base is configured.
	pub fn from_config(config: &EditorConfig, origin: &str) -> Self {
		match config.backend {
			BackendKind::Memory => {
				info!("using in-memory graph store");
				Backend::Memory(MemoryStore::with_sample())
			}
			BackendKind::Rest => {
				let base = if config.api_base.is_empty() {
					origin
				} else {
					config.api_base.as_str()
				};
				info!("using REST graph store at {base}");
				Backend::Rest(RestStore::new(base))
			}
		}
	}
}

impl GraphStore for Backend {
	async fn list_graphs(&self) -> Result<Vec<GraphSummary>, StoreError> {
		match self {
			Backend::Memory(s) => s.list_graphs().await,
			Backend::Rest(s) => s.list_graphs().await,
		}
	}

	async fn create_graph(&self, name: &str) -> Result<GraphSummary, StoreError> {
		match self {
			Backend::Memory(s) => s.create_graph(name).await,
			Backend::Rest(s) => s.create_graph(name).await,
		}
	}

	async fn delete_graph(&self, graph: &GraphId) -> Result<(), StoreError> {
		match self {
			Backend::Memory(s) => s.delete_graph(graph).await,
			Backend::Rest(s) => s.delete_graph(graph).await,
		}
	}

	async fn list_nodes(&self, graph: &GraphId) -> Result<Vec<NodeRecord>, StoreError> {
		match self {
			Backend::Memory(s) => s.list_nodes(graph).await,
			Backend::Rest(s) => s.list_nodes(graph).await,
		}
	}

	async fn node_with_neighbors(
		&self,
		graph: &GraphId,
		node: &NodeId,
	) -> Result<NodeWithNeighbors, StoreError> {
		match self {
			Backend::Memory(s) => s.node_with_neighbors(graph, node).await,
			Backend::Rest(s) => s.node_with_neighbors(graph, node).await,
		}
	}

	async fn create_node(&self, graph: &GraphId, name: &str) -> Result<NodeRecord, StoreError> {
		match self {
			Backend::Memory(s) => s.create_node(graph, name).await,
			Backend::Rest(s) => s.create_node(graph, name).await,
		}
	}

	async fn rename_node(
		&self,
		graph: &GraphId,
		node: &NodeId,
		name: &str,
	) -> Result<NodeRecord, StoreError> {
		match self {
			Backend::Memory(s) => s.rename_node(graph, node, name).await,
			Backend::Rest(s) => s.rename_node(graph, node, name).await,
		}
	}

	async fn delete_node(&self, graph: &GraphId, node: &NodeId) -> Result<(), StoreError> {
		match self {
			Backend::Memory(s) => s.delete_node(graph, node).await,
			Backend::Rest(s) => s.delete_node(graph, node).await,
		}
	}

	async fn create_edge(
		&self,
		graph: &GraphId,
		source: &NodeId,
		target: &NodeId,
	) -> Result<(), StoreError> {
		match self {
			Backend::Memory(s) => s.create_edge(graph, source, target).await,
			Backend::Rest(s) => s.create_edge(graph, source, target).await,
		}
	}

	async fn delete_edge(
		&self,
		graph: &GraphId,
		source: &NodeId,
		target: &NodeId,
	) -> Result<(), StoreError> {
		match self {
			Backend::Memory(s) => s.delete_edge(graph, source, target).await,
			Backend::Rest(s) => s.delete_edge(graph, source, target).await,
		}
	}
}
