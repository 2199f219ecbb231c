use std::cell::RefCell;
use std::collections::BTreeSet;

use log::debug;

use super::{GraphStore, GraphSummary, NodeRecord, NodeWithNeighbors, StoreError};
use crate::components::graph_editor::types::{GraphId, NodeId};

#[derive(Debug)]
struct StoredGraph {
	summary: GraphSummary,
	nodes: Vec<NodeRecord>,
	edges: BTreeSet<(NodeId, NodeId)>,
}

#[derive(Debug, Default)]
struct Inner {
	graphs: Vec<StoredGraph>,
	next_id: u64,
}

impl Inner {
	fn fresh_id(&mut self, prefix: &str) -> String {
		self.next_id += 1;
		format!("{prefix}{}", self.next_id)
	}

	fn graph(&mut self, id: &GraphId) -> Result<&mut StoredGraph, StoreError> {
		self.graphs
			.iter_mut()
			.find(|g| &g.summary.id == id)
			.ok_or_else(|| StoreError::GraphMissing(id.clone()))
	}
}

impl StoredGraph {
	fn node(&self, id: &NodeId) -> Result<&NodeRecord, StoreError> {
		self.nodes
			.iter()
			.find(|n| &n.id == id)
			.ok_or_else(|| StoreError::NotFound(id.clone()))
	}
}

/// Graph store living in page memory. Single-threaded; nothing survives a
/// reload.
#[derive(Debug, Default)]
pub struct MemoryStore {
	inner: RefCell<Inner>,
}

impl MemoryStore {
	/// Store holding one small "Sample" graph.
	pub fn with_sample() -> Self {
		let store = Self::default();
		{
			let mut inner = store.inner.borrow_mut();
			let id = GraphId(inner.fresh_id("g"));
			let names = ["Start", "Parse", "Check", "Emit"];
			let nodes: Vec<NodeRecord> = names
				.iter()
				.map(|name| NodeRecord {
					id: NodeId(inner.fresh_id("n")),
					name: name.to_string(),
				})
				.collect();
			let edges = nodes
				.windows(2)
				.map(|w| (w[0].id.clone(), w[1].id.clone()))
				.collect();
			inner.graphs.push(StoredGraph {
				summary: GraphSummary {
					id,
					name: "Sample".into(),
				},
				nodes,
				edges,
			});
		}
		store
	}
}

impl GraphStore for MemoryStore {
	async fn list_graphs(&self) -> Result<Vec<GraphSummary>, StoreError> {
		let inner = self.inner.borrow();
		Ok(inner.graphs.iter().map(|g| g.summary.clone()).collect())
	}

	async fn create_graph(&self, name: &str) -> Result<GraphSummary, StoreError> {
		let mut inner = self.inner.borrow_mut();
		let summary = GraphSummary {
			id: GraphId(inner.fresh_id("g")),
			name: name.to_string(),
		};
		inner.graphs.push(StoredGraph {
			summary: summary.clone(),
			nodes: Vec::new(),
			edges: BTreeSet::new(),
		});
		debug!("memory store: created graph {}", summary.id);
		Ok(summary)
	}

	async fn delete_graph(&self, graph: &GraphId) -> Result<(), StoreError> {
		let mut inner = self.inner.borrow_mut();
		let before = inner.graphs.len();
		inner.graphs.retain(|g| &g.summary.id != graph);
		if inner.graphs.len() == before {
			return Err(StoreError::GraphMissing(graph.clone()));
		}
		debug!("memory store: deleted graph {graph}");
		Ok(())
	}

	async fn list_nodes(&self, graph: &GraphId) -> Result<Vec<NodeRecord>, StoreError> {
		let mut inner = self.inner.borrow_mut();
		Ok(inner.graph(graph)?.nodes.clone())
	}

	async fn node_with_neighbors(
		&self,
		graph: &GraphId,
		node: &NodeId,
	) -> Result<NodeWithNeighbors, StoreError> {
		let mut inner = self.inner.borrow_mut();
		let stored = inner.graph(graph)?;
		let record = stored.node(node)?.clone();
		let to_nodes = stored
			.edges
			.iter()
			.filter(|(source, _)| source == node)
			.filter_map(|(_, target)| stored.node(target).ok().cloned())
			.collect();
		Ok(NodeWithNeighbors {
			id: record.id,
			name: record.name,
			to_nodes,
		})
	}

	async fn create_node(&self, graph: &GraphId, name: &str) -> Result<NodeRecord, StoreError> {
		let mut inner = self.inner.borrow_mut();
		let id = NodeId(inner.fresh_id("n"));
		let record = NodeRecord {
			id,
			name: name.to_string(),
		};
		inner.graph(graph)?.nodes.push(record.clone());
		Ok(record)
	}

	async fn rename_node(
		&self,
		graph: &GraphId,
		node: &NodeId,
		name: &str,
	) -> Result<NodeRecord, StoreError> {
		let mut inner = self.inner.borrow_mut();
		let stored = inner.graph(graph)?;
		let record = stored
			.nodes
			.iter_mut()
			.find(|n| &n.id == node)
			.ok_or_else(|| StoreError::NotFound(node.clone()))?;
		record.name = name.to_string();
		Ok(record.clone())
	}

	async fn delete_node(&self, graph: &GraphId, node: &NodeId) -> Result<(), StoreError> {
		let mut inner = self.inner.borrow_mut();
		let stored = inner.graph(graph)?;
		stored.node(node)?;
		stored.nodes.retain(|n| &n.id != node);
		stored
			.edges
			.retain(|(source, target)| source != node && target != node);
		Ok(())
	}

	async fn create_edge(
		&self,
		graph: &GraphId,
		source: &NodeId,
		target: &NodeId,
	) -> Result<(), StoreError> {
		let mut inner = self.inner.borrow_mut();
		let stored = inner.graph(graph)?;
		stored.node(source)?;
		stored.node(target)?;
		stored.edges.insert((source.clone(), target.clone()));
		Ok(())
	}

	async fn delete_edge(
		&self,
		graph: &GraphId,
		source: &NodeId,
		target: &NodeId,
	) -> Result<(), StoreError> {
		let mut inner = self.inner.borrow_mut();
		let stored = inner.graph(graph)?;
		stored.edges.remove(&(source.clone(), target.clone()));
		Ok(())
	}
}
