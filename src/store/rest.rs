use std::cell::RefCell;

use log::{debug, warn};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use super::{GraphStore, GraphSummary, NodeRecord, NodeWithNeighbors, StoreError};
use crate::components::graph_editor::types::{GraphId, NodeId};

const CSRF_PATH: &str = "/api/csrf";

fn default_header() -> String {
	"X-CSRF-TOKEN".into()
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
struct CsrfToken {
	token: String,
	#[serde(default = "default_header", rename = "headerName")]
	header_name: String,
}

/// Graph store backed by the JSON API.
pub struct RestStore {
	client: Client,
	base: String,
	csrf: RefCell<Option<CsrfToken>>,
}

impl RestStore {
	pub fn new(base: &str) -> Self {
		Self {
			client: Client::new(),
			base: base.trim_end_matches('/').to_string(),
			csrf: RefCell::new(None),
		}
	}

	fn url(&self, path: &str) -> String {
		format!("{}{path}", self.base)
	}

	fn nodes_url(&self, graph: &GraphId) -> String {
		self.url(&format!("/graphs/{graph}/nodes"))
	}

	fn node_url(&self, graph: &GraphId, node: &NodeId) -> String {
		self.url(&format!("/graphs/{graph}/nodes/{node}"))
	}

	fn edge_url(&self, graph: &GraphId, source: &NodeId, target: &NodeId) -> String {
		self.url(&format!("/graphs/{graph}/nodes/{source}/{target}"))
	}

	/// Fetched on first use, then reused for the lifetime of the store. A
	/// failed fetch is not remembered and yields `None`.
	async fn csrf(&self) -> Option<CsrfToken> {
		let cached = self.csrf.borrow().clone();
		if cached.is_some() {
			return cached;
		}
		match self.fetch_csrf().await {
			Ok(token) => {
				debug!("csrf token cached for header {}", token.header_name);
				*self.csrf.borrow_mut() = Some(token.clone());
				Some(token)
			}
			Err(err) => {
				warn!("no csrf token, sending without it: {err}");
				None
			}
		}
	}

	async fn fetch_csrf(&self) -> Result<CsrfToken, StoreError> {
		let response = self.client.get(self.url(CSRF_PATH)).send().await?;
		decode(response).await
	}

	async fn send_guarded(&self, request: RequestBuilder) -> Result<Response, StoreError> {
		let csrf = self.csrf().await;
		check(guard(request, csrf.as_ref()).send().await?)
	}
}

fn guard(request: RequestBuilder, csrf: Option<&CsrfToken>) -> RequestBuilder {
	match csrf {
		Some(csrf) => request.header(csrf.header_name.as_str(), csrf.token.as_str()),
		None => request,
	}
}

fn check(response: Response) -> Result<Response, StoreError> {
	let status = response.status();
	if status.is_success() {
		Ok(response)
	} else {
		Err(StoreError::Status {
			status: status.as_u16(),
			url: response.url().to_string(),
		})
	}
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, StoreError> {
	let body = check(response)?.text().await?;
	Ok(serde_json::from_str(&body)?)
}

impl GraphStore for RestStore {
	async fn list_graphs(&self) -> Result<Vec<GraphSummary>, StoreError> {
		let response = self.client.get(self.url("/graphs")).send().await?;
		decode(response).await
	}

	async fn create_graph(&self, name: &str) -> Result<GraphSummary, StoreError> {
		let request = self.client.post(self.url("/graphs")).json(&json!({ "name": name }));
		decode(self.send_guarded(request).await?).await
	}

	async fn delete_graph(&self, graph: &GraphId) -> Result<(), StoreError> {
		let request = self.client.delete(self.url(&format!("/graphs/{graph}")));
		self.send_guarded(request).await?;
		Ok(())
	}

	async fn list_nodes(&self, graph: &GraphId) -> Result<Vec<NodeRecord>, StoreError> {
		let response = self.client.get(self.nodes_url(graph)).send().await?;
		decode(response).await
	}

	async fn node_with_neighbors(
		&self,
		graph: &GraphId,
		node: &NodeId,
	) -> Result<NodeWithNeighbors, StoreError> {
		let response = self.client.get(self.node_url(graph, node)).send().await?;
		decode(response).await
	}

	async fn create_node(&self, graph: &GraphId, name: &str) -> Result<NodeRecord, StoreError> {
		let request = self
			.client
			.post(self.nodes_url(graph))
			.json(&json!({ "name": name }));
		decode(self.send_guarded(request).await?).await
	}

	async fn rename_node(
		&self,
		graph: &GraphId,
		node: &NodeId,
		name: &str,
	) -> Result<NodeRecord, StoreError> {
		let request = self
			.client
			.patch(self.node_url(graph, node))
			.json(&json!({ "name": name }));
		decode(self.send_guarded(request).await?).await
	}

	async fn delete_node(&self, graph: &GraphId, node: &NodeId) -> Result<(), StoreError> {
		let request = self.client.delete(self.node_url(graph, node));
		self.send_guarded(request).await?;
		Ok(())
	}

	async fn create_edge(
		&self,
		graph: &GraphId,
		source: &NodeId,
		target: &NodeId,
	) -> Result<(), StoreError> {
		let request = self.client.post(self.edge_url(graph, source, target));
		self.send_guarded(request).await?;
		Ok(())
	}

	async fn delete_edge(
		&self,
		graph: &GraphId,
		source: &NodeId,
		target: &NodeId,
	) -> Result<(), StoreError> {
		let request = self.client.delete(self.edge_url(graph, source, target));
		self.send_guarded(request).await?;
		Ok(())
	}
}
