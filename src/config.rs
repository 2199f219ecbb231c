//! Editor settings persisted in the browser's local storage.

use anyhow::Context;
use log::Level;
use serde::{Deserialize, Serialize};

/// Local storage key holding the JSON settings.
pub const STORAGE_KEY: &str = "graph-editor.config";

/// Which persistence backend the editor talks to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
	/// In-process store, nothing leaves the page.
	#[default]
	Memory,
	/// REST API served next to the page.
	Rest,
}

/// Tuning of the force-directed layout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
	/// Rest length of the spring along each edge.
	pub link_distance: f64,
	/// Many-body strength; negative values repel.
	pub charge_strength: f64,
	/// Per-node collision radius.
	pub collision_radius: f64,
	/// Fraction of velocity lost on every tick.
	pub velocity_decay: f64,
	/// The simulation stops once alpha falls below this.
	pub alpha_min: f64,
	/// Starting alpha when nodes already have remembered positions, and
	/// after a pointer release.
	pub settle_alpha: f64,
	/// Alpha decay used together with `settle_alpha`.
	pub settle_alpha_decay: f64,
}

impl Default for LayoutConfig {
	fn default() -> Self {
		Self {
			link_distance: 150.0,
			charge_strength: -400.0,
			collision_radius: 25.0,
			velocity_decay: 0.4,
			alpha_min: 0.001,
			settle_alpha: 0.1,
			settle_alpha_decay: 0.05,
		}
	}
}

impl LayoutConfig {
	/// Decay that takes alpha from 1 to `alpha_min` in 300 ticks.
	pub fn full_alpha_decay(&self) -> f64 {
		1.0 - self.alpha_min.powf(1.0 / 300.0)
	}
}

/// Top-level editor settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
	/// Persistence backend.
	pub backend: BackendKind,
	/// Base URL of the REST API; empty means the page origin.
	pub api_base: String,
	/// Console log level (`error`, `warn`, `info`, `debug`, `trace`).
	pub log_level: String,
	/// Layout tuning.
	pub layout: LayoutConfig,
}

impl Default for EditorConfig {
	fn default() -> Self {
		Self {
			backend: BackendKind::Memory,
			api_base: String::new(),
			log_level: "debug".into(),
			layout: LayoutConfig::default(),
		}
	}
}

impl EditorConfig {
	/// Parses settings from JSON, filling in defaults for missing fields.
	pub fn from_json(raw: &str) -> anyhow::Result<Self> {
		serde_json::from_str(raw).context("parsing editor settings")
	}

	/// Reads settings from local storage. `Ok(None)` when nothing is stored.
	pub fn load() -> anyhow::Result<Option<Self>> {
		let storage = web_sys::window()
			.context("no window")?
			.local_storage()
			.map_err(|e| anyhow::anyhow!("local storage unavailable: {e:?}"))?
			.context("local storage disabled")?;
		let raw = storage
			.get_item(STORAGE_KEY)
			.map_err(|e| anyhow::anyhow!("reading {STORAGE_KEY}: {e:?}"))?;
		raw.as_deref().map(Self::from_json).transpose()
	}

	/// Log level parsed from `log_level`, `Debug` when unrecognised.
	pub fn level(&self) -> Level {
		self.log_level.parse().unwrap_or(Level::Debug)
	}
}
