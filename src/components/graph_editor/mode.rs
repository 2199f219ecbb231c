use super::editor::GraphEditor;
use super::types::{NodeId, Point};

/// How node clicks and node drags are interpreted. Exactly one is active.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum InteractionMode {
	#[default]
	Rename,
	Link,
	Move,
	Delete,
}

impl InteractionMode {
	pub const ALL: [InteractionMode; 4] = [
		InteractionMode::Rename,
		InteractionMode::Link,
		InteractionMode::Move,
		InteractionMode::Delete,
	];

	pub fn label(self) -> &'static str {
		match self {
			InteractionMode::Rename => "Rename",
			InteractionMode::Link => "Link Edge",
			InteractionMode::Move => "Move",
			InteractionMode::Delete => "Delete",
		}
	}

	pub fn hint(self) -> &'static str {
		match self {
			InteractionMode::Rename => "Click a node to rename it",
			InteractionMode::Link => "Drag from one node to another to create an edge",
			InteractionMode::Move => "Drag nodes to reposition them, drag the background to pan",
			InteractionMode::Delete => "Click a node to delete it and its edges",
		}
	}

	pub fn behavior(self) -> &'static dyn ModeBehavior {
		match self {
			InteractionMode::Rename => &RenameMode,
			InteractionMode::Link => &LinkMode,
			InteractionMode::Move => &MoveMode,
			InteractionMode::Delete => &DeleteMode,
		}
	}
}

/// Per-mode reaction to each gesture kind. Every default is "do nothing"
/// except background clicks, which create a node in every mode.
pub trait ModeBehavior {
	fn on_node_click(&self, _editor: &mut GraphEditor, _node: &NodeId) {}

	fn on_node_drag_start(&self, _editor: &mut GraphEditor, _node: &NodeId, _at: Point) {}

	fn on_node_drag(&self, _editor: &mut GraphEditor, _node: &NodeId, _at: Point) {}

	fn on_node_drag_end(&self, _editor: &mut GraphEditor, _node: &NodeId, _at: Point) {}

	fn on_background_click(&self, editor: &mut GraphEditor, at: Point) {
		editor.create_node_at(at, false);
	}

	/// Whether a primary press on the background pans the view.
	fn primary_pans_background(&self) -> bool {
		false
	}

	/// Style class for node glyphs, purely cosmetic.
	fn style_class(&self) -> Option<&'static str> {
		None
	}
}

struct RenameMode;

impl ModeBehavior for RenameMode {
	fn on_node_click(&self, editor: &mut GraphEditor, node: &NodeId) {
		editor.open_session(node);
	}

	fn on_background_click(&self, editor: &mut GraphEditor, at: Point) {
		editor.create_node_at(at, true);
	}
}

struct LinkMode;

impl ModeBehavior for LinkMode {
	fn on_node_drag_start(&self, editor: &mut GraphEditor, node: &NodeId, _at: Point) {
		editor.begin_link(node);
	}

	fn on_node_drag(&self, editor: &mut GraphEditor, _node: &NodeId, at: Point) {
		editor.update_link(at);
	}

	fn on_node_drag_end(&self, editor: &mut GraphEditor, _node: &NodeId, at: Point) {
		editor.finish_link(at);
	}

	fn style_class(&self) -> Option<&'static str> {
		Some("link-mode")
	}
}

struct MoveMode;

impl ModeBehavior for MoveMode {
	fn on_node_drag_start(&self, editor: &mut GraphEditor, node: &NodeId, at: Point) {
		editor.begin_move(node, at);
	}

	fn on_node_drag(&self, editor: &mut GraphEditor, node: &NodeId, at: Point) {
		editor.move_node(node, at);
	}

	fn on_node_drag_end(&self, editor: &mut GraphEditor, node: &NodeId, _at: Point) {
		editor.finish_move(node);
	}

	fn primary_pans_background(&self) -> bool {
		true
	}

	fn style_class(&self) -> Option<&'static str> {
		Some("move-mode")
	}
}

struct DeleteMode;

impl ModeBehavior for DeleteMode {
	fn on_node_click(&self, editor: &mut GraphEditor, node: &NodeId) {
		editor.delete_node(node);
	}

	fn style_class(&self) -> Option<&'static str> {
		Some("delete-mode")
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn only_move_pans_with_primary() {
		for mode in InteractionMode::ALL {
			assert_eq!(
				mode.behavior().primary_pans_background(),
				mode == InteractionMode::Move
			);
		}
	}

	#[test]
	fn default_mode_is_rename() {
		assert_eq!(InteractionMode::default(), InteractionMode::Rename);
	}
}
