use super::types::{NodeId, Point};

/// Screen distance a press must travel before it counts as a drag.
pub const DRAG_THRESHOLD: f64 = 3.0;
pub const MIN_ZOOM: f64 = 0.1;
pub const MAX_ZOOM: f64 = 4.0;

/// Pan and zoom of the world inside the canvas.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewTransform {
	pub x: f64,
	pub y: f64,
	pub k: f64,
}

impl Default for ViewTransform {
	fn default() -> Self {
		Self {
			x: 0.0,
			y: 0.0,
			k: 1.0,
		}
	}
}

impl ViewTransform {
	pub fn screen_to_world(&self, s: Point) -> Point {
		Point::new((s.x - self.x) / self.k, (s.y - self.y) / self.k)
	}

	pub fn world_to_screen(&self, w: Point) -> Point {
		Point::new(w.x * self.k + self.x, w.y * self.k + self.y)
	}

	pub fn pan(&mut self, dx: f64, dy: f64) {
		self.x += dx;
		self.y += dy;
	}

	/// Zooms around the screen point `at`, keeping it fixed.
	pub fn zoom_at(&mut self, at: Point, delta_y: f64) {
		let factor = if delta_y > 0.0 { 0.9 } else { 1.1 };
		let new_k = (self.k * factor).clamp(MIN_ZOOM, MAX_ZOOM);
		let ratio = new_k / self.k;
		self.x = at.x - (at.x - self.x) * ratio;
		self.y = at.y - (at.y - self.y) * ratio;
		self.k = new_k;
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerButton {
	Primary,
	Middle,
	Secondary,
	Other,
}

impl PointerButton {
	/// Maps `MouseEvent.button`.
	pub fn from_dom(button: i16) -> Self {
		match button {
			0 => PointerButton::Primary,
			1 => PointerButton::Middle,
			2 => PointerButton::Secondary,
			_ => PointerButton::Other,
		}
	}
}

/// A classified pointer gesture. Positions are in world space.
#[derive(Clone, Debug, PartialEq)]
pub enum Gesture {
	NodeDragStart { node: NodeId, at: Point },
	NodeDrag { node: NodeId, at: Point },
	NodeDragEnd { node: NodeId, at: Point },
	NodeClick { node: NodeId },
	BackgroundClick { at: Point },
	/// Screen-space pan delta.
	Pan { dx: f64, dy: f64 },
}

#[derive(Clone, Debug, Default)]
enum Press {
	#[default]
	Idle,
	Node {
		node: NodeId,
		origin: Point,
		last: Point,
		moved: bool,
	},
	Background {
		origin: Point,
		moved: bool,
	},
	Pan {
		origin: Point,
		last: Point,
		moved: bool,
		clicks: bool,
	},
}

fn travelled(origin: Point, at: Point) -> bool {
	origin.distance(at) > DRAG_THRESHOLD
}

/// Turns raw down/move/up input into gestures.
///
/// A press on a node yields drag start on down, drag on every move, drag end
/// on up, and a click after the drag end only when the pointer stayed within
/// the threshold. Background presses yield a click under the same rule; a
/// press that panned never clicks.
#[derive(Clone, Debug, Default)]
pub struct GestureInterpreter {
	press: Press,
}

impl GestureInterpreter {
	pub fn is_pressed(&self) -> bool {
		!matches!(self.press, Press::Idle)
	}

	/// `hit` is the node under the pointer. `primary_pans` lets a primary
	/// press on the background pan the view.
	pub fn pointer_down(
		&mut self,
		button: PointerButton,
		screen: Point,
		hit: Option<NodeId>,
		primary_pans: bool,
		view: &ViewTransform,
	) -> Vec<Gesture> {
		if self.is_pressed() {
			return Vec::new();
		}
		match (button, hit) {
			(PointerButton::Secondary, _) => {
				self.press = Press::Pan {
					origin: screen,
					last: screen,
					moved: false,
					clicks: false,
				};
				Vec::new()
			}
			(PointerButton::Primary, Some(node)) => {
				let at = view.screen_to_world(screen);
				self.press = Press::Node {
					node: node.clone(),
					origin: screen,
					last: screen,
					moved: false,
				};
				vec![Gesture::NodeDragStart { node, at }]
			}
			(PointerButton::Primary, None) if primary_pans => {
				self.press = Press::Pan {
					origin: screen,
					last: screen,
					moved: false,
					clicks: true,
				};
				Vec::new()
			}
			(PointerButton::Primary, None) => {
				self.press = Press::Background {
					origin: screen,
					moved: false,
				};
				Vec::new()
			}
			_ => Vec::new(),
		}
	}

	pub fn pointer_move(&mut self, screen: Point, view: &ViewTransform) -> Vec<Gesture> {
		match &mut self.press {
			Press::Idle => Vec::new(),
			Press::Node {
				node,
				origin,
				last,
				moved,
			} => {
				*moved |= travelled(*origin, screen);
				*last = screen;
				vec![Gesture::NodeDrag {
					node: node.clone(),
					at: view.screen_to_world(screen),
				}]
			}
			Press::Background { origin, moved } => {
				*moved |= travelled(*origin, screen);
				Vec::new()
			}
			Press::Pan {
				origin, last, moved, ..
			} => {
				*moved |= travelled(*origin, screen);
				let (dx, dy) = (screen.x - last.x, screen.y - last.y);
				*last = screen;
				if dx == 0.0 && dy == 0.0 {
					Vec::new()
				} else {
					vec![Gesture::Pan { dx, dy }]
				}
			}
		}
	}

	pub fn pointer_up(&mut self, screen: Point, view: &ViewTransform) -> Vec<Gesture> {
		let mut out = self.pointer_move(screen, view);
		out.retain(|g| !matches!(g, Gesture::NodeDrag { .. }));
		let at = view.screen_to_world(screen);
		match std::mem::take(&mut self.press) {
			Press::Idle => {}
			Press::Node { node, moved, .. } => {
				out.push(Gesture::NodeDragEnd {
					node: node.clone(),
					at,
				});
				if !moved {
					out.push(Gesture::NodeClick { node });
				}
			}
			Press::Background { moved, .. } => {
				if !moved {
					out.push(Gesture::BackgroundClick { at });
				}
			}
			Press::Pan { moved, clicks, .. } => {
				if clicks && !moved {
					out.push(Gesture::BackgroundClick { at });
				}
			}
		}
		out
	}

	/// Abandons the press when the pointer leaves the canvas. A held node
	/// still gets its drag end; nothing clicks.
	pub fn cancel(&mut self, view: &ViewTransform) -> Vec<Gesture> {
		match std::mem::take(&mut self.press) {
			Press::Node { node, last, .. } => vec![Gesture::NodeDragEnd {
				node,
				at: view.screen_to_world(last),
			}],
			_ => Vec::new(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn id(s: &str) -> NodeId {
		NodeId::from(s)
	}

	#[test]
	fn stationary_node_press_is_drag_start_end_then_click() {
		let view = ViewTransform::default();
		let mut g = GestureInterpreter::default();
		let p = Point::new(10.0, 10.0);
		let down = g.pointer_down(PointerButton::Primary, p, Some(id("a")), false, &view);
		assert_eq!(
			down,
			vec![Gesture::NodeDragStart {
				node: id("a"),
				at: p
			}]
		);
		let up = g.pointer_up(p, &view);
		assert_eq!(
			up,
			vec![
				Gesture::NodeDragEnd { node: id("a"), at: p },
				Gesture::NodeClick { node: id("a") },
			]
		);
		assert!(!g.is_pressed());
	}

	#[test]
	fn dragged_node_press_never_clicks() {
		let view = ViewTransform::default();
		let mut g = GestureInterpreter::default();
		g.pointer_down(PointerButton::Primary, Point::new(0.0, 0.0), Some(id("a")), false, &view);
		let mv = g.pointer_move(Point::new(20.0, 0.0), &view);
		assert!(matches!(mv[0], Gesture::NodeDrag { .. }));
		// coming back near the origin does not turn it into a click
		let up = g.pointer_up(Point::new(1.0, 0.0), &view);
		assert_eq!(up.len(), 1);
		assert!(matches!(up[0], Gesture::NodeDragEnd { .. }));
	}

	#[test]
	fn small_jitter_still_clicks() {
		let view = ViewTransform::default();
		let mut g = GestureInterpreter::default();
		g.pointer_down(PointerButton::Primary, Point::new(0.0, 0.0), None, false, &view);
		g.pointer_move(Point::new(1.0, 1.0), &view);
		let up = g.pointer_up(Point::new(2.0, 0.0), &view);
		assert_eq!(
			up,
			vec![Gesture::BackgroundClick {
				at: Point::new(2.0, 0.0)
			}]
		);
	}

	#[test]
	fn background_drag_without_pan_creates_nothing() {
		let view = ViewTransform::default();
		let mut g = GestureInterpreter::default();
		g.pointer_down(PointerButton::Primary, Point::new(0.0, 0.0), None, false, &view);
		assert!(g.pointer_move(Point::new(40.0, 0.0), &view).is_empty());
		assert!(g.pointer_up(Point::new(40.0, 0.0), &view).is_empty());
	}

	#[test]
	fn primary_pan_consumes_its_click() {
		let view = ViewTransform::default();
		let mut g = GestureInterpreter::default();
		g.pointer_down(PointerButton::Primary, Point::new(0.0, 0.0), None, true, &view);
		let mv = g.pointer_move(Point::new(30.0, 5.0), &view);
		assert_eq!(mv, vec![Gesture::Pan { dx: 30.0, dy: 5.0 }]);
		assert!(g.pointer_up(Point::new(30.0, 5.0), &view).is_empty());
	}

	#[test]
	fn primary_pan_press_without_motion_clicks() {
		let view = ViewTransform::default();
		let mut g = GestureInterpreter::default();
		g.pointer_down(PointerButton::Primary, Point::new(5.0, 5.0), None, true, &view);
		let up = g.pointer_up(Point::new(5.0, 5.0), &view);
		assert_eq!(
			up,
			vec![Gesture::BackgroundClick {
				at: Point::new(5.0, 5.0)
			}]
		);
	}

	#[test]
	fn secondary_button_pans_even_over_a_node() {
		let view = ViewTransform::default();
		let mut g = GestureInterpreter::default();
		let down = g.pointer_down(PointerButton::Secondary, Point::new(0.0, 0.0), Some(id("a")), false, &view);
		assert!(down.is_empty());
		assert_eq!(
			g.pointer_move(Point::new(0.0, 8.0), &view),
			vec![Gesture::Pan { dx: 0.0, dy: 8.0 }]
		);
		assert!(g.pointer_up(Point::new(0.0, 8.0), &view).is_empty());
	}

	#[test]
	fn positions_are_reported_in_world_space() {
		let view = ViewTransform {
			x: 100.0,
			y: 50.0,
			k: 2.0,
		};
		let mut g = GestureInterpreter::default();
		g.pointer_down(PointerButton::Primary, Point::new(140.0, 90.0), None, false, &view);
		let up = g.pointer_up(Point::new(140.0, 90.0), &view);
		assert_eq!(
			up,
			vec![Gesture::BackgroundClick {
				at: Point::new(20.0, 20.0)
			}]
		);
	}

	#[test]
	fn cancel_ends_drag_without_click() {
		let view = ViewTransform::default();
		let mut g = GestureInterpreter::default();
		g.pointer_down(PointerButton::Primary, Point::new(0.0, 0.0), Some(id("a")), false, &view);
		let out = g.cancel(&view);
		assert_eq!(
			out,
			vec![Gesture::NodeDragEnd {
				node: id("a"),
				at: Point::new(0.0, 0.0)
			}]
		);
		assert!(!g.is_pressed());
	}

	#[test]
	fn zoom_keeps_anchor_fixed_and_clamps() {
		let mut view = ViewTransform::default();
		let anchor = Point::new(200.0, 100.0);
		let before = view.screen_to_world(anchor);
		view.zoom_at(anchor, -1.0);
		let after = view.screen_to_world(anchor);
		assert!(before.distance(after) < 1e-9);
		for _ in 0..100 {
			view.zoom_at(anchor, -1.0);
		}
		assert_eq!(view.k, MAX_ZOOM);
	}
}
