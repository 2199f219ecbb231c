use std::f64::consts::PI;

use wasm_bindgen::JsValue;
use web_sys::CanvasRenderingContext2d;

use super::gesture::ViewTransform;
use super::scene::{NODE_RADIUS, NodeGlyph, Scene};
use super::types::Point;

const BACKGROUND: &str = "#1a1a2e";
const EDGE: &str = "rgba(100, 180, 255, 0.7)";

fn node_fill(glyph: &NodeGlyph, mode_class: Option<&str>) -> &'static str {
	if glyph.editing {
		"#f0a500"
	} else if glyph.drag_target {
		"#2ca02c"
	} else if glyph.drag_source {
		"#17becf"
	} else if glyph.selected {
		"#9467bd"
	} else {
		match mode_class {
			Some("delete-mode") => "#d62728",
			Some("move-mode") => "#8c564b",
			_ => "#1f77b4",
		}
	}
}

pub fn render(
	scene: &Scene,
	view: &ViewTransform,
	width: f64,
	height: f64,
	ctx: &CanvasRenderingContext2d,
) {
	ctx.set_fill_style_str(BACKGROUND);
	ctx.fill_rect(0.0, 0.0, width, height);
	ctx.save();
	let _ = ctx.translate(view.x, view.y);
	let _ = ctx.scale(view.k, view.k);
	draw_edges(scene, view.k, ctx);
	if let Some((from, to)) = scene.drag_line {
		draw_drag_line(from, to, view.k, ctx);
	}
	draw_nodes(scene, view.k, ctx);
	ctx.restore();
}

fn draw_edges(scene: &Scene, k: f64, ctx: &CanvasRenderingContext2d) {
	let (line_width, arrow_size) = (1.5 / k.max(0.5), 10.0);
	ctx.set_stroke_style_str(EDGE);
	ctx.set_fill_style_str(EDGE);
	ctx.set_line_width(line_width);

	for edge in &scene.edges {
		let (dx, dy) = (edge.to.x - edge.from.x, edge.to.y - edge.from.y);
		let dist = (dx * dx + dy * dy).sqrt();
		if dist <= 2.0 * NODE_RADIUS {
			continue;
		}

		let (ux, uy) = (dx / dist, dy / dist);
		ctx.begin_path();
		ctx.move_to(edge.from.x + ux * NODE_RADIUS, edge.from.y + uy * NODE_RADIUS);
		ctx.line_to(
			edge.to.x - ux * (NODE_RADIUS + arrow_size),
			edge.to.y - uy * (NODE_RADIUS + arrow_size),
		);
		ctx.stroke();

		let (tip_x, tip_y) = (edge.to.x - ux * NODE_RADIUS, edge.to.y - uy * NODE_RADIUS);
		let (back_x, back_y) = (tip_x - ux * arrow_size, tip_y - uy * arrow_size);
		let (px, py) = (-uy * arrow_size * 0.5, ux * arrow_size * 0.5);
		ctx.begin_path();
		ctx.move_to(tip_x, tip_y);
		ctx.line_to(back_x + px, back_y + py);
		ctx.line_to(back_x - px, back_y - py);
		ctx.close_path();
		ctx.fill();
	}
}

fn draw_drag_line(from: Point, to: Point, k: f64, ctx: &CanvasRenderingContext2d) {
	let (dash, gap) = (8.0 / k, 4.0 / k);
	ctx.set_stroke_style_str("rgba(255, 255, 255, 0.8)");
	ctx.set_line_width(2.0 / k);
	let _ = ctx.set_line_dash(&js_sys::Array::of2(
		&JsValue::from_f64(dash),
		&JsValue::from_f64(gap),
	));
	ctx.begin_path();
	ctx.move_to(from.x, from.y);
	ctx.line_to(to.x, to.y);
	ctx.stroke();
	let _ = ctx.set_line_dash(&js_sys::Array::new());
}

fn draw_nodes(scene: &Scene, k: f64, ctx: &CanvasRenderingContext2d) {
	ctx.set_font(&format!("{}px sans-serif", 12.0 / k.max(1.0)));
	ctx.set_text_align("center");
	ctx.set_text_baseline("middle");

	for glyph in &scene.nodes {
		let Point { x, y } = glyph.at;
		ctx.begin_path();
		let _ = ctx.arc(x, y, NODE_RADIUS, 0.0, 2.0 * PI);
		ctx.set_fill_style_str(node_fill(glyph, scene.mode_class));
		ctx.fill();

		// ring marks anything the user is acting on
		if glyph.selected || glyph.editing || glyph.drag_source || glyph.drag_target {
			ctx.set_stroke_style_str("white");
			ctx.set_line_width(2.0 / k);
			ctx.stroke();
		}

		ctx.set_fill_style_str("white");
		let _ = ctx.fill_text(&glyph.label, x, y);
	}
}
