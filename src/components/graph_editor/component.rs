use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use leptos::ev::SubmitEvent;
use leptos::prelude::*;
use log::{debug, warn};
use wasm_bindgen::prelude::*;
use web_sys::{
	CanvasRenderingContext2d, FocusEvent, HtmlCanvasElement, KeyboardEvent, MouseEvent, WheelEvent,
};

use super::editor::GraphEditor;
use super::gesture::PointerButton;
use super::mode::InteractionMode;
use super::render;
use super::types::{GraphId, NodeId, Point};
use crate::config::EditorConfig;
use crate::store::{self, Backend, GraphSummary};

type CallbackSlot = Rc<RefCell<Option<Closure<dyn FnMut()>>>>;

/// Where the rename field sits and what it starts with.
#[derive(Clone, Debug, PartialEq)]
struct RenameOverlay {
	node: NodeId,
	initial: String,
	at: Point,
}

/// Reactive mirror of the parts of the editor the surrounding UI shows.
#[derive(Clone, Copy)]
struct Ui {
	mode: RwSignal<InteractionMode>,
	status: RwSignal<String>,
	error: RwSignal<Option<String>>,
	graphs: RwSignal<Vec<GraphSummary>>,
	active: RwSignal<Option<GraphId>>,
	loading: RwSignal<bool>,
	nodes: RwSignal<Vec<(NodeId, String)>>,
	edges: RwSignal<Vec<(NodeId, NodeId, String)>>,
	selected: RwSignal<Option<NodeId>>,
	rename: RwSignal<Option<RenameOverlay>>,
}

fn put<T: PartialEq + Send + Sync + 'static>(signal: RwSignal<T>, value: T) {
	if signal.try_with_untracked(|v| v != &value).unwrap_or(false) {
		signal.set(value);
	}
}

impl Ui {
	fn new() -> Self {
		Self {
			mode: RwSignal::new(InteractionMode::default()),
			status: RwSignal::new(String::new()),
			error: RwSignal::new(None),
			graphs: RwSignal::new(Vec::new()),
			active: RwSignal::new(None),
			loading: RwSignal::new(false),
			nodes: RwSignal::new(Vec::new()),
			edges: RwSignal::new(Vec::new()),
			selected: RwSignal::new(None),
			rename: RwSignal::new(None),
		}
	}

	/// Copies editor state into the signals. The editor is released before
	/// any signal is written.
	fn sync(&self, editor: &RefCell<GraphEditor>) {
		let state = UiState::capture(&editor.borrow());
		put(self.mode, state.mode);
		put(self.status, state.status);
		put(self.error, state.error);
		put(self.graphs, state.graphs);
		put(self.active, state.active);
		put(self.loading, state.loading);
		put(self.nodes, state.nodes);
		put(self.edges, state.edges);
		put(self.selected, state.selected);

		// only a different node replaces the field, typing must not
		let current = self
			.rename
			.try_with_untracked(|r| r.as_ref().map(|r| r.node.clone()))
			.flatten();
		if state.rename.as_ref().map(|r| &r.node) != current.as_ref() {
			self.rename.set(state.rename);
		}
	}
}

struct UiState {
	mode: InteractionMode,
	status: String,
	error: Option<String>,
	graphs: Vec<GraphSummary>,
	active: Option<GraphId>,
	loading: bool,
	nodes: Vec<(NodeId, String)>,
	edges: Vec<(NodeId, NodeId, String)>,
	selected: Option<NodeId>,
	rename: Option<RenameOverlay>,
}

impl UiState {
	fn capture(editor: &GraphEditor) -> Self {
		Self {
			mode: editor.mode(),
			status: editor.status().to_string(),
			error: editor.error().map(str::to_string),
			graphs: editor.graphs().to_vec(),
			active: editor.active_graph().cloned(),
			loading: editor.is_loading(),
			nodes: editor.node_names(),
			edges: editor.edge_labels(),
			selected: editor.selected().cloned(),
			rename: editor.session().map(|s| RenameOverlay {
				node: s.node().clone(),
				initial: s.pending().to_string(),
				at: s.overlay(),
			}),
		}
	}
}

/// Shared handles behind every event handler.
#[derive(Clone)]
struct Controller {
	editor: Rc<RefCell<GraphEditor>>,
	store: Rc<Backend>,
	ui: Ui,
}

impl Controller {
	/// Runs `f` against the editor, mirrors the result into the UI and sends
	/// whatever the editor queued.
	fn act(&self, f: impl FnOnce(&mut GraphEditor)) {
		f(&mut self.editor.borrow_mut());
		self.ui.sync(&self.editor);
		flush(self.editor.clone(), self.store.clone(), self.ui);
	}
}

/// Executes queued requests in order, feeding each outcome back before the
/// next one runs.
fn flush(editor: Rc<RefCell<GraphEditor>>, store: Rc<Backend>, ui: Ui) {
	let requests = editor.borrow_mut().take_requests();
	if requests.is_empty() {
		return;
	}
	leptos::task::spawn_local(async move {
		for request in requests {
			let outcome = store::execute(store.as_ref(), request).await;
			editor.borrow_mut().apply_outcome(outcome);
			ui.sync(&editor);
		}
		flush(editor, store, ui);
	});
}

fn context_2d(canvas: &HtmlCanvasElement) -> Option<CanvasRenderingContext2d> {
	canvas.get_context("2d").ok().flatten()?.dyn_into().ok()
}

fn parent_size(canvas: &HtmlCanvasElement) -> (f64, f64) {
	canvas
		.parent_element()
		.map(|p| (p.client_width() as f64, p.client_height() as f64))
		.filter(|&(w, h)| w > 0.0 && h > 0.0)
		.unwrap_or((800.0, 600.0))
}

fn request_frame(slot: &CallbackSlot) {
	let Some(window) = web_sys::window() else {
		return;
	};
	if let Some(ref cb) = *slot.borrow() {
		let _ = window.request_animation_frame(cb.as_ref().unchecked_ref());
	}
}

fn start_frame_loop(
	editor: Rc<RefCell<GraphEditor>>,
	ctx: CanvasRenderingContext2d,
	alive: Arc<AtomicBool>,
	slot: CallbackSlot,
) {
	let next = slot.clone();
	*slot.borrow_mut() = Some(Closure::new(move || {
		if !alive.load(Ordering::Relaxed) {
			editor.borrow_mut().shutdown();
			debug!("frame loop stopped");
			return;
		}
		{
			let mut e = editor.borrow_mut();
			e.tick();
			let (w, h) = e.size();
			render::render(e.scene(), e.view(), w, h, &ctx);
		}
		request_frame(&next);
	}));
	request_frame(&slot);
}

/// Canvas-local pointer position and the canvas' own page offset.
fn pointer(canvas_ref: NodeRef<leptos::html::Canvas>, ev: &MouseEvent) -> Option<(Point, Point)> {
	let canvas: HtmlCanvasElement = canvas_ref.get_untracked()?.into();
	let rect = canvas.get_bounding_client_rect();
	let at = Point::new(
		ev.client_x() as f64 - rect.left(),
		ev.client_y() as f64 - rect.top(),
	);
	Some((at, Point::new(rect.left(), rect.top())))
}

#[component]
pub fn GraphEditorCanvas(config: EditorConfig) -> impl IntoView {
	let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
	let rename_ref = NodeRef::<leptos::html::Input>::new();
	let ui = Ui::new();
	let origin = web_sys::window()
		.and_then(|w| w.location().origin().ok())
		.unwrap_or_default();
	let controller = Controller {
		editor: Rc::new(RefCell::new(GraphEditor::new(config.layout.clone(), 800.0, 600.0))),
		store: Rc::new(Backend::from_config(&config, &origin)),
		ui,
	};
	controller.act(GraphEditor::refresh_graphs);
	let ctl = StoredValue::new_local(controller);

	let alive = Arc::new(AtomicBool::new(true));
	let animate: CallbackSlot = Rc::new(RefCell::new(None));
	let resize_cb: CallbackSlot = Rc::new(RefCell::new(None));
	let alive_cleanup = alive.clone();
	on_cleanup(move || alive_cleanup.store(false, Ordering::Relaxed));

	Effect::new(move |_| {
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		let canvas: HtmlCanvasElement = canvas.into();
		let Some(ctx) = context_2d(&canvas) else {
			warn!("canvas has no 2d context");
			return;
		};
		let Some(editor) = ctl.try_with_value(|c| c.editor.clone()) else {
			return;
		};
		let (w, h) = parent_size(&canvas);
		canvas.set_width(w as u32);
		canvas.set_height(h as u32);
		editor.borrow_mut().resize(w, h);

		let (editor_resize, canvas_resize) = (editor.clone(), canvas.clone());
		*resize_cb.borrow_mut() = Some(Closure::new(move || {
			let (nw, nh) = parent_size(&canvas_resize);
			canvas_resize.set_width(nw as u32);
			canvas_resize.set_height(nh as u32);
			editor_resize.borrow_mut().resize(nw, nh);
		}));
		if let (Some(window), Some(cb)) = (web_sys::window(), resize_cb.borrow().as_ref()) {
			let _ = window.add_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
		}

		start_frame_loop(editor, ctx, alive.clone(), animate.clone());
	});

	// the rename field takes focus as soon as it appears
	Effect::new(move |_| {
		if let Some(input) = rename_ref.get() {
			let _ = input.focus();
			input.select();
		}
	});

	let on_mousedown = move |ev: MouseEvent| {
		let Some((at, offset)) = pointer(canvas_ref, &ev) else {
			return;
		};
		let button = PointerButton::from_dom(ev.button());
		ctl.with_value(|c| {
			c.act(|e| {
				e.set_container_offset(offset);
				e.pointer_down(button, at);
			})
		});
	};

	let on_mousemove = move |ev: MouseEvent| {
		if let Some((at, _)) = pointer(canvas_ref, &ev) {
			ctl.with_value(|c| c.act(|e| e.pointer_move(at)));
		}
	};

	let on_mouseup = move |ev: MouseEvent| {
		if let Some((at, _)) = pointer(canvas_ref, &ev) {
			ctl.with_value(|c| c.act(|e| e.pointer_up(at)));
		}
	};

	let on_mouseleave = move |_: MouseEvent| {
		ctl.with_value(|c| c.act(GraphEditor::pointer_leave));
	};

	let on_wheel = move |ev: WheelEvent| {
		ev.prevent_default();
		if let Some((at, _)) = pointer(canvas_ref, &ev) {
			ctl.with_value(|c| c.act(|e| e.wheel(at, ev.delta_y())));
		}
	};

	let commit = move |text: String| ctl.with_value(|c| c.act(|e| e.commit_rename(&text)));

	let new_graph = RwSignal::new(String::new());
	let on_create_graph = move |ev: SubmitEvent| {
		ev.prevent_default();
		let name = new_graph.get_untracked();
		ctl.with_value(|c| c.act(|e| e.create_graph(&name)));
		new_graph.set(String::new());
	};

	let new_node = RwSignal::new(String::new());
	let on_add_node = move |ev: SubmitEvent| {
		ev.prevent_default();
		let name = new_node.get_untracked();
		ctl.with_value(|c| c.act(|e| e.add_node(&name)));
		new_node.set(String::new());
	};

	let (edge_from, edge_to) = (RwSignal::new(String::new()), RwSignal::new(String::new()));
	let on_add_edge = move |ev: SubmitEvent| {
		ev.prevent_default();
		let (from, to) = (edge_from.get_untracked(), edge_to.get_untracked());
		if from.is_empty() || to.is_empty() {
			return;
		}
		ctl.with_value(|c| c.act(|e| e.add_edge(&NodeId(from), &NodeId(to))));
		edge_from.set(String::new());
		edge_to.set(String::new());
	};

	let node_options = move || {
		ui.nodes
			.get()
			.into_iter()
			.map(|(id, name)| view! { <option value=id.0>{name}</option> })
			.collect_view()
	};

	view! {
		<div class="graph-editor">
			<aside class="editor-sidebar">
				<section class="mode-toolbar">
					{InteractionMode::ALL
						.into_iter()
						.map(|mode| {
							view! {
								<button
									class:active=move || ui.mode.get() == mode
									title=mode.hint()
									on:click=move |_| ctl.with_value(|c| c.act(|e| e.set_mode(mode)))
								>
									{mode.label()}
								</button>
							}
						})
						.collect_view()}
				</section>

				<section class="graph-list">
					<h2>"Graphs"</h2>
					<ul>
						{move || {
							let active = ui.active.get();
							ui.graphs
								.get()
								.into_iter()
								.map(|graph| {
									let is_active = active.as_ref() == Some(&graph.id);
									let (id, doomed) = (graph.id.clone(), graph.id.clone());
									view! {
										<li
											class:active=is_active
											on:click=move |_| {
												let id = id.clone();
												ctl.with_value(|c| c.act(|e| e.select_graph(id)));
											}
										>
											{graph.name}
											<button
												class="delete"
												title="Delete graph"
												on:click=move |ev: MouseEvent| {
													ev.stop_propagation();
													ctl.with_value(|c| c.act(|e| e.delete_graph(&doomed)));
												}
											>
												"x"
											</button>
										</li>
									}
								})
								.collect_view()
						}}
					</ul>
					<form on:submit=on_create_graph>
						<input
							type="text"
							placeholder="New graph name"
							prop:value=move || new_graph.get()
							on:input=move |ev| new_graph.set(event_target_value(&ev))
						/>
						<button type="submit">"Create"</button>
					</form>
				</section>

				<section class="node-list">
					<h2>"Nodes"</h2>
					<form on:submit=on_add_node>
						<input
							type="text"
							placeholder="Node name"
							prop:value=move || new_node.get()
							on:input=move |ev| new_node.set(event_target_value(&ev))
						/>
						<button type="submit" disabled=move || ui.active.get().is_none()>
							"Add node"
						</button>
					</form>
					<ul>
						{move || {
							let selected = ui.selected.get();
							ui.nodes
								.get()
								.into_iter()
								.map(|(id, name)| {
									let is_selected = selected.as_ref() == Some(&id);
									view! {
										<li
											class:selected=is_selected
											on:click=move |_| ctl.with_value(|c| c.act(|e| e.select_node(&id)))
										>
											{name}
										</li>
									}
								})
								.collect_view()
						}}
					</ul>
				</section>

				<section class="edge-list">
					<h2>"Edges"</h2>
					<form on:submit=on_add_edge>
						<select
							prop:value=move || edge_from.get()
							on:change=move |ev| edge_from.set(event_target_value(&ev))
						>
							<option value="">"From..."</option>
							{node_options}
						</select>
						<select
							prop:value=move || edge_to.get()
							on:change=move |ev| edge_to.set(event_target_value(&ev))
						>
							<option value="">"To..."</option>
							{node_options}
						</select>
						<button type="submit" disabled=move || ui.active.get().is_none()>
							"Add edge"
						</button>
					</form>
					<ul>
						{move || {
							ui.edges
								.get()
								.into_iter()
								.map(|(source, target, label)| {
									view! {
										<li>
											{label}
											<button
												class="delete"
												title="Delete edge"
												on:click=move |_| {
													ctl.with_value(|c| c.act(|e| e.delete_edge(&source, &target)))
												}
											>
												"x"
											</button>
										</li>
									}
								})
								.collect_view()
						}}
					</ul>
				</section>
			</aside>

			<main class="canvas-wrap">
				<canvas
					node_ref=canvas_ref
					class="graph-canvas"
					on:mousedown=on_mousedown
					on:mousemove=on_mousemove
					on:mouseup=on_mouseup
					on:mouseleave=on_mouseleave
					on:wheel=on_wheel
					on:contextmenu=move |ev: MouseEvent| ev.prevent_default()
					style="display: block;"
				/>
				{move || ui.loading.get().then(|| view! { <div class="loading">"Loading graph..."</div> })}
				{move || {
					ui.rename
						.get()
						.map(|overlay| {
							view! {
								<input
									node_ref=rename_ref
									class="rename-input"
									type="text"
									style=format!(
										"position: fixed; left: {}px; top: {}px; transform: translate(-50%, -50%);",
										overlay.at.x,
										overlay.at.y,
									)
									prop:value=overlay.initial
									on:input=move |ev| {
										let text = event_target_value(&ev);
										ctl.with_value(|c| c.act(|e| e.set_pending_text(&text)));
									}
									on:keydown=move |ev: KeyboardEvent| match ev.key().as_str() {
										"Enter" => commit(event_target_value(&ev)),
										"Escape" => ctl.with_value(|c| c.act(GraphEditor::cancel_rename)),
										_ => {}
									}
									on:blur=move |ev: FocusEvent| commit(event_target_value(&ev))
								/>
							}
						})
				}}
			</main>

			<footer class="status-bar">{move || ui.status.get()}</footer>
			{move || {
				ui.error
					.get()
					.map(|message| {
						view! {
							<div class="error-banner" role="alert">
								<span>{message}</span>
								<button on:click=move |_| {
									ctl.with_value(|c| c.act(GraphEditor::dismiss_error))
								}>"Dismiss"</button>
							</div>
						}
					})
			}}
		</div>
	}
}
