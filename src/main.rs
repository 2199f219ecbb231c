use graph_editor_canvas::config::EditorConfig;
use graph_editor_canvas::{App, init_logging};
use leptos::prelude::*;

fn main() {
	let (config, problem) = match EditorConfig::load() {
		Ok(stored) => (stored.unwrap_or_default(), None),
		Err(err) => (EditorConfig::default(), Some(err)),
	};
	init_logging(config.level());
	if let Some(err) = problem {
		log::warn!("ignoring stored settings: {err:#}");
	}

	mount_to_body(move || view! { <App config /> })
}
