use leptos::prelude::*;

use crate::components::graph_editor::GraphEditorCanvas;
use crate::config::EditorConfig;

/// Default Home Page
#[component]
pub fn Home() -> impl IntoView {
	let config = use_context::<EditorConfig>().unwrap_or_default();

	view! {
		<ErrorBoundary fallback=|errors| {
			view! {
				<h1>"Uh oh! Something went wrong!"</h1>

				<p>"Errors: "</p>
				<ul>
					{move || {
						errors
							.get()
							.into_iter()
							.map(|(_, e)| view! { <li>{e.to_string()}</li> })
							.collect_view()
					}}
				</ul>
			}
		}>
			<GraphEditorCanvas config />
		</ErrorBoundary>
	}
}
