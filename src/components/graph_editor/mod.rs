mod component;
mod editor;
mod gesture;
mod layout;
mod mode;
mod positions;
mod render;
mod scene;
mod session;
pub mod types;

pub use component::GraphEditorCanvas;
