//! Visual workflow builder state.
//!
//! The step tree is the single source of truth. Canvas edits arrive as
//! [`EditCommand`]s, are applied to the tree, and the graph is re-rendered.

mod autosave;
mod command;
mod session;

pub use autosave::Autosave;
pub use command::{EditCommand, StepPatch};
pub use session::BuilderSession;
