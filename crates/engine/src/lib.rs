#![forbid(unsafe_code)]

mod config;
mod context;
mod error;
mod lifecycle;
mod prompt;
mod render;
mod session;
mod tags;

pub use config::{DEFAULT_ROOT_LABEL, DEFAULT_ROOT_POSITION, EngineConfig};
pub use context::SessionContext;
pub use error::{EngineError, EngineResult};
pub use lifecycle::{LifecycleController, Spawn, TapOutcome};
pub use prompt::{PromptRequest, TextPrompt};
pub use render::{GestureEvent, NoticeLevel, RenderAdapter, RenderInstruction, edge_id};
pub use session::{Outcome, Session};
pub use tags::{ContextMenu, TagChange, TagOverlay};
