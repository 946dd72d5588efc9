//! Event handler subsystem.
//!
//! # Data Flow
//! ```text
//! wiring time:
//!     internal callbacks → EventHandlerModel::register_internal
//!
//! accepted config snapshot:
//!     events.handlers → EventHandler::from_user_definition
//!     → EventHandlerModel::apply_config (whole-set swap)
//!
//! domain event:
//!     EventHandlerModel::dispatch
//!     → internal callback
//!     → exec: render_command ({eventData} → JSON) → Dispatcher::exec
//!     → built-in command → Dispatcher::run_command
//! ```
//!
//! # Design Decisions
//! - A handler is a closed union; an invalid combination of targets cannot
//!   be constructed
//! - Declarations without any target are ignored, not rejected
//! - Event payloads are opaque; only `Serialize` and a name are required

pub mod handler;
pub mod model;

pub use handler::{render_command, CommandId, EventHandler, EventHandlerSource, UserAction};
pub use model::{Dispatcher, Event, EventHandlerModel, ProcessDispatcher};
