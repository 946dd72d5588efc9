//! Per-event handler registry and dispatch.
//!
//! Internal handlers are registered once while wiring the application.
//! User handlers are rebuilt from every accepted configuration snapshot and
//! swapped in as a whole, so a dispatch running during a reload sees either
//! the old set or the new one.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::Serialize;
use tokio::process::Command;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::config::schema::Config;
use crate::events::handler::{render_command, CommandId, EventHandler, UserAction};
use crate::observability::metrics;

/// A domain event that handlers can be bound to.
pub trait Event: Serialize + Send + Sync {
    /// Name used in `events.handlers[].on`.
    fn name(&self) -> &str;
}

/// Executes what user handlers ask for.
pub trait Dispatcher: Send + Sync {
    /// Run an external command line (already rendered).
    fn exec(&self, argv: Vec<String>);

    /// Run a built-in command.
    fn run_command(&self, command: &CommandId);
}

type HandlerMap<E> = HashMap<String, Vec<EventHandler<E>>>;

/// Handlers grouped by event name.
pub struct EventHandlerModel<E> {
    internal: HandlerMap<E>,
    user: ArcSwap<HandlerMap<E>>,
}

impl<E: Event> EventHandlerModel<E> {
    pub fn new() -> Self {
        Self {
            internal: HashMap::new(),
            user: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    /// Register an in-process handler for `event_name`.
    pub fn register_internal(&mut self, event_name: impl Into<String>, callback: impl Fn(&E) + Send + Sync + 'static) {
        self.internal
            .entry(event_name.into())
            .or_default()
            .push(EventHandler::internal(callback));
    }

    /// Rebuild user handlers from `config`. Returns how many were bound.
    pub fn apply_config(&self, config: &Config) -> usize {
        let mut user: HandlerMap<E> = HashMap::new();
        let mut bound = 0;
        for definition in &config.events.handlers {
            match EventHandler::from_user_definition(definition) {
                Some(handler) => {
                    user.entry(definition.on.clone()).or_default().push(handler);
                    bound += 1;
                }
                None => {
                    tracing::debug!(event = %definition.on, "Ignoring event handler without exec or command");
                }
            }
        }
        self.user.store(Arc::new(user));
        tracing::debug!(handlers = bound, "User event handlers updated");
        bound
    }

    /// Handlers for `event_name`: internal first, then user handlers in
    /// declaration order.
    pub fn handlers_for(&self, event_name: &str) -> Vec<EventHandler<E>> {
        let user = self.user.load();
        self.internal
            .get(event_name)
            .into_iter()
            .chain(user.get(event_name))
            .flatten()
            .cloned()
            .collect()
    }

    /// Fire every handler bound to `event`'s name.
    pub fn dispatch(&self, event: &E, dispatcher: &dyn Dispatcher) {
        for handler in self.handlers_for(event.name()) {
            metrics::record_dispatch(handler.source());
            match handler {
                EventHandler::Internal(callback) => callback(event),
                EventHandler::User(UserAction::Exec(template)) => {
                    dispatcher.exec(render_command(&template, event));
                }
                EventHandler::User(UserAction::Command(id)) => dispatcher.run_command(&id),
            }
        }
    }
}

impl<E: Event> Default for EventHandlerModel<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawns external commands and forwards built-in commands into a channel
/// owned by the command subsystem.
///
/// Each child is awaited on the current Tokio runtime so it is reaped once
/// it exits.
#[derive(Debug, Clone)]
pub struct ProcessDispatcher {
    commands: mpsc::UnboundedSender<CommandId>,
}

impl ProcessDispatcher {
    pub fn new(commands: mpsc::UnboundedSender<CommandId>) -> Self {
        Self { commands }
    }
}

impl Dispatcher for ProcessDispatcher {
    fn exec(&self, argv: Vec<String>) {
        let Some((program, args)) = argv.split_first() else {
            tracing::warn!("Event handler command line is empty, not executing");
            return;
        };
        let Ok(runtime) = Handle::try_current() else {
            tracing::error!(program = %program, "Event handler processes need a running Tokio runtime, not executing");
            return;
        };
        let spawned = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                tracing::error!(program = %program, "Failed to spawn event handler process: {}", e);
                return;
            }
        };
        tracing::debug!(program = %program, pid = ?child.id(), "Spawned event handler process");

        let program = program.clone();
        runtime.spawn(async move {
            match child.wait().await {
                Ok(status) => tracing::debug!(program = %program, %status, "Event handler process exited"),
                Err(e) => tracing::warn!(program = %program, "Failed to wait for event handler process: {}", e),
            }
        });
    }

    fn run_command(&self, command: &CommandId) {
        if self.commands.send(command.clone()).is_err() {
            tracing::warn!(command = %command, "Command receiver closed, dropping command");
        }
    }
}
