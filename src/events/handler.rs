//! Event handlers and command-line templating.
//!
//! A handler binds exactly one dispatch target. Internal handlers carry an
//! in-process callback; user handlers come from `events.handlers` in the
//! configuration and carry either an external command line or the name of a
//! built-in command.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::config::schema::HandlerDefinition;

/// Argument replaced by the serialized event when it is the whole argument.
pub const EVENT_DATA_PLACEHOLDER: &str = "{eventData}";

/// In-process handler callback.
pub type EventCallback<E> = Arc<dyn Fn(&E) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventHandlerSource {
    Internal,
    User,
}

/// Identifier of a built-in command, e.g. `chunk_show`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommandId(String);

impl CommandId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a user handler does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAction {
    /// Run an external command line.
    Exec(Vec<String>),
    /// Run a built-in command.
    Command(CommandId),
}

/// A bound event handler.
pub enum EventHandler<E> {
    Internal(EventCallback<E>),
    User(UserAction),
}

impl<E> EventHandler<E> {
    /// Wrap an in-process callback.
    pub fn internal(callback: impl Fn(&E) + Send + Sync + 'static) -> Self {
        EventHandler::Internal(Arc::new(callback))
    }

    /// Bind a user declaration. Declarations with neither `exec` nor
    /// `command` produce no handler.
    pub fn from_user_definition(definition: &HandlerDefinition) -> Option<Self> {
        match (&definition.exec, &definition.command) {
            (Some(exec), command) => {
                if let Some(command) = command {
                    tracing::warn!(
                        event = %definition.on,
                        ignored_command = %command,
                        "Event handler declares both exec and command, using exec"
                    );
                }
                Some(EventHandler::User(UserAction::Exec(exec.clone())))
            }
            (None, Some(command)) => Some(EventHandler::User(UserAction::Command(CommandId::new(command.clone())))),
            (None, None) => None,
        }
    }

    pub fn source(&self) -> EventHandlerSource {
        match self {
            EventHandler::Internal(_) => EventHandlerSource::Internal,
            EventHandler::User(_) => EventHandlerSource::User,
        }
    }

    pub fn exec_command(&self) -> Option<&[String]> {
        match self {
            EventHandler::User(UserAction::Exec(argv)) => Some(argv),
            _ => None,
        }
    }

    pub fn command(&self) -> Option<&CommandId> {
        match self {
            EventHandler::User(UserAction::Command(id)) => Some(id),
            _ => None,
        }
    }

    pub fn callback(&self) -> Option<&EventCallback<E>> {
        match self {
            EventHandler::Internal(callback) => Some(callback),
            EventHandler::User(_) => None,
        }
    }
}

impl<E> Clone for EventHandler<E> {
    fn clone(&self) -> Self {
        match self {
            EventHandler::Internal(callback) => EventHandler::Internal(callback.clone()),
            EventHandler::User(action) => EventHandler::User(action.clone()),
        }
    }
}

impl<E> fmt::Debug for EventHandler<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventHandler::Internal(_) => f.write_str("Internal(<callback>)"),
            EventHandler::User(action) => f.debug_tuple("User").field(action).finish(),
        }
    }
}

/// Replace every argument that is exactly [`EVENT_DATA_PLACEHOLDER`] with
/// the event serialized as JSON.
///
/// Other arguments are passed through untouched. If the event cannot be
/// serialized the placeholder argument is dropped and the rest of the
/// command is kept.
pub fn render_command<T>(template: &[String], event: &T) -> Vec<String>
where
    T: Serialize + ?Sized,
{
    template
        .iter()
        .filter_map(|arg| {
            if arg != EVENT_DATA_PLACEHOLDER {
                return Some(arg.clone());
            }
            match serde_json::to_string(event) {
                Ok(data) => Some(data),
                Err(e) => {
                    tracing::warn!("Error while serializing event data: {}", e);
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::ser::Error as _;
    use serde::Serializer;

    #[derive(Serialize)]
    struct ChunkAdded {
        chunk: String,
    }

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("not today"))
        }
    }

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    fn definition(exec: Option<&[&str]>, command: Option<&str>) -> HandlerDefinition {
        HandlerDefinition {
            on: "chunk-add".to_string(),
            exec: exec.map(argv),
            command: command.map(str::to_string),
        }
    }

    #[test]
    fn test_placeholder_is_replaced() {
        let event = ChunkAdded { chunk: "こんにちは".into() };
        let rendered = render_command(&argv(&["echo", "{eventData}"]), &event);
        assert_eq!(rendered, vec!["echo".to_string(), r#"{"chunk":"こんにちは"}"#.to_string()]);
    }

    #[test]
    fn test_non_placeholder_arguments_pass_through() {
        let event = ChunkAdded { chunk: "x".into() };
        let template = argv(&["echo", "fixed", " {eventData}", "{eventData}!", "{EVENTDATA}"]);
        assert_eq!(render_command(&template, &event), template);
    }

    #[test]
    fn test_serialization_failure_drops_only_that_argument() {
        let rendered = render_command(&argv(&["notify", "{eventData}", "--urgent"]), &Unserializable);
        assert_eq!(rendered, argv(&["notify", "--urgent"]));
    }

    #[test]
    fn test_inert_declaration_yields_nothing() {
        assert!(EventHandler::<ChunkAdded>::from_user_definition(&definition(None, None)).is_none());
    }

    #[test]
    fn test_user_handlers() {
        let exec = EventHandler::<ChunkAdded>::from_user_definition(&definition(Some(&["say", "hi"]), None)).unwrap();
        assert_eq!(exec.source(), EventHandlerSource::User);
        assert_eq!(exec.exec_command(), Some(&argv(&["say", "hi"])[..]));
        assert!(exec.command().is_none());
        assert!(exec.callback().is_none());

        let named = EventHandler::<ChunkAdded>::from_user_definition(&definition(None, Some("chunk_show"))).unwrap();
        assert_eq!(named.command().map(CommandId::as_str), Some("chunk_show"));
        assert!(named.exec_command().is_none());
    }

    #[test]
    fn test_exec_wins_over_command() {
        let both = EventHandler::<ChunkAdded>::from_user_definition(&definition(Some(&["a"]), Some("b"))).unwrap();
        assert!(both.exec_command().is_some());
        assert!(both.command().is_none());
    }

    #[test]
    fn test_internal_handler() {
        let handler = EventHandler::<ChunkAdded>::internal(|_| {});
        assert_eq!(handler.source(), EventHandlerSource::Internal);
        assert!(handler.callback().is_some());
        assert!(handler.exec_command().is_none());
        assert!(handler.command().is_none());
    }
}
