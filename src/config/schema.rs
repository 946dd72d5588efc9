//! Configuration schema definitions.
//!
//! This module defines the typed shape the resolved configuration tree is
//! deserialized into. Keys are camelCase in config files.

use serde::{Deserialize, Serialize};

/// Root of a resolved configuration snapshot.
///
/// Snapshots are immutable once accepted; a reload produces a new value that
/// replaces the old one as a whole. `PartialEq` is what reload deduplication
/// compares.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Show the control window on startup.
    pub control_window: bool,

    /// Open the client in a browser on startup.
    pub launch_browser: bool,

    /// Local server settings.
    pub server: ServerConfig,

    /// Text chunk handling.
    pub chunk: ChunkConfig,

    /// Built-in and custom commands.
    pub commands: CommandsConfig,

    /// User event handler declarations.
    pub events: EventsConfig,

    /// External lookup targets.
    pub lookup: LookupConfig,

    /// OCR settings.
    pub ocr: OcrConfig,

    /// Credentials for third-party services.
    pub secrets: SecretsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            control_window: true,
            launch_browser: true,
            server: ServerConfig::default(),
            chunk: ChunkConfig::default(),
            commands: CommandsConfig::default(),
            events: EventsConfig::default(),
            lookup: LookupConfig::default(),
            ocr: OcrConfig::default(),
            secrets: SecretsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port the local server binds to.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 4110 }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChunkConfig {
    pub correct: bool,
    pub flash: bool,
    pub furigana: bool,
    pub translation_only_mode: bool,

    /// Chunk logging. Disabled when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<ChunkLogConfig>,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            correct: true,
            flash: true,
            furigana: false,
            translation_only_mode: false,
            log: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ChunkLogConfig {
    /// Directory chunk logs are written to.
    pub dir: String,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CommandsConfig {
    pub player: PlayerCommandsConfig,

    /// User-defined commands shown in the control panel.
    pub custom: Vec<CustomCommand>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlayerCommandsConfig {
    pub show_extra: bool,
}

impl Default for PlayerCommandsConfig {
    fn default() -> Self {
        Self { show_extra: true }
    }
}

/// A user-defined command.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CustomCommand {
    /// Short label, 1 to 3 characters.
    pub symbol: String,
    pub name: String,
    /// Command line to execute.
    pub command: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EventsConfig {
    pub handlers: Vec<HandlerDefinition>,
}

/// A user event handler declaration.
///
/// A declaration with neither `exec` nor `command` set is inert.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HandlerDefinition {
    /// Name of the event this handler fires on.
    pub on: String,

    /// External command line, run with placeholders rendered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec: Option<Vec<String>>,

    /// Identifier of a built-in command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LookupConfig {
    pub targets: Vec<LookupTarget>,
}

/// An external dictionary or translator the user can send text to.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupTarget {
    pub symbol: String,
    pub name: String,
    /// URL template; `{}` is replaced with the looked up text.
    pub url: String,
    #[serde(default)]
    pub new_tab: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrEngine {
    #[default]
    None,
    Tesseract,
    Mangaocr,
    Ocrspace,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OcrConfig {
    pub engine: OcrEngine,

    /// Directory watched for screenshots to recognize.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watch_dir: Option<String>,

    pub regions: Vec<OcrRegion>,
    pub mangaocr: MangaOcrConfig,
    pub ocrspace: OcrSpaceConfig,
}

/// A predefined screen region for OCR.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrRegion {
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    #[serde(default)]
    pub auto_narrow: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MangaOcrConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub python_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct OcrSpaceConfig {
    /// OCR.space engine number. Only 1 and 3 are supported.
    pub engine: i64,
}

impl Default for OcrSpaceConfig {
    fn default() -> Self {
        Self { engine: 1 }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SecretsConfig {
    /// OCR.space API key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocrspace: Option<String>,
}
