//! Incremental parser for the artifact/action markup that models embed in
//! streamed output.
//!
//! The caller keeps one growing text buffer per stream and hands the whole
//! buffer to [`StreamingMessageParser::parse`] every time new characters
//! arrive. The parser resumes from where it stopped, fires lifecycle callbacks
//! for artifacts and actions in the order they appear, and returns the plain
//! text recognised during that call.
//!
//! ```
//! use std::sync::Arc;
//!
//! use tagstream_core::{EventRecorder, StreamId, StreamingMessageParser};
//!
//! let recorder = Arc::new(EventRecorder::default());
//! let parser = StreamingMessageParser::builder()
//!     .callbacks(recorder.clone())
//!     .build();
//!
//! let id = StreamId::new("msg-0");
//! let mut buffer = String::from("Hello <boltArtifact id=\"a1\" title=\"Demo\">");
//! assert_eq!(parser.parse(&id, &buffer).unwrap(), "Hello ");
//!
//! buffer.push_str("</boltArtifact> done");
//! assert_eq!(parser.parse(&id, &buffer).unwrap(), " done");
//! assert_eq!(recorder.lifecycle_events().len(), 2);
//! ```

pub mod callbacks;
pub mod config;
pub mod content;
pub mod error;
pub mod message;
pub mod model;
pub mod observability;
pub mod parser;
pub mod registry;
pub mod render;
pub mod scanner;
pub mod tags;

pub use callbacks::{
    ActionEvent, ArtifactEvent, EventRecorder, NoopCallbacks, ParserCallbacks, ParserEvent,
};
pub use config::{ParserConfig, RenderMode};
pub use content::ContentPostProcessor;
pub use error::{ConfigError, ParseError};
pub use message::{
    ChatMessage, MessageParser, MessagePart, MessageRole, ParsedMessage, ToolInvocation,
    ToolInvocationState,
};
pub use model::{Action, ActionType, ArtifactData, FileAction, StreamId, ToolUseAction};
pub use parser::{StreamingMessageParser, StreamingMessageParserBuilder};
pub use registry::StreamRegistry;
pub use render::{
    ElementFactory, action_markup, default_artifact_element, strip_artifacts, strip_file_actions,
};
pub use scanner::StreamState;
pub use observability::init_observability;
