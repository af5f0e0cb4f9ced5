use std::fmt;

/// Opaque identifier scoping one independent incremental parse (for example
/// one text part of one chat message).
#[derive(Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub struct StreamId(pub String);

impl StreamId {
    /// Creates a stream id from any string-like value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Id for part `part_index` of message `message_id` (`"{message_id}-{part_index}"`).
    pub fn for_part(message_id: &str, part_index: usize) -> Self {
        Self(format!("{message_id}-{part_index}"))
    }

    /// Returns the stream id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StreamId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for StreamId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// One logical unit of streamed work, opened by an artifact tag.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ArtifactData {
    pub id: String,
    pub title: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub artifact_type: Option<String>,
}

/// Value of the `type` attribute on an action tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionType {
    File,
    ToolUse,
    Other(String),
}

impl ActionType {
    pub fn parse(value: &str) -> Self {
        match value {
            "file" => ActionType::File,
            "toolUse" => ActionType::ToolUse,
            other => ActionType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ActionType::File => "file",
            ActionType::ToolUse => "toolUse",
            ActionType::Other(other) => other,
        }
    }
}

/// Write `content` to `file_path` (relative to the project root).
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAction {
    pub file_path: String,
    pub content: String,
}

/// Invoke `tool_name`; `content` is an opaque serialized payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolUseAction {
    pub tool_name: String,
    pub content: String,
}

/// A single file write or tool invocation described inside an artifact.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum Action {
    #[serde(rename = "file")]
    File(FileAction),
    #[serde(rename = "toolUse")]
    ToolUse(ToolUseAction),
    /// Action with a missing or unrecognised `type`. Kept so that tag nesting
    /// stays consistent; carries no type-specific attributes.
    #[serde(rename = "other", rename_all = "camelCase")]
    Other {
        action_type: Option<String>,
        content: String,
    },
}

impl Action {
    pub fn file(file_path: impl Into<String>, content: impl Into<String>) -> Self {
        Action::File(FileAction {
            file_path: file_path.into(),
            content: content.into(),
        })
    }

    pub fn tool_use(tool_name: impl Into<String>, content: impl Into<String>) -> Self {
        Action::ToolUse(ToolUseAction {
            tool_name: tool_name.into(),
            content: content.into(),
        })
    }

    pub fn action_type(&self) -> ActionType {
        match self {
            Action::File(_) => ActionType::File,
            Action::ToolUse(_) => ActionType::ToolUse,
            Action::Other { action_type, .. } => {
                ActionType::Other(action_type.clone().unwrap_or_default())
            }
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Action::File(_))
    }

    pub fn content(&self) -> &str {
        match self {
            Action::File(file) => &file.content,
            Action::ToolUse(tool) => &tool.content,
            Action::Other { content, .. } => content,
        }
    }

    pub fn content_mut(&mut self) -> &mut String {
        match self {
            Action::File(file) => &mut file.content,
            Action::ToolUse(tool) => &mut tool.content,
            Action::Other { content, .. } => content,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_stream_id_joins_message_and_index() {
        assert_eq!(StreamId::for_part("m1", 2).as_str(), "m1-2");
    }

    #[test]
    fn action_serializes_with_wire_type_names() {
        let file = serde_json::to_value(Action::file("src/a.rs", "fn main() {}\n")).unwrap();
        assert_eq!(
            file,
            serde_json::json!({"type": "file", "filePath": "src/a.rs", "content": "fn main() {}\n"})
        );

        let tool = serde_json::to_value(Action::tool_use("deploy", "{}")).unwrap();
        assert_eq!(tool["type"], "toolUse");
        assert_eq!(tool["toolName"], "deploy");
    }

    #[test]
    fn artifact_type_is_omitted_when_absent() {
        let artifact = ArtifactData {
            id: "a1".into(),
            title: "Demo".into(),
            artifact_type: None,
        };
        let value = serde_json::to_value(&artifact).unwrap();
        assert!(value.get("type").is_none());
    }

    #[test]
    fn unknown_action_type_round_trips_through_action_type() {
        assert_eq!(ActionType::parse("shell"), ActionType::Other("shell".into()));
        assert_eq!(ActionType::parse("toolUse").as_str(), "toolUse");
    }

    #[test]
    fn action_reports_its_type() {
        let file = Action::file("a.txt", "");
        assert!(file.is_file());
        assert_eq!(file.action_type(), ActionType::File);

        let tool = Action::tool_use("deploy", "{}");
        assert!(!tool.is_file());
        assert_eq!(tool.action_type().as_str(), "toolUse");

        let other = Action::Other {
            action_type: Some("shell".into()),
            content: String::new(),
        };
        assert_eq!(other.action_type(), ActionType::Other("shell".into()));
    }
}
