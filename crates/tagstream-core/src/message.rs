//! Drives the parser over chat messages made of parts.
//!
//! Text parts are parsed as independent streams. Tool-invocation parts carry
//! structured tool calls instead of markup; they are surfaced through the same
//! callbacks as a synthetic artifact holding one `toolUse` action per call.

use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};

use crate::callbacks::{ActionEvent, ArtifactEvent, NoopCallbacks, ParserCallbacks};
use crate::config::ParserConfig;
use crate::error::ParseError;
use crate::model::{Action, ArtifactData, StreamId};
use crate::parser::StreamingMessageParser;

pub const TOOL_ARTIFACT_TITLE: &str = "Agentic Coding";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Data,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolInvocationState {
    PartialCall,
    Call,
    Result,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocation {
    pub tool_call_id: String,
    pub tool_name: String,
    pub state: ToolInvocationState,
    #[serde(default)]
    pub args: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

impl ToolInvocation {
    /// A call is ready to run once its arguments are complete.
    pub fn is_ready(&self) -> bool {
        matches!(
            self.state,
            ToolInvocationState::Call | ToolInvocationState::Result
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MessagePart {
    Text {
        text: String,
    },
    ToolInvocation {
        #[serde(rename = "toolInvocation")]
        tool_invocation: ToolInvocation,
    },
    StepStart,
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: MessageRole,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parts: Option<Vec<MessagePart>>,
}

impl ChatMessage {
    pub fn text(id: impl Into<String>, role: MessageRole, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            id: id.into(),
            role,
            parts: Some(vec![MessagePart::Text {
                text: content.clone(),
            }]),
            content,
        }
    }

    fn is_parsed(&self) -> bool {
        matches!(self.role, MessageRole::User | MessageRole::Assistant)
    }
}

/// Rendered form of one message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParsedMessage {
    /// Position of the message in the list passed to `parse_messages`.
    pub index: usize,
    /// Rendered text of the message so far: the rendered text parts joined
    /// by `\n`.
    pub content: String,
    /// The message parts with text parts replaced by their rendered text.
    pub parts: Option<Vec<MessagePart>>,
}

pub struct MessageParser {
    parser: StreamingMessageParser,
    callbacks: Arc<dyn ParserCallbacks>,
    tool_artifacts: DashSet<String>,
    opened_tool_calls: DashSet<String>,
    closed_tool_calls: DashSet<String>,
    /// Accumulated rendering of each text stream.
    rendered_parts: DashMap<StreamId, String>,
    parsed: DashMap<usize, ParsedMessage>,
}

impl Default for MessageParser {
    fn default() -> Self {
        Self::new(ParserConfig::default(), Arc::new(NoopCallbacks))
    }
}

impl MessageParser {
    pub fn new(config: ParserConfig, callbacks: Arc<dyn ParserCallbacks>) -> Self {
        let parser = StreamingMessageParser::builder()
            .config(config)
            .callbacks(Arc::clone(&callbacks))
            .build();
        Self {
            parser,
            callbacks,
            tool_artifacts: DashSet::new(),
            opened_tool_calls: DashSet::new(),
            closed_tool_calls: DashSet::new(),
            rendered_parts: DashMap::new(),
            parsed: DashMap::new(),
        }
    }

    pub fn parser(&self) -> &StreamingMessageParser {
        &self.parser
    }

    /// Parses the current snapshot of a conversation.
    ///
    /// Messages keep growing between calls while a response streams in. Each
    /// call extends the rendering of every text part of every user or
    /// assistant message; parsing the same snapshot again changes nothing.
    /// With `replay` set, all state is dropped first and renderings are
    /// rebuilt from scratch.
    pub fn parse_messages(
        &self,
        messages: &[ChatMessage],
        replay: bool,
    ) -> Result<Vec<ParsedMessage>, ParseError> {
        if replay {
            self.reset();
        }

        for (index, message) in messages.iter().enumerate() {
            if !message.is_parsed() {
                continue;
            }
            let (content, parts) = self.parse_message(message)?;
            self.parsed.insert(
                index,
                ParsedMessage {
                    index,
                    content,
                    parts,
                },
            );
        }

        let mut parsed: Vec<ParsedMessage> =
            self.parsed.iter().map(|entry| entry.value().clone()).collect();
        parsed.sort_by_key(|message| message.index);
        Ok(parsed)
    }

    /// Drops every stream state, stored rendering and de-duplication record.
    pub fn reset(&self) {
        self.parser.reset();
        self.tool_artifacts.clear();
        self.opened_tool_calls.clear();
        self.closed_tool_calls.clear();
        self.rendered_parts.clear();
        self.parsed.clear();
    }

    fn parse_message(
        &self,
        message: &ChatMessage,
    ) -> Result<(String, Option<Vec<MessagePart>>), ParseError> {
        let Some(parts) = &message.parts else {
            let content = self.render_part(&StreamId::for_part(&message.id, 0), &message.content)?;
            return Ok((content, None));
        };

        let mut rendered = Vec::new();
        let mut new_parts = Vec::with_capacity(parts.len());
        for (index, part) in parts.iter().enumerate() {
            let stream_id = StreamId::for_part(&message.id, index);
            match part {
                MessagePart::Text { text } => {
                    let part_text = self.render_part(&stream_id, text)?;
                    new_parts.push(MessagePart::Text {
                        text: part_text.clone(),
                    });
                    rendered.push(part_text);
                }
                MessagePart::ToolInvocation { tool_invocation } => {
                    self.emit_tool_invocation(&message.id, &stream_id, tool_invocation)?;
                    new_parts.push(part.clone());
                }
                MessagePart::StepStart => new_parts.push(part.clone()),
                MessagePart::Unknown => {
                    tracing::warn!(message_id = %message.id, part = index, "unknown message part type");
                    new_parts.push(part.clone());
                }
            }
        }
        Ok((rendered.join("\n"), Some(new_parts)))
    }

    /// Parses the current text of one part and returns everything rendered
    /// for it so far.
    fn render_part(&self, stream_id: &StreamId, text: &str) -> Result<String, ParseError> {
        let delta = self.parser.parse(stream_id, text)?;
        let mut rendered = self.rendered_parts.entry(stream_id.clone()).or_default();
        rendered.push_str(&delta);
        Ok(rendered.value().clone())
    }

    fn emit_tool_invocation(
        &self,
        message_id: &str,
        stream_id: &StreamId,
        invocation: &ToolInvocation,
    ) -> Result<(), ParseError> {
        let artifact = ArtifactData {
            id: format!("toolArtifact-{message_id}"),
            title: TOOL_ARTIFACT_TITLE.to_string(),
            artifact_type: None,
        };
        if self.tool_artifacts.insert(artifact.id.clone()) {
            self.callbacks.on_artifact_open(&ArtifactEvent {
                stream_id: stream_id.clone(),
                artifact: artifact.clone(),
            });
        }

        let content = serde_json::to_string(invocation).map_err(|e| {
            ParseError::InvalidToolInvocation {
                tool_call_id: invocation.tool_call_id.clone(),
                reason: e.to_string(),
            }
        })?;
        let event = ActionEvent {
            stream_id: stream_id.clone(),
            artifact_id: artifact.id,
            action_id: invocation.tool_call_id.clone(),
            action: Action::tool_use(invocation.tool_name.clone(), content),
        };

        if self.opened_tool_calls.insert(invocation.tool_call_id.clone()) {
            self.callbacks.on_action_open(&event);
        }
        if invocation.is_ready() && self.closed_tool_calls.insert(invocation.tool_call_id.clone()) {
            tracing::debug!(tool_call_id = %invocation.tool_call_id, tool = %invocation.tool_name, "tool invocation ready");
            self.callbacks.on_action_close(&event);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::callbacks::{EventRecorder, ParserEvent};

    fn recording() -> (MessageParser, Arc<EventRecorder>) {
        let recorder = Arc::new(EventRecorder::new());
        let parser = MessageParser::new(ParserConfig::default(), recorder.clone());
        (parser, recorder)
    }

    fn tool_part(state: ToolInvocationState) -> MessagePart {
        MessagePart::ToolInvocation {
            tool_invocation: ToolInvocation {
                tool_call_id: "call-1".into(),
                tool_name: "npmInstall".into(),
                state,
                args: json!({"packages": ["zod"]}),
                result: None,
            },
        }
    }

    #[test]
    fn message_parts_deserialize_from_wire_form() {
        let message: ChatMessage = serde_json::from_value(json!({
            "id": "m1",
            "role": "assistant",
            "content": "",
            "parts": [
                {"type": "step-start"},
                {"type": "text", "text": "hi"},
                {"type": "tool-invocation", "toolInvocation": {
                    "toolCallId": "c1", "toolName": "deploy", "state": "partial-call", "args": {}
                }},
                {"type": "reasoning", "reasoning": "..."}
            ]
        }))
        .unwrap();
        let parts = message.parts.unwrap();
        assert_eq!(parts[0], MessagePart::StepStart);
        assert!(matches!(&parts[2], MessagePart::ToolInvocation { tool_invocation } if tool_invocation.state == ToolInvocationState::PartialCall));
        assert_eq!(parts[3], MessagePart::Unknown);
    }

    #[test]
    fn text_parts_accumulate_across_calls() {
        let (parser, _) = recording();
        let first = [ChatMessage::text("m1", MessageRole::Assistant, "Hello <bolt")];
        let parsed = parser.parse_messages(&first, false).unwrap();
        assert_eq!(parsed[0].content, "Hello ");

        let second = [ChatMessage::text("m1", MessageRole::Assistant, "Hello <bolt> world")];
        let parsed = parser.parse_messages(&second, false).unwrap();
        assert_eq!(parsed[0].content, "Hello <bolt> world");
        assert_eq!(
            parsed[0].parts,
            Some(vec![MessagePart::Text {
                text: "Hello <bolt> world".into()
            }])
        );
    }

    #[test]
    fn growing_text_parts_render_like_a_single_pass() {
        let message = |second: &str| ChatMessage {
            id: "m1".into(),
            role: MessageRole::Assistant,
            content: String::new(),
            parts: Some(vec![
                MessagePart::Text { text: "one".into() },
                MessagePart::Text {
                    text: second.into(),
                },
            ]),
        };

        let (parser, _) = recording();
        parser.parse_messages(&[message("tw")], false).unwrap();
        parser.parse_messages(&[message("two")], false).unwrap();
        let parsed = parser.parse_messages(&[message("two")], false).unwrap();
        assert_eq!(parsed[0].content, "one\ntwo");

        let (single_pass, _) = recording();
        let expected = single_pass.parse_messages(&[message("two")], false).unwrap();
        assert_eq!(parsed, expected);
    }

    #[test]
    fn only_user_and_assistant_messages_are_parsed() {
        let (parser, _) = recording();
        let messages = [
            ChatMessage::text("s", MessageRole::System, "system prompt"),
            ChatMessage::text("u", MessageRole::User, "question"),
        ];
        let parsed = parser.parse_messages(&messages, false).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].index, 1);
        assert_eq!(parsed[0].content, "question");
    }

    #[test]
    fn message_without_parts_uses_content() {
        let (parser, recorder) = recording();
        let message = ChatMessage {
            id: "m1".into(),
            role: MessageRole::Assistant,
            content: r#"a<boltArtifact id="x" title="t"></boltArtifact>b"#.into(),
            parts: None,
        };
        let parsed = parser.parse_messages(&[message], false).unwrap();
        assert_eq!(parsed[0].content, "ab");
        let events = recorder.lifecycle_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].stream_id(), &StreamId::new("m1-0"));
    }

    #[test]
    fn text_parts_are_joined_with_newlines() {
        let (parser, _) = recording();
        let message = ChatMessage {
            id: "m1".into(),
            role: MessageRole::Assistant,
            content: String::new(),
            parts: Some(vec![
                MessagePart::Text { text: "one".into() },
                MessagePart::StepStart,
                MessagePart::Text { text: "two".into() },
            ]),
        };
        let parsed = parser.parse_messages(&[message], false).unwrap();
        assert_eq!(parsed[0].content, "one\ntwo");
    }

    #[test]
    fn tool_invocations_surface_as_tool_use_actions() {
        let (parser, recorder) = recording();
        let message = |state| ChatMessage {
            id: "m1".into(),
            role: MessageRole::Assistant,
            content: String::new(),
            parts: Some(vec![tool_part(state)]),
        };

        parser
            .parse_messages(&[message(ToolInvocationState::PartialCall)], false)
            .unwrap();
        parser
            .parse_messages(&[message(ToolInvocationState::Call)], false)
            .unwrap();
        parser
            .parse_messages(&[message(ToolInvocationState::Result)], false)
            .unwrap();

        let events = recorder.lifecycle_events();
        assert_eq!(events.len(), 3);
        let ParserEvent::ArtifactOpen(artifact) = &events[0] else {
            panic!("expected artifact open, got {:?}", events[0]);
        };
        assert_eq!(artifact.artifact.id, "toolArtifact-m1");
        assert_eq!(artifact.artifact.title, TOOL_ARTIFACT_TITLE);

        let ParserEvent::ActionClose(close) = &events[2] else {
            panic!("expected action close, got {:?}", events[2]);
        };
        assert_eq!(close.action_id, "call-1");
        assert_eq!(close.stream_id, StreamId::new("m1-0"));
        let payload: serde_json::Value = serde_json::from_str(close.action.content()).unwrap();
        assert_eq!(payload["state"], "call");
        assert_eq!(payload["args"]["packages"][0], "zod");
    }

    #[test]
    fn replay_rebuilds_from_scratch() {
        let (parser, recorder) = recording();
        let messages = [ChatMessage::text(
            "m1",
            MessageRole::Assistant,
            r#"x<boltArtifact id="a" title="t"></boltArtifact>"#,
        )];
        parser.parse_messages(&messages, false).unwrap();
        let parsed = parser.parse_messages(&messages, false).unwrap();
        assert_eq!(parsed[0].content, "x");

        let parsed = parser.parse_messages(&messages, true).unwrap();
        assert_eq!(parsed[0].content, "x");
        assert_eq!(recorder.lifecycle_events().len(), 4);
    }
}
