//! Text renderings built on top of the scanner: placeholder elements for the
//! inline render mode, and one-shot helpers that rewrite a complete message.

use crate::callbacks::ArtifactEvent;
use crate::config::ParserConfig;
use crate::content::ContentPostProcessor;
use crate::model::{Action, ArtifactData};
use crate::scanner::{self, ScanContext, ScanEvents, StreamState};
use crate::tags::{ACTION_TAG, ACTION_TAG_CLOSE, ARTIFACT_TAG, ARTIFACT_TAG_CLOSE};

/// Builds the placeholder inserted into the rendered text where an artifact opens.
pub type ElementFactory = Box<dyn Fn(&ArtifactEvent) -> String + Send + Sync>;

/// `<div class="__boltArtifact__" data-stream-id="..." data-id="..." ...></div>`
pub fn default_artifact_element(event: &ArtifactEvent) -> String {
    let mut props = vec![r#"class="__boltArtifact__""#.to_string()];
    let mut push = |key: &str, value: &str| {
        props.push(format!("data-{}={}", camel_to_dash_case(key), json_string(value)));
    };
    push("streamId", event.stream_id.as_str());
    push("id", &event.artifact.id);
    push("title", &event.artifact.title);
    if let Some(artifact_type) = &event.artifact.artifact_type {
        push("type", artifact_type);
    }
    format!("<div {}></div>", props.join(" "))
}

fn json_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{value}\""))
}

fn camel_to_dash_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 4);
    let mut prev_lower = false;
    for ch in input.chars() {
        if ch.is_ascii_uppercase() && prev_lower {
            out.push('-');
        }
        prev_lower = ch.is_ascii_lowercase();
        out.push(ch.to_ascii_lowercase());
    }
    out
}

/// Serialises an action back into protocol markup. File content is omitted
/// unless `include_file_content` is set; tool payloads are always kept.
pub fn action_markup(action: &Action, include_file_content: bool) -> String {
    match action {
        Action::File(file) => format!(
            r#"<{ACTION_TAG} type="file" filePath="{}">{}{ACTION_TAG_CLOSE}"#,
            file.file_path,
            if include_file_content { file.content.as_str() } else { "" }
        ),
        Action::ToolUse(tool) => format!(
            r#"<{ACTION_TAG} type="toolUse" toolName="{}">{}{ACTION_TAG_CLOSE}"#,
            tool.tool_name, tool.content
        ),
        Action::Other {
            action_type,
            content,
        } => match action_type {
            Some(action_type) => {
                format!(r#"<{ACTION_TAG} type="{action_type}">{content}{ACTION_TAG_CLOSE}"#)
            }
            None => format!("<{ACTION_TAG}>{content}{ACTION_TAG_CLOSE}"),
        },
    }
}

fn artifact_open_markup(artifact: &ArtifactData) -> String {
    match &artifact.artifact_type {
        Some(artifact_type) => format!(
            r#"<{ARTIFACT_TAG} id="{}" title="{}" type="{artifact_type}">"#,
            artifact.id, artifact.title
        ),
        None => format!(
            r#"<{ARTIFACT_TAG} id="{}" title="{}">"#,
            artifact.id, artifact.title
        ),
    }
}

#[derive(Default)]
struct PlainTextOnly(String);

impl ScanEvents for PlainTextOnly {
    fn plain_text(&mut self, text: &str) {
        self.0.push_str(text);
    }
}

#[derive(Default)]
struct WithoutFileContent(String);

impl ScanEvents for WithoutFileContent {
    fn plain_text(&mut self, text: &str) {
        self.0.push_str(text);
    }

    fn artifact_open(&mut self, artifact: &ArtifactData) {
        self.0.push_str(&artifact_open_markup(artifact));
    }

    fn artifact_close(&mut self, _artifact: &ArtifactData) {
        self.0.push_str(ARTIFACT_TAG_CLOSE);
    }

    fn action_close(&mut self, _artifact: &ArtifactData, _action_id: u64, action: &Action) {
        self.0.push_str(&action_markup(action, false));
    }
}

fn scan_complete(input: &str, config: &ParserConfig, events: &mut dyn ScanEvents) {
    let processor = ContentPostProcessor::new(config.markdown_extensions.clone());
    let ctx = ScanContext {
        project_root: &config.project_root,
        processor: &processor,
    };
    let mut state = StreamState::new();
    scanner::scan(&mut state, input, &ctx, events);
    state.flush_tail(input, events);
}

/// Plain text of a complete message with every artifact removed.
pub fn strip_artifacts(input: &str) -> String {
    let mut out = PlainTextOnly::default();
    scan_complete(input, &ParserConfig::default(), &mut out);
    out.0
}

/// A complete message with artifact and action markup kept but file contents
/// dropped. Useful for compact conversation history.
pub fn strip_file_actions(input: &str, config: &ParserConfig) -> String {
    let mut out = WithoutFileContent::default();
    scan_complete(input, config, &mut out);
    out.0
}
