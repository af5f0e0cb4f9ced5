//! Tag grammar for the two recognised families and attribute extraction.
//!
//! Attributes are matched with a plain `name="value"` pattern (name is case
//! insensitive). Single quotes, duplicates and escaped quotes get no special
//! treatment.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{Action, ActionType, ArtifactData, FileAction, ToolUseAction};

pub const ARTIFACT_TAG: &str = "boltArtifact";
pub const ACTION_TAG: &str = "boltAction";

pub const ARTIFACT_TAG_OPEN: &str = "<boltArtifact";
pub const ARTIFACT_TAG_CLOSE: &str = "</boltArtifact>";
pub const ACTION_TAG_OPEN: &str = "<boltAction";
pub const ACTION_TAG_CLOSE: &str = "</boltAction>";

const KNOWN_ATTRIBUTES: [&str; 5] = ["id", "title", "type", "filePath", "toolName"];

static ATTRIBUTE_PATTERNS: Lazy<HashMap<&'static str, Regex>> = Lazy::new(|| {
    KNOWN_ATTRIBUTES
        .iter()
        .filter_map(|name| attribute_pattern(name).map(|re| (*name, re)))
        .collect()
});

fn attribute_pattern(name: &str) -> Option<Regex> {
    Regex::new(&format!(r#"(?i){}="([^"]*)""#, regex::escape(name))).ok()
}

/// Returns the value of `name="..."` inside `tag`, if present.
pub fn extract_attribute(tag: &str, name: &str) -> Option<String> {
    let captures = match ATTRIBUTE_PATTERNS.get(name) {
        Some(re) => re.captures(tag),
        None => attribute_pattern(name)?.captures(tag),
    }?;
    captures.get(1).map(|m| m.as_str().to_string())
}

/// Builds the artifact record from a complete open tag (`<boltArtifact ...>`).
pub fn parse_artifact_open_tag(tag: &str) -> ArtifactData {
    let title = extract_attribute(tag, "title");
    let artifact_type = extract_attribute(tag, "type");
    let id = extract_attribute(tag, "id");

    if title.is_none() {
        tracing::warn!("artifact title missing");
    }
    if id.is_none() {
        tracing::warn!("artifact id missing");
    }

    ArtifactData {
        id: id.unwrap_or_default(),
        title: title.unwrap_or_default(),
        artifact_type,
    }
}

/// Builds an empty action from a complete open tag (`<boltAction ...>`).
///
/// Unknown action types still produce an action so that nesting stays
/// consistent; their specific attributes are skipped.
pub fn parse_action_open_tag(tag: &str, project_root: &str) -> Action {
    let raw_type = extract_attribute(tag, "type");
    match raw_type.as_deref().map(ActionType::parse) {
        Some(ActionType::File) => {
            let file_path = match extract_attribute(tag, "filePath") {
                Some(path) => resolve_relative_path(project_root, &path),
                None => {
                    tracing::warn!("file path not specified on file action");
                    String::new()
                }
            };
            Action::File(FileAction {
                file_path,
                content: String::new(),
            })
        }
        Some(ActionType::ToolUse) => {
            let tool_name = extract_attribute(tag, "toolName").unwrap_or_else(|| {
                tracing::warn!("tool name not specified on toolUse action");
                String::new()
            });
            Action::ToolUse(ToolUseAction {
                tool_name,
                content: String::new(),
            })
        }
        _ => {
            tracing::warn!(action_type = ?raw_type, "unknown action type");
            Action::Other {
                action_type: raw_type,
                content: String::new(),
            }
        }
    }
}

/// Resolves `path` against `project_root` and returns it relative to the root.
///
/// Resolution is lexical (`.` and `..` are folded, nothing touches the disk).
/// Relative inputs are taken as already relative to the root; absolute inputs
/// outside the root come back with leading `..` segments.
pub fn resolve_relative_path(project_root: &str, path: &str) -> String {
    let root = normalize_segments(project_root);
    let target = if path.starts_with('/') {
        normalize_segments(path)
    } else {
        normalize_segments(&format!("{project_root}/{path}"))
    };

    let common = root
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let mut relative: Vec<&str> = Vec::new();
    relative.extend(std::iter::repeat_n("..", root.len() - common));
    relative.extend(target[common..].iter().map(String::as_str));
    relative.join("/")
}

fn normalize_segments(path: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            other => out.push(other.to_string()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_attribute_case_insensitively() {
        let tag = r#"<boltAction TYPE="file" filepath="/home/project/a.txt">"#;
        assert_eq!(extract_attribute(tag, "type").as_deref(), Some("file"));
        assert_eq!(extract_attribute(tag, "filePath").as_deref(), Some("/home/project/a.txt"));
        assert_eq!(extract_attribute(tag, "toolName"), None);
    }

    #[test]
    fn extracts_unlisted_attribute_names() {
        let tag = r#"<boltArtifact data-x="1">"#;
        assert_eq!(extract_attribute(tag, "data-x").as_deref(), Some("1"));
    }

    #[test]
    fn artifact_missing_attributes_become_empty() {
        let artifact = parse_artifact_open_tag("<boltArtifact>");
        assert_eq!(artifact, ArtifactData::default());

        let artifact =
            parse_artifact_open_tag(r#"<boltArtifact id="a1" title="Demo" type="bundled">"#);
        assert_eq!(artifact.id, "a1");
        assert_eq!(artifact.title, "Demo");
        assert_eq!(artifact.artifact_type.as_deref(), Some("bundled"));
    }

    #[test]
    fn file_action_path_is_made_root_relative() {
        let action = parse_action_open_tag(
            r#"<boltAction type="file" filePath="/home/project/src/App.tsx">"#,
            "/home/project",
        );
        assert_eq!(action, Action::file("src/App.tsx", ""));
    }

    #[test]
    fn tool_use_action_reads_tool_name() {
        let action =
            parse_action_open_tag(r#"<boltAction type="toolUse" toolName="deploy">"#, "/home/project");
        assert_eq!(action, Action::tool_use("deploy", ""));
    }

    #[test]
    fn unknown_action_type_is_kept_open() {
        let action = parse_action_open_tag(r#"<boltAction type="shell">"#, "/home/project");
        assert_eq!(
            action,
            Action::Other {
                action_type: Some("shell".into()),
                content: String::new(),
            }
        );
    }

    #[test]
    fn resolves_relative_and_outside_paths() {
        let root = "/home/project";
        assert_eq!(resolve_relative_path(root, "x.txt"), "x.txt");
        assert_eq!(resolve_relative_path(root, "./a/../b/c.ts"), "b/c.ts");
        assert_eq!(resolve_relative_path(root, "/home/project/"), "");
        assert_eq!(resolve_relative_path(root, "/home/other/y.txt"), "../other/y.txt");
        assert_eq!(resolve_relative_path(root, "/etc/passwd"), "../../etc/passwd");
        assert_eq!(resolve_relative_path("/home/project/", "/home/project//a//b"), "a/b");
    }
}
