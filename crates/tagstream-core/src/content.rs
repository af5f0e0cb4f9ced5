//! Cleanup applied to file action content.
//!
//! Models sometimes wrap a whole file in a fenced code block, or escape the
//! markup they are writing. Both are undone for every file except markdown,
//! whose fences are usually intentional.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{Action, FileAction};

static CODE_FENCE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?s)^\s*```\w*\n(.*?)\n\s*```\s*$").ok());

/// Returns the payload if the whole of `content` is one fenced code block.
/// Content with prose around the fence is returned unchanged.
pub fn strip_code_fence(content: &str) -> &str {
    CODE_FENCE
        .as_ref()
        .and_then(|re| re.captures(content))
        .and_then(|caps| caps.get(1))
        .map_or(content, |payload| payload.as_str())
}

/// Turns `&lt;` and `&gt;` back into `<` and `>`.
pub fn unescape_tags(content: &str) -> String {
    content.replace("&lt;", "<").replace("&gt;", ">")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentPostProcessor {
    markdown_extensions: Vec<String>,
}

impl Default for ContentPostProcessor {
    fn default() -> Self {
        Self::new(vec![".md".to_string()])
    }
}

impl ContentPostProcessor {
    pub fn new(markdown_extensions: Vec<String>) -> Self {
        Self {
            markdown_extensions,
        }
    }

    pub fn is_markdown_path(&self, path: &str) -> bool {
        self.markdown_extensions
            .iter()
            .any(|ext| path.ends_with(ext.as_str()))
    }

    fn clean(&self, path: &str, content: &str) -> String {
        if self.is_markdown_path(path) {
            content.to_string()
        } else {
            unescape_tags(strip_code_fence(content))
        }
    }

    /// Final content for a closed action: trimmed, and for file actions
    /// cleaned and terminated with a newline.
    pub fn finalize(&self, action: &mut Action) {
        let trimmed = action.content().trim().to_string();
        let finalized = match action {
            Action::File(file) => {
                let mut cleaned = self.clean(&file.file_path, &trimmed);
                cleaned.push('\n');
                cleaned
            }
            Action::ToolUse(_) | Action::Other { .. } => trimmed,
        };
        *action.content_mut() = finalized;
    }

    /// View of still-open file content, cleaned the same way as
    /// [`finalize`](Self::finalize) but neither trimmed nor newline terminated.
    pub fn stream_view(&self, file: &FileAction, raw: &str) -> String {
        self.clean(&file.file_path, raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fence_wrapping_entire_content() {
        assert_eq!(strip_code_fence("```ts\nconst a = 1;\n```"), "const a = 1;");
        assert_eq!(strip_code_fence("  ```\nx\ny\n  ```  "), "x\ny");
    }

    #[test]
    fn leaves_fence_with_surrounding_prose() {
        let content = "intro\n```js\nx\n```";
        assert_eq!(strip_code_fence(content), content);
        let content = "```js\nx\n```\nafter";
        assert_eq!(strip_code_fence(content), content);
    }

    #[test]
    fn unescapes_angle_brackets_only() {
        assert_eq!(unescape_tags("&lt;div&gt; &amp;"), "<div> &amp;");
    }

    #[test]
    fn finalize_file_content() {
        let processor = ContentPostProcessor::default();
        let mut action = Action::file("src/a.ts", "\n```ts\n&lt;A /&gt;\n```\n  ");
        processor.finalize(&mut action);
        assert_eq!(action.content(), "<A />\n");
    }

    #[test]
    fn finalize_keeps_markdown_verbatim() {
        let processor = ContentPostProcessor::default();
        let mut action = Action::file("README.md", "```sh\nnpm i\n```\n&lt;br&gt;");
        processor.finalize(&mut action);
        assert_eq!(action.content(), "```sh\nnpm i\n```\n&lt;br&gt;\n");
    }

    #[test]
    fn finalize_tool_use_only_trims() {
        let processor = ContentPostProcessor::default();
        let mut action = Action::tool_use("deploy", "  ```\n{}\n```  ");
        processor.finalize(&mut action);
        assert_eq!(action.content(), "```\n{}\n```");
    }

    #[test]
    fn configured_extensions_count_as_markdown() {
        let processor = ContentPostProcessor::new(vec![".md".into(), ".mdx".into()]);
        assert!(processor.is_markdown_path("docs/page.mdx"));
        assert!(!processor.is_markdown_path("src/md.rs"));
    }

    #[test]
    fn stream_view_is_not_trimmed() {
        let processor = ContentPostProcessor::default();
        let file = FileAction {
            file_path: "a.txt".into(),
            content: String::new(),
        };
        assert_eq!(processor.stream_view(&file, "\nline1 &gt;\n"), "\nline1 >\n");
    }
}
