use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How artifacts show up in the text returned by `parse`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Only text outside artifacts is returned.
    #[default]
    PlainText,
    /// An opaque placeholder element is returned where each artifact opens.
    InlinePlaceholder,
}

impl FromStr for RenderMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" | "plain_text" | "text" => Ok(RenderMode::PlainText),
            "placeholder" | "inline_placeholder" | "inline" => Ok(RenderMode::InlinePlaceholder),
            other => Err(format!("unknown render mode `{other}`")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Sandbox directory that file action paths are resolved against.
    #[serde(default = "default_project_root")]
    pub project_root: String,
    /// File suffixes whose content is kept verbatim (no fence stripping or unescaping).
    #[serde(default = "default_markdown_extensions")]
    pub markdown_extensions: Vec<String>,
    #[serde(default)]
    pub render_mode: RenderMode,
    /// Cap on tracked streams; the least recently touched stream is evicted past it.
    #[serde(default)]
    pub max_streams: Option<usize>,
    /// Streams untouched for this long are dropped by `evict_idle`.
    #[serde(default)]
    pub idle_ttl_secs: Option<u64>,
}

fn default_project_root() -> String {
    "/home/project".to_string()
}

fn default_markdown_extensions() -> Vec<String> {
    vec![".md".to_string()]
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            project_root: default_project_root(),
            markdown_extensions: default_markdown_extensions(),
            render_mode: RenderMode::default(),
            max_streams: None,
            idle_ttl_secs: None,
        }
    }
}

impl ParserConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn project_root(mut self, root: impl Into<String>) -> Self {
        self.project_root = root.into();
        self
    }

    pub fn render_mode(mut self, mode: RenderMode) -> Self {
        self.render_mode = mode;
        self
    }

    pub fn max_streams(mut self, max: usize) -> Self {
        self.max_streams = Some(max);
        self
    }

    pub fn idle_ttl(&self) -> Option<Duration> {
        self.idle_ttl_secs.map(Duration::from_secs)
    }

    /// Reads overrides from the process environment.
    ///
    /// - `TAGSTREAM_PROJECT_ROOT`
    /// - `TAGSTREAM_MARKDOWN_EXTENSIONS` (comma separated, e.g. `.md,.mdx`)
    /// - `TAGSTREAM_RENDER_MODE` (`plain` or `placeholder`)
    /// - `TAGSTREAM_MAX_STREAMS`
    /// - `TAGSTREAM_IDLE_TTL_SECS`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(root) = lookup("TAGSTREAM_PROJECT_ROOT").filter(|v| !v.trim().is_empty()) {
            config.project_root = root.trim().to_string();
        }
        if let Some(raw) = lookup("TAGSTREAM_MARKDOWN_EXTENSIONS") {
            config.markdown_extensions = raw
                .split(',')
                .map(str::trim)
                .filter(|ext| !ext.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(raw) = lookup("TAGSTREAM_RENDER_MODE") {
            config.render_mode = raw
                .parse()
                .map_err(|e: String| ConfigError::invalid("TAGSTREAM_RENDER_MODE", &raw, e))?;
        }
        if let Some(raw) = lookup("TAGSTREAM_MAX_STREAMS") {
            config.max_streams = Some(parse_number("TAGSTREAM_MAX_STREAMS", &raw)?);
        }
        if let Some(raw) = lookup("TAGSTREAM_IDLE_TTL_SECS") {
            config.idle_ttl_secs = Some(parse_number("TAGSTREAM_IDLE_TTL_SECS", &raw)?);
        }
        Ok(config)
    }
}

fn parse_number<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::invalid(key, raw, e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_sandbox_layout() {
        let config = ParserConfig::default();
        assert_eq!(config.project_root, "/home/project");
        assert_eq!(config.markdown_extensions, vec![".md".to_string()]);
        assert_eq!(config.render_mode, RenderMode::PlainText);
        assert_eq!(config.max_streams, None);
    }

    #[test]
    fn lookup_overrides_every_field() {
        let config = ParserConfig::from_lookup(lookup_from(&[
            ("TAGSTREAM_PROJECT_ROOT", "/srv/app"),
            ("TAGSTREAM_MARKDOWN_EXTENSIONS", ".md, .mdx,"),
            ("TAGSTREAM_RENDER_MODE", "placeholder"),
            ("TAGSTREAM_MAX_STREAMS", "64"),
            ("TAGSTREAM_IDLE_TTL_SECS", "300"),
        ]))
        .unwrap();
        assert_eq!(config.project_root, "/srv/app");
        assert_eq!(config.markdown_extensions, vec![".md", ".mdx"]);
        assert_eq!(config.render_mode, RenderMode::InlinePlaceholder);
        assert_eq!(config.max_streams, Some(64));
        assert_eq!(config.idle_ttl(), Some(Duration::from_secs(300)));
    }

    #[test]
    fn lookup_rejects_bad_numbers() {
        let err = ParserConfig::from_lookup(lookup_from(&[("TAGSTREAM_MAX_STREAMS", "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains("TAGSTREAM_MAX_STREAMS"));
    }

    #[test]
    fn deserializes_with_defaults_for_missing_fields() {
        let config: ParserConfig =
            serde_json::from_value(serde_json::json!({"render_mode": "inline_placeholder"}))
                .unwrap();
        assert_eq!(config.project_root, "/home/project");
        assert_eq!(config.render_mode, RenderMode::InlinePlaceholder);
    }
}
