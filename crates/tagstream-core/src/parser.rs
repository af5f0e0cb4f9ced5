use std::sync::Arc;

use crate::callbacks::{ActionEvent, ArtifactEvent, NoopCallbacks, ParserCallbacks};
use crate::config::{ParserConfig, RenderMode};
use crate::content::ContentPostProcessor;
use crate::error::ParseError;
use crate::model::{Action, ArtifactData, StreamId};
use crate::registry::StreamRegistry;
use crate::render::{ElementFactory, default_artifact_element};
use crate::scanner::{self, ScanContext, ScanEvents, StreamState};

/// Incremental parser for any number of independent streams.
///
/// Buffers are cumulative: every call for a stream id passes the full text
/// received so far for that id, which must extend the previous buffer. Each
/// call returns only the text recognised during that call, so a display can
/// append the return values.
pub struct StreamingMessageParser {
    config: ParserConfig,
    callbacks: Arc<dyn ParserCallbacks>,
    artifact_element: ElementFactory,
    processor: ContentPostProcessor,
    streams: StreamRegistry,
}

impl StreamingMessageParser {
    pub fn builder() -> StreamingMessageParserBuilder {
        StreamingMessageParserBuilder::default()
    }

    /// Parser with the given config and no callbacks.
    pub fn new(config: ParserConfig) -> Self {
        Self::builder().config(config).build()
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Parses `input`, the whole buffer received so far for `stream_id`.
    ///
    /// Fires callbacks synchronously for everything recognised since the last
    /// call and returns the plain text recognised in this call.
    pub fn parse(&self, stream_id: &StreamId, input: &str) -> Result<String, ParseError> {
        self.run(stream_id, input, false)
    }

    /// Parses the final buffer of a stream and forgets the stream.
    ///
    /// Text that was held back as a possible tag start is emitted as plain
    /// text, unless an artifact is still open.
    pub fn finish(&self, stream_id: &StreamId, input: &str) -> Result<String, ParseError> {
        let output = self.run(stream_id, input, true)?;
        self.streams.remove(stream_id);
        Ok(output)
    }

    fn run(&self, stream_id: &StreamId, input: &str, complete: bool) -> Result<String, ParseError> {
        self.streams.with_stream(stream_id, |state| {
            validate_buffer(stream_id, state, input)?;
            state.record_len(input.len());

            let placeholder: Option<&(dyn Fn(&ArtifactEvent) -> String + Send + Sync)> =
                match self.config.render_mode {
                    RenderMode::InlinePlaceholder => Some(&*self.artifact_element),
                    RenderMode::PlainText => None,
                };
            let mut emitter = Emitter {
                stream_id,
                callbacks: self.callbacks.as_ref(),
                placeholder,
                output: String::new(),
            };
            let ctx = ScanContext {
                project_root: &self.config.project_root,
                processor: &self.processor,
            };

            scanner::scan(state, input, &ctx, &mut emitter);
            if complete {
                if state.is_inside_artifact() {
                    tracing::warn!(stream_id = %stream_id, "stream finished inside an open artifact");
                } else {
                    state.flush_tail(input, &mut emitter);
                }
            }

            tracing::trace!(
                stream_id = %stream_id,
                position = state.position(),
                emitted = emitter.output.len(),
                "parsed stream chunk"
            );
            Ok(emitter.output)
        })?
    }

    /// Drops every stream state, so the next call for any id parses from scratch.
    pub fn reset(&self) {
        self.streams.reset();
    }

    /// Drops the state of one stream. Returns whether it existed.
    pub fn remove_stream(&self, stream_id: &StreamId) -> bool {
        self.streams.remove(stream_id)
    }

    /// Drops streams idle for longer than the configured `idle_ttl_secs`.
    /// Does nothing when no TTL is configured.
    pub fn evict_idle(&self) -> usize {
        self.config
            .idle_ttl()
            .map_or(0, |ttl| self.streams.evict_idle(ttl))
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    /// Copy of the resumable state of a stream, if tracked.
    pub fn stream_state(&self, stream_id: &StreamId) -> Option<StreamState> {
        self.streams.snapshot(stream_id)
    }
}

fn validate_buffer(stream_id: &StreamId, state: &StreamState, input: &str) -> Result<(), ParseError> {
    if input.len() < state.seen_len() {
        return Err(ParseError::BufferShrank {
            stream_id: stream_id.clone(),
            previous: state.seen_len(),
            current: input.len(),
        });
    }
    if !input.is_char_boundary(state.position()) {
        return Err(ParseError::NotCharBoundary {
            stream_id: stream_id.clone(),
            position: state.position(),
        });
    }
    Ok(())
}

/// Builder for [`StreamingMessageParser`].
pub struct StreamingMessageParserBuilder {
    config: ParserConfig,
    callbacks: Arc<dyn ParserCallbacks>,
    artifact_element: Option<ElementFactory>,
}

impl Default for StreamingMessageParserBuilder {
    fn default() -> Self {
        Self {
            config: ParserConfig::default(),
            callbacks: Arc::new(NoopCallbacks),
            artifact_element: None,
        }
    }
}

impl StreamingMessageParserBuilder {
    pub fn config(mut self, config: ParserConfig) -> Self {
        self.config = config;
        self
    }

    pub fn callbacks(mut self, callbacks: impl ParserCallbacks + 'static) -> Self {
        self.callbacks = Arc::new(callbacks);
        self
    }

    /// Custom placeholder for artifacts. Switches the render mode to
    /// [`RenderMode::InlinePlaceholder`].
    pub fn artifact_element(
        mut self,
        factory: impl Fn(&ArtifactEvent) -> String + Send + Sync + 'static,
    ) -> Self {
        self.artifact_element = Some(Box::new(factory));
        self.config.render_mode = RenderMode::InlinePlaceholder;
        self
    }

    pub fn build(self) -> StreamingMessageParser {
        let processor = ContentPostProcessor::new(self.config.markdown_extensions.clone());
        let streams = StreamRegistry::new(self.config.max_streams);
        StreamingMessageParser {
            artifact_element: self
                .artifact_element
                .unwrap_or_else(|| Box::new(default_artifact_element) as ElementFactory),
            config: self.config,
            callbacks: self.callbacks,
            processor,
            streams,
        }
    }
}

/// Bridges scanner output to the public callbacks and the returned text.
struct Emitter<'a> {
    stream_id: &'a StreamId,
    callbacks: &'a dyn ParserCallbacks,
    placeholder: Option<&'a (dyn Fn(&ArtifactEvent) -> String + Send + Sync)>,
    output: String,
}

impl Emitter<'_> {
    fn artifact_event(&self, artifact: &ArtifactData) -> ArtifactEvent {
        ArtifactEvent {
            stream_id: self.stream_id.clone(),
            artifact: artifact.clone(),
        }
    }

    fn action_event(&self, artifact: &ArtifactData, action_id: u64, action: &Action) -> ActionEvent {
        ActionEvent {
            stream_id: self.stream_id.clone(),
            artifact_id: artifact.id.clone(),
            action_id: action_id.to_string(),
            action: action.clone(),
        }
    }
}

impl ScanEvents for Emitter<'_> {
    fn plain_text(&mut self, text: &str) {
        self.output.push_str(text);
        self.callbacks.on_plain_text(self.stream_id, text);
    }

    fn artifact_open(&mut self, artifact: &ArtifactData) {
        let event = self.artifact_event(artifact);
        if let Some(placeholder) = self.placeholder {
            self.output.push_str(&placeholder(&event));
        }
        self.callbacks.on_artifact_open(&event);
    }

    fn artifact_close(&mut self, artifact: &ArtifactData) {
        self.callbacks.on_artifact_close(&self.artifact_event(artifact));
    }

    fn action_open(&mut self, artifact: &ArtifactData, action_id: u64, action: &Action) {
        self.callbacks
            .on_action_open(&self.action_event(artifact, action_id, action));
    }

    fn action_stream(&mut self, artifact: &ArtifactData, action_id: u64, action: &Action) {
        self.callbacks
            .on_action_stream(&self.action_event(artifact, action_id, action));
    }

    fn action_close(&mut self, artifact: &ArtifactData, action_id: u64, action: &Action) {
        self.callbacks
            .on_action_close(&self.action_event(artifact, action_id, action));
    }
}
