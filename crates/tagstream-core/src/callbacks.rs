//! Lifecycle callbacks fired while parsing.
//!
//! Callbacks run synchronously, in scan order, on the thread that called
//! `parse`. They may be invoked while the state of their own stream is locked,
//! so a callback must not call `parse` for the same stream id.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::model::{Action, ArtifactData, StreamId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactEvent {
    pub stream_id: StreamId,
    #[serde(flatten)]
    pub artifact: ArtifactData,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionEvent {
    pub stream_id: StreamId,
    pub artifact_id: String,
    /// Per-stream counter assigned at open time, identical for the open,
    /// stream and close events of one action.
    pub action_id: String,
    pub action: Action,
}

/// Receiver for parser lifecycle events. Every method defaults to a no-op.
///
/// Executors should start non-file actions on open and file actions on close
/// (only close carries validated final content), and must tolerate an
/// `on_action_close` that follows any number of `on_action_stream` calls for
/// the same `action_id`.
pub trait ParserCallbacks: Send + Sync {
    fn on_artifact_open(&self, _event: &ArtifactEvent) {}

    fn on_artifact_close(&self, _event: &ArtifactEvent) {}

    fn on_action_open(&self, _event: &ActionEvent) {}

    /// In-progress view of an open file action. Fires again, with longer
    /// content, each time more of the action becomes visible.
    fn on_action_stream(&self, _event: &ActionEvent) {}

    fn on_action_close(&self, _event: &ActionEvent) {}

    fn on_plain_text(&self, _stream_id: &StreamId, _text: &str) {}
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopCallbacks;

impl ParserCallbacks for NoopCallbacks {}

impl<T: ParserCallbacks + ?Sized> ParserCallbacks for Arc<T> {
    fn on_artifact_open(&self, event: &ArtifactEvent) {
        (**self).on_artifact_open(event)
    }

    fn on_artifact_close(&self, event: &ArtifactEvent) {
        (**self).on_artifact_close(event)
    }

    fn on_action_open(&self, event: &ActionEvent) {
        (**self).on_action_open(event)
    }

    fn on_action_stream(&self, event: &ActionEvent) {
        (**self).on_action_stream(event)
    }

    fn on_action_close(&self, event: &ActionEvent) {
        (**self).on_action_close(event)
    }

    fn on_plain_text(&self, stream_id: &StreamId, text: &str) {
        (**self).on_plain_text(stream_id, text)
    }
}

/// Owned form of every callback, for recording or sending across threads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ParserEvent {
    ArtifactOpen(ArtifactEvent),
    ArtifactClose(ArtifactEvent),
    ActionOpen(ActionEvent),
    ActionStream(ActionEvent),
    ActionClose(ActionEvent),
    PlainText { stream_id: StreamId, text: String },
}

impl ParserEvent {
    pub fn stream_id(&self) -> &StreamId {
        match self {
            ParserEvent::ArtifactOpen(e) | ParserEvent::ArtifactClose(e) => &e.stream_id,
            ParserEvent::ActionOpen(e)
            | ParserEvent::ActionStream(e)
            | ParserEvent::ActionClose(e) => &e.stream_id,
            ParserEvent::PlainText { stream_id, .. } => stream_id,
        }
    }

    pub fn is_plain_text(&self) -> bool {
        matches!(self, ParserEvent::PlainText { .. })
    }
}

/// Forwards every callback as a [`ParserEvent`]. A disconnected receiver does
/// not fail the parse; the dropped event is logged at debug level.
impl ParserCallbacks for crossbeam_channel::Sender<ParserEvent> {
    fn on_artifact_open(&self, event: &ArtifactEvent) {
        forward(self, ParserEvent::ArtifactOpen(event.clone()));
    }

    fn on_artifact_close(&self, event: &ArtifactEvent) {
        forward(self, ParserEvent::ArtifactClose(event.clone()));
    }

    fn on_action_open(&self, event: &ActionEvent) {
        forward(self, ParserEvent::ActionOpen(event.clone()));
    }

    fn on_action_stream(&self, event: &ActionEvent) {
        forward(self, ParserEvent::ActionStream(event.clone()));
    }

    fn on_action_close(&self, event: &ActionEvent) {
        forward(self, ParserEvent::ActionClose(event.clone()));
    }

    fn on_plain_text(&self, stream_id: &StreamId, text: &str) {
        forward(
            self,
            ParserEvent::PlainText {
                stream_id: stream_id.clone(),
                text: text.to_string(),
            },
        );
    }
}

fn forward(sender: &crossbeam_channel::Sender<ParserEvent>, event: ParserEvent) {
    if let Err(crossbeam_channel::SendError(event)) = sender.send(event) {
        tracing::debug!(
            stream_id = %event.stream_id(),
            "event receiver disconnected, dropping event"
        );
    }
}

/// Collects every event in memory.
#[derive(Debug, Default)]
pub struct EventRecorder {
    events: Mutex<Vec<ParserEvent>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: ParserEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }

    /// All events recorded so far, in arrival order.
    pub fn events(&self) -> Vec<ParserEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Recorded events without plain text.
    pub fn lifecycle_events(&self) -> Vec<ParserEvent> {
        self.events()
            .into_iter()
            .filter(|e| !e.is_plain_text())
            .collect()
    }

    /// Concatenation of every plain-text emission.
    pub fn plain_text(&self) -> String {
        self.events()
            .iter()
            .filter_map(|e| match e {
                ParserEvent::PlainText { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl ParserCallbacks for EventRecorder {
    fn on_artifact_open(&self, event: &ArtifactEvent) {
        self.push(ParserEvent::ArtifactOpen(event.clone()));
    }

    fn on_artifact_close(&self, event: &ArtifactEvent) {
        self.push(ParserEvent::ArtifactClose(event.clone()));
    }

    fn on_action_open(&self, event: &ActionEvent) {
        self.push(ParserEvent::ActionOpen(event.clone()));
    }

    fn on_action_stream(&self, event: &ActionEvent) {
        self.push(ParserEvent::ActionStream(event.clone()));
    }

    fn on_action_close(&self, event: &ActionEvent) {
        self.push(ParserEvent::ActionClose(event.clone()));
    }

    fn on_plain_text(&self, stream_id: &StreamId, text: &str) {
        self.push(ParserEvent::PlainText {
            stream_id: stream_id.clone(),
            text: text.to_string(),
        });
    }
}
