//! Resumable scanner over a growing buffer.
//!
//! A stream's [`StreamState`] is the cursor plus the open artifact/action.
//! [`scan`] walks the buffer from that cursor, reports what it recognises
//! through [`ScanEvents`], and stops ("suspends") as soon as it needs input
//! that has not arrived yet. Suspending is just returning with the cursor left
//! at the start of the incomplete construct; the next call with a longer
//! buffer picks up from there.
//!
//! Offsets are byte offsets. Every tag token is ASCII, so each offset the
//! scanner stores lands on a character boundary.

use crate::content::ContentPostProcessor;
use crate::model::{Action, ArtifactData, FileAction};
use crate::tags::{
    self, ACTION_TAG_CLOSE, ACTION_TAG_OPEN, ARTIFACT_TAG_CLOSE, ARTIFACT_TAG_OPEN,
};

/// Sink for everything the scanner recognises, in scan order.
pub trait ScanEvents {
    fn plain_text(&mut self, text: &str);

    fn artifact_open(&mut self, _artifact: &ArtifactData) {}

    fn artifact_close(&mut self, _artifact: &ArtifactData) {}

    fn action_open(&mut self, _artifact: &ArtifactData, _action_id: u64, _action: &Action) {}

    fn action_stream(&mut self, _artifact: &ArtifactData, _action_id: u64, _action: &Action) {}

    fn action_close(&mut self, _artifact: &ArtifactData, _action_id: u64, _action: &Action) {}
}

/// Settings the scanner needs while building actions.
#[derive(Clone, Copy, Debug)]
pub struct ScanContext<'a> {
    pub project_root: &'a str,
    pub processor: &'a ContentPostProcessor,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct OpenAction {
    id: u64,
    action: Action,
    /// Buffer offset up to which the last stream view reached.
    streamed_until: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct OpenArtifact {
    data: ArtifactData,
    action: Option<OpenAction>,
}

/// Resumable parse state of one stream.
///
/// The open action is owned by the open artifact, so an action outside an
/// artifact cannot be represented.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StreamState {
    position: usize,
    seen_len: usize,
    artifact: Option<OpenArtifact>,
    next_action_id: u64,
}

impl StreamState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Byte offset of the first character not consumed yet.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Length of the longest buffer parsed for this stream.
    pub fn seen_len(&self) -> usize {
        self.seen_len
    }

    pub fn is_inside_artifact(&self) -> bool {
        self.artifact.is_some()
    }

    pub fn is_inside_action(&self) -> bool {
        self.artifact.as_ref().is_some_and(|a| a.action.is_some())
    }

    pub fn current_artifact(&self) -> Option<&ArtifactData> {
        self.artifact.as_ref().map(|a| &a.data)
    }

    pub fn current_action(&self) -> Option<&Action> {
        self.artifact
            .as_ref()
            .and_then(|a| a.action.as_ref())
            .map(|a| &a.action)
    }

    /// Id the next opened action will get.
    pub fn next_action_id(&self) -> u64 {
        self.next_action_id
    }

    pub(crate) fn record_len(&mut self, len: usize) {
        self.seen_len = self.seen_len.max(len);
    }

    /// Emits everything left after the cursor as plain text, provided no
    /// artifact is open. Used once a stream is known to be complete, so a
    /// trailing `<` or partial tag is not held back forever.
    pub(crate) fn flush_tail(&mut self, input: &str, events: &mut dyn ScanEvents) {
        if self.artifact.is_none() && self.position < input.len() {
            events.plain_text(&input[self.position..]);
            self.position = input.len();
        }
    }
}

enum Step {
    Continue(usize),
    OpenArtifact(ArtifactData, usize),
    CloseArtifact(usize),
    Suspend,
}

/// Scans `input` from the state's cursor and updates the state in place.
///
/// `input` must extend every buffer previously scanned with this state.
pub fn scan(
    state: &mut StreamState,
    input: &str,
    ctx: &ScanContext<'_>,
    events: &mut dyn ScanEvents,
) {
    let mut i = state.position;

    while i < input.len() {
        let step = match state.artifact.as_mut() {
            Some(artifact) => {
                scan_artifact_body(artifact, &mut state.next_action_id, input, i, ctx, events)
            }
            None => scan_outside_artifact(input, i, events),
        };

        match step {
            Step::Continue(next) => i = next,
            Step::OpenArtifact(data, next) => {
                events.artifact_open(&data);
                state.artifact = Some(OpenArtifact { data, action: None });
                i = next;
            }
            Step::CloseArtifact(next) => {
                if let Some(artifact) = state.artifact.take() {
                    events.artifact_close(&artifact.data);
                }
                i = next;
            }
            Step::Suspend => break,
        }
    }

    state.position = i;
}

fn scan_outside_artifact(input: &str, i: usize, events: &mut dyn ScanEvents) -> Step {
    let bytes = input.as_bytes();

    if bytes[i] != b'<' {
        let end = find_byte(input, b'<', i).unwrap_or(input.len());
        events.plain_text(&input[i..end]);
        return Step::Continue(end);
    }

    // Close tags are never recognised out here.
    if bytes.get(i + 1) == Some(&b'/') {
        events.plain_text(&input[i..i + 1]);
        return Step::Continue(i + 1);
    }

    let token = ARTIFACT_TAG_OPEN.as_bytes();
    let mut j = i;
    while j < bytes.len() && j - i < token.len() {
        if bytes[j] != token[j - i] {
            // Not our tag. The diverging character is rescanned, it may open a tag itself.
            events.plain_text(&input[i..j]);
            return Step::Continue(j);
        }
        j += 1;
    }

    if j - i < token.len() {
        // Buffer ends inside what may still become the open token.
        return Step::Suspend;
    }

    match bytes.get(j) {
        None => Step::Suspend,
        Some(&next) if next != b'>' && !next.is_ascii_whitespace() => {
            // Token glued to something else (`<boltArtifactXYZ`).
            events.plain_text(&input[i..j]);
            Step::Continue(j)
        }
        Some(_) => match find_byte(input, b'>', j) {
            Some(end) => Step::OpenArtifact(tags::parse_artifact_open_tag(&input[i..=end]), end + 1),
            None => Step::Suspend,
        },
    }
}

fn scan_artifact_body(
    artifact: &mut OpenArtifact,
    next_action_id: &mut u64,
    input: &str,
    i: usize,
    ctx: &ScanContext<'_>,
    events: &mut dyn ScanEvents,
) -> Step {
    if let Some(open) = artifact.action.as_mut() {
        return match find_str(input, ACTION_TAG_CLOSE, i) {
            Some(close) => {
                open.action.content_mut().push_str(&input[i..close]);
                ctx.processor.finalize(&mut open.action);
                events.action_close(&artifact.data, open.id, &open.action);
                artifact.action = None;
                Step::Continue(close + ACTION_TAG_CLOSE.len())
            }
            None => {
                stream_open_action(&artifact.data, open, input, i, ctx, events);
                Step::Suspend
            }
        };
    }

    let action_open = find_str(input, ACTION_TAG_OPEN, i);
    let artifact_close = find_str(input, ARTIFACT_TAG_CLOSE, i);

    match (action_open, artifact_close) {
        (Some(open), close) if close.is_none_or(|close| open < close) => {
            match find_byte(input, b'>', open) {
                Some(end) => {
                    let action = tags::parse_action_open_tag(&input[open..=end], ctx.project_root);
                    let id = *next_action_id;
                    *next_action_id += 1;
                    events.action_open(&artifact.data, id, &action);
                    artifact.action = Some(OpenAction {
                        id,
                        action,
                        streamed_until: None,
                    });
                    Step::Continue(end + 1)
                }
                None => Step::Suspend,
            }
        }
        (_, Some(close)) => Step::CloseArtifact(close + ARTIFACT_TAG_CLOSE.len()),
        _ => Step::Suspend,
    }
}

/// Emits the in-progress view of an open file action, unless nothing new
/// became visible since the last view.
fn stream_open_action(
    artifact: &ArtifactData,
    open: &mut OpenAction,
    input: &str,
    i: usize,
    ctx: &ScanContext<'_>,
    events: &mut dyn ScanEvents,
) {
    let Action::File(file) = &open.action else {
        return;
    };

    // A trailing `</boltAc` may be the start of the close tag; keep it back.
    let visible_end = input.len() - partial_token_suffix(&input[i..], ACTION_TAG_CLOSE);
    if visible_end <= i || open.streamed_until == Some(visible_end) {
        return;
    }

    let mut raw = file.content.clone();
    raw.push_str(&input[i..visible_end]);
    let view = Action::File(FileAction {
        file_path: file.file_path.clone(),
        content: ctx.processor.stream_view(file, &raw),
    });
    events.action_stream(artifact, open.id, &view);
    open.streamed_until = Some(visible_end);
}

fn find_str(input: &str, needle: &str, from: usize) -> Option<usize> {
    input[from..].find(needle).map(|idx| idx + from)
}

fn find_byte(input: &str, byte: u8, from: usize) -> Option<usize> {
    input.as_bytes()[from..]
        .iter()
        .position(|b| *b == byte)
        .map(|idx| idx + from)
}

/// Length of the longest suffix of `haystack` that is a proper prefix of `token`.
fn partial_token_suffix(haystack: &str, token: &str) -> usize {
    let hay = haystack.as_bytes();
    let token = token.as_bytes();
    (1..token.len().min(hay.len() + 1))
        .rev()
        .find(|&len| hay.ends_with(&token[..len]))
        .unwrap_or(0)
}
