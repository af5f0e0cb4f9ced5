use std::io::Write;
use std::thread::JoinHandle;

use clap::ValueEnum;
use crossbeam_channel::Receiver;
use tagstream_core::{Action, ParserEvent};

use crate::error::ReplayError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// One human readable line per event.
    Text,
}

fn describe_action(action: &Action) -> String {
    match action {
        Action::File(file) => format!("file {}", file.file_path),
        Action::ToolUse(tool) => format!("toolUse {}", tool.tool_name),
        Action::Other { action_type, .. } => {
            format!("other {}", action_type.as_deref().unwrap_or("<none>"))
        }
    }
}

fn text_line(event: &ParserEvent) -> String {
    match event {
        ParserEvent::ArtifactOpen(e) => {
            format!("[{}] artifact open  {} {:?}", e.stream_id, e.artifact.id, e.artifact.title)
        }
        ParserEvent::ArtifactClose(e) => format!("[{}] artifact close {}", e.stream_id, e.artifact.id),
        ParserEvent::ActionOpen(e) => format!(
            "[{}] action open    #{} {}",
            e.stream_id,
            e.action_id,
            describe_action(&e.action)
        ),
        ParserEvent::ActionStream(e) => format!(
            "[{}] action stream  #{} {} bytes",
            e.stream_id,
            e.action_id,
            e.action.content().len()
        ),
        ParserEvent::ActionClose(e) => format!(
            "[{}] action close   #{} {} ({} bytes)",
            e.stream_id,
            e.action_id,
            describe_action(&e.action),
            e.action.content().len()
        ),
        ParserEvent::PlainText { stream_id, text } => format!("[{stream_id}] text {text:?}"),
    }
}

pub fn write_event(
    out: &mut impl Write,
    format: OutputFormat,
    event: &ParserEvent,
) -> Result<(), ReplayError> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer(&mut *out, event)?;
            writeln!(out)?;
        }
        OutputFormat::Text => writeln!(out, "{}", text_line(event))?,
    }
    Ok(())
}

/// Drains `events` into `out` on a dedicated thread until every sender is
/// dropped. The thread hands back the writer and the number of events written.
pub fn spawn_printer<W>(
    events: Receiver<ParserEvent>,
    format: OutputFormat,
    mut out: W,
) -> JoinHandle<Result<(W, usize), ReplayError>>
where
    W: Write + Send + 'static,
{
    std::thread::spawn(move || {
        let mut written = 0;
        for event in events {
            write_event(&mut out, format, &event)?;
            written += 1;
        }
        out.flush()?;
        Ok((out, written))
    })
}

#[cfg(test)]
mod tests {
    use tagstream_core::{ActionEvent, StreamId};

    use super::*;

    fn close_event() -> ParserEvent {
        ParserEvent::ActionClose(ActionEvent {
            stream_id: StreamId::new("s"),
            artifact_id: "a1".into(),
            action_id: "0".into(),
            action: Action::file("src/main.rs", "fn main() {}\n"),
        })
    }

    #[test]
    fn text_format_is_one_line_per_event() {
        let mut out = Vec::new();
        write_event(&mut out, OutputFormat::Text, &close_event()).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "[s] action close   #0 file src/main.rs (13 bytes)\n"
        );
    }

    #[test]
    fn json_format_round_trips() {
        let mut out = Vec::new();
        write_event(&mut out, OutputFormat::Json, &close_event()).unwrap();
        let line = String::from_utf8(out).unwrap();
        let decoded: ParserEvent = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(decoded, close_event());
    }

    #[test]
    fn printer_stops_when_senders_are_gone() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = spawn_printer(rx, OutputFormat::Json, Vec::new());
        tx.send(close_event()).unwrap();
        tx.send(ParserEvent::PlainText {
            stream_id: StreamId::new("s"),
            text: "hi".into(),
        })
        .unwrap();
        drop(tx);
        let (out, written) = handle.join().unwrap().unwrap();
        assert_eq!(written, 2);
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 2);
    }
}
