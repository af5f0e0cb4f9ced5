//! Feeds a recorded transcript through the parser the way a live stream would
//! arrive: as a growing buffer, a few characters at a time.

use std::io::Write;
use std::path::Path;

use clap::ValueEnum;
use tagstream_core::{ParserConfig, StreamId, StreamingMessageParser, strip_artifacts, strip_file_actions};

use crate::error::ReplayError;
use crate::printer::{OutputFormat, spawn_printer};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StripMode {
    /// Print only the text outside artifacts.
    Artifacts,
    /// Print the transcript with file contents removed from file actions.
    FileActions,
}

#[derive(Clone, Debug)]
pub struct ReplayOptions {
    /// Characters added to the buffer per parse call.
    pub chunk_size: usize,
    pub stream_id: StreamId,
    pub config: ParserConfig,
    pub format: OutputFormat,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplaySummary {
    pub parse_calls: usize,
    pub events: usize,
    /// Concatenation of the text returned by every parse call.
    pub rendered: String,
}

pub fn read_transcript(path: &Path) -> Result<String, ReplayError> {
    std::fs::read_to_string(path).map_err(|source| ReplayError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// End offsets of the cumulative prefixes fed to the parser. Every offset is a
/// char boundary and the last one is the full length.
pub fn chunk_ends(input: &str, chunk_size: usize) -> Result<Vec<usize>, ReplayError> {
    if chunk_size == 0 {
        return Err(ReplayError::ZeroChunkSize);
    }
    let mut ends: Vec<usize> = input
        .char_indices()
        .map(|(idx, _)| idx)
        .skip(chunk_size)
        .step_by(chunk_size)
        .collect();
    ends.push(input.len());
    Ok(ends)
}

/// Replays `input` and writes every event to `out`. Returns the summary and
/// the writer.
pub fn replay<W>(
    input: &str,
    options: &ReplayOptions,
    out: W,
) -> Result<(ReplaySummary, W), ReplayError>
where
    W: Write + Send + 'static,
{
    let ends = chunk_ends(input, options.chunk_size)?;
    let (tx, rx) = crossbeam_channel::unbounded();
    let printer = spawn_printer(rx, options.format, out);

    let parser = StreamingMessageParser::builder()
        .config(options.config.clone())
        .callbacks(tx)
        .build();

    let mut rendered = String::new();
    let last = ends.len() - 1;
    let parsed: Result<(), ReplayError> = ends.iter().enumerate().try_for_each(|(call, &end)| {
        let buffer = &input[..end];
        let text = if call == last {
            parser.finish(&options.stream_id, buffer)?
        } else {
            parser.parse(&options.stream_id, buffer)?
        };
        rendered.push_str(&text);
        Ok(())
    });
    // Dropping the parser drops the sender, which ends the printer loop.
    drop(parser);
    let printed = printer.join().map_err(|_| ReplayError::PrinterPanicked)?;
    parsed?;
    let (out, events) = printed?;

    tracing::info!(
        stream_id = %options.stream_id,
        parse_calls = ends.len(),
        events,
        "replay finished"
    );
    Ok((
        ReplaySummary {
            parse_calls: ends.len(),
            events,
            rendered,
        },
        out,
    ))
}

/// One-shot rewrite of a complete transcript.
pub fn strip(input: &str, mode: StripMode, config: &ParserConfig) -> String {
    match mode {
        StripMode::Artifacts => strip_artifacts(input),
        StripMode::FileActions => strip_file_actions(input, config),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use tagstream_core::{ParserEvent, RenderMode};

    use super::*;

    const TRANSCRIPT: &str = concat!(
        "Setting up ",
        r#"<boltArtifact id="demo" title="Demo">"#,
        r#"<boltAction type="file" filePath="/home/project/index.js">console.log("hé");</boltAction>"#,
        r#"<boltAction type="toolUse" toolName="npmInstall">{"packages":[]}</boltAction>"#,
        "</boltArtifact> done <",
    );

    fn options(chunk_size: usize) -> ReplayOptions {
        ReplayOptions {
            chunk_size,
            stream_id: StreamId::new("replay"),
            config: ParserConfig::default(),
            format: OutputFormat::Json,
        }
    }

    fn decode(out: Vec<u8>) -> Vec<ParserEvent> {
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn chunk_ends_respect_char_boundaries() {
        assert_eq!(chunk_ends("abcde", 2).unwrap(), vec![2, 4, 5]);
        assert_eq!(chunk_ends("héllo", 2).unwrap(), vec![3, 5, 6]);
        assert_eq!(chunk_ends("", 4).unwrap(), vec![0]);
        assert!(matches!(chunk_ends("a", 0), Err(ReplayError::ZeroChunkSize)));
    }

    #[test]
    fn replay_reports_lifecycle_and_flushes_tail() {
        let (summary, out) = replay(TRANSCRIPT, &options(3), Vec::new()).unwrap();
        assert_eq!(summary.rendered, "Setting up  done <");

        let lifecycle: Vec<String> = decode(out)
            .into_iter()
            .filter(|e| !e.is_plain_text() && !matches!(e, ParserEvent::ActionStream(_)))
            .map(|e| serde_json::to_value(&e).unwrap()["event"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(
            lifecycle,
            vec![
                "artifact_open",
                "action_open",
                "action_close",
                "action_open",
                "action_close",
                "artifact_close"
            ]
        );
    }

    #[test]
    fn chunk_size_does_not_change_rendered_text() {
        let (whole, _) = replay(TRANSCRIPT, &options(usize::MAX), Vec::new()).unwrap();
        let (small, _) = replay(TRANSCRIPT, &options(1), Vec::new()).unwrap();
        assert_eq!(whole.parse_calls, 1);
        assert_eq!(small.rendered, whole.rendered);
    }

    #[test]
    fn placeholder_mode_renders_artifact_element() {
        let mut opts = options(8);
        opts.config = ParserConfig::default().render_mode(RenderMode::InlinePlaceholder);
        let (summary, _) = replay(TRANSCRIPT, &opts, Vec::new()).unwrap();
        assert!(summary.rendered.starts_with(
            r#"Setting up <div class="__boltArtifact__" data-stream-id="replay" data-id="demo""#
        ));
    }

    #[test]
    fn transcript_is_read_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TRANSCRIPT.as_bytes()).unwrap();
        assert_eq!(read_transcript(file.path()).unwrap(), TRANSCRIPT);

        let missing = file.path().with_extension("missing");
        assert!(matches!(
            read_transcript(&missing),
            Err(ReplayError::Read { .. })
        ));
    }

    #[test]
    fn strip_modes() {
        assert_eq!(
            strip(TRANSCRIPT, StripMode::Artifacts, &ParserConfig::default()),
            "Setting up  done <"
        );
        let compact = strip(TRANSCRIPT, StripMode::FileActions, &ParserConfig::default());
        assert!(compact.contains(r#"<boltAction type="file" filePath="index.js"></boltAction>"#));
        assert!(compact.contains(r#"{"packages":[]}"#));
    }
}
