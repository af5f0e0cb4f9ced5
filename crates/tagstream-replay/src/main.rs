//! Replays a recorded model transcript through the streaming parser and prints
//! the lifecycle events, for debugging producers of the markup.

mod error;
mod printer;
mod replay;

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tagstream_core::{ParserConfig, RenderMode, StreamId, init_observability};

use crate::error::ReplayError;
use crate::printer::OutputFormat;
use crate::replay::{ReplayOptions, StripMode};

#[derive(Parser, Debug)]
#[command(name = "tagstream-replay", about = "Replay a transcript through the streaming parser")]
struct Cli {
    /// Transcript file holding the full model output.
    file: PathBuf,
    /// Characters appended to the buffer per parse call.
    #[arg(long, default_value_t = 16)]
    chunk_size: usize,
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
    /// Overrides TAGSTREAM_PROJECT_ROOT.
    #[arg(long)]
    project_root: Option<String>,
    /// `plain` or `placeholder`. Overrides TAGSTREAM_RENDER_MODE.
    #[arg(long)]
    render_mode: Option<RenderMode>,
    /// Stream id to parse under. Defaults to a random one.
    #[arg(long)]
    stream_id: Option<String>,
    /// Rewrite the whole transcript in one shot instead of replaying it.
    #[arg(long, value_enum)]
    strip: Option<StripMode>,
}

impl Cli {
    fn parser_config(&self) -> Result<ParserConfig, ReplayError> {
        let mut config = ParserConfig::from_env()?;
        if let Some(root) = &self.project_root {
            config.project_root = root.clone();
        }
        if let Some(mode) = self.render_mode {
            config.render_mode = mode;
        }
        Ok(config)
    }

    fn stream_id(&self) -> StreamId {
        match &self.stream_id {
            Some(id) => StreamId::new(id.as_str()),
            None => StreamId::new(format!("replay-{}", uuid::Uuid::new_v4())),
        }
    }
}

fn run(cli: &Cli) -> Result<(), ReplayError> {
    let input = replay::read_transcript(&cli.file)?;
    let config = cli.parser_config()?;

    if let Some(mode) = cli.strip {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", replay::strip(&input, mode, &config))?;
        return Ok(());
    }

    let options = ReplayOptions {
        chunk_size: cli.chunk_size,
        stream_id: cli.stream_id(),
        config,
        format: cli.format,
    };
    tracing::info!(
        file = %cli.file.display(),
        stream_id = %options.stream_id,
        chunk_size = options.chunk_size,
        "replaying transcript"
    );
    let (summary, _) = replay::replay(&input, &options, std::io::stdout())?;
    tracing::info!(
        parse_calls = summary.parse_calls,
        events = summary.events,
        rendered_bytes = summary.rendered.len(),
        "replay summary"
    );
    Ok(())
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    init_observability();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "replay failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
