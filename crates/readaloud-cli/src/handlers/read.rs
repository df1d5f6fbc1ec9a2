//! Read command handler.
//!
//! Splits the text into sentences, plays them in order and, when attached
//! to a terminal, accepts playback commands on stdin while reading.

use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use readaloud_core::split_segments;
use readaloud_player::{PlaybackController, PlaybackState};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};

use crate::bootstrap::CliContext;
use crate::controls::{self, Flow, HELP};
use crate::error::CliError;

/// Execute the read command.
pub async fn execute(ctx: &CliContext, file: &Path, interactive: bool) -> Result<()> {
    let text = load_text(file).await?;
    let segments = split_segments(&text);
    if segments.is_empty() {
        println!("Nothing to read.");
        return Ok(());
    }
    ctx.ensure_available()?;

    let total = segments.len();
    let controller = ctx.controller(segments);
    let lines: Arc<[String]> = controller.segments().into();
    controller
        .on_segment_start(move |index| println!("[{}/{}] {}", index + 1, total, lines[index]))
        .await;
    controller
        .on_segment_end(|index| tracing::debug!(index, "Sentence finished"))
        .await;

    // stdin carries the text itself when reading from `-`
    let interactive = interactive && file != Path::new("-") && std::io::stdin().is_terminal();
    if interactive {
        println!("{HELP}");
    }

    controller.play().await;
    run_session(&controller, interactive).await
}

async fn load_text(file: &Path) -> Result<String, CliError> {
    if file == Path::new("-") {
        let mut text = String::new();
        tokio::io::stdin().read_to_string(&mut text).await?;
        return Ok(text);
    }
    tokio::fs::read_to_string(file)
        .await
        .map_err(|e| CliError::Io(format!("{}: {e}", file.display())))
}

/// Drive playback until it finishes, the user quits or Ctrl-C.
///
/// Without a terminal the session ends on the first `Stopped`.
async fn run_session(controller: &PlaybackController, interactive: bool) -> Result<()> {
    let mut status = controller.subscribe();
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut interactive = interactive;

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                controller.reset().await;
                println!();
                return Ok(());
            }
            changed = status.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let state = status.borrow_and_update().state;
                if state == PlaybackState::Stopped {
                    if !interactive {
                        return Ok(());
                    }
                    println!("Stopped. g to play again, q to quit.");
                }
            }
            line = input.next_line(), if interactive => {
                let Some(line) = line? else {
                    // EOF on the terminal: finish the current run unattended
                    interactive = false;
                    if controller.state() == PlaybackState::Stopped {
                        return Ok(());
                    }
                    continue;
                };
                match controls::parse_line(&line) {
                    Ok(Some(control)) => {
                        if controls::apply(controller, control).await == Flow::Quit {
                            return Ok(());
                        }
                    }
                    Ok(None) => {}
                    Err(err) => println!("{err}. {HELP}"),
                }
            }
        }
    }
}
