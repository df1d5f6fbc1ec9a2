//! Say command handler.

use anyhow::Result;
use tokio::sync::oneshot;

use crate::bootstrap::CliContext;
use crate::error::CliError;

/// Speak `text` once and return when it has finished.
///
/// Ctrl-C cancels speech.
pub async fn execute(ctx: &CliContext, text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(CliError::Arguments("nothing to say".into()).into());
    }
    ctx.ensure_available()?;

    let controller = ctx.controller(Vec::new());
    let (done_tx, done_rx) = oneshot::channel();
    controller
        .speak(text, move || {
            let _ = done_tx.send(());
        })
        .await;

    tokio::select! {
        _ = done_rx => {}
        signal = tokio::signal::ctrl_c() => {
            signal?;
            controller.reset().await;
        }
    }
    Ok(())
}
