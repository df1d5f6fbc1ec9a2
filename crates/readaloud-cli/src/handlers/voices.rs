//! Voices command handler.

use std::fmt::Write as _;

use anyhow::Result;
use readaloud_core::{Voice, resolve_voice};

use crate::bootstrap::CliContext;

/// List the engine's voices, marking the one the current settings select.
pub fn execute(ctx: &CliContext, json: bool) -> Result<()> {
    let voices = ctx.engine.voices();

    if json {
        println!("{}", serde_json::to_string_pretty(&voices)?);
        return Ok(());
    }

    if voices.is_empty() {
        println!("No voices reported by {}.", ctx.engine.name());
        return Ok(());
    }

    let selected = resolve_voice(&voices, &ctx.config.params);
    print!("{}", format_voice_table(&voices, selected.as_ref()));
    Ok(())
}

fn format_voice_table(voices: &[Voice], selected: Option<&Voice>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "  {:<32} {:<10} Default", "Name", "Language");
    let _ = writeln!(out, "{}", "-".repeat(52));
    for voice in voices {
        let marker = if selected == Some(voice) { '*' } else { ' ' };
        let default = if voice.is_default { "yes" } else { "" };
        let _ = writeln!(out, "{marker} {:<32} {:<10} {default}", voice.name, voice.lang);
    }
    let _ = writeln!(out, "{} voice(s)", voices.len());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_marks_selected_voice() {
        let voices = vec![
            Voice::new("Ting-Ting", "zh-CN").with_default(true),
            Voice::new("Samantha", "en-US"),
        ];
        let table = format_voice_table(&voices, Some(&voices[1]));
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 5);
        assert!(lines[2].starts_with("  Ting-Ting"));
        assert!(lines[2].trim_end().ends_with("yes"));
        assert!(lines[3].starts_with("* Samantha"));
        assert_eq!(lines[4], "2 voice(s)");
    }

    #[test]
    fn test_table_without_selection() {
        let voices = vec![Voice::new("Kyoko", "ja-JP")];
        let table = format_voice_table(&voices, None);
        assert!(!table.contains('*'));
    }
}
