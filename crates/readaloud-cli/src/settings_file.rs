//! Loading voice settings from a JSON file.
//!
//! The file holds the same flat key/value document the settings contract
//! describes: `{"lang": "zh-CN", "rate": "1.2"}`. Unknown keys and invalid
//! values are ignored; only unreadable or malformed files are errors.

use std::path::Path;

use readaloud_core::VoiceParamsUpdate;

use crate::error::CliError;

/// Read `path` into a settings update.
pub fn load(path: &Path) -> Result<VoiceParamsUpdate, CliError> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| CliError::Io(format!("{}: {e}", path.display())))?;
    let update = VoiceParamsUpdate::from_json(&json)
        .map_err(|e| CliError::Config(format!("{}: {e}", path.display())))?;
    tracing::debug!(path = %path.display(), ?update, "Loaded settings file");
    Ok(update)
}

/// Settings from the optional file with flag values laid over them.
pub fn resolve(path: Option<&Path>, flags: VoiceParamsUpdate) -> Result<VoiceParamsUpdate, CliError> {
    let file = match path {
        Some(path) => load(path)?,
        None => VoiceParamsUpdate::default(),
    };
    Ok(file.merged(flags))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn settings_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_string_values() {
        let file = settings_file(r#"{"lang": "en-US", "rate": "1.5", "theme": "dark"}"#);
        let update = load(file.path()).unwrap();
        assert_eq!(update.lang.as_deref(), Some("en-US"));
        assert_eq!(update.rate, Some(1.5));
        assert!(update.pitch.is_none());
    }

    #[test]
    fn test_load_drops_invalid_values() {
        let file = settings_file(r#"{"rate": "fast", "pitch": [1], "lang": 7}"#);
        let update = load(file.path()).unwrap();
        assert!(update.is_empty());
    }

    #[test]
    fn test_load_malformed_is_config_error() {
        let file = settings_file("rate = 1.5");
        let err = load(file.path()).unwrap_err();
        assert!(matches!(err, CliError::Config(_)));

        let file = settings_file("[1, 2]");
        assert!(matches!(load(file.path()), Err(CliError::Config(_))));
    }

    #[test]
    fn test_load_missing_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(&dir.path().join("missing.json")).unwrap_err();
        assert_eq!(err.exit_code(), 74);
    }

    #[test]
    fn test_flags_override_file() {
        let file = settings_file(r#"{"lang": "zh-HK", "rate": "0.8"}"#);
        let flags = VoiceParamsUpdate {
            rate: Some(2.0),
            ..Default::default()
        };
        let update = resolve(Some(file.path()), flags).unwrap();
        assert_eq!(update.lang.as_deref(), Some("zh-HK"));
        assert_eq!(update.rate, Some(2.0));
    }
}
