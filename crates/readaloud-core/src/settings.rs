//! Settings documents and partial voice-parameter updates.
//!
//! The settings store hands over a flat key→value object, first in full at
//! load time and later as incremental changes. Only the keys in
//! [`RECOGNIZED_KEYS`] are consumed; keys the host stores for its own
//! purposes are ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SettingsError;
use crate::voice::VoiceParams;

/// A flat settings document as delivered by the settings store.
pub type SettingsMap = serde_json::Map<String, Value>;

/// Keys the playback controller understands.
pub const RECOGNIZED_KEYS: [&str; 5] = ["lang", "voice", "pitch", "rate", "volume"];

/// Partial voice-parameter update.
///
/// `None` means "leave unchanged". Values are validated when applied, not
/// when the update is built, so an out-of-range `Some` is dropped at
/// [`VoiceParams::apply`] time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceParamsUpdate {
    pub lang: Option<String>,
    pub voice: Option<String>,
    pub pitch: Option<f32>,
    pub rate: Option<f32>,
    pub volume: Option<f32>,
}

impl VoiceParamsUpdate {
    /// Extract the recognized keys from a settings document.
    ///
    /// Numeric keys accept JSON numbers and numeric strings (`"1.25"`).
    /// A value of the wrong shape is dropped.
    pub fn from_settings(map: &SettingsMap) -> Self {
        let mut update = Self::default();

        for (key, value) in map {
            match key.as_str() {
                "lang" => update.lang = text(key, value),
                "voice" => update.voice = text(key, value),
                "pitch" => update.pitch = numeric(key, value),
                "rate" => update.rate = numeric(key, value),
                "volume" => update.volume = numeric(key, value),
                other => tracing::trace!(key = other, "Ignoring unrecognized setting"),
            }
        }

        update
    }

    /// Parse a JSON settings document.
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        match serde_json::from_str::<Value>(json)? {
            Value::Object(map) => Ok(Self::from_settings(&map)),
            _ => Err(SettingsError::NotAnObject),
        }
    }

    /// Overlay `other` on top of `self`; fields set in `other` win.
    #[must_use]
    pub fn merged(mut self, other: Self) -> Self {
        if other.lang.is_some() {
            self.lang = other.lang;
        }
        if other.voice.is_some() {
            self.voice = other.voice;
        }
        if other.pitch.is_some() {
            self.pitch = other.pitch;
        }
        if other.rate.is_some() {
            self.rate = other.rate;
        }
        if other.volume.is_some() {
            self.volume = other.volume;
        }
        self
    }

    pub const fn is_empty(&self) -> bool {
        self.lang.is_none()
            && self.voice.is_none()
            && self.pitch.is_none()
            && self.rate.is_none()
            && self.volume.is_none()
    }
}

impl VoiceParams {
    /// Apply a partial update through the validating setters.
    pub fn apply(&mut self, update: &VoiceParamsUpdate) {
        if let Some(ref lang) = update.lang {
            self.set_lang(lang.clone());
        }
        if let Some(ref voice) = update.voice {
            self.set_voice(voice.clone());
        }
        if let Some(pitch) = update.pitch {
            self.set_pitch(pitch);
        }
        if let Some(rate) = update.rate {
            self.set_rate(rate);
        }
        if let Some(volume) = update.volume {
            self.set_volume(volume);
        }
    }
}

fn text(key: &str, value: &Value) -> Option<String> {
    if let Value::String(s) = value {
        Some(s.clone())
    } else {
        tracing::debug!(key, %value, "Expected a string setting");
        None
    }
}

#[allow(clippy::cast_possible_truncation)]
fn numeric(key: &str, value: &Value) -> Option<f32> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match parsed {
        Some(v) if v.is_finite() => Some(v as f32),
        _ => {
            tracing::debug!(key, %value, "Expected a numeric setting");
            None
        }
    }
}
