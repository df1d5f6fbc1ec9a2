//! Voice parameters and voice selection.
//!
//! [`VoiceParams`] keeps its fields private so that every write goes through a
//! validating setter. A rejected value leaves the previous one in place; the
//! setters never panic and never return an error, they only report whether
//! the value was taken.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

/// Language used when nothing else is configured.
pub const DEFAULT_LANG: &str = "zh-CN";

/// Accepted pitch values.
pub const PITCH_RANGE: RangeInclusive<f32> = 0.0..=2.0;

/// Accepted speaking-rate multipliers.
pub const RATE_RANGE: RangeInclusive<f32> = 0.1..=10.0;

/// Accepted volume values.
pub const VOLUME_RANGE: RangeInclusive<f32> = 0.0..=1.0;

/// A voice offered by a speech engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    /// Engine-specific voice name (used for exact matching).
    pub name: String,

    /// BCP-47-ish language tag, e.g. `"zh-CN"` or `"en-us"`.
    pub lang: String,

    /// Whether the engine marks this voice as the default for its language.
    #[serde(default)]
    pub is_default: bool,
}

impl Voice {
    /// Convenience constructor for a non-default voice.
    pub fn new(name: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lang: lang.into(),
            is_default: false,
        }
    }

    /// Mark this voice as the default for its language.
    #[must_use]
    pub const fn with_default(mut self, is_default: bool) -> Self {
        self.is_default = is_default;
        self
    }
}

/// Voice configuration applied to every utterance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoiceParams {
    lang: String,
    voice: String,
    pitch: f32,
    rate: f32,
    volume: f32,
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self {
            lang: DEFAULT_LANG.to_string(),
            voice: String::new(),
            pitch: 1.0,
            rate: 1.0,
            volume: 1.0,
        }
    }
}

impl VoiceParams {
    pub fn lang(&self) -> &str {
        &self.lang
    }

    /// Requested voice name. Empty means "engine default for `lang`".
    pub fn voice(&self) -> &str {
        &self.voice
    }

    pub const fn pitch(&self) -> f32 {
        self.pitch
    }

    pub const fn rate(&self) -> f32 {
        self.rate
    }

    pub const fn volume(&self) -> f32 {
        self.volume
    }

    pub fn set_lang(&mut self, lang: impl Into<String>) {
        self.lang = lang.into();
    }

    pub fn set_voice(&mut self, voice: impl Into<String>) {
        self.voice = voice.into();
    }

    /// Set pitch; values outside `[0, 2]` or non-finite values are ignored.
    pub fn set_pitch(&mut self, pitch: f32) -> bool {
        accept("pitch", &mut self.pitch, pitch, &PITCH_RANGE)
    }

    /// Set rate; values outside `[0.1, 10]` or non-finite values are ignored.
    pub fn set_rate(&mut self, rate: f32) -> bool {
        accept("rate", &mut self.rate, rate, &RATE_RANGE)
    }

    /// Set volume; values outside `[0, 1]` or non-finite values are ignored.
    pub fn set_volume(&mut self, volume: f32) -> bool {
        accept("volume", &mut self.volume, volume, &VOLUME_RANGE)
    }
}

fn accept(field: &'static str, slot: &mut f32, value: f32, range: &RangeInclusive<f32>) -> bool {
    if value.is_finite() && range.contains(&value) {
        *slot = value;
        true
    } else {
        tracing::debug!(field, value, kept = *slot, "Rejected voice parameter");
        false
    }
}

/// Compare two language tags, ignoring case and `_`/`-` differences.
///
/// `"zh_CN"` matches `"zh-cn"`; `"zh"` does not match `"zh-CN"` (see
/// [`resolve_voice`] for the primary-subtag fallback).
pub fn lang_matches(a: &str, b: &str) -> bool {
    normalize_lang(a) == normalize_lang(b)
}

fn normalize_lang(lang: &str) -> String {
    lang.trim().replace('_', "-").to_ascii_lowercase()
}

fn primary_subtag(lang: &str) -> String {
    normalize_lang(lang)
        .split('-')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Pick the engine voice to use for `params`.
///
/// 1. A voice whose name equals the requested name exactly.
/// 2. Otherwise a voice for the requested language, preferring the one the
///    engine marks as default.
/// 3. Otherwise a voice sharing the primary language subtag (`zh` for
///    `zh-TW`), with the same preference.
///
/// Returns `None` when nothing fits; the engine then uses its own default.
pub fn resolve_voice(voices: &[Voice], params: &VoiceParams) -> Option<Voice> {
    if !params.voice().is_empty() {
        if let Some(exact) = voices.iter().find(|v| v.name == params.voice()) {
            return Some(exact.clone());
        }
    }

    if let Some(voice) = pick_voice(voices, |v| lang_matches(&v.lang, params.lang())) {
        return Some(voice);
    }

    let wanted = primary_subtag(params.lang());
    if wanted.is_empty() {
        return None;
    }
    pick_voice(voices, |v| primary_subtag(&v.lang) == wanted)
}

/// First voice flagged as default among the matches, else the first match.
fn pick_voice(voices: &[Voice], matches: impl Fn(&Voice) -> bool) -> Option<Voice> {
    let candidates: Vec<&Voice> = voices.iter().filter(|v| matches(v)).collect();
    candidates
        .iter()
        .find(|v| v.is_default)
        .or_else(|| candidates.first())
        .map(|v| (*v).clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voices() -> Vec<Voice> {
        vec![
            Voice::new("Google US English", "en-US"),
            Voice::new("Ting-Ting", "zh-CN"),
            Voice::new("Google 普通话（中国大陆）", "zh-CN").with_default(true),
            Voice::new("Mei-Jia", "zh-TW"),
        ]
    }

    #[test]
    fn default_params() {
        let params = VoiceParams::default();
        assert_eq!(params.lang(), "zh-CN");
        assert_eq!(params.voice(), "");
        assert!((params.pitch() - 1.0).abs() < f32::EPSILON);
        assert!((params.rate() - 1.0).abs() < f32::EPSILON);
        assert!((params.volume() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn valid_rate_is_applied() {
        let mut params = VoiceParams::default();
        assert!(params.set_rate(5.0));
        assert!((params.rate() - 5.0).abs() < f32::EPSILON);
    }

    #[test]
    fn zero_rate_is_rejected() {
        let mut params = VoiceParams::default();
        params.set_rate(2.0);
        assert!(!params.set_rate(0.0));
        assert!((params.rate() - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let mut params = VoiceParams::default();
        assert!(params.set_pitch(0.0));
        assert!(params.set_pitch(2.0));
        assert!(params.set_rate(0.1));
        assert!(params.set_rate(10.0));
        assert!(params.set_volume(0.0));
        assert!(params.set_volume(1.0));
    }

    #[test]
    fn out_of_range_and_non_finite_values_keep_previous() {
        let mut params = VoiceParams::default();
        params.set_pitch(1.5);
        params.set_volume(0.25);

        assert!(!params.set_pitch(2.01));
        assert!(!params.set_pitch(-0.1));
        assert!(!params.set_pitch(f32::NAN));
        assert!(!params.set_volume(1.5));
        assert!(!params.set_volume(f32::INFINITY));
        assert!(!params.set_rate(10.5));

        assert!((params.pitch() - 1.5).abs() < f32::EPSILON);
        assert!((params.volume() - 0.25).abs() < f32::EPSILON);
        assert!((params.rate() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn lang_matching_ignores_case_and_separator() {
        assert!(lang_matches("zh_CN", "zh-cn"));
        assert!(lang_matches(" en-US", "EN_us"));
        assert!(!lang_matches("zh", "zh-CN"));
    }

    #[test]
    fn exact_voice_name_wins() {
        let mut params = VoiceParams::default();
        params.set_voice("Ting-Ting");
        let voice = resolve_voice(&voices(), &params).unwrap();
        assert_eq!(voice.name, "Ting-Ting");
    }

    #[test]
    fn unknown_voice_falls_back_to_language_default() {
        let mut params = VoiceParams::default();
        params.set_voice("Missing Voice");
        let voice = resolve_voice(&voices(), &params).unwrap();
        assert_eq!(voice.name, "Google 普通话（中国大陆）");
    }

    #[test]
    fn underscore_lang_still_resolves() {
        let mut params = VoiceParams::default();
        params.set_lang("zh_TW");
        let voice = resolve_voice(&voices(), &params).unwrap();
        assert_eq!(voice.name, "Mei-Jia");
    }

    #[test]
    fn primary_subtag_fallback() {
        let mut params = VoiceParams::default();
        params.set_lang("zh-HK");
        let voice = resolve_voice(&voices(), &params).unwrap();
        assert_eq!(voice.name, "Google 普通话（中国大陆）");
    }

    #[test]
    fn no_match_yields_engine_default() {
        let mut params = VoiceParams::default();
        params.set_lang("fr-FR");
        assert!(resolve_voice(&voices(), &params).is_none());
        assert!(resolve_voice(&[], &VoiceParams::default()).is_none());
    }
}
