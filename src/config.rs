//! Engine configuration.
//!
//! All synthesis parameters live in one flat struct, loaded once from a
//! line-based `key: value` file and read-only afterwards. A missing config
//! file is normal: every field has a default tuned for the bundled
//! Portuguese voice.

use std::path::Path;

/// Lower bound for the playback speed factor.
pub const MIN_SPEED: f32 = 0.5;
/// Upper bound for the playback speed factor.
pub const MAX_SPEED: f32 = 2.0;

/// Synthesis parameters.
///
/// Crossfade durations are in milliseconds and are adapted per phoneme pair
/// at synthesis time; see the concatenator for how the special-case fields
/// interact.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base crossfade between units inside a word.
    pub crossfade_ms: f32,
    /// Crossfade for vowel-to-vowel transitions.
    pub crossfade_vowel_ms: f32,
    /// Upper bound when the outgoing unit ends in `s`.
    pub crossfade_s_ending_ms: f32,
    /// Upper bound when the outgoing unit ends in `r`.
    pub crossfade_r_ending_ms: f32,
    /// Multiplier applied to the base crossfade for vowel-to-consonant.
    pub vowel_to_consonant_factor: f32,
    /// Silence between words.
    pub word_pause_ms: f32,
    /// Silence emitted for characters with no matching unit.
    pub unknown_silence_ms: f32,
    /// Fade-in at the start of a word.
    pub fade_in_ms: f32,
    /// Fade-out before pauses and at the end of the utterance.
    pub fade_out_ms: f32,

    /// Compress silent stretches inside words.
    pub remove_word_silence: bool,
    /// Silence threshold as a fraction of the peak amplitude.
    pub silence_threshold: f32,
    /// Minimum silent run length considered removable.
    pub min_silence_ms: f32,

    /// Subtract the DC offset from each unit before concatenation.
    pub remove_dc_offset: bool,

    /// Speed used when the caller does not pass one.
    pub default_speed: f32,
    pub min_speed: f32,
    pub max_speed: f32,

    /// Log every selected unit at debug level.
    pub print_units: bool,
    /// Log synthesis wall time.
    pub print_timing: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            crossfade_ms: 20.0,
            crossfade_vowel_ms: 45.0,
            crossfade_s_ending_ms: 30.0,
            crossfade_r_ending_ms: 30.0,
            vowel_to_consonant_factor: 0.5,
            word_pause_ms: 120.0,
            unknown_silence_ms: 30.0,
            fade_in_ms: 3.0,
            fade_out_ms: 3.0,
            remove_word_silence: true,
            silence_threshold: 0.02,
            min_silence_ms: 15.0,
            remove_dc_offset: true,
            default_speed: 1.0,
            min_speed: MIN_SPEED,
            max_speed: MAX_SPEED,
            print_units: false,
            print_timing: false,
        }
    }
}

impl Config {
    /// Load configuration from `path`, falling back to defaults for any key
    /// the file does not set. A missing or unreadable file yields the
    /// defaults; this is not an error.
    pub fn load(path: &Path) -> Self {
        let mut config = Config::default();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(_) => {
                log::debug!("no config at {}, using defaults", path.display());
                return config;
            }
        };
        for line in content.lines() {
            config.apply_line(line);
        }
        config
    }

    fn apply_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return;
        }
        let Some((key, value)) = line.split_once(':') else {
            return;
        };
        let key = key.trim();
        let value = value.trim();

        match key {
            "crossfade_ms" => set_f32(&mut self.crossfade_ms, key, value),
            "crossfade_vowel_ms" => set_f32(&mut self.crossfade_vowel_ms, key, value),
            "crossfade_s_ending_ms" => set_f32(&mut self.crossfade_s_ending_ms, key, value),
            "crossfade_r_ending_ms" => set_f32(&mut self.crossfade_r_ending_ms, key, value),
            "vowel_to_consonant_factor" => {
                set_f32(&mut self.vowel_to_consonant_factor, key, value)
            }
            "word_pause_ms" => set_f32(&mut self.word_pause_ms, key, value),
            "unknown_silence_ms" => set_f32(&mut self.unknown_silence_ms, key, value),
            "fade_in_ms" => set_f32(&mut self.fade_in_ms, key, value),
            "fade_out_ms" => set_f32(&mut self.fade_out_ms, key, value),
            "remove_word_silence" => self.remove_word_silence = parse_bool(value),
            "silence_threshold" => set_f32(&mut self.silence_threshold, key, value),
            "min_silence_ms" => set_f32(&mut self.min_silence_ms, key, value),
            "remove_dc_offset" => self.remove_dc_offset = parse_bool(value),
            "default_speed" => set_f32(&mut self.default_speed, key, value),
            "min_speed" => set_f32(&mut self.min_speed, key, value),
            "max_speed" => set_f32(&mut self.max_speed, key, value),
            "print_units" => self.print_units = parse_bool(value),
            "print_timing" => self.print_timing = parse_bool(value),
            _ => log::debug!("ignoring unknown config key '{}'", key),
        }
    }
}

fn set_f32(field: &mut f32, key: &str, value: &str) {
    match value.parse::<f32>() {
        Ok(v) => *field = v,
        Err(_) => log::warn!("config: bad value '{}' for {}, keeping {}", value, key, field),
    }
}

fn parse_bool(value: &str) -> bool {
    value == "true" || value == "1"
}
