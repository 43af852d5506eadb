//! Utterance-level prosody: declination, question intonation, and
//! punctuation pauses.
//!
//! The context is derived from the raw input text before any normalisation,
//! so punctuation that the front-end later strips still shapes the
//! utterance.

use crate::config::Config;
use crate::dsp::saturate;

/// Prosodic cues for one utterance.
#[derive(Debug, Clone)]
pub struct ProsodyContext {
    pub is_question: bool,
    pub is_exclamation: bool,
    /// Whitespace-delimited word runs in the raw input.
    pub word_count: usize,
    /// Overall pitch tendency; questions and exclamations raise it slightly.
    pub pitch_modifier: f32,
    /// Overall duration tendency. Reserved for future shaping, kept at 1.0.
    pub duration_modifier: f32,
}

impl ProsodyContext {
    /// Analyse the raw input text.
    pub fn analyze(text: &str) -> Self {
        let word_count = text.split_whitespace().count();

        let mut is_question = false;
        let mut is_exclamation = false;
        let mut pitch_modifier = 1.0;
        for c in text.chars().rev() {
            if c.is_whitespace() {
                continue;
            }
            if c == '?' {
                is_question = true;
                pitch_modifier = 1.05;
            } else if c == '!' {
                is_exclamation = true;
                pitch_modifier = 1.08;
            }
            break;
        }

        Self {
            is_question,
            is_exclamation,
            word_count,
            pitch_modifier,
            duration_modifier: 1.0,
        }
    }
}

/// Scale a completed word down along the utterance's declination line:
/// energy falls linearly by 5% from the first word to the last. A one-word
/// utterance has no line to follow and is left alone.
pub fn apply_declination(word: &mut [i16], word_index: usize, total_words: usize) {
    if word.is_empty() || total_words <= 1 {
        return;
    }
    let progress = word_index as f32 / (total_words - 1) as f32;
    let energy = 1.0 - 0.05 * progress;
    for s in word.iter_mut() {
        *s = saturate(*s as f32 * energy);
    }
}

/// Raise the end of a question with a quadratic energy ramp over the last
/// word (rise 0.15) and the penultimate word (rise 0.08).
///
/// This is an amplitude ramp, not a pitch shift: listeners hear a loudness
/// rise. Words shorter than 100 samples are skipped.
pub fn apply_question_intonation(
    buffer: &mut [i16],
    word_start: usize,
    word_index: usize,
    total_words: usize,
) {
    if buffer.is_empty() || total_words == 0 || word_start >= buffer.len() {
        return;
    }
    if word_index + 2 < total_words {
        return;
    }
    let word_samples = buffer.len() - word_start;
    if word_samples < 100 {
        return;
    }

    let rise = if word_index + 1 == total_words { 0.15 } else { 0.08 };
    for i in word_start..buffer.len() {
        let t = (i - word_start) as f32 / word_samples as f32;
        let factor = 1.0 + rise * t * t;
        buffer[i] = saturate(buffer[i] as f32 * factor);
    }
}

/// Pause emitted for a punctuation mark, as a fraction of the word pause.
pub fn punctuation_pause_ms(punct: char, config: &Config) -> f32 {
    match punct {
        ',' => config.word_pause_ms * 0.5,
        ';' | ':' => config.word_pause_ms * 0.7,
        '.' | '?' => config.word_pause_ms * 1.2,
        '!' => config.word_pause_ms * 1.3,
        '-' => 0.0,
        _ => config.word_pause_ms,
    }
}

/// Whether a punctuation mark ends a sentence and resets the word index.
pub fn is_sentence_end(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_counts_words() {
        assert_eq!(ProsodyContext::analyze("").word_count, 0);
        assert_eq!(ProsodyContext::analyze("uma frase curta").word_count, 3);
        assert_eq!(ProsodyContext::analyze("  espaços   extras  ").word_count, 2);
    }

    #[test]
    fn test_analyze_detects_question() {
        let ctx = ProsodyContext::analyze("tudo bem?");
        assert!(ctx.is_question);
        assert!(!ctx.is_exclamation);
        assert_eq!(ctx.pitch_modifier, 1.05);

        // trailing whitespace is ignored
        assert!(ProsodyContext::analyze("tudo bem?  ").is_question);
        // a question mark in the middle does not count
        assert!(!ProsodyContext::analyze("bem? sim").is_question);
    }

    #[test]
    fn test_analyze_detects_exclamation() {
        let ctx = ProsodyContext::analyze("que bom!");
        assert!(ctx.is_exclamation);
        assert!(!ctx.is_question);
        assert_eq!(ctx.pitch_modifier, 1.08);
    }

    #[test]
    fn test_declination_scales_down_later_words() {
        let mut first = vec![10_000i16; 10];
        let mut last = vec![10_000i16; 10];
        apply_declination(&mut first, 0, 5);
        apply_declination(&mut last, 4, 5);
        assert_eq!(first[0], 10_000);
        assert_eq!(last[0], 9_500);
    }

    #[test]
    fn test_declination_skips_single_word() {
        let mut word = vec![10_000i16; 10];
        apply_declination(&mut word, 0, 1);
        assert_eq!(word[0], 10_000);
    }

    #[test]
    fn test_question_intonation_rises_quadratically() {
        let mut buffer = vec![10_000i16; 1000];
        apply_question_intonation(&mut buffer, 0, 0, 1);
        assert_eq!(buffer[0], 10_000);
        let mid = buffer[500];
        let end = buffer[999];
        assert!(mid > 10_000);
        assert!(end > mid);
        // rise tops out near +15%
        assert!((end as f32 - 11_500.0).abs() < 60.0, "end = {}", end);
        // mid-point: 1 + 0.15 * 0.25
        assert!((mid as f32 - 10_375.0).abs() < 60.0, "mid = {}", mid);
    }

    #[test]
    fn test_question_intonation_only_last_two_words() {
        let mut buffer = vec![10_000i16; 1000];
        apply_question_intonation(&mut buffer, 0, 0, 5);
        assert!(buffer.iter().all(|&s| s == 10_000));

        let mut buffer = vec![10_000i16; 1000];
        apply_question_intonation(&mut buffer, 0, 3, 5);
        assert!(buffer[999] > 10_000); // penultimate word rises at 0.08
        assert!((buffer[999] as f32 - 10_800.0).abs() < 60.0);
    }

    #[test]
    fn test_question_intonation_skips_tiny_words() {
        let mut buffer = vec![10_000i16; 50];
        apply_question_intonation(&mut buffer, 0, 0, 1);
        assert!(buffer.iter().all(|&s| s == 10_000));
    }

    #[test]
    fn test_punctuation_pauses() {
        let cfg = Config::default(); // word pause 120 ms
        assert_eq!(punctuation_pause_ms(',', &cfg), 60.0);
        assert_eq!(punctuation_pause_ms(';', &cfg), 84.0);
        assert_eq!(punctuation_pause_ms(':', &cfg), 84.0);
        assert_eq!(punctuation_pause_ms('.', &cfg), 144.0);
        assert_eq!(punctuation_pause_ms('!', &cfg), 156.0);
        assert_eq!(punctuation_pause_ms('?', &cfg), 144.0);
        assert_eq!(punctuation_pause_ms('-', &cfg), 0.0);
    }

    #[test]
    fn test_sentence_enders() {
        assert!(is_sentence_end('.'));
        assert!(is_sentence_end('!'));
        assert!(is_sentence_end('?'));
        assert!(!is_sentence_end(','));
        assert!(!is_sentence_end('-'));
    }
}
