//! The output sample buffer and the crossfade append policy.
//!
//! Units are joined with complementary raised-cosine gain curves so the sum
//! of both gains is 1 at every point of the overlap. The crossfade duration
//! is not fixed: it adapts to the phoneme classes meeting at the boundary —
//! a plosive attack would be destroyed by a long fade, while two vowels can
//! blend over most of a syllable.

use std::f32::consts::PI;

use crate::config::Config;
use crate::dsp;
use crate::phoneme::Phoneme;

/// Crossfade duration in milliseconds for a transition from a unit ending
/// in `prev_end` into a unit starting with `next_start`.
pub fn adaptive_crossfade_ms(prev_end: Phoneme, next_start: Phoneme, config: &Config) -> f32 {
    let base = config.crossfade_ms;

    // Plosives first: the burst must survive the join.
    if next_start == Phoneme::Plosive {
        return base * 0.2;
    }
    if prev_end == Phoneme::Plosive {
        return base * 0.3;
    }
    if next_start == Phoneme::Fricative || prev_end == Phoneme::Fricative {
        return base * 0.4;
    }
    if prev_end == Phoneme::Vowel && next_start == Phoneme::Vowel {
        return config.crossfade_vowel_ms;
    }
    if prev_end == Phoneme::Vowel {
        return base * config.vowel_to_consonant_factor;
    }
    if prev_end == Phoneme::Nasal
        || prev_end == Phoneme::Liquid
        || next_start == Phoneme::Nasal
        || next_start == Phoneme::Liquid
    {
        return base * 0.7;
    }
    base
}

/// The growing synthesis output buffer.
pub struct SampleBuffer {
    data: Vec<i16>,
}

impl SampleBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn samples(&self) -> &[i16] {
        &self.data
    }

    pub fn samples_mut(&mut self) -> &mut [i16] {
        &mut self.data
    }

    pub fn truncate(&mut self, len: usize) {
        self.data.truncate(len);
    }

    pub fn into_samples(self) -> Vec<i16> {
        self.data
    }

    /// Append zeros.
    pub fn append_silence(&mut self, count: usize) {
        self.data.resize(self.data.len() + count, 0);
    }

    /// Fade out the current end of the buffer.
    pub fn fade_out_tail(&mut self, fade: usize) {
        dsp::fade_out(&mut self.data, fade);
    }

    /// Append a processed unit.
    ///
    /// The first unit of a word (or of the whole utterance) gets a fade-in
    /// and is appended verbatim; inside a word the unit is crossfaded over
    /// `k = min(crossfade, buffer, unit)` samples, the mix overwriting the
    /// buffer tail. DC removal happens here so it applies to exactly the
    /// samples being joined.
    pub fn append_unit(
        &mut self,
        mut unit: Vec<i16>,
        crossfade: usize,
        fade_in: usize,
        remove_dc: bool,
        after_word_boundary: bool,
    ) {
        if unit.is_empty() {
            return;
        }
        if remove_dc {
            dsp::remove_dc(&mut unit);
        }

        if self.data.is_empty() || after_word_boundary {
            dsp::fade_in(&mut unit, fade_in);
            self.data.extend_from_slice(&unit);
            return;
        }
        if crossfade == 0 {
            self.data.extend_from_slice(&unit);
            return;
        }

        let k = crossfade.min(self.data.len()).min(unit.len());
        let start = self.data.len() - k;
        for i in 0..k {
            let t = i as f32 / k as f32;
            let prev_gain = 0.5 * (1.0 + (PI * t).cos());
            let next_gain = 0.5 * (1.0 - (PI * t).cos());
            let mixed =
                (self.data[start + i] as f32 * prev_gain + unit[i] as f32 * next_gain) as i32;
            self.data[start + i] = mixed.clamp(-32768, 32767) as i16;
        }
        self.data.extend_from_slice(&unit[k..]);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::default()
    }

    #[test]
    fn test_adaptive_crossfade_plosives_shortest() {
        let cfg = config();
        assert_eq!(
            adaptive_crossfade_ms(Phoneme::Vowel, Phoneme::Plosive, &cfg),
            cfg.crossfade_ms * 0.2
        );
        assert_eq!(
            adaptive_crossfade_ms(Phoneme::Plosive, Phoneme::Vowel, &cfg),
            cfg.crossfade_ms * 0.3
        );
    }

    #[test]
    fn test_adaptive_crossfade_classes() {
        let cfg = config();
        assert_eq!(
            adaptive_crossfade_ms(Phoneme::Fricative, Phoneme::Vowel, &cfg),
            cfg.crossfade_ms * 0.4
        );
        assert_eq!(
            adaptive_crossfade_ms(Phoneme::Vowel, Phoneme::Vowel, &cfg),
            cfg.crossfade_vowel_ms
        );
        assert_eq!(
            adaptive_crossfade_ms(Phoneme::Vowel, Phoneme::Nasal, &cfg),
            cfg.crossfade_ms * cfg.vowel_to_consonant_factor
        );
        assert_eq!(
            adaptive_crossfade_ms(Phoneme::Liquid, Phoneme::Other, &cfg),
            cfg.crossfade_ms * 0.7
        );
        assert_eq!(
            adaptive_crossfade_ms(Phoneme::Other, Phoneme::Other, &cfg),
            cfg.crossfade_ms
        );
    }

    #[test]
    fn test_plosive_beats_vowel_rule() {
        let cfg = config();
        // vowel → plosive is a plosive transition, not a vowel-to-consonant one
        assert_eq!(
            adaptive_crossfade_ms(Phoneme::Vowel, Phoneme::Plosive, &cfg),
            cfg.crossfade_ms * 0.2
        );
    }

    #[test]
    fn test_first_unit_gets_fade_in() {
        let mut buf = SampleBuffer::with_capacity(0);
        buf.append_unit(vec![10_000; 100], 50, 10, false, false);
        assert_eq!(buf.len(), 100);
        assert_eq!(buf.samples()[0], 0);
        assert_eq!(buf.samples()[50], 10_000);
    }

    #[test]
    fn test_word_boundary_forces_fade_in() {
        let mut buf = SampleBuffer::with_capacity(0);
        buf.append_unit(vec![10_000; 100], 0, 0, false, false);
        buf.append_unit(vec![10_000; 100], 50, 10, false, true);
        // no overlap: both units appended whole
        assert_eq!(buf.len(), 200);
        assert_eq!(buf.samples()[100], 0);
    }

    #[test]
    fn test_crossfade_overlaps() {
        let mut buf = SampleBuffer::with_capacity(0);
        buf.append_unit(vec![8000; 100], 0, 0, false, false);
        buf.append_unit(vec![-8000; 100], 40, 0, false, false);
        // 40 samples of overlap
        assert_eq!(buf.len(), 160);
        // at t=0 the old signal dominates fully
        assert_eq!(buf.samples()[60], 8000);
        // midway the complementary gains cancel the opposing signals
        let mid = buf.samples()[80].abs();
        assert!(mid < 1000, "mid-fade sample {} should be near zero", mid);
        // past the overlap only the new signal remains
        assert_eq!(buf.samples()[120], -8000);
    }

    #[test]
    fn test_crossfade_clamped_to_unit_length() {
        let mut buf = SampleBuffer::with_capacity(0);
        buf.append_unit(vec![1000; 10], 0, 0, false, false);
        buf.append_unit(vec![1000; 5], 100, 0, false, false);
        assert_eq!(buf.len(), 10);
    }

    #[test]
    fn test_append_dc_removal() {
        let mut buf = SampleBuffer::with_capacity(0);
        buf.append_unit(vec![600; 50], 0, 0, true, true);
        // constant offset collapses to zero
        assert!(buf.samples().iter().all(|&s| s == 0));
    }

    #[test]
    fn test_silence_and_empty_unit() {
        let mut buf = SampleBuffer::with_capacity(16);
        buf.append_unit(Vec::new(), 10, 10, true, false);
        assert!(buf.is_empty());
        buf.append_silence(25);
        assert_eq!(buf.len(), 25);
        assert!(buf.samples().iter().all(|&s| s == 0));
    }
}
