//! The synthesis engine: one handle over a unit database, a configuration,
//! and a normalization ruleset.
//!
//! `synthesize` is a single left-to-right walk over the folded text. Word
//! boundaries close out the current word (silence compression, declination,
//! question intonation), punctuation inserts scaled pauses, and everything
//! else goes through the unit selector and the crossfading concatenator.
//! The whole utterance is assembled before the optional time stretch runs.

use std::path::Path;
use std::time::Instant;

use crate::concat::{adaptive_crossfade_ms, SampleBuffer};
use crate::config::Config;
use crate::dsp::{self, ms_to_samples};
use crate::error::Result;
use crate::phoneme::{classify_first, classify_last, Phoneme};
use crate::pitch;
use crate::prosody::{self, ProsodyContext};
use crate::rules::Ruleset;
use crate::segment::select_next;
use crate::store::UnitStore;
use crate::text;
use crate::wav;

/// Target RMS every unit is normalised to before joining, in linear 16-bit
/// units.
const TARGET_RMS: f32 = 3000.0;

/// Initial output buffer capacity, in seconds of audio.
const INITIAL_BUFFER_SECS: usize = 10;

/// A synthesized utterance.
pub struct Synthesis {
    /// Mono 16-bit PCM at the database sample rate.
    pub samples: Vec<i16>,
    /// Units matched in the database.
    pub units_found: u32,
    /// Characters stepped over with unknown-silence.
    pub units_missing: u32,
}

/// A text-to-speech engine bound to one unit database.
pub struct Engine {
    store: UnitStore,
    config: Config,
    rules: Ruleset,
}

impl Engine {
    /// Open a database and create an engine with default configuration and
    /// no normalization rules.
    pub fn open(database: &Path) -> Result<Self> {
        let store = UnitStore::open(database)?;
        log::info!(
            "loaded database with {} units (max {} chars)",
            store.unit_count(),
            store.max_unit_chars()
        );
        Ok(Self {
            store,
            config: Config::default(),
            rules: Ruleset::empty(),
        })
    }

    pub fn store(&self) -> &UnitStore {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn set_config(&mut self, config: Config) {
        self.config = config;
    }

    pub fn set_rules(&mut self, rules: Ruleset) {
        self.rules = rules;
    }

    /// Synthesize `input` into a waveform. `speed` is clamped to the
    /// configured range; `1.0` skips the time-stretch pass entirely.
    pub fn synthesize(&self, input: &str, speed: f32) -> Result<Synthesis> {
        let started = Instant::now();
        let sr = self.store.header().sample_rate;
        let cfg = &self.config;

        // Prosody looks at the raw text; punctuation is still present here.
        let context = ProsodyContext::analyze(input);
        let folded = text::prepare(input, &self.rules);

        let mut buf = SampleBuffer::with_capacity(sr as usize * INITIAL_BUFFER_SECS);
        let word_pause = ms_to_samples(cfg.word_pause_ms, sr);
        let unknown_silence = ms_to_samples(cfg.unknown_silence_ms, sr);
        let fade_in = ms_to_samples(cfg.fade_in_ms, sr);
        let fade_out = ms_to_samples(cfg.fade_out_ms, sr);

        let mut units_found = 0u32;
        let mut units_missing = 0u32;

        // Per-word state.
        let mut at_word_start = true;
        let mut prev_unit: Option<(Phoneme, Option<char>)> = None;
        let mut word_index = 0usize;
        let mut word_start = 0usize;

        let mut pos = 0usize;
        let bytes = folded.as_bytes();
        while pos < bytes.len() {
            match bytes[pos] {
                b' ' | b'\t' | b'\n' | b'\r' => {
                    self.finish_word(&mut buf, word_start, word_index, &context);
                    if !buf.is_empty() {
                        buf.fade_out_tail(fade_out);
                    }
                    buf.append_silence(word_pause);
                    word_start = buf.len();
                    word_index += 1;
                    at_word_start = true;
                    prev_unit = None;
                    pos += 1;
                }
                // Soft separator: no pause, and the crossfade state carries
                // across so a hiatus flows as one word.
                b'-' => {
                    pos += 1;
                }
                p @ (b',' | b';' | b':' | b'.' | b'!' | b'?') => {
                    let punct = p as char;
                    self.finish_word(&mut buf, word_start, word_index, &context);
                    if !buf.is_empty() {
                        buf.fade_out_tail(fade_out);
                    }
                    let pause_ms = prosody::punctuation_pause_ms(punct, cfg);
                    buf.append_silence(ms_to_samples(pause_ms, sr));
                    if prosody::is_sentence_end(punct) {
                        word_index = 0;
                    }
                    word_start = buf.len();
                    at_word_start = true;
                    pos += 1;
                }
                b'(' | b')' | b'[' | b']' | b'"' | b'\'' | b'`' => {
                    pos += 1;
                }
                _ => {
                    let selection =
                        select_next(&self.store, &folded, pos, at_word_start, self.store.max_unit_chars());
                    match selection {
                        Some(sel) => {
                            let unit_text = self.store.unit_text(sel.unit);
                            if cfg.print_units {
                                log::debug!("unit [{}]", unit_text);
                            }
                            let start_phoneme = classify_first(unit_text);
                            let end_phoneme = classify_last(unit_text);
                            let last_char = unit_text.chars().last();

                            let crossfade_ms = match (&prev_unit, at_word_start) {
                                (Some((prev_end, prev_last)), false) => {
                                    let mut ms =
                                        adaptive_crossfade_ms(*prev_end, start_phoneme, cfg);
                                    // Sibilant and rhotic endings smear badly
                                    // over long fades; clamp them.
                                    match prev_last {
                                        Some('s') | Some('S') => {
                                            ms = ms.min(cfg.crossfade_s_ending_ms)
                                        }
                                        Some('r') | Some('R') => {
                                            ms = ms.min(cfg.crossfade_r_ending_ms)
                                        }
                                        _ => {}
                                    }
                                    ms
                                }
                                _ => cfg.crossfade_ms,
                            };
                            let crossfade = ms_to_samples(crossfade_ms, sr);

                            let mut samples = self.store.unit_samples(sel.unit);
                            dsp::normalize_rms(&mut samples, TARGET_RMS);
                            if !at_word_start && !buf.is_empty() {
                                pitch::smooth_boundary(buf.samples(), &mut samples, crossfade, sr);
                                dsp::match_boundary_energy(buf.samples(), &mut samples, crossfade);
                            }
                            buf.append_unit(
                                samples,
                                crossfade,
                                fade_in,
                                cfg.remove_dc_offset,
                                at_word_start,
                            );

                            prev_unit = Some((end_phoneme, last_char));
                            at_word_start = false;
                            units_found += 1;
                            pos += sel.advance;
                        }
                        None => {
                            buf.append_silence(unknown_silence);
                            units_missing += 1;
                            prev_unit = None;
                            let step = folded[pos..]
                                .chars()
                                .next()
                                .map(|c| c.len_utf8())
                                .unwrap_or(1);
                            pos += step;
                        }
                    }
                }
            }
        }

        // Close out the final word and fade the utterance tail.
        self.finish_word(&mut buf, word_start, word_index, &context);
        if !buf.is_empty() {
            buf.fade_out_tail(fade_out);
        }

        let samples = if speed != 1.0 {
            crate::stretch::time_stretch(buf.samples(), speed)
        } else {
            buf.into_samples()
        };

        if cfg.print_timing {
            log::info!(
                "synthesized {} samples in {:.1} ms",
                samples.len(),
                started.elapsed().as_secs_f64() * 1000.0
            );
        }

        Ok(Synthesis {
            samples,
            units_found,
            units_missing,
        })
    }

    /// Synthesize and write straight to a 16-bit mono WAV file.
    pub fn synthesize_to_wav(&self, input: &str, output: &Path, speed: f32) -> Result<Synthesis> {
        let result = self.synthesize(input, speed)?;
        wav::write_wav(output, &result.samples, self.store.header().sample_rate)?;
        Ok(result)
    }

    /// Word-completion pass over `buf[word_start..]`: compress in-word
    /// silences, then shape the word with declination and, for questions,
    /// the final rise.
    fn finish_word(
        &self,
        buf: &mut SampleBuffer,
        word_start: usize,
        word_index: usize,
        context: &ProsodyContext,
    ) {
        let cfg = &self.config;
        let sr = self.store.header().sample_rate;

        if cfg.remove_word_silence && buf.len() > word_start {
            let min_run = ms_to_samples(cfg.min_silence_ms, sr);
            let region = &mut buf.samples_mut()[word_start..];
            if region.len() > min_run {
                let kept = dsp::compress_silence(region, cfg.silence_threshold, min_run);
                buf.truncate(word_start + kept);
            }
        }

        if buf.len() > word_start {
            prosody::apply_declination(
                &mut buf.samples_mut()[word_start..],
                word_index,
                context.word_count,
            );
            if context.is_question {
                prosody::apply_question_intonation(
                    buf.samples_mut(),
                    word_start,
                    word_index,
                    context.word_count,
                );
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
