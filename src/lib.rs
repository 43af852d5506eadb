//! # falante
//!
//! Concatenative text-to-speech for Portuguese.
//!
//! The engine selects pre-recorded letter and syllable units from a compact
//! memory-mapped database, joins them with phoneme-aware crossfades, shapes
//! the result with simple prosody, and optionally time-stretches the whole
//! utterance. A companion builder assembles the database from per-unit WAV
//! recordings.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::path::Path;
//! use falante::{Engine, Config, Ruleset};
//!
//! let mut engine = Engine::open(Path::new("voz.db")).unwrap();
//! engine.set_config(Config::load(Path::new("config.yaml")));
//! engine.set_rules(Ruleset::load(Path::new("normalization.csv")));
//!
//! // Mono 16-bit PCM at 22050 Hz
//! let result = engine.synthesize("Bom dia, tenho 2 gatos!", 1.0).unwrap();
//! println!("{} samples", result.samples.len());
//!
//! // Or write straight to disk
//! engine.synthesize_to_wav("Até logo", Path::new("out.wav"), 1.0).unwrap();
//! ```
//!
//! ## Pipeline
//! 1. **Text front-end** — numbers spelled out in Portuguese, normalization
//!    rules applied, case/diacritic fold onto the database alphabet.
//! 2. **Unit selection** — greedy longest-match with Portuguese phonotactic
//!    scoring and one-step look-ahead.
//! 3. **Concatenation** — per-unit RMS normalisation, pitch smoothing and
//!    energy matching at boundaries, adaptive raised-cosine crossfades.
//! 4. **Prosody** — declination across the utterance, question intonation,
//!    punctuation pauses.
//! 5. **Time stretch** — optional overlap-add speed change in `[0.5, 2.0]`.

pub mod builder;
pub mod concat;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod phoneme;
pub mod phonotactics;
pub mod pitch;
pub mod prosody;
pub mod rules;
pub mod segment;
pub mod store;
pub mod stretch;
pub mod text;
pub mod wav;

// ─── Re-exports for convenience ─────────────────────────────────────────────

pub use config::Config;
pub use engine::{Engine, Synthesis};
pub use error::{Error, Result};
pub use rules::Ruleset;
pub use store::UnitStore;

/// Audio sample rate of every database and synthesized waveform.
pub use store::SAMPLE_RATE;
