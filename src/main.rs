//! Command-line driver: `build` a unit database, `synth` an utterance.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use falante::config::{MAX_SPEED, MIN_SPEED};
use falante::{builder, Config, Engine, Ruleset, SAMPLE_RATE};

#[derive(Parser)]
#[command(name = "falante", version, about = "Concatenative Portuguese text-to-speech")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build a unit database from a dataset directory.
    ///
    /// Expects `<dataset_dir>/letters/wavs/*.wav` with `letters/letters.txt`
    /// and `<dataset_dir>/syllables/wavs/*.wav` with
    /// `syllables/sillabes.txt`, each index line `filename|text|display`.
    Build {
        dataset_dir: PathBuf,
        output: PathBuf,
    },
    /// Synthesize speech from text into a WAV file.
    Synth {
        database: PathBuf,
        text: String,
        output: PathBuf,
        /// Playback speed, 0.5 to 2.0. Defaults to the config's
        /// default_speed when omitted.
        speed: Option<f32>,
    },
}

fn main() {
    env_logger::init();
    if let Err(err) = run(Cli::parse()) {
        match err.downcast_ref::<falante::Error>() {
            Some(e) => eprintln!("error ({}): {:#}", e.code(), err),
            None => eprintln!("error: {:#}", err),
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Build { dataset_dir, output } => {
            let letters_dir = dataset_dir.join("letters/wavs");
            let letters_index = dataset_dir.join("letters/letters.txt");
            let syllables_dir = dataset_dir.join("syllables/wavs");
            let syllables_index = dataset_dir.join("syllables/sillabes.txt");

            let summary = builder::build_database(
                &letters_dir,
                &letters_index,
                &syllables_dir,
                &syllables_index,
                &output,
            )
            .context("build failed")?;

            println!("Database written to {}", output.display());
            println!("  Units: {}", summary.unit_count);
            println!("  Max unit length: {} characters", summary.max_unit_chars);
            println!("  Total audio samples: {}", summary.total_samples);
            Ok(())
        }
        Command::Synth {
            database,
            text,
            output,
            speed,
        } => {
            let mut engine = Engine::open(&database)
                .with_context(|| format!("cannot load database {}", database.display()))?;
            let config = Config::load(std::path::Path::new("config.yaml"));
            engine.set_rules(Ruleset::load(std::path::Path::new("normalization.csv")));

            // An explicit CLI speed wins; otherwise a non-default config
            // speed applies.
            let speed = match speed {
                Some(s) => s.clamp(MIN_SPEED, MAX_SPEED),
                None if config.default_speed != 1.0 => {
                    config.default_speed.clamp(MIN_SPEED, MAX_SPEED)
                }
                None => 1.0,
            };

            println!("Loaded database with {} units", engine.store().unit_count());
            println!(
                "Config: crossfade={:.1}ms (vowel={:.1}ms, v2c={:.0}%), word_pause={:.1}ms",
                config.crossfade_ms,
                config.crossfade_vowel_ms,
                config.vowel_to_consonant_factor * 100.0,
                config.word_pause_ms
            );
            engine.set_config(config);

            let result = engine
                .synthesize_to_wav(&text, &output, speed)
                .context("synthesis failed")?;

            println!(
                "Synthesized {} samples ({:.2} seconds)",
                result.samples.len(),
                result.samples.len() as f32 / SAMPLE_RATE as f32
            );
            println!(
                "Units found: {}, missing: {}",
                result.units_found, result.units_missing
            );
            println!("Written to {}", output.display());
            Ok(())
        }
    }
}
