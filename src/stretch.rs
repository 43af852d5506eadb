//! Global time stretching by windowed overlap-add.
//!
//! Analysis frames are taken at a fixed hop, Hann-windowed, and laid down at
//! a synthesis hop scaled by the speed factor; a parallel accumulator of
//! window sums normalises the overlap afterwards. Descends from the PSOLA
//! family but without pitch marks, which is fine at the modest speed range
//! allowed here.

use once_cell::sync::Lazy;

use crate::config::{MAX_SPEED, MIN_SPEED};
use crate::dsp::hann;

/// 20 ms at 22050 Hz.
const FRAME_SIZE: usize = 441;
const ANALYSIS_HOP: usize = FRAME_SIZE / 4;

/// The analysis/synthesis window, built once.
static WINDOW: Lazy<Vec<f32>> =
    Lazy::new(|| (0..FRAME_SIZE).map(|i| hann(i, FRAME_SIZE)).collect());

/// Stretch `input` to `1/speed` of its duration. Speed is clamped to
/// `[0.5, 2.0]`; inputs shorter than one frame pass through unchanged.
pub fn time_stretch(input: &[i16], speed: f32) -> Vec<i16> {
    let speed = if speed.is_finite() {
        speed.clamp(MIN_SPEED, MAX_SPEED)
    } else {
        1.0
    };
    if input.len() < FRAME_SIZE {
        return input.to_vec();
    }

    let synthesis_hop = (ANALYSIS_HOP as f32 / speed).round() as usize;
    let num_frames = (input.len() - FRAME_SIZE) / ANALYSIS_HOP + 1;
    let out_len = num_frames * synthesis_hop + FRAME_SIZE;

    let window = &*WINDOW;
    let mut acc = vec![0.0f32; out_len];
    let mut norm = vec![0.0f32; out_len];

    let mut analysis = 0;
    let mut synthesis = 0;
    while analysis + FRAME_SIZE <= input.len() && synthesis + FRAME_SIZE <= out_len {
        for i in 0..FRAME_SIZE {
            acc[synthesis + i] += input[analysis + i] as f32 * window[i];
            norm[synthesis + i] += window[i];
        }
        analysis += ANALYSIS_HOP;
        synthesis += synthesis_hop;
    }

    let mut output: Vec<i16> = acc
        .iter()
        .zip(&norm)
        .map(|(&value, &weight)| {
            let v = if weight > 0.01 { value / weight } else { value };
            v.clamp(-32768.0, 32767.0) as i16
        })
        .collect();

    while output.last() == Some(&0) {
        output.pop();
    }
    output
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
