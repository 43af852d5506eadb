//! Sample-level signal processing shared by the concatenator and the
//! prosody stages.
//!
//! Everything operates on 16-bit integer samples in place and saturates
//! instead of wrapping.

use std::f32::consts::PI;

/// Milliseconds to a sample count at `sample_rate`, truncating.
pub fn ms_to_samples(ms: f32, sample_rate: u32) -> usize {
    (ms * sample_rate as f32 / 1000.0) as usize
}

/// Clamp and narrow an intermediate value to a sample.
pub fn saturate(value: f32) -> i16 {
    value.clamp(-32768.0, 32767.0) as i16
}

/// Root-mean-square amplitude.
pub fn rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_sq / samples.len() as f64).sqrt() as f32
}

/// Scale samples so their RMS approaches `target`. The gain is clamped to
/// `[0.1, 3.0]` and near-silent input (RMS below 1) is left untouched.
pub fn normalize_rms(samples: &mut [i16], target: f32) {
    if samples.is_empty() || target <= 0.0 {
        return;
    }
    let current = rms(samples);
    if current < 1.0 {
        return;
    }
    let gain = (target / current).clamp(0.1, 3.0);
    for s in samples.iter_mut() {
        *s = saturate(*s as f32 * gain);
    }
}

/// Ramp the start of `next` so its boundary energy continues from the tail
/// of `prev`. The gain slides linearly from the clamped RMS ratio down to
/// unity across the boundary window.
pub fn match_boundary_energy(prev: &[i16], next: &mut [i16], crossfade: usize) {
    if crossfade == 0 || prev.is_empty() || next.is_empty() {
        return;
    }
    let boundary = crossfade.min(prev.len()).min(next.len());
    let prev_rms = rms(&prev[prev.len() - boundary..]);
    let next_rms = rms(&next[..boundary]);
    if prev_rms < 1.0 || next_rms < 1.0 {
        return;
    }
    let ratio = (prev_rms / next_rms).clamp(0.5, 2.0);
    for i in 0..boundary {
        let t = i as f32 / boundary as f32;
        let gain = ratio * (1.0 - t) + t;
        next[i] = saturate(next[i] as f32 * gain);
    }
}

/// Subtract the integer mean from every sample.
pub fn remove_dc(samples: &mut [i16]) {
    if samples.is_empty() {
        return;
    }
    let sum: i64 = samples.iter().map(|&s| s as i64).sum();
    let dc = (sum / samples.len() as i64) as i32;
    for s in samples.iter_mut() {
        *s = (*s as i32 - dc).clamp(-32768, 32767) as i16;
    }
}

/// Quarter-sine fade-in over the first `fade` samples.
pub fn fade_in(samples: &mut [i16], fade: usize) {
    let fade = fade.min(samples.len());
    if fade == 0 {
        return;
    }
    for i in 0..fade {
        let gain = (i as f32 / fade as f32 * PI * 0.5).sin();
        samples[i] = (samples[i] as f32 * gain) as i16;
    }
}

/// Quarter-sine fade-out over the last `fade` samples.
pub fn fade_out(samples: &mut [i16], fade: usize) {
    let fade = fade.min(samples.len());
    if fade == 0 {
        return;
    }
    let start = samples.len() - fade;
    for i in 0..fade {
        let gain = ((fade - i) as f32 / fade as f32 * PI * 0.5).sin();
        samples[start + i] = (samples[start + i] as f32 * gain) as i16;
    }
}

/// Hann window value at position `i` of `n`.
pub fn hann(i: usize, n: usize) -> f32 {
    0.5 * (1.0 - (2.0 * PI * i as f32 / n as f32).cos())
}

/// Compress silent runs in place and return the retained length.
///
/// A sample is silent when its magnitude is at or below
/// `threshold × max|sample|`. Runs of at least `min_run` silent samples are
/// shortened to `max(min_run / 4, 10)` samples; shorter runs survive
/// verbatim. The region beyond the returned length is stale.
pub fn compress_silence(samples: &mut [i16], threshold: f32, min_run: usize) -> usize {
    if samples.is_empty() {
        return 0;
    }
    let max_amp = samples.iter().map(|&s| (s as i32).unsigned_abs()).max().unwrap_or(0);
    if max_amp == 0 {
        return samples.len();
    }
    let abs_threshold = (max_amp as f32 * threshold) as u32;

    let keep = (min_run / 4).max(10);
    let mut write = 0;
    let mut read = 0;
    let count = samples.len();

    while read < count {
        if (samples[read] as i32).unsigned_abs() <= abs_threshold {
            let run_start = read;
            while read < count && (samples[read] as i32).unsigned_abs() <= abs_threshold {
                read += 1;
            }
            let run_len = read - run_start;
            let retained = if run_len >= min_run { keep.min(run_len) } else { run_len };
            for i in 0..retained {
                samples[write] = samples[run_start + i];
                write += 1;
            }
        } else {
            samples[write] = samples[read];
            write += 1;
            read += 1;
        }
    }
    write
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ms_to_samples() {
        assert_eq!(ms_to_samples(1000.0, 22_050), 22_050);
        assert_eq!(ms_to_samples(20.0, 22_050), 441);
        assert_eq!(ms_to_samples(0.0, 22_050), 0);
    }

    #[test]
    fn test_rms() {
        assert_eq!(rms(&[]), 0.0);
        assert_eq!(rms(&[0, 0, 0]), 0.0);
        assert_eq!(rms(&[100, -100, 100, -100]), 100.0);
    }

    #[test]
    fn test_normalize_rms_scales_toward_target() {
        let mut samples = vec![100i16, -100, 100, -100];
        normalize_rms(&mut samples, 3000.0);
        // the 30x gain is clamped at 3.0
        assert_eq!(samples, vec![300, -300, 300, -300]);

        let mut samples = vec![1000i16, -1000];
        normalize_rms(&mut samples, 3000.0);
        assert_eq!(samples, vec![3000, -3000]);
    }

    #[test]
    fn test_normalize_rms_skips_near_silence() {
        let mut samples = vec![0i16, 0, 0, 0];
        normalize_rms(&mut samples, 3000.0);
        assert_eq!(samples, vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_normalize_rms_saturates() {
        let mut samples = vec![20_000i16, -20_000];
        normalize_rms(&mut samples, 60_000.0);
        assert_eq!(samples, vec![32_767, -32_768]);
    }

    #[test]
    fn test_match_boundary_energy_ramps_gain() {
        let prev = vec![8000i16; 100];
        let mut next = vec![2000i16; 100];
        match_boundary_energy(&prev, &mut next, 50);
        // ratio clamps at 2.0; first sample doubled, past the boundary untouched
        assert_eq!(next[0], 4000);
        assert_eq!(next[60], 2000);
        // gain decays toward 1.0 across the window
        assert!(next[49] < next[0]);
        assert!(next[49] >= 2000);
    }

    #[test]
    fn test_remove_dc() {
        let mut samples = vec![110i16, 90, 110, 90];
        remove_dc(&mut samples);
        assert_eq!(samples, vec![10, -10, 10, -10]);
    }

    #[test]
    fn test_fades() {
        let mut samples = vec![10_000i16; 100];
        fade_in(&mut samples, 10);
        assert_eq!(samples[0], 0);
        assert!(samples[5] < 10_000);
        assert_eq!(samples[10], 10_000);

        let mut samples = vec![10_000i16; 100];
        fade_out(&mut samples, 10);
        assert_eq!(samples[89], 10_000);
        assert!(samples[95] < 10_000);
        assert!(samples[99] < samples[95]);
    }

    #[test]
    fn test_fade_longer_than_buffer() {
        let mut samples = vec![10_000i16; 4];
        fade_in(&mut samples, 100);
        assert_eq!(samples[0], 0);
        assert!(samples[3] < 10_000);
    }

    #[test]
    fn test_hann_window() {
        assert!(hann(0, 441).abs() < 1e-6);
        assert!((hann(220, 441) - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_compress_silence_long_run() {
        // loud | 200 silent | loud
        let mut samples = vec![5000i16; 50];
        samples.extend(vec![0i16; 200]);
        samples.extend(vec![5000i16; 50]);
        let min_run = 100;
        let kept = compress_silence(&mut samples, 0.02, min_run);
        // the silent run shrinks to min_run / 4 = 25 samples
        assert_eq!(kept, 50 + 25 + 50);
    }

    #[test]
    fn test_compress_silence_keeps_short_runs() {
        let mut samples = vec![5000i16; 50];
        samples.extend(vec![0i16; 30]);
        samples.extend(vec![5000i16; 50]);
        let kept = compress_silence(&mut samples, 0.02, 100);
        assert_eq!(kept, 130);
    }

    #[test]
    fn test_compress_silence_keep_floor_is_ten() {
        let mut samples = vec![5000i16; 20];
        samples.extend(vec![0i16; 60]);
        samples.extend(vec![5000i16; 20]);
        // min_run 20 → keep = max(5, 10) = 10
        let kept = compress_silence(&mut samples, 0.02, 20);
        assert_eq!(kept, 50);
    }

    #[test]
    fn test_compress_silence_all_quiet() {
        let mut samples = vec![0i16; 500];
        assert_eq!(compress_silence(&mut samples, 0.02, 100), 500);
    }
}
