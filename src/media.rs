use anyhow::{ensure, Context, Result};
use log::{debug, warn};
use serde::Serialize;
use std::path::Path;

/// Sample rate speech recognizers expect.
pub const SPEECH_SAMPLE_RATE: u32 = 16_000;
pub const CHUNK_MS: u64 = 15_000;
pub const CHUNK_OVERLAP_MS: u64 = 2_000;
const MIN_CHUNK_MS: u64 = 1_000;
const SLICE_MS: u64 = 1_000;

/// dBFS reported for digital silence.
pub const SILENCE_FLOOR_DB: f64 = -96.0;
const QUIET_DB: f64 = -30.0;
const NORMALIZE_HEADROOM_DB: f64 = 0.1;
const FULL_SCALE: f64 = 32_768.0;

/// Runs ffmpeg and fails with its stderr when it exits non-zero.
pub async fn run_ffmpeg(ffmpeg: &str, args: &[&str]) -> Result<()> {
    let output = tokio::process::Command::new(ffmpeg)
        .args(args)
        .output()
        .await
        .with_context(|| format!("failed to launch {ffmpeg}"))?;

    debug!("ffmpeg stdout: {}", String::from_utf8_lossy(&output.stdout));
    debug!("ffmpeg stderr: {}", String::from_utf8_lossy(&output.stderr));

    ensure!(
        output.status.success(),
        "FFmpeg error: {}",
        String::from_utf8_lossy(&output.stderr).trim()
    );
    Ok(())
}

/// Extracts a 16 kHz mono 16-bit PCM WAV track from a video file.
pub async fn extract_audio(ffmpeg: &str, video: &Path, wav: &Path) -> Result<()> {
    let video = video.to_string_lossy();
    let wav = wav.to_string_lossy();
    let rate = SPEECH_SAMPLE_RATE.to_string();
    let args = [
        "-i",
        &*video,
        "-acodec",
        "pcm_s16le",
        "-ar",
        rate.as_str(),
        "-ac",
        "1",
        &*wav,
        "-y",
    ];
    run_ffmpeg(ffmpeg, &args).await
}

/// Reports whether the configured ffmpeg binary can be launched.
pub async fn check_ffmpeg(ffmpeg: &str) -> bool {
    match tokio::process::Command::new(ffmpeg)
        .arg("-version")
        .output()
        .await
    {
        Ok(output) if output.status.success() => true,
        Ok(output) => {
            warn!("{ffmpeg} -version exited with {}", output.status);
            false
        }
        Err(err) => {
            warn!("FFmpeg not found ({ffmpeg}): {err}");
            false
        }
    }
}

/// `M:SS` for an offset in milliseconds.
pub fn format_offset(ms: u64) -> String {
    let total_secs = ms / 1000;
    format!("{}:{:02}", total_secs / 60, total_secs % 60)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AudioAnalysis {
    pub duration: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub volume_db: f64,
    pub is_quiet: bool,
    pub speech_ratio: f64,
    pub has_potential_speech: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan {
    pub start_ms: u64,
    pub end_ms: u64,
}

/// Overlapping windows covering a recording. Tails of a second or less are dropped.
pub fn chunk_plan(duration_ms: u64) -> Vec<ChunkSpan> {
    let step = (CHUNK_MS - CHUNK_OVERLAP_MS) as usize;
    (0..duration_ms)
        .step_by(step)
        .map(|start_ms| ChunkSpan {
            start_ms,
            end_ms: (start_ms + CHUNK_MS).min(duration_ms),
        })
        .filter(|span| span.end_ms - span.start_ms > MIN_CHUNK_MS)
        .collect()
}

fn dbfs(samples: &[i16]) -> f64 {
    if samples.is_empty() {
        return SILENCE_FLOOR_DB;
    }
    let mean_square =
        samples.iter().map(|&s| f64::from(s).powi(2)).sum::<f64>() / samples.len() as f64;
    let rms = mean_square.sqrt();
    if rms == 0.0 {
        return SILENCE_FLOOR_DB;
    }
    (20.0 * (rms / FULL_SCALE).log10()).max(SILENCE_FLOOR_DB)
}

fn apply_gain(samples: &[i16], gain_db: f64) -> Vec<i16> {
    let factor = 10f64.powf(gain_db / 20.0);
    samples
        .iter()
        .map(|&s| (f64::from(s) * factor).round().clamp(-FULL_SCALE, FULL_SCALE - 1.0) as i16)
        .collect()
}

/// Interleaved 16-bit PCM audio held in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioClip {
    pub fn read_wav(path: &Path) -> Result<Self> {
        let mut reader = hound::WavReader::open(path)
            .with_context(|| format!("cannot open {}", path.display()))?;
        let spec = reader.spec();
        ensure!(
            spec.bits_per_sample == 16 && spec.sample_format == hound::SampleFormat::Int,
            "expected 16-bit PCM audio, got {} bits",
            spec.bits_per_sample
        );
        let samples = reader.samples::<i16>().collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    pub fn write_wav(&self, path: &Path) -> Result<()> {
        let spec = hound::WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec)?;
        for &sample in &self.samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
        Ok(())
    }

    fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels.max(1))
    }

    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.frames() as u64 * 1000 / u64::from(self.sample_rate)
    }

    fn sample_index(&self, ms: u64) -> usize {
        let frame = (ms * u64::from(self.sample_rate) / 1000) as usize;
        (frame * usize::from(self.channels.max(1))).min(self.samples.len())
    }

    pub fn slice_ms(&self, start_ms: u64, end_ms: u64) -> AudioClip {
        let start = self.sample_index(start_ms);
        let end = self.sample_index(end_ms).max(start);
        AudioClip {
            sample_rate: self.sample_rate,
            channels: self.channels,
            samples: self.samples[start..end].to_vec(),
        }
    }

    pub fn volume_db(&self) -> f64 {
        dbfs(&self.samples)
    }

    fn peak_db(&self) -> f64 {
        let peak = self
            .samples
            .iter()
            .map(|&s| i32::from(s).unsigned_abs())
            .max()
            .unwrap_or(0);
        if peak == 0 {
            return SILENCE_FLOOR_DB;
        }
        20.0 * (f64::from(peak) / FULL_SCALE).log10()
    }

    /// Loudness diagnostics used to warn about clips unlikely to transcribe.
    pub fn analyze(&self) -> AudioAnalysis {
        let volume_db = self.volume_db();
        let is_quiet = volume_db < QUIET_DB;
        // A second counts as active when it is within 10 dB of the clip average.
        let threshold = volume_db - 10.0;

        let duration_ms = self.duration_ms();
        let mut slices = 0usize;
        let mut loud = 0usize;
        let mut start = 0;
        while start < duration_ms {
            let slice = self.slice_ms(start, (start + SLICE_MS).min(duration_ms));
            let level = slice.volume_db();
            if level > SILENCE_FLOOR_DB && level > threshold {
                loud += 1;
            }
            slices += 1;
            start += SLICE_MS;
        }
        let speech_ratio = loud as f64 / slices.max(1) as f64;

        AudioAnalysis {
            duration: duration_ms as f64 / 1000.0,
            sample_rate: self.sample_rate,
            channels: self.channels,
            volume_db,
            is_quiet,
            speech_ratio,
            has_potential_speech: speech_ratio > 0.1 && !is_quiet,
        }
    }

    /// Peak-normalises the clip, then lifts it further if it is still quiet.
    pub fn enhance(&self) -> AudioClip {
        let peak_db = self.peak_db();
        if peak_db <= SILENCE_FLOOR_DB {
            return self.clone();
        }
        let mut samples = apply_gain(&self.samples, -NORMALIZE_HEADROOM_DB - peak_db);
        let volume = dbfs(&samples);
        if volume < -20.0 {
            samples = apply_gain(&samples, volume.abs() - 10.0);
        }
        AudioClip {
            sample_rate: self.sample_rate,
            channels: self.channels,
            samples,
        }
    }

    pub fn pcm_le_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(amplitude: i16, samples: usize) -> Vec<i16> {
        (0..samples)
            .map(|i| if i % 2 == 0 { amplitude } else { -amplitude })
            .collect()
    }

    fn clip(samples: Vec<i16>) -> AudioClip {
        AudioClip {
            sample_rate: 1_000,
            channels: 1,
            samples,
        }
    }

    #[test]
    fn chunk_plan_overlaps_and_drops_short_tails() {
        let spans = chunk_plan(40_000);
        let starts: Vec<(u64, u64)> = spans.iter().map(|s| (s.start_ms, s.end_ms)).collect();
        assert_eq!(starts, vec![(0, 15_000), (13_000, 28_000), (26_000, 40_000)]);
        assert_eq!(chunk_plan(30_000).last().unwrap().end_ms, 30_000);
        assert!(chunk_plan(900).is_empty());
    }

    #[test]
    fn offsets_format_as_minutes_and_seconds() {
        assert_eq!(format_offset(0), "0:00");
        assert_eq!(format_offset(13_000), "0:13");
        assert_eq!(format_offset(125_500), "2:05");
    }

    #[test]
    fn silence_is_quiet_with_no_speech() {
        let analysis = clip(vec![0; 5_000]).analyze();
        assert_eq!(analysis.volume_db, SILENCE_FLOOR_DB);
        assert!(analysis.is_quiet);
        assert_eq!(analysis.speech_ratio, 0.0);
        assert!(!analysis.has_potential_speech);
        assert_eq!(analysis.duration, 5.0);
    }

    #[test]
    fn loud_seconds_count_towards_speech_ratio() {
        // one loud second followed by nineteen silent ones
        let mut samples = square(16_384, 1_000);
        samples.extend(vec![0; 19_000]);
        let analysis = clip(samples).analyze();
        assert!(!analysis.is_quiet);
        assert!((analysis.speech_ratio - 0.05).abs() < 1e-9);
        assert!(!analysis.has_potential_speech);
    }

    #[test]
    fn steady_signal_has_potential_speech() {
        let mut samples = square(8_000, 3_000);
        samples.extend(vec![0; 7_000]);
        let analysis = clip(samples).analyze();
        assert!((analysis.speech_ratio - 0.3).abs() < 1e-9);
        assert!(analysis.has_potential_speech);
    }

    #[test]
    fn enhance_normalises_to_just_below_full_scale() {
        let enhanced = clip(square(1_000, 2_000)).enhance();
        let peak = enhanced.samples.iter().map(|s| s.unsigned_abs()).max().unwrap();
        assert!((32_000..=32_767).contains(&peak), "peak was {peak}");
    }

    #[test]
    fn wav_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunk.wav");
        let original = AudioClip {
            sample_rate: SPEECH_SAMPLE_RATE,
            channels: 1,
            samples: square(1_234, 1_600),
        };
        original.write_wav(&path).unwrap();
        let loaded = AudioClip::read_wav(&path).unwrap();
        assert_eq!(loaded, original);
        assert_eq!(loaded.duration_ms(), 100);
        assert_eq!(loaded.slice_ms(50, 100).samples.len(), 800);
    }
}
