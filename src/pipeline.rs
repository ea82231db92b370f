use anyhow::{anyhow, Context, Result};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::aws::{has_credentials, load_shared_config};
use crate::config::Settings;
use crate::language::Language;
use crate::media::{extract_audio, AudioAnalysis, AudioClip};
use crate::s3_uploader::S3Uploader;
use crate::transcribe::{
    render_lines, transcribe_chunks, CommandRecognizer, SpeechRecognizer, StreamingTranscriber,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingMethod {
    Local,
    Cloud,
}

impl fmt::Display for ProcessingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProcessingMethod::Local => "local",
            ProcessingMethod::Cloud => "cloud",
        })
    }
}

impl FromStr for ProcessingMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(ProcessingMethod::Local),
            "cloud" | "aws" => Ok(ProcessingMethod::Cloud),
            other => Err(anyhow!("unknown processing method: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProcessingOutcome {
    Completed {
        transcript: String,
        method: ProcessingMethod,
        audio_analysis: AudioAnalysis,
    },
    NoSpeech {
        message: String,
        suggestions: Vec<String>,
        audio_analysis: AudioAnalysis,
    },
    Timeout {
        job_name: String,
        message: String,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub local: bool,
    pub cloud: bool,
}

impl Capabilities {
    pub fn supports(&self, method: ProcessingMethod) -> bool {
        match method {
            ProcessingMethod::Local => self.local,
            ProcessingMethod::Cloud => self.cloud,
        }
    }
}

pub struct CloudServices {
    pub uploader: S3Uploader,
    pub transcriber: StreamingTranscriber,
}

/// Hints shown when a video produced no transcript.
pub fn no_speech_suggestions(analysis: &AudioAnalysis) -> Vec<String> {
    let mut suggestions = Vec::new();
    if analysis.is_quiet {
        suggestions.push("Try increasing the video volume before uploading".to_string());
    }
    if analysis.speech_ratio < 0.1 {
        suggestions.push("Ensure the video contains clear speech commentary".to_string());
    }
    suggestions.push("Try a different video segment with clearer audio".to_string());
    suggestions.push("Consider using text input instead for better results".to_string());
    suggestions
}

fn log_quality(analysis: &AudioAnalysis) {
    info!(
        "Audio: {:.1}s, {:.1} dB, speech ratio {:.1}",
        analysis.duration, analysis.volume_db, analysis.speech_ratio
    );
    if analysis.is_quiet {
        warn!("Audio is very quiet. The video may have low volume or background audio only.");
    } else if analysis.speech_ratio < 0.1 {
        warn!(
            "Very little speech detected in audio. \
             The video may contain mostly music, crowd noise, or silence."
        );
    } else if !analysis.has_potential_speech {
        warn!("Audio quality may not be suitable for speech recognition.");
    } else {
        info!("Audio quality looks good for speech recognition.");
    }
}

fn no_speech(analysis: AudioAnalysis) -> ProcessingOutcome {
    ProcessingOutcome::NoSpeech {
        message: "No clear speech detected".to_string(),
        suggestions: no_speech_suggestions(&analysis),
        audio_analysis: analysis,
    }
}

pub fn job_name() -> String {
    format!("soccer-transcription-{}", chrono::Utc::now().timestamp())
}

/// Turns uploaded videos into commentary text, locally or through AWS.
pub struct VideoProcessor {
    settings: Settings,
    local: Option<Box<dyn SpeechRecognizer>>,
    cloud: Option<CloudServices>,
}

impl VideoProcessor {
    pub fn new(
        settings: Settings,
        local: Option<Box<dyn SpeechRecognizer>>,
        cloud: Option<CloudServices>,
    ) -> Self {
        Self {
            settings,
            local,
            cloud,
        }
    }

    /// Wires up whatever backends the settings and environment allow.
    pub async fn from_settings(settings: Settings) -> Self {
        let local = settings.local_stt.command.clone().map(|command| {
            Box::new(CommandRecognizer::new(&command, settings.clone()))
                as Box<dyn SpeechRecognizer>
        });

        let mut cloud = None;
        if settings.aws.enabled {
            let shared = load_shared_config(&settings.aws.region).await;
            if has_credentials(&shared).await {
                cloud = Some(CloudServices {
                    uploader: S3Uploader::new(
                        &shared,
                        &settings.aws.s3_bucket,
                        settings.aws.s3_endpoint.as_deref(),
                    ),
                    transcriber: StreamingTranscriber::new(&shared),
                });
            } else {
                warn!("AWS credentials not found, cloud processing disabled");
            }
        }

        Self::new(settings, local, cloud)
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            local: self.local.is_some(),
            cloud: self.cloud.is_some(),
        }
    }

    /// Runs the chosen method end to end. Errors are reported as `Failed`.
    pub async fn process(
        &self,
        video: &Path,
        language: Language,
        method: ProcessingMethod,
    ) -> ProcessingOutcome {
        let result = match method {
            ProcessingMethod::Local => self.process_local(video, language).await,
            ProcessingMethod::Cloud => self.process_cloud(video, language).await,
        };
        result.unwrap_or_else(|err| {
            error!("Error processing video ({method}): {err:#}");
            ProcessingOutcome::Failed {
                error: format!("{err:#}"),
            }
        })
    }

    async fn prepare_audio(
        &self,
        video: &Path,
        scratch: &Path,
    ) -> Result<(PathBuf, AudioClip, AudioAnalysis)> {
        info!("Extracting audio from video...");
        let wav = scratch.join("audio.wav");
        extract_audio(&self.settings.ffmpeg_path, video, &wav).await?;

        info!("Analyzing audio quality...");
        let wav_path = wav.clone();
        let clip = tokio::task::spawn_blocking(move || AudioClip::read_wav(&wav_path)).await??;
        let analysis = clip.analyze();
        log_quality(&analysis);
        Ok((wav, clip, analysis))
    }

    pub async fn process_local(
        &self,
        video: &Path,
        language: Language,
    ) -> Result<ProcessingOutcome> {
        let recognizer = self
            .local
            .as_deref()
            .context("local speech recognition is not configured")?;
        let scratch = tempfile::tempdir().context("cannot create scratch directory")?;
        let (_, clip, analysis) = self.prepare_audio(video, scratch.path()).await?;

        let enhanced = tokio::task::spawn_blocking(move || clip.enhance()).await?;
        info!("Transcribing audio locally with {}...", recognizer.name());
        let result = transcribe_chunks(recognizer, &enhanced, language, scratch.path()).await?;
        info!(
            "Complete! Found speech in {} out of {} chunks",
            result.recognized, result.chunks
        );

        Ok(match result.transcript {
            Some(transcript) => ProcessingOutcome::Completed {
                transcript,
                method: ProcessingMethod::Local,
                audio_analysis: analysis,
            },
            None => {
                warn!(
                    "No speech detected in {:.1} second video. Audio may be too quiet, unclear, \
                     or in a different language.",
                    analysis.duration
                );
                no_speech(analysis)
            }
        })
    }

    pub async fn process_cloud(
        &self,
        video: &Path,
        language: Language,
    ) -> Result<ProcessingOutcome> {
        let cloud = self
            .cloud
            .as_ref()
            .context("AWS services not initialized. Please configure your AWS credentials.")?;
        let scratch = tempfile::tempdir().context("cannot create scratch directory")?;
        let (wav, clip, analysis) = self.prepare_audio(video, scratch.path()).await?;

        let job = job_name();
        let key = format!("audio/{job}.wav");
        info!("Uploading to {} and starting transcription...", cloud.uploader.bucket());
        cloud.uploader.upload_file(&wav, &key).await?;

        let limit = Duration::from_secs(self.settings.aws.transcription_timeout_secs);
        let transcription = cloud.transcriber.transcribe(&clip, language);
        let lines = match tokio::time::timeout(limit, transcription).await {
            Ok(lines) => lines?,
            Err(_) => {
                warn!("Transcription is taking longer than expected ({job})");
                return Ok(ProcessingOutcome::Timeout {
                    job_name: job,
                    message: "Transcription job started but not completed within timeout. \
                              Check AWS console."
                        .to_string(),
                });
            }
        };

        if lines.is_empty() {
            return Ok(no_speech(analysis));
        }
        info!("Transcription completed!");
        Ok(ProcessingOutcome::Completed {
            transcript: render_lines(&lines),
            method: ProcessingMethod::Cloud,
            audio_analysis: analysis,
        })
    }
}
