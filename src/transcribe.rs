#![allow(clippy::result_large_err)]

use anyhow::{bail, ensure, Context, Result};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_transcribestreaming::primitives::Blob;
use aws_sdk_transcribestreaming::types::{
    AudioEvent, AudioStream, LanguageCode, MediaEncoding, TranscriptResultStream,
};
use aws_sdk_transcribestreaming::{Client, Error as TranscribeError};
use log::{debug, info, warn};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

use crate::config::Settings;
use crate::language::Language;
use crate::media::{chunk_plan, format_offset, AudioClip};

const CHUNK_SIZE: usize = 8192;
const STREAM_PACING: Duration = Duration::from_millis(100);

/// Turns one short WAV file into text. `None` means nothing was understood.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    fn name(&self) -> &str;

    async fn recognize(&self, wav: &Path, language: Language) -> Result<Option<String>>;
}

/// Runs an external speech-to-text program per chunk and reads the text from stdout.
pub struct CommandRecognizer {
    program: String,
    settings: Settings,
}

impl CommandRecognizer {
    pub fn new(program: &str, settings: Settings) -> Self {
        Self {
            program: program.to_string(),
            settings,
        }
    }
}

#[async_trait]
impl SpeechRecognizer for CommandRecognizer {
    fn name(&self) -> &str {
        &self.program
    }

    async fn recognize(&self, wav: &Path, language: Language) -> Result<Option<String>> {
        let args = self.settings.local_stt_args(
            &wav.to_string_lossy(),
            language.code(),
            language.locale(),
        );
        let output = tokio::process::Command::new(&self.program)
            .args(&args)
            .output()
            .await
            .with_context(|| format!("failed to launch {}", self.program))?;

        debug!("{} stderr: {}", self.program, String::from_utf8_lossy(&output.stderr));
        ensure!(
            output.status.success(),
            "{} exited with {}: {}",
            self.program,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok((!text.is_empty()).then_some(text))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkedTranscript {
    pub transcript: Option<String>,
    pub chunks: usize,
    pub recognized: usize,
}

async fn recognize_with_fallback(
    recognizer: &dyn SpeechRecognizer,
    wav: &Path,
    language: Language,
) -> Result<Option<String>> {
    if let Some(text) = recognizer.recognize(wav, language).await? {
        return Ok(Some(text));
    }
    recognizer.recognize(wav, language.other()).await
}

/// Recognises a clip in overlapping chunks. Each understood chunk becomes a
/// line `M:SS' text` stamped with the chunk's start offset.
pub async fn transcribe_chunks(
    recognizer: &dyn SpeechRecognizer,
    clip: &AudioClip,
    language: Language,
    scratch: &Path,
) -> Result<ChunkedTranscript> {
    let plan = chunk_plan(clip.duration_ms());
    let mut lines = Vec::new();

    for (i, span) in plan.iter().enumerate() {
        let wav = scratch.join(format!("chunk-{i:04}.wav"));
        clip.slice_ms(span.start_ms, span.end_ms).write_wav(&wav)?;

        match recognize_with_fallback(recognizer, &wav, language).await {
            Ok(Some(text)) if !text.trim().is_empty() => {
                lines.push(format!("{}' {}", format_offset(span.start_ms), text.trim()));
            }
            Ok(_) => {}
            Err(err) => warn!("{} failed on chunk {}: {:#}", recognizer.name(), i + 1, err),
        }
        let _ = std::fs::remove_file(&wav);

        info!(
            "Processing audio chunk {} of {}... Found speech in {} chunks",
            i + 1,
            plan.len(),
            lines.len()
        );
    }

    Ok(ChunkedTranscript {
        recognized: lines.len(),
        chunks: plan.len(),
        transcript: (!lines.is_empty()).then(|| lines.join("\n")),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptLine {
    pub start_ms: u64,
    pub speaker: Option<String>,
    pub text: String,
}

/// Renders transcript lines as timestamped commentary the analyzer understands.
pub fn render_lines(lines: &[TranscriptLine]) -> String {
    lines
        .iter()
        .map(|line| format!("{}' {}", format_offset(line.start_ms), line.text.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn streaming_language(language: Language) -> LanguageCode {
    match language {
        Language::English => LanguageCode::EnUs,
        Language::Spanish => LanguageCode::EsUs,
    }
}

/// AWS Transcribe streaming client fed with raw 16-bit PCM.
pub struct StreamingTranscriber {
    client: Client,
}

impl StreamingTranscriber {
    pub fn new(shared: &SdkConfig) -> Self {
        Self {
            client: Client::new(shared),
        }
    }

    pub async fn transcribe(
        &self,
        clip: &AudioClip,
        language: Language,
    ) -> Result<Vec<TranscriptLine>> {
        ensure!(clip.channels == 1, "streaming transcription needs mono audio");
        let pcm = clip.pcm_le_bytes();
        debug!("Streaming {} bytes of PCM audio", pcm.len());

        let input_stream = async_stream::stream! {
            for chunk in pcm.chunks(CHUNK_SIZE) {
                tokio::time::sleep(STREAM_PACING).await;
                yield Ok(AudioStream::AudioEvent(
                    AudioEvent::builder().audio_chunk(Blob::new(chunk)).build(),
                ));
            }
        };

        let mut output = self
            .client
            .start_stream_transcription()
            .language_code(streaming_language(language))
            .media_sample_rate_hertz(clip.sample_rate as i32)
            .media_encoding(MediaEncoding::Pcm)
            .show_speaker_label(true)
            .audio_stream(input_stream.into())
            .send()
            .await
            .map_err(TranscribeError::from)?;

        let mut lines = Vec::new();
        while let Some(event) = output
            .transcript_result_stream
            .recv()
            .await
            .map_err(TranscribeError::from)?
        {
            match event {
                TranscriptResultStream::TranscriptEvent(transcript_event) => {
                    let Some(transcript) = transcript_event.transcript else {
                        continue;
                    };
                    for result in transcript.results.unwrap_or_default() {
                        if result.is_partial {
                            continue;
                        }
                        debug!("Transcript result: {:?}", result);
                        let Some(alternative) =
                            result.alternatives.unwrap_or_default().into_iter().next()
                        else {
                            continue;
                        };
                        let speaker = alternative
                            .items
                            .as_deref()
                            .unwrap_or_default()
                            .iter()
                            .find_map(|item| item.speaker.clone());
                        let Some(text) = alternative.transcript.filter(|t| !t.trim().is_empty())
                        else {
                            continue;
                        };
                        lines.push(TranscriptLine {
                            start_ms: (result.start_time.max(0.0) * 1000.0) as u64,
                            speaker,
                            text,
                        });
                    }
                }
                otherwise => bail!("received unexpected event type: {:?}", otherwise),
            }
        }

        info!("Streaming transcription returned {} segments", lines.len());
        Ok(lines)
    }
}
