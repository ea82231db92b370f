use anyhow::Result;
use ::config::{Config, Environment, File};
use serde::Deserialize;

/// Runtime settings. Layered as: built-in defaults, then an optional
/// `soccer_analyzer.toml`, then `SOCCER_*` environment variables
/// (nested keys use `__`, e.g. `SOCCER_AWS__S3_BUCKET`).
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub ffmpeg_path: String,
    pub max_upload_bytes: usize,
    pub aws: AwsSettings,
    pub local_stt: LocalSttSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AwsSettings {
    pub enabled: bool,
    pub region: String,
    pub s3_bucket: String,
    /// Endpoint override, e.g. "http://127.0.0.1:9000" for MinIO.
    pub s3_endpoint: Option<String>,
    pub transcription_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocalSttSettings {
    /// Speech-to-text executable run once per audio chunk. Local processing
    /// is unavailable when unset.
    pub command: Option<String>,
    /// Whitespace-separated arguments; `{input}`, `{language}` and `{locale}`
    /// are substituted.
    pub args: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            ffmpeg_path: "ffmpeg".to_string(),
            max_upload_bytes: 300 * 1024 * 1024,
            aws: AwsSettings {
                enabled: true,
                region: "us-east-1".to_string(),
                s3_bucket: "soccer-analysis-temp".to_string(),
                s3_endpoint: None,
                transcription_timeout_secs: 300,
            },
            local_stt: LocalSttSettings {
                command: None,
                args: "-f {input} -l {language} -nt".to_string(),
            },
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::load_from("soccer_analyzer")
    }

    pub fn load_from(file_stem: &str) -> Result<Self> {
        let defaults = Settings::default();
        let settings = Config::builder()
            .set_default("host", defaults.host)?
            .set_default("port", u64::from(defaults.port))?
            .set_default("ffmpeg_path", defaults.ffmpeg_path)?
            .set_default("max_upload_bytes", defaults.max_upload_bytes as u64)?
            .set_default("aws.enabled", defaults.aws.enabled)?
            .set_default("aws.region", defaults.aws.region)?
            .set_default("aws.s3_bucket", defaults.aws.s3_bucket)?
            .set_default(
                "aws.transcription_timeout_secs",
                defaults.aws.transcription_timeout_secs,
            )?
            .set_default("local_stt.args", defaults.local_stt.args)?
            .add_source(File::with_name(file_stem).required(false))
            .add_source(
                Environment::with_prefix("SOCCER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Argument list for the local recognizer with placeholders filled in.
    pub fn local_stt_args(&self, input: &str, language: &str, locale: &str) -> Vec<String> {
        self.local_stt
            .args
            .split_whitespace()
            .map(|arg| {
                arg.replace("{input}", input)
                    .replace("{language}", language)
                    .replace("{locale}", locale)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_file_or_env() {
        let settings = Settings::load_from("definitely-missing-settings-file").unwrap();
        assert_eq!(settings.ffmpeg_path, "ffmpeg");
        assert_eq!(settings.max_upload_bytes, 300 * 1024 * 1024);
        assert_eq!(settings.aws.s3_bucket, "soccer-analysis-temp");
        assert_eq!(settings.aws.transcription_timeout_secs, 300);
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let stem = dir.path().join("settings");
        std::fs::write(
            stem.with_extension("toml"),
            "port = 8088\n[aws]\nregion = \"eu-west-1\"\nenabled = false\n[local_stt]\ncommand = \"whisper-cli\"\n",
        )
        .unwrap();

        let settings = Settings::load_from(stem.to_str().unwrap()).unwrap();
        assert_eq!(settings.port, 8088);
        assert_eq!(settings.aws.region, "eu-west-1");
        assert!(!settings.aws.enabled);
        assert_eq!(settings.local_stt.command.as_deref(), Some("whisper-cli"));
        assert_eq!(settings.aws.s3_bucket, "soccer-analysis-temp");
    }

    #[test]
    fn stt_arguments_substitute_placeholders() {
        let settings = Settings::default();
        assert_eq!(
            settings.local_stt_args("/tmp/chunk.wav", "es", "es-ES"),
            vec!["-f", "/tmp/chunk.wav", "-l", "es", "-nt"]
        );
    }
}
