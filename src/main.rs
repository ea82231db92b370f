use anyhow::Result;
use log::{info, warn};

use soccer_analyzer::api::{run_api_server, AppState};
use soccer_analyzer::config::Settings;
use soccer_analyzer::media::check_ffmpeg;
use soccer_analyzer::pipeline::VideoProcessor;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Settings::load()?;

    if !check_ffmpeg(&settings.ffmpeg_path).await {
        warn!("FFmpeg is not available, video processing will fail until it is installed");
    }

    let processor = VideoProcessor::from_settings(settings.clone()).await;
    let capabilities = processor.capabilities();
    info!(
        "Processing methods: local={}, cloud={}",
        capabilities.local, capabilities.cloud
    );

    let state = AppState::new(settings, processor)?;
    run_api_server(state).await?;
    Ok(())
}
