use anyhow::{Context, Result};
use bytes::Bytes;
use log::{debug, info};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tempfile::TempPath;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoInfo {
    pub id: String,
    pub name: String,
    pub size: usize,
    pub uploaded_at: String,
}

/// An uploaded video kept on disk until it is removed from the store.
#[derive(Debug)]
pub struct StoredVideo {
    pub info: VideoInfo,
    file: TempPath,
}

impl StoredVideo {
    pub fn path(&self) -> &Path {
        &self.file
    }
}

#[derive(Default)]
pub struct VideoStore {
    videos: Mutex<HashMap<String, Arc<StoredVideo>>>,
    counter: AtomicU64,
}

impl VideoStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("video-{}-{}", chrono::Utc::now().timestamp_millis(), n)
    }

    pub async fn insert(&self, name: &str, bytes: Bytes) -> Result<VideoInfo> {
        let file = tempfile::Builder::new()
            .prefix("soccer-video-")
            .suffix(".mp4")
            .tempfile()
            .context("cannot create temporary video file")?
            .into_temp_path();
        tokio::fs::write(&file, &bytes)
            .await
            .with_context(|| format!("cannot write {}", file.display()))?;

        let info = VideoInfo {
            id: self.next_id(),
            name: name.to_string(),
            size: bytes.len(),
            uploaded_at: chrono::Utc::now().to_rfc3339(),
        };
        debug!("Stored {} at {}", info.id, file.display());
        info!("Received video {} ({} bytes) as {}", info.name, info.size, info.id);

        let video = Arc::new(StoredVideo {
            info: info.clone(),
            file,
        });
        self.videos
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(info.id.clone(), video);
        Ok(info)
    }

    pub fn get(&self, id: &str) -> Option<Arc<StoredVideo>> {
        self.videos
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Forgets a video. Its file is deleted once no request still holds it.
    pub fn remove(&self, id: &str) -> bool {
        self.videos
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.videos.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
