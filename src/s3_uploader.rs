use anyhow::{Context, Result};
use aws_config::SdkConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use log::info;
use std::path::Path;
use tokio::fs;

pub struct S3Uploader {
    client: Client,
    bucket: String,
    /// Optional endpoint override (for example, "http://127.0.0.1:9000" for MinIO)
    endpoint: Option<String>,
}

impl S3Uploader {
    /// Creates a new S3Uploader.
    ///
    /// * `shared` - Shared AWS configuration (region and credentials).
    /// * `bucket` - The S3 bucket name.
    /// * `endpoint` - An optional endpoint override (pass, for example,
    ///   Some("http://127.0.0.1:9000") to use a local S3-compatible service like MinIO).
    pub fn new(shared: &SdkConfig, bucket: &str, endpoint: Option<&str>) -> Self {
        let mut config = aws_sdk_s3::config::Builder::from(shared);

        if let Some(ep) = endpoint {
            config = config.endpoint_url(ep).force_path_style(true);
        }

        S3Uploader {
            client: Client::from_conf(config.build()),
            bucket: bucket.to_string(),
            endpoint: endpoint.map(|s| s.to_string()),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Uploads the file at `file_path` to the S3 bucket using the specified `object_key`.
    ///
    /// Returns the URL where the object is available.
    pub async fn upload_file(&self, file_path: &Path, object_key: &str) -> Result<String> {
        let file_bytes = fs::read(file_path)
            .await
            .with_context(|| format!("cannot read {}", file_path.display()))?;
        let body = ByteStream::from(file_bytes);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(object_key)
            .body(body)
            .send()
            .await
            .map_err(aws_sdk_s3::Error::from)
            .with_context(|| format!("upload of {object_key} to {} failed", self.bucket))?;

        let url = object_url(&self.bucket, self.endpoint.as_deref(), object_key);
        info!("Successfully uploaded file to {}", url);
        Ok(url)
    }
}

fn object_url(bucket: &str, endpoint: Option<&str>, object_key: &str) -> String {
    match endpoint {
        Some(ep) => format!("{}/{}/{}", ep.trim_end_matches('/'), bucket, object_key),
        None => format!("https://{}.s3.amazonaws.com/{}", bucket, object_key),
    }
}
