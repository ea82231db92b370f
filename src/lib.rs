pub mod analyzer;
pub mod api;
pub mod aws;
pub mod config;
pub mod error;
pub mod language;
pub mod media;
pub mod merchandise;
pub mod overlay;
pub mod pipeline;
pub mod s3_uploader;
pub mod store;
pub mod transcribe;
