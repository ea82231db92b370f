use aws_config::{meta::region::RegionProviderChain, BehaviorVersion, SdkConfig};
use aws_sdk_s3::config::ProvideCredentials;
use aws_types::region::Region;
use log::debug;

/// Loads the shared AWS configuration, preferring the configured region.
pub async fn load_shared_config(region: &str) -> SdkConfig {
    let region_provider = RegionProviderChain::first_try(Some(Region::new(region.to_string())))
        .or_default_provider()
        .or_else(Region::new("us-east-1"));

    aws_config::defaults(BehaviorVersion::v2024_03_28())
        .region(region_provider)
        .load()
        .await
}

/// True when the default credential chain resolves to usable credentials.
pub async fn has_credentials(config: &SdkConfig) -> bool {
    let Some(provider) = config.credentials_provider() else {
        return false;
    };
    match provider.provide_credentials().await {
        Ok(_) => true,
        Err(err) => {
            debug!("AWS credentials unavailable: {err}");
            false
        }
    }
}
