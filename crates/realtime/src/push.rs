//! Device push-token registration against the REST API.
//!
//! Push notifications live outside the socket: the token is registered over
//! HTTP so the backend can reach the device while the app is backgrounded.

use std::time::Duration;

use anyhow::Context;
use serde::Serialize;
use tracing::info;

use tradepost_config::ApiConfig;

/// Platform a device token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePlatform {
    Ios,
    Android,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterTokenRequest<'a> {
    token: &'a str,
    platform: DevicePlatform,
}

/// Registers and removes device push tokens.
pub struct PushRegistrar {
    http: reqwest::Client,
    base_url: String,
}

impl PushRegistrar {
    pub fn new(config: &ApiConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .context("unable to build HTTP client")?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Associate a device push token with the authenticated user.
    pub async fn register(
        &self,
        access_token: &str,
        device_token: &str,
        platform: DevicePlatform,
    ) -> anyhow::Result<()> {
        let url = format!("{}/notifications/device-tokens", self.base_url);
        self.http
            .post(&url)
            .bearer_auth(access_token)
            .json(&RegisterTokenRequest {
                token: device_token,
                platform,
            })
            .send()
            .await
            .context("push token registration request failed")?
            .error_for_status()
            .context("push token registration rejected")?;
        info!(?platform, "registered device push token");
        Ok(())
    }

    /// Remove a device push token, typically on logout.
    pub async fn unregister(&self, access_token: &str, device_token: &str) -> anyhow::Result<()> {
        let url = format!(
            "{}/notifications/device-tokens/{}",
            self.base_url, device_token
        );
        self.http
            .delete(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .context("push token removal request failed")?
            .error_for_status()
            .context("push token removal rejected")?;
        info!("removed device push token");
        Ok(())
    }
}
