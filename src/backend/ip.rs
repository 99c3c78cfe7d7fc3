/// Public IP lookup over plain HTTP
use crate::{
    backend::IpLookup,
    error::{TubeError, TubeResult},
};
use async_trait::async_trait;
use std::time::Duration;

/// Fetches the caller's public IP as text from a lookup endpoint
#[derive(Clone)]
pub struct HttpIpLookup {
    http_client: reqwest::Client,
    url: String,
}

impl HttpIpLookup {
    pub fn new(url: impl Into<String>, user_agent: &str, timeout_secs: u64) -> TubeResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| TubeError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl IpLookup for HttpIpLookup {
    async fn public_ip(&self) -> TubeResult<String> {
        let response = self.http_client.get(&self.url).send().await?;

        if !response.status().is_success() {
            return Err(TubeError::Remote {
                status: response.status().as_u16(),
                message: "IP lookup failed".to_string(),
            });
        }

        let ip = response.text().await?.trim().to_string();
        if ip.is_empty() {
            return Err(TubeError::Remote {
                status: 200,
                message: "IP lookup returned an empty body".to_string(),
            });
        }

        Ok(ip)
    }
}
