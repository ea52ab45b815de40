//! reqwest-backed transport

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{ApiRequest, ApiResponse, Transport};
use crate::{
    config::ApiConfig,
    error::{ClientError, ClientResult},
};

#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Create a transport for the configured base path
    pub fn new(config: &ApiConfig) -> ClientResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ClientError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> ClientResult<ApiResponse> {
        let url = self.url(&request.path);
        tracing::debug!("{} {} {:?}", request.method, url, request.query);

        let mut builder = self.client.request(request.method, url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        let body = if status == reqwest::StatusCode::NO_CONTENT {
            serde_json::json!({ "success": true })
        } else {
            match serde_json::from_slice::<Value>(&bytes) {
                Ok(body) => body,
                Err(e) if status.is_success() => {
                    return Err(ClientError::Service {
                        status: status.as_u16(),
                        message: format!("Malformed response body: {}", e),
                    });
                }
                // Error pages are often HTML; the status alone classifies them
                Err(_) => Value::Null,
            }
        };

        Ok(ApiResponse {
            status: status.as_u16(),
            body,
        })
    }
}
