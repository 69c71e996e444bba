//! HTTP capability handed to source adapters

use super::SourceError;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

const USER_AGENT: &str = concat!("shelf-enrich/", env!("CARGO_PKG_VERSION"));

/// JSON-over-HTTP transport
///
/// Non-2xx responses map to `SourceError::Api`, connection and timeout
/// failures to `SourceError::Network`, undecodable bodies to
/// `SourceError::Parse`.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get_json(&self, url: &str, bearer: Option<&str>) -> Result<Value, SourceError>;

    async fn post_json(
        &self,
        url: &str,
        bearer: Option<&str>,
        body: &Value,
    ) -> Result<Value, SourceError>;
}

/// Production transport over a shared `reqwest::Client`
#[derive(Clone)]
pub struct ReqwestTransport {
    http_client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, SourceError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Network(e.to_string()))?;

        Ok(Self { http_client })
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, SourceError> {
        let response = request
            .send()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(SourceError::Api(status.as_u16(), error_text));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| SourceError::Parse(e.to_string()))
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get_json(&self, url: &str, bearer: Option<&str>) -> Result<Value, SourceError> {
        tracing::debug!(url = %redact(url), "GET");
        let mut request = self.http_client.get(url);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        self.send(request).await
    }

    async fn post_json(
        &self,
        url: &str,
        bearer: Option<&str>,
        body: &Value,
    ) -> Result<Value, SourceError> {
        tracing::debug!(url = %redact(url), "POST");
        let mut request = self.http_client.post(url).json(body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        self.send(request).await
    }
}

/// Strip query-string credentials before logging
fn redact(url: &str) -> String {
    match reqwest::Url::parse(url) {
        Ok(mut parsed) => {
            let pairs: Vec<(String, String)> = parsed
                .query_pairs()
                .map(|(k, v)| {
                    let v = if k == "key" { "***".to_string() } else { v.into_owned() };
                    (k.into_owned(), v)
                })
                .collect();
            if !pairs.is_empty() {
                parsed.query_pairs_mut().clear().extend_pairs(pairs);
            }
            parsed.to_string()
        }
        Err(_) => url.to_string(),
    }
}
