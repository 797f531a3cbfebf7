//! HTTP client for the agent directory: lookup and connect-bootstrap.

use crate::error::WidgetError;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use voicewidget_core::{AgentRecord, Bootstrap};

pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    /// Creates a client whose every request gives up after `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, WidgetError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WidgetError::ConnectionFailed(e.to_string()))?;
        let base_url = base_url.into();
        let base_url = Url::parse(&base_url)
            .map_err(|e| WidgetError::ConnectionFailed(format!("invalid API URL {}: {}", base_url, e)))?;
        Ok(Self { http, base_url })
    }

    /// `{base}/api/agent/{agent_id}[/{action}]`, with the id percent-encoded as
    /// a single path segment.
    fn agent_url(&self, agent_id: &str, action: Option<&str>) -> Result<Url, WidgetError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                WidgetError::ConnectionFailed(format!("{} cannot be a base URL", self.base_url))
            })?;
            segments
                .pop_if_empty()
                .extend(["api", "agent", agent_id])
                .extend(action);
        }
        Ok(url)
    }

    /// `GET /api/agent/{agent_id}`
    pub async fn lookup(&self, agent_id: &str) -> Result<AgentRecord, WidgetError> {
        let response = self
            .http
            .get(self.agent_url(agent_id, None)?)
            .send()
            .await
            .map_err(|e| WidgetError::ConnectionFailed(e.to_string()))?;
        read_json(response, agent_id).await
    }

    /// `POST /api/agent/{agent_id}/connect`
    pub async fn connect(&self, agent_id: &str) -> Result<Bootstrap, WidgetError> {
        let response = self
            .http
            .post(self.agent_url(agent_id, Some("connect"))?)
            .send()
            .await
            .map_err(|e| WidgetError::ConnectionFailed(e.to_string()))?;
        read_json(response, agent_id).await
    }
}

async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
    agent_id: &str,
) -> Result<T, WidgetError> {
    match response.status() {
        StatusCode::NOT_FOUND => Err(WidgetError::NotFound(agent_id.to_string())),
        status if !status.is_success() => Err(WidgetError::ConnectionFailed(format!(
            "directory answered {}",
            status
        ))),
        _ => response
            .json()
            .await
            .map_err(|e| WidgetError::ConnectionFailed(e.to_string())),
    }
}

/// Rewrites an `http(s)://` endpoint to `ws(s)://`; other URLs pass through.
pub fn to_channel_url(ws_url: &str) -> String {
    if let Some(rest) = ws_url.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = ws_url.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        ws_url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_channel_url() {
        assert_eq!(to_channel_url("http://h:1/ws/a"), "ws://h:1/ws/a");
        assert_eq!(to_channel_url("https://h/ws/a"), "wss://h/ws/a");
        assert_eq!(to_channel_url("ws://h/ws/a"), "ws://h/ws/a");
        assert_eq!(
            to_channel_url("wss://h/ws/http://inner"),
            "wss://h/ws/http://inner"
        );
    }

    #[test]
    fn test_agent_id_is_one_path_segment() {
        let client = ApiClient::new("http://h:1/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.agent_url("demo-agent", None).unwrap().as_str(),
            "http://h:1/api/agent/demo-agent"
        );
        assert_eq!(
            client.agent_url("a/b?c", Some("connect")).unwrap().as_str(),
            "http://h:1/api/agent/a%2Fb%3Fc/connect"
        );

        let nested = ApiClient::new("https://h/widget/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            nested.agent_url("x", None).unwrap().as_str(),
            "https://h/widget/api/agent/x"
        );
    }

    #[test]
    fn test_invalid_api_url_is_rejected() {
        assert!(ApiClient::new("not a url", Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_directory_is_connection_failed() {
        let client = ApiClient::new("http://127.0.0.1:1/", Duration::from_secs(2)).unwrap();
        let err = client.lookup("demo-agent").await.unwrap_err();
        assert!(matches!(err, WidgetError::ConnectionFailed(_)));
    }
}
