//! Outbound HTTP request action.
//!
//! Config schema: `{ url (required), method (default GET), headers,
//! body }`. The body is JSON-serialized onto the wire only when present.
//! The result reports the response status class as `ok`, the numeric
//! status, the decoded body (raw text when JSON decoding fails), and the
//! response headers as a string map. No retry happens at this layer.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;

use super::{require_str, ActionError, ActionHandler, ActionResult};
use crate::config::Config;
use crate::error::{Result, WorkerError};

pub struct HttpRequestAction {
    client: reqwest::Client,
}

impl HttpRequestAction {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.worker.http_timeout_seconds))
            .build()
            .map_err(|e| WorkerError::configuration(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    fn parse_method(config: &Value) -> ActionResult<Method> {
        match config.get("method").and_then(Value::as_str) {
            None => Ok(Method::GET),
            Some(raw) => Method::from_bytes(raw.to_uppercase().as_bytes())
                .map_err(|_| ActionError::Config(format!("invalid HTTP method '{}'", raw))),
        }
    }

    fn parse_headers(config: &Value) -> ActionResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(map) = config.get("headers").and_then(Value::as_object) {
            for (name, value) in map {
                let value = value
                    .as_str()
                    .ok_or_else(|| ActionError::Config(format!("header '{}' must be a string", name)))?;
                let name = HeaderName::from_bytes(name.as_bytes())
                    .map_err(|_| ActionError::Config(format!("invalid header name '{}'", name)))?;
                let value = HeaderValue::from_str(value)
                    .map_err(|_| ActionError::Config(format!("invalid value for header '{}'", name)))?;
                headers.insert(name, value);
            }
        }
        Ok(headers)
    }
}

#[async_trait]
impl ActionHandler for HttpRequestAction {
    fn kind(&self) -> &'static str {
        "http_request"
    }

    async fn execute(&self, config: &Value, _input: &Value) -> ActionResult<Value> {
        let url = require_str(config, "url")?;
        let method = Self::parse_method(config)?;
        let headers = Self::parse_headers(config)?;

        debug!(%url, method = %method, "Issuing outbound HTTP request");

        let mut request = self.client.request(method, url).headers(headers);
        if let Some(body) = config.get("body") {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ActionError::Transient(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        let response_headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();

        let text = response
            .text()
            .await
            .map_err(|e| ActionError::Transient(format!("reading response body failed: {}", e)))?;

        // Structured decode first, raw text fallback.
        let body = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));

        Ok(json!({
            "ok": status.is_success(),
            "status": status.as_u16(),
            "body": body,
            "headers": response_headers,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn action() -> HttpRequestAction {
        HttpRequestAction::new(&Config::default()).unwrap()
    }

    #[tokio::test]
    async fn test_missing_url_is_config_error() {
        let result = action().execute(&json!({}), &json!({})).await;
        assert!(matches!(result, Err(ActionError::Config(_))));
    }

    #[tokio::test]
    async fn test_invalid_method_is_config_error() {
        let config = json!({"url": "http://localhost", "method": "TELEPORT ME"});
        let result = action().execute(&config, &json!({})).await;
        assert!(matches!(result, Err(ActionError::Config(_))));
    }

    #[tokio::test]
    async fn test_get_with_json_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        let config = json!({"url": format!("{}/hook", server.uri())});
        let result = action().execute(&config, &json!({})).await.unwrap();

        assert_eq!(result["ok"], json!(true));
        assert_eq!(result["status"], json!(200));
        assert_eq!(result["body"], json!({"ok": true}));
        assert!(result["headers"].is_object());
    }

    #[tokio::test]
    async fn test_post_serializes_body_and_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/submit"))
            .and(header("x-api-key", "secret"))
            .and(body_json(json!({"name": "zap"})))
            .respond_with(ResponseTemplate::new(201).set_body_string("created"))
            .mount(&server)
            .await;

        let config = json!({
            "url": format!("{}/submit", server.uri()),
            "method": "post",
            "headers": {"x-api-key": "secret"},
            "body": {"name": "zap"},
        });
        let result = action().execute(&config, &json!({})).await.unwrap();

        assert_eq!(result["ok"], json!(true));
        assert_eq!(result["status"], json!(201));
        // Non-JSON body falls back to raw text.
        assert_eq!(result["body"], json!("created"));
    }

    #[tokio::test]
    async fn test_error_status_reported_not_raised() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/boom"))
            .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
            .mount(&server)
            .await;

        let config = json!({"url": format!("{}/boom", server.uri())});
        let result = action().execute(&config, &json!({})).await.unwrap();

        assert_eq!(result["ok"], json!(false));
        assert_eq!(result["status"], json!(500));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transient() {
        // Port 1 on loopback refuses the connection immediately.
        let config = json!({"url": "http://127.0.0.1:1/nope"});
        let result = action().execute(&config, &json!({})).await;
        assert!(matches!(result, Err(ActionError::Transient(_))));
    }
}
