use anyhow::{anyhow, Context};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::time::Duration;

/// Thin wrapper over the HTTP API that unwraps the `{success, data}` envelope.
pub struct ApiClient {
    base_url: reqwest::Url,
    token: Option<String>,
    http: reqwest::Client,
}

/// Raw reply for callers that need the status as well as the body.
#[derive(Debug)]
pub struct ApiReply {
    pub status: StatusCode,
    pub body: Value,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>) -> anyhow::Result<Self> {
        let base_url = reqwest::Url::parse(base_url).with_context(|| format!("invalid server URL '{}'", base_url))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { base_url, token, http })
    }

    pub fn base_url(&self) -> &reqwest::Url {
        &self.base_url
    }

    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> anyhow::Result<Value> {
        self.call(Method::GET, path, query, None).await
    }

    pub async fn post(&self, path: &str, body: Value) -> anyhow::Result<Value> {
        self.call(Method::POST, path, &[], Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> anyhow::Result<Value> {
        self.call(Method::DELETE, path, &[], None).await
    }

    /// Send a request and return the status and body without interpreting them.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> anyhow::Result<ApiReply> {
        let url = self.base_url.join(path).with_context(|| format!("invalid path '{}'", path))?;
        let mut request = self.http.request(method, url.clone()).query(query);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("request to {} failed", url))?;
        let status = response.status();
        let text = response.text().await.context("failed to read response body")?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).with_context(|| format!("server returned non-JSON body ({})", status))?
        };
        Ok(ApiReply { status, body })
    }

    async fn call(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> anyhow::Result<Value> {
        let reply = self.send(method, path, query, body).await?;
        unwrap_envelope(reply)
    }
}

/// Return `data` from a success envelope, or turn the failure envelope into an error.
pub fn unwrap_envelope(reply: ApiReply) -> anyhow::Result<Value> {
    let success = reply.body.get("success").and_then(Value::as_bool).unwrap_or(false);
    if reply.status.is_success() && success {
        return Ok(reply.body.get("data").cloned().unwrap_or(Value::Null));
    }

    let message = reply
        .body
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("request failed");
    match reply.body.get("code").and_then(Value::as_str) {
        Some(code) => Err(anyhow!("{} ({} {})", message, reply.status.as_u16(), code)),
        None => Err(anyhow!("{} ({})", message, reply.status.as_u16())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unwraps_success_data() {
        let reply = ApiReply {
            status: StatusCode::OK,
            body: json!({"success": true, "data": {"deleted": 3}}),
        };
        assert_eq!(unwrap_envelope(reply).unwrap()["deleted"], 3);
    }

    #[test]
    fn surfaces_error_message_and_code() {
        let reply = ApiReply {
            status: StatusCode::NOT_FOUND,
            body: json!({"success": false, "error": "Peer group not found", "code": "NOT_FOUND"}),
        };
        let err = unwrap_envelope(reply).unwrap_err().to_string();
        assert!(err.contains("Peer group not found"));
        assert!(err.contains("404"));
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(ApiClient::new("not a url", None).is_err());
    }
}
