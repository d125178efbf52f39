//! REST adapter for the branch directory and the pricing service.
//!
//! Every response is wrapped in `{ "message": string?, "data": ... }`; failures
//! carry `{ "message": ... }` or `{ "error": ... }`.

use crate::config::{ConfigError, ConsoleConfig};
use async_trait::async_trait;
use crash::{
    BranchCrashState, BranchDirectory, BranchId, BranchSummary, CrashAck, CrashDuration,
    CrashError, CrashIntensity, PricingService,
};
use log::{debug, warn};
use reqwest::{header, Client, Method, RequestBuilder, StatusCode, Url};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    message: Option<String>,
    data: T,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TriggerRequest {
    intensity_percent: u32,
    duration_minutes: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EndData {
    reset_count: Option<u64>,
}

/// Talks to the pricing backend over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    base: Url,
    client: Client,
}

impl HttpBackend {
    pub fn new(config: &ConsoleConfig) -> Result<Self, ConfigError> {
        let base = Url::parse(config.api_base_url.trim()).map_err(|e| {
            ConfigError::Invalid(format!("api_base_url '{}': {}", config.api_base_url, e))
        })?;

        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
        if let Some(token) = &config.api_token {
            let mut value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| ConfigError::Invalid(format!("api_token: {}", e)))?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(config.request_timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| ConfigError::Client(e.to_string()))?;

        Ok(Self { base, client })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let url = self.endpoint(segments);
        debug!("{} {}", method, url);
        self.client.request(method, url)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> crash::Result<Envelope<T>> {
        let response = request
            .send()
            .await
            .map_err(|e| CrashError::network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CrashError::network(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            let error = remote_error(status, &body);
            warn!("Backend answered {}: {}", status, error);
            return Err(error);
        }

        serde_json::from_str(&body).map_err(|e| {
            CrashError::remote(Some(status.as_u16()), format!("Malformed response: {}", e))
        })
    }
}

/// Builds the error for a non-2xx answer, preferring the backend's own wording.
fn remote_error(status: StatusCode, body: &str) -> CrashError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .message
        .or(parsed.error)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| status.to_string())
        });
    CrashError::remote(Some(status.as_u16()), message)
}

#[async_trait]
impl BranchDirectory for HttpBackend {
    async fn list_branches(&self) -> crash::Result<Vec<BranchSummary>> {
        let envelope: Envelope<Vec<BranchSummary>> =
            self.send(self.request(Method::GET, &["branches"])).await?;
        Ok(envelope.data)
    }

    async fn get_branch(&self, id: &BranchId) -> crash::Result<BranchCrashState> {
        let envelope: Envelope<BranchCrashState> = self
            .send(self.request(Method::GET, &["branches", id.as_str()]))
            .await?;
        Ok(envelope.data)
    }
}

#[async_trait]
impl PricingService for HttpBackend {
    async fn trigger_crash(
        &self,
        id: &BranchId,
        intensity: CrashIntensity,
        duration: CrashDuration,
    ) -> crash::Result<CrashAck> {
        let body = TriggerRequest {
            intensity_percent: intensity.percent(),
            duration_minutes: duration.minutes(),
        };
        let envelope: Envelope<Option<IgnoredAny>> = self
            .send(
                self.request(Method::POST, &["branches", id.as_str(), "crash"])
                    .json(&body),
            )
            .await?;

        Ok(CrashAck {
            message: envelope.message,
            reset_count: None,
        })
    }

    async fn end_crash(&self, id: &BranchId) -> crash::Result<CrashAck> {
        let envelope: Envelope<Option<EndData>> = self
            .send(self.request(Method::POST, &["branches", id.as_str(), "crash", "end"]))
            .await?;

        Ok(CrashAck {
            message: envelope.message,
            reset_count: envelope.data.and_then(|d| d.reset_count),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(base: &str) -> HttpBackend {
        HttpBackend::new(&ConsoleConfig {
            api_base_url: base.to_string(),
            ..ConsoleConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_endpoint_joins_segments_and_escapes_ids() {
        let http = backend("http://localhost:3000/api/");
        assert_eq!(
            http.endpoint(&["branches", "b1", "crash", "end"]).as_str(),
            "http://localhost:3000/api/branches/b1/crash/end"
        );
        assert_eq!(
            http.endpoint(&["branches", "old town/2"]).as_str(),
            "http://localhost:3000/api/branches/old%20town%2F2"
        );
    }

    #[test]
    fn test_remote_error_prefers_backend_wording() {
        let err = remote_error(StatusCode::CONFLICT, r#"{"message":"already crashing"}"#);
        assert_eq!(err, CrashError::remote(Some(409), "already crashing"));
        assert!(err.is_conflict());

        let err = remote_error(StatusCode::BAD_REQUEST, r#"{"error":"bad intensity"}"#);
        assert_eq!(err, CrashError::remote(Some(400), "bad intensity"));

        let err = remote_error(StatusCode::BAD_GATEWAY, "<html>oops</html>");
        assert_eq!(err, CrashError::remote(Some(502), "Bad Gateway"));
    }

    #[test]
    fn test_rejects_invalid_token() {
        let result = HttpBackend::new(&ConsoleConfig {
            api_token: Some("line\nbreak".to_string()),
            ..ConsoleConfig::default()
        });
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_envelope_tolerates_missing_message_and_data() {
        let envelope: Envelope<Option<EndData>> = serde_json::from_str(r#"{"message":"ok"}"#).unwrap();
        assert!(envelope.data.is_none());

        let envelope: Envelope<Option<EndData>> =
            serde_json::from_str(r#"{"data":{"resetCount":4}}"#).unwrap();
        assert_eq!(envelope.message, None);
        assert_eq!(envelope.data.and_then(|d| d.reset_count), Some(4));
    }
}
