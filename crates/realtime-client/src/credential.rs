//! Short-lived session credentials.

use crate::error::{RealtimeError, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

pub const DEFAULT_SESSIONS_URL: &str = "https://api.openai.com/v1/realtime/sessions";
pub const DEFAULT_WEBRTC_URL: &str = "https://api.openai.com/v1/realtime";
pub const DEFAULT_WEBSOCKET_URL: &str = "wss://api.openai.com/v1/realtime";
pub const DEFAULT_DEPLOYMENT: &str = "gpt-realtime";
pub const DEFAULT_VOICE: &str = "alloy";

/// How the long-lived key is presented to the vendor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyAuth {
    /// `Authorization: Bearer <key>`, as api.openai.com expects.
    #[default]
    Bearer,
    /// `api-key: <key>`, as Azure OpenAI resources expect.
    ApiKeyHeader,
}

impl KeyAuth {
    /// Azure-hosted endpoints take the `api-key` header, everything else a
    /// bearer token.
    pub fn for_url(url: &str) -> Self {
        let host = url
            .split("://")
            .nth(1)
            .unwrap_or(url)
            .split(['/', '?', ':'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        if host.ends_with(".azure.com") {
            KeyAuth::ApiKeyHeader
        } else {
            KeyAuth::Bearer
        }
    }

    /// Header name and value carrying `key`.
    pub fn header(&self, key: &str) -> (&'static str, String) {
        match self {
            KeyAuth::Bearer => ("Authorization", format!("Bearer {}", key)),
            KeyAuth::ApiKeyHeader => ("api-key", key.to_string()),
        }
    }
}

/// Where and how to reach the realtime vendor.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub api_key: SecretString,
    pub auth: KeyAuth,
    pub sessions_url: String,
    pub webrtc_url: String,
    pub websocket_url: String,
    pub deployment: String,
    pub voice: String,
}

impl ConnectionSettings {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            auth: KeyAuth::for_url(DEFAULT_SESSIONS_URL),
            sessions_url: DEFAULT_SESSIONS_URL.to_string(),
            webrtc_url: DEFAULT_WEBRTC_URL.to_string(),
            websocket_url: DEFAULT_WEBSOCKET_URL.to_string(),
            deployment: DEFAULT_DEPLOYMENT.to_string(),
            voice: DEFAULT_VOICE.to_string(),
        }
    }

    /// SDP exchange endpoint with the model selector.
    pub fn negotiation_url(&self) -> String {
        format!("{}?model={}", self.webrtc_url, self.deployment)
    }

    pub fn websocket_endpoint(&self) -> String {
        format!("{}?model={}", self.websocket_url, self.deployment)
    }
}

/// The credential returned by the session endpoint. Valid for one
/// negotiation; never stored.
#[derive(Debug, Clone)]
pub struct EphemeralCredential {
    pub session_id: Option<String>,
    pub key: SecretString,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    client_secret: Option<ClientSecret>,
}

#[derive(Debug, Deserialize)]
struct ClientSecret {
    #[serde(default)]
    value: Option<String>,
}

/// Requests an ephemeral key for `settings.deployment`.
pub async fn request_credential(
    http: &reqwest::Client,
    settings: &ConnectionSettings,
) -> Result<EphemeralCredential> {
    debug!(url = %settings.sessions_url, auth = ?settings.auth, "Requesting session credential");
    let (header, value) = settings.auth.header(settings.api_key.expose_secret());
    let response = http
        .post(&settings.sessions_url)
        .header(header, value)
        .json(&json!({
            "model": settings.deployment,
            "voice": settings.voice,
        }))
        .send()
        .await
        .map_err(|e| RealtimeError::Credential(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(RealtimeError::Credential(format!(
            "session API error: {} - {}",
            status, body
        )));
    }

    let body: SessionResponse = response
        .json()
        .await
        .map_err(|e| RealtimeError::Credential(e.to_string()))?;
    let key = body
        .client_secret
        .and_then(|secret| secret.value)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            RealtimeError::Credential("response carried no client secret".to_string())
        })?;

    info!(session_id = body.id.as_deref().unwrap_or("unknown"), "Session credential obtained");
    Ok(EphemeralCredential {
        session_id: body.id,
        key: SecretString::from(key),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_auth_follows_endpoint_host() {
        assert_eq!(KeyAuth::for_url(DEFAULT_SESSIONS_URL), KeyAuth::Bearer);
        assert_eq!(
            KeyAuth::for_url("https://my-resource.openai.azure.com/openai/realtimeapi/sessions?api-version=2025-04-01-preview"),
            KeyAuth::ApiKeyHeader
        );
        assert_eq!(
            KeyAuth::for_url("https://eastus2.realtimeapi-preview.ai.azure.com/v1/realtimertc"),
            KeyAuth::ApiKeyHeader
        );
        // Only the host decides.
        assert_eq!(KeyAuth::for_url("http://127.0.0.1:8080/azure.com/sessions"), KeyAuth::Bearer);
    }

    #[test]
    fn test_default_settings_use_bearer_header() {
        let settings = ConnectionSettings::new(SecretString::from("sk-live".to_string()));
        assert_eq!(settings.auth, KeyAuth::Bearer);
        assert_eq!(
            settings.auth.header(settings.api_key.expose_secret()),
            ("Authorization", "Bearer sk-live".to_string())
        );
        assert_eq!(
            KeyAuth::ApiKeyHeader.header("az-key"),
            ("api-key", "az-key".to_string())
        );
    }
}
