//! Collaborator endpoints around a session: the remote configuration fetch
//! and the logout call.

use crate::{
    credential::{ConnectionSettings, KeyAuth},
    error::{RealtimeError, Result},
};
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

pub const DEFAULT_LOGOUT_REDIRECT: &str = "/register";

/// Connection parameters served by a configuration endpoint. Missing or
/// empty fields keep the local value.
#[derive(Clone, Default, Deserialize)]
pub struct RemoteSettings {
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    pub sessions_url: Option<String>,
    #[serde(default)]
    pub webrtc_url: Option<String>,
    #[serde(default)]
    pub deployment: Option<String>,
    #[serde(default)]
    pub voice: Option<String>,
}

impl std::fmt::Debug for RemoteSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("sessions_url", &self.sessions_url)
            .field("webrtc_url", &self.webrtc_url)
            .field("deployment", &self.deployment)
            .field("voice", &self.voice)
            .finish()
    }
}

impl RemoteSettings {
    pub fn apply(self, settings: &mut ConnectionSettings) {
        fn take(target: &mut String, value: Option<String>) {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                *target = value;
            }
        }
        if let Some(key) = self.api_key.filter(|k| !k.is_empty()) {
            settings.api_key = SecretString::from(key);
        }
        if let Some(url) = self.sessions_url.as_deref().filter(|u| !u.is_empty()) {
            settings.auth = KeyAuth::for_url(url);
        }
        take(&mut settings.sessions_url, self.sessions_url);
        take(&mut settings.webrtc_url, self.webrtc_url);
        take(&mut settings.deployment, self.deployment);
        take(&mut settings.voice, self.voice);
    }
}

pub async fn fetch_remote_settings(http: &reqwest::Client, url: &str) -> Result<RemoteSettings> {
    let response = http.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(RealtimeError::Credential(format!(
            "configuration endpoint returned {}",
            status
        )));
    }
    let remote = response.json::<RemoteSettings>().await?;
    info!("Connection settings fetched");
    Ok(remote)
}

#[derive(Debug, Deserialize)]
struct LogoutResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    redirect: Option<String>,
}

/// Calls the external logout endpoint and returns where the user should go
/// next. Without an endpoint the default redirect is returned.
pub async fn remote_logout(http: &reqwest::Client, url: Option<&str>) -> Result<String> {
    let Some(url) = url else {
        return Ok(DEFAULT_LOGOUT_REDIRECT.to_string());
    };
    let response = http.post(url).json(&json!({})).send().await?;
    let body: LogoutResponse = response.json().await?;
    if !body.success {
        warn!("Logout endpoint reported failure");
        return Err(RealtimeError::Transport("logout was not accepted".to_string()));
    }
    Ok(body
        .redirect
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| DEFAULT_LOGOUT_REDIRECT.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_remote_settings_override_non_empty_fields() {
        let mut settings = ConnectionSettings::new(SecretString::from("local-key".to_string()));
        let remote: RemoteSettings = serde_json::from_str(
            r#"{"api_key": "remote-key", "sessions_url": "", "deployment": "gpt-4o-realtime", "voice": "verse"}"#,
        )
        .unwrap();
        remote.apply(&mut settings);

        assert_eq!(settings.api_key.expose_secret(), "remote-key");
        assert_eq!(settings.sessions_url, crate::credential::DEFAULT_SESSIONS_URL);
        assert_eq!(settings.deployment, "gpt-4o-realtime");
        assert_eq!(settings.voice, "verse");
        assert_eq!(
            settings.negotiation_url(),
            "https://api.openai.com/v1/realtime?model=gpt-4o-realtime"
        );
    }

    #[test]
    fn test_remote_azure_endpoint_switches_key_header() {
        let mut settings = ConnectionSettings::new(SecretString::from("local-key".to_string()));
        let remote: RemoteSettings = serde_json::from_str(
            r#"{"sessions_url": "https://voice.openai.azure.com/openai/realtimeapi/sessions"}"#,
        )
        .unwrap();
        remote.apply(&mut settings);

        assert_eq!(settings.auth, KeyAuth::ApiKeyHeader);
        assert_eq!(settings.api_key.expose_secret(), "local-key");
    }

    #[tokio::test]
    async fn test_logout_without_endpoint_uses_default_redirect() {
        let redirect = remote_logout(&reqwest::Client::new(), None).await.unwrap();
        assert_eq!(redirect, DEFAULT_LOGOUT_REDIRECT);
    }
}
