use realtime_client::{
    ConnectionSettings,
    credential::{
        KeyAuth, DEFAULT_DEPLOYMENT, DEFAULT_SESSIONS_URL, DEFAULT_VOICE, DEFAULT_WEBRTC_URL,
        DEFAULT_WEBSOCKET_URL,
    },
};
use secrecy::SecretString;
use std::path::PathBuf;
use tracing::Level;
use voicedesk_core::PersonaKind;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub api_key: Option<SecretString>,
    pub key_auth: KeyAuth,
    pub sessions_url: String,
    pub webrtc_url: String,
    pub websocket_url: String,
    pub deployment: String,
    pub voice: String,
    pub persona: PersonaKind,
    pub state_dir: PathBuf,
    pub prompts_path: Option<PathBuf>,
    pub portfolio_profile: Option<PathBuf>,
    pub log_collector_url: Option<String>,
    pub logout_url: Option<String>,
    pub config_url: Option<String>,
    pub log_level: Level,
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Unset and blank values are both treated as absent.
fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let sessions_url = var_or("SESSIONS_URL", DEFAULT_SESSIONS_URL);
        // An Azure key is sent the Azure way even behind a proxy URL.
        let (api_key, key_auth) = match (
            optional_var("OPENAI_API_KEY"),
            optional_var("AZURE_OPENAI_API_KEY"),
        ) {
            (Some(key), _) => (Some(key), KeyAuth::for_url(&sessions_url)),
            (None, Some(key)) => (Some(key), KeyAuth::ApiKeyHeader),
            (None, None) => (None, KeyAuth::for_url(&sessions_url)),
        };
        let api_key = api_key.map(SecretString::from);
        let config_url = optional_var("CONFIG_URL");

        let persona_str = var_or("PERSONA", "career");
        let persona = persona_str
            .parse::<PersonaKind>()
            .map_err(|e| ConfigError::InvalidValue("PERSONA".to_string(), e))?;

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            api_key,
            key_auth,
            sessions_url,
            webrtc_url: var_or("WEBRTC_URL", DEFAULT_WEBRTC_URL),
            websocket_url: var_or("REALTIME_WS_URL", DEFAULT_WEBSOCKET_URL),
            deployment: var_or("DEPLOYMENT", DEFAULT_DEPLOYMENT),
            voice: var_or("VOICE", DEFAULT_VOICE),
            persona,
            state_dir: PathBuf::from(var_or("STATE_DIR", "./.voicedesk")),
            prompts_path: optional_var("PROMPTS_PATH").map(PathBuf::from),
            portfolio_profile: optional_var("PORTFOLIO_PROFILE").map(PathBuf::from),
            log_collector_url: optional_var("LOG_COLLECTOR_URL"),
            logout_url: optional_var("LOGOUT_URL"),
            config_url,
            log_level,
        })
    }

    /// Connection parameters for the vendor. Only needed to start a
    /// session, so the key is checked here rather than at load time. With
    /// `CONFIG_URL` set a missing key is left empty for the configuration
    /// endpoint to fill in.
    pub fn connection_settings(&self) -> Result<ConnectionSettings, ConfigError> {
        let key = match (&self.api_key, &self.config_url) {
            (Some(key), _) => key.clone(),
            (None, Some(_)) => SecretString::from(String::new()),
            (None, None) => {
                return Err(ConfigError::MissingVar(
                    "OPENAI_API_KEY or AZURE_OPENAI_API_KEY must be set when CONFIG_URL is not"
                        .to_string(),
                ));
            }
        };
        let mut settings = ConnectionSettings::new(key);
        settings.auth = self.key_auth;
        settings.sessions_url = self.sessions_url.clone();
        settings.webrtc_url = self.webrtc_url.clone();
        settings.websocket_url = self.websocket_url.clone();
        settings.deployment = self.deployment.clone();
        settings.voice = self.voice.clone();
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serial_test::serial;
    use std::env;

    const VARS: [&str; 15] = [
        "OPENAI_API_KEY",
        "AZURE_OPENAI_API_KEY",
        "SESSIONS_URL",
        "WEBRTC_URL",
        "REALTIME_WS_URL",
        "DEPLOYMENT",
        "VOICE",
        "PERSONA",
        "STATE_DIR",
        "PROMPTS_PATH",
        "PORTFOLIO_PROFILE",
        "LOG_COLLECTOR_URL",
        "LOGOUT_URL",
        "CONFIG_URL",
        "RUST_LOG",
    ];

    fn clear_env_vars() {
        for var in VARS {
            unsafe {
                env::remove_var(var);
            }
        }
    }

    #[test]
    fn test_config_error_display() {
        let missing_var = ConfigError::MissingVar("TEST_VAR".to_string());
        assert_eq!(
            format!("{}", missing_var),
            "Missing environment variable: TEST_VAR"
        );

        let invalid_value =
            ConfigError::InvalidValue("TEST_VAR".to_string(), "bad_value".to_string());
        assert_eq!(
            format!("{}", invalid_value),
            "Invalid value for environment variable TEST_VAR: bad_value"
        );
    }

    #[test]
    #[serial]
    fn test_config_from_env_minimal() {
        clear_env_vars();
        unsafe {
            env::set_var("OPENAI_API_KEY", "test-openai-key");
        }

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(
            config.api_key.as_ref().map(|k| k.expose_secret().to_string()),
            Some("test-openai-key".to_string())
        );
        assert_eq!(config.sessions_url, DEFAULT_SESSIONS_URL);
        assert_eq!(config.key_auth, KeyAuth::Bearer);
        assert_eq!(config.deployment, "gpt-realtime");
        assert_eq!(config.voice, "alloy");
        assert_eq!(config.persona, PersonaKind::Career);
        assert_eq!(config.state_dir, PathBuf::from("./.voicedesk"));
        assert_eq!(config.prompts_path, None);
        assert_eq!(config.log_collector_url, None);
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    #[serial]
    fn test_config_from_env_custom_values() {
        clear_env_vars();
        unsafe {
            env::set_var("AZURE_OPENAI_API_KEY", "azure-key");
            env::set_var("SESSIONS_URL", "https://example.test/sessions");
            env::set_var("WEBRTC_URL", "https://example.test/rtc");
            env::set_var("DEPLOYMENT", "gpt-4o-realtime-preview");
            env::set_var("VOICE", "verse");
            env::set_var("PERSONA", "portfolio");
            env::set_var("STATE_DIR", "/tmp/voicedesk");
            env::set_var("PROMPTS_PATH", "/custom/prompts");
            env::set_var("LOG_COLLECTOR_URL", "http://localhost:9000/log");
            env::set_var("LOGOUT_URL", "   ");
            env::set_var("RUST_LOG", "debug");
        }

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.persona, PersonaKind::Portfolio);
        assert_eq!(config.state_dir, PathBuf::from("/tmp/voicedesk"));
        assert_eq!(config.prompts_path, Some(PathBuf::from("/custom/prompts")));
        assert_eq!(
            config.log_collector_url.as_deref(),
            Some("http://localhost:9000/log")
        );
        assert_eq!(config.logout_url, None);
        assert_eq!(config.log_level, Level::DEBUG);

        let settings = config.connection_settings().unwrap();
        assert_eq!(settings.api_key.expose_secret(), "azure-key");
        assert_eq!(settings.auth, KeyAuth::ApiKeyHeader);
        assert_eq!(
            settings.negotiation_url(),
            "https://example.test/rtc?model=gpt-4o-realtime-preview"
        );
        assert_eq!(settings.voice, "verse");
    }

    #[test]
    #[serial]
    fn test_config_url_stands_in_for_missing_key() {
        clear_env_vars();
        unsafe {
            env::set_var("CONFIG_URL", "http://localhost:9000/config");
        }

        let config = Config::from_env().expect("Config should load successfully");
        assert!(config.api_key.is_none());
        assert_eq!(
            config.connection_settings().unwrap().api_key.expose_secret(),
            ""
        );
    }

    #[test]
    #[serial]
    fn test_missing_key_only_fails_when_connecting() {
        clear_env_vars();

        let config = Config::from_env().expect("status and purge need no key");
        assert!(config.api_key.is_none());

        let err = config.connection_settings().unwrap_err();
        match err {
            ConfigError::MissingVar(msg) => assert!(msg.contains("OPENAI_API_KEY")),
            _ => panic!("Expected MissingVar for OPENAI_API_KEY"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_persona() {
        clear_env_vars();
        unsafe {
            env::set_var("OPENAI_API_KEY", "test-openai-key");
            env::set_var("PERSONA", "pirate");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, msg) => {
                assert_eq!(var, "PERSONA");
                assert!(msg.contains("pirate"));
            }
            _ => panic!("Expected InvalidValue for PERSONA"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_log_level() {
        clear_env_vars();
        unsafe {
            env::set_var("OPENAI_API_KEY", "test-openai-key");
            env::set_var("RUST_LOG", "not-a-level");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "RUST_LOG"),
            _ => panic!("Expected InvalidValue for RUST_LOG"),
        }
    }
}
