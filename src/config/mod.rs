//! Configuration module for the Parley server
//!
//! This module handles server configuration from various sources: YAML files and
//! environment variables. Environment variables always override YAML values, and
//! YAML overrides the built-in defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//! - `utils`: Utility functions for configuration parsing
//!
//! # Example
//! ```rust,no_run
//! use parley::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use crate::core::llm::{DEFAULT_OPENAI_BASE_URL, OpenAIConfig};
use crate::core::session::{InterruptionDefaults, SessionConfig};
use crate::core::stt::{CoordinatorConfig, DeepgramSTTConfig, STTConfig};
use crate::core::telemetry::{DropPolicy, TelemetryConfig};
use crate::core::tts::TTSConfig;
use crate::core::vad::{ClassifierConfig, SilenceTrackerConfig};

mod env;
mod merge;
mod utils;
mod validation;
mod yaml;

/// Server configuration
///
/// Contains all configuration needed to run the Parley server, including:
/// - Server settings (host, port)
/// - Collaborator settings (Deepgram transcription and synthesis, OpenAI replies)
/// - Turn-taking thresholds and timeouts
/// - Telemetry pipeline settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // Collaborators
    pub deepgram_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    pub reply_system_prompt: Option<String>,
    pub stt_model: String,
    pub stt_language: String,
    pub tts_voice: String,
    pub audio_sample_rate: u32,
    pub tts_sample_rate: u32,

    // Engine thresholds and timeouts
    pub interruption_threshold: f32,
    pub interruption_cooldown_ms: u64,
    pub interruptions_enabled: bool,
    pub early_trigger_threshold: f32,
    pub energy_threshold: f32,
    pub silence_ms: u64,
    pub min_speech_ms: u64,
    /// Audio kept before speech starts (ms)
    pub pre_roll_ms: u64,
    pub cancel_ack_timeout_ms: u64,
    pub stt_slice_ms: u64,
    pub max_state_duration_secs: u64,
    pub reply_timeout_secs: u64,

    // Telemetry
    pub telemetry_queue_capacity: usize,
    pub telemetry_drop_policy: DropPolicy,
    pub telemetry_store_path: Option<PathBuf>, // if None, records stay in memory
    pub telemetry_max_sessions: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            deepgram_api_key: None,
            openai_api_key: None,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            openai_model: "gpt-4o-mini".to_string(),
            reply_system_prompt: None,
            stt_model: "nova-2".to_string(),
            stt_language: "en-US".to_string(),
            tts_voice: "aura-asteria-en".to_string(),
            audio_sample_rate: 16000,
            tts_sample_rate: 24000,
            interruption_threshold: 0.7,
            interruption_cooldown_ms: 1000,
            interruptions_enabled: true,
            early_trigger_threshold: 0.8,
            energy_threshold: 500.0,
            silence_ms: 500,
            min_speech_ms: 250,
            pre_roll_ms: 500,
            cancel_ack_timeout_ms: 40,
            stt_slice_ms: 250,
            max_state_duration_secs: 15,
            reply_timeout_secs: 12,
            telemetry_queue_capacity: 1024,
            telemetry_drop_policy: DropPolicy::DropOldest,
            telemetry_store_path: None,
            telemetry_max_sessions: 1000,
        }
    }
}

impl ServerConfig {
    /// Load configuration from a YAML file with environment variable overrides
    ///
    /// # Arguments
    /// * `path` - Path to the YAML configuration file
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    ///
    /// # Example
    /// ```rust,no_run
    /// use parley::config::ServerConfig;
    /// use std::path::PathBuf;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let config_path = PathBuf::from("config.yaml");
    /// let config = ServerConfig::from_file(&config_path)?;
    /// println!("Server listening on {}", config.address());
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        // The .env file is not loaded here; only real environment variables
        // override an explicitly chosen YAML file.
        let yaml_config = yaml::YamlConfig::from_file(path)?;

        let config = merge::merge_config(Some(yaml_config))?;

        validation::validate(&config)?;

        Ok(config)
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get API key for a specific collaborator
    ///
    /// # Arguments
    /// * `provider` - The name of the provider ("deepgram" or "openai")
    ///
    /// # Returns
    /// * `Result<String, String>` - The API key on success, or an error message on failure
    pub fn get_api_key(&self, provider: &str) -> Result<String, String> {
        match provider.to_lowercase().as_str() {
            "deepgram" => self.deepgram_api_key.as_ref().cloned().ok_or_else(|| {
                "Deepgram API key not configured in server environment".to_string()
            }),
            "openai" => self.openai_api_key.as_ref().cloned().ok_or_else(|| {
                "OpenAI API key not configured in server environment".to_string()
            }),
            _ => Err(format!("Unsupported provider: {provider}")),
        }
    }

    /// Per-session engine settings derived from this configuration.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            classifier: ClassifierConfig::default()
                .with_energy_threshold(self.energy_threshold)
                .with_sample_rate(self.audio_sample_rate),
            silence: SilenceTrackerConfig::default()
                .with_silence_duration_ms(self.silence_ms)
                .with_min_speech_duration_ms(self.min_speech_ms),
            transcript: CoordinatorConfig {
                slice_ms: self.stt_slice_ms,
                early_trigger_threshold: self.early_trigger_threshold,
                sample_rate: self.audio_sample_rate,
                ..Default::default()
            },
            voice: Some(self.tts_voice.clone()),
            pre_roll_ms: self.pre_roll_ms,
            ..SessionConfig::default()
        }
        .with_interruption(InterruptionDefaults {
            enabled: self.interruptions_enabled,
            threshold: self.interruption_threshold,
            cooldown_ms: self.interruption_cooldown_ms,
        })
        .with_cancel_ack_timeout(Duration::from_millis(self.cancel_ack_timeout_ms))
        .with_max_state_duration(Duration::from_secs(self.max_state_duration_secs))
        .with_reply_timeout(Duration::from_secs(self.reply_timeout_secs))
    }

    pub fn telemetry_config(&self) -> TelemetryConfig {
        TelemetryConfig {
            queue_capacity: self.telemetry_queue_capacity,
            drop_policy: self.telemetry_drop_policy,
            store_path: self.telemetry_store_path.clone(),
            max_sessions: self.telemetry_max_sessions,
            ..Default::default()
        }
    }

    /// Deepgram transcription settings; fails when no Deepgram key is set.
    pub fn deepgram_stt_config(&self) -> Result<DeepgramSTTConfig, String> {
        Ok(DeepgramSTTConfig {
            base: STTConfig {
                api_key: self.get_api_key("deepgram")?,
                language: self.stt_language.clone(),
                sample_rate: self.audio_sample_rate,
                model: self.stt_model.clone(),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    /// Deepgram synthesis settings; fails when no Deepgram key is set.
    pub fn tts_config(&self) -> Result<TTSConfig, String> {
        Ok(TTSConfig {
            api_key: self.get_api_key("deepgram")?,
            voice_id: self.tts_voice.clone(),
            sample_rate: self.tts_sample_rate,
            ..Default::default()
        })
    }

    /// Reply generator settings, or `None` when no OpenAI key is set and
    /// replies are expected from the client.
    pub fn openai_config(&self) -> Option<OpenAIConfig> {
        let api_key = self.openai_api_key.clone()?;
        Some(OpenAIConfig {
            api_key,
            base_url: self.openai_base_url.clone(),
            model: self.openai_model.clone(),
            system_prompt: self.reply_system_prompt.clone(),
            request_timeout: self.reply_timeout_secs,
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_get_api_key() {
        let config = ServerConfig {
            deepgram_api_key: Some("dg-key".to_string()),
            ..Default::default()
        };

        assert_eq!(config.get_api_key("deepgram").unwrap(), "dg-key");
        assert_eq!(config.get_api_key("DeepGram").unwrap(), "dg-key");
        assert!(
            config
                .get_api_key("openai")
                .unwrap_err()
                .contains("OpenAI API key not configured")
        );
        assert_eq!(
            config.get_api_key("elevenlabs").unwrap_err(),
            "Unsupported provider: elevenlabs"
        );
    }

    #[test]
    fn test_address() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Default::default()
        };
        assert_eq!(config.address(), "127.0.0.1:8080");
    }

    #[test]
    fn test_session_config_conversion() {
        let config = ServerConfig {
            interruption_threshold: 0.6,
            interruption_cooldown_ms: 2000,
            interruptions_enabled: false,
            energy_threshold: 800.0,
            silence_ms: 700,
            stt_slice_ms: 200,
            cancel_ack_timeout_ms: 25,
            pre_roll_ms: 300,
            tts_voice: "aura-luna-en".to_string(),
            ..Default::default()
        };

        let session = config.session_config();
        assert_eq!(session.classifier.energy_threshold, 800.0);
        assert_eq!(session.silence.silence_duration_ms, 700);
        assert_eq!(session.transcript.slice_ms, 200);
        assert_eq!(session.transcript.early_trigger_threshold, 0.8);
        assert_eq!(session.interruption.threshold, 0.6);
        assert_eq!(session.interruption.cooldown_ms, 2000);
        assert!(!session.interruption.enabled);
        assert_eq!(session.cancel_ack_timeout, Duration::from_millis(25));
        assert_eq!(session.max_state_duration, Duration::from_secs(15));
        assert_eq!(session.voice.as_deref(), Some("aura-luna-en"));
        assert_eq!(session.pre_roll_ms, 300);
    }

    #[test]
    fn test_collaborator_configs_require_keys() {
        let config = ServerConfig::default();
        assert!(config.deepgram_stt_config().is_err());
        assert!(config.tts_config().is_err());
        assert!(config.openai_config().is_none());

        let config = ServerConfig {
            deepgram_api_key: Some("dg".to_string()),
            openai_api_key: Some("oa".to_string()),
            stt_language: "de-DE".to_string(),
            reply_system_prompt: Some("Be brief.".to_string()),
            ..Default::default()
        };
        let stt = config.deepgram_stt_config().unwrap();
        assert_eq!(stt.base.api_key, "dg");
        assert_eq!(stt.base.language, "de-DE");
        assert_eq!(stt.base.sample_rate, 16000);

        let tts = config.tts_config().unwrap();
        assert_eq!(tts.voice_id, "aura-asteria-en");
        assert_eq!(tts.sample_rate, 24000);

        let openai = config.openai_config().unwrap();
        assert_eq!(openai.model, "gpt-4o-mini");
        assert_eq!(openai.system_prompt.as_deref(), Some("Be brief."));
        assert_eq!(openai.request_timeout, 12);
    }

    #[test]
    fn test_telemetry_config_conversion() {
        let config = ServerConfig {
            telemetry_queue_capacity: 16,
            telemetry_drop_policy: DropPolicy::DropNewest,
            telemetry_store_path: Some(PathBuf::from("/tmp/costs.jsonl")),
            telemetry_max_sessions: 50,
            ..Default::default()
        };
        let telemetry = config.telemetry_config();
        assert_eq!(telemetry.queue_capacity, 16);
        assert_eq!(telemetry.max_sessions, 50);
        assert_eq!(telemetry.drop_policy, DropPolicy::DropNewest);
        assert_eq!(
            telemetry.store_path,
            Some(PathBuf::from("/tmp/costs.jsonl"))
        );
    }

    fn cleanup_env_vars() {
        unsafe {
            env::remove_var("HOST");
            env::remove_var("PORT");
            env::remove_var("DEEPGRAM_API_KEY");
            env::remove_var("OPENAI_API_KEY");
            env::remove_var("SILENCE_MS");
            env::remove_var("INTERRUPTION_THRESHOLD");
        }
    }

    #[test]
    #[serial]
    fn test_from_file_yaml_only() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let yaml_content = r#"
server:
  host: "127.0.0.1"
  port: 8080

providers:
  deepgram_api_key: "yaml-dg-key"

engine:
  silence_ms: 650
"#;

        fs::write(&config_path, yaml_content).unwrap();

        let config = ServerConfig::from_file(&config_path).unwrap();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.deepgram_api_key, Some("yaml-dg-key".to_string()));
        assert_eq!(config.silence_ms, 650);
        assert!(config.openai_api_key.is_none());

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_env_overrides_yaml() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        fs::write(
            &config_path,
            "server:\n  port: 8080\nengine:\n  interruption_threshold: 0.5\n",
        )
        .unwrap();

        unsafe {
            env::set_var("PORT", "9090");
            env::set_var("INTERRUPTION_THRESHOLD", "0.85");
        }

        let config = ServerConfig::from_file(&config_path).unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.interruption_threshold, 0.85);

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_rejects_invalid_values() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "engine:\n  silence_ms: 0\n").unwrap();

        let err = ServerConfig::from_file(&config_path).unwrap_err();
        assert!(err.to_string().contains("SILENCE_MS"));
    }

    #[test]
    fn test_from_file_missing_file() {
        let result = ServerConfig::from_file(&PathBuf::from("/nonexistent/parley.yaml"));
        assert!(result.is_err());
    }
}
