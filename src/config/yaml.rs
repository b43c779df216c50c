use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Environment
/// variables override any values specified here.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 3001
///
/// providers:
///   deepgram_api_key: "your-deepgram-key"
///   openai_api_key: "your-openai-key"
///   openai_base_url: "https://api.openai.com/v1"
///   openai_model: "gpt-4o-mini"
///   reply_system_prompt: "You are a concise voice assistant."
///   stt_model: "nova-2"
///   stt_language: "en-US"
///   tts_voice: "aura-asteria-en"
///   audio_sample_rate: 16000
///   tts_sample_rate: 24000
///
/// engine:
///   interruption_threshold: 0.7
///   interruption_cooldown_ms: 1000
///   interruptions_enabled: true
///   early_trigger_threshold: 0.8
///   energy_threshold: 500.0
///   silence_ms: 500
///   min_speech_ms: 250
///   pre_roll_ms: 500
///   cancel_ack_timeout_ms: 40
///   stt_slice_ms: 250
///   max_state_duration_secs: 15
///   reply_timeout_secs: 12
///
/// telemetry:
///   queue_capacity: 1024
///   drop_policy: "drop_oldest"
///   store_path: "/var/lib/parley/costs.jsonl"
///   max_sessions: 1000
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub providers: Option<ProvidersYaml>,
    pub engine: Option<EngineYaml>,
    pub telemetry: Option<TelemetryYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Collaborator settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ProvidersYaml {
    pub deepgram_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub openai_model: Option<String>,
    pub reply_system_prompt: Option<String>,
    pub stt_model: Option<String>,
    pub stt_language: Option<String>,
    pub tts_voice: Option<String>,
    pub audio_sample_rate: Option<u32>,
    pub tts_sample_rate: Option<u32>,
}

/// Turn-taking thresholds and timeouts from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct EngineYaml {
    pub interruption_threshold: Option<f32>,
    pub interruption_cooldown_ms: Option<u64>,
    pub interruptions_enabled: Option<bool>,
    pub early_trigger_threshold: Option<f32>,
    pub energy_threshold: Option<f32>,
    pub silence_ms: Option<u64>,
    pub min_speech_ms: Option<u64>,
    pub pre_roll_ms: Option<u64>,
    pub cancel_ack_timeout_ms: Option<u64>,
    pub stt_slice_ms: Option<u64>,
    pub max_state_duration_secs: Option<u64>,
    pub reply_timeout_secs: Option<u64>,
}

/// Telemetry pipeline settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TelemetryYaml {
    pub queue_capacity: Option<usize>,
    pub drop_policy: Option<String>,
    pub store_path: Option<String>,
    pub max_sessions: Option<usize>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if:
    /// - The file cannot be read
    /// - The YAML is malformed
    /// - Fields have invalid types
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_yaml_config_full() {
        let yaml = r#"
server:
  host: "127.0.0.1"
  port: 8080

providers:
  deepgram_api_key: "dg-key"
  openai_api_key: "oa-key"
  openai_model: "gpt-4o"
  tts_voice: "aura-luna-en"
  audio_sample_rate: 8000

engine:
  interruption_threshold: 0.6
  interruption_cooldown_ms: 1500
  interruptions_enabled: false
  silence_ms: 700

telemetry:
  queue_capacity: 64
  drop_policy: "drop_newest"
  store_path: "/tmp/costs.jsonl"
"#;

        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();

        let server = config.server.as_ref().unwrap();
        assert_eq!(server.host, Some("127.0.0.1".to_string()));
        assert_eq!(server.port, Some(8080));

        let providers = config.providers.as_ref().unwrap();
        assert_eq!(providers.deepgram_api_key, Some("dg-key".to_string()));
        assert_eq!(providers.openai_model, Some("gpt-4o".to_string()));
        assert_eq!(providers.audio_sample_rate, Some(8000));
        assert!(providers.stt_model.is_none());

        let engine = config.engine.as_ref().unwrap();
        assert_eq!(engine.interruption_threshold, Some(0.6));
        assert_eq!(engine.interruption_cooldown_ms, Some(1500));
        assert_eq!(engine.interruptions_enabled, Some(false));
        assert_eq!(engine.silence_ms, Some(700));

        let telemetry = config.telemetry.as_ref().unwrap();
        assert_eq!(telemetry.queue_capacity, Some(64));
        assert_eq!(telemetry.drop_policy, Some("drop_newest".to_string()));
    }

    #[test]
    fn test_yaml_config_partial() {
        let yaml = r#"
server:
  port: 9000
"#;

        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();

        assert!(config.server.as_ref().unwrap().host.is_none());
        assert_eq!(config.server.as_ref().unwrap().port, Some(9000));
        assert!(config.providers.is_none());
        assert!(config.engine.is_none());
        assert!(config.telemetry.is_none());
    }

    #[test]
    fn test_yaml_config_empty() {
        let config: YamlConfig = serde_yaml::from_str("").unwrap();

        assert!(config.server.is_none());
        assert!(config.providers.is_none());
    }

    #[test]
    fn test_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        fs::write(
            &config_path,
            "server:\n  host: \"localhost\"\n  port: 3000\n",
        )
        .unwrap();

        let config = YamlConfig::from_file(&config_path).unwrap();

        assert_eq!(
            config.server.as_ref().unwrap().host,
            Some("localhost".to_string())
        );
        assert_eq!(config.server.as_ref().unwrap().port, Some(3000));
    }

    #[test]
    fn test_from_file_not_found() {
        let path = PathBuf::from("/nonexistent/config.yaml");
        let result = YamlConfig::from_file(&path);

        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read config file")
        );
    }

    #[test]
    fn test_from_file_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("invalid.yaml");

        fs::write(&config_path, "engine:\n  silence_ms: \"soon\"\n").unwrap();

        let result = YamlConfig::from_file(&config_path);

        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to parse YAML")
        );
    }
}
