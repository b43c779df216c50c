use std::env;
use std::path::PathBuf;

use super::ServerConfig;
use super::utils::{env_bool, env_parse};
use super::yaml::YamlConfig;
use crate::core::telemetry::DropPolicy;
use crate::core::turn::{clamp_cooldown_ms, clamp_threshold};

/// Merge YAML configuration with environment variables
///
/// Priority order (highest to lowest):
/// 1. Environment variables
/// 2. YAML configuration values
/// 3. Default values
///
/// Interruption threshold and cooldown are clamped into their accepted ranges
/// here; every other value is checked by validation afterwards.
pub fn merge_config(
    yaml_config: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let yaml = yaml_config.unwrap_or_default();
    let server = yaml.server.unwrap_or_default();
    let providers = yaml.providers.unwrap_or_default();
    let engine = yaml.engine.unwrap_or_default();
    let telemetry = yaml.telemetry.unwrap_or_default();
    let defaults = ServerConfig::default();

    // ENV > YAML for optional strings
    macro_rules! get_optional {
        ($env_var:expr, $yaml_value:expr) => {
            env::var($env_var)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .or($yaml_value)
        };
    }

    // ENV > YAML > Default for strings
    macro_rules! get_value {
        ($env_var:expr, $yaml_value:expr, $default:expr) => {
            get_optional!($env_var, $yaml_value).unwrap_or($default)
        };
    }

    // ENV > YAML > Default for parsed values
    macro_rules! get_parsed {
        ($env_var:expr, $yaml_value:expr, $default:expr) => {
            env_parse($env_var)?.or($yaml_value).unwrap_or($default)
        };
    }

    // Server configuration
    let host = get_value!("HOST", server.host, defaults.host);
    let port = get_parsed!("PORT", server.port, defaults.port);

    // Collaborators
    let deepgram_api_key = get_optional!("DEEPGRAM_API_KEY", providers.deepgram_api_key);
    let openai_api_key = get_optional!("OPENAI_API_KEY", providers.openai_api_key);
    let openai_base_url = get_value!(
        "OPENAI_BASE_URL",
        providers.openai_base_url,
        defaults.openai_base_url
    );
    let openai_model = get_value!("OPENAI_MODEL", providers.openai_model, defaults.openai_model);
    let reply_system_prompt =
        get_optional!("REPLY_SYSTEM_PROMPT", providers.reply_system_prompt);
    let stt_model = get_value!("STT_MODEL", providers.stt_model, defaults.stt_model);
    let stt_language = get_value!("STT_LANGUAGE", providers.stt_language, defaults.stt_language);
    let tts_voice = get_value!("TTS_VOICE", providers.tts_voice, defaults.tts_voice);
    let audio_sample_rate = get_parsed!(
        "AUDIO_SAMPLE_RATE",
        providers.audio_sample_rate,
        defaults.audio_sample_rate
    );
    let tts_sample_rate = get_parsed!(
        "TTS_SAMPLE_RATE",
        providers.tts_sample_rate,
        defaults.tts_sample_rate
    );

    // Engine thresholds and timeouts
    let interruption_threshold = clamp_threshold(get_parsed!(
        "INTERRUPTION_THRESHOLD",
        engine.interruption_threshold,
        defaults.interruption_threshold
    ));
    let interruption_cooldown_ms = clamp_cooldown_ms(get_parsed!(
        "INTERRUPTION_COOLDOWN_MS",
        engine.interruption_cooldown_ms,
        defaults.interruption_cooldown_ms
    ));
    let interruptions_enabled = env_bool("INTERRUPTIONS_ENABLED")?
        .or(engine.interruptions_enabled)
        .unwrap_or(defaults.interruptions_enabled);
    let early_trigger_threshold = get_parsed!(
        "EARLY_TRIGGER_THRESHOLD",
        engine.early_trigger_threshold,
        defaults.early_trigger_threshold
    );
    let energy_threshold = get_parsed!(
        "ENERGY_THRESHOLD",
        engine.energy_threshold,
        defaults.energy_threshold
    );
    let silence_ms = get_parsed!("SILENCE_MS", engine.silence_ms, defaults.silence_ms);
    let min_speech_ms = get_parsed!("MIN_SPEECH_MS", engine.min_speech_ms, defaults.min_speech_ms);
    let pre_roll_ms = get_parsed!("PRE_ROLL_MS", engine.pre_roll_ms, defaults.pre_roll_ms);
    let cancel_ack_timeout_ms = get_parsed!(
        "CANCEL_ACK_TIMEOUT_MS",
        engine.cancel_ack_timeout_ms,
        defaults.cancel_ack_timeout_ms
    );
    let stt_slice_ms = get_parsed!("STT_SLICE_MS", engine.stt_slice_ms, defaults.stt_slice_ms);
    let max_state_duration_secs = get_parsed!(
        "MAX_STATE_DURATION_SECS",
        engine.max_state_duration_secs,
        defaults.max_state_duration_secs
    );
    let reply_timeout_secs = get_parsed!(
        "REPLY_TIMEOUT_SECS",
        engine.reply_timeout_secs,
        defaults.reply_timeout_secs
    );

    // Telemetry
    let telemetry_queue_capacity = get_parsed!(
        "TELEMETRY_QUEUE_CAPACITY",
        telemetry.queue_capacity,
        defaults.telemetry_queue_capacity
    );
    let telemetry_drop_policy = match get_optional!("TELEMETRY_DROP_POLICY", telemetry.drop_policy)
    {
        Some(raw) => raw.parse::<DropPolicy>()?,
        None => defaults.telemetry_drop_policy,
    };
    let telemetry_store_path =
        get_optional!("TELEMETRY_STORE_PATH", telemetry.store_path).map(PathBuf::from);
    let telemetry_max_sessions = get_parsed!(
        "TELEMETRY_MAX_SESSIONS",
        telemetry.max_sessions,
        defaults.telemetry_max_sessions
    );

    Ok(ServerConfig {
        host,
        port,
        deepgram_api_key,
        openai_api_key,
        openai_base_url,
        openai_model,
        reply_system_prompt,
        stt_model,
        stt_language,
        tts_voice,
        audio_sample_rate,
        tts_sample_rate,
        interruption_threshold,
        interruption_cooldown_ms,
        interruptions_enabled,
        early_trigger_threshold,
        energy_threshold,
        silence_ms,
        min_speech_ms,
        pre_roll_ms,
        cancel_ack_timeout_ms,
        stt_slice_ms,
        max_state_duration_secs,
        reply_timeout_secs,
        telemetry_queue_capacity,
        telemetry_drop_policy,
        telemetry_store_path,
        telemetry_max_sessions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::yaml::{EngineYaml, ProvidersYaml, ServerYaml, TelemetryYaml};
    use serial_test::serial;

    const VARS: &[&str] = &[
        "HOST",
        "PORT",
        "DEEPGRAM_API_KEY",
        "OPENAI_API_KEY",
        "OPENAI_MODEL",
        "TTS_VOICE",
        "INTERRUPTION_THRESHOLD",
        "INTERRUPTION_COOLDOWN_MS",
        "INTERRUPTIONS_ENABLED",
        "SILENCE_MS",
        "PRE_ROLL_MS",
        "TELEMETRY_DROP_POLICY",
        "TELEMETRY_MAX_SESSIONS",
        "TELEMETRY_STORE_PATH",
    ];

    fn cleanup_env_vars() {
        unsafe {
            for var in VARS {
                env::remove_var(var);
            }
        }
    }

    fn sample_yaml() -> YamlConfig {
        YamlConfig {
            server: Some(ServerYaml {
                host: Some("yaml-host".to_string()),
                port: Some(4000),
            }),
            providers: Some(ProvidersYaml {
                deepgram_api_key: Some("yaml-dg".to_string()),
                openai_model: Some("yaml-model".to_string()),
                ..Default::default()
            }),
            engine: Some(EngineYaml {
                interruption_threshold: Some(0.5),
                silence_ms: Some(800),
                ..Default::default()
            }),
            telemetry: Some(TelemetryYaml {
                drop_policy: Some("drop_newest".to_string()),
                ..Default::default()
            }),
        }
    }

    #[test]
    #[serial]
    fn test_merge_defaults_only() {
        cleanup_env_vars();

        let config = merge_config(None).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3001);
        assert!(config.deepgram_api_key.is_none());
        assert_eq!(config.openai_model, "gpt-4o-mini");
        assert_eq!(config.interruption_threshold, 0.7);
        assert_eq!(config.interruption_cooldown_ms, 1000);
        assert!(config.interruptions_enabled);
        assert_eq!(config.telemetry_drop_policy, DropPolicy::DropOldest);
        assert!(config.telemetry_store_path.is_none());
    }

    #[test]
    #[serial]
    fn test_merge_yaml_over_defaults() {
        cleanup_env_vars();

        let config = merge_config(Some(sample_yaml())).unwrap();
        assert_eq!(config.host, "yaml-host");
        assert_eq!(config.port, 4000);
        assert_eq!(config.deepgram_api_key, Some("yaml-dg".to_string()));
        assert_eq!(config.openai_model, "yaml-model");
        assert_eq!(config.interruption_threshold, 0.5);
        assert_eq!(config.silence_ms, 800);
        assert_eq!(config.telemetry_drop_policy, DropPolicy::DropNewest);
        // Untouched sections keep defaults
        assert_eq!(config.tts_voice, "aura-asteria-en");
    }

    #[test]
    #[serial]
    fn test_merge_env_over_yaml() {
        cleanup_env_vars();
        unsafe {
            env::set_var("HOST", "env-host");
            env::set_var("PORT", "5000");
            env::set_var("DEEPGRAM_API_KEY", "env-dg");
            env::set_var("INTERRUPTION_THRESHOLD", "0.9");
            env::set_var("SILENCE_MS", "300");
            env::set_var("INTERRUPTIONS_ENABLED", "no");
            env::set_var("TELEMETRY_DROP_POLICY", "drop_oldest");
        }

        let config = merge_config(Some(sample_yaml())).unwrap();
        assert_eq!(config.host, "env-host");
        assert_eq!(config.port, 5000);
        assert_eq!(config.deepgram_api_key, Some("env-dg".to_string()));
        assert_eq!(config.interruption_threshold, 0.9);
        assert_eq!(config.silence_ms, 300);
        assert!(!config.interruptions_enabled);
        assert_eq!(config.telemetry_drop_policy, DropPolicy::DropOldest);
        // YAML still fills what env leaves unset
        assert_eq!(config.openai_model, "yaml-model");

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_merge_clamps_interruption_settings() {
        cleanup_env_vars();
        unsafe {
            env::set_var("INTERRUPTION_THRESHOLD", "3.5");
            env::set_var("INTERRUPTION_COOLDOWN_MS", "20");
        }

        let config = merge_config(None).unwrap();
        assert_eq!(config.interruption_threshold, 1.0);
        assert_eq!(config.interruption_cooldown_ms, 100);

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_merge_rejects_malformed_values() {
        cleanup_env_vars();
        unsafe {
            env::set_var("PORT", "not-a-port");
        }
        let err = merge_config(None).unwrap_err();
        assert!(err.to_string().contains("PORT"));
        cleanup_env_vars();

        unsafe {
            env::set_var("TELEMETRY_DROP_POLICY", "drop_everything");
        }
        let err = merge_config(None).unwrap_err();
        assert!(err.to_string().contains("drop policy"));
        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_merge_empty_env_falls_through_to_yaml() {
        cleanup_env_vars();
        unsafe {
            env::set_var("HOST", "");
        }

        let config = merge_config(Some(sample_yaml())).unwrap();
        assert_eq!(config.host, "yaml-host");

        cleanup_env_vars();
    }
}
