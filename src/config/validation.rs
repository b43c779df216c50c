use super::ServerConfig;

/// Validate engine thresholds and timeouts
///
/// Ensures that:
/// - the early-trigger threshold is a confidence in [0, 1]
/// - the energy threshold is positive
/// - every duration and sample rate is non-zero
pub fn validate_engine(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    if !(0.0..=1.0).contains(&config.early_trigger_threshold) {
        return Err(format!(
            "EARLY_TRIGGER_THRESHOLD must be between 0.0 and 1.0 (got {})",
            config.early_trigger_threshold
        )
        .into());
    }

    if !(config.energy_threshold > 0.0) {
        return Err(format!(
            "ENERGY_THRESHOLD must be positive (got {})",
            config.energy_threshold
        )
        .into());
    }

    let positive = [
        ("SILENCE_MS", config.silence_ms),
        ("CANCEL_ACK_TIMEOUT_MS", config.cancel_ack_timeout_ms),
        ("STT_SLICE_MS", config.stt_slice_ms),
        ("MAX_STATE_DURATION_SECS", config.max_state_duration_secs),
        ("REPLY_TIMEOUT_SECS", config.reply_timeout_secs),
        ("AUDIO_SAMPLE_RATE", config.audio_sample_rate as u64),
        ("TTS_SAMPLE_RATE", config.tts_sample_rate as u64),
    ];
    for (name, value) in positive {
        if value == 0 {
            return Err(format!("{name} must be greater than zero").into());
        }
    }

    Ok(())
}

/// Validate telemetry settings
///
/// The queue and the per-session totals must hold at least one entry, and a
/// store path, when given, must not point at a directory.
pub fn validate_telemetry(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.telemetry_queue_capacity == 0 {
        return Err("TELEMETRY_QUEUE_CAPACITY must be greater than zero".into());
    }

    if config.telemetry_max_sessions == 0 {
        return Err("TELEMETRY_MAX_SESSIONS must be greater than zero".into());
    }

    if let Some(path) = &config.telemetry_store_path
        && path.is_dir()
    {
        return Err(format!(
            "TELEMETRY_STORE_PATH points to a directory: {}",
            path.display()
        )
        .into());
    }

    Ok(())
}

/// Run every validation over a merged configuration.
pub fn validate(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    validate_engine(config)?;
    validate_telemetry(config)?;
    Ok(())
}
