mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use common::{CannedGenerator, Client, GatedSynth, loud_chunk, spawn_server, test_state};
use parley::core::llm::ReplyGenerator;

const REPLY: &str = "Peace be with you. How can I help?";

fn generator(reply: &str) -> Option<Arc<dyn ReplyGenerator>> {
    Some(Arc::new(CannedGenerator::new(reply)))
}

#[tokio::test]
async fn test_connected_greeting_and_ping() {
    let state = test_state(&[], Arc::new(GatedSynth::new(0)), None);
    let addr = spawn_server(state).await;

    let mut client = Client::connect(addr).await;
    assert_eq!(client.session_id.len(), 36);

    client.send_json(json!({"type": "ping"})).await;
    let pong = client.wait_for("pong").await;
    assert!(pong["timestamp"].as_i64().unwrap() > 0);

    client.close().await;
}

#[tokio::test]
async fn test_end_to_end_turn_with_generator() {
    let state = test_state(
        &["hello there"],
        Arc::new(GatedSynth::new(10)),
        generator(REPLY),
    );
    let addr = spawn_server(state).await;
    let mut client = Client::connect(addr).await;

    client.speak_utterance().await;

    let processing = client.wait_for_state("processing").await;
    assert_eq!(processing["from"], "listening");
    assert_eq!(processing["turn"], 1);

    let final_transcript = client.wait_for("transcript_final").await;
    assert_eq!(final_transcript["text"], "hello there");
    assert_eq!(final_transcript["degraded"], false);

    let started = client.wait_for("response_started").await;
    assert_eq!(started["total_chunks"], 2);
    client.wait_for_state("responding").await;

    let first = client.wait_for("audio_chunk").await;
    assert_eq!(first["sequence"], 0);
    assert_eq!(first["total_chunks"], 2);
    assert_eq!(first["text"], "Peace be with you.");
    assert!(!first["payload"].as_str().unwrap().is_empty());

    let second = client.wait_for("audio_chunk").await;
    assert_eq!(second["sequence"], 1);
    assert_eq!(second["text"], "How can I help?");

    let complete = client.wait_for("response_complete").await;
    assert_eq!(complete["chunks_sent"], 2);
    assert_eq!(complete["total_chunks"], 2);

    let listening = client.wait_for_state("listening").await;
    assert_eq!(listening["from"], "responding");

    let types = client.types();
    let detected = types.iter().position(|t| t == "speech_detected").unwrap();
    let processing = types.iter().position(|t| t == "state_changed").unwrap();
    assert!(detected < processing);

    client.close().await;
}

#[tokio::test]
async fn test_interruption_over_websocket() {
    let synth = Arc::new(GatedSynth::new(1));
    let state = test_state(&["tell me a story"], synth.clone(), generator(REPLY));
    let addr = spawn_server(state).await;
    let mut client = Client::connect(addr).await;

    client.speak_utterance().await;
    let first = client.wait_for("audio_chunk").await;
    assert_eq!(first["sequence"], 0);

    client.send_audio_n(&loud_chunk(), 4).await;

    let detected = client.wait_for("interruption_detected").await;
    assert_eq!(detected["chunks_interrupted"], 1);
    assert_eq!(detected["total_chunks"], 2);
    assert!(detected["latency_ms"].as_f64().unwrap() >= 0.0);

    let interrupted = client.wait_for("response_interrupted").await;
    assert_eq!(interrupted["chunks_sent"], 1);
    assert_eq!(interrupted["total_chunks"], 2);

    let listening = client.wait_for_state("listening").await;
    assert_eq!(listening["from"], "responding");

    // Releasing the synthesizer must not leak the cancelled chunk
    synth.permits.add_permits(5);
    let late = client.drain(Duration::from_millis(200)).await;
    assert!(
        late.iter()
            .all(|m| m["type"] != "audio_chunk" && m["type"] != "response_complete"),
        "unexpected messages after interruption: {late:?}"
    );

    client.send_json(json!({"type": "get_interruption_stats"})).await;
    let stats = client.wait_for("interruption_stats").await;
    assert_eq!(stats["total_interruptions"], 1);
    assert_eq!(stats["has_active_response"], false);

    client.close().await;
}

#[tokio::test]
async fn test_client_reply_without_generator() {
    let state = test_state(&["what now"], Arc::new(GatedSynth::new(10)), None);
    let addr = spawn_server(state).await;
    let mut client = Client::connect(addr).await;

    // Outside PROCESSING a reply is rejected but the connection stays up
    client
        .send_json(json!({"type": "reply", "text": "Too early."}))
        .await;
    let error = client.wait_for("error").await;
    assert!(
        error["message"]
            .as_str()
            .unwrap()
            .contains("expected processing")
    );

    client.speak_utterance().await;
    client.wait_for("transcript_final").await;

    client
        .send_json(json!({"type": "reply", "text": "Sure thing."}))
        .await;

    let started = client.wait_for("response_started").await;
    assert_eq!(started["total_chunks"], 1);
    let complete = client.wait_for("response_complete").await;
    assert_eq!(complete["chunks_sent"], 1);
    client.wait_for_state("listening").await;

    client.close().await;
}

#[tokio::test]
async fn test_invalid_message_keeps_connection() {
    let state = test_state(&[], Arc::new(GatedSynth::new(0)), None);
    let addr = spawn_server(state).await;
    let mut client = Client::connect(addr).await;

    client.send_json(json!({"type": "speak", "text": "hi"})).await;
    let error = client.wait_for("error").await;
    assert!(
        error["message"]
            .as_str()
            .unwrap()
            .starts_with("Invalid message format")
    );

    client.send_json(json!({"type": "ping"})).await;
    client.wait_for("pong").await;

    client.close().await;
}

#[tokio::test]
async fn test_configure_and_toggle_interruption() {
    let state = test_state(&[], Arc::new(GatedSynth::new(0)), None);
    let addr = spawn_server(state).await;
    let mut client = Client::connect(addr).await;

    client
        .send_json(json!({"type": "configure_interruption", "threshold": 0.5, "cooldown_ms": 50}))
        .await;
    let configured = client.wait_for("interruption_configured").await;
    assert_eq!(configured["threshold"], 0.5);
    // Cooldown is clamped to its floor
    assert_eq!(configured["cooldown_ms"], 100);
    assert_eq!(configured["enabled"], true);

    client
        .send_json(json!({"type": "enable_interruption", "enabled": false}))
        .await;
    let toggled = client.wait_for("interruption_toggled").await;
    assert_eq!(toggled["enabled"], false);

    client.send_json(json!({"type": "get_interruption_stats"})).await;
    let stats = client.wait_for("interruption_stats").await;
    assert_eq!(stats["enabled"], false);
    assert_eq!(stats["threshold"], 0.5);
    assert_eq!(stats["cooldown_ms"], 100);
    assert_eq!(stats["total_interruptions"], 0);

    client.close().await;
}
