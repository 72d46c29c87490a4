//! End-to-end meeting flow against a mock model endpoint.
//!
//! Exercises the full path: targeting -> solicitation over HTTP -> live
//! SSE stream -> chain dispatch -> persistence, with the real `ChatClient`
//! talking to a wiremock server.

use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use conclave_core::meeting::{resolve, MeetingSession, TurnDriver, TurnOutcome};
use conclave_core::storage::Storage;
use conclave_core::{Agent, ColorAssigner, Profile};
use conclave_llm::{ChatClient, ChatClientConfig};

fn sse_body(text: &str) -> String {
    let mut body = String::new();
    // Two fragments so the renderer sees a real multi-chunk stream
    let mid = text
        .char_indices()
        .map(|(i, _)| i)
        .take_while(|i| *i <= text.len() / 2)
        .last()
        .unwrap_or(0);
    let (a, b) = text.split_at(mid);
    for fragment in [a, b] {
        body.push_str(&format!(
            "data: {}\n\n",
            serde_json::json!({
                "choices": [{"delta": {"content": fragment}, "finish_reason": null}]
            })
        ));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

/// Mount a non-streaming reply for one model.
async fn mock_chat(server: &MockServer, model: &str, reply: &str) {
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(serde_json::json!({"model": model})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{
                "message": {"role": "assistant", "content": reply},
                "finish_reason": "stop"
            }]
        })))
        .with_priority(5)
        .mount(server)
        .await;
}

/// Mount a streamed reply for one model (matches `"stream": true`).
async fn mock_stream(server: &MockServer, model: &str, reply: &str) {
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(
            serde_json::json!({"model": model, "stream": true}),
        ))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(sse_body(reply), "text/event-stream"),
        )
        .with_priority(1)
        .mount(server)
        .await;
}

fn setup() -> (TempDir, Storage, Vec<Agent>, MeetingSession, Profile) {
    let dir = TempDir::new().unwrap();
    let storage = Storage::with_base_dir(dir.path());
    storage.init().unwrap();

    let agents = vec![
        Agent::new("ceo", "model-ceo", "You are the CEO."),
        Agent::new("cto", "model-cto", "You are the CTO."),
        Agent::new("cfo", "model-cfo", "You are the CFO."),
    ];
    for agent in &agents {
        storage.save_agent(agent).unwrap();
    }

    let roster: Vec<String> = agents.iter().map(|a| a.name.clone()).collect();
    let session = MeetingSession::new("boardroom", roster, "default");
    storage.save_meeting_session(&session).unwrap();

    (dir, storage, agents, session, Profile::new("default"))
}

#[tokio::test]
async fn direct_target_chains_to_mentioned_agent() {
    let server = MockServer::start().await;
    let ceo_reply = "Growth first, then platform work. @cto how feasible is that?";
    let cto_reply = "Feasible by March with current headcount.";
    mock_chat(&server, "model-ceo", ceo_reply).await;
    mock_stream(&server, "model-ceo", ceo_reply).await;
    mock_chat(&server, "model-cto", cto_reply).await;
    mock_stream(&server, "model-cto", cto_reply).await;

    let (_dir, storage, agents, mut session, profile) = setup();
    let client =
        ChatClient::new(ChatClientConfig::default().with_base_url(server.uri())).unwrap();

    let roster: Vec<String> = agents.iter().map(|a| a.name.clone()).collect();
    let message = resolve("ceo, what's our Q1 plan?", &roster);
    assert_eq!(message.targeted_agents, vec!["ceo"]);

    let mut colors = ColorAssigner::new();
    let mut out = Vec::new();
    let mut driver = TurnDriver::new(&client, &storage, &mut colors, &mut out);
    let outcome = driver
        .run_user_turn(&mut session, &agents, &profile, message)
        .await
        .unwrap();

    assert_eq!(outcome, TurnOutcome::Completed);

    // user(0), ceo(0), relay(1), cto(1)
    assert_eq!(session.shared_messages.len(), 4);
    assert_eq!(session.shared_messages[1].agent_name.as_deref(), Some("ceo"));
    assert_eq!(session.shared_messages[1].content, ceo_reply);
    assert_eq!(session.shared_messages[3].agent_name.as_deref(), Some("cto"));
    assert_eq!(session.shared_messages[3].chain_depth, 1);

    // The turn was persisted with recomputed metadata
    let reloaded = storage.load_meeting_session("room-boardroom").unwrap();
    assert_eq!(reloaded.metadata.total_messages, 4);
}

#[tokio::test]
async fn broadcast_with_passes_streams_single_responder() {
    let server = MockServer::start().await;
    let cto_reply = "We should prioritize the migration; everything else waits.";
    mock_chat(&server, "model-ceo", "PASS").await;
    mock_chat(&server, "model-cfo", "PASS").await;
    mock_chat(&server, "model-cto", cto_reply).await;
    mock_stream(&server, "model-cto", cto_reply).await;

    let (_dir, storage, agents, mut session, profile) = setup();
    let client =
        ChatClient::new(ChatClientConfig::default().with_base_url(server.uri())).unwrap();

    let roster: Vec<String> = agents.iter().map(|a| a.name.clone()).collect();
    let message = resolve("What should we prioritize?", &roster);
    assert!(!message.is_direct_target);

    let mut colors = ColorAssigner::new();
    let mut out = Vec::new();
    let mut driver = TurnDriver::new(&client, &storage, &mut colors, &mut out);
    driver
        .run_user_turn(&mut session, &agents, &profile, message)
        .await
        .unwrap();

    // Only cto spoke, nothing was buffered
    assert!(session.buffered_responses.is_empty());
    let speakers: Vec<_> = session
        .shared_messages
        .iter()
        .filter_map(|m| m.agent_name.as_deref())
        .collect();
    assert_eq!(speakers, vec!["cto"]);
    assert_eq!(session.shared_messages.last().unwrap().content, cto_reply);
}

#[tokio::test]
async fn endpoint_failure_excludes_agent_without_aborting_turn() {
    let server = MockServer::start().await;
    // ceo's model errors out; cto answers normally
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(serde_json::json!({"model": "model-ceo"})))
        .respond_with(ResponseTemplate::new(500).set_body_string("model exploded"))
        .mount(&server)
        .await;
    let cto_reply = "Covering for the CEO here: plan stays unchanged.";
    mock_chat(&server, "model-cto", cto_reply).await;
    mock_stream(&server, "model-cto", cto_reply).await;
    mock_chat(&server, "model-cfo", "PASS").await;

    let (_dir, storage, agents, mut session, profile) = setup();
    let client =
        ChatClient::new(ChatClientConfig::default().with_base_url(server.uri())).unwrap();

    let roster: Vec<String> = agents.iter().map(|a| a.name.clone()).collect();
    let message = resolve("status?", &roster);

    let mut colors = ColorAssigner::new();
    let mut out = Vec::new();
    let mut driver = TurnDriver::new(&client, &storage, &mut colors, &mut out);
    let outcome = driver
        .run_user_turn(&mut session, &agents, &profile, message)
        .await
        .unwrap();

    assert_eq!(outcome, TurnOutcome::Completed);
    assert_eq!(
        session.shared_messages.last().unwrap().agent_name.as_deref(),
        Some("cto")
    );
}
