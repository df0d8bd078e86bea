mod common;

use std::sync::Arc;

use httpmock::Method::{GET, POST};
use httpmock::MockServer;
use serde_json::json;

use common::{harness, harness_with_speech, FixedClassifier, Harness, ScriptedLlm, ScriptedSpeech};
use pixie::bridge::telegram::{TelegramBridge, TelegramState};
use pixie::bridge::BridgeRunner;
use pixie::config::TelegramConfig;
use pixie::router::Intent;

const TOKEN: &str = "123:abc";

fn bridge_for(h: &Harness, server: &MockServer, allowed: Option<&str>) -> TelegramBridge {
    let config = TelegramConfig {
        bot_token: Some(TOKEN.to_string()),
        chat_id: None,
        allowed_chat_id: allowed.map(str::to_string),
    };
    TelegramBridge::new(
        &config,
        h.data_dir().join("TelegramState.json"),
        Arc::clone(&h.assistant),
    )
    .unwrap()
    .with_api_base(server.base_url())
}

fn chatting(reply: &str) -> Harness {
    harness(
        ScriptedLlm::answering(reply),
        FixedClassifier::returning(vec![Intent::General("hello".to_string())]),
        false,
    )
}

#[test]
fn missing_token_is_a_config_error() {
    let h = chatting("unused");
    let err = TelegramBridge::new(
        &TelegramConfig::default(),
        h.data_dir().join("TelegramState.json"),
        Arc::clone(&h.assistant),
    )
    .err()
    .unwrap();
    assert!(matches!(err, pixie::error::PixieError::Config(_)));
}

#[tokio::test]
async fn text_updates_are_answered_and_offset_is_persisted() {
    let h = chatting("Hi Ada.");
    let server = MockServer::start_async().await;
    let updates = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("/bot{TOKEN}/getUpdates"))
                .body_includes("\"offset\":1");
            then.status(200).json_body(json!({
                "ok": true,
                "result": [{"update_id": 10, "message": {"chat": {"id": 42}, "text": "hello"}}]
            }));
        })
        .await;
    let sent = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("/bot{TOKEN}/sendMessage"))
                .body_includes("\"chat_id\":\"42\"")
                .body_includes("\"text\":\"Hi Ada.\"");
            then.status(200)
                .json_body(json!({"ok": true, "result": {"message_id": 1}}));
        })
        .await;

    let bridge = bridge_for(&h, &server, None);
    let next = bridge.poll_once(1).await.unwrap();

    assert_eq!(next, 11);
    updates.assert_calls(1);
    sent.assert_calls(1);
    let state: TelegramState = serde_json::from_str(
        &std::fs::read_to_string(h.data_dir().join("TelegramState.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(state.last_update_id, 10);
    assert_eq!(state.primary_chat_id, "42");
    assert_eq!(h.log.messages().unwrap().len(), 2);
}

#[tokio::test]
async fn messages_from_other_chats_are_ignored() {
    let h = chatting("Hi Ada.");
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(format!("/bot{TOKEN}/getUpdates"));
            then.status(200).json_body(json!({
                "ok": true,
                "result": [{"update_id": 3, "message": {"chat": {"id": 99}, "text": "hello"}}]
            }));
        })
        .await;
    let sent = server
        .mock_async(|when, then| {
            when.method(POST).path(format!("/bot{TOKEN}/sendMessage"));
            then.status(200).json_body(json!({"ok": true, "result": {}}));
        })
        .await;

    let bridge = bridge_for(&h, &server, Some("42"));
    assert_eq!(bridge.poll_once(0).await.unwrap(), 4);
    sent.assert_calls(0);
    assert_eq!(h.llm.call_count(), 0);
    assert_eq!(bridge.load_state().primary_chat_id, "");
}

#[tokio::test]
async fn start_links_the_chat_for_later_notifications() {
    let h = chatting("unused");
    let server = MockServer::start_async().await;
    let welcome = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("/bot{TOKEN}/sendMessage"))
                .body_includes("Pixie Telegram bridge connected.");
            then.status(200).json_body(json!({"ok": true, "result": {}}));
        })
        .await;
    let notice = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("/bot{TOKEN}/sendMessage"))
                .body_includes("\"chat_id\":\"42\"")
                .body_includes("\"text\":\"Reminder: stretch\"");
            then.status(200).json_body(json!({"ok": true, "result": {}}));
        })
        .await;

    let bridge = bridge_for(&h, &server, None);
    assert_eq!(
        bridge.send_text("Reminder: stretch", None).await.unwrap(),
        "No Telegram chat is linked yet. Send /start to your bot first."
    );

    bridge.handle_text("42", "/start").await.unwrap();
    welcome.assert_calls(1);
    assert_eq!(
        bridge.send_text("Reminder: stretch", None).await.unwrap(),
        "Sent to Telegram."
    );
    notice.assert_calls(1);
}

#[tokio::test]
async fn clear_command_empties_the_chat_log() {
    let h = chatting("unused");
    h.log.append_turn("Hello.", "Hi.").unwrap();
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(format!("/bot{TOKEN}/sendMessage"));
            then.status(200).json_body(json!({"ok": true, "result": {}}));
        })
        .await;

    bridge_for(&h, &server, None)
        .handle_text("42", "/clear")
        .await
        .unwrap();
    assert!(h.log.messages().unwrap().is_empty());
}

#[tokio::test]
async fn long_replies_are_split_into_chunks() {
    let h = chatting("unused");
    let server = MockServer::start_async().await;
    let sent = server
        .mock_async(|when, then| {
            when.method(POST).path(format!("/bot{TOKEN}/sendMessage"));
            then.status(200).json_body(json!({"ok": true, "result": {}}));
        })
        .await;

    let bridge = bridge_for(&h, &server, None);
    bridge
        .send_text(&"a".repeat(4500), Some("42"))
        .await
        .unwrap();
    sent.assert_calls(2);
}

#[tokio::test]
async fn rejected_calls_surface_the_description() {
    let h = chatting("unused");
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(format!("/bot{TOKEN}/sendMessage"));
            then.status(403).json_body(json!({
                "ok": false,
                "description": "Forbidden: bot was blocked by the user"
            }));
        })
        .await;

    let err = bridge_for(&h, &server, None)
        .send_text("hello", Some("42"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("bot was blocked"), "{err}");
}

#[tokio::test]
async fn voice_notes_need_a_speech_provider() {
    let h = chatting("unused");
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(format!("/bot{TOKEN}/getUpdates"));
            then.status(200).json_body(json!({
                "ok": true,
                "result": [{"update_id": 5, "message": {"chat": {"id": 42}, "voice": {"file_id": "voice-1"}}}]
            }));
        })
        .await;
    let reply = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("/bot{TOKEN}/sendMessage"))
                .body_includes("Please add a Groq API key for transcription.");
            then.status(200).json_body(json!({"ok": true, "result": {}}));
        })
        .await;

    bridge_for(&h, &server, None).poll_once(5).await.unwrap();
    reply.assert_calls(1);
}

#[tokio::test]
async fn runner_stops_on_request() {
    let h = chatting("unused");
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(format!("/bot{TOKEN}/getUpdates"));
            then.status(200)
                .json_body(json!({"ok": true, "result": []}))
                .delay(std::time::Duration::from_millis(50));
        })
        .await;

    let mut runner = BridgeRunner::start(Arc::new(bridge_for(&h, &server, None)));
    tokio::time::sleep(std::time::Duration::from_millis(120)).await;
    assert!(runner.is_running());
    runner.stop().await.unwrap();
    assert!(!runner.is_running());
}

#[tokio::test]
async fn unlisted_chats_get_answers_but_never_drive_the_desktop() {
    let h = harness(
        ScriptedLlm::answering("I can only chat from here."),
        FixedClassifier::returning(vec![
            Intent::Close("e".to_string()),
            Intent::Open("terminal".to_string()),
            Intent::General("close e".to_string()),
        ]),
        false,
    );
    let server = MockServer::start_async().await;
    let sent = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("/bot{TOKEN}/sendMessage"))
                .body_includes("I can only chat from here.");
            then.status(200).json_body(json!({"ok": true, "result": {}}));
        })
        .await;

    bridge_for(&h, &server, None)
        .handle_text("999", "close e")
        .await
        .unwrap();
    sent.assert_calls(1);
    assert!(h.launcher.actions().is_empty());
}

fn voice_harness(reply: &str, heard: &str) -> (Harness, Arc<ScriptedSpeech>) {
    let speech = ScriptedSpeech::hearing(heard);
    let h = harness_with_speech(
        ScriptedLlm::answering(reply),
        FixedClassifier::returning(vec![Intent::General(heard.to_string())]),
        Arc::clone(&speech),
    );
    (h, speech)
}

#[tokio::test]
async fn voice_notes_are_transcribed_and_answered_aloud() {
    let (h, speech) = voice_harness("Rust is a systems language.", "what is rust");
    let server = MockServer::start_async().await;
    let get_file = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("/bot{TOKEN}/getFile"))
                .body_includes("\"file_id\":\"voice-7\"");
            then.status(200).json_body(json!({
                "ok": true,
                "result": {"file_id": "voice-7", "file_path": "voice/file_7.oga"}
            }));
        })
        .await;
    let download = server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/file/bot{TOKEN}/voice/file_7.oga"));
            then.status(200).body("OggS-fake-audio");
        })
        .await;
    let voice_reply = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("/bot{TOKEN}/sendVoice"))
                .body_includes("reply.mp3");
            then.status(200).json_body(json!({"ok": true, "result": {}}));
        })
        .await;
    let transcript = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("/bot{TOKEN}/sendMessage"))
                .body_includes("\"text\":\"Transcript: What is rust?\"");
            then.status(200).json_body(json!({"ok": true, "result": {}}));
        })
        .await;

    bridge_for(&h, &server, None)
        .handle_voice("42", "voice-7")
        .await
        .unwrap();

    get_file.assert_calls(1);
    download.assert_calls(1);
    voice_reply.assert_calls(1);
    transcript.assert_calls(1);
    assert_eq!(speech.spoken(), vec!["Rust is a systems language."]);
    assert_eq!(
        h.llm.last_call().last().map(|m| m.content.as_str()),
        Some("What is rust?")
    );
}

#[tokio::test]
async fn voice_command_falls_back_to_an_audio_upload() {
    let (h, speech) = voice_harness("unused", "unused");
    let server = MockServer::start_async().await;
    let rejected = server
        .mock_async(|when, then| {
            when.method(POST).path(format!("/bot{TOKEN}/sendVoice"));
            then.status(400).json_body(json!({
                "ok": false,
                "description": "Bad Request: wrong file type"
            }));
        })
        .await;
    let audio = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("/bot{TOKEN}/sendAudio"))
                .body_includes("Pixie reply");
            then.status(200).json_body(json!({"ok": true, "result": {}}));
        })
        .await;
    let text = server
        .mock_async(|when, then| {
            when.method(POST).path(format!("/bot{TOKEN}/sendMessage"));
            then.status(200).json_body(json!({"ok": true, "result": {}}));
        })
        .await;

    bridge_for(&h, &server, None)
        .handle_text("42", "/voice Good morning, Ada")
        .await
        .unwrap();

    rejected.assert_calls(1);
    audio.assert_calls(1);
    text.assert_calls(0);
    assert_eq!(speech.spoken(), vec!["Good morning, Ada"]);
}

#[tokio::test]
async fn voice_command_without_speech_explains_itself() {
    let h = chatting("unused");
    let server = MockServer::start_async().await;
    let reply = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("/bot{TOKEN}/sendMessage"))
                .body_includes("Voice replies need SpeechAPIKey or GroqAPIKey.");
            then.status(200).json_body(json!({"ok": true, "result": {}}));
        })
        .await;

    bridge_for(&h, &server, None)
        .handle_text("42", "/voice hello")
        .await
        .unwrap();
    reply.assert_calls(1);
}

#[tokio::test]
async fn file_commands_need_an_allowed_chat() {
    let h = chatting("unused");
    std::fs::write(h.data_dir().join("secret.txt"), "top secret").unwrap();
    let server = MockServer::start_async().await;
    let refusal = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("/bot{TOKEN}/sendMessage"))
                .body_includes("File transfer is disabled.");
            then.status(200).json_body(json!({"ok": true, "result": {}}));
        })
        .await;
    let upload = server
        .mock_async(|when, then| {
            when.method(POST).path(format!("/bot{TOKEN}/sendDocument"));
            then.status(200).json_body(json!({"ok": true, "result": {}}));
        })
        .await;

    let bridge = bridge_for(&h, &server, None);
    let path = h.data_dir().join("secret.txt");
    bridge
        .handle_text("42", &format!("/sendfile {}", path.display()))
        .await
        .unwrap();
    bridge
        .handle_text("42", &format!("/sendfolder {}", h.data_dir().display()))
        .await
        .unwrap();

    refusal.assert_calls(2);
    upload.assert_calls(0);
}

#[tokio::test]
async fn sendfile_uploads_images_as_photos() {
    let h = chatting("unused");
    let photo = h.data_dir().join("cat.png");
    std::fs::write(&photo, "png-bytes").unwrap();
    let server = MockServer::start_async().await;
    let upload = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("/bot{TOKEN}/sendPhoto"))
                .body_includes("cat.png")
                .body_includes("png-bytes");
            then.status(200).json_body(json!({"ok": true, "result": {}}));
        })
        .await;
    let confirmation = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("/bot{TOKEN}/sendMessage"))
                .body_includes("Sent file: cat.png");
            then.status(200).json_body(json!({"ok": true, "result": {}}));
        })
        .await;

    bridge_for(&h, &server, Some("42"))
        .handle_text("42", &format!("/sendfile {}", photo.display()))
        .await
        .unwrap();
    upload.assert_calls(1);
    confirmation.assert_calls(1);
}

#[tokio::test]
async fn sendfile_reports_missing_files() {
    let h = chatting("unused");
    let server = MockServer::start_async().await;
    let reply = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("/bot{TOKEN}/sendMessage"))
                .body_includes("Not found:");
            then.status(200).json_body(json!({"ok": true, "result": {}}));
        })
        .await;

    let missing = h.data_dir().join("missing.pdf");
    bridge_for(&h, &server, Some("42"))
        .handle_text("42", &format!("/sendfile {}", missing.display()))
        .await
        .unwrap();
    reply.assert_calls(1);
}

#[tokio::test]
async fn sendfolder_uploads_a_zip_and_cleans_up() {
    let h = chatting("unused");
    let project = h.data_dir().join("project");
    std::fs::create_dir_all(project.join("src")).unwrap();
    std::fs::write(project.join("README.md"), "hello").unwrap();
    std::fs::write(project.join("src/main.rs"), "fn main() {}").unwrap();
    let server = MockServer::start_async().await;
    let upload = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("/bot{TOKEN}/sendDocument"))
                .body_includes("Folder ZIP: project")
                .body_includes(".zip");
            then.status(200).json_body(json!({"ok": true, "result": {}}));
        })
        .await;
    let preparing = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("/bot{TOKEN}/sendMessage"))
                .body_includes("Preparing folder ZIP");
            then.status(200).json_body(json!({"ok": true, "result": {}}));
        })
        .await;
    let summary = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("/bot{TOKEN}/sendMessage"))
                .body_includes("2 files");
            then.status(200).json_body(json!({"ok": true, "result": {}}));
        })
        .await;

    let bridge = bridge_for(&h, &server, Some("42"));
    bridge
        .handle_text("42", &format!("/sendfolder {}", project.display()))
        .await
        .unwrap();

    upload.assert_calls(1);
    preparing.assert_calls(1);
    summary.assert_calls(1);
    let leftovers = std::fs::read_dir(h.data_dir().join("TelegramFiles"))
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(leftovers, 0);
}
