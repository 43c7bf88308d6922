#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use actix_web::{App, HttpRequest, HttpResponse, HttpServer, web};
use bytes::Bytes;
use serde_json::Value;

use voxita_relay::commands::{MediaKey, SystemActions};
use voxita_relay::config::RelayConfig;

pub const TEST_API_KEY: &str = "test-key";

/// In-process stand-in for the chat-completions provider. Scenario selection
/// rides on the request's `model` field so each test can pick a behavior.
pub struct MockUpstream {
    pub url: String,
    handle: actix_web::dev::ServerHandle,
}

impl MockUpstream {
    pub async fn start() -> Self {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = HttpServer::new(|| {
            App::new().route("/chat/completions", web::post().to(completions))
        })
        .workers(1)
        .listen(listener)
        .unwrap()
        .run();
        let handle = server.handle();
        actix_web::rt::spawn(server);
        Self {
            url: format!("http://{addr}/chat/completions"),
            handle,
        }
    }

    pub async fn stop(self) {
        self.handle.stop(true).await;
    }
}

async fn completions(req: HttpRequest, body: web::Json<Value>) -> HttpResponse {
    let authorized = req
        .headers()
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == format!("Bearer {TEST_API_KEY}"));
    if !authorized {
        return HttpResponse::Unauthorized().body("invalid api key");
    }

    match body.get("model").and_then(Value::as_str) {
        Some("fail-500") => HttpResponse::InternalServerError().body("upstream exploded"),
        Some("odd-shape") => HttpResponse::Ok().json(serde_json::json!({"ok": true})),
        _ if body.get("stream").and_then(Value::as_bool).unwrap_or(false) => {
            let frames = concat!(
                "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
                "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
                "data: {\"choices\":[{\"delt\n\n",
                "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
                "data: [DONE]\n\n",
            );
            HttpResponse::Ok()
                .content_type("text/event-stream")
                .body(frames)
        }
        _ => HttpResponse::Ok().json(serde_json::json!({
            "choices": [{"message": {"content": "pong"}}]
        })),
    }
}

pub fn test_config(upstream_url: &str, api_key: Option<&str>, model: &str) -> RelayConfig {
    RelayConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        api_key: api_key.map(str::to_string),
        model: model.to_string(),
        upstream_url: upstream_url.to_string(),
        request_timeout_secs: 5,
    }
}

/// Executor fake: records calls, optionally fails every action.
#[derive(Default)]
pub struct ScriptedActions {
    pub fail: bool,
    pub calls: Mutex<Vec<String>>,
}

impl ScriptedActions {
    pub fn shared(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            fail,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) -> Result<(), String> {
        self.calls.lock().unwrap().push(call);
        if self.fail {
            Err("boom".to_string())
        } else {
            Ok(())
        }
    }
}

impl SystemActions for ScriptedActions {
    fn launch(&self, program: &str) -> Result<(), String> {
        self.record(format!("launch {program}"))
    }

    fn open_url(&self, url: &str) -> Result<(), String> {
        self.record(format!("open_url {url}"))
    }

    fn type_text(&self, text: &str) -> Result<(), String> {
        self.record(format!("type {text}"))
    }

    fn press_media_key(&self, key: MediaKey) -> Result<(), String> {
        self.record(format!("press {key:?}"))
    }

    fn lock_session(&self) -> Result<(), String> {
        self.record("lock".to_string())
    }
}

/// Split an SSE body into its `data:` payloads, parsed as JSON.
pub fn parse_sse_events(body: Bytes) -> Vec<Value> {
    let text = String::from_utf8_lossy(&body);
    let mut events = Vec::new();
    for line in text.lines() {
        if let Some(data) = line.strip_prefix("data: ") {
            if let Ok(json) = serde_json::from_str::<Value>(data) {
                events.push(json);
            }
        }
    }
    events
}
