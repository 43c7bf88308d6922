use std::io::Write;
use std::sync::Arc;

use actix_web::{HttpResponse, HttpServer, get, post, web};
use bytes::Bytes;
use futures::StreamExt;
use futures::stream;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::commands::{CommandDispatcher, OsActions, SystemActions};
use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::io_struct::{ChatRequest, ChatResponse, Message, build_conversation, display_text};
use crate::upstream::UpstreamClient;

const CREATOR_PHRASES: [&str; 4] = [
    "who created you",
    "kisne banaya",
    "who made you",
    "tumhe kisne banaya",
];
const CREATOR_REPLY: &str = "I was created by Kartikey Singh.";

pub struct AppState {
    pub config: RelayConfig,
    pub upstream: UpstreamClient,
    pub dispatcher: CommandDispatcher,
}

impl AppState {
    pub fn new(config: RelayConfig) -> anyhow::Result<Self> {
        Self::with_actions(config, Arc::new(OsActions))
    }

    pub fn with_actions(
        config: RelayConfig,
        actions: Arc<dyn SystemActions>,
    ) -> anyhow::Result<Self> {
        let upstream = UpstreamClient::new(config.clone())?;
        Ok(Self {
            config,
            upstream,
            dispatcher: CommandDispatcher::new(actions),
        })
    }
}

/// Hardcoded identity override, checked after the command dispatcher. The
/// reply is byte-identical across the single-shot and streaming endpoints.
fn creator_reply(message: &str) -> Option<&'static str> {
    let lower = message.to_lowercase();
    let lower = lower.trim();
    CREATOR_PHRASES
        .iter()
        .any(|phrase| lower.contains(phrase))
        .then_some(CREATOR_REPLY)
}

/// Run the command dispatcher off the event loop; its side effects spawn
/// processes and may sleep.
async fn dispatch_local(
    state: &web::Data<AppState>,
    message: &str,
) -> Result<Option<String>, actix_web::Error> {
    let dispatcher = state.dispatcher.clone();
    let message = message.to_string();
    web::block(move || dispatcher.dispatch(&message))
        .await
        .map_err(actix_web::error::ErrorInternalServerError)
}

fn sse_event(chunk: &str, status: &str) -> Bytes {
    Bytes::from(format!(
        "data: {}\n\n",
        json!({ "chunk": chunk, "status": status })
    ))
}

/// Two-event stream for replies that are already complete: the text, then
/// the completion marker. Keeps local replies shaped like upstream ones.
fn canned_sse(text: &str) -> HttpResponse {
    let events: Vec<Result<Bytes, actix_web::Error>> = vec![
        Ok(sse_event(text, "streaming")),
        Ok(sse_event("", "complete")),
    ];
    HttpResponse::Ok()
        .content_type("text/event-stream")
        .streaming(stream::iter(events))
}

#[get("/")]
pub async fn root() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "message": "Voxita AI Backend is running with Groq",
        "status": "active",
    }))
}

#[post("/api/chat")]
pub async fn chat(
    req: web::Json<ChatRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let ChatRequest {
        message,
        conversation_history,
    } = req.into_inner();

    if let Some(response) = dispatch_local(&state, &message).await? {
        return Ok(HttpResponse::Ok().json(ChatResponse::local(response)));
    }
    if let Some(reply) = creator_reply(&message) {
        return Ok(HttpResponse::Ok().json(ChatResponse::relayed(reply)));
    }

    let messages = build_conversation(&conversation_history, &message);
    let body = state.upstream.send(&messages).await?;
    Ok(HttpResponse::Ok().json(ChatResponse::relayed(display_text(&body))))
}

#[derive(Debug, Deserialize)]
pub struct StreamChatQuery {
    pub message: String,
    #[serde(default = "default_history")]
    pub history: String,
}

fn default_history() -> String {
    "[]".to_string()
}

#[get("/api/stream-chat")]
pub async fn stream_chat(
    query: web::Query<StreamChatQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let StreamChatQuery { message, history } = query.into_inner();

    if let Some(response) = dispatch_local(&state, &message).await? {
        return Ok(canned_sse(&response));
    }
    if let Some(reply) = creator_reply(&message) {
        return Ok(canned_sse(reply));
    }

    let history: Vec<Message> =
        serde_json::from_str(&history).map_err(RelayError::InvalidHistory)?;
    let messages = build_conversation(&history, &message);
    let fragments = state.upstream.stream(&messages).await?;

    // A mid-stream Err aborts the response; the completion marker is only
    // reached when the upstream stream ended cleanly.
    let events = fragments
        .map(|item| {
            item.map(|fragment| sse_event(&fragment, "streaming"))
                .map_err(actix_web::Error::from)
        })
        .chain(stream::once(futures::future::ready(Ok(sse_event(
            "", "complete",
        )))));
    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .streaming(events))
}

#[get("/api/health")]
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    let messages = [Message::system("health check"), Message::user("ping")];
    match state.upstream.send(&messages).await {
        Ok(body) => {
            let sample = body
                .get("choices")
                .and_then(Value::as_array)
                .map(|choices| choices.iter().take(1).cloned().collect::<Vec<_>>())
                .unwrap_or_default();
            HttpResponse::Ok().json(json!({
                "status": "healthy",
                "model": state.config.model,
                "groq_connected": true,
                "sample": sample,
            }))
        }
        Err(err) => HttpResponse::Ok().json(json!({
            "status": "unhealthy",
            "error": err.to_string(),
            "groq_connected": false,
        })),
    }
}

pub async fn startup(config: RelayConfig, state: AppState) -> std::io::Result<()> {
    let app_state = web::Data::new(state);

    // default level is info
    env_logger::Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} - {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter(None, log::LevelFilter::Info)
        .init();

    log::info!(
        "starting relay at {}:{} (model {})",
        config.host,
        config.port,
        config.model
    );
    if config.api_key.is_none() {
        log::warn!("GROQ_API_KEY is not set; chat endpoints will fail until it is configured");
    }

    HttpServer::new(move || {
        actix_web::App::new()
            .wrap(actix_web::middleware::Logger::default())
            .app_data(app_state.clone())
            .service(root)
            .service(chat)
            .service(stream_chat)
            .service(health)
    })
    .bind((config.host, config.port))?
    .run()
    .await
}
