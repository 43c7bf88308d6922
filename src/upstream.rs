use std::collections::VecDeque;

use futures::StreamExt;
use futures::stream::{self, BoxStream};
use serde_json::{Value, json};

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::io_struct::Message;

/// Client for the upstream chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    config: RelayConfig,
}

impl UpstreamClient {
    pub fn new(config: RelayConfig) -> anyhow::Result<Self> {
        // No client-wide timeout: the streaming path may stay open for the
        // whole generation. Single-shot calls set a per-request timeout.
        let client = reqwest::Client::builder().build()?;
        Ok(Self { client, config })
    }

    /// Single-shot chat completion. Returns the parsed body unmodified;
    /// extracting the reply text is the caller's concern.
    pub async fn send(&self, messages: &[Message]) -> Result<Value, RelayError> {
        let api_key = self.config.require_api_key()?;
        let payload = json!({
            "model": self.config.model,
            "messages": messages,
        });
        let response = self
            .client
            .post(&self.config.upstream_url)
            .timeout(std::time::Duration::from_secs(
                self.config.request_timeout_secs,
            ))
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::error!("upstream returned {status}");
            return Err(RelayError::UpstreamStatus { status, body });
        }
        Ok(response.json().await?)
    }

    /// Streaming chat completion, translated into text fragments.
    ///
    /// Fragments arrive strictly in frame order. A transport error after the
    /// stream has started is yielded as a single terminal `Err` item; the
    /// stream is finite and not restartable.
    pub async fn stream(
        &self,
        messages: &[Message],
    ) -> Result<BoxStream<'static, Result<String, RelayError>>, RelayError> {
        let api_key = self.config.require_api_key()?;
        let payload = json!({
            "model": self.config.model,
            "messages": messages,
            "stream": true,
        });
        let response = self
            .client
            .post(&self.config.upstream_url)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::error!("upstream stream open failed with {status}");
            return Err(RelayError::UpstreamStatus { status, body });
        }

        let body = response.bytes_stream().boxed();
        let fragments = stream::unfold(
            (body, FrameDecoder::new(), VecDeque::new()),
            |(mut body, mut decoder, mut pending)| async move {
                loop {
                    if let Some(fragment) = pending.pop_front() {
                        return Some((Ok(fragment), (body, decoder, pending)));
                    }
                    if decoder.is_terminated() {
                        return None;
                    }
                    match body.next().await {
                        Some(Ok(chunk)) => pending.extend(decoder.feed(&chunk)),
                        Some(Err(err)) => {
                            decoder.terminate();
                            return Some((
                                Err(RelayError::Transport(err)),
                                (body, decoder, pending),
                            ));
                        }
                        None => {
                            if let Some(tail) = decoder.finish() {
                                pending.push_back(tail);
                            }
                        }
                    }
                }
            },
        );
        Ok(fragments.boxed())
    }
}

/// Incremental decoder for the upstream stream: buffers network chunks into
/// lines and turns each line into at most one text fragment. Two states:
/// awaiting lines, or terminated (after `[DONE]`, end of body, or teardown).
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    terminated: bool,
}

enum LineOutcome {
    Fragment(String),
    Done,
    Nothing,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn terminate(&mut self) {
        self.terminated = true;
        self.buf.clear();
    }

    /// Feed one network chunk, returning the fragments it completed.
    /// Anything after a `[DONE]` sentinel is discarded.
    ///
    /// Buffers raw bytes and decodes only complete lines: chunk boundaries
    /// are arbitrary and may split a multi-byte codepoint.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut fragments = Vec::new();
        if self.terminated {
            return fragments;
        }
        self.buf.extend_from_slice(chunk);
        while let Some(newline) = self.buf.iter().position(|&byte| byte == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=newline).collect();
            match scan_line(&String::from_utf8_lossy(&line)) {
                LineOutcome::Fragment(fragment) => fragments.push(fragment),
                LineOutcome::Done => {
                    self.terminate();
                    break;
                }
                LineOutcome::Nothing => {}
            }
        }
        fragments
    }

    /// Flush a trailing line the upstream never newline-terminated.
    pub fn finish(&mut self) -> Option<String> {
        if self.terminated {
            return None;
        }
        self.terminated = true;
        let tail = std::mem::take(&mut self.buf);
        match scan_line(&String::from_utf8_lossy(&tail)) {
            LineOutcome::Fragment(fragment) => Some(fragment),
            _ => None,
        }
    }
}

fn scan_line(line: &str) -> LineOutcome {
    let line = line.trim();
    if line.is_empty() {
        return LineOutcome::Nothing;
    }
    let raw = line.strip_prefix("data: ").unwrap_or(line);
    if raw == "[DONE]" {
        return LineOutcome::Done;
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(frame) => match extract_fragment(&frame) {
            Some(fragment) => LineOutcome::Fragment(fragment),
            None => LineOutcome::Nothing,
        },
        // Partial frame split across reads, or provider noise. Drop it and
        // keep decoding.
        Err(_) => LineOutcome::Nothing,
    }
}

/// Pull the display text out of one parsed frame. Delta content first, then
/// full-message content; frames without choices may carry a flat top-level
/// `content` field instead.
pub fn extract_fragment(frame: &Value) -> Option<String> {
    if let Some(first) = frame
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
    {
        for key in ["delta", "message"] {
            if let Some(text) = first
                .get(key)
                .and_then(|part| part.get("content"))
                .and_then(Value::as_str)
                .filter(|text| !text.is_empty())
            {
                return Some(text.to_string());
            }
        }
        return None;
    }
    frame
        .get("content")
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .map(str::to_owned)
}
