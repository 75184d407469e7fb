//! Groq (OpenAI-compatible) HTTP client implementation

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use async_trait::async_trait;

use crate::base::{
    ChatProvider, ChatResponse, ChatStreamEvent, Message, ProviderError, ProviderEventStream,
    ProviderResult,
};

const DEFAULT_API_BASE: &str = "https://api.groq.com/openai/v1";

/// Chat-completion request format
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
    max_tokens: i32,
    temperature: f64,
}

/// Chat-completion response format
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct Usage {
    #[serde(default)]
    prompt_tokens: i64,
    #[serde(default)]
    completion_tokens: i64,
    #[serde(default)]
    total_tokens: i64,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Groq provider client
pub struct GroqClient {
    client: Client,
    api_base: String,
    api_key: Option<String>,
    default_model: String,
    extra_headers: HashMap<String, String>,
}

impl GroqClient {
    /// Create a new Groq client
    pub fn new(
        api_key: Option<String>,
        api_base: Option<String>,
        default_model: String,
        extra_headers: Option<HashMap<String, String>>,
    ) -> Self {
        let api_base = api_base
            .and_then(|base| {
                let base = base.trim().trim_end_matches('/').to_string();
                if base.is_empty() {
                    None
                } else {
                    Some(base)
                }
            })
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        Self {
            client: Client::builder()
                .http1_only() // Force HTTP/1.1 to avoid issues with some local servers
                .build()
                .unwrap_or_else(|_| Client::new()),
            api_base,
            api_key,
            default_model,
            extra_headers: extra_headers.unwrap_or_default(),
        }
    }

    fn parse_response(&self, response: ChatCompletionResponse) -> ProviderResult<ChatResponse> {
        let choice = response
            .choices
            .first()
            .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".to_string()))?;

        Ok(ChatResponse {
            content: choice.message.content.clone(),
            finish_reason: choice
                .finish_reason
                .clone()
                .unwrap_or_else(|| "stop".to_string()),
            usage: usage_map(&response.usage),
        })
    }

    fn build_request(
        &self,
        messages: Vec<Message>,
        model: Option<String>,
        max_tokens: i32,
        temperature: f64,
        stream: bool,
    ) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: model.unwrap_or_else(|| self.default_model.clone()),
            messages,
            stream: if stream { Some(true) } else { None },
            max_tokens,
            temperature,
        }
    }

    fn apply_headers(&self, mut req_builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(api_key) = &self.api_key {
            req_builder = req_builder.header("Authorization", format!("Bearer {}", api_key));
        }

        for (key, value) in &self.extra_headers {
            req_builder = req_builder.header(key, value);
        }

        req_builder
    }

    fn finalize_partial_response(
        content: String,
        finish_reason: Option<String>,
        usage: Option<Usage>,
    ) -> ChatResponse {
        ChatResponse {
            content: if content.is_empty() {
                None
            } else {
                Some(content)
            },
            finish_reason: finish_reason.unwrap_or_else(|| "stop".to_string()),
            usage: usage.as_ref().map(usage_map).unwrap_or_default(),
        }
    }

    /// Decode the UTF-8 prefix of the buffered bytes, holding back an
    /// incomplete multi-byte character at the end until the next chunk
    /// arrives. Network chunk boundaries do not respect character
    /// boundaries, so decoding each chunk in isolation would corrupt
    /// non-ASCII content.
    fn decode_stream_chunk(pending: &mut Vec<u8>, chunk: &[u8]) -> String {
        pending.extend_from_slice(chunk);
        match std::str::from_utf8(pending) {
            Ok(text) => {
                let text = text.to_string();
                pending.clear();
                text
            }
            Err(err) if err.error_len().is_none() => {
                let valid_to = err.valid_up_to();
                let text = String::from_utf8_lossy(&pending[..valid_to]).into_owned();
                pending.drain(..valid_to);
                text
            }
            Err(_) => {
                // Genuinely malformed bytes; replace and move on
                let text = String::from_utf8_lossy(pending).into_owned();
                pending.clear();
                text
            }
        }
    }

    fn parse_sse_events(buffer: &mut String) -> Vec<String> {
        if buffer.contains("\r\n") {
            *buffer = buffer.replace("\r\n", "\n");
        }

        let mut events = Vec::new();
        while let Some(pos) = buffer.find("\n\n") {
            let raw = buffer[..pos].to_string();
            buffer.drain(..pos + 2);

            let mut data_lines = Vec::new();
            for line in raw.lines() {
                if let Some(rest) = line.strip_prefix("data:") {
                    data_lines.push(rest.trim().to_string());
                }
            }

            if !data_lines.is_empty() {
                events.push(data_lines.join("\n"));
            }
        }
        events
    }
}

fn usage_map(usage: &Usage) -> HashMap<String, i64> {
    let mut map = HashMap::new();
    map.insert("prompt_tokens".to_string(), usage.prompt_tokens);
    map.insert("completion_tokens".to_string(), usage.completion_tokens);
    map.insert("total_tokens".to_string(), usage.total_tokens);
    map
}

#[async_trait]
impl ChatProvider for GroqClient {
    async fn chat(
        &self,
        messages: Vec<Message>,
        model: Option<String>,
        max_tokens: i32,
        temperature: f64,
    ) -> ProviderResult<ChatResponse> {
        let request = self.build_request(messages, model, max_tokens, temperature, false);

        debug!(
            "Sending chat request to {} with model {}",
            self.api_base, request.model
        );

        let url = format!("{}/chat/completions", self.api_base);
        let req_builder = self.apply_headers(self.client.post(&url).json(&request));

        let response = req_builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ProviderError::ApiError(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let response_data: ChatCompletionResponse = response.json().await?;
        self.parse_response(response_data)
    }

    async fn chat_stream(
        &self,
        messages: Vec<Message>,
        model: Option<String>,
        max_tokens: i32,
        temperature: f64,
    ) -> ProviderResult<ProviderEventStream> {
        let request = self.build_request(messages, model, max_tokens, temperature, true);

        debug!(
            "Sending streaming chat request to {} with model {}",
            self.api_base, request.model
        );

        let url = format!("{}/chat/completions", self.api_base);
        let req_builder = self.apply_headers(self.client.post(&url).json(&request));
        let response = req_builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ProviderError::ApiError(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut response = response;
            let mut buffer = String::new();
            let mut pending: Vec<u8> = Vec::new();
            let mut content = String::new();
            let mut finish_reason: Option<String> = None;
            let mut usage: Option<Usage> = None;

            loop {
                let chunk = match response.chunk().await {
                    Ok(Some(bytes)) => bytes,
                    Ok(None) => break,
                    Err(err) => {
                        let _ = tx.send(Err(ProviderError::HttpError(err)));
                        return;
                    }
                };

                let text = Self::decode_stream_chunk(&mut pending, &chunk);
                buffer.push_str(&text);

                for payload in Self::parse_sse_events(&mut buffer) {
                    if payload == "[DONE]" {
                        let final_response = Self::finalize_partial_response(
                            content.clone(),
                            finish_reason.clone(),
                            usage.take(),
                        );
                        let _ = tx.send(Ok(ChatStreamEvent::Completed(final_response)));
                        return;
                    }

                    let parsed = match serde_json::from_str::<StreamChunk>(&payload) {
                        Ok(chunk) => chunk,
                        Err(err) => {
                            let _ = tx.send(Err(ProviderError::JsonError(err)));
                            return;
                        }
                    };

                    if parsed.choices.is_empty() {
                        usage = parsed.usage;
                        continue;
                    }

                    if let Some(choice) = parsed.choices.first() {
                        if let Some(reason) = &choice.finish_reason {
                            finish_reason = Some(reason.clone());
                        }
                        if let Some(delta_text) = &choice.delta.content {
                            content.push_str(delta_text);
                            let _ = tx.send(Ok(ChatStreamEvent::TextDelta(delta_text.clone())));
                        }
                    }
                }
            }

            let final_response =
                Self::finalize_partial_response(content, finish_reason, usage);
            let _ = tx.send(Ok(ChatStreamEvent::Completed(final_response)));
        });

        Ok(Box::pin(futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })))
    }

    fn get_default_model(&self) -> String {
        self.default_model.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn test_client(api_base: &str) -> GroqClient {
        GroqClient::new(
            Some("gsk-test".to_string()),
            Some(api_base.to_string()),
            "llama-3.3-70b-versatile".to_string(),
            None,
        )
    }

    #[test]
    fn test_api_base_defaults_and_trims() {
        let client = GroqClient::new(None, None, "m".to_string(), None);
        assert_eq!(client.api_base, DEFAULT_API_BASE);

        let client = GroqClient::new(None, Some("http://localhost:8080/".to_string()), "m".to_string(), None);
        assert_eq!(client.api_base, "http://localhost:8080");

        let client = GroqClient::new(None, Some("  ".to_string()), "m".to_string(), None);
        assert_eq!(client.api_base, DEFAULT_API_BASE);
    }

    #[test]
    fn test_parse_sse_events() {
        let mut buffer =
            "data: {\"a\":1}\n\ndata: {\"b\":2}\n\ndata: [DONE]\n\ntrailing".to_string();
        let events = GroqClient::parse_sse_events(&mut buffer);
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], "{\"a\":1}");
        assert_eq!(events[1], "{\"b\":2}");
        assert_eq!(events[2], "[DONE]");
        assert_eq!(buffer, "trailing");
    }

    #[test]
    fn test_parse_sse_events_crlf_framing() {
        let mut buffer =
            "data: {\"a\":1}\r\n\r\ndata: [DONE]\r\n\r\n".to_string();
        let events = GroqClient::parse_sse_events(&mut buffer);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], "{\"a\":1}");
        assert_eq!(events[1], "[DONE]");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_decode_stream_chunk_split_multibyte() {
        // "café" with the two-byte 'é' (0xC3 0xA9) split across chunks
        let mut pending = Vec::new();
        let first = GroqClient::decode_stream_chunk(&mut pending, &[b'c', b'a', b'f', 0xC3]);
        assert_eq!(first, "caf");
        assert_eq!(pending, vec![0xC3]);

        let second = GroqClient::decode_stream_chunk(&mut pending, &[0xA9, b'!']);
        assert_eq!(second, "é!");
        assert!(pending.is_empty());
    }

    #[test]
    fn test_decode_stream_chunk_malformed_bytes() {
        // A stray continuation byte can never complete; it must not stall the stream
        let mut pending = Vec::new();
        let text = GroqClient::decode_stream_chunk(&mut pending, &[b'a', 0xA9, b'b']);
        assert_eq!(text, "a\u{FFFD}b");
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_chat_parses_response() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer gsk-test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "choices": [{"message": {"content": "Hello there"}, "finish_reason": "stop"}],
                    "usage": {"prompt_tokens": 5, "completion_tokens": 3, "total_tokens": 8}
                }"#,
            )
            .create_async()
            .await;

        let client = test_client(&server.url());
        let response = client
            .chat(vec![Message::user("Hi")], None, 256, 0.7)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.text(), "Hello there");
        assert_eq!(response.finish_reason, "stop");
        assert_eq!(response.usage.get("total_tokens"), Some(&8));
    }

    #[tokio::test]
    async fn test_chat_surfaces_api_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body("invalid api key")
            .create_async()
            .await;

        let client = test_client(&server.url());
        let err = client
            .chat(vec![Message::user("Hi")], None, 256, 0.7)
            .await
            .unwrap_err();

        match err {
            ProviderError::ApiError(msg) => {
                assert!(msg.contains("401"));
                assert!(msg.contains("invalid api key"));
            }
            other => panic!("expected ApiError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_chat_stream_accumulates_deltas() {
        let mut server = mockito::Server::new_async().await;
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"},\"finish_reason\":\"stop\"}]}\n\n",
            "data: [DONE]\n\n",
        );
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let mut stream = client
            .chat_stream(vec![Message::user("Hi")], None, 256, 0.7)
            .await
            .unwrap();

        let mut deltas = String::new();
        let mut completed = None;
        while let Some(event) = stream.next().await {
            match event.unwrap() {
                ChatStreamEvent::TextDelta(text) => deltas.push_str(&text),
                ChatStreamEvent::Completed(response) => completed = Some(response),
            }
        }

        assert_eq!(deltas, "Hello");
        let response = completed.expect("stream must end with Completed");
        assert_eq!(response.text(), "Hello");
        assert_eq!(response.finish_reason, "stop");
    }
}
