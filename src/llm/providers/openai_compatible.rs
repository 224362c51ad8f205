use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;

use crate::config::ProviderEntry;
use crate::errors::{EyeControlError, EyeControlResult};
use crate::llm::prompt;
use crate::llm::provider::{ActionProposer, ProposalRequest};
use crate::llm::sse_parser;
use crate::llm::types::{CallConfig, ChatMessage, ContentPart, ImageUrl, StreamChunkKind};

/// Action oracle backed by any OpenAI-compatible chat-completions endpoint
/// (llama.cpp server, vLLM, OpenAI, ...).
pub struct OpenAiCompatibleProvider {
    id: String,
    api_base: String,
    api_key: String,
    call: CallConfig,
    margin: f64,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(
        id: String,
        api_base: String,
        api_key: String,
        call: CallConfig,
        margin: f64,
        timeout: Duration,
    ) -> EyeControlResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            id,
            api_base,
            api_key,
            call,
            margin,
            client,
        })
    }

    /// Build from a config entry. The API key is read from
    /// `EYECONTROL_<ID>_API_KEY`, falling back to the entry's `api_key`.
    pub fn from_entry(id: &str, entry: &ProviderEntry, margin: f64) -> EyeControlResult<Self> {
        let api_key = std::env::var(format!("EYECONTROL_{}_API_KEY", id.to_uppercase()))
            .unwrap_or_else(|_| entry.api_key.clone().unwrap_or_default());
        let call = CallConfig {
            model: entry.model.clone(),
            temperature: entry.temperature,
            top_p: entry.top_p,
            max_tokens: entry.max_tokens,
            stream: entry.stream,
            stop: entry.stop.clone(),
        };
        Self::new(
            id.to_string(),
            entry.api_base.clone(),
            api_key,
            call,
            margin,
            Duration::from_secs(entry.request_timeout_secs),
        )
    }

    fn build_messages(&self, request: &ProposalRequest<'_>) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(prompt::system_prompt(self.margin)),
            ChatMessage::user_parts(vec![
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: request.screenshot.data_uri(),
                    },
                },
                ContentPart::Text {
                    text: prompt::user_prompt(request.objective, request.history),
                },
            ]),
        ]
    }

    fn build_body(&self, messages: &[ChatMessage]) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.call.model,
            "messages": messages,
            "stream": self.call.stream,
            "temperature": self.call.temperature,
            "top_p": self.call.top_p,
            "max_tokens": self.call.max_tokens,
        });
        if !self.call.stop.is_empty() {
            body["stop"] = serde_json::json!(self.call.stop);
        }
        body
    }
}

#[async_trait]
impl ActionProposer for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.id
    }

    async fn propose(&self, request: ProposalRequest<'_>) -> EyeControlResult<String> {
        let messages = self.build_messages(&request);
        let body = self.build_body(&messages);

        tracing::debug!(
            provider = %self.id,
            model = %self.call.model,
            stream = self.call.stream,
            history = request.history.len(),
            "sending LLM request"
        );
        tracing::debug!(body = %sanitize_for_log(&body), "request body (sanitized, base64 omitted)");

        let mut req = self.client.post(&self.api_base).json(&body);
        if !self.api_key.is_empty() {
            req = req.bearer_auth(&self.api_key);
        }
        let response = req.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let err_body = response.text().await.unwrap_or_default();
            return Err(EyeControlError::LlmProvider(format!("{}: {}", status, err_body)));
        }

        if self.call.stream {
            self.handle_stream(response).await
        } else {
            self.handle_json(response).await
        }
    }
}

impl OpenAiCompatibleProvider {
    /// Accumulate SSE content deltas into the full reply.
    async fn handle_stream(&self, response: reqwest::Response) -> EyeControlResult<String> {
        let mut byte_stream = response.bytes_stream();
        let mut lines = sse_parser::SseLineBuffer::new();
        let mut content = String::new();
        let mut reasoning_len = 0usize;

        'stream: while let Some(result) = byte_stream.next().await {
            let bytes = result?;
            for line in lines.push(&bytes) {
                match sse_parser::parse_sse_line(&line) {
                    Ok(Some(chunk)) => match chunk.kind {
                        StreamChunkKind::Content => content.push_str(&chunk.content),
                        StreamChunkKind::Reasoning => {
                            tracing::debug!(reasoning = %chunk.content, "reasoning delta");
                            reasoning_len += chunk.content.len();
                        }
                        StreamChunkKind::Done => break 'stream,
                    },
                    Ok(None) => {}
                    Err(e) => tracing::debug!("SSE parse skipped: {e}"),
                }
            }
        }

        tracing::info!(
            content_len = content.len(),
            reasoning_len,
            "LLM stream complete"
        );
        Ok(content)
    }

    async fn handle_json(&self, response: reqwest::Response) -> EyeControlResult<String> {
        let json: serde_json::Value = response.json().await?;
        let content = extract_content(&json).ok_or_else(|| {
            EyeControlError::LlmProvider(format!("no message content in response: {json}"))
        })?;
        tracing::info!(content_len = content.len(), "LLM JSON response received");
        Ok(content)
    }
}

fn extract_content(json: &serde_json::Value) -> Option<String> {
    json["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
}

/// Clone of `body` with image payloads replaced so logs stay readable.
fn sanitize_for_log(body: &serde_json::Value) -> String {
    let mut log_body = body.clone();
    if let Some(msgs) = log_body.get_mut("messages").and_then(|m| m.as_array_mut()) {
        for msg in msgs {
            let Some(parts) = msg.get_mut("content").and_then(|c| c.as_array_mut()) else {
                continue;
            };
            for part in parts {
                if part.get("type").and_then(|t| t.as_str()) == Some("image_url") {
                    if let Some(url) = part.get_mut("image_url").and_then(|i| i.get_mut("url")) {
                        *url = serde_json::Value::String("<omitted_base64_image>".to_string());
                    }
                }
            }
        }
    }
    serde_json::to_string(&log_body).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::screenshot::Screenshot;
    use std::path::PathBuf;

    fn provider(stream: bool) -> OpenAiCompatibleProvider {
        OpenAiCompatibleProvider::new(
            "local".into(),
            "http://localhost:8080/v1/chat/completions".into(),
            String::new(),
            CallConfig {
                model: "qwen3-vl".into(),
                temperature: 0.1,
                top_p: 0.9,
                max_tokens: 220,
                stream,
                stop: vec!["<|im_end|>".into()],
            },
            0.05,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn body_carries_image_and_sampling_params() {
        let p = provider(false);
        let shot = Screenshot {
            path: PathBuf::from("screen.png"),
            image_bytes: vec![0xff, 0xd8],
        };
        let history = vec![serde_json::json!({"action": "NOOP"})];
        let req = ProposalRequest {
            objective: "open settings",
            history: &history,
            screenshot: &shot,
        };
        let body = p.build_body(&p.build_messages(&req));

        assert_eq!(body["model"], "qwen3-vl");
        assert_eq!(body["max_tokens"], 220);
        assert_eq!(body["stop"][0], "<|im_end|>");
        assert_eq!(body["messages"][0]["role"], "system");
        let parts = body["messages"][1]["content"].as_array().unwrap();
        assert_eq!(parts[0]["type"], "image_url");
        assert!(parts[0]["image_url"]["url"]
            .as_str()
            .unwrap()
            .starts_with("data:image/png;base64,"));
        assert!(parts[1]["text"].as_str().unwrap().contains("open settings"));
    }

    #[test]
    fn sanitized_log_omits_image() {
        let p = provider(true);
        let shot = Screenshot {
            path: PathBuf::from("screen.png"),
            image_bytes: vec![7; 64],
        };
        let req = ProposalRequest {
            objective: "x",
            history: &[],
            screenshot: &shot,
        };
        let body = p.build_body(&p.build_messages(&req));
        let logged = sanitize_for_log(&body);
        assert!(logged.contains("<omitted_base64_image>"));
        assert!(!logged.contains(&shot.image_base64()));
        // the real body still has the payload
        assert!(body.to_string().contains(&shot.image_base64()));
    }

    #[test]
    fn content_is_read_from_first_choice() {
        let json = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "{\"action\":\"WAIT\",\"seconds\":1}"}}]
        });
        assert_eq!(
            extract_content(&json).as_deref(),
            Some("{\"action\":\"WAIT\",\"seconds\":1}")
        );
        assert_eq!(extract_content(&serde_json::json!({"choices": []})), None);
    }
}
