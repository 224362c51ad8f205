use crate::errors::{EyeControlError, EyeControlResult};
use crate::llm::types::{StreamChunk, StreamChunkKind};

/// Parses a raw SSE line (OpenAI-compatible format) into a StreamChunk.
/// Returns None if the line is a keep-alive or non-data line.
pub fn parse_sse_line(line: &str) -> EyeControlResult<Option<StreamChunk>> {
    if line.is_empty() || line.starts_with(':') {
        return Ok(None);
    }

    let data = if let Some(d) = line.strip_prefix("data:") {
        d.trim()
    } else {
        return Ok(None);
    };

    if data == "[DONE]" {
        return Ok(Some(StreamChunk {
            kind: StreamChunkKind::Done,
            content: String::new(),
        }));
    }

    let json: serde_json::Value =
        serde_json::from_str(data).map_err(|e| EyeControlError::SseParsing(e.to_string()))?;

    let Some(first) = json["choices"].as_array().and_then(|c| c.first()) else {
        return Ok(None);
    };
    let delta = &first["delta"];

    // Reasoning content (thinking models expose this separately)
    if let Some(reasoning) = delta["reasoning_content"].as_str() {
        if !reasoning.is_empty() {
            return Ok(Some(StreamChunk {
                kind: StreamChunkKind::Reasoning,
                content: reasoning.to_string(),
            }));
        }
    }

    if let Some(content) = delta["content"].as_str() {
        if !content.is_empty() {
            return Ok(Some(StreamChunk {
                kind: StreamChunkKind::Content,
                content: content.to_string(),
            }));
        }
    }

    if first["finish_reason"].as_str().is_some() {
        return Ok(Some(StreamChunk {
            kind: StreamChunkKind::Done,
            content: String::new(),
        }));
    }

    Ok(None)
}

/// Splits a byte stream into complete lines. Bytes are only decoded once a
/// full line is buffered, so multi-byte characters may straddle chunks.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    buf: Vec<u8>,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `bytes` and drains every complete, non-blank line.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim();
            if !line.is_empty() {
                lines.push(line.to_string());
            }
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keep_alive_and_non_data_lines_are_skipped() {
        assert_eq!(parse_sse_line(": ping").unwrap(), None);
        assert_eq!(parse_sse_line("event: message").unwrap(), None);
    }

    #[test]
    fn content_delta() {
        let chunk = parse_sse_line(r#"data: {"choices":[{"delta":{"content":"{\"action\""}}]}"#)
            .unwrap()
            .unwrap();
        assert_eq!(chunk.kind, StreamChunkKind::Content);
        assert_eq!(chunk.content, "{\"action\"");
    }

    #[test]
    fn reasoning_delta_is_separate() {
        let chunk = parse_sse_line(r#"data: {"choices":[{"delta":{"reasoning_content":"hmm"}}]}"#)
            .unwrap()
            .unwrap();
        assert_eq!(chunk.kind, StreamChunkKind::Reasoning);
    }

    #[test]
    fn done_marker_and_finish_reason() {
        assert_eq!(
            parse_sse_line("data: [DONE]").unwrap().unwrap().kind,
            StreamChunkKind::Done
        );
        let fin = parse_sse_line(r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#)
            .unwrap()
            .unwrap();
        assert_eq!(fin.kind, StreamChunkKind::Done);
    }

    #[test]
    fn broken_json_is_an_error() {
        assert!(matches!(
            parse_sse_line("data: {oops"),
            Err(EyeControlError::SseParsing(_))
        ));
    }

    #[test]
    fn line_buffer_keeps_split_multibyte_characters() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"çık\"}}]}\n";
        let bytes = line.as_bytes();
        let split = line.find('ç').unwrap() + 1;

        let mut buf = SseLineBuffer::new();
        assert!(buf.push(&bytes[..split]).is_empty());
        let lines = buf.push(&bytes[split..]);
        assert_eq!(lines.len(), 1);

        let chunk = parse_sse_line(&lines[0]).unwrap().unwrap();
        assert_eq!(chunk.content, "çık");
    }

    #[test]
    fn line_buffer_splits_crlf_and_skips_blank_lines() {
        let mut buf = SseLineBuffer::new();
        let lines = buf.push(b"data: [DONE]\r\n\r\n: ping\ndata: par");
        assert_eq!(lines, vec!["data: [DONE]".to_string(), ": ping".to_string()]);
        assert_eq!(buf.push(b"tial\n"), vec!["data: partial".to_string()]);
    }
}
