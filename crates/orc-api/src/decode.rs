use eventsource_stream::Event;
use orc_types::Usage;
use serde::Deserialize;
use serde_json::Value;

use crate::error::ApiError;

/// A decoded unit of streamed provider output, common to both wire shapes
/// (spec §6 "two shapes share a common streaming envelope").
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    TextDelta(String),
    Usage(Usage),
    Done,
}

/// Message-style (Anthropic-shape) SSE decoder: `content_block_delta` for
/// text, `message_delta`/`message_stop` for usage, `[DONE]`-equivalent is
/// the stream simply ending.
pub fn decode_anthropic_event(event: &Event) -> Result<Option<StreamEvent>, ApiError> {
    if event.data.trim().is_empty() {
        return Ok(None);
    }
    let value: Value = serde_json::from_str(&event.data)?;
    let event_type = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::Protocol("missing `type` field in SSE event".into()))?;

    match event_type {
        "content_block_delta" => {
            let text = value
                .get("delta")
                .and_then(|d| d.get("text"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            if text.is_empty() {
                Ok(None)
            } else {
                Ok(Some(StreamEvent::TextDelta(text.to_string())))
            }
        }
        "message_delta" | "message_start" => {
            let usage = value.get("usage").and_then(parse_anthropic_usage);
            Ok(usage.map(StreamEvent::Usage))
        }
        "message_stop" => Ok(Some(StreamEvent::Done)),
        _ => Ok(None),
    }
}

fn parse_anthropic_usage(value: &Value) -> Option<Usage> {
    let tokens_in = value.get("input_tokens").and_then(Value::as_u64).unwrap_or(0);
    let tokens_out = value.get("output_tokens").and_then(Value::as_u64).unwrap_or(0);
    if tokens_in == 0 && tokens_out == 0 {
        None
    } else {
        Some(Usage { tokens_in, tokens_out })
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiCompatChunk {
    choices: Vec<OpenAiCompatChoice>,
    #[serde(default)]
    usage: Option<OpenAiCompatUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiCompatChoice {
    #[serde(default)]
    delta: OpenAiCompatDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAiCompatDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiCompatUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

/// OpenAI-compatible `choices[].delta` decoder. The stream's terminal
/// marker is the literal line `data: [DONE]`.
pub fn decode_openai_compat_event(event: &Event) -> Result<Option<StreamEvent>, ApiError> {
    let data = event.data.trim();
    if data.is_empty() {
        return Ok(None);
    }
    if data == "[DONE]" {
        return Ok(Some(StreamEvent::Done));
    }

    let chunk: OpenAiCompatChunk = serde_json::from_str(data)?;
    if let Some(usage) = chunk.usage {
        return Ok(Some(StreamEvent::Usage(Usage {
            tokens_in: usage.prompt_tokens,
            tokens_out: usage.completion_tokens,
        })));
    }

    let choice = chunk.choices.first();
    if let Some(choice) = choice {
        if let Some(content) = &choice.delta.content {
            if !content.is_empty() {
                return Ok(Some(StreamEvent::TextDelta(content.clone())));
            }
        }
        if choice.finish_reason.is_some() {
            return Ok(Some(StreamEvent::Done));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(data: &str) -> Event {
        Event {
            event: "message".to_string(),
            data: data.to_string(),
            id: String::new(),
            retry: None,
        }
    }

    #[test]
    fn decodes_anthropic_text_delta() {
        let evt = event(r#"{"type":"content_block_delta","delta":{"text":"hi"}}"#);
        assert_eq!(
            decode_anthropic_event(&evt).unwrap(),
            Some(StreamEvent::TextDelta("hi".to_string()))
        );
    }

    #[test]
    fn decodes_anthropic_message_stop() {
        let evt = event(r#"{"type":"message_stop"}"#);
        assert_eq!(decode_anthropic_event(&evt).unwrap(), Some(StreamEvent::Done));
    }

    #[test]
    fn decodes_openai_compat_delta() {
        let evt = event(r#"{"choices":[{"delta":{"content":"yo"}}]}"#);
        assert_eq!(
            decode_openai_compat_event(&evt).unwrap(),
            Some(StreamEvent::TextDelta("yo".to_string()))
        );
    }

    #[test]
    fn decodes_openai_compat_done_marker() {
        let evt = event("[DONE]");
        assert_eq!(decode_openai_compat_event(&evt).unwrap(), Some(StreamEvent::Done));
    }

    #[test]
    fn decodes_openai_compat_usage() {
        let evt = event(r#"{"choices":[],"usage":{"prompt_tokens":3,"completion_tokens":5}}"#);
        assert_eq!(
            decode_openai_compat_event(&evt).unwrap(),
            Some(StreamEvent::Usage(Usage { tokens_in: 3, tokens_out: 5 }))
        );
    }
}
