//! SSE plumbing for streaming completions.

/// Events emitted during a streaming LLM response.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Incremental text content from the model.
    TextDelta { text: String },
    /// Stream completed.
    Done,
    /// Error during streaming; the stream ends after this.
    Error { message: String },
}

/// Parse a single SSE line (`event: <type>` or `data: <payload>`).
pub fn parse_sse_line(line: &str) -> Option<SseParsed> {
    if let Some(event_type) = line.strip_prefix("event: ") {
        Some(SseParsed::Event(event_type.to_string()))
    } else {
        line.strip_prefix("data: ")
            .map(|data| SseParsed::Data(data.to_string()))
    }
}

#[derive(Debug)]
pub enum SseParsed {
    Event(String),
    Data(String),
}

/// Extract the incremental text from one OpenAI stream chunk.
/// Returns `None` for chunks that carry no delta content.
pub fn delta_text(data: &str) -> Option<String> {
    let chunk: serde_json::Value = serde_json::from_str(data).ok()?;
    chunk
        .pointer("/choices/0/delta/content")
        .and_then(|v| v.as_str())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_data_lines() {
        match parse_sse_line("data: {\"a\":1}") {
            Some(SseParsed::Data(d)) => assert_eq!(d, "{\"a\":1}"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn parses_event_lines() {
        assert!(matches!(
            parse_sse_line("event: message_start"),
            Some(SseParsed::Event(_))
        ));
    }

    #[test]
    fn ignores_other_lines() {
        assert!(parse_sse_line(": keep-alive").is_none());
        assert!(parse_sse_line("").is_none());
    }

    #[test]
    fn extracts_openai_delta() {
        let data = r#"{"choices":[{"delta":{"content":"Hel"}}]}"#;
        assert_eq!(delta_text(data).as_deref(), Some("Hel"));
    }

    #[test]
    fn empty_delta_is_none() {
        assert!(delta_text(r#"{"choices":[{"delta":{}}]}"#).is_none());
        assert!(delta_text(r#"{"choices":[{"delta":{"content":""}}]}"#).is_none());
        assert!(delta_text("not json").is_none());
    }
}
