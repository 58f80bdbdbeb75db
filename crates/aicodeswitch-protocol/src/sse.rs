//! Byte-stream SSE codec, neutral to payload semantics.
//!
//! The parser consumes arbitrary byte chunks (they need not align with line
//! or event boundaries) and emits fully-formed [`SseEvent`]s as soon as a
//! blank line terminates them. The serializer is the inverse.

use bytes::Bytes;

/// A parsed `data:` payload. `[DONE]` is surfaced as [`SseData::Done`]
/// rather than being handed to a JSON parser; anything that fails to parse
/// as JSON is kept as [`SseData::Raw`] so callers never lose information.
#[derive(Debug, Clone, PartialEq)]
pub enum SseData {
    Json(serde_json::Value),
    Raw(String),
    Done,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub id: Option<String>,
    pub data: SseData,
}

impl SseEvent {
    pub fn json(data: serde_json::Value) -> Self {
        Self { event: None, id: None, data: SseData::Json(data) }
    }

    pub fn named_json(event: impl Into<String>, data: serde_json::Value) -> Self {
        Self { event: Some(event.into()), id: None, data: SseData::Json(data) }
    }

    pub fn done() -> Self {
        Self { event: None, id: None, data: SseData::Done }
    }

    /// The raw `data:` string, reassembled from JSON if needed.
    pub fn data_str(&self) -> String {
        match &self.data {
            SseData::Json(value) => value.to_string(),
            SseData::Raw(raw) => raw.clone(),
            SseData::Done => "[DONE]".to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct PendingEvent {
    event: Option<String>,
    id: Option<String>,
    data_lines: Vec<String>,
    saw_field: bool,
}

impl PendingEvent {
    fn is_empty(&self) -> bool {
        !self.saw_field
    }

    fn finish(self) -> Option<SseEvent> {
        if self.data_lines.is_empty() {
            if self.event.is_none() && self.id.is_none() {
                return None;
            }
        }
        let raw = self.data_lines.join("\n");
        let data = if raw == "[DONE]" {
            SseData::Done
        } else if raw.is_empty() {
            SseData::Raw(String::new())
        } else {
            match serde_json::from_str::<serde_json::Value>(&raw) {
                Ok(value) => SseData::Json(value),
                Err(_) => SseData::Raw(raw),
            }
        };
        Some(SseEvent { event: self.event, id: self.id, data })
    }
}

/// Stateful line-buffering SSE parser. Single-threaded cooperative: callers
/// drive it with `push_bytes` as chunks arrive and `finish` at EOF.
#[derive(Debug, Default)]
pub struct SseParser {
    line_buf: String,
    current: PendingEvent,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.line_buf.push_str(&String::from_utf8_lossy(bytes));
        let mut events = Vec::new();
        loop {
            let Some(pos) = self.line_buf.find('\n') else {
                break;
            };
            let line = self.line_buf[..pos].to_string();
            self.line_buf.drain(..=pos);
            self.consume_line(&line, &mut events);
        }
        events
    }

    /// Flush any buffered trailing event once the upstream byte stream ends.
    pub fn finish(mut self) -> Vec<SseEvent> {
        let mut events = Vec::new();
        if !self.line_buf.is_empty() {
            let remainder = std::mem::take(&mut self.line_buf);
            self.consume_line(&remainder, &mut events);
        }
        if !self.current.is_empty() {
            if let Some(event) = std::mem::take(&mut self.current).finish() {
                events.push(event);
            }
        }
        events
    }

    fn consume_line(&mut self, line: &str, events: &mut Vec<SseEvent>) {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            let pending = std::mem::take(&mut self.current);
            if let Some(event) = pending.finish() {
                events.push(event);
            }
            return;
        }
        if let Some(rest) = line.strip_prefix("event:") {
            self.current.event = Some(trim_field(rest));
            self.current.saw_field = true;
        } else if let Some(rest) = line.strip_prefix("id:") {
            self.current.id = Some(trim_field(rest));
            self.current.saw_field = true;
        } else if let Some(rest) = line.strip_prefix("data:") {
            self.current.data_lines.push(trim_field(rest));
            self.current.saw_field = true;
        }
        // Unknown field names and comment lines (`:...`) are ignored.
    }
}

fn trim_field(value: &str) -> String {
    value.strip_prefix(' ').unwrap_or(value).to_string()
}

/// Serializes parsed events back to wire bytes, the inverse of [`SseParser`].
pub struct SseSerializer;

impl SseSerializer {
    pub fn encode(event: &SseEvent) -> Bytes {
        let mut out = String::new();
        if let Some(name) = &event.event {
            out.push_str("event: ");
            out.push_str(name);
            out.push('\n');
        }
        if let Some(id) = &event.id {
            out.push_str("id: ");
            out.push_str(id);
            out.push('\n');
        }
        match &event.data {
            SseData::Done => out.push_str("data: [DONE]\n"),
            SseData::Raw(raw) => {
                for line in raw.split('\n') {
                    out.push_str("data: ");
                    out.push_str(line);
                    out.push('\n');
                }
            }
            SseData::Json(value) => {
                out.push_str("data: ");
                out.push_str(&value.to_string());
                out.push('\n');
            }
        }
        out.push('\n');
        Bytes::from(out.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_event_split_across_chunks() {
        let mut parser = SseParser::new();
        let mut events = parser.push_bytes(b"event: message_start\nid: 1\nd");
        assert!(events.is_empty());
        events.extend(parser.push_bytes(b"ata: {\"a\":1}\n\n"));
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.event.as_deref(), Some("message_start"));
        assert_eq!(event.id.as_deref(), Some("1"));
        assert_eq!(event.data, SseData::Json(serde_json::json!({"a": 1})));
    }

    #[test]
    fn concatenates_multiple_data_lines_with_newline() {
        let mut parser = SseParser::new();
        let events = parser.push_bytes(b"data: line one\ndata: line two\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, SseData::Raw("line one\nline two".to_string()));
    }

    #[test]
    fn done_sentinel_is_not_parsed_as_json() {
        let mut parser = SseParser::new();
        let events = parser.push_bytes(b"data: [DONE]\n\n");
        assert_eq!(events[0].data, SseData::Done);
    }

    #[test]
    fn non_json_payload_passes_through_raw() {
        let mut parser = SseParser::new();
        let events = parser.push_bytes(b"data: not json\n\n");
        assert_eq!(events[0].data, SseData::Raw("not json".to_string()));
    }

    #[test]
    fn flushes_trailing_event_without_blank_line_on_eof() {
        let mut parser = SseParser::new();
        let events = parser.push_bytes(b"data: partial");
        assert!(events.is_empty());
        let flushed = parser.finish();
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0].data, SseData::Raw("partial".to_string()));
    }

    #[test]
    fn round_trip_serialize_parse() {
        let original = vec![
            SseEvent::named_json("content_block_delta", serde_json::json!({"x": 1})),
            SseEvent::done(),
        ];
        let mut bytes = Vec::new();
        for event in &original {
            bytes.extend_from_slice(&SseSerializer::encode(event));
        }
        let mut parser = SseParser::new();
        let mut parsed = parser.push_bytes(&bytes);
        parsed.extend(parser.finish());
        assert_eq!(parsed, original);
    }
}
