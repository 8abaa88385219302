//! SSE response parsing helpers

/// One parsed SSE event
#[derive(Debug)]
pub struct SseEvent {
    pub name: String,
    pub data: serde_json::Value,
}

/// Parse named SSE events from raw response text
pub fn parse_sse(text: &str) -> Vec<SseEvent> {
    let mut events = Vec::new();
    let mut name = String::new();

    for line in text.lines() {
        if let Some(event_name) = line.strip_prefix("event: ") {
            name = event_name.to_owned();
        } else if let Some(data) = line.strip_prefix("data: ") {
            if let Ok(value) = serde_json::from_str(data) {
                events.push(SseEvent {
                    name: name.clone(),
                    data: value,
                });
            }
        }
    }

    events
}

/// Reconstruct the non-transient streamed content
pub fn streamed_text(events: &[SseEvent]) -> String {
    events
        .iter()
        .filter(|event| event.name == "text-delta" && event.data.get("transient").is_none())
        .filter_map(|event| event.data["delta"].as_str())
        .collect()
}

/// Whether an event with the given name was seen
pub fn has_event(events: &[SseEvent], name: &str) -> bool {
    events.iter().any(|event| event.name == name)
}

/// First event with the given name
pub fn find_event<'a>(events: &'a [SseEvent], name: &str) -> Option<&'a SseEvent> {
    events.iter().find(|event| event.name == name)
}
