//! Newline-delimited JSON upload events.

use pictura_core::UploadEvent;

/// A line that could not be decoded as an upload event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidEvent {
    pub line: usize,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct EventBatch {
    pub events: Vec<UploadEvent>,
    pub invalid: Vec<InvalidEvent>,
}

/// Decode one event per non-blank line.
pub fn parse_event_lines(input: &str) -> EventBatch {
    let mut batch = EventBatch::default();

    for (index, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<UploadEvent>(line) {
            Ok(event) => batch.events.push(event),
            Err(e) => batch.invalid.push(InvalidEvent {
                line: index + 1,
                error: e.to_string(),
            }),
        }
    }

    batch
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_event_lines() {
        let input = r#"
{"name":"abc/photo.jpg","bucket":"media","contentType":"image/jpeg","metageneration":"1"}

{"path":"def/scan.png","bucket":"media","contentType":"image/png","generationMarker":1}
not json
{"path":"ghi/x.jpg","bucket":"media","contentType":"image/jpeg","generationMarker":"one"}
"#;
        let batch = parse_event_lines(input);

        assert_eq!(batch.events.len(), 2);
        assert_eq!(batch.events[0].path, "abc/photo.jpg");
        assert_eq!(batch.events[1].image_id(), Some("def"));
        let lines: Vec<usize> = batch.invalid.iter().map(|i| i.line).collect();
        assert_eq!(lines, vec![5, 6]);
    }
}
