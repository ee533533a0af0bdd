use serde::{Deserialize, Serialize};

/// Per-message text limit of the Viber API, in characters.
pub const MAX_TEXT_MESSAGE_SIZE: usize = 7_000;
pub const NUMBER_OF_TEXT_MESSAGES: usize = 20;
pub const MAX_TEXT_SIZE: usize = MAX_TEXT_MESSAGE_SIZE * NUMBER_OF_TEXT_MESSAGES;
pub const TRUNCATION_MARKER: &str = "<truncated>";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum OutboundMessage {
    Text(String),
    Url(String),
}

pub fn split_text(text: &str) -> Vec<String> {
    split_text_with(text, MAX_TEXT_MESSAGE_SIZE, NUMBER_OF_TEXT_MESSAGES)
}

/// Splits `text` into chunks of at most `max_chunk` characters, keeping at
/// most `max_chunks` of them. A `<truncated>` chunk is appended when text was
/// dropped. Empty input yields no chunks.
pub fn split_text_with(text: &str, max_chunk: usize, max_chunks: usize) -> Vec<String> {
    let max_chunk = max_chunk.max(1);
    let limit = max_chunk.saturating_mul(max_chunks);

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;
    let mut taken = 0usize;
    let mut truncated = false;

    for ch in text.chars() {
        if taken == limit {
            truncated = true;
            break;
        }
        if current_len == max_chunk {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        current.push(ch);
        current_len += 1;
        taken += 1;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    if truncated {
        chunks.push(TRUNCATION_MARKER.to_owned());
    }
    chunks
}

/// Reply for a command result: chunked text, then the media URL if any.
pub fn reply_messages(text: &str, media: Option<&str>) -> Vec<OutboundMessage> {
    let mut messages = split_text(text).into_iter().map(OutboundMessage::Text).collect::<Vec<_>>();
    if let Some(media) = media.filter(|url| !url.trim().is_empty()) {
        messages.push(OutboundMessage::Url(media.to_owned()));
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::{
        reply_messages, split_text, split_text_with, OutboundMessage, MAX_TEXT_MESSAGE_SIZE,
        MAX_TEXT_SIZE, TRUNCATION_MARKER,
    };

    #[test]
    fn empty_text_sends_nothing() {
        assert!(split_text("").is_empty());
        assert!(reply_messages("", None).is_empty());
    }

    #[test]
    fn text_within_limit_is_reconstructed_exactly() {
        let lengths = [
            1,
            MAX_TEXT_MESSAGE_SIZE - 1,
            MAX_TEXT_MESSAGE_SIZE,
            MAX_TEXT_MESSAGE_SIZE + 1,
            MAX_TEXT_SIZE,
        ];
        for len in lengths {
            let text = "abcdefghij".chars().cycle().take(len).collect::<String>();
            let chunks = split_text(&text);

            assert_eq!(chunks.concat(), text, "length {len}");
            assert!(chunks.iter().all(|chunk| chunk.chars().count() <= MAX_TEXT_MESSAGE_SIZE));
            assert_eq!(chunks.len(), len.div_ceil(MAX_TEXT_MESSAGE_SIZE));
        }
    }

    #[test]
    fn splitting_a_chunk_again_is_idempotent() {
        let text = "x".repeat(MAX_TEXT_MESSAGE_SIZE * 3 + 17);
        for chunk in split_text(&text) {
            assert_eq!(split_text(&chunk), vec![chunk.clone()]);
        }
    }

    #[test]
    fn oversized_text_is_truncated_with_marker() {
        let text = "y".repeat(MAX_TEXT_SIZE + 5);
        let chunks = split_text(&text);

        assert_eq!(chunks.len(), 21);
        assert_eq!(chunks.last().map(String::as_str), Some(TRUNCATION_MARKER));
        let content = chunks[..chunks.len() - 1].concat();
        assert_eq!(content.chars().count(), MAX_TEXT_SIZE);
    }

    #[test]
    fn counts_characters_not_bytes() {
        let chunks = split_text_with("äöüåé", 2, 2);
        assert_eq!(chunks, vec!["äö", "üå", TRUNCATION_MARKER]);
    }

    #[test]
    fn reply_appends_media_after_text() {
        assert_eq!(
            reply_messages("snapshot", Some("https://cdn.example.com/cam.jpg")),
            vec![
                OutboundMessage::Text("snapshot".to_owned()),
                OutboundMessage::Url("https://cdn.example.com/cam.jpg".to_owned()),
            ]
        );
    }
}
