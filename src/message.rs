//! Message records as read from the archive, plus the ordering key used for
//! keyset pagination.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

pub type ConversationId = i64;
pub type MessageId = i64;

/// Total ordering key of a message: timestamp first, identifier breaks ties.
///
/// Cursors are expressed as a `SortKey` so a page boundary that falls inside
/// a run of equal timestamps neither skips nor repeats messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortKey {
    pub timestamp_ms: i64,
    pub id: MessageId,
}

impl SortKey {
    pub fn new(timestamp_ms: i64, id: MessageId) -> Self {
        Self { timestamp_ms, id }
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp_ms
            .cmp(&other.timestamp_ms)
            .then(self.id.cmp(&other.id))
    }
}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// What a message carries, decided once when the row is read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text {
        text: String,
    },
    Media {
        name: String,
        /// Store-relative path of the media file, if the archive recorded one.
        reference: Option<String>,
    },
    /// Non-text event recorded by the messenger (group changes, calls, ...).
    SystemNotice {
        kind: i64,
    },
}

impl MessageContent {
    /// Pick the content variant from the raw archive columns.
    ///
    /// Non-blank text wins over media, media wins over a system notice, and a
    /// row with none of them is an empty text message.
    pub fn resolve(
        text: Option<String>,
        media_name: Option<String>,
        media_path: Option<String>,
        message_type: i64,
    ) -> Self {
        if let Some(text) = text.filter(|t| !t.trim().is_empty()) {
            return MessageContent::Text { text };
        }

        let media_name = media_name.filter(|n| !n.is_empty());
        let media_path = media_path.filter(|p| !p.is_empty());
        if media_name.is_some() || media_path.is_some() {
            let name = media_name
                .or_else(|| media_path.as_deref().map(basename))
                .unwrap_or_default();
            return MessageContent::Media {
                name,
                reference: media_path,
            };
        }

        if message_type != 0 {
            return MessageContent::SystemNotice { kind: message_type };
        }

        MessageContent::Text {
            text: String::new(),
        }
    }
}

fn basename(path: &str) -> String {
    path.rsplit(['/', '\\']).next().unwrap_or(path).to_string()
}

/// An immutable, store-assigned message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub from_me: bool,
    pub timestamp_ms: i64,
    pub content: MessageContent,
    pub sender: Option<String>,
    pub quoted_text: Option<String>,
}

impl Message {
    pub fn sort_key(&self) -> SortKey {
        SortKey::new(self.timestamp_ms, self.id)
    }
}
