//! Per-view record of how far the materialized window reaches in each
//! direction.

use serde::{Deserialize, Serialize};

use crate::message::{Message, SortKey};
use crate::storage::Direction;

/// One end of the materialized window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Edge {
    Older,
    Newer,
}

impl Edge {
    /// Direction of the range read that extends this edge.
    pub fn direction(self) -> Direction {
        match self {
            Edge::Older => Direction::Backward,
            Edge::Newer => Direction::Forward,
        }
    }

    pub fn opposite(self) -> Edge {
        match self {
            Edge::Older => Edge::Newer,
            Edge::Newer => Edge::Older,
        }
    }
}

impl From<Direction> for Edge {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Backward => Edge::Older,
            Direction::Forward => Edge::Newer,
        }
    }
}

impl std::str::FromStr for Edge {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "older" => Ok(Edge::Older),
            "newer" => Ok(Edge::Newer),
            other => Err(format!("unknown edge {other:?}")),
        }
    }
}

/// Inclusive bounds of the loaded window plus per-edge exhaustion.
///
/// Invariant: `oldest <= newest` whenever both are set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CursorState {
    oldest: Option<SortKey>,
    newest: Option<SortKey>,
    exhausted_older: bool,
    exhausted_newer: bool,
}

impl CursorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn oldest(&self) -> Option<SortKey> {
        self.oldest
    }

    pub fn newest(&self) -> Option<SortKey> {
        self.newest
    }

    pub fn is_empty(&self) -> bool {
        self.oldest.is_none()
    }

    /// Exclusive cursor for a read that extends `edge`.
    pub fn bound(&self, edge: Edge) -> Option<SortKey> {
        match edge {
            Edge::Older => self.oldest,
            Edge::Newer => self.newest,
        }
    }

    pub fn is_exhausted(&self, edge: Edge) -> bool {
        match edge {
            Edge::Older => self.exhausted_older,
            Edge::Newer => self.exhausted_newer,
        }
    }

    pub fn fully_exhausted(&self) -> bool {
        self.exhausted_older && self.exhausted_newer
    }

    pub(crate) fn mark_exhausted(&mut self, edge: Edge) {
        match edge {
            Edge::Older => self.exhausted_older = true,
            Edge::Newer => self.exhausted_newer = true,
        }
    }

    /// Widen the bounds to cover `batch`.
    pub(crate) fn absorb(&mut self, batch: &[Message]) {
        for key in batch.iter().map(Message::sort_key) {
            self.oldest = Some(self.oldest.map_or(key, |o| o.min(key)));
            self.newest = Some(self.newest.map_or(key, |n| n.max(key)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageContent;

    fn msg(id: i64, ts: i64) -> Message {
        Message {
            id,
            conversation_id: 1,
            from_me: false,
            timestamp_ms: ts,
            content: MessageContent::Text {
                text: format!("m{id}"),
            },
            sender: None,
            quoted_text: None,
        }
    }

    #[test]
    fn absorb_widens_both_bounds() {
        let mut cursor = CursorState::new();
        assert!(cursor.is_empty());

        cursor.absorb(&[msg(3, 200), msg(4, 300)]);
        assert_eq!(cursor.oldest(), Some(SortKey::new(200, 3)));
        assert_eq!(cursor.newest(), Some(SortKey::new(300, 4)));

        cursor.absorb(&[msg(1, 100), msg(2, 100)]);
        assert_eq!(cursor.bound(Edge::Older), Some(SortKey::new(100, 1)));
        assert_eq!(cursor.bound(Edge::Newer), Some(SortKey::new(300, 4)));
    }

    #[test]
    fn exhaustion_is_per_edge() {
        let mut cursor = CursorState::new();
        cursor.mark_exhausted(Edge::Older);
        assert!(cursor.is_exhausted(Edge::Older));
        assert!(!cursor.is_exhausted(Edge::Newer));
        assert!(!cursor.fully_exhausted());
        cursor.mark_exhausted(Edge::Newer);
        assert!(cursor.fully_exhausted());
    }

    #[test]
    fn edge_maps_to_direction() {
        assert_eq!(Edge::Older.direction(), Direction::Backward);
        assert_eq!(Edge::from(Direction::Forward), Edge::Newer);
        assert_eq!("older".parse::<Edge>(), Ok(Edge::Older));
        assert!("sideways".parse::<Edge>().is_err());
    }
}
