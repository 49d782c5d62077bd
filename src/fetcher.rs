//! One page request: choose the cursor, read, classify, advance the cursor.
//!
//! The work is split into [`plan`] and [`settle`] so the store read can run
//! without holding whatever lock guards the view.  [`fetch`] does both in one
//! call for callers that don't care.

use crate::cursor::{CursorState, Edge};
use crate::message::{ConversationId, Message};
use crate::storage::{Direction, PageQuery, RecordStore, StorageError};

/// Result of one settled page, always in ascending order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedBatch {
    pub edge: Edge,
    pub messages: Vec<Message>,
    /// Whether `edge` is exhausted after this page.
    pub exhausted: bool,
}

impl FetchedBatch {
    fn empty(edge: Edge) -> Self {
        Self {
            edge,
            messages: Vec::new(),
            exhausted: true,
        }
    }
}

/// Build the range read that extends `edge`, or `None` when the edge is
/// already exhausted and no store call should be made.
pub fn plan(cursor: &CursorState, edge: Edge, page_size: usize) -> Option<PageQuery> {
    if cursor.is_exhausted(edge) {
        return None;
    }
    Some(PageQuery {
        direction: edge.direction(),
        cursor: cursor.bound(edge),
        limit: page_size,
    })
}

/// Classify the records returned for `query` and fold them into `cursor`.
///
/// - empty page: the edge is exhausted
/// - short page: the edge is exhausted, records are still returned
/// - full page: exhaustion is left unset, even if every record turns out to
///   sit inside the window already
///
/// A read without a cursor started at the extreme end of its direction, so
/// the opposite edge is exhausted as well.
pub fn settle(cursor: &mut CursorState, query: &PageQuery, mut records: Vec<Message>) -> FetchedBatch {
    let edge = Edge::from(query.direction);

    // Page size is judged on what the store returned, before any filtering.
    if query.cursor.is_none() {
        cursor.mark_exhausted(edge.opposite());
    }
    if records.len() < query.limit {
        cursor.mark_exhausted(edge);
    }

    // Guard against a store that ignores the exclusive bound.
    if let Some(bound) = cursor.bound(edge) {
        records.retain(|m| match edge {
            Edge::Older => m.sort_key() < bound,
            Edge::Newer => m.sort_key() > bound,
        });
    }

    if query.direction == Direction::Backward {
        records.reverse();
    }
    cursor.absorb(&records);

    FetchedBatch {
        edge,
        messages: records,
        exhausted: cursor.is_exhausted(edge),
    }
}

/// Plan, read and settle one page for `edge`.
pub fn fetch<S: RecordStore + ?Sized>(
    store: &S,
    conversation: ConversationId,
    cursor: &mut CursorState,
    edge: Edge,
    page_size: usize,
) -> Result<FetchedBatch, StorageError> {
    let Some(query) = plan(cursor, edge, page_size) else {
        return Ok(FetchedBatch::empty(edge));
    };
    let records = store.query(conversation, &query)?;
    Ok(settle(cursor, &query, records))
}
