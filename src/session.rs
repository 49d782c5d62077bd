//! Per-view traversal state machine.
//!
//! ```text
//! Idle --select_view--> Loading --complete--> Ready --request_more--> Fetching
//!                                               ^                        |
//!                                               +-------complete---------+
//! ```
//!
//! A session owns its cursor and window outright; nothing is shared between
//! views.  At most one fetch is in flight at a time.  Every fetch is issued
//! as a [`FetchTicket`] tagged with the session generation, and a completion
//! whose generation no longer matches is discarded.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::calendar::Calendar;
use crate::cursor::{CursorState, Edge};
use crate::fetcher::{self, FetchedBatch};
use crate::message::{ConversationId, Message};
use crate::storage::{PageQuery, StorageError};
use crate::window::{Splice, SpliceSide, Window};

/// Largest page a view may request.
pub const MAX_PAGE_SIZE: usize = 5000;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ViewError {
    InvalidParams(String),
    UnknownView(ViewHandle),
    Store(StorageError),
}

impl fmt::Display for ViewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewError::InvalidParams(msg) => write!(f, "invalid parameters: {msg}"),
            ViewError::UnknownView(handle) => write!(f, "unknown view {handle}"),
            ViewError::Store(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ViewError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ViewError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StorageError> for ViewError {
    fn from(e: StorageError) -> Self {
        ViewError::Store(e)
    }
}

// ---------------------------------------------------------------------------
// View parameters
// ---------------------------------------------------------------------------

/// Opaque handle of one open view.  A handle is never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewHandle(pub u64);

impl fmt::Display for ViewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderMode {
    /// Oldest first; the first page starts at the beginning of the conversation.
    Chronological,
    /// Newest first; the first page starts at the latest message.
    ReverseChronological,
}

impl OrderMode {
    /// Edge the first page grows from.
    pub fn initial_edge(self) -> Edge {
        match self {
            OrderMode::Chronological => Edge::Newer,
            OrderMode::ReverseChronological => Edge::Older,
        }
    }
}

impl FromStr for OrderMode {
    type Err = ViewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" | "chronological" => Ok(OrderMode::Chronological),
            "desc" | "reverse_chronological" | "reverse-chronological" => {
                Ok(OrderMode::ReverseChronological)
            }
            other => Err(ViewError::InvalidParams(format!(
                "unknown order mode {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ViewParams {
    pub order: OrderMode,
    pub page_size: usize,
}

impl ViewParams {
    pub fn new(order: OrderMode, page_size: usize) -> Result<Self, ViewError> {
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(ViewError::InvalidParams(format!(
                "page size must be between 1 and {MAX_PAGE_SIZE}, got {page_size}"
            )));
        }
        Ok(Self { order, page_size })
    }
}

// ---------------------------------------------------------------------------
// Fetch tickets and results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    /// Full-replace fetch issued when the view is (re)selected.
    Initial,
    /// Extension of one edge of an existing window.
    Extend(Edge),
}

/// An outstanding store read.  Run `query` against the store for
/// `conversation`, then hand the records back to the issuing session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub view: ViewHandle,
    pub generation: u64,
    pub conversation: ConversationId,
    pub kind: FetchKind,
    pub query: PageQuery,
}

/// Delta produced by one page, plus the exhaustion state after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page {
    pub view: ViewHandle,
    pub edge: Edge,
    #[serde(flatten)]
    pub splice: Splice,
    /// Whether `edge` is exhausted.
    pub exhausted: bool,
    pub exhausted_older: bool,
    pub exhausted_newer: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Applied(Page),
    /// The ticket belonged to an earlier generation; nothing changed.
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Loading,
    Ready,
    Fetching,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ViewSession {
    handle: ViewHandle,
    params: ViewParams,
    calendar: Calendar,
    conversation: Option<ConversationId>,
    generation: u64,
    state: SessionState,
    cursor: CursorState,
    window: Window,
}

impl ViewSession {
    pub fn new(handle: ViewHandle, params: ViewParams, calendar: Calendar) -> Self {
        Self {
            handle,
            params,
            calendar,
            conversation: None,
            generation: 0,
            state: SessionState::Idle,
            cursor: CursorState::new(),
            window: Window::new(),
        }
    }

    pub fn handle(&self) -> ViewHandle {
        self.handle
    }

    pub fn params(&self) -> ViewParams {
        self.params
    }

    pub fn conversation(&self) -> Option<ConversationId> {
        self.conversation
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn cursor(&self) -> &CursorState {
        &self.cursor
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.state, SessionState::Loading | SessionState::Fetching)
    }

    /// Discard the window and cursor and return to `Idle`.  Any fetch still
    /// in flight becomes stale.
    pub fn teardown(&mut self) {
        self.generation += 1;
        self.state = SessionState::Idle;
        self.conversation = None;
        self.cursor = CursorState::new();
        self.window.clear();
    }

    /// Start over on `conversation` with a full-replace fetch.  Rejected
    /// (returns `None`) while a fetch is in flight.
    pub fn select_view(&mut self, conversation: ConversationId) -> Option<FetchTicket> {
        if self.is_busy() {
            return None;
        }
        self.teardown();
        self.conversation = Some(conversation);
        self.state = SessionState::Loading;

        let edge = self.params.order.initial_edge();
        let query = fetcher::plan(&self.cursor, edge, self.params.page_size)?;
        Some(self.ticket(conversation, FetchKind::Initial, query))
    }

    /// Switch order mode or page size.  There is no incremental update over
    /// a partial window, so this is a fresh `select_view` of the same
    /// conversation.
    pub fn reconfigure(&mut self, params: ViewParams) -> Option<FetchTicket> {
        if self.is_busy() {
            return None;
        }
        let conversation = self.conversation?;
        self.params = params;
        self.select_view(conversation)
    }

    /// Ask for the next page at `edge`.  Returns `None` (no-op) unless the
    /// session is `Ready` and the edge still has data.
    pub fn request_more(&mut self, edge: Edge) -> Option<FetchTicket> {
        if self.state != SessionState::Ready {
            return None;
        }
        let conversation = self.conversation?;
        let query = fetcher::plan(&self.cursor, edge, self.params.page_size)?;
        self.state = SessionState::Fetching;
        Some(self.ticket(conversation, FetchKind::Extend(edge), query))
    }

    /// Apply the outcome of a ticket.
    ///
    /// A store failure leaves window and cursor untouched and returns the
    /// session to `Ready`, so the same request can be retried.
    pub fn complete(
        &mut self,
        ticket: &FetchTicket,
        records: Result<Vec<Message>, StorageError>,
    ) -> Result<Completion, StorageError> {
        if ticket.view != self.handle
            || ticket.generation != self.generation
            || !self.is_busy()
        {
            return Ok(Completion::Stale);
        }
        self.state = SessionState::Ready;
        let records = records?;

        let batch = fetcher::settle(&mut self.cursor, &ticket.query, records);
        let side = match ticket.kind {
            FetchKind::Initial => SpliceSide::Replace,
            FetchKind::Extend(Edge::Older) => SpliceSide::Prepend,
            FetchKind::Extend(Edge::Newer) => SpliceSide::Append,
        };
        let FetchedBatch {
            edge,
            messages,
            exhausted,
        } = batch;
        let splice = self.window.merge(messages, side, &self.calendar);
        Ok(Completion::Applied(self.page(edge, splice, exhausted)))
    }

    /// A page that changes nothing, reporting the current state of `edge`.
    pub fn unchanged(&self, edge: Edge) -> Page {
        let side = match edge {
            Edge::Older => SpliceSide::Prepend,
            Edge::Newer => SpliceSide::Append,
        };
        let splice = Splice {
            side,
            entries: Vec::new(),
            retired_separator: None,
        };
        self.page(edge, splice, self.cursor.is_exhausted(edge))
    }

    fn page(&self, edge: Edge, splice: Splice, exhausted: bool) -> Page {
        Page {
            view: self.handle,
            edge,
            splice,
            exhausted,
            exhausted_older: self.cursor.is_exhausted(Edge::Older),
            exhausted_newer: self.cursor.is_exhausted(Edge::Newer),
        }
    }

    fn ticket(&self, conversation: ConversationId, kind: FetchKind, query: PageQuery) -> FetchTicket {
        FetchTicket {
            view: self.handle,
            generation: self.generation,
            conversation,
            kind,
            query,
        }
    }
}
