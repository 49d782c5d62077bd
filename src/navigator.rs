//! Registry of open views over one message store.
//!
//! Every view is an independent [`ViewSession`] keyed by a [`ViewHandle`];
//! there is no notion of a single "current" conversation.  Changing the
//! parameters of a view opens a replacement under a fresh handle.  The old
//! view is closed once the replacement's first page lands, which makes any
//! fetch still running for it stale.  A view whose first page fails to load
//! is discarded, since the caller never learned its handle.
//!
//! Two ways to drive it:
//!
//! - [`Navigator::open_view`], [`Navigator::more`] and
//!   [`Navigator::change_params`] read the store inline.
//! - The `begin_*` methods hand out a [`FetchTicket`]; the caller runs the
//!   query wherever it likes and passes the records to
//!   [`Navigator::complete`].

use std::collections::HashMap;
use std::sync::Arc;

use crate::calendar::Calendar;
use crate::cursor::Edge;
use crate::logging;
use crate::message::{ConversationId, Message};
use crate::session::{
    Completion, FetchKind, FetchTicket, OrderMode, Page, ViewError, ViewHandle, ViewParams,
    ViewSession,
};
use crate::storage::{RecordStore, StorageError};
use crate::tlog;

/// Outcome of asking for more data at an edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// A store read is needed.
    Query(FetchTicket),
    /// Nothing to read (edge exhausted, or a fetch is already in flight).
    Done(Page),
}

pub struct Navigator<S> {
    store: Arc<S>,
    calendar: Calendar,
    views: HashMap<ViewHandle, ViewSession>,
    /// Replacement view -> the view it supersedes once its first page lands.
    replacing: HashMap<ViewHandle, ViewHandle>,
    next_view: u64,
}

impl<S: RecordStore> Navigator<S> {
    pub fn new(store: Arc<S>, calendar: Calendar) -> Self {
        Self {
            store,
            calendar,
            views: HashMap::new(),
            replacing: HashMap::new(),
            next_view: 1,
        }
    }

    /// Shared handle to the store, for running tickets outside a lock.
    pub fn store(&self) -> Arc<S> {
        Arc::clone(&self.store)
    }

    pub fn calendar(&self) -> Calendar {
        self.calendar
    }

    pub fn session(&self, handle: ViewHandle) -> Option<&ViewSession> {
        self.views.get(&handle)
    }

    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    // -----------------------------------------------------------------------
    // Ticketed API
    // -----------------------------------------------------------------------

    /// Create a view and issue its first, full-replace fetch.
    pub fn begin_open(
        &mut self,
        conversation: ConversationId,
        params: ViewParams,
    ) -> Result<FetchTicket, ViewError> {
        let handle = ViewHandle(self.next_view);
        self.next_view += 1;

        let mut session = ViewSession::new(handle, params, self.calendar);
        let ticket = session.select_view(conversation).ok_or_else(|| {
            ViewError::InvalidParams("fresh view refused its first fetch".to_string())
        })?;
        self.views.insert(handle, session);

        tlog!(
            "view {}: opened {} ({:?}, {} per page)",
            logging::view(handle.0),
            logging::conversation(conversation),
            params.order,
            params.page_size
        );
        Ok(ticket)
    }

    /// Reopen the conversation of `handle` with new parameters under a new
    /// handle.  Omitted parameters keep their current value.  `handle` stays
    /// open until the new view's first page is applied, so a failed reload
    /// leaves it usable.
    pub fn begin_change_params(
        &mut self,
        handle: ViewHandle,
        order: Option<OrderMode>,
        page_size: Option<usize>,
    ) -> Result<FetchTicket, ViewError> {
        let session = self
            .views
            .get(&handle)
            .ok_or(ViewError::UnknownView(handle))?;
        let current = session.params();
        let params = ViewParams::new(
            order.unwrap_or(current.order),
            page_size.unwrap_or(current.page_size),
        )?;
        let conversation = session
            .conversation()
            .ok_or(ViewError::UnknownView(handle))?;

        let ticket = self.begin_open(conversation, params)?;
        self.replacing.insert(ticket.view, handle);
        tlog!(
            "view {}: replacing with {} to change parameters",
            logging::view(handle.0),
            logging::view(ticket.view.0)
        );
        Ok(ticket)
    }

    /// Ask for the next page at `edge`.
    pub fn begin_more(&mut self, handle: ViewHandle, edge: Edge) -> Result<Step, ViewError> {
        let session = self
            .views
            .get_mut(&handle)
            .ok_or(ViewError::UnknownView(handle))?;
        match session.request_more(edge) {
            Some(ticket) => Ok(Step::Query(ticket)),
            None => Ok(Step::Done(session.unchanged(edge))),
        }
    }

    /// Hand back the records (or the store error) for `ticket`.
    ///
    /// Completions for closed or reparametrized views are dropped and
    /// reported as [`Completion::Stale`]; they are never an error.
    pub fn complete(
        &mut self,
        ticket: FetchTicket,
        records: Result<Vec<Message>, StorageError>,
    ) -> Result<Completion, ViewError> {
        let Some(session) = self.views.get_mut(&ticket.view) else {
            tlog!(
                "view {}: dropping completion for closed view",
                logging::view(ticket.view.0)
            );
            return Ok(Completion::Stale);
        };

        let was_exhausted = [Edge::Older, Edge::Newer].map(|e| session.cursor().is_exhausted(e));

        match session.complete(&ticket, records) {
            Ok(Completion::Stale) => {
                tlog!(
                    "view {}: dropping stale completion (generation {})",
                    logging::view(ticket.view.0),
                    ticket.generation
                );
                Ok(Completion::Stale)
            }
            Ok(Completion::Applied(page)) => {
                let now_exhausted = [page.exhausted_older, page.exhausted_newer];
                for (i, edge) in [Edge::Older, Edge::Newer].into_iter().enumerate() {
                    if now_exhausted[i] && !was_exhausted[i] {
                        tlog!(
                            "view {} ({}): {:?} edge exhausted",
                            logging::view(ticket.view.0),
                            logging::conversation(ticket.conversation),
                            edge
                        );
                    }
                }
                if ticket.kind == FetchKind::Initial {
                    if let Some(old) = self.replacing.remove(&ticket.view) {
                        self.close(old);
                        tlog!(
                            "view {}: closed, superseded by {}",
                            logging::view(old.0),
                            logging::view(ticket.view.0)
                        );
                    }
                }
                Ok(Completion::Applied(page))
            }
            Err(e) if ticket.kind == FetchKind::Initial => {
                self.views.remove(&ticket.view);
                let kept = self.replacing.remove(&ticket.view);
                tlog!(
                    "view {}: first page failed, view discarded{}: {}",
                    logging::view(ticket.view.0),
                    kept.map(|old| format!(", {} kept", logging::view(old.0)))
                        .unwrap_or_default(),
                    e
                );
                Err(ViewError::Store(e))
            }
            Err(e) => {
                tlog!(
                    "view {}: fetch failed, window unchanged: {}",
                    logging::view(ticket.view.0),
                    e
                );
                Err(ViewError::Store(e))
            }
        }
    }

    /// Discard a view.  Returns whether it existed.
    pub fn close(&mut self, handle: ViewHandle) -> bool {
        self.replacing.remove(&handle);
        match self.views.remove(&handle) {
            Some(mut session) => {
                session.teardown();
                true
            }
            None => false,
        }
    }

    // -----------------------------------------------------------------------
    // Inline API
    // -----------------------------------------------------------------------

    /// Open a view and load its first page.
    pub fn open_view(
        &mut self,
        conversation: ConversationId,
        order: OrderMode,
        page_size: usize,
    ) -> Result<Page, ViewError> {
        let params = ViewParams::new(order, page_size)?;
        let ticket = self.begin_open(conversation, params)?;
        self.run(ticket)
    }

    /// Load the next page at `edge` and return only what was spliced in.
    pub fn more(&mut self, handle: ViewHandle, edge: Edge) -> Result<Page, ViewError> {
        match self.begin_more(handle, edge)? {
            Step::Query(ticket) => self.run(ticket),
            Step::Done(page) => Ok(page),
        }
    }

    /// Reopen a view with new parameters.  On success the old handle becomes
    /// invalid; on a store failure it stays as it was.
    pub fn change_params(
        &mut self,
        handle: ViewHandle,
        order: Option<OrderMode>,
        page_size: Option<usize>,
    ) -> Result<Page, ViewError> {
        let ticket = self.begin_change_params(handle, order, page_size)?;
        self.run(ticket)
    }

    fn run(&mut self, ticket: FetchTicket) -> Result<Page, ViewError> {
        let records = self.store.query(ticket.conversation, &ticket.query);
        let view = ticket.view;
        match self.complete(ticket, records)? {
            Completion::Applied(page) => Ok(page),
            Completion::Stale => Err(ViewError::UnknownView(view)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageContent;
    use crate::storage::{Direction, PageQuery};
    use crate::window::SpliceSide;

    struct FixedStore(Vec<Message>);

    impl RecordStore for FixedStore {
        fn query(
            &self,
            _conversation: ConversationId,
            query: &PageQuery,
        ) -> Result<Vec<Message>, StorageError> {
            let mut page: Vec<Message> = self
                .0
                .iter()
                .filter(|m| match (query.direction, query.cursor) {
                    (_, None) => true,
                    (Direction::Forward, Some(c)) => m.sort_key() > c,
                    (Direction::Backward, Some(c)) => m.sort_key() < c,
                })
                .cloned()
                .collect();
            if query.direction == Direction::Backward {
                page.reverse();
            }
            page.truncate(query.limit);
            Ok(page)
        }
    }

    fn navigator(count: i64) -> Navigator<FixedStore> {
        let messages = (1..=count)
            .map(|id| Message {
                id,
                conversation_id: 3,
                from_me: false,
                timestamp_ms: id * 1_000,
                content: MessageContent::Text {
                    text: format!("m{id}"),
                },
                sender: None,
                quoted_text: None,
            })
            .collect();
        Navigator::new(Arc::new(FixedStore(messages)), Calendar::utc())
    }

    #[test]
    fn handles_are_never_reused() {
        let mut nav = navigator(5);
        let a = nav.open_view(3, OrderMode::Chronological, 2).unwrap().view;
        let b = nav.open_view(3, OrderMode::Chronological, 2).unwrap().view;
        assert_ne!(a, b);
        assert!(nav.close(a));
        assert!(!nav.close(a));
        let c = nav.open_view(3, OrderMode::Chronological, 2).unwrap().view;
        assert!(c > b);
        assert_eq!(nav.view_count(), 2);
    }

    #[test]
    fn invalid_page_size_creates_no_view() {
        let mut nav = navigator(5);
        let err = nav.open_view(3, OrderMode::Chronological, 0).unwrap_err();
        assert!(matches!(err, ViewError::InvalidParams(_)));
        assert_eq!(nav.view_count(), 0);
    }

    #[test]
    fn change_params_invalidates_old_handle() {
        let mut nav = navigator(5);
        let first = nav.open_view(3, OrderMode::Chronological, 2).unwrap();

        let pending = match nav.begin_more(first.view, Edge::Newer).unwrap() {
            Step::Query(ticket) => ticket,
            Step::Done(_) => panic!("expected a store read"),
        };

        let reopened = nav
            .change_params(first.view, Some(OrderMode::ReverseChronological), None)
            .unwrap();
        assert_ne!(reopened.view, first.view);
        assert_eq!(reopened.splice.side, SpliceSide::Replace);
        assert!(matches!(
            nav.more(first.view, Edge::Older),
            Err(ViewError::UnknownView(_))
        ));

        let store = nav.store();
        let records = store.query(pending.conversation, &pending.query);
        assert_eq!(nav.complete(pending, records).unwrap(), Completion::Stale);
    }

    #[test]
    fn old_view_survives_until_replacement_lands() {
        let mut nav = navigator(6);
        let first = nav.open_view(3, OrderMode::Chronological, 2).unwrap();

        let ticket = nav
            .begin_change_params(first.view, None, Some(4))
            .unwrap();
        assert_ne!(ticket.view, first.view);
        assert_eq!(nav.view_count(), 2);
        assert!(nav.session(first.view).is_some());

        let records = nav.store().query(ticket.conversation, &ticket.query);
        let new_view = ticket.view;
        assert!(matches!(
            nav.complete(ticket, records).unwrap(),
            Completion::Applied(_)
        ));
        assert!(nav.session(first.view).is_none());
        assert_eq!(nav.session(new_view).unwrap().window().message_count(), 4);
        assert_eq!(nav.view_count(), 1);
    }

    #[test]
    fn failed_replacement_keeps_old_view() {
        let mut nav = navigator(6);
        let first = nav.open_view(3, OrderMode::Chronological, 2).unwrap();

        let ticket = nav
            .begin_change_params(first.view, Some(OrderMode::ReverseChronological), None)
            .unwrap();
        let new_view = ticket.view;
        let err = nav
            .complete(
                ticket,
                Err(StorageError::Unavailable("disk gone".to_string())),
            )
            .unwrap_err();
        assert!(matches!(err, ViewError::Store(_)));
        assert!(nav.session(new_view).is_none());
        assert_eq!(nav.view_count(), 1);

        // The old view pages on as before.
        let more = nav.more(first.view, Edge::Newer).unwrap();
        assert_eq!(more.splice.entries.len(), 2);
    }

    #[test]
    fn concurrent_request_on_same_view_is_a_no_op() {
        let mut nav = navigator(10);
        let first = nav.open_view(3, OrderMode::ReverseChronological, 3).unwrap();

        let ticket = match nav.begin_more(first.view, Edge::Older).unwrap() {
            Step::Query(ticket) => ticket,
            Step::Done(_) => panic!("expected a store read"),
        };
        match nav.begin_more(first.view, Edge::Older).unwrap() {
            Step::Done(page) => assert!(page.splice.entries.is_empty()),
            Step::Query(_) => panic!("second fetch must not start"),
        }

        let records = nav.store().query(ticket.conversation, &ticket.query);
        match nav.complete(ticket, records).unwrap() {
            Completion::Applied(page) => {
                let ids: Vec<i64> = page
                    .splice
                    .entries
                    .iter()
                    .filter_map(|e| e.as_message())
                    .map(|m| m.id)
                    .collect();
                assert_eq!(ids, vec![5, 6, 7]);
            }
            Completion::Stale => panic!("completion should apply"),
        }
    }
}
