//! Fixture archives for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use rusqlite::{params, Connection};
use tempfile::TempDir;

use chatwindow::message::{ConversationId, Message};
use chatwindow::storage::{MessageStore, PageQuery, RecordStore, StorageError, ARCHIVE_SCHEMA};

pub const DAY_MS: i64 = 86_400_000;

/// A msgstore.db on disk, removed when dropped.
pub struct Archive {
    _dir: TempDir,
    pub path: PathBuf,
}

impl Archive {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("msgstore.db");
        let conn = Connection::open(&path).expect("create archive");
        conn.execute_batch(ARCHIVE_SCHEMA).expect("schema");
        conn.execute(
            "INSERT INTO jid (_id, user, raw_string) VALUES (1, '15550001', '15550001@s.whatsapp.net')",
            [],
        )
        .expect("jid");
        Self { _dir: dir, path }
    }

    /// Insert text messages `(id, timestamp_ms)` into `chat`.
    pub fn with_messages(self, chat: ConversationId, rows: &[(i64, i64)]) -> Self {
        let conn = Connection::open(&self.path).expect("open archive");
        conn.execute(
            "INSERT OR IGNORE INTO chat (_id, jid_row_id, subject) VALUES (?1, 1, NULL)",
            params![chat],
        )
        .expect("chat");
        for (id, ts) in rows {
            conn.execute(
                "INSERT INTO message (_id, chat_row_id, from_me, text_data, timestamp, sender_jid_row_id, message_type)
                 VALUES (?1, ?2, ?3, ?4, ?5, 1, 0)",
                params![id, chat, id % 2, format!("message {id}"), ts],
            )
            .expect("message");
        }
        self
    }

    pub fn store(&self) -> MessageStore {
        MessageStore::open(&self.path).expect("open store")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Wraps a store and counts range reads.
pub struct CountingStore<S> {
    inner: S,
    calls: AtomicUsize,
    fail_next: AtomicUsize,
}

impl<S> CountingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
            fail_next: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make the next `n` reads fail as if the store were gone.
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }
}

impl<S: RecordStore> RecordStore for CountingStore<S> {
    fn query(
        &self,
        conversation: ConversationId,
        query: &PageQuery,
    ) -> Result<Vec<Message>, StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let pending = self.fail_next.load(Ordering::SeqCst);
        if pending > 0 {
            self.fail_next.store(pending - 1, Ordering::SeqCst);
            return Err(StorageError::Unavailable("archive unmounted".to_string()));
        }
        self.inner.query(conversation, query)
    }
}

/// Check ordering and separator placement over a whole window.
pub fn assert_window_invariants(
    window: &chatwindow::window::Window,
    calendar: &chatwindow::calendar::Calendar,
) {
    use chatwindow::window::Entry;
    use std::collections::HashSet;

    let entries: Vec<&Entry> = window.entries().collect();
    let mut days = HashSet::new();
    let mut current_day = None;
    let mut last_key = None;
    for (i, entry) in entries.iter().enumerate() {
        match entry {
            Entry::Separator { day } => {
                assert!(days.insert(*day), "second separator for {day}");
                let next = entries
                    .get(i + 1)
                    .and_then(|e| e.as_message())
                    .expect("separator followed by a message");
                assert_eq!(calendar.day_of(next.timestamp_ms), *day);
                current_day = Some(*day);
            }
            Entry::Message { message } => {
                assert_eq!(
                    Some(calendar.day_of(message.timestamp_ms)),
                    current_day,
                    "message {} not under its day separator",
                    message.id
                );
                let key = message.sort_key();
                if let Some(prev) = last_key {
                    assert!(prev < key, "message {} out of order", message.id);
                }
                last_key = Some(key);
            }
        }
    }
}

/// Compact rendering: `S<n>` for separators (days since epoch), `#<id>` for messages.
pub fn shape<'a>(entries: impl IntoIterator<Item = &'a chatwindow::window::Entry>) -> Vec<String> {
    use chatwindow::window::Entry;
    entries
        .into_iter()
        .map(|e| match e {
            Entry::Separator { day } => {
                let epoch = chrono::NaiveDate::from_ymd_opt(1970, 1, 1).expect("epoch");
                format!("S{}", (day.date() - epoch).num_days())
            }
            Entry::Message { message } => format!("#{}", message.id),
        })
        .collect()
}
