//! Read-only SQLite adapter over an archived WhatsApp `msgstore.db`.
//!
//! The adapter is a pure range read: given a conversation, a direction, an
//! optional exclusive cursor and a page size it returns up to that many
//! messages in direction order.  It never deduplicates, buckets or writes.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, OpenFlags};
use serde::{Deserialize, Serialize};

use crate::message::{ConversationId, Message, MessageContent, SortKey};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum StorageError {
    Sqlite(rusqlite::Error),
    NotFound(String),
    Unavailable(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Sqlite(e) => write!(f, "sqlite error: {e}"),
            StorageError::NotFound(msg) => write!(f, "not found: {msg}"),
            StorageError::Unavailable(msg) => write!(f, "store unavailable: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Sqlite(e) => Some(e),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        StorageError::Sqlite(e)
    }
}

// ---------------------------------------------------------------------------
// Query contract
// ---------------------------------------------------------------------------

/// Direction of a range read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Ascending time, strictly after the cursor.
    Forward,
    /// Descending time, strictly before the cursor.
    Backward,
}

/// Parameters of one range read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageQuery {
    pub direction: Direction,
    /// Exclusive bound. `None` reads from the extreme end in `direction`.
    pub cursor: Option<SortKey>,
    pub limit: usize,
}

/// Source of message pages. Implementations must be safe to call from
/// several views at once.
pub trait RecordStore: Send + Sync {
    /// Return up to `query.limit` messages of `conversation` past the cursor,
    /// ascending for [`Direction::Forward`] and descending for
    /// [`Direction::Backward`].  An unknown conversation yields an empty page.
    fn query(
        &self,
        conversation: ConversationId,
        query: &PageQuery,
    ) -> Result<Vec<Message>, StorageError>;
}

// ---------------------------------------------------------------------------
// SQLite adapter
// ---------------------------------------------------------------------------

/// Subset of the `msgstore.db` schema read by [`MessageStore`].
///
/// Real archives carry many more tables and columns; this is enough to build
/// fixture databases.
pub const ARCHIVE_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS jid (
        _id         INTEGER PRIMARY KEY AUTOINCREMENT,
        user        TEXT,
        raw_string  TEXT
    );
    CREATE TABLE IF NOT EXISTS chat (
        _id             INTEGER PRIMARY KEY AUTOINCREMENT,
        jid_row_id      INTEGER,
        subject         TEXT,
        sort_timestamp  INTEGER
    );
    CREATE TABLE IF NOT EXISTS message (
        _id                 INTEGER PRIMARY KEY AUTOINCREMENT,
        chat_row_id         INTEGER NOT NULL,
        from_me             INTEGER NOT NULL DEFAULT 0,
        text_data           TEXT,
        timestamp           INTEGER,
        sender_jid_row_id   INTEGER,
        message_type        INTEGER
    );
    CREATE INDEX IF NOT EXISTS message_chat_time ON message (chat_row_id, timestamp, _id);
    CREATE TABLE IF NOT EXISTS message_quoted (
        message_row_id  INTEGER PRIMARY KEY,
        text_data       TEXT
    );
    CREATE TABLE IF NOT EXISTS message_media (
        message_row_id  INTEGER PRIMARY KEY,
        file_path       TEXT,
        direct_path     TEXT,
        media_name      TEXT
    );
";

const SELECT_MESSAGES: &str = "
    SELECT m._id,
           m.chat_row_id,
           m.from_me,
           m.text_data,
           COALESCE(m.timestamp, 0),
           j.user,
           j.raw_string,
           cj.user,
           cj.raw_string,
           mq.text_data,
           mm.file_path,
           mm.direct_path,
           mm.media_name,
           COALESCE(m.message_type, 0)
    FROM message m
    LEFT JOIN jid j ON m.sender_jid_row_id = j._id
    LEFT JOIN chat c ON m.chat_row_id = c._id
    LEFT JOIN jid cj ON c.jid_row_id = cj._id
    LEFT JOIN message_quoted mq ON m._id = mq.message_row_id
    LEFT JOIN message_media mm ON m._id = mm.message_row_id
    WHERE m.chat_row_id = ?";

/// Handle over a message archive.  The connection sits behind a mutex so
/// independent views can share one store.
pub struct MessageStore {
    conn: Mutex<Connection>,
}

impl MessageStore {
    /// Open an existing archive read-only.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if !path.is_file() {
            return Err(StorageError::NotFound(format!(
                "database file {}",
                path.display()
            )));
        }
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        Ok(Self::from_connection(conn))
    }

    /// Wrap an already-open connection (e.g. an in-memory fixture).
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn read_page(
        conn: &Connection,
        conversation: ConversationId,
        query: &PageQuery,
    ) -> Result<Vec<Message>, StorageError> {
        let mut sql = String::from(SELECT_MESSAGES);
        let mut bind_values: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(conversation)];

        let (cmp, order) = match query.direction {
            Direction::Forward => (">", "ASC"),
            Direction::Backward => ("<", "DESC"),
        };

        if let Some(cursor) = query.cursor {
            sql.push_str(&format!(
                " AND (COALESCE(m.timestamp, 0) {cmp} ?
                       OR (COALESCE(m.timestamp, 0) = ? AND m._id {cmp} ?))"
            ));
            bind_values.push(Box::new(cursor.timestamp_ms));
            bind_values.push(Box::new(cursor.timestamp_ms));
            bind_values.push(Box::new(cursor.id));
        }

        sql.push_str(&format!(
            " ORDER BY COALESCE(m.timestamp, 0) {order}, m._id {order} LIMIT ?"
        ));
        bind_values.push(Box::new(i64::try_from(query.limit).unwrap_or(i64::MAX)));

        let mut stmt = conn.prepare(&sql)?;
        let bind_refs: Vec<&dyn rusqlite::types::ToSql> =
            bind_values.iter().map(|b| b.as_ref()).collect();

        let rows = stmt.query_map(bind_refs.as_slice(), |row| {
            let from_me = row.get::<_, Option<i64>>(2)?.unwrap_or(0) != 0;
            let sender = if from_me {
                None
            } else {
                [5usize, 6, 7, 8]
                    .into_iter()
                    .map(|idx| row.get::<_, Option<String>>(idx))
                    .collect::<Result<Vec<_>, _>>()?
                    .into_iter()
                    .flatten()
                    .find(|label| !label.is_empty())
            };
            let file_path: Option<String> = row.get(10)?;
            let direct_path: Option<String> = row.get(11)?;
            let media_path = file_path.filter(|p| !p.is_empty()).or(direct_path);

            Ok(Message {
                id: row.get(0)?,
                conversation_id: row.get(1)?,
                from_me,
                timestamp_ms: row.get(4)?,
                content: MessageContent::resolve(row.get(3)?, row.get(12)?, media_path, row.get(13)?),
                sender,
                quoted_text: row
                    .get::<_, Option<String>>(9)?
                    .filter(|q| !q.is_empty()),
            })
        })?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }
}

impl RecordStore for MessageStore {
    fn query(
        &self,
        conversation: ConversationId,
        query: &PageQuery,
    ) -> Result<Vec<Message>, StorageError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StorageError::Unavailable("connection lock poisoned".to_string()))?;
        Self::read_page(&conn, conversation, query)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
