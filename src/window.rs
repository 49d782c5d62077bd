//! The materialized window: messages interleaved with day separators, grown
//! at either end by splicing in ascending batches.
//!
//! Invariants kept by [`Window::merge`]:
//!
//! - entries are strictly ascending by `(timestamp, id)`
//! - every maximal run of same-day messages is preceded by exactly one
//!   separator for that day, and no separator stands anywhere else
//!
//! Because every batch is anchored at the current edge, the dedup after a
//! splice only has to look at the entries on either side of the seam.

use std::collections::VecDeque;

use serde::Serialize;

use crate::calendar::{Calendar, DayKey};
use crate::message::Message;

/// One row of the window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "entry", rename_all = "snake_case")]
pub enum Entry {
    Separator { day: DayKey },
    Message { message: Message },
}

impl Entry {
    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Entry::Message { message } => Some(message),
            Entry::Separator { .. } => None,
        }
    }

    pub fn separator_day(&self) -> Option<DayKey> {
        match self {
            Entry::Separator { day } => Some(*day),
            Entry::Message { .. } => None,
        }
    }
}

/// Where a batch goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpliceSide {
    /// Rebuild the window from this batch alone.
    Replace,
    /// Older messages, in front of the window.
    Prepend,
    /// Newer messages, after the window.
    Append,
}

/// What a merge changed, for incremental rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Splice {
    pub side: SpliceSide,
    /// The entries that were inserted, ascending.
    pub entries: Vec<Entry>,
    /// Separator that used to lead the window and now sits inside the
    /// prepended run; presentation must drop it.
    pub retired_separator: Option<DayKey>,
}

impl Splice {
    fn empty(side: SpliceSide) -> Self {
        Self {
            side,
            entries: Vec::new(),
            retired_separator: None,
        }
    }
}

/// Interleave an ascending batch with a separator before each new day.
pub fn interleave(batch: Vec<Message>, calendar: &Calendar) -> Vec<Entry> {
    let mut entries = Vec::with_capacity(batch.len() + 1);
    let mut last_day = None;
    for message in batch {
        let day = calendar.day_of(message.timestamp_ms);
        if last_day != Some(day) {
            entries.push(Entry::Separator { day });
            last_day = Some(day);
        }
        entries.push(Entry::Message { message });
    }
    entries
}

#[derive(Debug, Clone, Default)]
pub struct Window {
    entries: VecDeque<Entry>,
    message_count: usize,
}

impl Window {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn message_count(&self) -> usize {
        self.message_count
    }

    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter().filter_map(Entry::as_message)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.message_count = 0;
    }

    fn first_day(&self) -> Option<DayKey> {
        self.entries.front().and_then(Entry::separator_day)
    }

    fn last_message(&self) -> Option<&Message> {
        self.entries.back().and_then(Entry::as_message)
    }

    /// Splice an ascending `batch` in at `side` and return the delta.
    pub fn merge(&mut self, batch: Vec<Message>, side: SpliceSide, calendar: &Calendar) -> Splice {
        if side == SpliceSide::Replace {
            self.clear();
        }
        if batch.is_empty() {
            return Splice::empty(side);
        }

        let added = batch.len();
        let last_batch_day = batch.last().map(|m| calendar.day_of(m.timestamp_ms));
        let mut entries = interleave(batch, calendar);
        let mut retired_separator = None;

        match side {
            SpliceSide::Replace => {
                self.entries.extend(entries.iter().cloned());
            }
            SpliceSide::Append => {
                // Batch opens with a separator for a day the window already ends in.
                let tail_day = self
                    .last_message()
                    .map(|m| calendar.day_of(m.timestamp_ms));
                if tail_day.is_some() && entries.first().and_then(Entry::separator_day) == tail_day
                {
                    entries.remove(0);
                }
                self.entries.extend(entries.iter().cloned());
            }
            SpliceSide::Prepend => {
                // Window opens with a separator for the day the batch ends in.
                if self.first_day().is_some() && self.first_day() == last_batch_day {
                    self.entries.pop_front();
                    retired_separator = last_batch_day;
                }
                for entry in entries.iter().rev() {
                    self.entries.push_front(entry.clone());
                }
            }
        }

        self.message_count += added;
        Splice {
            side,
            entries,
            retired_separator,
        }
    }
}
