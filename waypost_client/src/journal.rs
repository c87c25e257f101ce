use std::collections::VecDeque;

use waypost_lib::log_entry::{LogEntry, LogKind};

use crate::DEBUG_LOG_CAPACITY;

/// Append-only, most-recent-first sequence with FIFO eviction under a
/// fixed capacity bound.
#[derive(Debug, Clone)]
pub struct BoundedLog<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedLog<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, entry: T) {
        if self.entries.len() == self.capacity {
            self.entries.pop_back();
        }
        self.entries.push_front(entry);
    }

    /// Newest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    pub fn newest(&self) -> Option<&T> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// The rolling debug journal. Entries also land on the `tracing`
/// diagnostics at a matching level.
#[derive(Debug, Clone)]
pub struct DebugJournal {
    entries: BoundedLog<LogEntry>,
}

impl DebugJournal {
    pub fn new() -> Self {
        Self {
            entries: BoundedLog::new(DEBUG_LOG_CAPACITY),
        }
    }

    pub fn push(&mut self, kind: LogKind, message: impl Into<String>) -> LogEntry {
        let entry = LogEntry::new(kind, message);
        match kind {
            LogKind::Warning => tracing::warn!("{}", entry.message),
            LogKind::Error => tracing::error!("{}", entry.message),
            LogKind::System => tracing::info!("{}", entry.message),
            LogKind::Info | LogKind::Success => tracing::debug!("{}", entry.message),
        }
        self.entries.push(entry.clone());
        entry
    }

    /// Newest first.
    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn count_kind(&self, kind: LogKind) -> usize {
        self.entries.iter().filter(|e| e.kind == kind).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for DebugJournal {
    fn default() -> Self {
        Self::new()
    }
}
